//! Transport error types.

use thiserror::Error;
use weft_core::WireError;

use crate::frame::FrameError;

/// Why an established socket was torn down abnormally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SocketError {
    /// Both the raw-send and ack-timeout retry ladders ran dry for a
    /// frame the peer must acknowledge.
    #[error("retry budget exhausted sending {kind} frame")]
    RetriesExhausted { kind: &'static str },
}

/// Active-open failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("handshake timed out")]
    Timeout,
}

/// Passive-open failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcceptError {
    #[error("no connection attempt arrived in time")]
    Timeout,

    /// The first frame failed checksum verification.
    #[error("checksum mismatch on connection attempt")]
    ChecksumMismatch,

    /// The first frame verified but did not decode.
    #[error("malformed connection attempt: {0}")]
    InvalidFrame(WireError),

    /// The first frame decoded to something other than `Syn`.
    #[error("expected syn, got {kind} frame")]
    UnexpectedFrame { kind: &'static str },
}

impl From<FrameError> for AcceptError {
    fn from(error: FrameError) -> Self {
        match error {
            FrameError::Checksum => AcceptError::ChecksumMismatch,
            FrameError::Wire(wire) => AcceptError::InvalidFrame(wire),
        }
    }
}

/// Failures of [`crate::TrustedSocket::send`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// The socket is not open.
    #[error("socket is not open")]
    InvalidOperation,

    /// The socket gave up on the frame and closed.
    #[error("delivery timed out")]
    Timeout,
}

/// Failures of [`crate::TrustedSocket::close`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CloseError {
    /// Teardown can only begin from the open state.
    #[error("socket is not open")]
    InvalidOperation,

    /// The peer never acknowledged the teardown.
    #[error("teardown timed out")]
    Timeout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_strings() {
        assert_eq!(
            SocketError::RetriesExhausted { kind: "syn" }.to_string(),
            "retry budget exhausted sending syn frame"
        );
        assert_eq!(AcceptError::Timeout.to_string(), "no connection attempt arrived in time");
        assert_eq!(
            AcceptError::UnexpectedFrame { kind: "data" }.to_string(),
            "expected syn, got data frame"
        );
        assert_eq!(SendError::InvalidOperation.to_string(), "socket is not open");
    }

    #[test]
    fn frame_errors_map_onto_accept_errors() {
        assert_eq!(
            AcceptError::from(FrameError::Checksum),
            AcceptError::ChecksumMismatch
        );
        assert_eq!(
            AcceptError::from(FrameError::Wire(WireError::UnexpectedEnd { needed: 1 })),
            AcceptError::InvalidFrame(WireError::UnexpectedEnd { needed: 1 })
        );
    }
}
