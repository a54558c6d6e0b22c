//! Routing error types.

use thiserror::Error;
use weft_core::NodeId;
use weft_link::LinkSendError;

/// Failure to hand a frame to a specific neighbor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NeighborSendError {
    /// The neighbor has no usable link address right now.
    #[error("neighbor {id} is unreachable")]
    Unreachable { id: NodeId },

    /// The link layer refused the frame.
    #[error("link send failed: {0}")]
    Link(#[from] LinkSendError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_strings() {
        let error = NeighborSendError::Unreachable { id: NodeId::Serial(4) };
        assert_eq!(error.to_string(), "neighbor serial(4) is unreachable");

        let error = NeighborSendError::Link(LinkSendError::PortClosed);
        assert_eq!(error.to_string(), "link send failed: media port closed");
    }
}
