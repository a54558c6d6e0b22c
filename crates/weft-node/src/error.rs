//! Node-level error types.

use thiserror::Error;
use weft_core::NodeId;
use weft_link::MediaError;
use weft_trusted::{AcceptError, ConnectError};

/// Configuration loading and validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

/// Failures while bringing a configured node up.
#[derive(Debug, Error)]
pub enum NodeStartError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("media startup failed: {0}")]
    Media(#[from] MediaError),
}

/// Failures opening a trusted stream across the mesh.
#[derive(Debug, Error)]
pub enum StreamError {
    /// One stream per remote node; the tunnel demultiplexes on node id.
    #[error("a stream to {remote} is already open")]
    Busy { remote: NodeId },

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Accept(#[from] AcceptError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_strings() {
        assert_eq!(
            ConfigError::Invalid { field: "media.udp.bind", message: "empty".into() }
                .to_string(),
            "invalid media.udp.bind: empty"
        );
        assert_eq!(
            StreamError::Busy { remote: NodeId::Serial(4) }.to_string(),
            "a stream to serial(4) is already open"
        );
        assert_eq!(
            StreamError::from(ConnectError::Timeout).to_string(),
            "handshake timed out"
        );
    }
}
