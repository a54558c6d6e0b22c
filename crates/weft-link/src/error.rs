//! Link-layer error types.

use thiserror::Error;
use weft_core::AddressKind;

/// A single best-effort send failed. Callers retry, pick another address,
/// or surface unreachability; these are never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkSendError {
    /// No attached media port can carry this address kind.
    #[error("no attached medium for {kind} addresses")]
    NoMedium { kind: AddressKind },

    /// The owning media port has shut down.
    #[error("media port closed")]
    PortClosed,

    /// A broadcast destination needs `broadcast(kind, ..)`, not `send`.
    #[error("broadcast destination passed to unicast send")]
    BroadcastDestination,
}
