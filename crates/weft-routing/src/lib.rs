//! Routing layers of the weft mesh stack.
//!
//! Two services ride the link multiplexer:
//!
//! - [`neighbor`]: per-link liveness. Hello/Goodbye exchange, link costs,
//!   expiry and keepalive timers, liveness events.
//! - [`discovery`]: reactive (on-demand) route discovery. Bounded flooding
//!   with a replay cache, a generation-token route cache, and coalescing
//!   of concurrent resolutions for the same target.
//!
//! Both services absorb network-induced failures locally: malformed frames
//! are dropped where they arrive, and resolution failure is a normal
//! `None`, not an error.

pub mod discovery;
pub mod error;
pub mod local;
pub mod neighbor;

pub use error::NeighborSendError;
pub use local::{LocalInfo, LocalNode};
