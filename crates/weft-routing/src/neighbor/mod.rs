//! Neighbor liveness: Hello/Goodbye exchange, per-link costs, expiry.

pub mod constants;
pub mod frame;
pub mod service;
pub mod table;

pub use constants::*;
pub use frame::NeighborFrame;
pub use service::NeighborService;
pub use table::{Neighbor, NeighborEvent, NeighborTable, NeighborTimers};
