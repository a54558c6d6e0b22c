//! Neighbor timer defaults.

use std::time::Duration;

/// A neighbor with no received traffic for this long is removed.
pub const NEIGHBOR_EXPIRATION: Duration = Duration::from_secs(10);

/// Keepalive Hello interval. Must stay comfortably below
/// [`NEIGHBOR_EXPIRATION`] so a healthy link never ages out.
pub const SEND_HELLO_INTERVAL: Duration = Duration::from_secs(4);
