//! Discovery defaults.

use std::time::Duration;

/// How long a resolution waits for the first response before giving up.
pub const FIRST_RESPONSE_TIMEOUT: Duration = Duration::from_secs(3);

/// After a first response, how long to keep waiting for a cheaper one.
pub const BETTER_RESPONSE_GRACE: Duration = Duration::from_secs(1);

/// Learned routes are dropped this long after their last refresh.
pub const ROUTE_CACHE_TTL: Duration = Duration::from_secs(30);

/// Bounded size of the route cache; the oldest insertion is evicted first.
pub const ROUTE_CACHE_CAPACITY: usize = 64;

/// Bounded size of the frame-id replay cache.
pub const FRAME_ID_CACHE_CAPACITY: usize = 128;
