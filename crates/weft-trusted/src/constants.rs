//! Retransmission budgets and timing.

use std::time::Duration;

/// Raw-send retries per frame attempt, and independently the number of
/// ack-timeout-driven retries per ack-expecting frame.
pub const RETRY_COUNT: u8 = 10;

/// Fixed backoff between raw-send retries.
pub const RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// How long to wait for the matching ack before retransmitting.
pub const ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// How long `connect()`/`accept()` wait before reporting failure. Covers
/// the full ack retry ladder with one interval of slack.
pub const HANDSHAKE_TIMEOUT: Duration =
    Duration::from_secs((RETRY_COUNT as u64 + 1) * 5 + 5);
