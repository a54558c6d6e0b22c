//! Link layer: protocol-tagged frame multiplexing over attachable media.
//!
//! A node owns one [`LinkMultiplexer`]. Media drivers (UDP, in-memory test
//! hub, ...) attach to it as ports; protocol layers open one [`LinkSocket`]
//! per protocol tag and exchange opaque payloads through it. The link layer
//! gives a single best-effort send per frame and nothing more: no
//! reliability, no ordering, no duplicate suppression.

pub mod error;
pub mod frame;
pub mod memory;
pub mod mux;
pub mod protocol;
pub mod udp;

pub use error::LinkSendError;
pub use frame::{LinkFrame, MediaFrame};
pub use memory::MemoryHub;
pub use mux::{LinkEvent, LinkMultiplexer, LinkSender, LinkSocket};
pub use protocol::Protocol;
pub use udp::{MediaError, UdpConfig, UdpMedia};
