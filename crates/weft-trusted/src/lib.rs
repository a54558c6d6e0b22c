//! Trusted transport: a reliable, ordered, connection-oriented byte-frame
//! stream over an unreliable point-to-point datagram service.
//!
//! Six frame kinds (`Syn`/`SynAck`, `Fin`/`FinAck`, `Data`/`DataAck`) drive
//! three orthogonal per-socket state machines: handshake, teardown, and
//! data. The state machines are pure — they emit [`socket::SocketAction`]s
//! and perform no I/O — and the async socket driver executes those actions
//! over a [`outlet::DatagramOutlet`]. Every frame is protected by a 16-bit
//! one's-complement checksum over the body plus a pseudo-header; anything
//! failing the checksum is dropped silently and repaired by retransmission.

pub mod checksum;
pub mod constants;
pub mod error;
pub mod frame;
pub mod outlet;
pub mod socket;

pub use error::{AcceptError, CloseError, ConnectError, SendError, SocketError};
pub use frame::{FrameBody, FrameError, PseudoHeader, TrustedFrame};
pub use outlet::{DatagramOutlet, OutletError};
pub use socket::{SocketStatus, TrustedSocket};
