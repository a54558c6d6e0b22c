//! Shared vocabulary types and the byte-exact wire codec for the weft
//! mesh stack.
//!
//! Everything above the link layer speaks in terms of these types:
//! [`Address`] identifies an endpoint on a specific medium, [`NodeId`]
//! identifies a node independent of which of its links a frame used, and
//! [`Cost`] is the additive path metric carried by routing frames.
//!
//! The wire codec ([`wire`]) is deliberately small: fixed-width
//! little-endian integers and 1-byte variant tags, nothing self-describing.

pub mod address;
pub mod node_id;
pub mod types;
pub mod wire;

pub use address::{Address, AddressKind};
pub use node_id::NodeId;
pub use types::{Cost, FrameId, PortId, SequenceNumber};
pub use wire::{Decode, Encode, WireError, WireReader, WireWriter};
