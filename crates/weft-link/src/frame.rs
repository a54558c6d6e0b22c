//! Frame types crossing the link-layer seams.

use weft_core::Address;

use crate::protocol::Protocol;

/// A frame delivered to a protocol layer: who sent it (the remote link
/// address) and the opaque payload, with the protocol tag already stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFrame {
    pub protocol: Protocol,
    pub remote: Address,
    pub payload: Vec<u8>,
}

/// A frame handed to a media driver for transmission. `bytes` already
/// carries the 1-byte protocol tag prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFrame {
    pub destination: Address,
    pub bytes: Vec<u8>,
}
