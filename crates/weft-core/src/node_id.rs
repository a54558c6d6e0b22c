//! Node identity.

use std::fmt;
use std::net::Ipv4Addr;

use crate::address::{
    Address, TAG_BROADCAST, TAG_SERIAL, TAG_UDP, TAG_UHF, TAG_WEBSOCKET,
};
use crate::wire::{Decode, Encode, WireError, WireReader, WireWriter};

const TAG_LOOPBACK: u8 = 0x7f;

/// Identifies a node by one of its link addresses, plus two sentinels:
/// `Broadcast` (every node) and `Loopback` (this node, medium-independent).
///
/// Equality is structural, so the same node seen through two different
/// media has two distinct ids; the neighbor table unifies them by merging
/// addresses under whichever id the node advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeId {
    Serial(u8),
    Uhf(u8),
    Udp(Ipv4Addr, u16),
    WebSocket(Ipv4Addr, u16),
    Broadcast,
    Loopback,
}

impl NodeId {
    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        matches!(self, NodeId::Broadcast)
    }

    #[must_use]
    pub fn is_loopback(&self) -> bool {
        matches!(self, NodeId::Loopback)
    }
}

impl From<Address> for NodeId {
    fn from(address: Address) -> Self {
        match address {
            Address::Serial(byte) => NodeId::Serial(byte),
            Address::Uhf(byte) => NodeId::Uhf(byte),
            Address::Udp(ip, port) => NodeId::Udp(ip, port),
            Address::WebSocket(ip, port) => NodeId::WebSocket(ip, port),
            Address::Broadcast => NodeId::Broadcast,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Serial(byte) => write!(f, "serial({byte})"),
            NodeId::Uhf(byte) => write!(f, "uhf({byte})"),
            NodeId::Udp(ip, port) => write!(f, "udp({ip}:{port})"),
            NodeId::WebSocket(ip, port) => write!(f, "websocket({ip}:{port})"),
            NodeId::Broadcast => f.write_str("broadcast"),
            NodeId::Loopback => f.write_str("loopback"),
        }
    }
}

impl Encode for NodeId {
    fn encode(&self, writer: &mut WireWriter) {
        match self {
            NodeId::Serial(byte) => {
                writer.write_u8(TAG_SERIAL);
                writer.write_u8(*byte);
            }
            NodeId::Uhf(byte) => {
                writer.write_u8(TAG_UHF);
                writer.write_u8(*byte);
            }
            NodeId::Udp(ip, port) => {
                writer.write_u8(TAG_UDP);
                writer.write_bytes(&ip.octets());
                writer.write_u16(*port);
            }
            NodeId::WebSocket(ip, port) => {
                writer.write_u8(TAG_WEBSOCKET);
                writer.write_bytes(&ip.octets());
                writer.write_u16(*port);
            }
            NodeId::Broadcast => writer.write_u8(TAG_BROADCAST),
            NodeId::Loopback => writer.write_u8(TAG_LOOPBACK),
        }
    }
}

impl Decode for NodeId {
    fn decode(reader: &mut WireReader<'_>) -> Result<Self, WireError> {
        let tag = reader.read_u8()?;
        match tag {
            TAG_SERIAL => Ok(NodeId::Serial(reader.read_u8()?)),
            TAG_UHF => Ok(NodeId::Uhf(reader.read_u8()?)),
            TAG_UDP | TAG_WEBSOCKET => {
                let octets = reader.read_bytes(4)?;
                let ip = Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]);
                let port = reader.read_u16()?;
                if tag == TAG_UDP {
                    Ok(NodeId::Udp(ip, port))
                } else {
                    Ok(NodeId::WebSocket(ip, port))
                }
            }
            TAG_BROADCAST => Ok(NodeId::Broadcast),
            TAG_LOOPBACK => Ok(NodeId::Loopback),
            _ => Err(WireError::UnknownTag { kind: "node id", tag }),
        }
    }
}
