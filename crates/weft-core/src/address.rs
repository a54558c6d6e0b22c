//! Link-layer addresses.
//!
//! An [`Address`] names an endpoint on one specific medium. A node that is
//! reachable over several media has several addresses; node-level identity
//! is [`crate::NodeId`].

use std::fmt;
use std::net::Ipv4Addr;

use crate::wire::{Decode, Encode, WireError, WireReader, WireWriter};

pub(crate) const TAG_SERIAL: u8 = 0x01;
pub(crate) const TAG_UHF: u8 = 0x02;
pub(crate) const TAG_UDP: u8 = 0x03;
pub(crate) const TAG_WEBSOCKET: u8 = 0x04;
pub(crate) const TAG_BROADCAST: u8 = 0xff;

/// The medium an address belongs to, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressKind {
    Serial,
    Uhf,
    Udp,
    WebSocket,
}

impl fmt::Display for AddressKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AddressKind::Serial => "serial",
            AddressKind::Uhf => "uhf",
            AddressKind::Udp => "udp",
            AddressKind::WebSocket => "websocket",
        };
        f.write_str(name)
    }
}

/// A medium-specific endpoint address.
///
/// Wire form is a 1-byte kind tag followed by a fixed-length body:
/// serial and UHF carry a single address byte, UDP and WebSocket carry an
/// IPv4 address plus a little-endian port. `Broadcast` is a destination
/// sentinel with an empty body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Address {
    Serial(u8),
    Uhf(u8),
    Udp(Ipv4Addr, u16),
    WebSocket(Ipv4Addr, u16),
    Broadcast,
}

impl Address {
    /// The medium this address belongs to; `None` for the broadcast
    /// sentinel, which is valid on any medium.
    #[must_use]
    pub fn kind(&self) -> Option<AddressKind> {
        match self {
            Address::Serial(_) => Some(AddressKind::Serial),
            Address::Uhf(_) => Some(AddressKind::Uhf),
            Address::Udp(_, _) => Some(AddressKind::Udp),
            Address::WebSocket(_, _) => Some(AddressKind::WebSocket),
            Address::Broadcast => None,
        }
    }

    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        matches!(self, Address::Broadcast)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Serial(byte) => write!(f, "serial({byte})"),
            Address::Uhf(byte) => write!(f, "uhf({byte})"),
            Address::Udp(ip, port) => write!(f, "udp({ip}:{port})"),
            Address::WebSocket(ip, port) => write!(f, "websocket({ip}:{port})"),
            Address::Broadcast => f.write_str("broadcast"),
        }
    }
}

fn write_ipv4_port(writer: &mut WireWriter, ip: &Ipv4Addr, port: u16) {
    writer.write_bytes(&ip.octets());
    writer.write_u16(port);
}

fn read_ipv4_port(reader: &mut WireReader<'_>) -> Result<(Ipv4Addr, u16), WireError> {
    let octets = reader.read_bytes(4)?;
    let ip = Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]);
    let port = reader.read_u16()?;
    Ok((ip, port))
}

impl Encode for Address {
    fn encode(&self, writer: &mut WireWriter) {
        match self {
            Address::Serial(byte) => {
                writer.write_u8(TAG_SERIAL);
                writer.write_u8(*byte);
            }
            Address::Uhf(byte) => {
                writer.write_u8(TAG_UHF);
                writer.write_u8(*byte);
            }
            Address::Udp(ip, port) => {
                writer.write_u8(TAG_UDP);
                write_ipv4_port(writer, ip, *port);
            }
            Address::WebSocket(ip, port) => {
                writer.write_u8(TAG_WEBSOCKET);
                write_ipv4_port(writer, ip, *port);
            }
            Address::Broadcast => writer.write_u8(TAG_BROADCAST),
        }
    }
}

impl Decode for Address {
    fn decode(reader: &mut WireReader<'_>) -> Result<Self, WireError> {
        let tag = reader.read_u8()?;
        match tag {
            TAG_SERIAL => Ok(Address::Serial(reader.read_u8()?)),
            TAG_UHF => Ok(Address::Uhf(reader.read_u8()?)),
            TAG_UDP => {
                let (ip, port) = read_ipv4_port(reader)?;
                Ok(Address::Udp(ip, port))
            }
            TAG_WEBSOCKET => {
                let (ip, port) = read_ipv4_port(reader)?;
                Ok(Address::WebSocket(ip, port))
            }
            TAG_BROADCAST => Ok(Address::Broadcast),
            _ => Err(WireError::UnknownTag { kind: "address", tag }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_variant() {
        let addresses = [
            Address::Serial(7),
            Address::Uhf(0xfe),
            Address::Udp(Ipv4Addr::new(10, 0, 0, 2), 9104),
            Address::WebSocket(Ipv4Addr::new(192, 168, 1, 1), 80),
            Address::Broadcast,
        ];
        for address in addresses {
            let bytes = address.encode_to_vec();
            assert_eq!(Address::decode_exact(&bytes), Ok(address), "{address}");
        }
    }

    #[test]
    fn udp_wire_layout() {
        let address = Address::Udp(Ipv4Addr::new(10, 0, 0, 2), 0x1234);
        assert_eq!(
            address.encode_to_vec(),
            vec![0x03, 10, 0, 0, 2, 0x34, 0x12]
        );
    }

    #[test]
    fn rejects_unknown_tag() {
        assert_eq!(
            Address::decode_exact(&[0x42]),
            Err(WireError::UnknownTag { kind: "address", tag: 0x42 })
        );
    }

    #[test]
    fn broadcast_has_no_kind() {
        assert_eq!(Address::Broadcast.kind(), None);
        assert_eq!(Address::Serial(1).kind(), Some(AddressKind::Serial));
    }
}
