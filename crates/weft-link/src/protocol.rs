//! Protocol tags used to demultiplex link frames.

use weft_core::{Decode, Encode, WireError, WireReader, WireWriter};

/// One tag per logical layer riding on the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// Neighbor liveness (Hello / Goodbye).
    RoutingNeighbor,
    /// Reactive route discovery floods.
    RoutingDiscovery,
    /// Point-to-point datagram tunneling for higher layers.
    Tunnel,
}

impl Protocol {
    const TAG_NEIGHBOR: u8 = 1;
    const TAG_DISCOVERY: u8 = 2;
    const TAG_TUNNEL: u8 = 3;
}

impl Encode for Protocol {
    fn encode(&self, writer: &mut WireWriter) {
        let tag = match self {
            Protocol::RoutingNeighbor => Self::TAG_NEIGHBOR,
            Protocol::RoutingDiscovery => Self::TAG_DISCOVERY,
            Protocol::Tunnel => Self::TAG_TUNNEL,
        };
        writer.write_u8(tag);
    }
}

impl Decode for Protocol {
    fn decode(reader: &mut WireReader<'_>) -> Result<Self, WireError> {
        let tag = reader.read_u8()?;
        match tag {
            Self::TAG_NEIGHBOR => Ok(Protocol::RoutingNeighbor),
            Self::TAG_DISCOVERY => Ok(Protocol::RoutingDiscovery),
            Self::TAG_TUNNEL => Ok(Protocol::Tunnel),
            _ => Err(WireError::UnknownTag { kind: "protocol", tag }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        for protocol in [
            Protocol::RoutingNeighbor,
            Protocol::RoutingDiscovery,
            Protocol::Tunnel,
        ] {
            let bytes = protocol.encode_to_vec();
            assert_eq!(Protocol::decode_exact(&bytes), Ok(protocol));
        }
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert!(Protocol::decode_exact(&[0]).is_err());
        assert!(Protocol::decode_exact(&[9]).is_err());
    }
}
