//! The tunnel: mesh-wide datagrams for the trusted transport.
//!
//! A tunnel frame is `{source, destination, payload}` on protocol tag 3.
//! Every node forwards frames not addressed to itself toward the gateway
//! the reactive router resolves, so the trusted transport sees one logical
//! point-to-point datagram service across any number of hops. Delivery is
//! best effort; the transport's retransmission repairs whatever the mesh
//! loses.

use weft_core::{Decode, Encode, NodeId, WireError, WireReader, WireWriter};

/// One mesh-wide datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelFrame {
    pub source: NodeId,
    pub destination: NodeId,
    pub payload: Vec<u8>,
}

impl Encode for TunnelFrame {
    fn encode(&self, writer: &mut WireWriter) {
        self.source.encode(writer);
        self.destination.encode(writer);
        writer.write_bytes(&self.payload);
    }
}

impl Decode for TunnelFrame {
    fn decode(reader: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(TunnelFrame {
            source: NodeId::decode(reader)?,
            destination: NodeId::decode(reader)?,
            payload: reader.read_rest().to_vec(),
        })
    }
}
