//! Neighbor protocol frames.

use weft_core::{Cost, Decode, Encode, NodeId, WireError, WireReader, WireWriter};

const TAG_HELLO: u8 = 1;
const TAG_HELLO_ACK: u8 = 2;
const TAG_GOODBYE: u8 = 3;

/// The three frames of the liveness exchange.
///
/// A `Hello` advertises {sender, the sender's own node cost, the cost of
/// the specific link it was sent over}. A `HelloAck` echoes the link cost
/// back and is never answered, which is what stops the exchange from
/// ping-ponging forever. A `Goodbye` announces departure and gets no reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborFrame {
    Hello { sender: NodeId, node_cost: Cost, link_cost: Cost },
    HelloAck { sender: NodeId, node_cost: Cost, link_cost: Cost },
    Goodbye { sender: NodeId },
}

impl NeighborFrame {
    #[must_use]
    pub fn sender(&self) -> NodeId {
        match self {
            NeighborFrame::Hello { sender, .. }
            | NeighborFrame::HelloAck { sender, .. }
            | NeighborFrame::Goodbye { sender } => *sender,
        }
    }
}

impl Encode for NeighborFrame {
    fn encode(&self, writer: &mut WireWriter) {
        match self {
            NeighborFrame::Hello { sender, node_cost, link_cost } => {
                writer.write_u8(TAG_HELLO);
                sender.encode(writer);
                node_cost.encode(writer);
                link_cost.encode(writer);
            }
            NeighborFrame::HelloAck { sender, node_cost, link_cost } => {
                writer.write_u8(TAG_HELLO_ACK);
                sender.encode(writer);
                node_cost.encode(writer);
                link_cost.encode(writer);
            }
            NeighborFrame::Goodbye { sender } => {
                writer.write_u8(TAG_GOODBYE);
                sender.encode(writer);
            }
        }
    }
}

impl Decode for NeighborFrame {
    fn decode(reader: &mut WireReader<'_>) -> Result<Self, WireError> {
        let tag = reader.read_u8()?;
        match tag {
            TAG_HELLO | TAG_HELLO_ACK => {
                let sender = NodeId::decode(reader)?;
                let node_cost = Cost::decode(reader)?;
                let link_cost = Cost::decode(reader)?;
                if tag == TAG_HELLO {
                    Ok(NeighborFrame::Hello { sender, node_cost, link_cost })
                } else {
                    Ok(NeighborFrame::HelloAck { sender, node_cost, link_cost })
                }
            }
            TAG_GOODBYE => Ok(NeighborFrame::Goodbye { sender: NodeId::decode(reader)? }),
            _ => Err(WireError::UnknownTag { kind: "neighbor frame", tag }),
        }
    }
}
