//! Discovery protocol frames.

use weft_core::{
    Address, Cost, Decode, Encode, FrameId, NodeId, WireError, WireReader, WireWriter,
};

const TAG_REQUEST: u8 = 1;
const TAG_REPLY: u8 = 2;

const EXTRA_TAG_NONE: u8 = 1;
const EXTRA_TAG_ADDRESSES: u8 = 2;

/// Fields shared by requests and replies.
///
/// `source` is the originator and never changes in flight; `sender` is
/// rewritten at every hop to the forwarding node; `total_cost` accumulates
/// the cost of every link and node traversed so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryCommon {
    pub frame_id: FrameId,
    pub total_cost: Cost,
    pub source: NodeId,
    pub target: NodeId,
    pub sender: NodeId,
}

impl DiscoveryCommon {
    fn encode_fields(&self, writer: &mut WireWriter) {
        self.frame_id.encode(writer);
        self.total_cost.encode(writer);
        self.source.encode(writer);
        self.target.encode(writer);
        self.sender.encode(writer);
    }

    fn decode_fields(reader: &mut WireReader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            frame_id: FrameId::decode(reader)?,
            total_cost: Cost::decode(reader)?,
            source: NodeId::decode(reader)?,
            target: NodeId::decode(reader)?,
            sender: NodeId::decode(reader)?,
        })
    }
}

/// What a request asks the target to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Just a usable gateway toward the target.
    Gateway,
    /// The gateway plus the target's own link addresses.
    Addresses,
}

/// Ancillary payload of a reply, mirroring the request kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyExtra {
    None,
    Addresses(Vec<Address>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryFrame {
    Request { common: DiscoveryCommon, kind: RequestKind },
    Reply { common: DiscoveryCommon, extra: ReplyExtra },
}

impl DiscoveryFrame {
    #[must_use]
    pub fn common(&self) -> &DiscoveryCommon {
        match self {
            DiscoveryFrame::Request { common, .. }
            | DiscoveryFrame::Reply { common, .. } => common,
        }
    }

    pub fn common_mut(&mut self) -> &mut DiscoveryCommon {
        match self {
            DiscoveryFrame::Request { common, .. }
            | DiscoveryFrame::Reply { common, .. } => common,
        }
    }

    /// Addresses carried by a reply, if any.
    #[must_use]
    pub fn extra_addresses(&self) -> Option<&[Address]> {
        match self {
            DiscoveryFrame::Reply { extra: ReplyExtra::Addresses(addresses), .. } => {
                Some(addresses)
            }
            _ => None,
        }
    }
}

impl Encode for DiscoveryFrame {
    fn encode(&self, writer: &mut WireWriter) {
        match self {
            DiscoveryFrame::Request { common, kind } => {
                writer.write_u8(TAG_REQUEST);
                common.encode_fields(writer);
                writer.write_u8(match kind {
                    RequestKind::Gateway => EXTRA_TAG_NONE,
                    RequestKind::Addresses => EXTRA_TAG_ADDRESSES,
                });
            }
            DiscoveryFrame::Reply { common, extra } => {
                writer.write_u8(TAG_REPLY);
                common.encode_fields(writer);
                match extra {
                    ReplyExtra::None => writer.write_u8(EXTRA_TAG_NONE),
                    ReplyExtra::Addresses(addresses) => {
                        writer.write_u8(EXTRA_TAG_ADDRESSES);
                        // The count field is one byte; longer lists are
                        // capped so the count always matches what follows.
                        let count = addresses.len().min(usize::from(u8::MAX));
                        writer.write_u8(count as u8);
                        for address in &addresses[..count] {
                            address.encode(writer);
                        }
                    }
                }
            }
        }
    }
}

impl Decode for DiscoveryFrame {
    fn decode(reader: &mut WireReader<'_>) -> Result<Self, WireError> {
        let tag = reader.read_u8()?;
        let common = DiscoveryCommon::decode_fields(reader)?;
        match tag {
            TAG_REQUEST => {
                let kind = match reader.read_u8()? {
                    EXTRA_TAG_NONE => RequestKind::Gateway,
                    EXTRA_TAG_ADDRESSES => RequestKind::Addresses,
                    other => {
                        return Err(WireError::UnknownTag {
                            kind: "request extra",
                            tag: other,
                        });
                    }
                };
                Ok(DiscoveryFrame::Request { common, kind })
            }
            TAG_REPLY => {
                let extra = match reader.read_u8()? {
                    EXTRA_TAG_NONE => ReplyExtra::None,
                    EXTRA_TAG_ADDRESSES => {
                        let count = reader.read_u8()? as usize;
                        let mut addresses = Vec::with_capacity(count);
                        for _ in 0..count {
                            addresses.push(Address::decode(reader)?);
                        }
                        ReplyExtra::Addresses(addresses)
                    }
                    other => {
                        return Err(WireError::UnknownTag {
                            kind: "reply extra",
                            tag: other,
                        });
                    }
                };
                Ok(DiscoveryFrame::Reply { common, extra })
            }
            _ => Err(WireError::UnknownTag { kind: "discovery frame", tag }),
        }
    }
}
