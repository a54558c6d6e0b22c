//! Trusted-transport frames and their checksum envelope.
//!
//! On the wire a frame is `checksum(2) || tag(1) || body`. The checksum
//! covers the frame bytes plus a pseudo-header derived from the addressing
//! the datagram service carries out of band, so a frame delivered to the
//! wrong endpoint fails verification even when its bytes are intact.

use thiserror::Error;
use weft_core::{
    Decode, Encode, NodeId, PortId, SequenceNumber, WireError, WireReader, WireWriter,
};

use crate::checksum;

const TAG_SYN: u8 = 1;
const TAG_SYN_ACK: u8 = 2;
const TAG_FIN: u8 = 3;
const TAG_FIN_ACK: u8 = 4;
const TAG_DATA: u8 = 5;
const TAG_DATA_ACK: u8 = 6;

/// Node ids are padded to this many bytes inside the pseudo-header so the
/// checksum words stay aligned regardless of the id variant.
const PSEUDO_NODE_ID_WIDTH: usize = 8;

/// Why an inbound frame was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// The checksum did not verify against the pseudo-header.
    #[error("checksum mismatch")]
    Checksum,

    /// The frame body could not be decoded.
    #[error("malformed frame: {0}")]
    Wire(#[from] WireError),
}

/// The six frame kinds of the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameBody {
    Syn,
    SynAck,
    Fin,
    FinAck,
    Data { seq: SequenceNumber, payload: Vec<u8> },
    DataAck { seq: SequenceNumber },
}

impl FrameBody {
    /// Whether the peer is expected to answer this frame with an ack.
    #[must_use]
    pub fn expects_ack(&self) -> bool {
        matches!(
            self,
            FrameBody::Syn | FrameBody::Fin | FrameBody::Data { .. }
        )
    }

    /// Short name for logging.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            FrameBody::Syn => "syn",
            FrameBody::SynAck => "syn-ack",
            FrameBody::Fin => "fin",
            FrameBody::FinAck => "fin-ack",
            FrameBody::Data { .. } => "data",
            FrameBody::DataAck { .. } => "data-ack",
        }
    }
}

impl Encode for FrameBody {
    fn encode(&self, writer: &mut WireWriter) {
        match self {
            FrameBody::Syn => writer.write_u8(TAG_SYN),
            FrameBody::SynAck => writer.write_u8(TAG_SYN_ACK),
            FrameBody::Fin => writer.write_u8(TAG_FIN),
            FrameBody::FinAck => writer.write_u8(TAG_FIN_ACK),
            FrameBody::Data { seq, payload } => {
                writer.write_u8(TAG_DATA);
                seq.encode(writer);
                writer.write_bytes(payload);
            }
            FrameBody::DataAck { seq } => {
                writer.write_u8(TAG_DATA_ACK);
                seq.encode(writer);
            }
        }
    }
}

impl Decode for FrameBody {
    fn decode(reader: &mut WireReader<'_>) -> Result<Self, WireError> {
        let tag = reader.read_u8()?;
        match tag {
            TAG_SYN => Ok(FrameBody::Syn),
            TAG_SYN_ACK => Ok(FrameBody::SynAck),
            TAG_FIN => Ok(FrameBody::Fin),
            TAG_FIN_ACK => Ok(FrameBody::FinAck),
            TAG_DATA => {
                let seq = SequenceNumber::decode(reader)?;
                let payload = reader.read_rest().to_vec();
                Ok(FrameBody::Data { seq, payload })
            }
            TAG_DATA_ACK => Ok(FrameBody::DataAck {
                seq: SequenceNumber::decode(reader)?,
            }),
            _ => Err(WireError::UnknownTag { kind: "trusted frame", tag }),
        }
    }
}

/// Addressing context mixed into every checksum but never transmitted.
///
/// Both peers derive it from the connection they hold, with source and
/// destination swapped, so the fields also bind a frame to the direction
/// it was sent in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PseudoHeader {
    pub source: NodeId,
    pub destination: NodeId,
    pub source_port: PortId,
    pub destination_port: PortId,
}

impl PseudoHeader {
    /// The pseudo-header as seen from the other end of the connection.
    #[must_use]
    pub fn flipped(&self) -> PseudoHeader {
        PseudoHeader {
            source: self.destination,
            destination: self.source,
            source_port: self.destination_port,
            destination_port: self.source_port,
        }
    }

    /// Checksum input bytes for a frame of `frame_len` total bytes.
    fn checksum_bytes(&self, frame_len: usize) -> Vec<u8> {
        let mut writer = WireWriter::new();
        write_padded_node_id(&mut writer, self.source);
        write_padded_node_id(&mut writer, self.destination);
        self.source_port.encode(&mut writer);
        self.destination_port.encode(&mut writer);
        writer.write_u16(frame_len as u16);
        writer.into_vec()
    }
}

fn write_padded_node_id(writer: &mut WireWriter, id: NodeId) {
    let bytes = id.encode_to_vec();
    writer.write_bytes(&bytes);
    for _ in bytes.len()..PSEUDO_NODE_ID_WIDTH {
        writer.write_u8(0);
    }
}

/// The checksum envelope around a [`FrameBody`].
pub struct TrustedFrame;

impl TrustedFrame {
    /// Serialize `body` with its checksum computed over `pseudo`.
    ///
    /// The checksum field itself is summed as zero and then stored
    /// big-endian, high byte first, so verification of the full buffer
    /// folds to all-ones.
    #[must_use]
    pub fn seal(body: &FrameBody, pseudo: &PseudoHeader) -> Vec<u8> {
        let body_bytes = body.encode_to_vec();
        let frame_len = body_bytes.len() + 2;
        let pseudo_bytes = pseudo.checksum_bytes(frame_len);
        let stored = checksum::compute(&[&pseudo_bytes, &[0, 0], &body_bytes]);

        let mut frame = Vec::with_capacity(frame_len);
        frame.extend_from_slice(&stored.to_be_bytes());
        frame.extend_from_slice(&body_bytes);
        frame
    }

    /// Verify and decode a received frame against `pseudo`.
    pub fn open(bytes: &[u8], pseudo: &PseudoHeader) -> Result<FrameBody, FrameError> {
        if bytes.len() < 2 {
            return Err(FrameError::Wire(WireError::UnexpectedEnd {
                needed: 2 - bytes.len(),
            }));
        }
        let pseudo_bytes = pseudo.checksum_bytes(bytes.len());
        if !checksum::verify(&[&pseudo_bytes, bytes]) {
            return Err(FrameError::Checksum);
        }
        Ok(FrameBody::decode_exact(&bytes[2..])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pseudo() -> PseudoHeader {
        PseudoHeader {
            source: NodeId::Serial(1),
            destination: NodeId::Serial(2),
            source_port: PortId::new(40),
            destination_port: PortId::new(80),
        }
    }

    #[test]
    fn seals_and_opens_every_kind() {
        let bodies = [
            FrameBody::Syn,
            FrameBody::SynAck,
            FrameBody::Fin,
            FrameBody::FinAck,
            FrameBody::Data {
                seq: SequenceNumber::new(7),
                payload: b"hello".to_vec(),
            },
            FrameBody::DataAck { seq: SequenceNumber::new(7) },
        ];
        for body in bodies {
            let bytes = TrustedFrame::seal(&body, &pseudo());
            assert_eq!(TrustedFrame::open(&bytes, &pseudo()), Ok(body));
        }
    }

    #[test]
    fn data_frame_wire_layout() {
        let body = FrameBody::Data {
            seq: SequenceNumber::new(7),
            payload: b"hi".to_vec(),
        };
        // tag, little-endian sequence number, raw payload
        assert_eq!(hex::encode(body.encode_to_vec()), "0507006869");
    }

    #[test]
    fn corrupted_payload_fails_the_checksum() {
        let body = FrameBody::Data {
            seq: SequenceNumber::new(1),
            payload: vec![1, 2, 3],
        };
        let mut bytes = TrustedFrame::seal(&body, &pseudo());
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        assert_eq!(
            TrustedFrame::open(&bytes, &pseudo()),
            Err(FrameError::Checksum)
        );
    }

    #[test]
    fn frame_is_bound_to_its_direction() {
        let bytes = TrustedFrame::seal(&FrameBody::Syn, &pseudo());
        assert_eq!(
            TrustedFrame::open(&bytes, &pseudo().flipped()),
            Err(FrameError::Checksum)
        );
    }

    #[test]
    fn receiver_verifies_with_flipped_sender_view() {
        // What the sender seals under its view, the receiver opens under
        // the same view (source = sender), reconstructed by flipping its
        // own connection addressing twice.
        let sender_view = pseudo();
        let receiver_view = sender_view.flipped();
        let bytes = TrustedFrame::seal(&FrameBody::SynAck, &sender_view);
        assert_eq!(
            TrustedFrame::open(&bytes, &receiver_view.flipped()),
            Ok(FrameBody::SynAck)
        );
    }

    #[test]
    fn odd_length_data_frames_verify() {
        let body = FrameBody::Data {
            seq: SequenceNumber::new(9),
            payload: vec![0xaa, 0xbb, 0xcc, 0xdd],
        };
        let bytes = TrustedFrame::seal(&body, &pseudo());
        assert_eq!(bytes.len() % 2, 1);
        assert_eq!(TrustedFrame::open(&bytes, &pseudo()), Ok(body));
    }

    #[test]
    fn truncated_frame_is_malformed_not_a_checksum_error() {
        assert_eq!(
            TrustedFrame::open(&[0x12], &pseudo()),
            Err(FrameError::Wire(WireError::UnexpectedEnd { needed: 1 }))
        );
    }
}
