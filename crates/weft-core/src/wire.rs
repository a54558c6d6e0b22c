//! Minimal wire codec: fixed-width little-endian integers, 1-byte variant
//! tags, length-free bodies.
//!
//! Both ends of every link run the same build, so the format only needs to
//! be self-consistent. Decoders must treat any malformed input as a normal
//! condition and surface it as a [`WireError`] for the caller to drop.

use thiserror::Error;

/// Errors produced while decoding wire bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// The input ended before a field could be read.
    #[error("unexpected end of input ({needed} more bytes needed)")]
    UnexpectedEnd { needed: usize },

    /// A variant tag byte did not match any known variant.
    #[error("unknown {kind} tag {tag:#04x}")]
    UnknownTag { kind: &'static str, tag: u8 },

    /// Decoding finished with bytes left over.
    #[error("{remaining} trailing bytes after decode")]
    TrailingBytes { remaining: usize },
}

/// Cursor over a received byte slice.
#[derive(Debug)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn read_u8(&mut self) -> Result<u8, WireError> {
        let bytes = self.read_bytes(1)?;
        Ok(bytes[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, WireError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        if self.remaining() < len {
            return Err(WireError::UnexpectedEnd {
                needed: len - self.remaining(),
            });
        }
        let out = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    /// Consume and return everything left in the buffer.
    pub fn read_rest(&mut self) -> &'a [u8] {
        let out = &self.buf[self.pos..];
        self.pos = self.buf.len();
        out
    }

    /// Assert the input was fully consumed.
    pub fn finish(self) -> Result<(), WireError> {
        if self.remaining() != 0 {
            return Err(WireError::TrailingBytes {
                remaining: self.remaining(),
            });
        }
        Ok(())
    }
}

/// Append-only encode buffer.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

/// Types that can serialize themselves onto the wire.
pub trait Encode {
    fn encode(&self, writer: &mut WireWriter);

    fn encode_to_vec(&self) -> Vec<u8> {
        let mut writer = WireWriter::new();
        self.encode(&mut writer);
        writer.into_vec()
    }
}

/// Types that can deserialize themselves from the wire.
pub trait Decode: Sized {
    fn decode(reader: &mut WireReader<'_>) -> Result<Self, WireError>;

    /// Decode from a complete buffer, rejecting trailing bytes.
    fn decode_exact(bytes: &[u8]) -> Result<Self, WireError> {
        let mut reader = WireReader::new(bytes);
        let value = Self::decode(&mut reader)?;
        reader.finish()?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn read_past_end_reports_shortfall() {
        let mut reader = WireReader::new(&[0xaa]);
        assert_eq!(reader.read_u8(), Ok(0xaa));
        assert_eq!(
            reader.read_u16(),
            Err(WireError::UnexpectedEnd { needed: 2 })
        );
    }

    #[test]
    fn u16_is_little_endian() {
        let mut writer = WireWriter::new();
        writer.write_u16(0x1234);
        assert_eq!(writer.into_vec(), vec![0x34, 0x12]);

        let mut reader = WireReader::new(&[0x34, 0x12]);
        assert_eq!(reader.read_u16(), Ok(0x1234));
    }

    #[test]
    fn finish_rejects_trailing_bytes() {
        let mut reader = WireReader::new(&[1, 2, 3]);
        let _ = reader.read_u8();
        assert_eq!(
            reader.finish(),
            Err(WireError::TrailingBytes { remaining: 2 })
        );
    }

    #[test]
    fn read_rest_drains_buffer() {
        let mut reader = WireReader::new(&[1, 2, 3]);
        let _ = reader.read_u8();
        assert_eq!(reader.read_rest(), &[2, 3]);
        assert_eq!(reader.remaining(), 0);
    }

    proptest! {
        #[test]
        fn writer_and_reader_agree(
            byte: u8,
            word: u16,
            tail in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            let mut writer = WireWriter::new();
            writer.write_u8(byte);
            writer.write_u16(word);
            writer.write_bytes(&tail);
            let bytes = writer.into_vec();

            let mut reader = WireReader::new(&bytes);
            prop_assert_eq!(reader.read_u8(), Ok(byte));
            prop_assert_eq!(reader.read_u16(), Ok(word));
            prop_assert_eq!(reader.read_rest(), tail.as_slice());
            prop_assert_eq!(reader.finish(), Ok(()));
        }
    }

    #[test]
    fn error_display_strings() {
        assert_eq!(
            WireError::UnexpectedEnd { needed: 4 }.to_string(),
            "unexpected end of input (4 more bytes needed)"
        );
        assert_eq!(
            WireError::UnknownTag { kind: "address", tag: 0x99 }.to_string(),
            "unknown address tag 0x99"
        );
    }
}
