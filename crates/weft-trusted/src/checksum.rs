//! 16-bit one's-complement checksum, the internet-checksum construction.
//!
//! Bytes are paired into big-endian 16-bit words (high byte first), a
//! trailing odd byte is padded with a zero low byte, carries out of the
//! 16-bit sum are folded back in, and the stored value is the one's
//! complement of the folded sum. A buffer that includes a correctly stored
//! checksum folds to `0xFFFF`.

/// Streaming accumulator so the pseudo-header and frame bytes can be
/// summed without concatenating them.
#[derive(Debug, Default)]
pub struct ChecksumAccumulator {
    sum: u32,
    pending_high: Option<u8>,
}

impl ChecksumAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            match self.pending_high.take() {
                Some(high) => self.sum += u32::from(u16::from_be_bytes([high, byte])),
                None => self.pending_high = Some(byte),
            }
        }
    }

    /// The folded 16-bit sum.
    #[must_use]
    pub fn fold(mut self) -> u16 {
        if let Some(high) = self.pending_high.take() {
            // Odd trailing byte: pad with a zero low byte.
            self.sum += u32::from(u16::from_be_bytes([high, 0]));
        }
        let mut sum = self.sum;
        while sum > 0xffff {
            sum = (sum & 0xffff) + (sum >> 16);
        }
        sum as u16
    }
}

/// Compute the checksum to store for the given parts (which must contain
/// a zeroed checksum field, or none at all).
#[must_use]
pub fn compute(parts: &[&[u8]]) -> u16 {
    let mut acc = ChecksumAccumulator::new();
    for part in parts {
        acc.push(part);
    }
    !acc.fold()
}

/// Verify parts that include the stored checksum field.
#[must_use]
pub fn verify(parts: &[&[u8]]) -> bool {
    let mut acc = ChecksumAccumulator::new();
    for part in parts {
        acc.push(part);
    }
    acc.fold() == 0xffff
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn known_vector() {
        // Classic IP-header example: words 4500 0073 0000 4000 4011 0000
        // c0a8 0001 c0a8 00c7 checksum to b861.
        let header = [
            0x45, 0x00, 0x00, 0x73, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11, 0x00, 0x00,
            0xc0, 0xa8, 0x00, 0x01, 0xc0, 0xa8, 0x00, 0xc7,
        ];
        assert_eq!(compute(&[&header]), 0xb861);

        let mut with_checksum = header;
        with_checksum[10..12].copy_from_slice(&0xb861u16.to_be_bytes());
        assert!(verify(&[&with_checksum]));
    }

    #[test]
    fn odd_length_pads_with_zero_low_byte() {
        assert_eq!(compute(&[&[0xab]]), compute(&[&[0xab, 0x00]]));
    }

    #[test]
    fn split_parts_sum_like_contiguous_bytes() {
        let bytes = [1, 2, 3, 4, 5, 6];
        assert_eq!(compute(&[&bytes]), compute(&[&bytes[..3], &bytes[3..]]));
    }

    proptest! {
        #[test]
        fn round_trips_for_any_payload(payload in proptest::collection::vec(any::<u8>(), 0..256)) {
            let stored = compute(&[&payload]);
            prop_assert!(verify(&[&payload, &stored.to_be_bytes()]));
        }

        #[test]
        fn single_bit_flip_is_detected(
            payload in proptest::collection::vec(any::<u8>(), 1..128),
            bit in 0usize..8,
            index_seed: usize,
        ) {
            let stored = compute(&[&payload]);
            let mut buffer = payload.clone();
            buffer.extend_from_slice(&stored.to_be_bytes());

            let index = index_seed % buffer.len();
            buffer[index] ^= 1 << bit;

            // One's-complement has a single collision pair (0x0000 and
            // 0xFFFF words); a one-bit flip cannot produce it, so every
            // flip must be caught.
            prop_assert!(!verify(&[&buffer]));
        }
    }
}
