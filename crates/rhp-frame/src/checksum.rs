//! 16-bit one's-complement checksum over little-endian words.
//!
//! Bytes `2i` and `2i + 1` form the low and high halves of word `i`. Words are
//! summed with end-around carry. The checksum stored in a frame is the
//! complement of that sum, so summing a whole frame, checksum included, yields
//! `0xFFFF`.
//!
//! A single flipped bit almost always breaks the self-check, but distinct
//! frames can collide (for instance `0x0000` and `0xFFFF` words are
//! interchangeable). Checksums only detect accidental corruption.

/// One's-complement sum of `bytes` taken as little-endian 16-bit words.
///
/// An odd trailing byte is ignored; frame encoders pad to even length before
/// summing.
pub fn word_sum(bytes: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    for pair in bytes.chunks_exact(2) {
        sum += u32::from(u16::from_le_bytes([pair[0], pair[1]]));
        if sum > 0xFFFF {
            sum = (sum + 1) & 0xFFFF;
        }
    }
    sum as u16
}

/// Checksum to append to `data`: the complement of its word sum.
pub fn compute_checksum(data: &[u8]) -> u16 {
    !word_sum(data)
}

/// Returns true if `frame`, trailing checksum included, sums to `0xFFFF`.
pub fn verify_checksum(frame: &[u8]) -> bool {
    word_sum(frame) == 0xFFFF
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn with_checksum(data: &[u8]) -> Vec<u8> {
        let mut out = data.to_vec();
        out.extend_from_slice(&compute_checksum(data).to_le_bytes());
        out
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(word_sum(&[]), 0);
        assert_eq!(compute_checksum(&[]), 0xFFFF);
        assert!(!verify_checksum(&[]));
    }

    #[test]
    fn test_words_are_little_endian() {
        assert_eq!(word_sum(&[0x34, 0x12]), 0x1234);
        assert_eq!(word_sum(&[0x01, 0x00, 0x00, 0x01]), 0x0101);
    }

    #[test]
    fn test_end_around_carry() {
        // 0xFFFF + 0x0002 = 0x1_0001, folded to 0x0002.
        assert_eq!(word_sum(&[0xFF, 0xFF, 0x02, 0x00]), 0x0002);
        assert_eq!(word_sum(&[0xFF, 0xFF, 0xFF, 0xFF]), 0xFFFF);
    }

    #[test]
    fn test_odd_trailing_byte_ignored() {
        assert_eq!(word_sum(&[0x05, 0x02, 0x7F]), word_sum(&[0x05, 0x02]));
    }

    #[test]
    fn test_known_frame_checksum() {
        let header_and_payload = [0x05, 0x02, 0x02, 0x02, 0x03, 0x00, 0x69, 0x68];
        assert_eq!(compute_checksum(&header_and_payload), 0x938C);
        assert!(verify_checksum(&with_checksum(&header_and_payload)));
    }

    #[test]
    fn test_zero_and_ones_words_collide() {
        let a = with_checksum(&[0x00, 0x00, 0x10, 0x20]);
        let mut b = a.clone();
        b[0] = 0xFF;
        b[1] = 0xFF;
        assert!(verify_checksum(&a));
        assert!(verify_checksum(&b));
    }

    fn even_bytes() -> impl Strategy<Value = Vec<u8>> {
        (0usize..128).prop_flat_map(|words| prop::collection::vec(any::<u8>(), words * 2))
    }

    proptest! {
        #[test]
        fn test_prop_checksum_self_consistent(data in even_bytes()) {
            prop_assert!(verify_checksum(&with_checksum(&data)));
        }

        /// One flipped bit moves the sum by a power of two, which is never
        /// congruent to zero mod 0xFFFF. Collisions need wider damage, see
        /// `test_zero_and_ones_words_collide`.
        #[test]
        fn test_prop_single_bit_flip_detected(
            data in even_bytes(),
            bit in any::<prop::sample::Index>(),
        ) {
            let mut frame = with_checksum(&data);
            let bit = bit.index(frame.len() * 8);
            frame[bit / 8] ^= 1 << (bit % 8);

            prop_assert!(!verify_checksum(&frame));
        }
    }
}
