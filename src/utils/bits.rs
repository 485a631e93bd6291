//! Explicit-length bit strings shared by the payload encoders.
//!
//! Bits are taken LSB-first within each byte. Every vector carries its own
//! length, so trailing zero bits are never lost.

use bitvec::prelude::*;

/// Message and cover bits, one per cover element.
pub type BitString = BitVec<u8, Lsb0>;

/// Bits of `payload`, bit `i` being `(payload[i / 8] >> (i % 8)) & 1`.
pub fn payload_bits(payload: &[u8]) -> BitString {
    BitString::from_slice(payload)
}

/// Packs `bits` into exactly `length` bytes, zero-filling whatever `bits`
/// does not cover.
pub fn payload_bytes(bits: &BitSlice<u8, Lsb0>, length: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; length];
    for i in bits.iter_ones().take_while(|&i| i < length * 8) {
        bytes[i / 8] |= 1 << (i % 8);
    }
    bytes
}

/// Parity of the AND of two equally long windows.
pub fn and_parity(a: &BitSlice<u8, Lsb0>, b: &BitSlice<u8, Lsb0>) -> bool {
    a.iter_ones().filter(|&i| i < b.len() && b[i]).count() % 2 == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_order_is_lsb_first() {
        let bits = payload_bits(&[0b0000_0101, 0x80]);
        assert_eq!(bits.len(), 16);
        assert!(bits[0]);
        assert!(!bits[1]);
        assert!(bits[2]);
        assert!(bits[15]);
    }

    #[test]
    fn test_trailing_zero_bytes_survive() {
        let payload = [0xAB, 0x00, 0x00];
        let bits = payload_bits(&payload);
        assert_eq!(payload_bytes(&bits, payload.len()), payload.to_vec());
    }

    #[test]
    fn test_short_bits_are_zero_filled() {
        let mut bits = BitString::new();
        bits.push(true);
        assert_eq!(payload_bytes(&bits, 2), vec![1, 0]);
        assert_eq!(payload_bytes(&payload_bits(&[0xFF, 0xFF]), 1), vec![0xFF]);
    }

    #[test]
    fn test_and_parity() {
        let a = bitvec![u8, Lsb0; 1, 1, 0, 1];
        let b = bitvec![u8, Lsb0; 1, 0, 1, 1];
        assert!(!and_parity(&a, &b));
        let c = bitvec![u8, Lsb0; 1, 0, 0, 0];
        assert!(and_parity(&a, &c));
    }
}
