//! Reed-Solomon error correction around another encoder.

use tracing::warn;

use super::{Encoder, check_capacity};
use crate::error::{Result, StegError};
use crate::utils::ecc;

pub const DEFAULT_ERROR_RATE: f64 = 0.5;

/// Adds `2 * ceil(L * error_rate)` parity bytes to every `L`-byte payload,
/// enough to repair `ceil(L * error_rate)` damaged bytes.
pub struct ReedSolomon<E> {
    inner: E,
    error_rate: f64,
}

impl<E: Encoder> ReedSolomon<E> {
    /// Wraps `inner` with the default error rate of one half.
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            error_rate: DEFAULT_ERROR_RATE,
        }
    }

    /// Wraps `inner`, repairing up to `ceil(L * error_rate)` bytes of an `L`-byte payload.
    ///
    /// # Returns
    /// * `Err(StegError::EncoderError)` if `error_rate` lies outside `[0, 1]`
    ///
    pub fn with_error_rate(inner: E, error_rate: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&error_rate) {
            return Err(StegError::encoder(format!(
                "error rate {error_rate} must lie between 0 and 1"
            )));
        }
        Ok(Self { inner, error_rate })
    }

    pub fn into_inner(self) -> E {
        self.inner
    }

    fn redundancy(&self, length: usize) -> usize {
        2 * (length as f64 * self.error_rate).ceil() as usize
    }

    fn codeword_len(&self, length: usize) -> usize {
        length + self.redundancy(length)
    }

    /// Longest payload whose codeword fits in `bytes`.
    ///
    /// Codeword length grows strictly with the payload; the loops walk the
    /// `bytes / (1 + 2r)` estimate to the exact bound.
    fn max_payload(&self, bytes: usize) -> usize {
        let mut length = (bytes as f64 / (1.0 + 2.0 * self.error_rate)) as usize;
        while length > 0 && self.codeword_len(length) > bytes {
            length -= 1;
        }
        while self.codeword_len(length + 1) <= bytes {
            length += 1;
        }
        length
    }
}

impl<E: Encoder> Encoder for ReedSolomon<E> {
    fn encode(&mut self, payload: &[u8]) -> Result<()> {
        check_capacity(payload.len() * 8, self.available())?;
        let codeword = ecc::encode(payload, self.redundancy(payload.len()));
        self.inner.encode(&codeword)
    }

    fn decode(&mut self, length: usize) -> Result<Vec<u8>> {
        let redundancy = self.redundancy(length);
        let codeword = self.inner.decode(length + redundancy)?;
        let (payload, corrected) = ecc::decode(&codeword, redundancy)?;
        if corrected > 0 {
            warn!(corrected, length, "repaired damaged payload bytes");
        }
        Ok(payload)
    }

    fn available(&self) -> usize {
        self.available_after(&[])
    }

    fn available_after(&self, written: &[usize]) -> usize {
        let codewords: Vec<usize> = written.iter().map(|&length| self.codeword_len(length)).collect();
        8 * self.max_payload(self.inner.available_after(&codewords) / 8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoders::tests::{BoolEmbedder, BoolOverlay};
    use crate::encoders::{PlainEncoder, PlainMode};

    type Plain = PlainEncoder<BoolOverlay, BoolEmbedder>;

    fn plain(cells: Vec<bool>) -> Plain {
        PlainEncoder::new(BoolOverlay::new(cells), BoolEmbedder, PlainMode::Embed, false)
    }

    fn encoded(payload: &[u8], cells: usize) -> Vec<bool> {
        let mut encoder = ReedSolomon::new(plain(vec![false; cells]));
        encoder.encode(payload).unwrap();
        encoder.into_inner().into_overlay().cells
    }

    fn corrupt_bytes(cells: &mut [bool], bytes: impl IntoIterator<Item = usize>) {
        for byte in bytes {
            cells[byte * 8 + 3] = !cells[byte * 8 + 3];
        }
    }

    #[test]
    fn test_clean_roundtrip() {
        let payload = b"error correction";
        let cells = encoded(payload, 1024);
        let mut decoder = ReedSolomon::new(plain(cells));
        assert_eq!(decoder.decode(payload.len()).unwrap(), payload.to_vec());
    }

    #[test]
    fn test_repairs_up_to_half_the_redundancy() {
        let payload = b"0123456789";
        let mut cells = encoded(payload, 1024);
        // 10 bytes of data carry 10 parity bytes
        corrupt_bytes(&mut cells, [0, 4, 9, 13, 19]);
        let mut decoder = ReedSolomon::new(plain(cells));
        assert_eq!(decoder.decode(payload.len()).unwrap(), payload.to_vec());
    }

    #[test]
    fn test_too_many_errors_are_reported() {
        let payload = b"0123456789";
        let mut cells = encoded(payload, 1024);
        corrupt_bytes(&mut cells, 0..12);
        let mut decoder = ReedSolomon::new(plain(cells));
        assert!(matches!(
            decoder.decode(payload.len()),
            Err(StegError::DamagedMessage(_))
        ));
    }

    #[test]
    fn test_capacity_accounts_for_parity() {
        let encoder = ReedSolomon::new(plain(vec![false; 160]));
        assert_eq!(encoder.available(), 80);
        let mut encoder = ReedSolomon::new(plain(vec![false; 160]));
        assert!(matches!(encoder.encode(&[0; 11]), Err(StegError::MediaCapacity { .. })));

        let lossless = ReedSolomon::with_error_rate(plain(vec![false; 160]), 0.0).unwrap();
        assert_eq!(lossless.available(), 160);
    }

    #[test]
    fn test_capacity_counts_rounded_parity() {
        // 20 bytes of cover: 13 bytes would need 13 + 2 * ceil(3.9) = 21
        let light = ReedSolomon::with_error_rate(plain(vec![false; 160]), 0.3).unwrap();
        assert_eq!(light.available(), 96);

        for rate in [0.1, 0.25, 0.3, 0.5, 0.75, 1.0] {
            let encoder = ReedSolomon::with_error_rate(plain(vec![false; 400]), rate).unwrap();
            let length = encoder.available() / 8;
            assert!(encoder.codeword_len(length) <= 50, "rate {rate}");
            assert!(encoder.codeword_len(length + 1) > 50, "rate {rate}");
        }
    }

    #[test]
    fn test_capacity_after_earlier_payloads() {
        // 40 bytes of cover; an 8-byte header takes 16 of them at rate 0.5
        let encoder = ReedSolomon::new(plain(vec![false; 320]));
        assert_eq!(encoder.available_after(&[8]), 96);

        let light = ReedSolomon::with_error_rate(plain(vec![false; 320]), 0.3).unwrap();
        // header codeword 8 + 6 bytes leaves 26: 16 + 2 * 5 fits, 17 + 2 * 6 does not
        assert_eq!(light.available_after(&[8]), 8 * 16);
    }

    #[test]
    fn test_error_rate_bounds() {
        assert!(ReedSolomon::with_error_rate(plain(vec![]), -0.1).is_err());
        assert!(ReedSolomon::with_error_rate(plain(vec![]), 1.5).is_err());
        assert!(ReedSolomon::with_error_rate(plain(vec![]), 1.0).is_ok());
    }

    #[test]
    fn test_redundancy() {
        let encoder = ReedSolomon::new(plain(vec![]));
        assert_eq!(encoder.redundancy(10), 10);
        assert_eq!(encoder.redundancy(7), 8);
        assert_eq!(encoder.redundancy(0), 0);
        let light = ReedSolomon::with_error_rate(plain(vec![]), 0.1).unwrap();
        assert_eq!(light.redundancy(10), 2);
    }
}
