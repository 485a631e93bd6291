//! One payload bit per cover element, written in traversal order.

use tracing::debug;

use super::{Encoder, SequenceCursor, check_capacity};
use crate::embedders::Embedder;
use crate::error::{Result, StegError};
use crate::overlay::Overlay;
use crate::utils::bits::{BitString, payload_bits, payload_bytes};

/// How the plain encoder writes a bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlainMode {
    /// Always `embed`, enforcing the embedder's robustness margin.
    #[default]
    Embed,
    /// `flip` only elements that disagree with the bit.
    FlipOnly,
}

pub struct PlainEncoder<O, E> {
    overlay: O,
    embedder: E,
    mode: PlainMode,
    cursor: SequenceCursor,
}

impl<O, E> PlainEncoder<O, E>
where
    O: Overlay,
    E: Embedder<O::Element>,
{
    /// Creates an encoder writing one payload bit into each cover element.
    ///
    /// # Arguments
    /// * `overlay` - Cover elements, in embedding order
    /// * `embedder` - Reads and writes the bit of a single element
    /// * `mode` - Whether every element is written or only the mismatching ones flipped
    /// * `sequential` - Whether each call continues where the previous one stopped
    ///
    pub fn new(overlay: O, embedder: E, mode: PlainMode, sequential: bool) -> Self {
        Self {
            overlay,
            embedder,
            mode,
            cursor: SequenceCursor::new(sequential),
        }
    }

    pub fn into_overlay(self) -> O {
        self.overlay
    }

    fn write_bit(&mut self, position: usize, one: bool) -> Result<()> {
        let element = self.overlay.get(position)?;
        let written = match self.mode {
            PlainMode::Embed => self.embedder.embed(&element, one)?,
            PlainMode::FlipOnly => {
                if self.embedder.represents_one(&element)? == one {
                    return Ok(());
                }
                self.embedder.flip(&element)?
            }
        };
        self.overlay.set(position, written)
    }
}

impl<O, E> Encoder for PlainEncoder<O, E>
where
    O: Overlay,
    E: Embedder<O::Element>,
{
    fn encode(&mut self, payload: &[u8]) -> Result<()> {
        let bits = payload_bits(payload);
        check_capacity(bits.len(), self.available())?;

        let start = self.cursor.position();
        for (i, bit) in bits.iter().by_vals().enumerate() {
            self.write_bit(start + i, bit).map_err(StegError::into_encoder_error)?;
        }
        self.cursor.advance(bits.len());
        debug!(bits = bits.len(), start, mode = ?self.mode, "plain encode");
        Ok(())
    }

    fn decode(&mut self, length: usize) -> Result<Vec<u8>> {
        let units = length * 8;
        check_capacity(units, self.available())?;

        let start = self.cursor.position();
        let mut bits = BitString::with_capacity(units);
        for position in start..start + units {
            let element = self.overlay.get(position)?;
            bits.push(
                self.embedder
                    .represents_one(&element)
                    .map_err(StegError::into_encoder_error)?,
            );
        }
        self.cursor.advance(units);
        Ok(payload_bytes(&bits, length))
    }

    fn available(&self) -> usize {
        self.overlay.available().saturating_sub(self.cursor.position())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoders::tests::{BoolEmbedder, BoolOverlay, RejectingEmbedder, assert_wrapped_embedder_error};

    #[test]
    fn test_roundtrip() {
        let payload = b"plain text";
        let mut encoder = PlainEncoder::new(BoolOverlay::new(vec![false; 100]), BoolEmbedder, PlainMode::Embed, false);
        encoder.encode(payload).unwrap();

        let overlay = encoder.into_overlay();
        let mut decoder = PlainEncoder::new(overlay, BoolEmbedder, PlainMode::Embed, false);
        assert_eq!(decoder.decode(payload.len()).unwrap(), payload.to_vec());
    }

    #[test]
    fn test_flip_only_touches_disagreeing_elements() {
        let overlay = BoolOverlay::new(vec![true; 16]);
        let changes = overlay.changes.clone();
        let mut encoder = PlainEncoder::new(overlay, BoolEmbedder, PlainMode::FlipOnly, false);
        encoder.encode(&[0b1111_0000, 0xFF]).unwrap();
        assert_eq!(changes.get(), 4);
        assert_eq!(encoder.decode(2).unwrap(), vec![0b1111_0000, 0xFF]);
    }

    #[test]
    fn test_inverse_cover_flips_every_bit() {
        let payload = [0x3Cu8, 0xA5, 0x0F];
        let cover: Vec<bool> = payload_bits(&payload).iter().by_vals().map(|b| !b).collect();
        let overlay = BoolOverlay::new(cover);
        let changes = overlay.changes.clone();
        let mut encoder = PlainEncoder::new(overlay, BoolEmbedder, PlainMode::Embed, false);
        encoder.encode(&payload).unwrap();
        assert_eq!(changes.get(), 8 * payload.len());
    }

    #[test]
    fn test_sequential_payloads() {
        let mut encoder = PlainEncoder::new(BoolOverlay::new(vec![false; 64]), BoolEmbedder, PlainMode::Embed, true);
        encoder.encode(b"ab").unwrap();
        assert_eq!(encoder.available(), 48);
        encoder.encode(b"cd").unwrap();

        let overlay = encoder.into_overlay();
        let mut sequential = PlainEncoder::new(overlay.clone(), BoolEmbedder, PlainMode::Embed, true);
        assert_eq!(sequential.decode(2).unwrap(), b"ab".to_vec());
        assert_eq!(sequential.decode(2).unwrap(), b"cd".to_vec());

        // without the cursor both reads start at the first element
        let mut restarting = PlainEncoder::new(overlay, BoolEmbedder, PlainMode::Embed, false);
        let first = restarting.decode(2).unwrap();
        let second = restarting.decode(2).unwrap();
        assert_eq!(first, second);
        assert_ne!(second, b"cd".to_vec());
    }

    #[test]
    fn test_capacity_is_checked() {
        let mut encoder = PlainEncoder::new(BoolOverlay::new(vec![false; 15]), BoolEmbedder, PlainMode::Embed, false);
        assert_eq!(
            encoder.encode(&[1, 2]).unwrap_err(),
            StegError::MediaCapacity {
                required: 16,
                available: 15
            }
        );
        assert!(matches!(encoder.decode(2), Err(StegError::MediaCapacity { .. })));
        assert!(encoder.encode(&[]).is_ok());
        assert_eq!(encoder.decode(0).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_embedder_errors_are_wrapped() {
        let mut encoder = PlainEncoder::new(BoolOverlay::new(vec![false; 16]), RejectingEmbedder, PlainMode::Embed, false);
        assert_wrapped_embedder_error(encoder.encode(&[1]));
        assert_wrapped_embedder_error(encoder.decode(1));
    }
}
