//! Spatial embedders working on single ARGB pixels.

use std::cell::RefCell;

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use super::Embedder;
use crate::error::Result;
use crate::utils::locations::seeded_rng;

/// Hides a bit in the parity of the four channel LSBs.
///
/// `flip` nudges one randomly chosen colour channel by one, so which pixel
/// value results is random while the represented bit is not.
#[derive(Debug)]
pub struct PixelParity {
    rng: RefCell<ChaCha8Rng>,
}

impl PixelParity {
    /// Seeds the channel choice from the thread-local generator.
    pub fn new() -> Self {
        Self::with_seed(rand::rng().random())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: RefCell::new(seeded_rng(seed)),
        }
    }
}

impl Default for PixelParity {
    fn default() -> Self {
        Self::new()
    }
}

impl Embedder<u32> for PixelParity {
    fn embed(&self, pixel: &u32, one: bool) -> Result<u32> {
        if self.represents_one(pixel)? == one {
            Ok(*pixel)
        } else {
            self.flip(pixel)
        }
    }

    fn flip(&self, pixel: &u32) -> Result<u32> {
        let mut rng = self.rng.borrow_mut();
        // blue, green or red
        let shift = rng.random_range(0..3u32) * 8;
        let channel = (*pixel >> shift) & 0xFF;
        let channel = match channel {
            0xFF => channel - 1,
            0x00 => channel + 1,
            _ if rng.random::<bool>() => channel + 1,
            _ => channel - 1,
        };
        Ok((*pixel & !(0xFF << shift)) | (channel << shift))
    }

    fn represents_one(&self, pixel: &u32) -> Result<bool> {
        Ok((pixel ^ (pixel >> 8) ^ (pixel >> 16) ^ (pixel >> 24)) & 1 == 1)
    }
}

/// Plain least-significant-bit replacement on the blue channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct LsbReplacer;

impl Embedder<u32> for LsbReplacer {
    fn embed(&self, pixel: &u32, one: bool) -> Result<u32> {
        Ok((*pixel & !1) | u32::from(one))
    }

    fn flip(&self, pixel: &u32) -> Result<u32> {
        Ok(*pixel ^ 1)
    }

    fn represents_one(&self, pixel: &u32) -> Result<bool> {
        Ok(*pixel & 1 == 1)
    }
}
