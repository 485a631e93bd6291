//! Bit embedders write one bit into, and read one bit from, a cover element.

use crate::error::{Result, StegError};

pub mod dcras;
pub mod dmas;
pub mod pixel;

pub use dcras::{DcrasEmbedder, MarkingDcras, SubBlockChoice};
pub use dmas::DmasEmbedder;
pub use pixel::{LsbReplacer, PixelParity};

/// Reads and writes single bits in cover elements of type `T`.
///
/// For every element `e` and bit `b`, `represents_one(embed(e, b)) == b`, and
/// `flip` always changes the represented bit.
pub trait Embedder<T> {
    fn embed(&self, element: &T, one: bool) -> Result<T>;
    fn flip(&self, element: &T) -> Result<T>;
    fn represents_one(&self, element: &T) -> Result<bool>;
}

impl<T, E: Embedder<T> + ?Sized> Embedder<T> for Box<E> {
    fn embed(&self, element: &T, one: bool) -> Result<T> {
        (**self).embed(element, one)
    }

    fn flip(&self, element: &T) -> Result<T> {
        (**self).flip(element)
    }

    fn represents_one(&self, element: &T) -> Result<bool> {
        (**self).represents_one(element)
    }
}

/// Coefficient position and target quality shared by the DCT embedders.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DctReference {
    pub x: usize,
    pub y: usize,
    pub qf: f32,
}

impl DctReference {
    pub fn new(qf: f32, x: usize, y: usize) -> Result<Self> {
        if x >= 8 || y >= 8 {
            return Err(StegError::encoder(format!(
                "reference coefficient ({x}, {y}) lies outside the 8x8 block"
            )));
        }
        if !(qf > 0.0 && qf <= 1.0) {
            return Err(StegError::encoder(format!("quality factor {qf} is not in (0, 1]")));
        }
        Ok(Self { x, y, qf })
    }

    /// Quantisation step of the reference coefficient.
    pub fn step(&self) -> f64 {
        crate::utils::quantizer::quantization_value(self.x, self.y, self.qf) as f64
    }
}

/// Rejects elements whose length differs from the embedder's arity.
pub(crate) fn expect_len(element: &[u32], expected: usize) -> Result<()> {
    if element.len() != expected {
        return Err(StegError::EmbedderInput(format!(
            "expected {expected} pixels, got {}",
            element.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use rand::Rng;

    use crate::dct;
    use crate::utils::convert::{PixelTranslator, pack_argb};
    use crate::utils::locations::seeded_rng;
    use crate::utils::quantizer;

    /// A mildly textured, mid-grey block that never clips under JPEG noise.
    pub fn create_test_block(side: usize, seed: u64) -> Vec<u32> {
        let mut rng = seeded_rng(seed);
        (0..side * side)
            .map(|_| {
                let base: i32 = rng.random_range(105..150);
                let mut channel = || (base + rng.random_range(-12..=12)) as u8;
                pack_argb([0xFF, channel(), channel(), channel()])
            })
            .collect()
    }

    /// Simulates a JPEG save at `qf`: every 8x8 tile of the luma plane is
    /// transformed, pre-quantised and transformed back.
    pub fn recompress(block: &[u32], side: usize, qf: f32) -> Vec<u32> {
        let mut out = block.to_vec();
        for tile_y in (0..side).step_by(dct::BLOCK_SIZE) {
            for tile_x in (0..side).step_by(dct::BLOCK_SIZE) {
                let tile: Vec<u32> = (0..dct::BLOCK_SIZE)
                    .flat_map(|row| {
                        let start = (tile_y + row) * side + tile_x;
                        block[start..start + dct::BLOCK_SIZE].to_vec()
                    })
                    .collect();
                let mut translator = PixelTranslator::new(&tile, dct::BLOCK_SIZE).unwrap();
                let coefficients = dct::forward(&translator.matrix()).unwrap();
                let spatial = dct::inverse(&quantizer::prequantize(&coefficients, qf)).unwrap();
                translator.set_matrix(&spatial).unwrap();
                for (i, pixel) in translator.to_argb().into_iter().enumerate() {
                    let (row, col) = (i / dct::BLOCK_SIZE, i % dct::BLOCK_SIZE);
                    out[(tile_y + row) * side + tile_x + col] = pixel;
                }
            }
        }
        out
    }
}
