//! Dither-modulated embedding in one DCT coefficient of an 8x8 block.
//!
//! The reference coefficient is snapped onto a lattice of step `delta`; even
//! lattice points carry a one, odd points a zero. `delta` is never smaller
//! than the JPEG quantisation step at the target quality, so the coefficient
//! lands back on the same lattice point after a JPEG save at that quality.

use ndarray::Array2;

use super::{DctReference, Embedder, expect_len};
use crate::dct;
use crate::error::Result;
use crate::utils::convert::PixelTranslator;

const BLOCK_PIXELS: usize = 64;

/// Smallest lattice step, whatever the quality factor.
const MIN_STEP: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DmasEmbedder {
    reference: DctReference,
}

impl DmasEmbedder {
    /// Creates an embedder that quantises one DCT coefficient of an 8x8 block.
    ///
    /// # Arguments
    /// * `qf` - JPEG quality factor in `(0, 1]` the bit must survive
    /// * `ref_x`, `ref_y` - Coefficient carrying the bit, inside the 8x8 grid
    ///
    /// # Returns
    /// * `Err(StegError::EmbedderInput)` for a quality factor or coefficient out of range
    ///
    pub fn new(qf: f32, ref_x: usize, ref_y: usize) -> Result<Self> {
        Ok(Self {
            reference: DctReference::new(qf, ref_x, ref_y)?,
        })
    }

    /// Embeds into coefficient (4, 0).
    pub fn with_quality(qf: f32) -> Result<Self> {
        Self::new(qf, 4, 0)
    }

    fn delta(&self) -> f64 {
        self.reference.step().max(MIN_STEP)
    }

    fn coefficients(&self, block: &[u32]) -> Result<(PixelTranslator, Array2<f64>)> {
        expect_len(block, BLOCK_PIXELS)?;
        let translator = PixelTranslator::new(block, dct::BLOCK_SIZE)?;
        let coefficients = dct::forward(&translator.matrix())?;
        Ok((translator, coefficients))
    }

    fn write(&self, block: &[u32], one: bool) -> Result<Vec<u32>> {
        let (mut translator, mut coefficients) = self.coefficients(block)?;
        let cell = &mut coefficients[[self.reference.y, self.reference.x]];
        *cell = nearest_lattice_point(*cell, self.delta(), one);
        translator.set_matrix(&dct::inverse(&coefficients)?)?;
        Ok(translator.to_argb())
    }
}

fn is_one(value: f64, delta: f64) -> bool {
    ((value.abs() + delta / 2.0) / delta).floor() as i64 % 2 == 0
}

/// The lattice point `n * delta` closest to `value` whose parity encodes `one`.
fn nearest_lattice_point(value: f64, delta: f64, one: bool) -> f64 {
    let rounded = (value / delta).round() * delta;
    if is_one(rounded, delta) == one {
        rounded
    } else if value > rounded {
        rounded + delta
    } else {
        rounded - delta
    }
}

impl Embedder<Vec<u32>> for DmasEmbedder {
    fn embed(&self, block: &Vec<u32>, one: bool) -> Result<Vec<u32>> {
        self.write(block, one)
    }

    fn flip(&self, block: &Vec<u32>) -> Result<Vec<u32>> {
        let one = self.represents_one(block)?;
        self.write(block, !one)
    }

    fn represents_one(&self, block: &Vec<u32>) -> Result<bool> {
        let (_, coefficients) = self.coefficients(block)?;
        Ok(is_one(
            coefficients[[self.reference.y, self.reference.x]],
            self.delta(),
        ))
    }
}
