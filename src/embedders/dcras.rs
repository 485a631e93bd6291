//! Relative embedding across the four 8x8 DCT sub-blocks of a 16x16 block.
//!
//! One sub-block holds the reference coefficient. Its value compared with the
//! mean of the same coefficient in the other three sub-blocks gives the bit.
//! Embedding moves the reference at least `max(0.8 * Q, 5)` away from the mean
//! of the pre-quantised others, so the comparison survives a JPEG save at the
//! target quality.

use ndarray::Array2;

use super::{DctReference, Embedder, expect_len};
use crate::dct::{self, BLOCK_SIZE};
use crate::error::Result;
use crate::utils::convert::PixelTranslator;
use crate::utils::quantizer;
use crate::wavelet::{self, Wavelet};

const QUAD_SIDE: usize = 16;
const QUAD_PIXELS: usize = QUAD_SIDE * QUAD_SIDE;
const SUB_BLOCKS: usize = 4;

/// Minimum distance to the mean, relative to the quantisation step.
const REL_DIST: f64 = 0.8;
const MIN_DIST: f64 = 5.0;

const MARK_FLIP: u32 = 0xFFFF_0000;
const MARK_KEEP: u32 = 0xFF00_FF00;

/// Which sub-block carries the reference coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubBlockChoice {
    /// Always the top-left sub-block.
    #[default]
    First,
    /// The sub-block with the most wavelet detail energy over its
    /// pre-quantised DCT coefficients.
    MaxDetail(Wavelet),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DcrasEmbedder {
    reference: DctReference,
    choice: SubBlockChoice,
}

/// The four sub-blocks of one cover element in the DCT domain.
struct QuadCoefficients {
    translators: Vec<PixelTranslator>,
    coefficients: Vec<Array2<f64>>,
    chosen: usize,
}

impl QuadCoefficients {
    fn reference(&self, at: &DctReference) -> f64 {
        self.coefficients[self.chosen][[at.y, at.x]]
    }

    fn others(&self, at: &DctReference) -> Vec<f64> {
        self.coefficients
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != self.chosen)
            .map(|(_, c)| c[[at.y, at.x]])
            .collect()
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Splits a flat 16x16 block into its four 8x8 sub-blocks:
/// 0 top-left, 1 top-right, 2 bottom-left, 3 bottom-right.
pub fn split_quad(quad: &[u32]) -> [Vec<u32>; SUB_BLOCKS] {
    let mut parts: [Vec<u32>; SUB_BLOCKS] = Default::default();
    for (row, line) in quad.chunks_exact(QUAD_SIDE).enumerate() {
        let upper = if row < BLOCK_SIZE { 0 } else { 2 };
        parts[upper].extend_from_slice(&line[..BLOCK_SIZE]);
        parts[upper + 1].extend_from_slice(&line[BLOCK_SIZE..]);
    }
    parts
}

/// Inverse of [`split_quad`].
pub fn combine_quad(parts: &[Vec<u32>]) -> Vec<u32> {
    let mut quad = Vec::with_capacity(QUAD_PIXELS);
    for row in 0..QUAD_SIDE {
        let upper = if row < BLOCK_SIZE { 0 } else { 2 };
        let offset = (row % BLOCK_SIZE) * BLOCK_SIZE;
        quad.extend_from_slice(&parts[upper][offset..offset + BLOCK_SIZE]);
        quad.extend_from_slice(&parts[upper + 1][offset..offset + BLOCK_SIZE]);
    }
    quad
}

impl DcrasEmbedder {
    /// Creates an embedder comparing one DCT coefficient across the four 8x8
    /// sub-blocks of a 16x16 block.
    ///
    /// # Arguments
    /// * `qf` - JPEG quality factor in `(0, 1]` the bit must survive
    /// * `ref_x`, `ref_y` - Compared coefficient, inside the 8x8 grid
    ///
    pub fn new(qf: f32, ref_x: usize, ref_y: usize) -> Result<Self> {
        Ok(Self {
            reference: DctReference::new(qf, ref_x, ref_y)?,
            choice: SubBlockChoice::First,
        })
    }

    /// Embeds into coefficient (4, 0).
    pub fn with_quality(qf: f32) -> Result<Self> {
        Self::new(qf, 4, 0)
    }

    pub fn with_choice(mut self, choice: SubBlockChoice) -> Self {
        self.choice = choice;
        self
    }

    fn analyse(&self, quad: &[u32]) -> Result<QuadCoefficients> {
        expect_len(quad, QUAD_PIXELS)?;
        let mut translators = Vec::with_capacity(SUB_BLOCKS);
        let mut coefficients = Vec::with_capacity(SUB_BLOCKS);
        for part in split_quad(quad) {
            let translator = PixelTranslator::new(&part, BLOCK_SIZE)?;
            coefficients.push(dct::forward(&translator.matrix())?);
            translators.push(translator);
        }
        let chosen = self.pick_sub_block(&coefficients)?;
        Ok(QuadCoefficients {
            translators,
            coefficients,
            chosen,
        })
    }

    fn pick_sub_block(&self, coefficients: &[Array2<f64>]) -> Result<usize> {
        match self.choice {
            SubBlockChoice::First => Ok(0),
            SubBlockChoice::MaxDetail(wavelet) => {
                let mut best = (0, f64::MIN);
                for (i, c) in coefficients.iter().enumerate() {
                    let energy = wavelet::detail_sum(&quantizer::prequantize(c, self.reference.qf), wavelet)?;
                    if energy > best.1 {
                        best = (i, energy);
                    }
                }
                Ok(best.0)
            }
        }
    }

    /// Target value for the reference coefficient.
    fn embed_value(&self, reference: f64, others: &[f64], one: bool) -> f64 {
        let step = self.reference.step();
        let prequantized: Vec<f64> = others
            .iter()
            .map(|&v| quantizer::prequantize_value(v, step))
            .collect();
        let mu = mean(&prequantized);
        let distance = (REL_DIST * step).max(MIN_DIST);
        if one {
            reference.max(mu + distance)
        } else {
            reference.min(mu - distance)
        }
    }

    fn write(&self, mut quad: QuadCoefficients, one: bool) -> Result<Vec<u32>> {
        let at = self.reference;
        let value = self.embed_value(quad.reference(&at), &quad.others(&at), one);
        quad.coefficients[quad.chosen][[at.y, at.x]] = value;

        let mut parts = Vec::with_capacity(SUB_BLOCKS);
        for (mut translator, coefficients) in quad.translators.into_iter().zip(&quad.coefficients) {
            translator.set_matrix(&dct::inverse(coefficients)?)?;
            parts.push(translator.to_argb());
        }
        Ok(combine_quad(&parts))
    }

    fn bit(&self, quad: &QuadCoefficients) -> bool {
        quad.reference(&self.reference) > mean(&quad.others(&self.reference))
    }
}

impl Embedder<Vec<u32>> for DcrasEmbedder {
    fn embed(&self, quad: &Vec<u32>, one: bool) -> Result<Vec<u32>> {
        let analysed = self.analyse(quad)?;
        self.write(analysed, one)
    }

    fn flip(&self, quad: &Vec<u32>) -> Result<Vec<u32>> {
        let analysed = self.analyse(quad)?;
        let one = self.bit(&analysed);
        self.write(analysed, !one)
    }

    fn represents_one(&self, quad: &Vec<u32>) -> Result<bool> {
        Ok(self.bit(&self.analyse(quad)?))
    }
}

/// Debug embedder: instead of hiding anything it frames each visited 16x16
/// block in red when its bit would have to change and in green otherwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkingDcras {
    inner: DcrasEmbedder,
}

impl MarkingDcras {
    pub fn new(inner: DcrasEmbedder) -> Self {
        Self { inner }
    }
}

fn mark(quad: &[u32], color: u32) -> Vec<u32> {
    let mut marked = quad.to_vec();
    for i in 0..QUAD_SIDE {
        marked[i] = color;
        marked[QUAD_PIXELS - 1 - i] = color;
        marked[i * QUAD_SIDE] = color;
        marked[i * QUAD_SIDE + QUAD_SIDE - 1] = color;
    }
    marked
}

impl Embedder<Vec<u32>> for MarkingDcras {
    fn embed(&self, quad: &Vec<u32>, one: bool) -> Result<Vec<u32>> {
        let color = if self.inner.represents_one(quad)? != one {
            MARK_FLIP
        } else {
            MARK_KEEP
        };
        Ok(mark(quad, color))
    }

    fn flip(&self, quad: &Vec<u32>) -> Result<Vec<u32>> {
        expect_len(quad, QUAD_PIXELS)?;
        Ok(mark(quad, MARK_FLIP))
    }

    fn represents_one(&self, quad: &Vec<u32>) -> Result<bool> {
        self.inner.represents_one(quad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedders::tests::{create_test_block, recompress};
    use crate::error::StegError;

    #[test]
    fn test_split_combine_bijection() {
        let quad: Vec<u32> = (0..256).collect();
        let parts = split_quad(&quad);
        // top-right sub-block starts at column 8 of row 0
        assert_eq!(parts[1][0], 8);
        // bottom-left sub-block starts at row 8
        assert_eq!(parts[2][0], 128);
        assert_eq!(parts[3][63], 255);
        assert!(parts.iter().all(|p| p.len() == 64));
        assert_eq!(combine_quad(&parts), quad);
    }

    #[test]
    fn test_embed_and_read_roundtrip() {
        for (qf, x, y) in [(0.65, 3, 2), (0.85, 4, 0), (0.5, 1, 1)] {
            let embedder = DcrasEmbedder::new(qf, x, y).unwrap();
            for seed in 0..5 {
                let quad = create_test_block(16, seed);
                for bit in [false, true] {
                    let stego = embedder.embed(&quad, bit).unwrap();
                    assert_eq!(embedder.represents_one(&stego).unwrap(), bit, "qf {qf} seed {seed}");
                }
                let flipped = embedder.flip(&quad).unwrap();
                assert_ne!(
                    embedder.represents_one(&flipped).unwrap(),
                    embedder.represents_one(&quad).unwrap()
                );
            }
        }
    }

    #[test]
    fn test_bit_survives_recompression() {
        let embedder = DcrasEmbedder::new(0.65, 3, 2).unwrap();
        for seed in 0..5 {
            let quad = create_test_block(16, seed);
            for bit in [false, true] {
                let stego = embedder.embed(&quad, bit).unwrap();
                let compressed = recompress(&stego, 16, 0.65);
                assert_eq!(embedder.represents_one(&compressed).unwrap(), bit, "seed {seed}");
            }
        }
    }

    #[test]
    fn test_embed_is_deterministic() {
        let embedder = DcrasEmbedder::with_quality(0.65).unwrap();
        let quad = create_test_block(16, 8);
        assert_eq!(embedder.embed(&quad, false).unwrap(), embedder.embed(&quad, false).unwrap());
    }

    #[test]
    fn test_max_detail_picks_textured_sub_block() {
        let flat = 0xFF80_8080u32;
        let mut quad = vec![flat; 256];
        // checkerboard in the bottom-right sub-block only
        for row in 8..16 {
            for col in 8..16 {
                if (row + col) % 2 == 0 {
                    quad[row * 16 + col] = 0xFFC8_C8C8;
                } else {
                    quad[row * 16 + col] = 0xFF38_3838;
                }
            }
        }
        let embedder = DcrasEmbedder::with_quality(0.65)
            .unwrap()
            .with_choice(SubBlockChoice::MaxDetail(Wavelet::Daubechies8));
        let analysed = embedder.analyse(&quad).unwrap();
        assert_eq!(analysed.chosen, 3);
    }

    #[test]
    fn test_marking_draws_border() {
        let marking = MarkingDcras::new(DcrasEmbedder::with_quality(0.85).unwrap());
        let quad = create_test_block(16, 1);
        let flipped = marking.flip(&quad).unwrap();
        for i in 0..16 {
            assert_eq!(flipped[i], MARK_FLIP);
            assert_eq!(flipped[i * 16], MARK_FLIP);
            assert_eq!(flipped[i * 16 + 15], MARK_FLIP);
            assert_eq!(flipped[240 + i], MARK_FLIP);
        }
        assert_eq!(flipped[17], quad[17], "interior stays untouched");

        let current = marking.represents_one(&quad).unwrap();
        assert_eq!(marking.embed(&quad, current).unwrap()[0], MARK_KEEP);
        assert_eq!(marking.embed(&quad, !current).unwrap()[0], MARK_FLIP);
    }

    #[test]
    fn test_invalid_input() {
        let embedder = DcrasEmbedder::with_quality(0.65).unwrap();
        for len in [0, 64, 255] {
            let quad = vec![0xFF80_8080; len];
            assert!(matches!(embedder.embed(&quad, true), Err(StegError::EmbedderInput(_))));
            assert!(matches!(embedder.flip(&quad), Err(StegError::EmbedderInput(_))));
        }
    }
}
