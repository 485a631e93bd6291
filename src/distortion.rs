//! Additive distortion measures used by the syndrome-trellis encoder.

use crate::error::Result;
use crate::utils::convert::PixelTranslator;
use crate::wavelet::{self, Wavelet};

/// Cost of replacing `original` by `modified`; never negative.
pub trait Distortion<T> {
    fn distortion(&self, original: &T, modified: &T) -> Result<f64>;
}

/// Every change costs the same.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantDistortion(pub f64);

impl Default for ConstantDistortion {
    fn default() -> Self {
        Self(1.0)
    }
}

impl<T> Distortion<T> for ConstantDistortion {
    fn distortion(&self, _original: &T, _modified: &T) -> Result<f64> {
        Ok(self.0)
    }
}

/// Stabilising constant of the relative wavelet distortion.
const SIGMA: f64 = 0.015_625;

/// Universal wavelet relative distortion over square pixel blocks.
///
/// Changes in smooth regions, where wavelet coefficients are small, cost far
/// more than changes of the same size in textured regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JUniward {
    wavelet: Wavelet,
}

impl JUniward {
    /// Relative wavelet cost measured with the given filter bank.
    pub fn new(wavelet: Wavelet) -> Self {
        Self { wavelet }
    }
}

impl Distortion<Vec<u32>> for JUniward {
    fn distortion(&self, original: &Vec<u32>, modified: &Vec<u32>) -> Result<f64> {
        let width = original.len().isqrt();
        let cover = wavelet::forward(&PixelTranslator::new(original, width)?.matrix(), self.wavelet)?;
        let stego = wavelet::forward(&PixelTranslator::new(modified, width)?.matrix(), self.wavelet)?;

        let half = width / 2;
        Ok(cover
            .indexed_iter()
            .zip(stego.iter())
            .filter(|(((y, x), _), _)| *y >= half || *x >= half)
            .map(|((_, wo), we)| (wo - we).abs() / (SIGMA + wo.abs()))
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedders::tests::create_test_block;
    use crate::embedders::{DmasEmbedder, Embedder};

    #[test]
    fn test_constant() {
        let d = ConstantDistortion::default();
        assert_eq!(d.distortion(&1u32, &2u32).unwrap(), 1.0);
        assert_eq!(ConstantDistortion(3.5).distortion(&vec![1u32], &vec![]).unwrap(), 3.5);
    }

    #[test]
    fn test_identical_blocks_cost_nothing() {
        let block = create_test_block(8, 4);
        let d = JUniward::default().distortion(&block, &block).unwrap();
        assert_eq!(d, 0.0);
    }

    #[test]
    fn test_changes_cost_more_in_smooth_blocks() {
        let embedder = DmasEmbedder::new(0.95, 7, 7).unwrap();
        let juniward = JUniward::default();

        let smooth = vec![0xFF80_8080u32; 64];
        let textured = create_test_block(8, 4);
        let smooth_cost = juniward.distortion(&smooth, &embedder.flip(&smooth).unwrap()).unwrap();
        let textured_cost = juniward.distortion(&textured, &embedder.flip(&textured).unwrap()).unwrap();

        assert!(smooth_cost > 0.0 && textured_cost > 0.0);
        assert!(
            smooth_cost > textured_cost,
            "smooth {smooth_cost} should exceed textured {textured_cost}"
        );
    }

    #[test]
    fn test_non_square_block_is_rejected() {
        let block = vec![0xFF80_8080u32; 60];
        assert!(JUniward::default().distortion(&block, &block).is_err());
    }
}
