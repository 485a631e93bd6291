//! One-level 2-D fast wavelet transform with periodic boundary handling.

use ndarray::{Array1, Array2, ArrayViewMut1};

use crate::error::{Result, StegError};

/// Daubechies-8 low-pass decomposition filter (16 taps).
const DB8_SCALING: [f64; 16] = [
    -1.174_767_840_022_819_2e-4,
    6.754_494_059_985_568e-4,
    -3.917_403_729_959_771e-4,
    -4.870_352_993_451_574e-3,
    8.746_094_047_015_655e-3,
    1.398_102_791_701_551_6e-2,
    -4.408_825_393_106_472e-2,
    -1.736_930_100_202_211e-2,
    1.287_474_266_201_86e-1,
    4.724_845_736_482_229e-4,
    -2.840_155_429_624_281e-1,
    -1.582_910_525_602_389_3e-2,
    5.853_546_836_548_691e-1,
    6.756_307_362_980_128e-1,
    3.128_715_909_144_659e-1,
    5.441_584_224_308_161e-2,
];

const HAAR_SCALING: [f64; 2] = [std::f64::consts::FRAC_1_SQRT_2, std::f64::consts::FRAC_1_SQRT_2];

/// Mother wavelet used by [`forward`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Wavelet {
    Haar,
    #[default]
    Daubechies8,
}

impl Wavelet {
    fn scaling(self) -> &'static [f64] {
        match self {
            Wavelet::Haar => &HAAR_SCALING,
            Wavelet::Daubechies8 => &DB8_SCALING,
        }
    }

    /// High-pass filter, the quadrature mirror of the scaling filter.
    fn detail(self) -> Vec<f64> {
        let scaling = self.scaling();
        let len = scaling.len();
        (0..len)
            .map(|i| {
                let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
                sign * scaling[len - 1 - i]
            })
            .collect()
    }

    /// Splits one lane into approximation (first half) and detail (second half).
    fn decompose(self, lane: &mut ArrayViewMut1<f64>, detail: &[f64]) {
        let n = lane.len();
        let half = n / 2;
        let scaling = self.scaling();
        let mut out = Array1::<f64>::zeros(n);
        for i in 0..half {
            for (j, (&lo, &hi)) in scaling.iter().zip(detail).enumerate() {
                let k = (2 * i + j) % n;
                out[i] += lane[k] * lo;
                out[i + half] += lane[k] * hi;
            }
        }
        lane.assign(&out);
    }
}

/// One forward level on rows, then on columns.
///
/// The result holds LL in the top-left quadrant, HL top-right, LH bottom-left
/// and HH bottom-right.
pub fn forward(matrix: &Array2<f64>, wavelet: Wavelet) -> Result<Array2<f64>> {
    let (rows, cols) = matrix.dim();
    if rows < 2 || cols < 2 || rows % 2 != 0 || cols % 2 != 0 {
        return Err(StegError::EmbedderInput(format!(
            "wavelet transform needs even dimensions, got {rows}x{cols}"
        )));
    }

    let detail = wavelet.detail();
    let mut result = matrix.clone();
    for mut row in result.rows_mut() {
        wavelet.decompose(&mut row, &detail);
    }
    for mut column in result.columns_mut() {
        wavelet.decompose(&mut column, &detail);
    }
    Ok(result)
}

/// Sum of absolute values outside the LL quadrant after one forward level.
pub fn detail_sum(matrix: &Array2<f64>, wavelet: Wavelet) -> Result<f64> {
    let transformed = forward(matrix, wavelet)?;
    let (rows, cols) = transformed.dim();
    Ok(transformed
        .indexed_iter()
        .filter(|((y, x), _)| *y >= rows / 2 || *x >= cols / 2)
        .map(|(_, v)| v.abs())
        .sum())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters_are_normalised() {
        for wavelet in [Wavelet::Haar, Wavelet::Daubechies8] {
            let low: f64 = wavelet.scaling().iter().sum();
            let high: f64 = wavelet.detail().iter().sum();
            assert!((low - 2.0f64.sqrt()).abs() < 1e-6, "{wavelet:?} low-pass sum {low}");
            assert!(high.abs() < 1e-6, "{wavelet:?} high-pass sum {high}");
        }
    }

    #[test]
    fn test_constant_matrix_has_no_detail() {
        let flat = Array2::from_elem((8, 8), 93.0);
        for wavelet in [Wavelet::Haar, Wavelet::Daubechies8] {
            let sum = detail_sum(&flat, wavelet).unwrap();
            assert!(sum < 1e-6, "{wavelet:?} detail sum {sum}");
            let transformed = forward(&flat, wavelet).unwrap();
            // two low-pass passes scale a constant by 2
            assert!((transformed[[0, 0]] - 186.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_haar_layout() {
        let mut m = Array2::zeros((2, 2));
        m[[0, 0]] = 4.0;
        let t = forward(&m, Wavelet::Haar).unwrap();
        // a single impulse spreads evenly over the four sub-bands
        for v in t.iter() {
            assert!((v.abs() - 2.0).abs() < 1e-9);
        }
        assert!(t[[0, 0]] > 0.0);
    }

    #[test]
    fn test_texture_raises_detail_sum() {
        let flat = Array2::from_elem((8, 8), 128.0);
        let checker = Array2::from_shape_fn((8, 8), |(y, x)| if (x + y) % 2 == 0 { 100.0 } else { 156.0 });
        let flat_sum = detail_sum(&flat, Wavelet::default()).unwrap();
        let checker_sum = detail_sum(&checker, Wavelet::default()).unwrap();
        assert!(checker_sum > flat_sum + 100.0);
    }

    #[test]
    fn test_odd_dimensions_are_rejected() {
        let m = Array2::<f64>::zeros((3, 4));
        assert!(forward(&m, Wavelet::Haar).is_err());
    }
}
