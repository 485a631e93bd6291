//! JPEG luminance quantisation at a given quality factor.

use ndarray::Array2;

use crate::dct::BLOCK_SIZE;

/// Standard JPEG luminance base table, row-major.
const LUMA_BASE: [u32; 64] = [
    16, 11, 10, 16, 24, 40, 51, 61, //
    12, 12, 14, 19, 26, 58, 60, 55, //
    14, 13, 16, 24, 40, 57, 69, 56, //
    14, 17, 22, 29, 51, 87, 80, 62, //
    18, 22, 37, 56, 68, 109, 103, 77, //
    24, 35, 55, 64, 81, 104, 113, 92, //
    49, 64, 78, 87, 103, 121, 120, 101, //
    72, 92, 95, 98, 112, 100, 103, 99,
];

fn scaling(qf: f32) -> u32 {
    let q = ((qf * 100.0).round() as i64).clamp(1, 100) as u32;
    if q < 50 { 5000 / q } else { 200 - 2 * q }
}

fn table_entry(index: usize, scale: u32) -> u32 {
    ((LUMA_BASE[index] * scale + 50) / 100).clamp(1, 255)
}

/// Quantisation step of coefficient `(x, y)` for quality factor `qf` in `(0, 1]`.
pub fn quantization_value(x: usize, y: usize, qf: f32) -> u32 {
    table_entry(y * BLOCK_SIZE + x, scaling(qf))
}

/// The full 8x8 table for `qf`, indexed as `[[y, x]]`.
pub fn quantization_table(qf: f32) -> Array2<f64> {
    let scale = scaling(qf);
    Array2::from_shape_fn((BLOCK_SIZE, BLOCK_SIZE), |(y, x)| {
        table_entry(y * BLOCK_SIZE + x, scale) as f64
    })
}

/// Divides each coefficient by its step and rounds, as a JPEG encoder does.
pub fn quantize(values: &Array2<f64>, qf: f32) -> Array2<f64> {
    let mut quantized = values / &quantization_table(qf);
    quantized.mapv_inplace(f64::round);
    quantized
}

pub fn dequantize(values: &Array2<f64>, qf: f32) -> Array2<f64> {
    values * &quantization_table(qf)
}

/// Rounds each coefficient to the nearest multiple of its step, i.e. what
/// survives a JPEG save at `qf`.
pub fn prequantize(values: &Array2<f64>, qf: f32) -> Array2<f64> {
    dequantize(&quantize(values, qf), qf)
}

/// Rounds a single value to the nearest multiple of `step`.
pub fn prequantize_value(value: f64, step: f64) -> f64 {
    (value / step).round() * step
}
