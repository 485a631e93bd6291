//! Scaled 8x8 discrete cosine transform used by the DCT embedders.
//!
//! The 1-D kernel is the Arai, Agui and Nakajima factorisation of the 8-point
//! DCT-II. Applied to rows and then to columns it yields the orthonormal 2-D
//! transform JPEG uses, so coefficient magnitudes line up with the JPEG
//! luminance quantisation table.

use ndarray::Array2;
use std::sync::OnceLock;

use crate::error::{Result, StegError};

// --- Constants ---
/// The side length of a DCT block.
pub const BLOCK_SIZE: usize = 8;

/// Level shift applied before the forward and after the inverse transform.
const LEVEL_SHIFT: f64 = 128.0;

struct AanTables {
    s: [f64; 8],
    a: [f64; 6],
}

fn tables() -> &'static AanTables {
    static TABLES: OnceLock<AanTables> = OnceLock::new();
    TABLES.get_or_init(|| {
        let mut c = [0.0f64; 8];
        let mut s = [0.0f64; 8];
        for i in 0..8 {
            c[i] = (std::f64::consts::PI / 16.0 * i as f64).cos();
            s[i] = 1.0 / (4.0 * c[i]);
        }
        s[0] = 1.0 / (2.0 * 2.0f64.sqrt());
        // a[0] is unused
        let a = [0.0, c[4], c[2] - c[6], c[4], c[6] + c[2], c[6]];
        AanTables { s, a }
    })
}

/// Computes the scaled DCT-II of an 8x8 block of spatial samples.
///
/// Samples are clamped to `[0, 255]` and shifted by -128 before the
/// transform. The inverse of this function is [`inverse`], up to rounding.
///
/// # Arguments
/// * `values` - An 8x8 matrix indexed as `[[row, column]]`
///
/// # Returns
/// * `Ok(Array2<f64>)` with the DCT coefficients, DC term at `[[0, 0]]`
/// * `Err(StegError)` if the matrix is not 8x8
pub fn forward(values: &Array2<f64>) -> Result<Array2<f64>> {
    check_shape(values)?;

    // Step 1: restrict to [0, 255] and centre around zero
    let mut result = values.mapv(|v| v.clamp(0.0, 255.0) - LEVEL_SHIFT);

    // Step 2: 1-D transform of every row, then of every column
    transform_lanes(&mut result, forward_1d);
    Ok(result)
}

/// Computes the scaled DCT-III of an 8x8 coefficient block.
///
/// The output is shifted by +128, rounded to the nearest integer and clamped
/// to `[0, 255]`, ready to be written back as a pixel channel.
pub fn inverse(values: &Array2<f64>) -> Result<Array2<f64>> {
    check_shape(values)?;

    let mut result = values.clone();
    transform_lanes(&mut result, inverse_1d);
    result.mapv_inplace(|v| (v + LEVEL_SHIFT).round().clamp(0.0, 255.0));
    Ok(result)
}

fn check_shape(values: &Array2<f64>) -> Result<()> {
    if values.dim() != (BLOCK_SIZE, BLOCK_SIZE) {
        return Err(StegError::EmbedderInput(format!(
            "DCT block must be {BLOCK_SIZE}x{BLOCK_SIZE}, got {:?}",
            values.dim()
        )));
    }
    Ok(())
}

fn transform_lanes(matrix: &mut Array2<f64>, kernel: fn(&mut [f64; 8])) {
    let mut lane = [0.0f64; 8];
    for mut row in matrix.rows_mut() {
        for (dst, src) in lane.iter_mut().zip(row.iter()) {
            *dst = *src;
        }
        kernel(&mut lane);
        for (dst, src) in row.iter_mut().zip(lane.iter()) {
            *dst = *src;
        }
    }
    for mut column in matrix.columns_mut() {
        for (dst, src) in lane.iter_mut().zip(column.iter()) {
            *dst = *src;
        }
        kernel(&mut lane);
        for (dst, src) in column.iter_mut().zip(lane.iter()) {
            *dst = *src;
        }
    }
}

/// Arai-Agui-Nakajima 8-point DCT-II, in place.
fn forward_1d(vector: &mut [f64; 8]) {
    let AanTables { s, a } = tables();

    let v0 = vector[0] + vector[7];
    let v1 = vector[1] + vector[6];
    let v2 = vector[2] + vector[5];
    let v3 = vector[3] + vector[4];
    let v4 = vector[3] - vector[4];
    let v5 = vector[2] - vector[5];
    let v6 = vector[1] - vector[6];
    let v7 = vector[0] - vector[7];

    let v8 = v0 + v3;
    let v9 = v1 + v2;
    let v10 = v1 - v2;
    let v11 = v0 - v3;
    let v12 = -v4 - v5;
    let v13 = (v5 + v6) * a[3];
    let v14 = v6 + v7;

    let v15 = v8 + v9;
    let v16 = v8 - v9;
    let v17 = (v10 + v11) * a[1];
    let v18 = (v12 + v14) * a[5];

    let v19 = -v12 * a[2] - v18;
    let v20 = v14 * a[4] - v18;

    let v21 = v17 + v11;
    let v22 = v11 - v17;
    let v23 = v13 + v7;
    let v24 = v7 - v13;

    let v25 = v19 + v24;
    let v26 = v23 + v20;
    let v27 = v23 - v20;
    let v28 = v24 - v19;

    vector[0] = s[0] * v15;
    vector[1] = s[1] * v26;
    vector[2] = s[2] * v21;
    vector[3] = s[3] * v28;
    vector[4] = s[4] * v16;
    vector[5] = s[5] * v25;
    vector[6] = s[6] * v22;
    vector[7] = s[7] * v27;
}

/// Inverse of [`forward_1d`], obtained by running its data flow backwards.
fn inverse_1d(vector: &mut [f64; 8]) {
    let AanTables { s, a } = tables();

    let v15 = vector[0] / s[0];
    let v26 = vector[1] / s[1];
    let v21 = vector[2] / s[2];
    let v28 = vector[3] / s[3];
    let v16 = vector[4] / s[4];
    let v25 = vector[5] / s[5];
    let v22 = vector[6] / s[6];
    let v27 = vector[7] / s[7];

    let v19 = (v25 - v28) / 2.0;
    let v20 = (v26 - v27) / 2.0;
    let v23 = (v26 + v27) / 2.0;
    let v24 = (v25 + v28) / 2.0;

    let v7 = (v23 + v24) / 2.0;
    let v11 = (v21 + v22) / 2.0;
    let v13 = (v23 - v24) / 2.0;
    let v17 = (v21 - v22) / 2.0;

    let v8 = (v15 + v16) / 2.0;
    let v9 = (v15 - v16) / 2.0;

    let denominator = a[2] * a[5] - a[2] * a[4] - a[4] * a[5];
    let v18 = (v19 - v20) * a[5];
    let v12 = (v19 * a[4] - v18) / denominator;
    let v14 = (v18 - v20 * a[2]) / denominator;

    let v6 = v14 - v7;
    let v5 = v13 / a[3] - v6;
    let v4 = -v5 - v12;
    let v10 = v17 / a[1] - v11;

    let v0 = (v8 + v11) / 2.0;
    let v1 = (v9 + v10) / 2.0;
    let v2 = (v9 - v10) / 2.0;
    let v3 = (v8 - v11) / 2.0;

    vector[0] = (v0 + v7) / 2.0;
    vector[1] = (v1 + v6) / 2.0;
    vector[2] = (v2 + v5) / 2.0;
    vector[3] = (v3 + v4) / 2.0;
    vector[4] = (v3 - v4) / 2.0;
    vector[5] = (v2 - v5) / 2.0;
    vector[6] = (v1 - v6) / 2.0;
    vector[7] = (v0 - v7) / 2.0;
}
