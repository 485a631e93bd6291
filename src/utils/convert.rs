//! ARGB pixel packing and the YCbCr pixel translator.

use ndarray::Array2;

use crate::error::{Result, StegError};

/// Splits a packed `0xAARRGGBB` pixel into `[a, r, g, b]`.
pub fn unpack_argb(pixel: u32) -> [u8; 4] {
    pixel.to_be_bytes()
}

pub fn pack_argb(channels: [u8; 4]) -> u32 {
    u32::from_be_bytes(channels)
}

pub fn alpha(pixel: u32) -> u8 {
    (pixel >> 24) as u8
}

// YCbCr formulas per ITU-R BT.601, full range, every component in [0, 255].

pub fn rgb_to_ycbcr(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let (r, g, b) = (r as f64, g as f64, b as f64);
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let cb = -0.1687 * r - 0.3313 * g + 0.5 * b + 128.0;
    let cr = 0.5 * r - 0.4187 * g - 0.0813 * b + 128.0;
    (y.clamp(0.0, 255.0), cb.clamp(0.0, 255.0), cr.clamp(0.0, 255.0))
}

/// Convert a YCbCr triple back to RGB, rounding and clamping to `0..=255`.
pub fn ycbcr_to_rgb(y: f64, cb: f64, cr: f64) -> (u8, u8, u8) {
    let cb = cb - 128.0;
    let cr = cr - 128.0;
    let to_u8 = |v: f64| v.round().clamp(0.0, 255.0) as u8;
    (
        to_u8(y + 1.402 * cr),
        to_u8(y - 0.34414 * cb - 0.71414 * cr),
        to_u8(y + 1.772 * cb),
    )
}

/// The YCbCr component a [`PixelTranslator`] exposes as a matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Channel {
    #[default]
    Luma,
    BlueDifference,
    RedDifference,
}

impl Channel {
    fn index(self) -> usize {
        match self {
            Channel::Luma => 0,
            Channel::BlueDifference => 1,
            Channel::RedDifference => 2,
        }
    }
}

/// Holds a square block of ARGB pixels as three YCbCr planes.
///
/// Only the selected channel is exposed for modification. The other two
/// planes and the alpha bytes are kept so that [`PixelTranslator::to_argb`]
/// can rebuild the block, which is why one instance must serve a whole
/// read-modify-write cycle.
#[derive(Debug, Clone)]
pub struct PixelTranslator {
    argb: Vec<u32>,
    width: usize,
    planes: [Vec<f64>; 3],
    channel: Channel,
}

impl PixelTranslator {
    /// Translates `argb`, a `width x width` block in row-major order, exposing luma.
    pub fn new(argb: &[u32], width: usize) -> Result<Self> {
        Self::with_channel(argb, width, Channel::Luma)
    }

    pub fn with_channel(argb: &[u32], width: usize, channel: Channel) -> Result<Self> {
        if width == 0 || argb.len() != width * width {
            return Err(StegError::EmbedderInput(format!(
                "{} pixels do not form a square block of width {width}",
                argb.len()
            )));
        }

        let mut planes = [
            Vec::with_capacity(argb.len()),
            Vec::with_capacity(argb.len()),
            Vec::with_capacity(argb.len()),
        ];
        for &pixel in argb {
            let [_, r, g, b] = unpack_argb(pixel);
            let (y, cb, cr) = rgb_to_ycbcr(r, g, b);
            planes[0].push(y);
            planes[1].push(cb);
            planes[2].push(cr);
        }

        Ok(Self {
            argb: argb.to_vec(),
            width,
            planes,
            channel,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// The selected channel as a `width x width` matrix indexed `[[row, column]]`.
    pub fn matrix(&self) -> Array2<f64> {
        let plane = &self.planes[self.channel.index()];
        Array2::from_shape_fn((self.width, self.width), |(y, x)| plane[y * self.width + x])
    }

    /// Replaces the selected channel.
    pub fn set_matrix(&mut self, matrix: &Array2<f64>) -> Result<()> {
        if matrix.dim() != (self.width, self.width) {
            return Err(StegError::EmbedderInput(format!(
                "matrix of shape {:?} does not fit a block of width {}",
                matrix.dim(),
                self.width
            )));
        }
        let plane = &mut self.planes[self.channel.index()];
        for (dst, src) in plane.iter_mut().zip(matrix.iter()) {
            *dst = *src;
        }
        Ok(())
    }

    /// Rebuilds ARGB pixels from the current planes, keeping every alpha byte.
    pub fn to_argb(&self) -> Vec<u32> {
        self.argb
            .iter()
            .enumerate()
            .map(|(i, &pixel)| {
                let (r, g, b) = ycbcr_to_rgb(self.planes[0][i], self.planes[1][i], self.planes[2][i]);
                pack_argb([alpha(pixel), r, g, b])
            })
            .collect()
    }
}
