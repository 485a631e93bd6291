//! Overlays present an image as a linear sequence of cover elements.
//!
//! The image is cut into `side x side` squares (single pixels for side 1),
//! truncated to a multiple of the side in both dimensions. Squares are
//! numbered row by row, filtered by an admissibility predicate and, for the
//! shuffled variant, permuted with a seeded Fisher-Yates shuffle.

use crate::error::{Result, StegError};
use crate::utils::convert::alpha;
use crate::utils::locations;

/// A mutable raster of packed `0xAARRGGBB` pixels in row-major order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgbRaster {
    width: usize,
    height: usize,
    pixels: Vec<u32>,
}

impl ArgbRaster {
    pub fn new(width: usize, height: usize, pixels: Vec<u32>) -> Result<Self> {
        if pixels.len() != width * height {
            return Err(StegError::UnsupportedMedia(format!(
                "{} pixels do not fill a {width}x{height} raster",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn filled(width: usize, height: usize, pixel: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![pixel; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixel(&self, x: usize, y: usize) -> u32 {
        self.pixels[y * self.width + x]
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, pixel: u32) {
        self.pixels[y * self.width + x] = pixel;
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u32> {
        self.pixels
    }
}

/// Random access to the cover elements of one image.
pub trait Overlay {
    type Element;

    /// Reads the element at `position` of the traversal order.
    fn get(&self, position: usize) -> Result<Self::Element>;

    /// Writes `element` back at `position`.
    fn set(&mut self, position: usize, element: Self::Element) -> Result<()>;

    /// Number of elements in the traversal order.
    fn available(&self) -> usize;
}

/// How one cover element is cut out of, and pasted back into, a raster.
pub trait CoverShape {
    type Element;

    fn side(&self) -> usize;
    fn read(&self, raster: &ArgbRaster, x: usize, y: usize) -> Self::Element;
    fn write(&self, raster: &mut ArgbRaster, x: usize, y: usize, element: Self::Element) -> Result<()>;
}

/// Single pixels.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pixels;

impl CoverShape for Pixels {
    type Element = u32;

    fn side(&self) -> usize {
        1
    }

    fn read(&self, raster: &ArgbRaster, x: usize, y: usize) -> u32 {
        raster.pixel(x, y)
    }

    fn write(&self, raster: &mut ArgbRaster, x: usize, y: usize, element: u32) -> Result<()> {
        raster.set_pixel(x, y, element);
        Ok(())
    }
}

/// Square blocks, flattened row by row.
#[derive(Debug, Clone, Copy)]
pub struct Blocks {
    side: usize,
}

impl Blocks {
    pub fn new(side: usize) -> Self {
        Self { side }
    }
}

impl CoverShape for Blocks {
    type Element = Vec<u32>;

    fn side(&self) -> usize {
        self.side
    }

    fn read(&self, raster: &ArgbRaster, x: usize, y: usize) -> Vec<u32> {
        let mut block = Vec::with_capacity(self.side * self.side);
        for row in y..y + self.side {
            let start = row * raster.width + x;
            block.extend_from_slice(&raster.pixels[start..start + self.side]);
        }
        block
    }

    fn write(&self, raster: &mut ArgbRaster, x: usize, y: usize, element: Vec<u32>) -> Result<()> {
        if element.len() != self.side * self.side {
            return Err(StegError::EmbedderInput(format!(
                "block of {} pixels cannot replace a {}x{} area",
                element.len(),
                self.side,
                self.side
            )));
        }
        for (dy, row) in element.chunks_exact(self.side).enumerate() {
            let start = (y + dy) * raster.width + x;
            raster.pixels[start..start + self.side].copy_from_slice(row);
        }
        Ok(())
    }
}

/// Traversal over the elements of a borrowed raster.
pub struct SequenceOverlay<'a, S: CoverShape> {
    raster: &'a mut ArgbRaster,
    shape: S,
    truncated_width: usize,
    order: Vec<usize>,
}

pub type PixelOverlay<'a> = SequenceOverlay<'a, Pixels>;
pub type BlockOverlay<'a> = SequenceOverlay<'a, Blocks>;

impl<'a, S: CoverShape> SequenceOverlay<'a, S> {
    /// Every element in reading order.
    pub fn sequence(raster: &'a mut ArgbRaster, shape: S) -> Result<Self> {
        Self::build(raster, shape, None, |_| true)
    }

    /// Elements passing `keep`, in reading order.
    pub fn conditioned(raster: &'a mut ArgbRaster, shape: S, keep: impl Fn(&S::Element) -> bool) -> Result<Self> {
        Self::build(raster, shape, None, keep)
    }

    /// Elements passing `keep`, shuffled with `seed`.
    pub fn shuffled(
        raster: &'a mut ArgbRaster,
        shape: S,
        seed: u64,
        keep: impl Fn(&S::Element) -> bool,
    ) -> Result<Self> {
        Self::build(raster, shape, Some(seed), keep)
    }

    fn build(
        raster: &'a mut ArgbRaster,
        shape: S,
        seed: Option<u64>,
        keep: impl Fn(&S::Element) -> bool,
    ) -> Result<Self> {
        let side = shape.side();
        if side == 0 {
            return Err(StegError::encoder("cover element side must be positive"));
        }
        let truncated_width = raster.width / side * side;
        let truncated_height = raster.height / side * side;
        let capacity = truncated_width * truncated_height / (side * side);

        let order = {
            let snapshot: &ArgbRaster = raster;
            locations::element_order(capacity, seed, |index| {
                let (x, y) = coordinates(index, side, truncated_width);
                keep(&shape.read(snapshot, x, y))
            })
        };

        tracing::debug!(
            side,
            capacity,
            admitted = order.len(),
            shuffled = seed.is_some(),
            "built cover overlay"
        );

        Ok(Self {
            raster,
            shape,
            truncated_width,
            order,
        })
    }

    /// Top-left pixel of the element at `position`.
    pub fn origin(&self, position: usize) -> Result<(usize, usize)> {
        let index = *self.order.get(position).ok_or(StegError::ElementNotFound {
            position,
            length: self.order.len(),
        })?;
        Ok(coordinates(index, self.shape.side(), self.truncated_width))
    }
}

fn coordinates(index: usize, side: usize, truncated_width: usize) -> (usize, usize) {
    let offset = index * side;
    (offset % truncated_width, offset / truncated_width * side)
}

impl<S: CoverShape> Overlay for SequenceOverlay<'_, S> {
    type Element = S::Element;

    fn get(&self, position: usize) -> Result<S::Element> {
        let (x, y) = self.origin(position)?;
        Ok(self.shape.read(self.raster, x, y))
    }

    fn set(&mut self, position: usize, element: S::Element) -> Result<()> {
        let (x, y) = self.origin(position)?;
        self.shape.write(self.raster, x, y, element)
    }

    fn available(&self) -> usize {
        self.order.len()
    }
}

/// Admissibility predicates for [`SequenceOverlay::conditioned`] and
/// [`SequenceOverlay::shuffled`].
pub mod predicates {
    use super::alpha;

    /// The pixel is not fully transparent.
    pub fn is_pixel_opaque(pixel: &u32) -> bool {
        alpha(*pixel) > 0
    }

    pub fn all_pixels_opaque(block: &[u32]) -> bool {
        block.iter().all(is_pixel_opaque)
    }

    /// At least two distinct pixel values.
    pub fn no_single_colors(block: &[u32]) -> bool {
        block.first().is_some_and(|first| block.iter().any(|p| p != first))
    }
}
