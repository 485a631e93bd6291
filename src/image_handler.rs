use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};

use crate::error::{Result, StegError};
use crate::overlay::ArgbRaster;
use crate::utils::convert::{pack_argb, unpack_argb};

/// Carrier formats the facade reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFormat {
    Png,
    Bmp,
    Jpeg,
}

impl MediaFormat {
    fn from_image_format(format: ImageFormat) -> Result<Self> {
        match format {
            ImageFormat::Png => Ok(MediaFormat::Png),
            ImageFormat::Bmp => Ok(MediaFormat::Bmp),
            ImageFormat::Jpeg => Ok(MediaFormat::Jpeg),
            other => Err(StegError::UnsupportedMedia(format!(
                "the image format {other:?} is not supported"
            ))),
        }
    }

    pub fn is_jpeg(self) -> bool {
        self == MediaFormat::Jpeg
    }
}

/// A decoded carrier image.
#[derive(Debug, Clone)]
pub struct Carrier {
    pub format: MediaFormat,
    pub raster: ArgbRaster,
    pub has_alpha: bool,
}

/// Decodes PNG, BMP or JPEG bytes into an ARGB raster.
///
/// Only 8-bit RGB and RGBA rasters are accepted, and BMPs must be opaque.
pub fn load_carrier(bytes: &[u8]) -> Result<Carrier> {
    let format = image::guess_format(bytes).map_err(|_| StegError::NoImage)?;
    let media = MediaFormat::from_image_format(format)?;
    let decoded = image::load_from_memory_with_format(bytes, format).map_err(|_| StegError::NoImage)?;

    let (width, height) = (decoded.width() as usize, decoded.height() as usize);
    let (pixels, has_alpha): (Vec<u32>, bool) = match decoded {
        DynamicImage::ImageRgb8(rgb) => (
            rgb.pixels().map(|p| pack_argb([0xFF, p[0], p[1], p[2]])).collect(),
            false,
        ),
        DynamicImage::ImageRgba8(rgba) => {
            if media == MediaFormat::Bmp {
                return Err(StegError::UnsupportedMedia(
                    "bitmaps with transparency are not supported".into(),
                ));
            }
            (
                rgba.pixels().map(|p| pack_argb([p[3], p[0], p[1], p[2]])).collect(),
                true,
            )
        }
        other => {
            return Err(StegError::UnsupportedMedia(format!(
                "pixel type {:?} is not supported",
                other.color()
            )));
        }
    };

    Ok(Carrier {
        format: media,
        raster: ArgbRaster::new(width, height, pixels)?,
        has_alpha,
    })
}

/// Serialises `raster` as `format`. PNG keeps the alpha channel when
/// `keep_alpha` is set; BMP and JPEG are written as opaque RGB.
pub fn save_raster(raster: &ArgbRaster, format: MediaFormat, keep_alpha: bool, jpeg_quality: u8) -> Result<Vec<u8>> {
    let (width, height) = (raster.width() as u32, raster.height() as u32);
    let image = if keep_alpha && format == MediaFormat::Png {
        let samples = raster
            .pixels()
            .iter()
            .flat_map(|&p| {
                let [a, r, g, b] = unpack_argb(p);
                [r, g, b, a]
            })
            .collect();
        RgbaImage::from_raw(width, height, samples).map(DynamicImage::ImageRgba8)
    } else {
        let samples = raster
            .pixels()
            .iter()
            .flat_map(|&p| {
                let [_, r, g, b] = unpack_argb(p);
                [r, g, b]
            })
            .collect();
        RgbImage::from_raw(width, height, samples).map(DynamicImage::ImageRgb8)
    }
    .ok_or_else(|| StegError::MediaReassembling("raster does not match its dimensions".into()))?;

    let mut buffer = Vec::new();
    let mut cursor = Cursor::new(&mut buffer);
    let written = match format {
        MediaFormat::Jpeg => image.write_with_encoder(JpegEncoder::new_with_quality(&mut cursor, jpeg_quality)),
        MediaFormat::Png => image.write_to(&mut cursor, ImageFormat::Png),
        MediaFormat::Bmp => image.write_to(&mut cursor, ImageFormat::Bmp),
    };
    written.map_err(|e| StegError::MediaReassembling(format!("{format:?} encoding failed: {e}")))?;
    Ok(buffer)
}
