//! The image steganography facade.
//!
//! A [`Preset`] fixes the whole pipeline (overlay, embedder, encoder and
//! distortion) and the carrier formats it accepts. [`ImageSteg`] loads the
//! carrier, frames the payload with an optional header, runs the pipeline and
//! re-serialises the image.

use std::fmt;
use std::str::FromStr;

use hex_literal::hex;
use tracing::{debug, info};

use crate::distortion::{ConstantDistortion, JUniward};
use crate::embedders::{DcrasEmbedder, DmasEmbedder, MarkingDcras, PixelParity};
use crate::encoders::{Encoder, PlainEncoder, PlainMode, ReedSolomon, StcEncoder, StcMode};
use crate::error::{Result, StegError};
use crate::image_handler::{self, Carrier, MediaFormat};
use crate::overlay::{ArgbRaster, BlockOverlay, Blocks, PixelOverlay, Pixels, predicates};

pub const DEFAULT_SEED: u64 = 1_732_341_558;

/// First four header bytes of every payload framed by [`ImageSteg`].
pub const HEADER_SIGNATURE: [u8; 4] = hex!("504b8769");

pub const HEADER_LEN: usize = 8;

/// Fixed pipelines, from most detection resistant to most compression resistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Preset {
    /// Lossless STC over 8x8 DMAS blocks with wavelet distortion. PNG/BMP only.
    DetectionResistance,
    /// Plain embedding into 16x16 DCRAS blocks. JPEG only.
    CompressionResistance,
    /// STC over 8x8 DMAS blocks, writing every block. JPEG only.
    #[default]
    ResistanceHybrid,
    /// Lossless STC over single pixel parities. PNG/BMP only.
    MinimalImpact,
    /// Plain flip-only DCRAS that outlines every touched block. PNG/BMP only.
    Test,
}

impl Preset {
    pub const ALL: [Preset; 5] = [
        Preset::DetectionResistance,
        Preset::CompressionResistance,
        Preset::ResistanceHybrid,
        Preset::MinimalImpact,
        Preset::Test,
    ];

    /// Whether stego images are written as JPEG.
    pub fn outputs_jpeg(self) -> bool {
        matches!(self, Preset::CompressionResistance | Preset::ResistanceHybrid)
    }

    pub fn name(self) -> &'static str {
        match self {
            Preset::DetectionResistance => "detection-resistance",
            Preset::CompressionResistance => "compression-resistance",
            Preset::ResistanceHybrid => "resistance-hybrid",
            Preset::MinimalImpact => "minimal-impact",
            Preset::Test => "test",
        }
    }

    /// JPEG presets need JPEG carriers, lossless presets refuse them.
    pub fn check_format(self, format: MediaFormat) -> Result<()> {
        match (self.outputs_jpeg(), format.is_jpeg()) {
            (true, false) => Err(StegError::UnsupportedMedia(format!("preset {self} only supports JPEG images"))),
            (false, true) => Err(StegError::UnsupportedMedia(format!("preset {self} does not support JPEG images"))),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Preset::ALL
            .into_iter()
            .find(|preset| preset.name() == wanted)
            .ok_or_else(|| {
                let names: Vec<&str> = Preset::ALL.iter().map(|p| p.name()).collect();
                format!("unknown preset '{s}', expected one of: {}", names.join(", "))
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StegConfig {
    /// Frame payloads with signature and length.
    pub use_default_header: bool,
    /// Wrap the pipeline in Reed-Solomon error correction.
    pub use_error_correction: bool,
    pub preset: Preset,
    /// Share of payload bytes the error correction can repair, in `[0, 1]`.
    pub error_rate: f64,
    /// Quality of JPEG output, 1 to 100.
    pub jpeg_quality: u8,
}

impl Default for StegConfig {
    fn default() -> Self {
        Self {
            use_default_header: true,
            use_error_correction: true,
            preset: Preset::default(),
            error_rate: 0.5,
            jpeg_quality: 95,
        }
    }
}

impl StegConfig {
    pub fn with_default_header(mut self, enabled: bool) -> Self {
        self.use_default_header = enabled;
        self
    }

    pub fn with_error_correction(mut self, enabled: bool) -> Self {
        self.use_error_correction = enabled;
        self
    }

    pub fn with_preset(mut self, preset: Preset) -> Self {
        self.preset = preset;
        self
    }

    pub fn with_error_rate(mut self, error_rate: f64) -> Self {
        self.error_rate = error_rate;
        self
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }
}

/// Hides byte payloads in PNG, BMP and JPEG images.
#[derive(Debug, Clone, Default)]
pub struct ImageSteg {
    config: StegConfig,
}

impl ImageSteg {
    /// Creates a facade running `config.preset`.
    pub fn new(config: StegConfig) -> Self {
        Self { config }
    }

    pub fn with_preset(preset: Preset) -> Self {
        Self::new(StegConfig::default().with_preset(preset))
    }

    pub fn config(&self) -> &StegConfig {
        &self.config
    }

    /// Hides `payload` in `carrier` with [`DEFAULT_SEED`].
    ///
    /// # Arguments
    /// * `carrier` - PNG, BMP or JPEG bytes the preset accepts
    /// * `payload` - Bytes to hide, at most [`ImageSteg::image_capacity`] of them
    ///
    /// # Returns
    /// * `Ok(Vec<u8>)` with the stego image, JPEG for JPEG presets and the carrier's format otherwise
    /// * `Err(StegError::NoImage)` or `Err(StegError::UnsupportedMedia)` for unusable carriers
    /// * `Err(StegError::MediaCapacity)` if the payload does not fit
    ///
    pub fn encode(&self, carrier: &[u8], payload: &[u8]) -> Result<Vec<u8>> {
        self.encode_with_seed(carrier, payload, DEFAULT_SEED)
    }

    /// Hides `payload` in `carrier` and returns the stego image in the
    /// preset's output format.
    pub fn encode_with_seed(&self, carrier: &[u8], payload: &[u8], seed: u64) -> Result<Vec<u8>> {
        // 1. Decode the carrier and check it suits the preset.
        let Carrier {
            format,
            mut raster,
            has_alpha,
        } = self.load(carrier)?;

        // 2. Refuse payloads the image cannot hold.
        let capacity = self.capacity_of(&mut raster, seed)?;
        if payload.len() > capacity {
            return Err(StegError::MediaCapacity {
                required: payload.len() * 8,
                available: capacity * 8,
            });
        }

        // 3. Run the pipeline; the encoder borrows the raster until it is dropped.
        {
            let mut encoder = self.pipeline(&mut raster, seed, self.config.use_default_header)?;
            if self.config.use_default_header {
                encoder.encode(&header(payload.len())?)?;
            }
            encoder.encode(payload)?;
        }

        // 4. Write the stego image.
        let output = if self.config.preset.outputs_jpeg() {
            MediaFormat::Jpeg
        } else {
            format
        };
        let stego = image_handler::save_raster(&raster, output, has_alpha, self.config.jpeg_quality)?;
        info!(
            preset = %self.config.preset,
            payload = payload.len(),
            capacity,
            format = ?output,
            "payload hidden"
        );
        Ok(stego)
    }

    /// Recovers a payload framed with a header, using [`DEFAULT_SEED`].
    ///
    /// # Arguments
    /// * `stego` - Image bytes produced by [`ImageSteg::encode`] with the same preset
    ///
    /// # Returns
    /// * `Ok(Vec<u8>)` with the payload
    /// * `Err(StegError::UnknownStegFormat)` if no header signature is found
    /// * `Err(StegError::DamagedMessage)` if error correction cannot repair the bits read
    ///
    pub fn decode(&self, stego: &[u8]) -> Result<Vec<u8>> {
        self.decode_with_seed(stego, DEFAULT_SEED)
    }

    /// Reads a header-framed payload. Works whatever `use_default_header` says.
    pub fn decode_with_seed(&self, stego: &[u8], seed: u64) -> Result<Vec<u8>> {
        let Carrier { mut raster, .. } = self.load(stego)?;
        let mut encoder = self.pipeline(&mut raster, seed, true)?;

        let framing = encoder
            .decode(HEADER_LEN)
            .map_err(|e| e.into_unknown_format("image is too small to hold a header"))?;
        let length = read_header(&framing)?;
        debug!(length, "found payload header");

        let payload = encoder
            .decode(length)
            .map_err(|e| e.into_unknown_format("encoded message length has an illegal value"))?;
        info!(preset = %self.config.preset, payload = payload.len(), "payload recovered");
        Ok(payload)
    }

    /// Recovers a headerless payload whose length is known in advance.
    ///
    /// # Arguments
    /// * `length` - Payload length in bytes, as passed to the encoder
    /// * `stego` - Image bytes produced with `use_default_header` off
    ///
    /// # Returns
    /// * `Ok(Vec<u8>)` with `length` bytes; without error correction these are
    ///   whatever the cover holds, payload or not
    ///
    pub fn decode_length(&self, length: usize, stego: &[u8]) -> Result<Vec<u8>> {
        self.decode_length_with_seed(length, stego, DEFAULT_SEED)
    }

    /// Reads `length` payload bytes written without a header.
    pub fn decode_length_with_seed(&self, length: usize, stego: &[u8], seed: u64) -> Result<Vec<u8>> {
        let Carrier { mut raster, .. } = self.load(stego)?;
        let mut encoder = self.pipeline(&mut raster, seed, false)?;
        encoder.decode(length)
    }

    pub fn is_steganographic_data(&self, data: &[u8]) -> Result<bool> {
        self.is_steganographic_data_with_seed(data, DEFAULT_SEED)
    }

    /// Whether `data` carries the header signature. Unreadable headers count
    /// as absent; unreadable images are errors.
    pub fn is_steganographic_data_with_seed(&self, data: &[u8], seed: u64) -> Result<bool> {
        let Carrier { mut raster, .. } = self.load(data)?;
        let mut encoder = self.pipeline(&mut raster, seed, true)?;
        match encoder.decode(HEADER_LEN) {
            Ok(framing) => Ok(framing[..4] == HEADER_SIGNATURE),
            Err(StegError::MediaCapacity { .. } | StegError::DamagedMessage(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Payload bytes `image` can hold under the configured preset.
    ///
    /// The header and the parity of both the header and the payload are
    /// already subtracted, so a payload of exactly this size encodes.
    pub fn image_capacity(&self, image: &[u8]) -> Result<usize> {
        let Carrier { mut raster, .. } = self.load(image)?;
        self.capacity_of(&mut raster, DEFAULT_SEED)
    }

    fn load(&self, bytes: &[u8]) -> Result<Carrier> {
        let carrier = image_handler::load_carrier(bytes)?;
        self.config.preset.check_format(carrier.format)?;
        Ok(carrier)
    }

    /// Payload bytes left once the header, with its own parity, is written.
    fn capacity_of(&self, raster: &mut ArgbRaster, seed: u64) -> Result<usize> {
        let written: &[usize] = if self.config.use_default_header { &[HEADER_LEN] } else { &[] };
        Ok(self.pipeline(raster, seed, false)?.available_after(written) / 8)
    }

    /// Assembles the preset's encoder over `raster`.
    fn pipeline<'a>(&self, raster: &'a mut ArgbRaster, seed: u64, sequential: bool) -> Result<Box<dyn Encoder + 'a>> {
        let encoder: Box<dyn Encoder + 'a> = match self.config.preset {
            Preset::DetectionResistance => Box::new(StcEncoder::new(
                BlockOverlay::shuffled(raster, Blocks::new(8), seed, |block: &Vec<u32>| {
                    predicates::all_pixels_opaque(block)
                })?,
                DmasEmbedder::new(0.95, 7, 7)?,
                JUniward::default(),
                StcMode::LossLess,
                sequential,
                seed,
            )),
            Preset::CompressionResistance => Box::new(PlainEncoder::new(
                BlockOverlay::shuffled(raster, Blocks::new(16), seed, |_: &Vec<u32>| true)?,
                DcrasEmbedder::new(0.65, 3, 2)?,
                PlainMode::Embed,
                sequential,
            )),
            Preset::ResistanceHybrid => Box::new(StcEncoder::new(
                BlockOverlay::shuffled(raster, Blocks::new(8), seed, |_: &Vec<u32>| true)?,
                DmasEmbedder::with_quality(0.55)?,
                JUniward::default(),
                StcMode::Embed,
                sequential,
                seed,
            )),
            Preset::MinimalImpact => Box::new(StcEncoder::new(
                PixelOverlay::shuffled(raster, Pixels, seed, predicates::is_pixel_opaque)?,
                PixelParity::with_seed(seed),
                ConstantDistortion::default(),
                StcMode::LossLess,
                sequential,
                seed,
            )),
            Preset::Test => Box::new(PlainEncoder::new(
                BlockOverlay::shuffled(raster, Blocks::new(16), seed, |_: &Vec<u32>| true)?,
                MarkingDcras::new(DcrasEmbedder::with_quality(0.85)?),
                PlainMode::FlipOnly,
                sequential,
            )),
        };

        if self.config.use_error_correction {
            Ok(Box::new(ReedSolomon::with_error_rate(encoder, self.config.error_rate)?))
        } else {
            Ok(encoder)
        }
    }
}

/// Signature followed by the big-endian payload length.
pub fn header(length: usize) -> Result<[u8; HEADER_LEN]> {
    let length = u32::try_from(length).map_err(|_| StegError::MediaCapacity {
        required: length.saturating_mul(8),
        available: u32::MAX as usize * 8,
    })?;
    let mut framing = [0u8; HEADER_LEN];
    framing[..4].copy_from_slice(&HEADER_SIGNATURE);
    framing[4..].copy_from_slice(&length.to_be_bytes());
    Ok(framing)
}

/// Payload length announced by a header.
pub fn read_header(framing: &[u8]) -> Result<usize> {
    match framing {
        [a, b, c, d, e, f, g, h] if [*a, *b, *c, *d] == HEADER_SIGNATURE => {
            Ok(u32::from_be_bytes([*e, *f, *g, *h]) as usize)
        }
        _ => Err(StegError::UnknownStegFormat {
            message: "no steganographic encoding found".into(),
            source: None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        assert_eq!(header(11).unwrap(), [0x50, 0x4B, 0x87, 0x69, 0, 0, 0, 0x0B]);
        assert_eq!(u32::from_be_bytes(HEADER_SIGNATURE), 1_349_075_561);
        assert_eq!(read_header(&header(70_000).unwrap()).unwrap(), 70_000);
    }

    #[test]
    fn test_foreign_header_is_unknown_format() {
        let err = read_header(&[0x50, 0x4B, 0x87, 0x68, 0, 0, 0, 1]).unwrap_err();
        assert!(matches!(err, StegError::UnknownStegFormat { .. }));
        assert_eq!(err.exit_code(), 2);
        assert!(read_header(&[0x50, 0x4B, 0x87]).is_err());
    }

    #[test]
    fn test_preset_names_roundtrip() {
        for preset in Preset::ALL {
            assert_eq!(preset.to_string().parse::<Preset>().unwrap(), preset);
        }
        assert_eq!("MINIMAL_IMPACT".parse::<Preset>().unwrap(), Preset::MinimalImpact);
        assert!("fastest".parse::<Preset>().is_err());
        assert_eq!(Preset::default(), Preset::ResistanceHybrid);
    }

    #[test]
    fn test_format_matrix() {
        for preset in Preset::ALL {
            for format in [MediaFormat::Png, MediaFormat::Bmp, MediaFormat::Jpeg] {
                let accepted = preset.check_format(format).is_ok();
                assert_eq!(accepted, preset.outputs_jpeg() == format.is_jpeg(), "{preset} with {format:?}");
            }
        }
        assert!(Preset::ResistanceHybrid.outputs_jpeg());
        assert!(Preset::CompressionResistance.outputs_jpeg());
        assert!(!Preset::DetectionResistance.outputs_jpeg());
        assert!(!Preset::MinimalImpact.outputs_jpeg());
        assert!(!Preset::Test.outputs_jpeg());
    }

    #[test]
    fn test_config_defaults_and_builders() {
        let config = StegConfig::default();
        assert!(config.use_default_header);
        assert!(config.use_error_correction);
        assert_eq!(config.preset, Preset::ResistanceHybrid);
        assert_eq!(config.error_rate, 0.5);
        assert_eq!(config.jpeg_quality, 95);

        let config = config
            .with_default_header(false)
            .with_error_correction(false)
            .with_preset(Preset::Test)
            .with_jpeg_quality(0);
        assert!(!config.use_default_header && !config.use_error_correction);
        assert_eq!(config.preset, Preset::Test);
        assert_eq!(config.jpeg_quality, 1);
    }

    #[test]
    fn test_invalid_error_rate_is_rejected() {
        let steg = ImageSteg::new(StegConfig::default().with_preset(Preset::MinimalImpact).with_error_rate(2.0));
        let mut raster = ArgbRaster::filled(8, 8, 0xFF80_8080);
        assert!(steg.pipeline(&mut raster, DEFAULT_SEED, false).is_err());
    }

    #[test]
    fn test_capacity_of_blank_rasters() {
        let plain = ImageSteg::new(
            StegConfig::default()
                .with_preset(Preset::MinimalImpact)
                .with_error_correction(false)
                .with_default_header(false),
        );
        let mut raster = ArgbRaster::filled(40, 40, 0xFF80_8080);
        // 1600 pixels, two per payload bit
        assert_eq!(plain.capacity_of(&mut raster, DEFAULT_SEED).unwrap(), 100);

        let framed = ImageSteg::with_preset(Preset::MinimalImpact);
        // error correction halves the capacity, the header takes 8 bytes
        assert_eq!(framed.capacity_of(&mut raster, DEFAULT_SEED).unwrap(), 42);

        let mut transparent = ArgbRaster::filled(40, 40, 0x0080_8080);
        assert_eq!(framed.capacity_of(&mut transparent, DEFAULT_SEED).unwrap(), 0);
    }

    #[test]
    fn test_capacity_reserves_header_parity() {
        let mut raster = ArgbRaster::filled(40, 40, 0xFF80_8080);
        // 100 bytes of cover; header codeword 8 + 2 * ceil(8r), payload L + 2 * ceil(Lr)
        for (rate, expected) in [(0.1, 74), (0.3, 53), (0.5, 42), (1.0, 25)] {
            let steg = ImageSteg::new(
                StegConfig::default()
                    .with_preset(Preset::MinimalImpact)
                    .with_error_rate(rate),
            );
            assert_eq!(steg.capacity_of(&mut raster, DEFAULT_SEED).unwrap(), expected, "rate {rate}");
        }
    }
}
