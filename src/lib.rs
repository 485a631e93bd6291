//! Steganography for PNG, BMP and JPEG images.
//!
//! Payload bytes are spread over cover elements (pixels or pixel blocks)
//! chosen by a seeded shuffle. Spatial and DCT-domain embedders decide how a
//! single element carries a bit; plain and syndrome-trellis encoders decide
//! which elements change; Reed-Solomon coding guards the payload against
//! bits lost to JPEG recompression. [`ImageSteg`] ties it together behind a
//! handful of presets.

pub mod dct;
pub mod distortion;
pub mod embedders;
pub mod encoders;
pub mod error;
pub mod image_handler;
pub mod overlay;
pub mod steg;
pub mod utils;
pub mod wavelet;

pub use error::{Result, StegError};
pub use steg::{DEFAULT_SEED, ImageSteg, Preset, StegConfig};
