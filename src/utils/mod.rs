pub mod bits;
pub mod convert;
pub mod ecc;
pub mod locations;
pub mod quantizer;
