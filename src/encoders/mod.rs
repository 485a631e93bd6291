//! Payload encoders map byte payloads onto cover elements.

use crate::error::{Result, StegError};

pub mod plain;
pub mod reed_solomon;
pub mod stc;

pub use plain::{PlainEncoder, PlainMode};
pub use reed_solomon::ReedSolomon;
pub use stc::{StcEncoder, StcMode};

/// Writes and reads byte payloads. All sizes reported by `available` are in bits.
pub trait Encoder {
    fn encode(&mut self, payload: &[u8]) -> Result<()>;

    /// Reads back `length` bytes.
    fn decode(&mut self, length: usize) -> Result<Vec<u8>>;

    /// Payload bits that still fit.
    fn available(&self) -> usize;

    /// Payload bits one more `encode` call could take after sequential calls
    /// have already written payloads of the `written` byte lengths.
    fn available_after(&self, written: &[usize]) -> usize {
        self.available()
            .saturating_sub(written.iter().sum::<usize>() * 8)
    }
}

impl<E: Encoder + ?Sized> Encoder for Box<E> {
    fn encode(&mut self, payload: &[u8]) -> Result<()> {
        (**self).encode(payload)
    }

    fn decode(&mut self, length: usize) -> Result<Vec<u8>> {
        (**self).decode(length)
    }

    fn available(&self) -> usize {
        (**self).available()
    }

    fn available_after(&self, written: &[usize]) -> usize {
        (**self).available_after(written)
    }
}

/// Position of the next unused cover element.
///
/// In sequential mode every call starts where the previous one stopped;
/// otherwise every call starts at the first element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceCursor {
    position: usize,
    sequential: bool,
}

impl SequenceCursor {
    pub fn new(sequential: bool) -> Self {
        Self {
            position: 0,
            sequential,
        }
    }

    pub fn is_sequential(&self) -> bool {
        self.sequential
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Marks `units` elements as consumed.
    pub fn advance(&mut self, units: usize) {
        if self.sequential {
            self.position += units;
        }
    }
}

pub(crate) fn check_capacity(required_bits: usize, available_bits: usize) -> Result<()> {
    if required_bits > available_bits {
        return Err(StegError::MediaCapacity {
            required: required_bits,
            available: available_bits,
        });
    }
    Ok(())
}
