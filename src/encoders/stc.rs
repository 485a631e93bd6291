//! Syndrome-trellis codes.
//!
//! The payload is the syndrome `H * y` of the stego bits `y`, where `H` is a
//! banded parity-check matrix built from a small random submatrix `H_hat`.
//! The Viterbi pass picks the `y` that satisfies the syndrome with the
//! smallest additive distortion, so only cheap cover elements change.
//!
//! Both sides draw `H_hat` from the same seeded stream, which makes the seed
//! part of the stego format.

use bitvec::prelude::*;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use super::{Encoder, SequenceCursor, check_capacity};
use crate::distortion::Distortion;
use crate::embedders::Embedder;
use crate::error::{Result, StegError};
use crate::overlay::Overlay;
use crate::utils::bits::{BitString, and_parity, payload_bits, payload_bytes};
use crate::utils::locations::seeded_rng;

/// Constraint height of `H_hat`.
pub const HAT_HEIGHT: usize = 10;

const STATES: usize = 1 << HAT_HEIGHT;

/// Columns have their top and bottom bit set and must be distinct, which
/// leaves `2^(h-2)` candidates.
const MAX_COVER_PER_BIT: usize = (1 << (HAT_HEIGHT - 2)) - 1;

const COLUMN_ENDS: usize = (1 << (HAT_HEIGHT - 1)) | 1;

/// How the stego bits are written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StcMode {
    /// `embed` every used element, so robust embedders enforce their margin everywhere.
    #[default]
    Embed,
    /// `flip` only where the stego bit differs from the cover bit.
    LossLess,
}

/// Draws `width` distinct columns of height [`HAT_HEIGHT`], each with its top and bottom bit set.
pub fn build_h_hat(width: usize, rng: &mut ChaCha8Rng) -> Result<Vec<usize>> {
    if width > MAX_COVER_PER_BIT {
        return Err(StegError::encoder(format!(
            "submatrix width {width} exceeds {MAX_COVER_PER_BIT}"
        )));
    }

    let mut taken = bitvec![0; STATES];
    let mut columns = Vec::with_capacity(width);
    for _ in 0..width {
        let mut column = rng.random_range(0..STATES) | COLUMN_ENDS;
        while taken[column] {
            column = ((column + 2) % STATES) | COLUMN_ENDS;
        }
        taken.set(column, true);
        columns.push(column);
    }
    Ok(columns)
}

/// Finds the stego bits of least total cost whose syndrome is `message`.
///
/// `cover[i]` is the bit element `i` represents and `rho[i]` the cost of
/// changing it. Elements past `message.len() * columns.len()` are outside the
/// trellis and keep their cover bit.
pub fn viterbi(
    cover: &BitSlice<u8, Lsb0>,
    rho: &[f64],
    message: &BitSlice<u8, Lsb0>,
    columns: &[usize],
) -> Result<BitString> {
    let rows = message.len() * columns.len();
    if message.len() > cover.len() || rows > cover.len() || rho.len() < rows {
        return Err(StegError::encoder(format!(
            "message of {} bits does not fit {} cover bits",
            message.len(),
            cover.len()
        )));
    }

    let mut path: BitVec<u64, Lsb0> = BitVec::repeat(false, rows * STATES);
    let mut weight = vec![f64::INFINITY; STATES];
    let mut next = vec![0.0; STATES];
    weight[0] = 0.0;

    let mut index = 0;
    for bit in message.iter().by_vals() {
        for &column in columns {
            let (keep, change) = if cover[index] { (rho[index], 0.0) } else { (0.0, rho[index]) };
            let row = &mut path[index * STATES..(index + 1) * STATES];
            for state in 0..STATES {
                let w0 = weight[state] + keep;
                let w1 = weight[state ^ column] + change;
                row.set(state, w1 < w0);
                next[state] = w0.min(w1);
            }
            std::mem::swap(&mut weight, &mut next);
            index += 1;
        }

        // the lowest syndrome bit is final once its block is done
        for state in 0..STATES / 2 {
            weight[state] = weight[2 * state + bit as usize];
        }
        weight[STATES / 2..].fill(f64::INFINITY);
    }

    let mut state = weight
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map_or(0, |(state, _)| state);

    let mut stego = cover.to_bitvec();
    for bit in message.iter().by_vals().rev() {
        state = ((state << 1) | bit as usize) & (STATES - 1);
        for &column in columns.iter().rev() {
            index -= 1;
            let one = path[index * STATES + state];
            stego.set(index, one);
            if one {
                state ^= column;
            }
        }
    }
    Ok(stego)
}

/// Computes `H * stego` for a message of `length` bits without building `H`.
///
/// Row `i` of `H` holds row `j` of `H_hat` at column block `i - j`, so each
/// message bit is the parity of at most [`HAT_HEIGHT`] window intersections.
pub fn syndrome(stego: &BitSlice<u8, Lsb0>, columns: &[usize], length: usize) -> BitString {
    let width = columns.len();
    let hat_rows: Vec<BitString> = (0..HAT_HEIGHT)
        .map(|j| columns.iter().map(|column| (column >> j) & 1 == 1).collect())
        .collect();

    let mut message = BitString::with_capacity(length);
    for i in 0..length {
        let mut parity = false;
        for (j, hat_row) in hat_rows.iter().enumerate().take(i + 1) {
            let block = i - j;
            parity ^= and_parity(hat_row, &stego[block * width..(block + 1) * width]);
        }
        message.push(parity);
    }
    message
}

/// Minimum-distortion encoder over any overlay, embedder and distortion.
pub struct StcEncoder<O, E, D> {
    overlay: O,
    embedder: E,
    distortion: D,
    mode: StcMode,
    cursor: SequenceCursor,
    rng: ChaCha8Rng,
}

impl<O, E, D> StcEncoder<O, E, D>
where
    O: Overlay,
    E: Embedder<O::Element>,
    D: Distortion<O::Element>,
{
    /// Creates a syndrome-trellis encoder over `overlay`.
    ///
    /// # Arguments
    /// * `overlay` - Cover elements, in embedding order
    /// * `embedder` - Reads and writes the bit of a single element
    /// * `distortion` - Cost of changing an element, steering the trellis search
    /// * `mode` - Whether every element in the trellis is written or only the changed ones
    /// * `sequential` - Whether each call continues where the previous one stopped
    /// * `seed` - Seed of the `H_hat` submatrix; decoding needs the same one
    ///
    pub fn new(overlay: O, embedder: E, distortion: D, mode: StcMode, sequential: bool, seed: u64) -> Self {
        Self {
            overlay,
            embedder,
            distortion,
            mode,
            cursor: SequenceCursor::new(sequential),
            rng: seeded_rng(seed),
        }
    }

    pub fn into_overlay(self) -> O {
        self.overlay
    }

    /// Cover elements used for a message of `bits` bits.
    fn cover_units(&self, bits: usize) -> usize {
        if self.cursor.is_sequential() {
            bits * 2
        } else {
            (self.available() * 2).min(bits * MAX_COVER_PER_BIT)
        }
    }

    fn cover_bits(&self, units: usize) -> Result<BitString> {
        let start = self.cursor.position();
        let mut bits = BitString::with_capacity(units);
        for position in start..start + units {
            bits.push(self.embedder.represents_one(&self.overlay.get(position)?)?);
        }
        Ok(bits)
    }

    fn hide(&mut self, payload: &[u8]) -> Result<()> {
        let message = payload_bits(payload);
        let units = self.cover_units(message.len());
        let start = self.cursor.position();

        let mut cover = BitString::with_capacity(units);
        let mut rho = Vec::with_capacity(units);
        for position in start..start + units {
            let element = self.overlay.get(position)?;
            cover.push(self.embedder.represents_one(&element)?);
            let flipped = self.embedder.flip(&element)?;
            rho.push(self.distortion.distortion(&element, &flipped)?);
        }

        let columns = build_h_hat(units / message.len(), &mut self.rng)?;
        let stego = viterbi(&cover, &rho, &message, &columns)?;

        let mut changed = 0;
        for (i, (one, was_one)) in stego.iter().by_vals().zip(cover.iter().by_vals()).enumerate() {
            let position = start + i;
            match self.mode {
                StcMode::Embed => {
                    let element = self.overlay.get(position)?;
                    self.overlay.set(position, self.embedder.embed(&element, one)?)?;
                }
                StcMode::LossLess if one != was_one => {
                    let element = self.overlay.get(position)?;
                    self.overlay.set(position, self.embedder.flip(&element)?)?;
                }
                StcMode::LossLess => continue,
            }
            if one != was_one {
                changed += 1;
            }
        }

        self.cursor.advance(units);
        debug!(
            bits = message.len(),
            units,
            width = columns.len(),
            changed,
            mode = ?self.mode,
            "stc encode"
        );
        Ok(())
    }

    fn reveal(&mut self, length: usize) -> Result<Vec<u8>> {
        let bits = length * 8;
        let units = self.cover_units(bits);
        let cover = self.cover_bits(units)?;
        let columns = build_h_hat(units / bits, &mut self.rng)?;
        let message = syndrome(&cover, &columns, bits);
        self.cursor.advance(units);
        Ok(payload_bytes(&message, length))
    }
}

impl<O, E, D> Encoder for StcEncoder<O, E, D>
where
    O: Overlay,
    E: Embedder<O::Element>,
    D: Distortion<O::Element>,
{
    fn encode(&mut self, payload: &[u8]) -> Result<()> {
        check_capacity(payload.len() * 8, self.available())?;
        if payload.is_empty() {
            return Ok(());
        }
        self.hide(payload).map_err(StegError::into_encoder_error)
    }

    fn decode(&mut self, length: usize) -> Result<Vec<u8>> {
        check_capacity(length * 8, self.available())?;
        if length == 0 {
            return Ok(Vec::new());
        }
        self.reveal(length).map_err(StegError::into_encoder_error)
    }

    /// Half of the remaining elements; the trellis needs at least two per bit.
    fn available(&self) -> usize {
        self.overlay.available().saturating_sub(self.cursor.position()) / 2
    }
}
