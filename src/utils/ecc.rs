//! Reed-Solomon error correction over GF(2^8).
//!
//! Uses the Data Matrix field: primitive polynomial 0x12D
//! (x^8+x^5+x^3+x^2+1) and generator roots alpha^1 .. alpha^p, so parity is
//! compatible with the common ECC200 encoders. Encoding is systematic: the
//! codeword is the data followed by the parity bytes.
//!
//! A single RS block spans at most 255 bytes. Longer codewords are spread
//! over `b` interleaved blocks: data byte `i` belongs to block `i mod b`, and
//! parity bytes are dealt round-robin the same way. Each block repairs up to
//! half of its own parity, so a run of damaged bytes is shared between blocks
//! instead of landing in one. The output still lists every data byte first,
//! then every parity byte.

use std::sync::OnceLock;

use crate::error::{Result, StegError};

/// Primitive polynomial of the Data Matrix field.
const PRIM_POLY: u16 = 0x12D;

/// Exponent of the first generator root.
const GENERATOR_BASE: i64 = 1;

/// Longest codeword a single block can carry.
const BLOCK_LEN: usize = 255;

/// Order of the multiplicative group.
const ORDER: usize = 255;

/// Power and logarithm tables of alpha = x.
struct Field {
    exp: [u8; ORDER],
    log: [u8; 256],
}

impl Field {
    fn build() -> Self {
        let mut exp = [0u8; ORDER];
        let mut log = [0u8; 256];
        let mut element: u16 = 1;
        for power in 0..ORDER {
            exp[power] = element as u8;
            log[element as usize] = power as u8;
            element <<= 1;
            if element > 0xFF {
                element ^= PRIM_POLY;
            }
        }
        Self { exp, log }
    }

    fn mul(&self, a: u8, b: u8) -> u8 {
        match (a, b) {
            (0, _) | (_, 0) => 0,
            _ => self.exp[(self.log[a as usize] as usize + self.log[b as usize] as usize) % ORDER],
        }
    }

    /// Zero has no inverse.
    fn inv(&self, a: u8) -> Option<u8> {
        (a != 0).then(|| self.exp[(ORDER - self.log[a as usize] as usize) % ORDER])
    }

    /// alpha^e, negative exponents included.
    fn alpha(&self, e: i64) -> u8 {
        self.exp[e.rem_euclid(ORDER as i64) as usize]
    }
}

fn field() -> &'static Field {
    static FIELD: OnceLock<Field> = OnceLock::new();
    FIELD.get_or_init(Field::build)
}

/// Horner evaluation of a polynomial stored highest degree first.
fn eval_desc(poly: &[u8], x: u8) -> u8 {
    let f = field();
    poly.iter().fold(0, |acc, &c| f.mul(acc, x) ^ c)
}

/// Horner evaluation of a polynomial stored lowest degree first.
fn eval_asc(poly: &[u8], x: u8) -> u8 {
    let f = field();
    poly.iter().rev().fold(0, |acc, &c| f.mul(acc, x) ^ c)
}

/// g(x) = (x + alpha^1)(x + alpha^2)..(x + alpha^p), highest degree first.
fn generator(parity_len: usize) -> Vec<u8> {
    let f = field();
    let mut g = Vec::with_capacity(parity_len + 1);
    g.push(1u8);
    for i in 0..parity_len as i64 {
        let root = f.alpha(GENERATOR_BASE + i);
        g.push(0);
        for j in (1..g.len()).rev() {
            g[j] ^= f.mul(g[j - 1], root);
        }
    }
    g
}

// --- Block layout ---

/// Splits `data_len` data and `parity_len` parity bytes over the fewest
/// blocks of at most [`BLOCK_LEN`] bytes. Block `k` takes the data bytes
/// `k, k + b, ..` and the parity bytes at [`parity_slot`].
fn block_layout(data_len: usize, parity_len: usize) -> Vec<(usize, usize)> {
    let blocks = (data_len + parity_len).div_ceil(BLOCK_LEN).max(1);
    (0..blocks)
        .map(|k| {
            let data = data_len / blocks + usize::from(k < data_len % blocks);
            let parity = parity_len / blocks + usize::from(k >= blocks - parity_len % blocks);
            (data, parity)
        })
        .collect()
}

/// Position of the `i`-th parity byte of block `block` among all parity bytes.
///
/// Parity is dealt from the last block backwards so that blocks holding an
/// extra data byte never also hold an extra parity byte.
fn parity_slot(block: usize, i: usize, blocks: usize) -> usize {
    i * blocks + (blocks - 1 - block)
}

// --- Encoding ---

/// Remainder of `data(x) * x^p` divided by g(x).
fn block_parity(data: &[u8], parity_len: usize) -> Vec<u8> {
    if parity_len == 0 {
        return Vec::new();
    }
    let f = field();
    let g = generator(parity_len);
    let mut work = data.to_vec();
    work.resize(data.len() + parity_len, 0);
    for i in 0..data.len() {
        let lead = work[i];
        if lead == 0 {
            continue;
        }
        for (j, &coeff) in g.iter().enumerate().skip(1) {
            work[i + j] ^= f.mul(lead, coeff);
        }
    }
    work.split_off(data.len())
}

/// Systematically encodes `data`, appending `parity_len` parity bytes.
pub fn encode(data: &[u8], parity_len: usize) -> Vec<u8> {
    let layout = block_layout(data.len(), parity_len);
    let blocks = layout.len();

    let mut codeword = Vec::with_capacity(data.len() + parity_len);
    codeword.extend_from_slice(data);
    codeword.resize(data.len() + parity_len, 0);
    let parity = &mut codeword[data.len()..];

    for (k, &(_, block_parity_len)) in layout.iter().enumerate() {
        let block_data: Vec<u8> = data.iter().skip(k).step_by(blocks).copied().collect();
        for (i, byte) in block_parity(&block_data, block_parity_len).into_iter().enumerate() {
            parity[parity_slot(k, i, blocks)] = byte;
        }
    }
    codeword
}

// --- Decoding ---

/// S_i = r(alpha^(base + i)).
fn syndromes(received: &[u8], parity_len: usize) -> Vec<u8> {
    let f = field();
    (0..parity_len as i64)
        .map(|i| eval_desc(received, f.alpha(GENERATOR_BASE + i)))
        .collect()
}

/// Massey's shift-register synthesis. Returns the error locator lowest
/// degree first, padded to its nominal degree.
fn error_locator(syndromes: &[u8]) -> Option<Vec<u8>> {
    let f = field();
    let mut locator = vec![1u8];
    let mut backup = vec![1u8];
    let mut degree = 0usize;
    let mut gap = 1usize;
    let mut last_discrepancy = 1u8;

    for (n, &syndrome) in syndromes.iter().enumerate() {
        let discrepancy = locator
            .iter()
            .enumerate()
            .skip(1)
            .take(degree.min(n))
            .fold(syndrome, |acc, (i, &c)| acc ^ f.mul(c, syndromes[n - i]));
        if discrepancy == 0 {
            gap += 1;
            continue;
        }

        let scale = f.mul(discrepancy, f.inv(last_discrepancy)?);
        let mut next = locator.clone();
        next.resize(next.len().max(backup.len() + gap), 0);
        for (i, &b) in backup.iter().enumerate() {
            next[i + gap] ^= f.mul(scale, b);
        }

        if 2 * degree <= n {
            backup = std::mem::replace(&mut locator, next);
            degree = n + 1 - degree;
            last_discrepancy = discrepancy;
            gap = 1;
        } else {
            locator = next;
            gap += 1;
        }
    }

    locator.resize(degree + 1, 0);
    Some(locator)
}

/// Corrects one block in place, returning how many bytes were repaired.
fn correct_block(block: &mut [u8], parity_len: usize) -> Option<usize> {
    let synd = syndromes(block, parity_len);
    if synd.iter().all(|&s| s == 0) {
        return Some(0);
    }

    let f = field();
    let locator = error_locator(&synd)?;
    let num_errors = locator.len() - 1;
    if num_errors == 0 || 2 * num_errors > parity_len {
        return None;
    }

    // Chien search: an error at index k sits at power p = n - 1 - k, and
    // the locator vanishes at alpha^-p.
    let n = block.len();
    let positions: Vec<usize> = (0..n)
        .filter(|&p| eval_asc(&locator, f.alpha(-(p as i64))) == 0)
        .collect();
    if positions.len() != num_errors {
        return None;
    }

    // Forney with generator base 1: e = Omega(X^-1) / Lambda'(X^-1),
    // Omega = S(x) * Lambda(x) mod x^p.
    let mut omega = vec![0u8; parity_len];
    for (i, &l) in locator.iter().enumerate() {
        for (j, &s) in synd.iter().enumerate().take(parity_len.saturating_sub(i)) {
            omega[i + j] ^= f.mul(l, s);
        }
    }
    // Formal derivative: only odd powers survive in characteristic 2.
    let derivative: Vec<u8> = locator
        .iter()
        .enumerate()
        .skip(1)
        .map(|(i, &c)| if i % 2 == 1 { c } else { 0 })
        .collect();

    for p in positions {
        let x_inv = f.alpha(-(p as i64));
        let magnitude = f.mul(eval_asc(&omega, x_inv), f.inv(eval_asc(&derivative, x_inv))?);
        block[n - 1 - p] ^= magnitude;
    }

    // A miscorrection leaves a non-codeword behind.
    if syndromes(block, parity_len).iter().any(|&s| s != 0) {
        return None;
    }
    Some(num_errors)
}

/// Decodes a codeword produced by [`encode`] with the same `parity_len`.
///
/// # Arguments
/// * `codeword` - Data bytes followed by `parity_len` parity bytes
/// * `parity_len` - Number of parity bytes the encoder appended
///
/// # Returns
/// * `Ok((data, repaired))` with the corrected data and the number of repaired bytes
/// * `Err(StegError::DamagedMessage)` when a block holds more errors than half its parity
pub fn decode(codeword: &[u8], parity_len: usize) -> Result<(Vec<u8>, usize)> {
    if codeword.len() < parity_len {
        return Err(StegError::DamagedMessage(format!(
            "codeword of {} bytes is shorter than its {parity_len} parity bytes",
            codeword.len()
        )));
    }
    let data_len = codeword.len() - parity_len;
    let (data, parity) = codeword.split_at(data_len);
    let layout = block_layout(data_len, parity_len);
    let blocks = layout.len();

    let mut decoded = vec![0u8; data_len];
    let mut corrected = 0;
    for (k, (block_data, block_parity)) in layout.into_iter().enumerate() {
        let mut block: Vec<u8> = data.iter().skip(k).step_by(blocks).copied().collect();
        block.extend((0..block_parity).map(|i| parity[parity_slot(k, i, blocks)]));

        corrected += correct_block(&mut block, block_parity).ok_or_else(|| {
            StegError::DamagedMessage(format!("Reed-Solomon block {k} is beyond repair"))
        })?;
        for (i, &byte) in block[..block_data].iter().enumerate() {
            decoded[k + i * blocks] = byte;
        }
    }

    Ok((decoded, corrected))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_tables() {
        let f = field();
        assert_eq!(f.alpha(0), 1);
        assert_eq!(f.alpha(8), (0x12D & 0xFF) as u8);
        assert_eq!(f.alpha(255), 1);
        for a in 1..=255u8 {
            assert_eq!(f.mul(a, f.inv(a).unwrap()), 1, "inverse of {a}");
        }
        assert_eq!(f.inv(0), None);
    }

    #[test]
    fn test_generator_roots() {
        let f = field();
        let g = generator(6);
        assert_eq!(g.len(), 7);
        for i in 1..=6 {
            assert_eq!(eval_desc(&g, f.alpha(i)), 0, "alpha^{i} must be a root");
        }
        assert_ne!(eval_desc(&g, f.alpha(0)), 0, "alpha^0 is not a root");
    }

    #[test]
    fn test_codeword_has_zero_syndromes() {
        let data = b"Hello World";
        let codeword = encode(data, 12);
        assert_eq!(&codeword[..data.len()], data);
        assert!(syndromes(&codeword, 12).iter().all(|&s| s == 0));
    }

    #[test]
    fn test_clean_decode() {
        let data: Vec<u8> = (0..40).map(|i| (i * 7 + 3) as u8).collect();
        let codeword = encode(&data, 40);
        assert_eq!(decode(&codeword, 40).unwrap(), (data, 0));
    }

    #[test]
    fn test_corrects_up_to_half_the_parity() {
        let data: Vec<u8> = (0..30).map(|i| (i * 31 + 5) as u8).collect();
        let mut codeword = encode(&data, 30);
        for k in 0..15 {
            codeword[k * 4] ^= 0x5A + k as u8;
        }
        let (decoded, corrected) = decode(&codeword, 30).unwrap();
        assert_eq!(decoded, data);
        assert_eq!(corrected, 15);
    }

    #[test]
    fn test_errors_in_parity_are_corrected() {
        let data = b"parity side".to_vec();
        let mut codeword = encode(&data, 8);
        let last = codeword.len() - 1;
        codeword[last] ^= 0xFF;
        codeword[last - 3] ^= 0x01;
        assert_eq!(decode(&codeword, 8).unwrap().0, data);
    }

    #[test]
    fn test_too_many_errors_fail() {
        let data: Vec<u8> = (0..20).map(|i| i as u8).collect();
        let mut codeword = encode(&data, 8);
        for k in 0..10 {
            codeword[k * 2 + 1] ^= 0xA5;
        }
        assert!(matches!(
            decode(&codeword, 8),
            Err(StegError::DamagedMessage(_))
        ));
    }

    #[test]
    fn test_block_layout() {
        assert_eq!(block_layout(10, 10), vec![(10, 10)]);
        assert_eq!(block_layout(0, 0), vec![(0, 0)]);

        for (data_len, parity_len) in [(255, 255), (200, 200), (301, 97), (1000, 2)] {
            let layout = block_layout(data_len, parity_len);
            assert!(layout.iter().all(|(d, p)| d + p <= BLOCK_LEN), "{layout:?}");
            assert_eq!(layout.iter().map(|(d, _)| d).sum::<usize>(), data_len);
            assert_eq!(layout.iter().map(|(_, p)| p).sum::<usize>(), parity_len);

            let blocks = layout.len();
            let mut slots: Vec<usize> = layout
                .iter()
                .enumerate()
                .flat_map(|(k, &(_, p))| (0..p).map(move |i| parity_slot(k, i, blocks)))
                .collect();
            slots.sort_unstable();
            assert_eq!(slots, (0..parity_len).collect::<Vec<_>>(), "parity slots of {layout:?}");
        }
    }

    #[test]
    fn test_long_codewords_use_blocks() {
        let data: Vec<u8> = (0..400).map(|i| (i % 251) as u8).collect();
        let mut codeword = encode(&data, 400);
        assert_eq!(codeword.len(), 800);
        assert_eq!(&codeword[..400], &data[..]);
        for k in 0..40 {
            codeword[k * 19] ^= 0x3C;
        }
        assert_eq!(decode(&codeword, 400).unwrap().0, data);
    }

    #[test]
    fn test_bursts_are_shared_between_blocks() {
        // two blocks with 100 parity bytes each
        let data: Vec<u8> = (0..200).map(|i| (i * 13 + 1) as u8).collect();
        let mut codeword = encode(&data, 200);
        for byte in &mut codeword[..60] {
            *byte ^= 0x81;
        }
        let (decoded, corrected) = decode(&codeword, 200).unwrap();
        assert_eq!(decoded, data);
        assert_eq!(corrected, 60);

        // 55 errors per block exceed the 50 each can repair
        let mut codeword = encode(&data, 200);
        for byte in &mut codeword[..110] {
            *byte ^= 0x81;
        }
        assert!(matches!(
            decode(&codeword, 200),
            Err(StegError::DamagedMessage(_))
        ));
    }

    #[test]
    fn test_zero_parity_is_passthrough() {
        let data = b"plain".to_vec();
        assert_eq!(encode(&data, 0), data);
        assert_eq!(decode(&data, 0).unwrap(), (data, 0));
    }
}
