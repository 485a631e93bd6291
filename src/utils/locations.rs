//! Seeded traversal orders for cover elements.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// The reproducible stream behind every seeded decision in the crate.
pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Fisher-Yates shuffle of `order` driven by `seed`.
///
/// Indices are drawn as `u32` so the permutation does not depend on the
/// platform's pointer width.
pub fn shuffle_order(order: &mut [usize], seed: u64) {
    let mut rng = seeded_rng(seed);
    for i in (1..order.len()).rev() {
        let j = rng.random_range(0..=i as u32) as usize;
        order.swap(i, j);
    }
}

/// Element indices `0..capacity` that pass `keep`, optionally shuffled.
pub fn element_order(capacity: usize, seed: Option<u64>, mut keep: impl FnMut(usize) -> bool) -> Vec<usize> {
    let mut order: Vec<usize> = (0..capacity).filter(|&i| keep(i)).collect();
    if let Some(seed) = seed {
        shuffle_order(&mut order, seed);
    }
    order
}
