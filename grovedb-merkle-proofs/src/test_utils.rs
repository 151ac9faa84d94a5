//! Test utilities: deterministic elements and tree configurations.

use crate::{Hasher, Keccak256Hasher, TreeConfig};

/// `count` 32-byte elements chained from `seed`: `e_0 = H(seed || seed)`,
/// `e_i = H(e_{i-1} || e_{i-1})`.
pub(crate) fn generate_elements(count: usize, seed: &[u8]) -> Vec<Vec<u8>> {
    let mut elements = Vec::with_capacity(count);
    let mut previous = seed.to_vec();
    for _ in 0..count {
        let next = Keccak256Hasher::digest(&[previous.as_slice(), previous.as_slice()]).to_vec();
        elements.push(next.clone());
        previous = next;
    }
    elements
}

/// The reference elements: seed `0xff`.
pub(crate) fn reference_elements(count: usize) -> Vec<Vec<u8>> {
    generate_elements(count, &[0xff])
}

/// Unsorted and sorted unbalanced configurations.
pub(crate) fn unbalanced_configs() -> [TreeConfig; 2] {
    [
        TreeConfig::new(),
        TreeConfig::new().with_sorted_hash(true),
    ]
}

/// Every combination of sorted hashing and balance.
pub(crate) fn all_configs() -> [TreeConfig; 4] {
    [
        TreeConfig::new(),
        TreeConfig::new().with_sorted_hash(true),
        TreeConfig::new().with_unbalanced(false),
        TreeConfig::new().with_sorted_hash(true).with_unbalanced(false),
    ]
}
