//! Digest type, injectable hash functions and the node combination rules.
//!
//! - Leaves:     `H(element_prefix || element)`
//! - Internal:   `H(left || right)`, children ordered ascending first in
//!   sorted-hash mode
//! - Mixed root: `H(word(element_count) || element_root)`, or the zero
//!   digest for an empty tree

use std::fmt;

use sha3::Digest as _;

use crate::words::to_word;

/// A 32-byte node digest.
pub type Digest = [u8; 32];

/// Root of a tree without elements.
pub const ZERO_DIGEST: Digest = [0u8; 32];

/// A fixed-width hash function over the concatenation of `parts`.
///
/// Implementations are zero-sized markers so the hasher is chosen by type
/// (see [`TreeConfig`](crate::TreeConfig)) rather than carried at runtime.
pub trait Hasher:
    Clone + Copy + fmt::Debug + Default + PartialEq + Eq + Send + Sync + 'static
{
    /// Hash the concatenation of `parts`.
    fn digest(parts: &[&[u8]]) -> Digest;
}

/// Keccak-256, the hash the reference vectors are computed with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Keccak256Hasher;

impl Hasher for Keccak256Hasher {
    fn digest(parts: &[&[u8]]) -> Digest {
        let mut hasher = sha3::Keccak256::new();
        for part in parts {
            hasher.update(part);
        }
        hasher.finalize().into()
    }
}

/// Blake3, as used by the other grovedb trees.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Blake3Hasher;

impl Hasher for Blake3Hasher {
    fn digest(parts: &[&[u8]]) -> Digest {
        let mut hasher = blake3::Hasher::new();
        for part in parts {
            hasher.update(part);
        }
        *hasher.finalize().as_bytes()
    }
}

/// Hash a (prefixed) element into its leaf digest.
pub(crate) fn leaf_hash<H: Hasher>(prefix: &[u8], element: &[u8]) -> Digest {
    H::digest(&[prefix, element])
}

/// Combine two children into their parent.
pub(crate) fn hash_node<H: Hasher>(left: &Digest, right: &Digest, sorted: bool) -> Digest {
    if sorted && right < left {
        H::digest(&[right.as_slice(), left.as_slice()])
    } else {
        H::digest(&[left.as_slice(), right.as_slice()])
    }
}

/// Bind the element count into the public commitment.
pub(crate) fn mixed_root<H: Hasher>(element_count: usize, element_root: &Digest) -> Digest {
    if element_count == 0 {
        return ZERO_DIGEST;
    }
    H::digest(&[to_word(element_count).as_slice(), element_root.as_slice()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak_empty_input() {
        assert_eq!(
            hex::encode(Keccak256Hasher::digest(&[])),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_parts_are_concatenated() {
        assert_eq!(
            Keccak256Hasher::digest(&[&b"ab"[..], &b"cd"[..]]),
            Keccak256Hasher::digest(&[&b"abcd"[..]])
        );
        assert_eq!(
            Blake3Hasher::digest(&[&b"ab"[..], &b"cd"[..]]),
            *blake3::hash(b"abcd").as_bytes()
        );
    }

    #[test]
    fn test_sorted_node_hash_is_symmetric() {
        let a = [1u8; 32];
        let b = [2u8; 32];
        assert_eq!(
            hash_node::<Keccak256Hasher>(&a, &b, true),
            hash_node::<Keccak256Hasher>(&b, &a, true)
        );
        assert_ne!(
            hash_node::<Keccak256Hasher>(&a, &b, false),
            hash_node::<Keccak256Hasher>(&b, &a, false)
        );
    }

    #[test]
    fn test_mixed_root_of_empty_tree_is_zero() {
        assert_eq!(mixed_root::<Keccak256Hasher>(0, &[7u8; 32]), ZERO_DIGEST);
        assert_ne!(mixed_root::<Keccak256Hasher>(1, &ZERO_DIGEST), ZERO_DIGEST);
    }
}
