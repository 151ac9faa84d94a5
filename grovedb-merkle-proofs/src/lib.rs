//! Serialized binary Merkle trees with compact, composable proofs.
//!
//! A tree over `n` elements is a flat array of `2 * 2^depth` slots (see
//! [`address`]). Leaves are `H(prefix || element)`, internal nodes
//! `H(left || right)` (children ordered when hashing is sorted), and the
//! public commitment is the mixed root `H(word(n) || element_root)`, which
//! binds the element count. Unbalanced trees carry a node without a right
//! child up unhashed.
//!
//! Proofs cover single elements, sets of elements (in three encodings),
//! the append frontier, both of those at once, and the element count.
//! Verifiers return plain booleans; update and append operations return
//! the recomputed roots for the caller to compare against its own
//! commitment. A [`PartialTree`] rebuilds the known part of a tree from a
//! proof and keeps issuing proofs from it.

#![warn(missing_docs)]

pub mod address;
mod config;
mod error;
pub(crate) mod hash;
mod partial;
pub(crate) mod proof;
mod tree;
mod words;

#[cfg(test)]
pub(crate) mod test_utils;
#[cfg(test)]
mod tests;

pub use address::{MAX_ELEMENT_COUNT, minimum_combinable_index};
pub use config::{DEFAULT_ELEMENT_PREFIX, TreeConfig};
pub use error::MerkleError;
pub use hash::{Blake3Hasher, Digest, Hasher, Keccak256Hasher, ZERO_DIGEST};
pub use partial::PartialTree;
pub use proof::{
    AppendOutcome, AppendProof, CombinedProof, MultiProof, MultiProofBody, MultiProofEncoding,
    Proof, SingleProof, SizeProof, SizeProofBody, SizeProofMode, UpdateOutcome,
};
pub use tree::MerkleTree;
pub use words::{from_word, to_word};
