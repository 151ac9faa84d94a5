//! Membership and update proofs for one element.

use bincode::{Decode, Encode};

use super::{NodeSource, UpdateOutcome, ensure_consumed, next_decommitment};
use crate::{
    Digest, Hasher, MerkleError, TreeConfig,
    address::{leaf_count, node_exists},
    hash::{hash_node, leaf_hash, mixed_root},
    words::{from_word, to_word},
};

/// Proof that `element` sits at `index`.
///
/// `decommitments` are the existing siblings on the path from the leaf to
/// the root, leaf level first. Levels where the path node has no sibling
/// (the unbalanced right edge) contribute nothing.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct SingleProof {
    /// Mixed root the proof was generated against.
    pub root: Digest,
    /// Number of elements in the tree.
    pub element_count: usize,
    /// Index of the proved element.
    pub index: usize,
    /// The proved element.
    pub element: Vec<u8>,
    /// Sibling digests, leaf level first.
    pub decommitments: Vec<Digest>,
}

impl SingleProof {
    pub(crate) fn generate<H: Hasher, S: NodeSource<H>>(
        source: &S,
        index: usize,
    ) -> Result<Self, MerkleError> {
        let element_count = source.element_count();
        if index >= element_count {
            return Err(MerkleError::IndexOutOfRange {
                index,
                element_count,
            });
        }

        let mut decommitments = Vec::new();
        let mut slot = leaf_count(element_count) + index;
        while slot > 1 {
            let sibling = slot ^ 1;
            if node_exists(sibling, element_count) {
                decommitments.push(source.node(sibling)?);
            }
            slot >>= 1;
        }

        log::debug!(
            "single proof for index {} of {} with {} decommitments",
            index,
            element_count,
            decommitments.len()
        );
        Ok(SingleProof {
            root: source.root(),
            element_count,
            index,
            element: source.element(index)?.to_vec(),
            decommitments,
        })
    }

    /// Compact words: `[word(element_count), decommitments...]`.
    pub fn to_compact(&self) -> Vec<Digest> {
        let mut words = Vec::with_capacity(1 + self.decommitments.len());
        words.push(to_word(self.element_count));
        words.extend_from_slice(&self.decommitments);
        words
    }

    /// Rebuild a proof from its compact words.
    pub fn from_compact(
        root: Digest,
        index: usize,
        element: Vec<u8>,
        words: &[Digest],
    ) -> Result<Self, MerkleError> {
        let (count_word, decommitments) = words
            .split_first()
            .ok_or_else(|| MerkleError::MalformedProof("compact proof is empty".into()))?;
        Ok(SingleProof {
            root,
            element_count: from_word(count_word)?,
            index,
            element,
            decommitments: decommitments.to_vec(),
        })
    }

    /// Whether the proof reproduces its claimed root.
    pub fn verify<H: Hasher>(&self, config: &TreeConfig<H>) -> bool {
        self.roots(config, None)
            .is_ok_and(|outcome| outcome.root == self.root)
    }

    /// Roots before and after replacing the proved element with
    /// `new_element`.
    pub fn update<H: Hasher>(
        &self,
        config: &TreeConfig<H>,
        new_element: &[u8],
    ) -> Result<UpdateOutcome, MerkleError> {
        self.roots(config, Some(new_element))
    }

    fn roots<H: Hasher>(
        &self,
        config: &TreeConfig<H>,
        new_element: Option<&[u8]>,
    ) -> Result<UpdateOutcome, MerkleError> {
        let element_count = self.element_count;
        if self.index >= element_count {
            return Err(MerkleError::IndexOutOfRange {
                index: self.index,
                element_count,
            });
        }
        config.validate_element_count(element_count)?;

        let sorted = config.sorted_hash();
        let mut hash = leaf_hash::<H>(config.element_prefix(), &self.element);
        let mut new_hash =
            new_element.map(|element| leaf_hash::<H>(config.element_prefix(), element));
        let mut decommitments = self.decommitments.iter();

        let mut slot = leaf_count(element_count) + self.index;
        while slot > 1 {
            let sibling = slot ^ 1;
            if node_exists(sibling, element_count) {
                let decommitment = next_decommitment(&mut decommitments)?;
                let (combined, combined_new) = if slot & 1 == 1 {
                    (
                        hash_node::<H>(&decommitment, &hash, sorted),
                        new_hash.map(|new| hash_node::<H>(&decommitment, &new, sorted)),
                    )
                } else {
                    (
                        hash_node::<H>(&hash, &decommitment, sorted),
                        new_hash.map(|new| hash_node::<H>(&new, &decommitment, sorted)),
                    )
                };
                hash = combined;
                new_hash = combined_new;
            }
            slot >>= 1;
        }
        ensure_consumed(decommitments)?;

        Ok(UpdateOutcome {
            root: mixed_root::<H>(element_count, &hash),
            new_root: mixed_root::<H>(element_count, &new_hash.unwrap_or(hash)),
        })
    }
}
