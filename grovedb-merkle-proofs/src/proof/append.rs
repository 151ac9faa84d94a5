//! Append proofs.
//!
//! The right frontier of a tree (the roots of its maximal perfect subtrees,
//! largest first) determines the element root: folding it from the right
//! with `H(peak, acc)` reproduces the passthrough rule of unbalanced trees.
//! It is also all that is needed to append, since new leaves only ever merge
//! with frontier peaks.

use bincode::{Decode, Encode};

use super::{AppendOutcome, NodeSource, leaves_of};
use crate::{
    Digest, Hasher, MerkleError, TreeConfig, ZERO_DIGEST,
    address::{check_element_count, frontier_slots},
    hash::{hash_node, mixed_root},
    words::{from_word, to_word},
};

/// Proof of the right frontier of a tree.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct AppendProof {
    /// Mixed root the proof was generated against.
    pub root: Digest,
    /// Number of elements in the tree.
    pub element_count: usize,
    /// Frontier subtree roots, largest first. One per set bit of
    /// `element_count`.
    pub decommitments: Vec<Digest>,
}

impl AppendProof {
    pub(crate) fn generate<H: Hasher, S: NodeSource<H>>(source: &S) -> Result<Self, MerkleError> {
        source.config().require_unbalanced("append proof")?;
        let element_count = source.element_count();
        let decommitments = frontier_decommitments(source)?;

        log::debug!(
            "append proof for {} elements with {} decommitments",
            element_count,
            decommitments.len()
        );
        Ok(AppendProof {
            root: source.root(),
            element_count,
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
    pub fn from_compact(root: Digest, words: &[Digest]) -> Result<Self, MerkleError> {
        let (count_word, decommitments) = words
            .split_first()
            .ok_or_else(|| MerkleError::MalformedProof("compact proof is empty".into()))?;
        Ok(AppendProof {
            root,
            element_count: from_word(count_word)?,
            decommitments: decommitments.to_vec(),
        })
    }

    /// Whether the frontier reproduces the claimed root.
    pub fn verify<H: Hasher>(&self, config: &TreeConfig<H>) -> bool {
        frontier_root::<H>(config, self.element_count, &self.decommitments)
            .is_ok_and(|root| root == self.root)
    }

    /// Roots before and after appending `elements`.
    ///
    /// Fails with [`MerkleError::RootMismatch`] if the frontier does not
    /// reproduce the proof's root.
    pub fn append<H: Hasher, E: AsRef<[u8]>>(
        &self,
        config: &TreeConfig<H>,
        elements: &[E],
    ) -> Result<AppendOutcome, MerkleError> {
        config.require_unbalanced("append")?;
        if elements.is_empty() {
            return Err(MerkleError::InvalidInput(
                "at least one element must be appended".into(),
            ));
        }
        let root = frontier_root::<H>(config, self.element_count, &self.decommitments)?;
        if root != self.root {
            return Err(MerkleError::root_mismatch(&self.root, &root));
        }
        let leaves = leaves_of(config, elements);
        append_to_frontier::<H>(
            config.sorted_hash(),
            root,
            self.element_count,
            &self.decommitments,
            &leaves,
        )
    }
}

/// Frontier subtree roots of `source`, largest first.
pub(crate) fn frontier_decommitments<H: Hasher, S: NodeSource<H>>(
    source: &S,
) -> Result<Vec<Digest>, MerkleError> {
    frontier_slots(source.element_count())
        .into_iter()
        .map(|slot| source.node(slot))
        .collect()
}

/// Mixed root committed to by `frontier`.
pub(crate) fn frontier_root<H: Hasher>(
    config: &TreeConfig<H>,
    element_count: usize,
    frontier: &[Digest],
) -> Result<Digest, MerkleError> {
    config.validate_element_count(element_count)?;
    let expected = element_count.count_ones() as usize;
    if frontier.len() != expected {
        return Err(MerkleError::MalformedProof(format!(
            "{} elements need {} frontier decommitments, got {}",
            element_count,
            expected,
            frontier.len()
        )));
    }
    Ok(mixed_root::<H>(
        element_count,
        &fold_frontier::<H>(config.sorted_hash(), frontier),
    ))
}

/// Element root from frontier peaks, largest first.
pub(crate) fn fold_frontier<H: Hasher>(sorted_hash: bool, frontier: &[Digest]) -> Digest {
    frontier
        .iter()
        .rev()
        .copied()
        .reduce(|acc, peak| hash_node::<H>(&peak, &acc, sorted_hash))
        .unwrap_or(ZERO_DIGEST)
}

/// Push `leaves` onto the frontier of a tree of `element_count` elements and
/// report the resulting roots. `root` is the mixed root before appending.
pub(crate) fn append_to_frontier<H: Hasher>(
    sorted_hash: bool,
    root: Digest,
    element_count: usize,
    frontier: &[Digest],
    leaves: &[Digest],
) -> Result<AppendOutcome, MerkleError> {
    let new_count = element_count
        .checked_add(leaves.len())
        .ok_or_else(|| MerkleError::InvalidInput("element count overflows".into()))?;
    check_element_count(new_count)?;

    let mut peaks: Vec<(usize, Digest)> = (0..usize::BITS as usize)
        .rev()
        .filter(|height| element_count >> height & 1 == 1)
        .map(|height| 1 << height)
        .zip(frontier.iter().copied())
        .collect();
    for leaf in leaves {
        peaks.push((1, *leaf));
        while let &[.., (left_size, left), (right_size, right)] = peaks.as_slice() {
            if left_size != right_size {
                break;
            }
            peaks.truncate(peaks.len() - 2);
            peaks.push((left_size * 2, hash_node::<H>(&left, &right, sorted_hash)));
        }
    }

    let new_frontier: Vec<Digest> = peaks.into_iter().map(|(_, peak)| peak).collect();
    Ok(AppendOutcome {
        root,
        new_root: mixed_root::<H>(new_count, &fold_frontier::<H>(sorted_hash, &new_frontier)),
        element_count: new_count,
    })
}
