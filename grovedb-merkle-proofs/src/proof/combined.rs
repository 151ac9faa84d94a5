//! Combined proofs: update or use existing elements, then append.
//!
//! A combined proof is a multi proof whose highest index falls in the
//! smallest frontier subtree. The replay then passes through every frontier
//! root: the smallest one is the right-edge node at height
//! `trailing_zeros(n)`, and each larger one is the left sibling the edge
//! node is hashed against at the level matching a set bit of `n`. No
//! separate append decommitments are needed.

use bincode::{Decode, Encode};

use super::{
    AppendOutcome, NodeSource,
    accumulate::{Accumulation, EdgeLift},
    append::append_to_frontier,
    leaves_of,
    multi::{MultiProofBody, MultiProofEncoding, replay},
};
use crate::{
    Digest, Hasher, MerkleError, TreeConfig,
    address::{depth, minimum_combinable_index},
    hash::mixed_root,
};

/// Proof of several elements that also carries the tree's frontier.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct CombinedProof {
    /// Mixed root the proof was generated against.
    pub root: Digest,
    /// The proved elements, in ascending index order.
    pub elements: Vec<Vec<u8>>,
    /// Encoding-specific data, shared with multi proofs.
    pub body: MultiProofBody,
}

impl CombinedProof {
    pub(crate) fn generate<H: Hasher, S: NodeSource<H>>(
        source: &S,
        indices: &[usize],
        encoding: MultiProofEncoding,
    ) -> Result<Self, MerkleError> {
        source.config().require_unbalanced("combined proof")?;
        check_minimum_index(indices, source.element_count())?;
        let body = MultiProofBody::generate(source, indices, encoding)?;
        let elements = indices
            .iter()
            .map(|index| source.element(*index).map(<[u8]>::to_vec))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CombinedProof {
            root: source.root(),
            elements,
            body,
        })
    }

    /// Number of elements in the tree, as claimed by the proof.
    pub fn element_count(&self) -> Result<usize, MerkleError> {
        self.body.element_count()
    }

    /// Indices of the proved elements, in ascending order.
    pub fn indices<H: Hasher>(&self, config: &TreeConfig<H>) -> Result<Vec<usize>, MerkleError> {
        self.body.indices(config.sorted_hash(), self.elements.len())
    }

    /// Whether the proof reproduces its claimed root and reaches the
    /// smallest frontier subtree.
    pub fn verify<H: Hasher>(&self, config: &TreeConfig<H>) -> bool {
        self.outcome::<H, Vec<u8>, Vec<u8>>(config, None, &[])
            .is_ok_and(|outcome| outcome.root == self.root)
    }

    /// Roots before and after replacing the proved elements with
    /// `new_elements` and then appending `append`.
    pub fn update_and_append<H: Hasher, E: AsRef<[u8]>, A: AsRef<[u8]>>(
        &self,
        config: &TreeConfig<H>,
        new_elements: &[E],
        append: &[A],
    ) -> Result<AppendOutcome, MerkleError> {
        require_appended(append)?;
        self.outcome(config, Some(new_elements), append)
    }

    /// Roots before and after appending `append`, with the proved elements
    /// left as they are.
    pub fn use_and_append<H: Hasher, A: AsRef<[u8]>>(
        &self,
        config: &TreeConfig<H>,
        append: &[A],
    ) -> Result<AppendOutcome, MerkleError> {
        require_appended(append)?;
        self.outcome::<H, Vec<u8>, A>(config, None, append)
    }

    fn outcome<H: Hasher, E: AsRef<[u8]>, A: AsRef<[u8]>>(
        &self,
        config: &TreeConfig<H>,
        new_elements: Option<&[E]>,
        append: &[A],
    ) -> Result<AppendOutcome, MerkleError> {
        config.require_unbalanced("combined proof")?;
        let (decoded, accumulation) = replay(config, &self.elements, &self.body, new_elements)?;
        let element_count = decoded.element_count;
        if let Some(indices) = &decoded.indices {
            check_minimum_index(indices, element_count)?;
        }
        let frontier = edge_frontier(element_count, &accumulation, config.sorted_hash())?;

        let root = mixed_root::<H>(element_count, &accumulation.element_root);
        if append.is_empty() {
            return Ok(AppendOutcome {
                root,
                new_root: mixed_root::<H>(element_count, &accumulation.new_element_root),
                element_count,
            });
        }
        append_to_frontier::<H>(
            config.sorted_hash(),
            root,
            element_count,
            &frontier,
            &leaves_of(config, append),
        )
    }
}

fn require_appended<A>(append: &[A]) -> Result<(), MerkleError> {
    if append.is_empty() {
        return Err(MerkleError::InvalidInput(
            "at least one element must be appended".into(),
        ));
    }
    Ok(())
}

fn check_minimum_index(indices: &[usize], element_count: usize) -> Result<(), MerkleError> {
    let minimum = minimum_combinable_index(element_count);
    match indices.last() {
        Some(index) if *index < minimum => Err(MerkleError::BelowMinimumIndex {
            index: *index,
            minimum,
        }),
        Some(_) => Ok(()),
        None => Err(MerkleError::InvalidInput(
            "at least one index is required".into(),
        )),
    }
}

/// Read the (updated) frontier off the right edge of a replay, largest
/// subtree first.
///
/// From the smallest frontier subtree's height up, the edge node must be a
/// right child exactly at the heights where `element_count` has a set bit,
/// and carried up unhashed everywhere else. Sorted hashing drops the side of
/// a lone known child, so there either side is accepted when hashed.
fn edge_frontier(
    element_count: usize,
    accumulation: &Accumulation,
    sorted_hash: bool,
) -> Result<Vec<Digest>, MerkleError> {
    let tree_depth = depth(element_count);
    let smallest = element_count.trailing_zeros() as usize;
    if accumulation.edge.len() != tree_depth {
        return Err(MerkleError::MalformedProof(
            "right edge does not reach the root".into(),
        ));
    }

    let mut frontier = Vec::with_capacity(element_count.count_ones() as usize);
    for height in (smallest..tree_depth).rev() {
        let expects_left = height > smallest && element_count >> height & 1 == 1;
        match (accumulation.edge[height].lift, expects_left) {
            (EdgeLift::RightChild { left }, true) => frontier.push(left.1),
            (EdgeLift::LeftChild { right }, true) if sorted_hash => frontier.push(right.1),
            (EdgeLift::Passthrough, false) => {}
            _ => {
                return Err(MerkleError::MalformedProof(format!(
                    "proof does not follow the right edge at height {}",
                    height
                )));
            }
        }
    }
    let smallest_root = match smallest {
        0 => accumulation.edge_leaf.1,
        height => accumulation.edge[height - 1].node.1,
    };
    frontier.push(smallest_root);
    Ok(frontier)
}
