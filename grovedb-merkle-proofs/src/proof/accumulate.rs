//! Bottom-up replay of a multi-element proof.
//!
//! Known nodes wait in a FIFO queue in descending slot order: parents are
//! pushed behind the remaining nodes of the level below, so the front is
//! always the highest unprocessed slot. Two hash lanes run side by side,
//! one over the original leaves and one over their replacements, so a
//! single pass yields both the current and the updated root.
//!
//! The node holding the highest proved index is tracked as the right edge
//! of the replay, which is where combined proofs read the append frontier
//! from.

use std::collections::VecDeque;

use super::{ensure_consumed, next_decommitment, steps::Step};
use crate::{Digest, Hasher, MerkleError, hash::hash_node};

/// How the right-edge node was lifted by one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EdgeLift {
    /// Carried up unhashed.
    Passthrough,
    /// Hashed as the left child of `(old, new)`.
    LeftChild { right: (Digest, Digest) },
    /// Hashed as the right child of `(old, new)`.
    RightChild { left: (Digest, Digest) },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EdgeStep {
    pub lift: EdgeLift,
    /// `(old, new)` value of the edge node after the step.
    pub node: (Digest, Digest),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Accumulation {
    pub element_root: Digest,
    pub new_element_root: Digest,
    /// `(old, new)` leaf the right edge starts from.
    pub edge_leaf: (Digest, Digest),
    /// One entry per level, leaf level first.
    pub edge: Vec<EdgeStep>,
}

#[derive(Debug, Clone, Copy)]
struct Known {
    old: Digest,
    new: Digest,
    height: usize,
    edge: bool,
}

/// Replay `steps` over `leaves` (ascending index order).
///
/// `new_leaves`, when given, are the replacements for `leaves` in the same
/// order. The replay must end with a single node at height `depth`.
pub(crate) fn accumulate<H: Hasher>(
    sorted_hash: bool,
    depth: usize,
    leaves: &[Digest],
    new_leaves: Option<&[Digest]>,
    steps: &[Step],
    decommitments: &[Digest],
) -> Result<Accumulation, MerkleError> {
    if leaves.is_empty() {
        return Err(MerkleError::MalformedProof("proof has no elements".into()));
    }
    if let Some(new_leaves) = new_leaves {
        if new_leaves.len() != leaves.len() {
            return Err(MerkleError::InvalidInput(format!(
                "{} replacement elements for {} proved elements",
                new_leaves.len(),
                leaves.len()
            )));
        }
    }

    let last = leaves.len() - 1;
    let mut queue: VecDeque<Known> = (0..leaves.len())
        .rev()
        .map(|i| Known {
            old: leaves[i],
            new: new_leaves.map_or(leaves[i], |new_leaves| new_leaves[i]),
            height: 0,
            edge: i == last,
        })
        .collect();
    let edge_leaf = (leaves[last], queue[0].new);
    let mut decommitments_iter = decommitments.iter();
    let mut edge = Vec::with_capacity(depth);
    let combine = |left: &Digest, right: &Digest| hash_node::<H>(left, right, sorted_hash);
    let updating = new_leaves.is_some();

    for step in steps {
        let known = queue.pop_front().ok_or_else(|| {
            MerkleError::MalformedProof("more steps than known nodes".into())
        })?;
        if known.height >= depth {
            return Err(MerkleError::MalformedProof(
                "step above the root of the tree".into(),
            ));
        }

        let (left, right) = match step {
            Step::Skip => {
                let lifted = Known {
                    height: known.height + 1,
                    ..known
                };
                if lifted.edge {
                    edge.push(EdgeStep {
                        lift: EdgeLift::Passthrough,
                        node: (lifted.old, lifted.new),
                    });
                }
                queue.push_back(lifted);
                continue;
            }
            Step::Pair => {
                let left = queue.pop_front().ok_or_else(|| {
                    MerkleError::MalformedProof("pair step without a left node".into())
                })?;
                if left.height != known.height {
                    return Err(MerkleError::MalformedProof(
                        "paired nodes at different heights".into(),
                    ));
                }
                (left, known)
            }
            Step::KnownLeft => {
                let decommitment = next_decommitment(&mut decommitments_iter)?;
                (known, Known::decommitment(decommitment, known.height))
            }
            Step::KnownRight => {
                let decommitment = next_decommitment(&mut decommitments_iter)?;
                (Known::decommitment(decommitment, known.height), known)
            }
        };

        let old = combine(&left.old, &right.old);
        let parent = Known {
            old,
            new: if updating {
                combine(&left.new, &right.new)
            } else {
                old
            },
            height: known.height + 1,
            edge: left.edge || right.edge,
        };
        if parent.edge {
            let lift = if right.edge {
                EdgeLift::RightChild {
                    left: (left.old, left.new),
                }
            } else {
                EdgeLift::LeftChild {
                    right: (right.old, right.new),
                }
            };
            edge.push(EdgeStep {
                lift,
                node: (parent.old, parent.new),
            });
        }
        queue.push_back(parent);
    }

    ensure_consumed(decommitments_iter)?;
    let root = match (queue.pop_front(), queue.is_empty()) {
        (Some(root), true) if root.height == depth => root,
        _ => {
            return Err(MerkleError::MalformedProof(
                "steps do not lead to a single root".into(),
            ));
        }
    };

    Ok(Accumulation {
        element_root: root.old,
        new_element_root: root.new,
        edge_leaf,
        edge,
    })
}

impl Known {
    fn decommitment(digest: Digest, height: usize) -> Self {
        Known {
            old: digest,
            new: digest,
            height,
            edge: false,
        }
    }
}
