//! Membership and update proofs for several elements at once.
//!
//! The three encodings state the same fact. `Indexed` names the indices
//! and lets the verifier derive the replay; `Booleans` spells the replay
//! out step by step, so indices are implied; `Bits` packs the booleans into
//! 256-bit words behind the element count for a flat, compact footprint.

use bincode::{Decode, Encode};

use super::{
    NodeSource, UpdateOutcome,
    accumulate::{Accumulation, accumulate},
    leaves_of,
    steps::{
        Step, indices_from_steps, plan_steps, steps_from_booleans, steps_from_words,
        steps_to_booleans, steps_to_words,
    },
};
use crate::{
    Digest, Hasher, MerkleError, TreeConfig,
    address::depth,
    hash::mixed_root,
};

/// Which encoding a multi proof is generated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MultiProofEncoding {
    /// Explicit indices.
    Indexed,
    /// Per-step boolean vectors.
    Booleans,
    /// Per-step bits packed into words.
    Bits,
}

/// Encoding-specific part of a [`MultiProof`].
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum MultiProofBody {
    /// Explicit, strictly increasing indices.
    Indexed {
        /// Number of elements in the tree.
        element_count: usize,
        /// Indices of the proved elements.
        indices: Vec<usize>,
        /// Sibling digests in replay order.
        decommitments: Vec<Digest>,
    },
    /// One entry per replay step.
    Booleans {
        /// Number of elements in the tree.
        element_count: usize,
        /// Both children of the step's node are known.
        flags: Vec<bool>,
        /// The step's node has no right child and is carried up.
        skips: Vec<bool>,
        /// The known child is the left one. `None` under sorted hashing.
        orders: Option<Vec<bool>>,
        /// Sibling digests in replay order.
        decommitments: Vec<Digest>,
    },
    /// `[word(element_count), (flags, skips, orders?)*, decommitments...]`.
    Bits {
        /// The compact words.
        words: Vec<Digest>,
    },
}

/// Proof that `elements` sit at a set of indices.
///
/// Elements are listed in ascending index order.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct MultiProof {
    /// Mixed root the proof was generated against.
    pub root: Digest,
    /// The proved elements, in ascending index order.
    pub elements: Vec<Vec<u8>>,
    /// Encoding-specific data.
    pub body: MultiProofBody,
}

/// A multi proof body with the encoding peeled off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DecodedBody {
    pub element_count: usize,
    pub steps: Vec<Step>,
    pub decommitments: Vec<Digest>,
    /// Only the indexed encoding names its indices outright.
    pub indices: Option<Vec<usize>>,
}

impl MultiProofBody {
    /// Build the body for `indices` in the requested encoding, reading
    /// decommitments from `source`.
    pub(crate) fn generate<H: Hasher, S: NodeSource<H>>(
        source: &S,
        indices: &[usize],
        encoding: MultiProofEncoding,
    ) -> Result<Self, MerkleError> {
        let element_count = source.element_count();
        let plan = plan_steps(indices, element_count)?;
        let decommitments = plan
            .iter()
            .filter_map(|planned| planned.sibling)
            .map(|slot| source.node(slot))
            .collect::<Result<Vec<_>, _>>()?;
        let steps: Vec<Step> = plan.iter().map(|planned| planned.step).collect();
        let sorted_hash = source.config().sorted_hash();

        log::debug!(
            "{:?} multi proof for {} of {} elements: {} steps, {} decommitments",
            encoding,
            indices.len(),
            element_count,
            steps.len(),
            decommitments.len()
        );
        Ok(match encoding {
            MultiProofEncoding::Indexed => MultiProofBody::Indexed {
                element_count,
                indices: indices.to_vec(),
                decommitments,
            },
            MultiProofEncoding::Booleans => {
                let (flags, skips, orders) = steps_to_booleans(&steps, sorted_hash);
                MultiProofBody::Booleans {
                    element_count,
                    flags,
                    skips,
                    orders,
                    decommitments,
                }
            }
            MultiProofEncoding::Bits => MultiProofBody::Bits {
                words: steps_to_words(element_count, &steps, sorted_hash, &decommitments),
            },
        })
    }

    /// The encoding this body is in.
    pub fn encoding(&self) -> MultiProofEncoding {
        match self {
            MultiProofBody::Indexed { .. } => MultiProofEncoding::Indexed,
            MultiProofBody::Booleans { .. } => MultiProofEncoding::Booleans,
            MultiProofBody::Bits { .. } => MultiProofEncoding::Bits,
        }
    }

    /// Number of elements in the tree, as claimed by the body.
    pub fn element_count(&self) -> Result<usize, MerkleError> {
        match self {
            MultiProofBody::Indexed { element_count, .. }
            | MultiProofBody::Booleans { element_count, .. } => Ok(*element_count),
            MultiProofBody::Bits { words } => crate::words::from_word(words.first().ok_or_else(
                || MerkleError::MalformedProof("compact proof is empty".into()),
            )?),
        }
    }

    pub(crate) fn decode(&self, sorted_hash: bool) -> Result<DecodedBody, MerkleError> {
        match self {
            MultiProofBody::Indexed {
                element_count,
                indices,
                decommitments,
            } => {
                let steps = plan_steps(indices, *element_count)?
                    .into_iter()
                    .map(|planned| planned.step)
                    .collect();
                Ok(DecodedBody {
                    element_count: *element_count,
                    steps,
                    decommitments: decommitments.clone(),
                    indices: Some(indices.clone()),
                })
            }
            MultiProofBody::Booleans {
                element_count,
                flags,
                skips,
                orders,
                decommitments,
            } => Ok(DecodedBody {
                element_count: *element_count,
                steps: steps_from_booleans(flags, skips, orders.as_deref(), sorted_hash)?,
                decommitments: decommitments.clone(),
                indices: None,
            }),
            MultiProofBody::Bits { words } => {
                let (element_count, steps, decommitments) =
                    steps_from_words(words, sorted_hash)?;
                Ok(DecodedBody {
                    element_count,
                    steps,
                    decommitments,
                    indices: None,
                })
            }
        }
    }

    /// Whether the steps say which child every known node is. False only
    /// for boolean encodings under sorted hashing, which drop `orders`.
    fn carries_orders(&self, sorted_hash: bool) -> bool {
        match self {
            MultiProofBody::Indexed { .. } => true,
            MultiProofBody::Booleans { orders, .. } => orders.is_some(),
            MultiProofBody::Bits { .. } => !sorted_hash,
        }
    }

    /// Indices of the proved elements, in ascending order.
    ///
    /// `element_total` is the number of proved elements. Boolean encodings
    /// without `orders` do not determine their indices and fail.
    pub(crate) fn indices(
        &self,
        sorted_hash: bool,
        element_total: usize,
    ) -> Result<Vec<usize>, MerkleError> {
        if !self.carries_orders(sorted_hash) {
            return Err(MerkleError::MalformedProof(
                "indices cannot be recovered without orders".into(),
            ));
        }
        let decoded = self.decode(sorted_hash)?;
        if let Some(indices) = decoded.indices {
            return Ok(indices);
        }
        let indices = indices_from_steps(element_total, &decoded.steps)?;
        if indices.last().is_some_and(|last| *last >= decoded.element_count) {
            return Err(MerkleError::MalformedProof(
                "recovered index beyond the element count".into(),
            ));
        }
        Ok(indices)
    }
}

/// Replay a multi proof body over `elements`, optionally alongside
/// replacements.
pub(crate) fn replay<H: Hasher, E: AsRef<[u8]>>(
    config: &TreeConfig<H>,
    elements: &[Vec<u8>],
    body: &MultiProofBody,
    new_elements: Option<&[E]>,
) -> Result<(DecodedBody, Accumulation), MerkleError> {
    let decoded = body.decode(config.sorted_hash())?;
    if decoded.element_count == 0 {
        return Err(MerkleError::MalformedProof(
            "multi proof over an empty tree".into(),
        ));
    }
    config.validate_element_count(decoded.element_count)?;
    if let Some(indices) = &decoded.indices {
        if indices.len() != elements.len() {
            return Err(MerkleError::MalformedProof(format!(
                "{} indices for {} elements",
                indices.len(),
                elements.len()
            )));
        }
    }

    let leaves = leaves_of(config, elements);
    let new_leaves = new_elements.map(|new_elements| leaves_of(config, new_elements));
    let accumulation = accumulate::<H>(
        config.sorted_hash(),
        depth(decoded.element_count),
        &leaves,
        new_leaves.as_deref(),
        &decoded.steps,
        &decoded.decommitments,
    )?;
    Ok((decoded, accumulation))
}

impl MultiProof {
    pub(crate) fn generate<H: Hasher, S: NodeSource<H>>(
        source: &S,
        indices: &[usize],
        encoding: MultiProofEncoding,
    ) -> Result<Self, MerkleError> {
        let body = MultiProofBody::generate(source, indices, encoding)?;
        let elements = indices
            .iter()
            .map(|index| source.element(*index).map(<[u8]>::to_vec))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(MultiProof {
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
    ///
    /// Recovered from the step vectors for boolean encodings, which needs
    /// `orders` (absent under sorted hashing).
    pub fn indices<H: Hasher>(&self, config: &TreeConfig<H>) -> Result<Vec<usize>, MerkleError> {
        self.body.indices(config.sorted_hash(), self.elements.len())
    }

    /// Whether the proof reproduces its claimed root.
    pub fn verify<H: Hasher>(&self, config: &TreeConfig<H>) -> bool {
        replay::<H, Vec<u8>>(config, &self.elements, &self.body, None).is_ok_and(
            |(decoded, accumulation)| {
                mixed_root::<H>(decoded.element_count, &accumulation.element_root) == self.root
            },
        )
    }

    /// Roots before and after replacing the proved elements with
    /// `new_elements`, matched by position.
    pub fn update<H: Hasher, E: AsRef<[u8]>>(
        &self,
        config: &TreeConfig<H>,
        new_elements: &[E],
    ) -> Result<UpdateOutcome, MerkleError> {
        let (decoded, accumulation) =
            replay(config, &self.elements, &self.body, Some(new_elements))?;
        Ok(UpdateOutcome {
            root: mixed_root::<H>(decoded.element_count, &accumulation.element_root),
            new_root: mixed_root::<H>(decoded.element_count, &accumulation.new_element_root),
        })
    }
}
