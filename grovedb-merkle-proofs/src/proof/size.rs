//! Size proofs: the element count a root commits to.

use bincode::{Decode, Encode};

use super::{
    NodeSource,
    append::{frontier_decommitments, frontier_root},
};
use crate::{
    Digest, Hasher, MerkleError, TreeConfig,
    hash::mixed_root,
    words::{from_word, to_word},
};

/// Form a size proof is generated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SizeProofMode {
    /// Reveal the element root.
    Simple,
    /// Reveal the frontier subtree roots.
    Decommitments,
    /// Frontier subtree roots behind the count, as words.
    Compact,
}

/// Mode-specific part of a [`SizeProof`].
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum SizeProofBody {
    /// Count and element root.
    Simple {
        /// Claimed number of elements.
        element_count: usize,
        /// Root of the element tree.
        element_root: Digest,
    },
    /// Count and frontier.
    Decommitments {
        /// Claimed number of elements.
        element_count: usize,
        /// Frontier subtree roots, largest first.
        decommitments: Vec<Digest>,
    },
    /// `[word(element_count), frontier...]`.
    Compact {
        /// The compact words.
        words: Vec<Digest>,
    },
}

/// Proof that a root commits to a given number of elements.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct SizeProof {
    /// Mixed root the proof was generated against.
    pub root: Digest,
    /// Mode-specific data.
    pub body: SizeProofBody,
}

impl SizeProof {
    pub(crate) fn generate<H: Hasher, S: NodeSource<H>>(
        source: &S,
        element_root: Digest,
        mode: SizeProofMode,
    ) -> Result<Self, MerkleError> {
        let element_count = source.element_count();
        let body = match mode {
            SizeProofMode::Simple => SizeProofBody::Simple {
                element_count,
                element_root,
            },
            SizeProofMode::Decommitments => SizeProofBody::Decommitments {
                element_count,
                decommitments: frontier_decommitments(source)?,
            },
            SizeProofMode::Compact => {
                let frontier = frontier_decommitments(source)?;
                let mut words = Vec::with_capacity(1 + frontier.len());
                words.push(to_word(element_count));
                words.extend(frontier);
                SizeProofBody::Compact { words }
            }
        };
        log::debug!("{:?} size proof for {} elements", mode, element_count);
        Ok(SizeProof {
            root: source.root(),
            body,
        })
    }

    /// The mode this proof is in.
    pub fn mode(&self) -> SizeProofMode {
        match self.body {
            SizeProofBody::Simple { .. } => SizeProofMode::Simple,
            SizeProofBody::Decommitments { .. } => SizeProofMode::Decommitments,
            SizeProofBody::Compact { .. } => SizeProofMode::Compact,
        }
    }

    /// Claimed number of elements.
    pub fn element_count(&self) -> Result<usize, MerkleError> {
        match &self.body {
            SizeProofBody::Simple { element_count, .. }
            | SizeProofBody::Decommitments { element_count, .. } => Ok(*element_count),
            SizeProofBody::Compact { words } => from_word(
                words
                    .first()
                    .ok_or_else(|| MerkleError::MalformedProof("compact proof is empty".into()))?,
            ),
        }
    }

    /// Whether the claimed count and the revealed data reproduce the root.
    pub fn verify<H: Hasher>(&self, config: &TreeConfig<H>) -> bool {
        self.computed_root(config)
            .is_ok_and(|root| root == self.root)
    }

    fn computed_root<H: Hasher>(&self, config: &TreeConfig<H>) -> Result<Digest, MerkleError> {
        match &self.body {
            SizeProofBody::Simple {
                element_count,
                element_root,
            } => {
                config.validate_element_count(*element_count)?;
                Ok(mixed_root::<H>(*element_count, element_root))
            }
            SizeProofBody::Decommitments {
                element_count,
                decommitments,
            } => frontier_root(config, *element_count, decommitments),
            SizeProofBody::Compact { words } => {
                let element_count = self.element_count()?;
                frontier_root(config, element_count, &words[1..])
            }
        }
    }
}
