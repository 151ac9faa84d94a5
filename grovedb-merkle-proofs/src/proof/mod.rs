//! Proof generation and verification.
//!
//! Every proof carries the mixed root it was generated against. Verifiers
//! recompute that root from the proof's values and decommitments and
//! compare; the `update` / `append` style operations additionally compute
//! the root the tree has once the operation is applied, and leave the
//! comparison of the old root against a trusted commitment to the caller.

use bincode::{Decode, Encode};

use crate::{Digest, Hasher, MerkleError, TreeConfig};

mod accumulate;
pub(crate) mod append;
pub(crate) mod combined;
pub(crate) mod multi;
pub(crate) mod single;
pub(crate) mod size;
pub(crate) mod steps;


pub use append::AppendProof;
pub use combined::CombinedProof;
pub use multi::{MultiProof, MultiProofBody, MultiProofEncoding};
pub use single::SingleProof;
pub use size::{SizeProof, SizeProofBody, SizeProofMode};

/// Read access to the nodes and elements of a (possibly partial) tree.
///
/// Implemented by [`MerkleTree`](crate::MerkleTree), where every existing
/// node is known, and by [`PartialTree`](crate::PartialTree), where reads of
/// nodes the originating proof never supplied fail.
pub(crate) trait NodeSource<H: Hasher> {
    fn config(&self) -> &TreeConfig<H>;
    fn element_count(&self) -> usize;
    fn root(&self) -> Digest;
    fn node(&self, slot: usize) -> Result<Digest, MerkleError>;
    fn element(&self, index: usize) -> Result<&[u8], MerkleError>;
}

/// Old and new mixed roots from applying an update proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Root recomputed from the proof's original elements.
    pub root: Digest,
    /// Root after the replacement.
    pub new_root: Digest,
}

/// Old and new mixed roots from applying an append or combined proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Root recomputed from the proof before anything changes.
    pub root: Digest,
    /// Root after updating and appending.
    pub new_root: Digest,
    /// Element count after appending.
    pub element_count: usize,
}

/// Any proof this crate produces.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum Proof {
    /// Membership of one element.
    Single(SingleProof),
    /// Membership of several elements, in one of three encodings.
    Multi(MultiProof),
    /// Frontier of the tree, enough to append.
    Append(AppendProof),
    /// Membership of several elements plus the frontier.
    Combined(CombinedProof),
    /// Element count bound to the root.
    Size(SizeProof),
}

impl Proof {
    /// The mixed root this proof claims.
    pub fn root(&self) -> Digest {
        match self {
            Proof::Single(proof) => proof.root,
            Proof::Multi(proof) => proof.root,
            Proof::Append(proof) => proof.root,
            Proof::Combined(proof) => proof.root,
            Proof::Size(proof) => proof.root,
        }
    }

    /// Verify the proof against its own claimed root.
    pub fn verify<H: Hasher>(&self, config: &TreeConfig<H>) -> bool {
        match self {
            Proof::Single(proof) => proof.verify(config),
            Proof::Multi(proof) => proof.verify(config),
            Proof::Append(proof) => proof.verify(config),
            Proof::Combined(proof) => proof.verify(config),
            Proof::Size(proof) => proof.verify(config),
        }
    }

    /// Encode to bytes using bincode.
    pub fn encode_to_vec(&self) -> Result<Vec<u8>, MerkleError> {
        encode_proof(self)
    }

    /// Decode from bytes using bincode.
    pub fn decode_from_slice(bytes: &[u8]) -> Result<Self, MerkleError> {
        decode_proof(bytes)
    }
}

macro_rules! impl_proof_codec {
    ($($proof:ty => $variant:ident),* $(,)?) => {
        $(
            impl $proof {
                /// Encode to bytes using bincode.
                pub fn encode_to_vec(&self) -> Result<Vec<u8>, MerkleError> {
                    encode_proof(self)
                }

                /// Decode from bytes using bincode.
                pub fn decode_from_slice(bytes: &[u8]) -> Result<Self, MerkleError> {
                    decode_proof(bytes)
                }
            }

            impl From<$proof> for Proof {
                fn from(proof: $proof) -> Self {
                    Proof::$variant(proof)
                }
            }
        )*
    };
}

impl_proof_codec!(
    SingleProof => Single,
    MultiProof => Multi,
    AppendProof => Append,
    CombinedProof => Combined,
    SizeProof => Size,
);

fn encode_proof<T: Encode>(proof: &T) -> Result<Vec<u8>, MerkleError> {
    let config = bincode::config::standard()
        .with_big_endian()
        .with_no_limit();
    bincode::encode_to_vec(proof, config)
        .map_err(|e| MerkleError::Encoding(format!("encode error: {}", e)))
}

fn decode_proof<T: Decode<()>>(bytes: &[u8]) -> Result<T, MerkleError> {
    let config = bincode::config::standard()
        .with_big_endian()
        .with_limit::<{ 100 * 1024 * 1024 }>(); // 100MB limit
    let (proof, read) = bincode::decode_from_slice(bytes, config)
        .map_err(|e| MerkleError::Encoding(format!("decode error: {}", e)))?;
    if read != bytes.len() {
        return Err(MerkleError::Encoding(format!(
            "{} trailing bytes after proof",
            bytes.len() - read
        )));
    }
    Ok(proof)
}

/// Hash `elements` into leaves under `config`.
pub(crate) fn leaves_of<H: Hasher, E: AsRef<[u8]>>(
    config: &TreeConfig<H>,
    elements: &[E],
) -> Vec<Digest> {
    elements
        .iter()
        .map(|element| crate::hash::leaf_hash::<H>(config.element_prefix(), element.as_ref()))
        .collect()
}

/// Pull the next decommitment or report the proof as short.
pub(crate) fn next_decommitment<'a>(
    decommitments: &mut impl Iterator<Item = &'a Digest>,
) -> Result<Digest, MerkleError> {
    decommitments
        .next()
        .copied()
        .ok_or_else(|| MerkleError::MalformedProof("ran out of decommitments".into()))
}

/// Fail if decommitments are left over after a replay.
pub(crate) fn ensure_consumed<'a>(
    decommitments: impl Iterator<Item = &'a Digest>,
) -> Result<(), MerkleError> {
    let remaining = decommitments.count();
    if remaining != 0 {
        return Err(MerkleError::MalformedProof(format!(
            "{} unused decommitments",
            remaining
        )));
    }
    Ok(())
}
