use thiserror::Error;

/// Errors from Merkle tree construction, proof generation and proof
/// application.
///
/// Verification itself never returns these: a proof that does not
/// reproduce its claimed root simply verifies as `false`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum MerkleError {
    /// The configuration cannot describe the requested tree.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Invalid input parameters.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// An element index beyond the current element count.
    #[error("index {index} is out of range (element count {element_count})")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Element count of the tree.
        element_count: usize,
    },
    /// An element count beyond what slot arithmetic can address.
    #[error("element count {element_count} exceeds the maximum of {maximum}")]
    TooManyElements {
        /// Claimed element count.
        element_count: usize,
        /// Largest supported element count.
        maximum: usize,
    },
    /// Multi-index operations need strictly increasing indices.
    #[error("indices must be strictly increasing")]
    UnsortedIndices,
    /// A combined proof must reach the smallest frontier subtree.
    #[error("largest index {index} is below the minimum combinable index {minimum}")]
    BelowMinimumIndex {
        /// Largest requested index.
        index: usize,
        /// Minimum combinable index for the element count.
        minimum: usize,
    },
    /// The proof is structurally inconsistent.
    #[error("malformed proof: {0}")]
    MalformedProof(String),
    /// A proof did not reproduce the root it claims.
    #[error("root mismatch: expected {expected}, computed {computed}")]
    RootMismatch {
        /// Hex of the claimed root.
        expected: String,
        /// Hex of the recomputed root.
        computed: String,
    },
    /// A partial tree was asked for a node it was never given.
    #[error("node at slot {0} is not known")]
    MissingNode(usize),
    /// A partial tree was asked for an element it was never given.
    #[error("element at index {0} is not known")]
    MissingElement(usize),
    /// Bincode encoding or decoding failed.
    #[error("encoding error: {0}")]
    Encoding(String),
}

impl MerkleError {
    pub(crate) fn root_mismatch(expected: &[u8; 32], computed: &[u8; 32]) -> Self {
        MerkleError::RootMismatch {
            expected: hex::encode(expected),
            computed: hex::encode(computed),
        }
    }
}
