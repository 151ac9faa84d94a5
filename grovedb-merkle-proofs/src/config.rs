use std::marker::PhantomData;

use crate::{Hasher, Keccak256Hasher, MerkleError, address::check_element_count};

/// Prefix hashed in front of every element unless configured otherwise.
pub const DEFAULT_ELEMENT_PREFIX: [u8; 1] = [0x00];

/// How a tree is hashed and shaped.
///
/// The hasher is a type parameter, so a configuration for one hash
/// function cannot be used to verify proofs made with another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeConfig<H: Hasher = Keccak256Hasher> {
    sorted_hash: bool,
    unbalanced: bool,
    element_prefix: Vec<u8>,
    _hasher: PhantomData<fn() -> H>,
}

/// Unsorted, unbalanced, with the default `0x00` element prefix.
impl<H: Hasher> Default for TreeConfig<H> {
    fn default() -> Self {
        TreeConfig {
            sorted_hash: false,
            unbalanced: true,
            element_prefix: DEFAULT_ELEMENT_PREFIX.to_vec(),
            _hasher: PhantomData,
        }
    }
}

impl TreeConfig {
    /// Keccak-256 configuration with the defaults. Use
    /// `TreeConfig::<H>::default()` for other hashers.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<H: Hasher> TreeConfig<H> {
    /// Order the two children ascending before hashing them.
    pub fn with_sorted_hash(mut self, sorted_hash: bool) -> Self {
        self.sorted_hash = sorted_hash;
        self
    }

    /// Allow element counts that are not a power of two.
    pub fn with_unbalanced(mut self, unbalanced: bool) -> Self {
        self.unbalanced = unbalanced;
        self
    }

    /// Bytes hashed in front of every element.
    pub fn with_element_prefix(mut self, element_prefix: impl Into<Vec<u8>>) -> Self {
        self.element_prefix = element_prefix.into();
        self
    }

    /// Whether children are ordered before hashing.
    pub fn sorted_hash(&self) -> bool {
        self.sorted_hash
    }

    /// Whether element counts other than powers of two are allowed.
    pub fn unbalanced(&self) -> bool {
        self.unbalanced
    }

    /// Bytes hashed in front of every element.
    pub fn element_prefix(&self) -> &[u8] {
        &self.element_prefix
    }

    /// Reject element counts too large to address, and those a balanced
    /// tree cannot hold.
    pub(crate) fn validate_element_count(&self, element_count: usize) -> Result<(), MerkleError> {
        check_element_count(element_count)?;
        if !self.unbalanced && element_count != 0 && !element_count.is_power_of_two() {
            return Err(MerkleError::InvalidConfig(format!(
                "balanced trees need a power of two element count, got {}",
                element_count
            )));
        }
        Ok(())
    }

    /// Append and combined proofs only make sense for unbalanced trees.
    pub(crate) fn require_unbalanced(&self, operation: &str) -> Result<(), MerkleError> {
        if !self.unbalanced {
            return Err(MerkleError::InvalidConfig(format!(
                "{} requires an unbalanced tree",
                operation
            )));
        }
        Ok(())
    }
}
