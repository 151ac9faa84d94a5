use crate::{
    Digest, Hasher, Keccak256Hasher, MerkleError, TreeConfig, ZERO_DIGEST,
    address::{self, leaf_count, node_exists, validate_indices},
    hash::{hash_node, leaf_hash, mixed_root},
    proof::{
        AppendProof, CombinedProof, MultiProof, MultiProofEncoding, NodeSource, SingleProof,
        SizeProof, SizeProofMode,
    },
};

/// An immutable, fully materialized Merkle tree over a list of elements.
///
/// Nodes are kept in a flat array indexed by slot (see
/// [`address`](crate::address)); slots that do not exist in an unbalanced
/// tree hold the zero digest. Every mutation returns a new tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree<H: Hasher = Keccak256Hasher> {
    config: TreeConfig<H>,
    elements: Vec<Vec<u8>>,
    nodes: Vec<Digest>,
    root: Digest,
}

impl<H: Hasher> MerkleTree<H> {
    /// Build a tree over `elements`.
    ///
    /// Balanced configurations accept only power-of-two element counts.
    /// An empty tree has the zero digest as both element and mixed root.
    pub fn new<E: AsRef<[u8]>>(elements: &[E], config: TreeConfig<H>) -> Result<Self, MerkleError> {
        config.validate_element_count(elements.len())?;
        let elements: Vec<Vec<u8>> = elements.iter().map(|e| e.as_ref().to_vec()).collect();
        let nodes = build_nodes(&config, &elements);
        let root = mixed_root::<H>(elements.len(), &nodes[1]);
        Ok(MerkleTree {
            config,
            elements,
            nodes,
            root,
        })
    }

    /// Mixed root: the element count bound to the element root.
    pub fn root(&self) -> Digest {
        self.root
    }

    /// Root of the element tree alone.
    pub fn element_root(&self) -> Digest {
        self.nodes[1]
    }

    /// Depth of the tree.
    pub fn depth(&self) -> usize {
        address::depth(self.elements.len())
    }

    /// Number of elements.
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// The elements, in index order.
    pub fn elements(&self) -> &[Vec<u8>] {
        &self.elements
    }

    /// The node array, indexed by slot. Slot 0 is unused.
    pub fn nodes(&self) -> &[Digest] {
        &self.nodes
    }

    /// The tree's configuration.
    pub fn config(&self) -> &TreeConfig<H> {
        &self.config
    }

    /// Lowest index a combined proof's largest index may have.
    pub fn minimum_combinable_index(&self) -> usize {
        address::minimum_combinable_index(self.elements.len())
    }

    /// Proof for the element at `index`.
    pub fn generate_single_proof(&self, index: usize) -> Result<SingleProof, MerkleError> {
        SingleProof::generate(self, index)
    }

    /// Proof for the elements at strictly increasing `indices`.
    pub fn generate_multi_proof(
        &self,
        indices: &[usize],
        encoding: MultiProofEncoding,
    ) -> Result<MultiProof, MerkleError> {
        MultiProof::generate(self, indices, encoding)
    }

    /// Proof of the frontier, enough to append.
    pub fn generate_append_proof(&self) -> Result<AppendProof, MerkleError> {
        AppendProof::generate(self)
    }

    /// Proof of the elements at `indices` that also allows appending.
    pub fn generate_combined_proof(
        &self,
        indices: &[usize],
        encoding: MultiProofEncoding,
    ) -> Result<CombinedProof, MerkleError> {
        CombinedProof::generate(self, indices, encoding)
    }

    /// Proof of the element count.
    pub fn generate_size_proof(&self, mode: SizeProofMode) -> Result<SizeProof, MerkleError> {
        SizeProof::generate(self, self.element_root(), mode)
    }

    /// A tree with the elements at `indices` replaced.
    pub fn set<E: AsRef<[u8]>>(
        &self,
        indices: &[usize],
        elements: &[E],
    ) -> Result<Self, MerkleError> {
        validate_indices(indices, self.elements.len())?;
        if indices.len() != elements.len() {
            return Err(MerkleError::InvalidInput(format!(
                "{} indices for {} elements",
                indices.len(),
                elements.len()
            )));
        }
        let mut updated = self.elements.clone();
        for (index, element) in indices.iter().zip(elements) {
            updated[*index] = element.as_ref().to_vec();
        }
        Self::new(&updated, self.config.clone())
    }

    /// A tree with the element at `index` replaced.
    pub fn set_single(&self, index: usize, element: &[u8]) -> Result<Self, MerkleError> {
        self.set(&[index], &[element])
    }

    /// A tree with `elements` appended.
    pub fn append<E: AsRef<[u8]>>(&self, elements: &[E]) -> Result<Self, MerkleError> {
        if elements.is_empty() {
            return Err(MerkleError::InvalidInput(
                "at least one element must be appended".into(),
            ));
        }
        let mut extended = self.elements.clone();
        extended.extend(elements.iter().map(|e| e.as_ref().to_vec()));
        Self::new(&extended, self.config.clone())
    }

    /// A tree with `element` appended.
    pub fn append_single(&self, element: &[u8]) -> Result<(AppendProof, Self), MerkleError> {
        self.append_multi(&[element])
    }

    /// Append proof for this tree together with the tree after appending
    /// `elements`.
    pub fn append_multi<E: AsRef<[u8]>>(
        &self,
        elements: &[E],
    ) -> Result<(AppendProof, Self), MerkleError> {
        let proof = self.generate_append_proof()?;
        Ok((proof, self.append(elements)?))
    }

    /// Proof for `index` together with the tree after replacing it.
    pub fn update_single(
        &self,
        index: usize,
        element: &[u8],
    ) -> Result<(SingleProof, Self), MerkleError> {
        let proof = self.generate_single_proof(index)?;
        Ok((proof, self.set_single(index, element)?))
    }

    /// Proof for `indices` together with the tree after replacing them.
    pub fn update_multi<E: AsRef<[u8]>>(
        &self,
        indices: &[usize],
        elements: &[E],
        encoding: MultiProofEncoding,
    ) -> Result<(MultiProof, Self), MerkleError> {
        let proof = self.generate_multi_proof(indices, encoding)?;
        Ok((proof, self.set(indices, elements)?))
    }

    /// Combined proof for `indices` together with the tree after replacing
    /// them and appending `append`.
    pub fn update_and_append<E: AsRef<[u8]>, A: AsRef<[u8]>>(
        &self,
        indices: &[usize],
        elements: &[E],
        append: &[A],
        encoding: MultiProofEncoding,
    ) -> Result<(CombinedProof, Self), MerkleError> {
        let proof = self.generate_combined_proof(indices, encoding)?;
        Ok((proof, self.set(indices, elements)?.append(append)?))
    }

    /// Combined proof for `indices` together with the tree after appending
    /// `append`.
    pub fn use_and_append<A: AsRef<[u8]>>(
        &self,
        indices: &[usize],
        append: &[A],
        encoding: MultiProofEncoding,
    ) -> Result<(CombinedProof, Self), MerkleError> {
        let proof = self.generate_combined_proof(indices, encoding)?;
        Ok((proof, self.append(append)?))
    }
}

impl<H: Hasher> NodeSource<H> for MerkleTree<H> {
    fn config(&self) -> &TreeConfig<H> {
        &self.config
    }

    fn element_count(&self) -> usize {
        self.elements.len()
    }

    fn root(&self) -> Digest {
        self.root
    }

    fn node(&self, slot: usize) -> Result<Digest, MerkleError> {
        if !node_exists(slot, self.elements.len()) {
            return Err(MerkleError::MissingNode(slot));
        }
        Ok(self.nodes[slot])
    }

    fn element(&self, index: usize) -> Result<&[u8], MerkleError> {
        self.elements
            .get(index)
            .map(Vec::as_slice)
            .ok_or(MerkleError::MissingElement(index))
    }
}

/// Hash leaves into place and fold them bottom-up.
fn build_nodes<H: Hasher>(config: &TreeConfig<H>, elements: &[Vec<u8>]) -> Vec<Digest> {
    let element_count = elements.len();
    let leaves = leaf_count(element_count);
    let mut nodes = vec![ZERO_DIGEST; 2 * leaves];
    if element_count == 0 {
        return nodes;
    }

    for (i, element) in elements.iter().enumerate() {
        nodes[leaves + i] = leaf_hash::<H>(config.element_prefix(), element);
    }
    for slot in (1..leaves).rev() {
        if !node_exists(slot, element_count) {
            continue;
        }
        let left = nodes[2 * slot];
        nodes[slot] = if node_exists(2 * slot + 1, element_count) {
            hash_node::<H>(&left, &nodes[2 * slot + 1], config.sorted_hash())
        } else {
            left
        };
    }
    nodes
}
