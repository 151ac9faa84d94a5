//! Sparse trees rebuilt from proofs.
//!
//! A [`PartialTree`] holds the slots a proof supplied (its elements'
//! leaves and its decommitments) plus every ancestor computable from them.
//! It can issue new proofs and apply updates or appends as long as every
//! node those need is known.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    Digest, Hasher, Keccak256Hasher, MerkleError, TreeConfig, ZERO_DIGEST,
    address::{
        self, check_element_count, frontier_slots, leaf_count, level, node_exists,
        validate_indices,
    },
    hash::{hash_node, leaf_hash, mixed_root},
    proof::{
        AppendProof, MultiProof, MultiProofEncoding, NodeSource, SingleProof, steps::plan_steps,
    },
};


/// A tree where only some nodes and elements are known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialTree<H: Hasher = Keccak256Hasher> {
    config: TreeConfig<H>,
    element_count: usize,
    nodes: BTreeMap<usize, Digest>,
    elements: BTreeMap<usize, Vec<u8>>,
    root: Digest,
}

impl<H: Hasher> PartialTree<H> {
    /// Rebuild the path of a single proof.
    pub fn from_single_proof(
        proof: &SingleProof,
        config: TreeConfig<H>,
    ) -> Result<Self, MerkleError> {
        let element_count = proof.element_count;
        config.validate_element_count(element_count)?;
        if proof.index >= element_count {
            return Err(MerkleError::IndexOutOfRange {
                index: proof.index,
                element_count,
            });
        }
        let mut siblings = Vec::with_capacity(proof.decommitments.len());
        let mut slot = leaf_count(element_count) + proof.index;
        while slot > 1 {
            if node_exists(slot ^ 1, element_count) {
                siblings.push(slot ^ 1);
            }
            slot >>= 1;
        }
        Self::assemble(
            config,
            element_count,
            vec![(proof.index, proof.element.clone())],
            place(&siblings, &proof.decommitments)?,
            proof.root,
        )
    }

    /// Rebuild the path of a single proof, then replace its element.
    pub fn from_single_update_proof(
        proof: &SingleProof,
        new_element: &[u8],
        config: TreeConfig<H>,
    ) -> Result<Self, MerkleError> {
        Self::from_single_proof(proof, config)?.set(&[proof.index], &[new_element])
    }

    /// Rebuild the known part of a tree from a multi proof.
    ///
    /// Boolean encodings must carry `orders` so the indices can be
    /// recovered.
    pub fn from_multi_proof(
        proof: &MultiProof,
        config: TreeConfig<H>,
    ) -> Result<Self, MerkleError> {
        let indices = proof.indices(&config)?;
        if indices.len() != proof.elements.len() {
            return Err(MerkleError::MalformedProof(format!(
                "{} indices for {} elements",
                indices.len(),
                proof.elements.len()
            )));
        }
        let decoded = proof.body.decode(config.sorted_hash())?;
        let siblings: Vec<usize> = plan_steps(&indices, decoded.element_count)?
            .into_iter()
            .filter_map(|planned| planned.sibling)
            .collect();
        Self::assemble(
            config,
            decoded.element_count,
            indices.into_iter().zip(proof.elements.iter().cloned()).collect(),
            place(&siblings, &decoded.decommitments)?,
            proof.root,
        )
    }

    /// Rebuild from a multi proof, then replace its elements.
    pub fn from_multi_update_proof<E: AsRef<[u8]>>(
        proof: &MultiProof,
        new_elements: &[E],
        config: TreeConfig<H>,
    ) -> Result<Self, MerkleError> {
        let indices = proof.indices(&config)?;
        Self::from_multi_proof(proof, config)?.set(&indices, new_elements)
    }

    /// Rebuild the frontier of a tree from an append proof.
    pub fn from_append_proof(
        proof: &AppendProof,
        config: TreeConfig<H>,
    ) -> Result<Self, MerkleError> {
        config.validate_element_count(proof.element_count)?;
        Self::assemble(
            config,
            proof.element_count,
            Vec::new(),
            place(&frontier_slots(proof.element_count), &proof.decommitments)?,
            proof.root,
        )
    }

    fn assemble(
        config: TreeConfig<H>,
        element_count: usize,
        known_elements: Vec<(usize, Vec<u8>)>,
        known_nodes: Vec<(usize, Digest)>,
        claimed_root: Digest,
    ) -> Result<Self, MerkleError> {
        config.validate_element_count(element_count)?;
        let leaves = leaf_count(element_count);
        let mut nodes: BTreeMap<usize, Digest> = known_nodes.into_iter().collect();
        let mut elements = BTreeMap::new();
        for (index, element) in known_elements {
            nodes.insert(
                leaves + index,
                leaf_hash::<H>(config.element_prefix(), &element),
            );
            elements.insert(index, element);
        }

        // Fill in every ancestor whose children are known, deepest first.
        let mut pending: BTreeSet<usize> = nodes.keys().map(|slot| slot >> 1).collect();
        while let Some(slot) = pending.pop_last() {
            if slot == 0 || nodes.contains_key(&slot) {
                continue;
            }
            if let Some(digest) = combine_children(&config, &nodes, slot, element_count) {
                nodes.insert(slot, digest);
                pending.insert(slot >> 1);
            }
        }
        // A node without a right child equals its left child. Only the right
        // edge has such nodes.
        let tree_depth = address::depth(element_count);
        let last_leaf = leaves + element_count.saturating_sub(1);
        for slot_level in 0..tree_depth {
            let slot = last_leaf >> (tree_depth - slot_level);
            if node_exists(2 * slot + 1, element_count) {
                continue;
            }
            if let Some(digest) = nodes.get(&slot).copied() {
                nodes.entry(2 * slot).or_insert(digest);
            }
        }

        let mut tree = PartialTree {
            config,
            element_count,
            nodes,
            elements,
            root: ZERO_DIGEST,
        };
        let computed = tree.computed_root()?;
        if computed != claimed_root {
            log::warn!(
                "partial tree over {} elements does not reproduce its proof's root",
                element_count
            );
            return Err(MerkleError::root_mismatch(&claimed_root, &computed));
        }
        tree.root = computed;
        log::trace!(
            "partial tree over {} elements with {} known nodes",
            element_count,
            tree.nodes.len()
        );
        Ok(tree)
    }

    fn computed_root(&self) -> Result<Digest, MerkleError> {
        if self.element_count == 0 {
            return Ok(ZERO_DIGEST);
        }
        let element_root = self.nodes.get(&1).ok_or(MerkleError::MissingNode(1))?;
        Ok(mixed_root::<H>(self.element_count, &element_root))
    }

    /// Mixed root.
    pub fn root(&self) -> Digest {
        self.root
    }

    /// Depth of the tree.
    pub fn depth(&self) -> usize {
        address::depth(self.element_count)
    }

    /// Number of elements in the tree, known or not.
    pub fn element_count(&self) -> usize {
        self.element_count
    }

    /// Known elements by index.
    pub fn elements(&self) -> &BTreeMap<usize, Vec<u8>> {
        &self.elements
    }

    /// Known nodes by slot.
    pub fn nodes(&self) -> &BTreeMap<usize, Digest> {
        &self.nodes
    }

    /// The tree's configuration.
    pub fn config(&self) -> &TreeConfig<H> {
        &self.config
    }

    /// For each index, whether the element at it is known and equal to the
    /// element at the same position. Indices without a matching element
    /// are `false`.
    pub fn check<E: AsRef<[u8]>>(&self, indices: &[usize], elements: &[E]) -> Vec<bool> {
        indices
            .iter()
            .enumerate()
            .map(|(i, index)| {
                elements.get(i).is_some_and(|element| {
                    self.elements
                        .get(index)
                        .is_some_and(|known| known.as_slice() == element.as_ref())
                })
            })
            .collect()
    }

    /// A partial tree with the elements at `indices` replaced.
    ///
    /// Ancestors whose sibling is unknown become unknown; the root must
    /// still be computable.
    pub fn set<E: AsRef<[u8]>>(
        &self,
        indices: &[usize],
        elements: &[E],
    ) -> Result<Self, MerkleError> {
        validate_indices(indices, self.element_count)?;
        if indices.len() != elements.len() {
            return Err(MerkleError::InvalidInput(format!(
                "{} indices for {} elements",
                indices.len(),
                elements.len()
            )));
        }

        let leaves = leaf_count(self.element_count);
        let mut tree = self.clone();
        let mut dirty = BTreeSet::new();
        for (index, element) in indices.iter().zip(elements) {
            let element = element.as_ref().to_vec();
            tree.nodes.insert(
                leaves + index,
                leaf_hash::<H>(tree.config.element_prefix(), &element),
            );
            tree.elements.insert(*index, element);
            dirty.insert((leaves + index) >> 1);
        }
        tree.rehash(dirty)?;
        Ok(tree)
    }

    /// A partial tree with `elements` appended.
    ///
    /// Needs every frontier node of the current tree.
    pub fn append<E: AsRef<[u8]>>(&self, elements: &[E]) -> Result<Self, MerkleError> {
        self.config.require_unbalanced("append")?;
        if elements.is_empty() {
            return Err(MerkleError::InvalidInput(
                "at least one element must be appended".into(),
            ));
        }
        if let Some(slot) = frontier_slots(self.element_count)
            .into_iter()
            .find(|slot| !self.nodes.contains_key(slot))
        {
            return Err(MerkleError::MissingNode(slot));
        }

        let old_count = self.element_count;
        let new_count = old_count
            .checked_add(elements.len())
            .ok_or_else(|| MerkleError::InvalidInput("element count overflows".into()))?;
        check_element_count(new_count)?;
        let old_depth = address::depth(old_count);
        let shift = address::depth(new_count) - old_depth;
        let new_leaves = leaf_count(new_count);
        let mut nodes = BTreeMap::new();

        // Keep only subtrees lying wholly within the old elements; the rest
        // change once the new leaves arrive.
        for (&slot, digest) in &self.nodes {
            let slot_level = level(slot);
            let height = old_depth - slot_level;
            let offset = slot - (1 << slot_level);
            if (offset + 1) << height <= old_count {
                nodes.insert((1 << (slot_level + shift)) + offset, *digest);
            }
        }

        let mut tree_elements = self.elements.clone();
        let mut dirty = BTreeSet::new();
        for (i, element) in elements.iter().enumerate() {
            let element = element.as_ref().to_vec();
            let slot = new_leaves + old_count + i;
            nodes.insert(slot, leaf_hash::<H>(self.config.element_prefix(), &element));
            tree_elements.insert(old_count + i, element);
            dirty.insert(slot >> 1);
        }

        let mut tree = PartialTree {
            config: self.config.clone(),
            element_count: new_count,
            nodes,
            elements: tree_elements,
            root: ZERO_DIGEST,
        };
        tree.rehash(dirty)?;
        log::trace!(
            "appended {} elements to partial tree, {} -> {}",
            elements.len(),
            old_count,
            new_count
        );
        Ok(tree)
    }

    /// Recompute `dirty` slots and their ancestors, deepest first, then the
    /// root.
    fn rehash(&mut self, mut dirty: BTreeSet<usize>) -> Result<(), MerkleError> {
        while let Some(slot) = dirty.pop_last() {
            if slot == 0 {
                continue;
            }
            match combine_children(&self.config, &self.nodes, slot, self.element_count) {
                Some(digest) => self.nodes.insert(slot, digest),
                None => self.nodes.remove(&slot),
            };
            if slot > 1 {
                dirty.insert(slot >> 1);
            }
        }
        self.root = self.computed_root()?;
        Ok(())
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

    /// Proof of the frontier.
    pub fn generate_append_proof(&self) -> Result<AppendProof, MerkleError> {
        AppendProof::generate(self)
    }

    /// Proof for `index` together with the partial tree after replacing it.
    pub fn update_single(
        &self,
        index: usize,
        element: &[u8],
    ) -> Result<(SingleProof, Self), MerkleError> {
        let proof = self.generate_single_proof(index)?;
        Ok((proof, self.set(&[index], &[element])?))
    }

    /// Proof for `indices` together with the partial tree after replacing
    /// them.
    pub fn update_multi<E: AsRef<[u8]>>(
        &self,
        indices: &[usize],
        elements: &[E],
        encoding: MultiProofEncoding,
    ) -> Result<(MultiProof, Self), MerkleError> {
        let proof = self.generate_multi_proof(indices, encoding)?;
        Ok((proof, self.set(indices, elements)?))
    }

    /// Append proof together with the partial tree after appending
    /// `element`.
    pub fn append_single(&self, element: &[u8]) -> Result<(AppendProof, Self), MerkleError> {
        self.append_multi(&[element])
    }

    /// Append proof together with the partial tree after appending
    /// `elements`.
    pub fn append_multi<E: AsRef<[u8]>>(
        &self,
        elements: &[E],
    ) -> Result<(AppendProof, Self), MerkleError> {
        let proof = self.generate_append_proof()?;
        Ok((proof, self.append(elements)?))
    }
}

impl<H: Hasher> NodeSource<H> for PartialTree<H> {
    fn config(&self) -> &TreeConfig<H> {
        &self.config
    }

    fn element_count(&self) -> usize {
        self.element_count
    }

    fn root(&self) -> Digest {
        self.root
    }

    fn node(&self, slot: usize) -> Result<Digest, MerkleError> {
        self.nodes
            .get(&slot)
            .copied()
            .ok_or(MerkleError::MissingNode(slot))
    }

    fn element(&self, index: usize) -> Result<&[u8], MerkleError> {
        self.elements
            .get(&index)
            .map(Vec::as_slice)
            .ok_or(MerkleError::MissingElement(index))
    }
}

/// Pair proof decommitments with the slots they belong to.
fn place(slots: &[usize], decommitments: &[Digest]) -> Result<Vec<(usize, Digest)>, MerkleError> {
    if slots.len() != decommitments.len() {
        return Err(MerkleError::MalformedProof(format!(
            "expected {} decommitments, got {}",
            slots.len(),
            decommitments.len()
        )));
    }
    Ok(slots.iter().copied().zip(decommitments.iter().copied()).collect())
}

/// Value of an internal slot from its children, if they are known.
fn combine_children<H: Hasher>(
    config: &TreeConfig<H>,
    nodes: &BTreeMap<usize, Digest>,
    slot: usize,
    element_count: usize,
) -> Option<Digest> {
    let left = *nodes.get(&(2 * slot))?;
    if node_exists(2 * slot + 1, element_count) {
        let right = *nodes.get(&(2 * slot + 1))?;
        Some(hash_node::<H>(&left, &right, config.sorted_hash()))
    } else {
        Some(left)
    }
}
