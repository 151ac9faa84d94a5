//! Slot arithmetic for the serialized tree.
//!
//! The tree for `n` elements is stored in an array of `2 * leaf_count(n)`
//! slots. Slot 1 is the element root, slot `x` has children `2x` and
//! `2x + 1`, and element `i` sits at slot `leaf_count(n) + i`. Slot 0 is
//! unused.
//!
//! ```text
//!                 1
//!          /             \
//!         2               3
//!      /     \          /
//!     4       5        6
//!    / \     / \      /
//!   8   9   10  11   12        n = 5, leaf_count = 8
//! ```
//!
//! Slots at or past `leaf_count + n` on the leaf level do not exist, nor do
//! ancestors with no existing leaf below them. A node whose right child
//! does not exist carries its left child unchanged (slots 3 and 6 above
//! both equal slot 12).

/// Largest element count a tree can hold, so that `2 * leaf_count` still
/// fits in a `usize`.
pub const MAX_ELEMENT_COUNT: usize = 1 << (usize::BITS - 2);

/// Reject element counts past [`MAX_ELEMENT_COUNT`].
///
/// Counts read from proofs are untrusted; this must run before any slot
/// arithmetic on them.
pub(crate) fn check_element_count(element_count: usize) -> Result<(), crate::MerkleError> {
    if element_count > MAX_ELEMENT_COUNT {
        return Err(crate::MerkleError::TooManyElements {
            element_count,
            maximum: MAX_ELEMENT_COUNT,
        });
    }
    Ok(())
}

/// Depth of the tree holding `element_count` elements.
pub fn depth(element_count: usize) -> usize {
    if element_count <= 1 {
        0
    } else {
        (usize::BITS - (element_count - 1).leading_zeros()) as usize
    }
}

/// Number of leaf slots, always a power of two.
pub fn leaf_count(element_count: usize) -> usize {
    1 << depth(element_count)
}

/// Level of a slot (0 for the root).
pub(crate) fn level(slot: usize) -> usize {
    debug_assert!(slot > 0);
    (usize::BITS - 1 - slot.leading_zeros()) as usize
}

/// Whether `slot` holds a node in a tree of `element_count` elements.
pub(crate) fn node_exists(slot: usize, element_count: usize) -> bool {
    if slot == 0 || element_count == 0 {
        return false;
    }
    let tree_depth = depth(element_count);
    let slot_level = level(slot);
    if slot_level > tree_depth {
        return false;
    }
    let last_leaf = leaf_count(element_count) + element_count - 1;
    slot <= last_leaf >> (tree_depth - slot_level)
}

/// Slots of the maximal perfect subtrees on the right frontier, largest
/// first. There is one per set bit of `element_count`.
pub(crate) fn frontier_slots(element_count: usize) -> Vec<usize> {
    let leaves = leaf_count(element_count);
    let mut slots = Vec::with_capacity(element_count.count_ones() as usize);
    let mut offset = 0;
    for height in (0..=depth(element_count)).rev() {
        if element_count >> height & 1 == 1 {
            slots.push((leaves + offset) >> height);
            offset += 1 << height;
        }
    }
    slots
}

/// Smallest index whose leaf lies in the smallest frontier subtree.
///
/// A combined proof must touch this subtree so that every frontier root is
/// either recomputed or supplied while replaying it.
pub fn minimum_combinable_index(element_count: usize) -> usize {
    element_count - lowest_set_bit(element_count)
}

/// Lowest set bit of `value` as a value (`0` for `0`).
pub(crate) fn lowest_set_bit(value: usize) -> usize {
    value & value.wrapping_neg()
}

/// Check that `indices` are strictly increasing and below `element_count`.
pub(crate) fn validate_indices(
    indices: &[usize],
    element_count: usize,
) -> Result<(), crate::MerkleError> {
    if indices.is_empty() {
        return Err(crate::MerkleError::InvalidInput(
            "at least one index is required".into(),
        ));
    }
    for (i, index) in indices.iter().enumerate() {
        if *index >= element_count {
            return Err(crate::MerkleError::IndexOutOfRange {
                index: *index,
                element_count,
            });
        }
        if i > 0 && indices[i - 1] >= *index {
            return Err(crate::MerkleError::UnsortedIndices);
        }
    }
    Ok(())
}
