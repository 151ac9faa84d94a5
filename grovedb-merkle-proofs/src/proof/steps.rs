//! The step sequence shared by every multi-element proof encoding.
//!
//! Replaying a multi proof visits, in descending slot order, every internal
//! node that has at least one known child. Each visit is one [`Step`]:
//!
//! - `Pair`: both children are known, no decommitment is consumed
//! - `KnownLeft` / `KnownRight`: one child is known, the other one is the
//!   next decommitment
//! - `Skip`: only the left child exists and is carried up unhashed
//!
//! The indexed encoding derives the steps from its indices, the boolean
//! encodings spell them out as `flags` / `skips` / `orders`.

use std::collections::VecDeque;

use crate::{
    Digest, MerkleError,
    address::{check_element_count, leaf_count, node_exists, validate_indices},
    words::{WORD_BITS, from_word, pack_group, to_word, word_bit},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Skip,
    Pair,
    KnownLeft,
    KnownRight,
}

/// A step together with the slot of the decommitment it consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PlannedStep {
    pub step: Step,
    pub sibling: Option<usize>,
}

/// Plan the replay of a proof for `indices` in a tree of `element_count`
/// elements.
pub(crate) fn plan_steps(
    indices: &[usize],
    element_count: usize,
) -> Result<Vec<PlannedStep>, MerkleError> {
    check_element_count(element_count)?;
    validate_indices(indices, element_count)?;
    let leaves = leaf_count(element_count);
    let mut queue: VecDeque<usize> = indices.iter().rev().map(|index| leaves + index).collect();
    let mut steps = Vec::new();

    while let Some(slot) = queue.pop_front() {
        if slot == 1 {
            break;
        }
        let planned = if slot & 1 == 1 {
            if queue.front() == Some(&(slot - 1)) {
                queue.pop_front();
                PlannedStep {
                    step: Step::Pair,
                    sibling: None,
                }
            } else {
                PlannedStep {
                    step: Step::KnownRight,
                    sibling: Some(slot - 1),
                }
            }
        } else if node_exists(slot + 1, element_count) {
            PlannedStep {
                step: Step::KnownLeft,
                sibling: Some(slot + 1),
            }
        } else {
            PlannedStep {
                step: Step::Skip,
                sibling: None,
            }
        };
        steps.push(planned);
        queue.push_back(slot >> 1);
    }

    Ok(steps)
}

/// Boolean vectors describing `steps`. `orders` is `None` in sorted-hash
/// mode, where the position of a decommitment does not matter.
pub(crate) fn steps_to_booleans(
    steps: &[Step],
    sorted_hash: bool,
) -> (Vec<bool>, Vec<bool>, Option<Vec<bool>>) {
    let flags = steps.iter().map(|step| *step == Step::Pair).collect();
    let skips = steps.iter().map(|step| *step == Step::Skip).collect();
    let orders = (!sorted_hash).then(|| {
        steps
            .iter()
            .map(|step| *step != Step::KnownRight)
            .collect()
    });
    (flags, skips, orders)
}

/// Rebuild steps from boolean vectors.
pub(crate) fn steps_from_booleans(
    flags: &[bool],
    skips: &[bool],
    orders: Option<&[bool]>,
    sorted_hash: bool,
) -> Result<Vec<Step>, MerkleError> {
    if flags.len() != skips.len() {
        return Err(MerkleError::MalformedProof(format!(
            "{} flags but {} skips",
            flags.len(),
            skips.len()
        )));
    }
    if let Some(orders) = orders {
        if orders.len() != flags.len() {
            return Err(MerkleError::MalformedProof(format!(
                "{} flags but {} orders",
                flags.len(),
                orders.len()
            )));
        }
    } else if !sorted_hash {
        return Err(MerkleError::MalformedProof(
            "orders are required unless hashing is sorted".into(),
        ));
    }

    flags
        .iter()
        .zip(skips)
        .enumerate()
        .map(|(i, (flag, skip))| match (flag, skip) {
            (true, true) => Err(MerkleError::MalformedProof(format!(
                "step {} is flagged and skipped",
                i
            ))),
            (true, false) => Ok(Step::Pair),
            (false, true) => Ok(Step::Skip),
            (false, false) => match orders {
                Some(orders) if !orders[i] => Ok(Step::KnownRight),
                _ => Ok(Step::KnownLeft),
            },
        })
        .collect()
}

/// Compact words for a multi proof:
/// `[word(n), (flags, skips, orders?)*, decommitments...]`.
///
/// Bit `i % 256` of group `i / 256` describes step `i`. A marker with both
/// the flag and the skip bit set follows the last step.
pub(crate) fn steps_to_words(
    element_count: usize,
    steps: &[Step],
    sorted_hash: bool,
    decommitments: &[Digest],
) -> Vec<Digest> {
    let (mut flags, mut skips, orders) = steps_to_booleans(steps, sorted_hash);
    flags.push(true);
    skips.push(true);
    let orders = orders.map(|mut orders| {
        orders.push(false);
        orders
    });

    let groups = steps.len() / WORD_BITS + 1;
    let stride = if sorted_hash { 2 } else { 3 };
    let mut words = Vec::with_capacity(1 + groups * stride + decommitments.len());
    words.push(to_word(element_count));
    for group in 0..groups {
        words.push(pack_group(&flags, group));
        words.push(pack_group(&skips, group));
        if let Some(orders) = &orders {
            words.push(pack_group(orders, group));
        }
    }
    words.extend_from_slice(decommitments);
    words
}

/// Parse compact words back into `(element_count, steps, decommitments)`.
pub(crate) fn steps_from_words(
    words: &[Digest],
    sorted_hash: bool,
) -> Result<(usize, Vec<Step>, Vec<Digest>), MerkleError> {
    let count_word = words
        .first()
        .ok_or_else(|| MerkleError::MalformedProof("compact proof is empty".into()))?;
    let element_count = from_word(count_word)?;
    let stride = if sorted_hash { 2 } else { 3 };

    let mut steps = Vec::new();
    let mut cursor = 1;
    loop {
        let group = words.get(cursor..cursor + stride).ok_or_else(|| {
            MerkleError::MalformedProof("compact proof has no stop marker".into())
        })?;
        cursor += stride;
        for bit in 0..WORD_BITS {
            let flag = word_bit(&group[0], bit);
            let skip = word_bit(&group[1], bit);
            let step = match (flag, skip) {
                (true, true) => return Ok((element_count, steps, words[cursor..].to_vec())),
                (true, false) => Step::Pair,
                (false, true) => Step::Skip,
                (false, false) if sorted_hash || word_bit(&group[2], bit) => Step::KnownLeft,
                (false, false) => Step::KnownRight,
            };
            steps.push(step);
        }
    }
}

/// Recover the element indices of `leaf_total` proved leaves from steps.
///
/// Every step lifts one queued node a level; when the node is a right child
/// the bit for that level is set in the index of every leaf below it.
/// Only meaningful when the steps carry real left/right information, i.e.
/// the proof has `orders`.
pub(crate) fn indices_from_steps(
    leaf_total: usize,
    steps: &[Step],
) -> Result<Vec<usize>, MerkleError> {
    let mut indices = vec![0usize; leaf_total];
    // Queue slots hold the positions (descending order) of the leaves below.
    let mut queue: VecDeque<(Vec<usize>, usize)> =
        (0..leaf_total).map(|position| (vec![position], 0)).collect();
    let short = || MerkleError::MalformedProof("more steps than known nodes".into());

    for step in steps {
        let (leaves, height) = queue.pop_front().ok_or_else(short)?;
        if height >= usize::BITS as usize {
            return Err(MerkleError::MalformedProof("proof is too deep".into()));
        }
        match step {
            Step::Skip | Step::KnownLeft => queue.push_back((leaves, height + 1)),
            Step::KnownRight => {
                for position in &leaves {
                    indices[*position] |= 1 << height;
                }
                queue.push_back((leaves, height + 1));
            }
            Step::Pair => {
                for position in &leaves {
                    indices[*position] |= 1 << height;
                }
                let (mut left, left_height) = queue.pop_front().ok_or_else(short)?;
                if left_height != height {
                    return Err(MerkleError::MalformedProof(
                        "paired nodes at different heights".into(),
                    ));
                }
                left.extend(leaves);
                queue.push_back((left, height + 1));
            }
        }
    }

    if queue.len() != 1 {
        return Err(MerkleError::MalformedProof(format!(
            "{} nodes left after the last step",
            queue.len()
        )));
    }
    indices.reverse();
    Ok(indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_single_index_walks_to_root() {
        // n = 5, index 4: slot 12 skips twice, then pairs with slot 2.
        let plan = plan_steps(&[4], 5).expect("plan");
        let steps: Vec<Step> = plan.iter().map(|p| p.step).collect();
        assert_eq!(steps, vec![Step::Skip, Step::Skip, Step::KnownRight]);
        assert_eq!(plan[2].sibling, Some(2));
    }

    #[test]
    fn test_plan_adjacent_indices_pair() {
        let plan = plan_steps(&[2, 3], 8).expect("plan");
        let steps: Vec<Step> = plan.iter().map(|p| p.step).collect();
        assert_eq!(steps, vec![Step::Pair, Step::KnownRight, Step::KnownLeft]);
        let siblings: Vec<usize> = plan.iter().filter_map(|p| p.sibling).collect();
        assert_eq!(siblings, vec![4, 3]);
    }

    #[test]
    fn test_plan_single_element_tree_has_no_steps() {
        assert!(plan_steps(&[0], 1).expect("plan").is_empty());
    }

    #[test]
    fn test_booleans_round_trip_through_steps() {
        let steps = vec![Step::Pair, Step::Skip, Step::KnownRight, Step::KnownLeft];
        let (flags, skips, orders) = steps_to_booleans(&steps, false);
        assert_eq!(flags, vec![true, false, false, false]);
        assert_eq!(skips, vec![false, true, false, false]);
        assert_eq!(orders, Some(vec![true, true, false, true]));
        assert_eq!(
            steps_from_booleans(&flags, &skips, orders.as_deref(), false).expect("steps"),
            steps
        );
    }

    #[test]
    fn test_booleans_without_orders_need_sorted_hash() {
        assert!(steps_from_booleans(&[false], &[false], None, false).is_err());
        assert_eq!(
            steps_from_booleans(&[false], &[false], None, true).expect("steps"),
            vec![Step::KnownLeft]
        );
        assert!(steps_from_booleans(&[true], &[true], None, true).is_err());
    }

    #[test]
    fn test_words_span_several_groups() {
        let steps: Vec<Step> = (0..300)
            .map(|i| match i % 4 {
                0 => Step::Pair,
                1 => Step::Skip,
                2 => Step::KnownLeft,
                _ => Step::KnownRight,
            })
            .collect();
        let decommitments = vec![[9u8; 32], [8u8; 32]];
        let words = steps_to_words(1000, &steps, false, &decommitments);
        // count + 2 groups of 3 + decommitments
        assert_eq!(words.len(), 1 + 6 + 2);
        let (count, parsed, parsed_decommitments) =
            steps_from_words(&words, false).expect("parse");
        assert_eq!(count, 1000);
        assert_eq!(parsed, steps);
        assert_eq!(parsed_decommitments, decommitments);
    }

    #[test]
    fn test_words_stop_marker_at_group_boundary() {
        let steps = vec![Step::KnownLeft; WORD_BITS];
        let words = steps_to_words(3, &steps, true, &[]);
        assert_eq!(words.len(), 1 + 2 * 2);
        let (_, parsed, rest) = steps_from_words(&words, true).expect("parse");
        assert_eq!(parsed.len(), WORD_BITS);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_words_without_stop_marker_are_rejected() {
        let words = vec![to_word(4), [0u8; 32], [0u8; 32], [0u8; 32]];
        assert!(steps_from_words(&words, false).is_err());
    }

    #[test]
    fn test_indices_recovered_from_plan() {
        let indices = vec![1, 4, 5, 9];
        let steps: Vec<Step> = plan_steps(&indices, 12)
            .expect("plan")
            .into_iter()
            .map(|p| p.step)
            .collect();
        assert_eq!(indices_from_steps(4, &steps).expect("indices"), indices);
    }
}
