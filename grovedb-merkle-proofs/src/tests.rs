use assert_matches::assert_matches;
use proptest::prelude::*;

use super::*;
use crate::test_utils::{all_configs, reference_elements, unbalanced_configs};

fn digest(hex_str: &str) -> Digest {
    let bytes = hex::decode(hex_str).expect("valid hex");
    bytes.try_into().expect("32 bytes")
}

fn tree(count: usize, config: TreeConfig) -> MerkleTree {
    MerkleTree::new(&reference_elements(count), config).expect("build tree")
}

// ── Reference vectors ────────────────────────────────────────────────

#[test]
fn test_reference_elements() {
    let elements = reference_elements(2);
    assert_eq!(
        hex::encode(&elements[0]),
        "06d41322d79dfed27126569cb9a80eb0967335bf2f3316359d2a93c779fcd38a"
    );
    assert_eq!(
        hex::encode(&elements[1]),
        "ab28e51d2b2978f600476d733f1fb8688095ab06619ff948f4faf487a36d61be"
    );
}

#[test]
fn test_reference_roots() {
    let cases = [
        (
            8,
            false,
            "0c67c6340449c320fb4966988f319713e0610c40237a05fdef8e5da8c66db8a4",
            "d2fa9d47845f1571f1318afaaabc63a55cc57af3f511e42fc30e05f171d6853d",
        ),
        (
            8,
            true,
            "7f8dc34b7b4e06eff546283358ff8d7a988b62bc266f6337f8234c9a84778221",
            "6764fd6d226590b844285c3d0f1e12bbd19cb7d1ee8277b0fb5b9b45efbbffb6",
        ),
        (
            5,
            false,
            "d0fd6180ac3efb98b4b5727adae12b338eb15c61b6e52e65058ce552875d4fa5",
            "6eb30323d2f782a5421d0cd29c11e670c5911b49afe2a1901e610b3198fa98c7",
        ),
        (
            12,
            true,
            "32f63ef925c871fdea1294f6443fc182bfef69c4ed42fd72a00e3cb5b48d84ca",
            "eed791e2f595179f11e8c2ac3457efb0e6374a6c9ae31f6fe6eeab9ddb5b2a92",
        ),
        (
            1,
            false,
            "0e3ba1c61ffe3e984a50346034613b3b7368e64dafd5ea3d2ac05fc5ada33a60",
            "c83b51dc238800a2852366108ab7df1e32b35e99905c5d845ff5a652f0fb58a8",
        ),
    ];
    for (count, sorted, element_root, root) in cases {
        let tree = tree(count, TreeConfig::new().with_sorted_hash(sorted));
        assert_eq!(tree.element_root(), digest(element_root), "n = {}", count);
        assert_eq!(tree.root(), digest(root), "n = {}", count);
    }
}

#[test]
fn test_single_proof_reference_vector() {
    let tree = tree(8, TreeConfig::new());
    let proof = tree.generate_single_proof(2).expect("proof");
    assert_eq!(proof.decommitments.len(), 3);
    assert_eq!(
        proof.root,
        digest("d2fa9d47845f1571f1318afaaabc63a55cc57af3f511e42fc30e05f171d6853d")
    );
    assert!(proof.verify(&TreeConfig::new()));
}

// ── Construction ─────────────────────────────────────────────────────

#[test]
fn test_empty_tree_root_is_zero() {
    for config in all_configs() {
        let tree = MerkleTree::new(&Vec::<Vec<u8>>::new(), config).expect("empty tree");
        assert_eq!(tree.root(), ZERO_DIGEST);
        assert_eq!(tree.element_root(), ZERO_DIGEST);
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.element_count(), 0);
    }
}

#[test]
fn test_node_array_layout() {
    let tree = tree(5, TreeConfig::new());
    assert_eq!(tree.depth(), 3);
    assert_eq!(tree.nodes().len(), 16);
    // Slots 6 and 3 have no right child and carry slot 12 up.
    assert_eq!(tree.nodes()[6], tree.nodes()[12]);
    assert_eq!(tree.nodes()[3], tree.nodes()[12]);
    assert_eq!(tree.nodes()[13], ZERO_DIGEST);
    assert_eq!(tree.nodes()[1], tree.element_root());
}

#[test]
fn test_balanced_rejects_non_power_of_two() {
    let result = MerkleTree::new(
        &reference_elements(6),
        TreeConfig::new().with_unbalanced(false),
    );
    assert_matches!(result, Err(MerkleError::InvalidConfig(_)));
}

#[test]
fn test_balanced_and_unbalanced_agree_on_powers_of_two() {
    for count in [1, 2, 4, 8, 16, 32] {
        for sorted in [false, true] {
            let unbalanced = tree(count, TreeConfig::new().with_sorted_hash(sorted));
            let balanced = tree(
                count,
                TreeConfig::new()
                    .with_sorted_hash(sorted)
                    .with_unbalanced(false),
            );
            assert_eq!(unbalanced.root(), balanced.root(), "n = {}", count);
        }
    }
}

#[test]
fn test_element_prefix_changes_root() {
    let default = tree(4, TreeConfig::new());
    let prefixed = tree(4, TreeConfig::new().with_element_prefix(vec![0x01]));
    let unprefixed = tree(4, TreeConfig::new().with_element_prefix(Vec::new()));
    assert_ne!(default.root(), prefixed.root());
    assert_ne!(default.root(), unprefixed.root());
}

#[test]
fn test_blake3_hasher_builds_and_proves() {
    let config = TreeConfig::<Blake3Hasher>::default();
    let tree = MerkleTree::new(&reference_elements(7), config.clone()).expect("tree");
    assert_ne!(tree.root(), self::tree(7, TreeConfig::new()).root());
    let proof = tree.generate_single_proof(6).expect("proof");
    assert!(proof.verify(&config));
}

// ── Functional updates ───────────────────────────────────────────────

#[test]
fn test_set_matches_rebuild() {
    let original = tree(11, TreeConfig::new());
    let updated = original
        .set(&[2, 7, 10], &[b"a".as_slice(), b"b", b"c"])
        .expect("set");

    let mut elements = reference_elements(11);
    elements[2] = b"a".to_vec();
    elements[7] = b"b".to_vec();
    elements[10] = b"c".to_vec();
    let rebuilt = MerkleTree::new(&elements, TreeConfig::new()).expect("tree");
    assert_eq!(updated.root(), rebuilt.root());
    // The original is untouched.
    assert_eq!(original.elements()[2], reference_elements(11)[2]);
}

#[test]
fn test_set_rejects_bad_indices() {
    let tree = tree(4, TreeConfig::new());
    assert_matches!(
        tree.set(&[4], &[b"x"]),
        Err(MerkleError::IndexOutOfRange {
            index: 4,
            element_count: 4
        })
    );
    assert_matches!(
        tree.set(&[2, 1], &[b"x", b"y"]),
        Err(MerkleError::UnsortedIndices)
    );
    assert_matches!(tree.set(&[1], &[b"x", b"y"]), Err(MerkleError::InvalidInput(_)));
}

#[test]
fn test_append_matches_rebuild() {
    let appended = tree(5, TreeConfig::new())
        .append(&reference_elements(8)[5..])
        .expect("append");
    assert_eq!(appended.root(), tree(8, TreeConfig::new()).root());
    assert_matches!(
        tree(5, TreeConfig::new()).append(&Vec::<Vec<u8>>::new()),
        Err(MerkleError::InvalidInput(_))
    );
}

#[test]
fn test_update_single_returns_old_proof_and_new_tree() {
    let original = tree(6, TreeConfig::new());
    let (proof, updated) = original.update_single(3, b"new").expect("update");
    assert_eq!(proof.root, original.root());

    let outcome = proof.update(&TreeConfig::new(), b"new").expect("apply");
    assert_eq!(outcome.root, original.root());
    assert_eq!(outcome.new_root, updated.root());
}

#[test]
fn test_update_and_append_matches_rebuild() {
    let original = tree(6, TreeConfig::new());
    let (proof, updated) = original
        .update_and_append(
            &[1, 5],
            &[b"one".as_slice(), b"five"],
            &[b"six".as_slice(), b"seven"],
            MultiProofEncoding::Indexed,
        )
        .expect("update and append");

    let mut elements = reference_elements(6);
    elements[1] = b"one".to_vec();
    elements[5] = b"five".to_vec();
    elements.push(b"six".to_vec());
    elements.push(b"seven".to_vec());
    let rebuilt = MerkleTree::new(&elements, TreeConfig::new()).expect("tree");
    assert_eq!(updated.root(), rebuilt.root());

    let outcome = proof
        .update_and_append(
            &TreeConfig::new(),
            &[b"one".as_slice(), b"five"],
            &[b"six".as_slice(), b"seven"],
        )
        .expect("apply");
    assert_eq!(outcome.root, original.root());
    assert_eq!(outcome.new_root, rebuilt.root());
    assert_eq!(outcome.element_count, 8);
}

#[test]
fn test_minimum_combinable_index() {
    assert_eq!(tree(12, TreeConfig::new()).minimum_combinable_index(), 8);
    assert_eq!(tree(13, TreeConfig::new()).minimum_combinable_index(), 12);
    assert_eq!(tree(16, TreeConfig::new()).minimum_combinable_index(), 0);
    assert_eq!(minimum_combinable_index(6), 4);
}

#[test]
fn test_words() {
    assert_eq!(from_word(&to_word(300)).expect("word"), 300);
    let mut oversized = [0u8; 32];
    oversized[0] = 1;
    assert_matches!(from_word(&oversized), Err(MerkleError::MalformedProof(_)));
}

// ── Properties ───────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_single_proofs_verify(count in 1usize..70, pick in any::<prop::sample::Index>()) {
        for config in unbalanced_configs() {
            let tree = tree(count, config.clone());
            let index = pick.index(count);
            let proof = tree.generate_single_proof(index).expect("proof");
            prop_assert!(proof.verify(&config));
            let compact = SingleProof::from_compact(
                proof.root,
                index,
                proof.element.clone(),
                &proof.to_compact(),
            ).expect("compact");
            prop_assert_eq!(&compact, &proof);
        }
    }

    #[test]
    fn prop_multi_encodings_verify_and_recover_indices(
        count in 1usize..70,
        mask in prop::collection::vec(any::<bool>(), 70),
    ) {
        let mut indices: Vec<usize> = (0..count).filter(|i| mask[*i]).collect();
        if indices.is_empty() {
            indices.push(count - 1);
        }
        for config in unbalanced_configs() {
            let tree = tree(count, config.clone());
            for encoding in [
                MultiProofEncoding::Indexed,
                MultiProofEncoding::Booleans,
                MultiProofEncoding::Bits,
            ] {
                let proof = tree.generate_multi_proof(&indices, encoding).expect("proof");
                prop_assert!(proof.verify(&config), "{:?}", encoding);
                prop_assert_eq!(proof.element_count().expect("count"), count);
                if !config.sorted_hash() {
                    prop_assert_eq!(proof.indices(&config).expect("indices"), indices.clone());
                }
            }
        }
    }

    #[test]
    fn prop_append_matches_rebuild(count in 0usize..40, extra in 1usize..20) {
        let all = reference_elements(count + extra);
        for config in unbalanced_configs() {
            let tree = MerkleTree::new(&all[..count], config.clone()).expect("tree");
            let expected = MerkleTree::new(&all, config.clone()).expect("tree");
            let proof = tree.generate_append_proof().expect("proof");
            prop_assert!(proof.verify(&config));
            let outcome = proof.append(&config, &all[count..]).expect("append");
            prop_assert_eq!(outcome.root, tree.root());
            prop_assert_eq!(outcome.new_root, expected.root());
            prop_assert_eq!(outcome.element_count, count + extra);
        }
    }

    #[test]
    fn prop_multi_update_matches_rebuild(
        count in 1usize..50,
        mask in prop::collection::vec(any::<bool>(), 50),
    ) {
        let mut indices: Vec<usize> = (0..count).filter(|i| mask[*i]).collect();
        if indices.is_empty() {
            indices.push(0);
        }
        let replacements: Vec<Vec<u8>> = indices.iter().map(|i| i.to_be_bytes().to_vec()).collect();
        for config in unbalanced_configs() {
            let (proof, updated) = tree(count, config.clone())
                .update_multi(&indices, &replacements, MultiProofEncoding::Bits)
                .expect("update");
            let outcome = proof.update(&config, &replacements).expect("apply");
            prop_assert_eq!(outcome.new_root, updated.root());
        }
    }

    #[test]
    fn prop_combined_matches_rebuild(count in 1usize..50, extra in 1usize..10) {
        let all = reference_elements(count + extra);
        let minimum = minimum_combinable_index(count);
        let indices: Vec<usize> = (minimum..count).step_by(2).collect();
        for config in unbalanced_configs() {
            let tree = MerkleTree::new(&all[..count], config.clone()).expect("tree");
            let (proof, appended) = tree
                .use_and_append(&indices, &all[count..], MultiProofEncoding::Booleans)
                .expect("use and append");
            prop_assert!(proof.verify(&config));
            let outcome = proof.use_and_append(&config, &all[count..]).expect("apply");
            prop_assert_eq!(outcome.root, tree.root());
            prop_assert_eq!(outcome.new_root, appended.root());
        }
    }
}
