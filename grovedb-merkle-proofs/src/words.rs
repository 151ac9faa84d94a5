//! 32-byte word encoding for counts and packed step bits.
//!
//! Words are big-endian and zero-left-padded, the same width as a digest,
//! so compact proofs are a flat list of words.

use crate::{Digest, MerkleError};

/// Number of bits packed into one word.
pub(crate) const WORD_BITS: usize = 256;

/// Encode `value` as a big-endian 32-byte word.
pub fn to_word(value: usize) -> Digest {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&(value as u64).to_be_bytes());
    word
}

/// Decode a big-endian 32-byte word into a `usize`.
///
/// Fails when the value does not fit.
pub fn from_word(word: &Digest) -> Result<usize, MerkleError> {
    if word[..24].iter().any(|b| *b != 0) {
        return Err(MerkleError::MalformedProof(format!(
            "word {} does not fit in 64 bits",
            hex::encode(word)
        )));
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&word[24..]);
    usize::try_from(u64::from_be_bytes(bytes)).map_err(|_| {
        MerkleError::MalformedProof(format!("word {} does not fit in usize", hex::encode(word)))
    })
}

/// Test bit `bit` (0 = least significant) of a word.
pub(crate) fn word_bit(word: &Digest, bit: usize) -> bool {
    debug_assert!(bit < WORD_BITS);
    word[31 - bit / 8] >> (bit % 8) & 1 == 1
}

/// Set bit `bit` (0 = least significant) of a word.
pub(crate) fn set_word_bit(word: &mut Digest, bit: usize) {
    debug_assert!(bit < WORD_BITS);
    word[31 - bit / 8] |= 1 << (bit % 8);
}

/// Pack the bits of group `group` (bits `[256 * group, 256 * group + 256)`).
pub(crate) fn pack_group(bits: &[bool], group: usize) -> Digest {
    let mut word = [0u8; 32];
    let start = group * WORD_BITS;
    for (offset, bit) in bits.iter().skip(start).take(WORD_BITS).enumerate() {
        if *bit {
            set_word_bit(&mut word, offset);
        }
    }
    word
}
