//! Hashing Module
//!
//! Lock-id derivation and preimage hashing shared by both escrow variants.
//!
//! Lock ids are content-addressed: they are a pure function of the escrow's
//! defining parameters, so no counter or nonce is involved and identical
//! parameter tuples always produce the same id.

use sha2::{Digest, Sha256};

use crate::types::{Address, Amount, Hash32, LockId};

// ============================================================================
// DIGESTS
// ============================================================================

/// SHA-256 of arbitrary bytes.
pub fn sha256(data: &[u8]) -> Hash32 {
    let mut hasher = Sha256::new();
    hasher.update(data);
    Hash32(hasher.finalize().into())
}

/// Returns true if `sha256(preimage) == hashlock`.
pub fn verify_preimage(preimage: &[u8], hashlock: &Hash32) -> bool {
    sha256(preimage) == *hashlock
}

/// Hex SHA-256 of a UTF-8 preimage, without `0x` prefix.
///
/// This is the hashlock format used by the ledger-backed variant.
pub fn hash_preimage(preimage: &str) -> String {
    sha256(preimage.as_bytes()).to_hex()
}

/// Checks a text preimage against a hex digest.
///
/// The digest may carry a `0x` prefix and any hex case. A malformed digest
/// never verifies.
pub fn verify_preimage_hash(preimage: &str, hashlock: &str) -> bool {
    match hashlock.parse::<Hash32>() {
        Ok(digest) => verify_preimage(preimage.as_bytes(), &digest),
        Err(_) => false,
    }
}

// ============================================================================
// LOCK ID DERIVATION
// ============================================================================

/// Left-pads a big-endian integer into a 32-byte word.
fn word_u256(value_be: &[u8]) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[32 - value_be.len()..].copy_from_slice(value_be);
    word
}

/// Derives the lock id of a native escrow.
///
/// Packs `sender(20) ∥ receiver(20) ∥ amount(32) ∥ hashlock(32) ∥ timelock(32)`
/// with integers as big-endian 256-bit words, then hashes with SHA-256. This
/// matches `sha256(abi.encodePacked(address, address, uint256, bytes32, uint256))`.
pub fn native_lock_id(
    sender: &Address,
    receiver: &Address,
    amount: Amount,
    hashlock: &Hash32,
    timelock: u64,
) -> LockId {
    let mut packed = Vec::with_capacity(20 + 20 + 32 + 32 + 32);
    packed.extend_from_slice(sender.as_bytes());
    packed.extend_from_slice(receiver.as_bytes());
    packed.extend_from_slice(&word_u256(&amount.to_be_bytes()));
    packed.extend_from_slice(hashlock.as_bytes());
    packed.extend_from_slice(&word_u256(&timelock.to_be_bytes()));
    sha256(&packed)
}

/// Appends a length-prefixed text field.
fn push_text(buf: &mut Vec<u8>, text: &str) {
    buf.extend_from_slice(&(text.len() as u32).to_be_bytes());
    buf.extend_from_slice(text.as_bytes());
}

/// Derives the lock id of a ledger-backed escrow.
///
/// Principals and ledger ids are variable-length text, so every text field is
/// length-prefixed (`u32` big-endian) to keep the encoding unambiguous.
pub fn ledger_lock_id(
    sender: &str,
    receiver: &str,
    amount: u64,
    hashlock: &Hash32,
    timelock: u64,
    ledger_id: &str,
) -> LockId {
    let mut packed = Vec::with_capacity(64 + sender.len() + receiver.len() + ledger_id.len());
    push_text(&mut packed, sender);
    push_text(&mut packed, receiver);
    packed.extend_from_slice(&amount.to_be_bytes());
    packed.extend_from_slice(hashlock.as_bytes());
    packed.extend_from_slice(&timelock.to_be_bytes());
    push_text(&mut packed, ledger_id);
    sha256(&packed)
}
