use sha2::{Digest, Sha256};

use shell_core::types::Hash256;

/// Single SHA-256 of arbitrary bytes → 32-byte array.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(data));
    out
}

/// Double SHA-256, the hash used for transaction ids, block hashes and
/// Merkle tree nodes.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// Single SHA-256 wrapped into a `Hash256`.
pub fn sha256_hash(data: &[u8]) -> Hash256 {
    Hash256::from_bytes(sha256(data))
}

/// Double SHA-256 wrapped into a `Hash256`.
pub fn sha256d_hash(data: &[u8]) -> Hash256 {
    Hash256::from_bytes(sha256d(data))
}

/// Fold a leaf hash up a Merkle branch.
///
/// Bit `i` of `index` gives the leaf's position at level `i`: when set, the
/// sibling is the left node at that level, otherwise the right. Each level
/// is the double-SHA-256 of the 64-byte concatenation.
pub fn check_merkle_branch(leaf: [u8; 32], branch: &[Hash256], index: u32) -> [u8; 32] {
    let mut current = leaf;
    for (level, sibling) in branch.iter().enumerate() {
        let mut buf = [0u8; 64];
        if (index >> level) & 1 == 1 {
            buf[..32].copy_from_slice(sibling.as_bytes());
            buf[32..].copy_from_slice(&current);
        } else {
            buf[..32].copy_from_slice(&current);
            buf[32..].copy_from_slice(sibling.as_bytes());
        }
        current = sha256d(&buf);
    }
    current
}
