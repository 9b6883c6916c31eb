pub mod hash;
pub mod keys;

pub use hash::{check_merkle_branch, sha256, sha256d, sha256d_hash, sha256_hash};
pub use keys::{secp, verify_signature, KeyPair};
