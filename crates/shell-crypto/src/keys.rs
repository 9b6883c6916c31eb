use once_cell::sync::Lazy;
use secp256k1::ecdsa::Signature;
use secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey};

use shell_core::error::ShellError;

/// Process-wide secp256k1 context. Construction is expensive; verification
/// through a shared context is thread-safe.
static SECP: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

/// Borrow the shared secp256k1 context.
pub fn secp() -> &'static Secp256k1<All> {
    &SECP
}

/// Verify a compact ECDSA signature over a precomputed 32-byte digest.
pub fn verify_signature(
    public_key: &PublicKey,
    digest: &[u8; 32],
    signature: &Signature,
) -> Result<(), ShellError> {
    let msg = Message::from_digest(*digest);
    SECP.verify_ecdsa(&msg, signature, public_key)
        .map_err(|_| ShellError::InvalidSignature)
}

// ── KeyPair ──────────────────────────────────────────────────────────────────

/// A secp256k1 keypair. Participants appear on the wire as 33-byte
/// compressed public keys; signatures as 64-byte compact ECDSA.
pub struct KeyPair {
    pub public_key: PublicKey,
    secret_key: SecretKey,
}

impl KeyPair {
    /// Generate a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        let (secret_key, public_key) = SECP.generate_keypair(&mut rand::thread_rng());
        Self {
            public_key,
            secret_key,
        }
    }

    /// Sign a precomputed 32-byte digest.
    pub fn sign(&self, digest: &[u8; 32]) -> Signature {
        let msg = Message::from_digest(*digest);
        SECP.sign_ecdsa(&msg, &self.secret_key)
    }

    /// Compressed 33-byte encoding of the public key.
    pub fn public_bytes(&self) -> [u8; 33] {
        self.public_key.serialize()
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyPair {{ public_key: {} }}", self.public_key)
    }
}
