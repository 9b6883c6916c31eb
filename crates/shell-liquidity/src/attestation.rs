use std::collections::HashSet;

use secp256k1::ecdsa::Signature;
use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};

use shell_core::constants::{
    BASIS_POINT_SCALE, MIN_ATTESTOR_SIGNATURES, SPREAD_FACTOR_MAX, SPREAD_FACTOR_MIN,
};
use shell_core::error::ShellError;
use shell_core::types::Hash256;
use shell_crypto::hash::{check_merkle_branch, sha256};
use shell_crypto::verify_signature;

/// One attestor's signature over the canonical attestation string.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttestorSignature {
    pub attestor: PublicKey,
    pub signature: Signature,
}

/// A signed statement about one participant's market-making metrics for one
/// epoch, with its Merkle inclusion proof against the epoch root.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LiquidityAttestation {
    pub participant_id: Hash256,
    pub epoch: u32,
    /// Verified traded volume in minor units.
    pub volume: u64,
    /// Average quoted spread in basis points.
    pub spread_bps: u32,
    /// Uptime in basis points (10_000 = always quoting).
    pub uptime_bps: u16,
    pub timestamp: u32,
    pub signatures: Vec<AttestorSignature>,
    /// Sibling hashes up the epoch tree.
    pub merkle_proof: Vec<Hash256>,
    /// Leaf position in the epoch tree (selects fold sides).
    pub leaf_index: u32,
}

impl LiquidityAttestation {
    /// The canonical byte string attestors sign:
    /// `epoch ‖ participant ‖ volume ‖ spread ‖ uptime ‖ timestamp`, all
    /// little-endian, hashed once with SHA-256.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + 32 + 8 + 4 + 2 + 4);
        buf.extend_from_slice(&self.epoch.to_le_bytes());
        buf.extend_from_slice(self.participant_id.as_bytes());
        buf.extend_from_slice(&self.volume.to_le_bytes());
        buf.extend_from_slice(&self.spread_bps.to_le_bytes());
        buf.extend_from_slice(&self.uptime_bps.to_le_bytes());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf
    }

    pub fn digest(&self) -> [u8; 32] {
        sha256(&self.canonical_bytes())
    }

    /// Quorum check: at least three distinct known attestors must have
    /// signed the canonical digest.
    pub fn verify_signatures(
        &self,
        known_attestors: &HashSet<PublicKey>,
    ) -> Result<(), ShellError> {
        let digest = self.digest();
        let mut distinct: HashSet<PublicKey> = HashSet::new();
        for entry in &self.signatures {
            if !known_attestors.contains(&entry.attestor) {
                continue;
            }
            if verify_signature(&entry.attestor, &digest, &entry.signature).is_ok() {
                distinct.insert(entry.attestor);
            }
        }
        if distinct.len() < MIN_ATTESTOR_SIGNATURES {
            return Err(ShellError::InsufficientAttestors {
                need: MIN_ATTESTOR_SIGNATURES,
                got: distinct.len(),
            });
        }
        Ok(())
    }

    /// Fold the leaf digest up the proof and compare against the epoch root.
    pub fn verify_inclusion(&self, epoch_root: &Hash256) -> Result<(), ShellError> {
        let folded = check_merkle_branch(self.digest(), &self.merkle_proof, self.leaf_index);
        if folded != *epoch_root.as_bytes() {
            return Err(ShellError::InvalidMerkleProof);
        }
        Ok(())
    }

    /// This attestation's reward weight.
    pub fn weight(&self) -> u64 {
        compute_weight(self.volume, self.uptime_bps, self.spread_bps)
    }
}

/// `weight = volume × uptime × spread_factor / 10000²` with
/// `spread_factor = clamp(10000 / (1 + spread/100), 1000, 10000)`: tighter
/// spreads weigh more, floored against zeroing out and capped against
/// dominance.
pub fn compute_weight(volume: u64, uptime_bps: u16, spread_bps: u32) -> u64 {
    let spread_factor =
        (BASIS_POINT_SCALE / (1 + spread_bps as u64 / 100)).clamp(SPREAD_FACTOR_MIN, SPREAD_FACTOR_MAX);
    volume
        .saturating_mul(uptime_bps as u64)
        .saturating_mul(spread_factor)
        / (BASIS_POINT_SCALE * BASIS_POINT_SCALE)
}
