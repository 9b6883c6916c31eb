use std::collections::HashSet;
use std::sync::RwLock;

use secp256k1::PublicKey;
use tracing::info;

use shell_core::constants::REWARD_CLAIM_VERSION;
use shell_core::error::ShellError;
use shell_core::policy::ChainParams;
use shell_core::types::{BlockHeight, Hash256, MinorUnits};
use shell_crypto::hash::sha256;

use crate::attestation::LiquidityAttestation;
use crate::epoch::{build_schedule, epoch_index_for_height, LiquidityEpoch};

/// Hash committing to one reward claim:
/// `version ‖ epoch ‖ attestation bytes ‖ proof nodes`, SHA-256.
pub fn claim_hash(attestation: &LiquidityAttestation) -> Hash256 {
    let mut buf = Vec::new();
    buf.extend_from_slice(&REWARD_CLAIM_VERSION.to_le_bytes());
    buf.extend_from_slice(&attestation.epoch.to_le_bytes());
    buf.extend_from_slice(&attestation.canonical_bytes());
    for node in &attestation.merkle_proof {
        buf.extend_from_slice(node.as_bytes());
    }
    Hash256::from_bytes(sha256(&buf))
}

struct LiquidityState {
    epochs: Vec<LiquidityEpoch>,
    known_attestors: HashSet<PublicKey>,
    claimed: HashSet<Hash256>,
}

/// Epoch schedule, attestor registry, and the single-claim reward ledger.
pub struct LiquidityManager {
    params: ChainParams,
    state: RwLock<LiquidityState>,
}

impl LiquidityManager {
    pub fn new(params: ChainParams) -> Self {
        let epochs = build_schedule(&params);
        Self {
            params,
            state: RwLock::new(LiquidityState {
                epochs,
                known_attestors: HashSet::new(),
                claimed: HashSet::new(),
            }),
        }
    }

    pub fn add_attestor(&self, attestor: PublicKey) {
        self.state
            .write()
            .expect("liquidity manager poisoned")
            .known_attestors
            .insert(attestor);
    }

    pub fn epoch(&self, index: u32) -> Option<LiquidityEpoch> {
        self.state
            .read()
            .expect("liquidity manager poisoned")
            .epochs
            .get(index as usize)
            .cloned()
    }

    pub fn epoch_for_height(&self, height: BlockHeight) -> Option<LiquidityEpoch> {
        epoch_index_for_height(&self.params, height).and_then(|i| self.epoch(i))
    }

    /// Set an epoch's Merkle root and total weight. Claims against the
    /// epoch become possible from here on.
    pub fn finalize_epoch(
        &self,
        index: u32,
        merkle_root: Hash256,
        total_weight: u64,
    ) -> Result<(), ShellError> {
        let mut state = self.state.write().expect("liquidity manager poisoned");
        let epoch = state
            .epochs
            .get_mut(index as usize)
            .ok_or_else(|| ShellError::Invalid(format!("epoch {index} out of range")))?;
        if epoch.is_finalized() {
            return Err(ShellError::Invalid(format!(
                "epoch {index} already finalized"
            )));
        }
        if total_weight == 0 {
            return Err(ShellError::Invalid(
                "finalized epoch must carry nonzero total weight".into(),
            ));
        }
        epoch.merkle_root = Some(merkle_root);
        epoch.total_weight = total_weight;
        info!(epoch = index, total_weight, "finalized liquidity epoch");
        Ok(())
    }

    /// Validate an attestation and register its reward claim.
    ///
    /// Returns the maximum value the claim output may carry:
    /// `weight × reward_pool / total_weight`.
    pub fn claim_reward(
        &self,
        attestation: &LiquidityAttestation,
        claim_output_value: MinorUnits,
    ) -> Result<MinorUnits, ShellError> {
        let mut state = self.state.write().expect("liquidity manager poisoned");

        let epoch = state
            .epochs
            .get(attestation.epoch as usize)
            .ok_or_else(|| ShellError::Invalid(format!("epoch {} out of range", attestation.epoch)))?
            .clone();
        let root = epoch
            .merkle_root
            .ok_or(ShellError::EpochNotFinalized(attestation.epoch))?;

        attestation.verify_signatures(&state.known_attestors)?;
        attestation.verify_inclusion(&root)?;

        let weight = attestation.weight();
        let max_value = ((weight as u128 * epoch.reward_pool as u128)
            / epoch.total_weight.max(1) as u128) as MinorUnits;
        if claim_output_value > max_value {
            return Err(ShellError::Invalid(format!(
                "claim output {claim_output_value} exceeds entitlement {max_value}"
            )));
        }

        let hash = claim_hash(attestation);
        if !state.claimed.insert(hash) {
            return Err(ShellError::AlreadyClaimed);
        }
        info!(
            epoch = attestation.epoch,
            participant = %attestation.participant_id,
            weight,
            "registered liquidity reward claim"
        );
        Ok(max_value)
    }

    pub fn claimed_count(&self) -> usize {
        self.state
            .read()
            .expect("liquidity manager poisoned")
            .claimed
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attestation::AttestorSignature;
    use shell_crypto::hash::check_merkle_branch;
    use shell_crypto::KeyPair;

    fn manager_with_attestors(n: usize) -> (LiquidityManager, Vec<KeyPair>) {
        let params = ChainParams {
            liquidity_start_block: 0,
            liquidity_epoch_blocks: 1_000,
            liquidity_reward_pool: 1_200_000_000,
            ..ChainParams::default()
        };
        let manager = LiquidityManager::new(params);
        let attestors: Vec<KeyPair> = (0..n).map(|_| KeyPair::generate()).collect();
        for kp in &attestors {
            manager.add_attestor(kp.public_key);
        }
        (manager, attestors)
    }

    fn signed_attestation(attestors: &[KeyPair], epoch: u32) -> LiquidityAttestation {
        let mut att = LiquidityAttestation {
            participant_id: Hash256::from_bytes([9u8; 32]),
            epoch,
            volume: 80_000_000,
            spread_bps: 40,
            uptime_bps: 9_500,
            timestamp: 1_760_000_000,
            signatures: Vec::new(),
            merkle_proof: vec![Hash256::from_bytes([0x11; 32])],
            leaf_index: 0,
        };
        let digest = att.digest();
        att.signatures = attestors
            .iter()
            .map(|kp| AttestorSignature {
                attestor: kp.public_key,
                signature: kp.sign(&digest),
            })
            .collect();
        att
    }

    /// The root the attestation's proof folds to.
    fn root_for(att: &LiquidityAttestation) -> Hash256 {
        Hash256::from_bytes(check_merkle_branch(
            att.digest(),
            &att.merkle_proof,
            att.leaf_index,
        ))
    }

    #[test]
    fn claim_against_unfinalized_epoch_fails() {
        let (manager, attestors) = manager_with_attestors(3);
        let att = signed_attestation(&attestors, 2);
        assert!(matches!(
            manager.claim_reward(&att, 1),
            Err(ShellError::EpochNotFinalized(2))
        ));
    }

    #[test]
    fn valid_claim_registers_once() {
        let (manager, attestors) = manager_with_attestors(3);
        let att = signed_attestation(&attestors, 2);
        manager
            .finalize_epoch(2, root_for(&att), att.weight() * 4)
            .unwrap();

        let epoch = manager.epoch(2).unwrap();
        let expected_max =
            (att.weight() as u128 * epoch.reward_pool as u128 / epoch.total_weight as u128) as i64;
        let max = manager.claim_reward(&att, expected_max).unwrap();
        assert_eq!(max, expected_max);
        assert_eq!(manager.claimed_count(), 1);

        // Identical claim hash: single-claim enforcement.
        assert!(matches!(
            manager.claim_reward(&att, max),
            Err(ShellError::AlreadyClaimed)
        ));
    }

    #[test]
    fn overvalued_claim_rejected() {
        let (manager, attestors) = manager_with_attestors(3);
        let att = signed_attestation(&attestors, 0);
        manager
            .finalize_epoch(0, root_for(&att), att.weight() * 4)
            .unwrap();

        let epoch = manager.epoch(0).unwrap();
        let max =
            (att.weight() as u128 * epoch.reward_pool as u128 / epoch.total_weight as u128) as i64;
        assert!(manager.claim_reward(&att, max + 1).is_err());
        // The failed claim did not consume the claim hash.
        assert_eq!(manager.claimed_count(), 0);
    }

    #[test]
    fn wrong_proof_is_invalid_merkle() {
        let (manager, attestors) = manager_with_attestors(3);
        let att = signed_attestation(&attestors, 1);
        manager
            .finalize_epoch(1, Hash256::from_bytes([0xee; 32]), 1_000)
            .unwrap();
        assert!(matches!(
            manager.claim_reward(&att, 1),
            Err(ShellError::InvalidMerkleProof)
        ));
    }

    #[test]
    fn two_attestors_insufficient() {
        let (manager, attestors) = manager_with_attestors(2);
        let att = signed_attestation(&attestors, 0);
        manager.finalize_epoch(0, root_for(&att), 1_000).unwrap();
        assert!(matches!(
            manager.claim_reward(&att, 1),
            Err(ShellError::InsufficientAttestors { .. })
        ));
    }

    #[test]
    fn double_finalization_rejected() {
        let (manager, _) = manager_with_attestors(0);
        manager
            .finalize_epoch(5, Hash256::from_bytes([1u8; 32]), 10)
            .unwrap();
        assert!(manager
            .finalize_epoch(5, Hash256::from_bytes([2u8; 32]), 10)
            .is_err());
    }
}
