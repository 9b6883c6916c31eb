use std::collections::HashMap;
use std::sync::RwLock;

use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};
use tracing::info;

use shell_core::error::ShellError;
use shell_core::types::{BlockHeight, ChannelId, Hash256, MinorUnits, OutPoint};
use shell_crypto::hash::sha256;
use shell_crypto::verify_signature;
use shell_script::ChannelUpdateParams;
use shell_wire::encode_outpoint;

/// A bilateral payment channel. Participant order is fixed at creation and
/// canonical; balances always sum to capacity while open.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Channel {
    pub channel_id: ChannelId,
    pub participants: [PublicKey; 2],
    pub capacity: MinorUnits,
    pub balances: [MinorUnits; 2],
    pub nonce: u64,
    pub is_open: bool,
    pub expiry_height: BlockHeight,
    pub funding_outpoint: OutPoint,
}

/// Canonical channel id: SHA-256 over both participant keys and the funding
/// outpoint.
pub fn derive_channel_id(alice: &PublicKey, bob: &PublicKey, funding: &OutPoint) -> ChannelId {
    let mut buf = Vec::with_capacity(33 + 33 + 36);
    buf.extend_from_slice(&alice.serialize());
    buf.extend_from_slice(&bob.serialize());
    buf.extend_from_slice(&encode_outpoint(funding));
    ChannelId(Hash256::from_bytes(sha256(&buf)))
}

/// Digest both participants sign to authorize a state update.
pub fn update_digest(
    channel_id: &ChannelId,
    balance_a: MinorUnits,
    balance_b: MinorUnits,
    nonce: u64,
) -> [u8; 32] {
    let mut buf = Vec::with_capacity(32 + 8 + 8 + 8);
    buf.extend_from_slice(channel_id.0.as_bytes());
    buf.extend_from_slice(&balance_a.to_le_bytes());
    buf.extend_from_slice(&balance_b.to_le_bytes());
    buf.extend_from_slice(&nonce.to_le_bytes());
    sha256(&buf)
}

/// Registry of all channels, open and closed.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: RwLock<HashMap<ChannelId, Channel>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a channel funded with `capacity`, initially credited entirely to
    /// the first participant.
    pub fn open_channel(
        &self,
        alice: PublicKey,
        bob: PublicKey,
        capacity: MinorUnits,
        expiry_height: BlockHeight,
        funding_outpoint: OutPoint,
    ) -> Result<ChannelId, ShellError> {
        if capacity <= 0 {
            return Err(ShellError::InvalidCapacity);
        }
        let channel_id = derive_channel_id(&alice, &bob, &funding_outpoint);

        let mut channels = self.channels.write().expect("channel registry poisoned");
        if channels.contains_key(&channel_id) {
            return Err(ShellError::DuplicateChannel(channel_id));
        }
        channels.insert(
            channel_id,
            Channel {
                channel_id,
                participants: [alice, bob],
                capacity,
                balances: [capacity, 0],
                nonce: 0,
                is_open: true,
                expiry_height,
                funding_outpoint,
            },
        );
        info!(channel = %channel_id, capacity, "opened channel");
        Ok(channel_id)
    }

    /// Apply a signed balance update. The nonce must strictly increase and
    /// both participants must have signed the new state.
    pub fn update_channel(
        &self,
        update: &ChannelUpdateParams,
        current_height: BlockHeight,
    ) -> Result<(), ShellError> {
        let mut channels = self.channels.write().expect("channel registry poisoned");
        let channel = channels
            .get_mut(&update.channel_id)
            .ok_or(ShellError::UnknownChannel(update.channel_id))?;

        if !channel.is_open {
            return Err(ShellError::ChannelClosed);
        }
        if current_height >= channel.expiry_height {
            return Err(ShellError::ChannelExpired {
                expiry: channel.expiry_height,
            });
        }
        if update.nonce <= channel.nonce {
            return Err(ShellError::StaleNonce {
                current: channel.nonce,
                got: update.nonce,
            });
        }
        if update.balance_a < 0 || update.balance_b < 0 {
            return Err(ShellError::Invalid("negative channel balance".into()));
        }
        let sum = update.balance_a.saturating_add(update.balance_b);
        if sum != channel.capacity {
            return Err(ShellError::CapacityMismatch {
                capacity: channel.capacity,
                got: sum,
            });
        }

        if update.signatures.len() < 2 {
            return Err(ShellError::InvalidSignature);
        }
        let digest = update_digest(
            &update.channel_id,
            update.balance_a,
            update.balance_b,
            update.nonce,
        );
        verify_signature(&channel.participants[0], &digest, &update.signatures[0])?;
        verify_signature(&channel.participants[1], &digest, &update.signatures[1])?;

        channel.balances = [update.balance_a, update.balance_b];
        channel.nonce = update.nonce;
        info!(channel = %update.channel_id, nonce = update.nonce, "updated channel");
        Ok(())
    }

    /// Close a channel. Terminal: further updates fail with `ChannelClosed`.
    /// An expired channel remains closable.
    pub fn close_channel(&self, channel_id: &ChannelId) -> Result<(), ShellError> {
        let mut channels = self.channels.write().expect("channel registry poisoned");
        let channel = channels
            .get_mut(channel_id)
            .ok_or(ShellError::UnknownChannel(*channel_id))?;
        if !channel.is_open {
            return Err(ShellError::ChannelClosed);
        }
        channel.is_open = false;
        info!(channel = %channel_id, "closed channel");
        Ok(())
    }

    pub fn get(&self, channel_id: &ChannelId) -> Option<Channel> {
        self.channels
            .read()
            .expect("channel registry poisoned")
            .get(channel_id)
            .cloned()
    }

    pub fn count(&self) -> usize {
        self.channels.read().expect("channel registry poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shell_crypto::KeyPair;

    fn funding() -> OutPoint {
        OutPoint::new(Hash256::from_bytes([0xaa; 32]), 1)
    }

    fn signed_update(
        channel_id: ChannelId,
        alice: &KeyPair,
        bob: &KeyPair,
        balance_a: MinorUnits,
        balance_b: MinorUnits,
        nonce: u64,
    ) -> ChannelUpdateParams {
        let digest = update_digest(&channel_id, balance_a, balance_b, nonce);
        ChannelUpdateParams {
            channel_id,
            balance_a,
            balance_b,
            nonce,
            signatures: vec![alice.sign(&digest), bob.sign(&digest)],
        }
    }

    #[test]
    fn open_credits_first_participant() {
        let (alice, bob) = (KeyPair::generate(), KeyPair::generate());
        let registry = ChannelRegistry::new();
        let id = registry
            .open_channel(alice.public_key, bob.public_key, 1_000_000, 100_000, funding())
            .unwrap();
        let channel = registry.get(&id).unwrap();
        assert_eq!(channel.balances, [1_000_000, 0]);
        assert_eq!(channel.nonce, 0);
        assert!(channel.is_open);
    }

    #[test]
    fn duplicate_open_rejected() {
        let (alice, bob) = (KeyPair::generate(), KeyPair::generate());
        let registry = ChannelRegistry::new();
        registry
            .open_channel(alice.public_key, bob.public_key, 1_000_000, 100_000, funding())
            .unwrap();
        assert!(matches!(
            registry.open_channel(alice.public_key, bob.public_key, 1_000_000, 100_000, funding()),
            Err(ShellError::DuplicateChannel(_))
        ));
    }

    #[test]
    fn zero_capacity_rejected() {
        let (alice, bob) = (KeyPair::generate(), KeyPair::generate());
        let registry = ChannelRegistry::new();
        assert!(matches!(
            registry.open_channel(alice.public_key, bob.public_key, 0, 100_000, funding()),
            Err(ShellError::InvalidCapacity)
        ));
    }

    #[test]
    fn update_moves_balances_and_nonce() {
        let (alice, bob) = (KeyPair::generate(), KeyPair::generate());
        let registry = ChannelRegistry::new();
        let id = registry
            .open_channel(alice.public_key, bob.public_key, 1_000_000, 100_000, funding())
            .unwrap();

        let update = signed_update(id, &alice, &bob, 600_000, 400_000, 1);
        registry.update_channel(&update, 50_000).unwrap();

        let channel = registry.get(&id).unwrap();
        assert_eq!(channel.balances, [600_000, 400_000]);
        assert_eq!(channel.nonce, 1);
        assert_eq!(channel.balances[0] + channel.balances[1], channel.capacity);
    }

    #[test]
    fn stale_nonce_rejected() {
        let (alice, bob) = (KeyPair::generate(), KeyPair::generate());
        let registry = ChannelRegistry::new();
        let id = registry
            .open_channel(alice.public_key, bob.public_key, 1_000_000, 100_000, funding())
            .unwrap();

        registry
            .update_channel(&signed_update(id, &alice, &bob, 600_000, 400_000, 1), 50_000)
            .unwrap();
        // Same nonce again.
        assert!(matches!(
            registry.update_channel(&signed_update(id, &alice, &bob, 500_000, 500_000, 1), 50_000),
            Err(ShellError::StaleNonce { current: 1, got: 1 })
        ));
    }

    #[test]
    fn capacity_mismatch_rejected() {
        let (alice, bob) = (KeyPair::generate(), KeyPair::generate());
        let registry = ChannelRegistry::new();
        let id = registry
            .open_channel(alice.public_key, bob.public_key, 1_000_000, 100_000, funding())
            .unwrap();
        assert!(matches!(
            registry.update_channel(&signed_update(id, &alice, &bob, 600_000, 300_000, 1), 50_000),
            Err(ShellError::CapacityMismatch { capacity: 1_000_000, got: 900_000 })
        ));
    }

    #[test]
    fn bad_signature_rejected() {
        let (alice, bob) = (KeyPair::generate(), KeyPair::generate());
        let mallory = KeyPair::generate();
        let registry = ChannelRegistry::new();
        let id = registry
            .open_channel(alice.public_key, bob.public_key, 1_000_000, 100_000, funding())
            .unwrap();

        // Bob's slot signed by mallory.
        let update = signed_update(id, &alice, &mallory, 600_000, 400_000, 1);
        assert!(matches!(
            registry.update_channel(&update, 50_000),
            Err(ShellError::InvalidSignature)
        ));
    }

    #[test]
    fn update_past_expiry_rejected_but_close_allowed() {
        let (alice, bob) = (KeyPair::generate(), KeyPair::generate());
        let registry = ChannelRegistry::new();
        let id = registry
            .open_channel(alice.public_key, bob.public_key, 1_000_000, 100_000, funding())
            .unwrap();

        let update = signed_update(id, &alice, &bob, 600_000, 400_000, 1);
        assert!(matches!(
            registry.update_channel(&update, 100_000),
            Err(ShellError::ChannelExpired { expiry: 100_000 })
        ));
        registry.close_channel(&id).unwrap();
        assert!(!registry.get(&id).unwrap().is_open);
    }

    #[test]
    fn channel_snapshot_round_trips_through_bincode() {
        let (alice, bob) = (KeyPair::generate(), KeyPair::generate());
        let registry = ChannelRegistry::new();
        let id = registry
            .open_channel(alice.public_key, bob.public_key, 1_000_000, 100_000, funding())
            .unwrap();

        // Hosts persist registry snapshots; the encoding must be stable.
        let channel = registry.get(&id).unwrap();
        let bytes = bincode::serialize(&channel).unwrap();
        let restored: Channel = bincode::deserialize(&bytes).unwrap();
        assert_eq!(restored.channel_id, channel.channel_id);
        assert_eq!(restored.participants, channel.participants);
        assert_eq!(restored.balances, channel.balances);
        assert_eq!(restored.expiry_height, channel.expiry_height);
    }

    #[test]
    fn closed_channel_refuses_updates() {
        let (alice, bob) = (KeyPair::generate(), KeyPair::generate());
        let registry = ChannelRegistry::new();
        let id = registry
            .open_channel(alice.public_key, bob.public_key, 1_000_000, 100_000, funding())
            .unwrap();
        registry.close_channel(&id).unwrap();

        let update = signed_update(id, &alice, &bob, 600_000, 400_000, 1);
        assert!(matches!(
            registry.update_channel(&update, 50_000),
            Err(ShellError::ChannelClosed)
        ));
        assert!(matches!(
            registry.close_channel(&id),
            Err(ShellError::ChannelClosed)
        ));
    }
}
