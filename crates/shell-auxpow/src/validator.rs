use serde::{Deserialize, Serialize};

use shell_core::constants::{AUXPOW_ANCHOR_CHAIN_INDEX, AUXPOW_COMMITMENT_TAG, MIN_PARENT_TIMESTAMP};
use shell_core::error::ShellError;
use shell_core::policy::ChainParams;
use shell_core::transaction::{BlockHeader, Transaction};
use shell_core::types::Hash256;
use shell_crypto::hash::check_merkle_branch;
use shell_wire::{block_hash, tx_hash};

use crate::sunset::{SunsetPhase, SunsetTracker};
use std::sync::RwLock;

/// An auxiliary proof-of-work: the parent chain's coinbase committing to a
/// child block hash, the branch linking that coinbase to the parent Merkle
/// root, and the parent header whose work is being claimed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuxPowRecord {
    pub parent_coinbase: Transaction,
    pub merkle_branch: Vec<Hash256>,
    /// Position of the coinbase in the parent tree (selects fold sides).
    pub merkle_index: u32,
    pub parent_header: BlockHeader,
    pub chain_index: u32,
    pub committed_child_hash: Hash256,
}

/// Decode compact difficulty bits into a 256-bit big-endian target.
/// Negative and overflowing encodings are rejected.
pub fn compact_to_target(bits: u32) -> Result<[u8; 32], ShellError> {
    let exponent = (bits >> 24) as usize;
    let negative = bits & 0x0080_0000 != 0;
    let mut mantissa = bits & 0x007f_ffff;

    if negative {
        return Err(ShellError::Invalid("negative compact target".into()));
    }
    if mantissa == 0 {
        return Err(ShellError::Invalid("zero compact target".into()));
    }
    // Overflow exactly as the reference mantissa/exponent rules define it.
    if exponent > 34
        || (exponent == 34 && mantissa > 0xff)
        || (exponent == 33 && mantissa > 0xffff)
    {
        return Err(ShellError::Invalid("compact target overflows 256 bits".into()));
    }

    let mut target = [0u8; 32];
    if exponent <= 3 {
        mantissa >>= 8 * (3 - exponent);
        if mantissa == 0 {
            return Err(ShellError::Invalid("zero compact target".into()));
        }
    }
    // value = mantissa × 256^(exponent − 3); byte k of the mantissa lands at
    // big-endian position 32 − exponent + k. Positions off the top are zero
    // bytes (guaranteed by the overflow check above).
    let bytes = [(mantissa >> 16) as u8, (mantissa >> 8) as u8, mantissa as u8];
    let base = 32i64 - exponent.max(3) as i64;
    for (k, byte) in bytes.iter().enumerate() {
        let pos = base + k as i64;
        if (0..32).contains(&pos) {
            target[pos as usize] = *byte;
        }
    }
    Ok(target)
}

/// Locate the `XSLTAG` commitment in a coinbase script and return the 32
/// bytes that follow it.
pub fn scan_commitment(coinbase_script: &[u8]) -> Option<Hash256> {
    let tag = AUXPOW_COMMITMENT_TAG;
    coinbase_script
        .windows(tag.len())
        .position(|w| w == tag)
        .and_then(|pos| {
            let start = pos + tag.len();
            coinbase_script.get(start..start + 32).map(|bytes| {
                let mut arr = [0u8; 32];
                arr.copy_from_slice(bytes);
                Hash256::from_bytes(arr)
            })
        })
}

/// Validates auxiliary proofs-of-work and tracks the sunset schedule.
pub struct AuxPowValidator {
    enabled: bool,
    tracker: RwLock<SunsetTracker>,
}

impl AuxPowValidator {
    pub fn new(params: &ChainParams) -> Self {
        Self {
            enabled: params.auxpow_enabled,
            tracker: RwLock::new(SunsetTracker::new(
                params.sunset_hashrate_threshold,
                params.monitoring_blocks,
                params.sunset_notice_blocks,
            )),
        }
    }

    /// Verify an auxiliary proof-of-work against the child block header it
    /// claims to anchor.
    pub fn validate(
        &self,
        record: &AuxPowRecord,
        child_header: &BlockHeader,
    ) -> Result<(), ShellError> {
        // 1. Enabled and not sunset.
        if !self.enabled {
            return Err(ShellError::AuxPowDisabled);
        }
        if self.sunset_phase() == SunsetPhase::Sunset {
            return Err(ShellError::AuxPowSunset);
        }

        // 2. Coinbase commitment must name this child block.
        let coinbase_input = record
            .parent_coinbase
            .inputs
            .first()
            .ok_or_else(|| ShellError::Invalid("parent coinbase has no inputs".into()))?;
        let committed = scan_commitment(&coinbase_input.sig_script)
            .ok_or_else(|| ShellError::Invalid("commitment tag not found in parent coinbase".into()))?;
        let child_hash = block_hash(child_header);
        if committed != child_hash || record.committed_child_hash != child_hash {
            return Err(ShellError::Invalid(format!(
                "parent coinbase commits to {committed}, child block is {child_hash}"
            )));
        }

        // 3. Coinbase must fold up to the parent Merkle root.
        let coinbase_hash = tx_hash(&record.parent_coinbase);
        let folded = check_merkle_branch(
            *coinbase_hash.as_bytes(),
            &record.merkle_branch,
            record.merkle_index,
        );
        if folded != *record.parent_header.merkle_root.as_bytes() {
            return Err(ShellError::InvalidMerkleProof);
        }

        // 4. Parent work must cover the child's requirement. Work is
        //    2^256 / (target + 1), strictly decreasing in the target, so the
        //    comparison reduces to parent_target ≤ child_target.
        let parent_target = compact_to_target(record.parent_header.bits)?;
        let child_target = compact_to_target(child_header.bits)?;
        if parent_target > child_target {
            return Err(ShellError::Invalid(
                "parent chain work below child requirement".into(),
            ));
        }

        // 5. Anchor chain index and parent header sanity.
        if record.chain_index != AUXPOW_ANCHOR_CHAIN_INDEX {
            return Err(ShellError::Invalid(format!(
                "chain index {} is not the anchor chain",
                record.chain_index
            )));
        }
        if record.parent_header.version == 0 {
            return Err(ShellError::Invalid("parent header version is zero".into()));
        }
        if record.parent_header.timestamp <= MIN_PARENT_TIMESTAMP {
            return Err(ShellError::Invalid(
                "parent header predates the anchor chain genesis".into(),
            ));
        }
        Ok(())
    }

    // ── Sunset plumbing (see sunset.rs) ──────────────────────────────────────

    pub fn on_block_connected(&self, height: shell_core::types::BlockHeight, is_aux_block: bool) {
        self.tracker
            .write()
            .expect("auxpow tracker poisoned")
            .on_block(height, is_aux_block);
    }

    pub fn set_network_hashrate(&self, hashrate: u64) {
        self.tracker
            .write()
            .expect("auxpow tracker poisoned")
            .set_network_hashrate(hashrate);
    }

    pub fn sunset_phase(&self) -> SunsetPhase {
        self.tracker
            .read()
            .expect("auxpow tracker poisoned")
            .phase()
    }
}
