use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_MONITORING_BLOCKS, DEFAULT_SUNSET_HASHRATE_THRESHOLD, DEFAULT_SUNSET_NOTICE_BLOCKS,
};
use crate::types::{BlockHeight, MinorUnits};

// ── Relay policy ─────────────────────────────────────────────────────────────

/// Mempool and relay policy knobs. Constructed once at startup and shared
/// read-only by the core.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Policy {
    /// Upper bound on the transaction version considered standard.
    pub max_tx_version: i32,

    /// Skip the free-transaction priority gate entirely.
    pub disable_relay_priority: bool,

    /// Bypass standardness checks (transaction- and input-level).
    pub accept_nonstandard: bool,

    /// Thousands of bytes per minute allowed for zero-fee traffic.
    pub free_tx_relay_limit: f64,

    /// Orphan pool capacity.
    pub max_orphan_txs: usize,

    /// Largest orphan the pool will hold, in serialized bytes.
    pub max_orphan_tx_size: usize,

    /// Maximum signature-operation cost per transaction.
    pub max_sig_op_cost_per_tx: u32,

    /// Minimum relay fee in minor units per 1000 virtual bytes.
    pub min_relay_tx_fee: MinorUnits,

    /// Disable Replace-By-Fee entirely.
    pub reject_replacement: bool,

    /// Bytes of block space reserved for high-priority transactions.
    pub block_priority_size: u32,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            max_tx_version: 2,
            disable_relay_priority: false,
            accept_nonstandard: false,
            free_tx_relay_limit: 15.0,
            max_orphan_txs: 100,
            max_orphan_tx_size: 100_000,
            max_sig_op_cost_per_tx: 8_000,
            min_relay_tx_fee: 1_000,
            reject_replacement: false,
            block_priority_size: 50_000,
        }
    }
}

impl Policy {
    /// Minimum fee in minor units for a transaction of `vsize` virtual
    /// bytes, scaled from the per-kvB floor.
    pub fn min_relay_fee(&self, vsize: usize) -> MinorUnits {
        let fee = self.min_relay_tx_fee.saturating_mul(vsize as i64) / 1_000;
        fee.min(crate::constants::MAX_MONEY)
    }
}

// ── Chain parameters ─────────────────────────────────────────────────────────

/// Consensus-adjacent parameters the core needs: liquidity epoch geometry
/// and the auxiliary-PoW sunset schedule.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainParams {
    /// First block of liquidity epoch 0.
    pub liquidity_start_block: BlockHeight,

    /// Length of each liquidity epoch in blocks.
    pub liquidity_epoch_blocks: BlockHeight,

    /// Total reward pool split across the epochs, in minor units.
    pub liquidity_reward_pool: MinorUnits,

    /// Whether auxiliary proof-of-work is accepted at all.
    pub auxpow_enabled: bool,

    /// Native hashrate (hash/s) at which the sunset notice is posted.
    pub sunset_hashrate_threshold: u64,

    /// Blocks per hashrate monitoring window.
    pub monitoring_blocks: BlockHeight,

    /// Blocks between the sunset notice and activation.
    pub sunset_notice_blocks: BlockHeight,
}

impl Default for ChainParams {
    fn default() -> Self {
        Self {
            liquidity_start_block: 0,
            liquidity_epoch_blocks: 4_320,
            liquidity_reward_pool: 120_000 * crate::constants::MINOR_UNITS_PER_XSL,
            auxpow_enabled: true,
            sunset_hashrate_threshold: DEFAULT_SUNSET_HASHRATE_THRESHOLD,
            monitoring_blocks: DEFAULT_MONITORING_BLOCKS,
            sunset_notice_blocks: DEFAULT_SUNSET_NOTICE_BLOCKS,
        }
    }
}
