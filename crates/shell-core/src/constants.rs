//! ─── Shell Reserve Protocol Constants ───────────────────────────────────────
//!
//! "A proof-of-work reserve asset for the long haul."
//!
//! Base unit: minor unit (1 XSL = 100,000,000 minor units)
//! Ticker:    XSL

use crate::types::MinorUnits;

// ── Units ────────────────────────────────────────────────────────────────────

/// 1 XSL expressed in minor units.
pub const MINOR_UNITS_PER_XSL: MinorUnits = 100_000_000;

/// Total fixed supply in minor units (100,000,000 XSL). No single output or
/// fee may exceed this.
pub const MAX_MONEY: MinorUnits = 100_000_000 * MINOR_UNITS_PER_XSL;

// ── Fees (minor units) ───────────────────────────────────────────────────────

/// Burned base fee rate: 0.0003 XSL per serialized byte.
pub const BASE_FEE_RATE_PER_BYTE: MinorUnits = 30_000;

/// Maker rebate rate: 0.0001 XSL per serialized byte, signalled by the
/// in-witness `MAKR` tag. Never exceeds the base fee.
pub const MAKER_REBATE_RATE_PER_BYTE: MinorUnits = 10_000;

/// Per-opcode surcharges. Channel close and claimable claim are free.
pub const FEE_CHANNEL_OPEN: MinorUnits = 10_000_000; // 0.1 XSL
pub const FEE_CHANNEL_UPDATE: MinorUnits = 1_000_000; // 0.01 XSL
pub const FEE_ATOMIC_SWAP: MinorUnits = 5_000_000; // 0.05 XSL
pub const FEE_CLAIMABLE_CREATE: MinorUnits = 2_000_000; // 0.02 XSL
pub const FEE_CLAIMABLE_CLAIM: MinorUnits = 0;
pub const FEE_CHANNEL_CLOSE: MinorUnits = 0;

/// 4-byte witness-item prefix identifying a market-maker transaction.
pub const MAKER_TAG: &[u8; 4] = b"MAKR";

// ── Mempool policy ───────────────────────────────────────────────────────────

/// Transactions with a stripped serialized size below this are nonstandard.
pub const MIN_STANDARD_TX_SIZE: usize = 65;

/// Orphans expire after this many seconds in the orphan pool.
pub const ORPHAN_TTL_SECS: i64 = 15 * 60;

/// The orphan expiration scan runs at most this often.
pub const ORPHAN_EXPIRE_SCAN_INTERVAL_SECS: i64 = 5 * 60;

/// Upper bound on the RBF conflict set (direct conflicts plus their
/// in-pool descendants).
pub const MAX_REPLACEMENT_EVICTIONS: usize = 100;

/// Priority threshold for free high-priority transactions:
/// one XSL-day per 250 bytes (100_000_000 * 144 / 250).
pub const MIN_HIGH_PRIORITY: f64 = 57_600_000.0;

/// Time constant (seconds) of the exponentially decaying free-transaction
/// rate counter.
pub const FREE_TX_DECAY_SECS: i64 = 600;

// ── Liquidity program ────────────────────────────────────────────────────────

/// Number of sequential liquidity epochs.
pub const LIQUIDITY_EPOCH_COUNT: u32 = 12;

/// Minimum distinct attestor signatures per attestation.
pub const MIN_ATTESTOR_SIGNATURES: usize = 3;

/// Spread factor clamp bounds (basis-point scale).
pub const SPREAD_FACTOR_MIN: u64 = 1_000;
pub const SPREAD_FACTOR_MAX: u64 = 10_000;

/// One hundred percent in basis points.
pub const BASIS_POINT_SCALE: u64 = 10_000;

/// Version prefix of reward claim hashes.
pub const REWARD_CLAIM_VERSION: u32 = 1;

// ── Settlement ───────────────────────────────────────────────────────────────

/// Maximum claimants per claimable balance.
pub const MAX_CLAIMANTS: usize = 10;

/// Default channel lifetime in blocks (~1 year) when a channel is opened
/// from an on-chain transaction.
pub const CHANNEL_DEFAULT_LIFETIME_BLOCKS: i32 = 52_560;

/// Maximum length of a document-hash reference string.
pub const MAX_DOCUMENT_REFERENCE_BYTES: usize = 256;

// ── Auxiliary proof-of-work ──────────────────────────────────────────────────

/// Tag preceding the 32-byte child block hash in the parent coinbase script.
pub const AUXPOW_COMMITMENT_TAG: &[u8; 6] = b"XSLTAG";

/// The parent chain must be the sole anchor chain.
pub const AUXPOW_ANCHOR_CHAIN_INDEX: u32 = 0;

/// Parent headers must be timestamped after 2009-01-03 18:15:05 UTC.
pub const MIN_PARENT_TIMESTAMP: u32 = 1_231_006_505;

/// Default native-hashrate threshold (hash/s) that triggers the sunset
/// notice once sustained.
pub const DEFAULT_SUNSET_HASHRATE_THRESHOLD: u64 = 1_000;

/// Default length of the hashrate monitoring window (~1 week of blocks).
pub const DEFAULT_MONITORING_BLOCKS: i32 = 1_008;

/// Default notice period before sunset activation (~6 months of blocks).
pub const DEFAULT_SUNSET_NOTICE_BLOCKS: i32 = 25_920;
