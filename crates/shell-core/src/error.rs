use thiserror::Error;

use crate::types::{BalanceId, BlockHeight, ChannelId, Hash256, MinorUnits, Timestamp};

/// Protocol reject codes carried on the wire when a peer's transaction is
/// refused.
pub mod reject {
    pub const MALFORMED: u8 = 0x01;
    pub const INVALID: u8 = 0x10;
    pub const DUPLICATE: u8 = 0x12;
    pub const NONSTANDARD: u8 = 0x40;
    pub const INSUFFICIENT_FEE: u8 = 0x42;
}

#[derive(Debug, Error)]
pub enum ShellError {
    // ── Mempool / relay errors ───────────────────────────────────────────────
    #[error("duplicate transaction: {0}")]
    Duplicate(String),

    #[error("nonstandard transaction: {0}")]
    Nonstandard(String),

    #[error("invalid transaction: {0}")]
    Invalid(String),

    #[error("insufficient fee: got {got}, required {required}")]
    InsufficientFee { got: MinorUnits, required: MinorUnits },

    #[error("malformed input: {0}")]
    Malformed(String),

    /// Not a failure for callers that opted into orphan admission; carries
    /// the outpoint parents the pool could not resolve.
    #[error("orphan transaction: {} missing parent(s)", parents.len())]
    Orphan { parents: Vec<Hash256> },

    // ── Script / predicate errors ────────────────────────────────────────────
    #[error("invalid script: {0}")]
    InvalidScript(String),

    #[error("unknown taproot leaf version {0:#04x}")]
    UnknownLeafVersion(u8),

    #[error("invalid signature")]
    InvalidSignature,

    // ── Channel errors ───────────────────────────────────────────────────────
    #[error("channel already exists: {0}")]
    DuplicateChannel(ChannelId),

    #[error("channel capacity must be positive")]
    InvalidCapacity,

    #[error("unknown channel: {0}")]
    UnknownChannel(ChannelId),

    #[error("channel is closed")]
    ChannelClosed,

    #[error("channel expired at height {expiry}")]
    ChannelExpired { expiry: BlockHeight },

    #[error("stale nonce: current {current}, got {got}")]
    StaleNonce { current: u64, got: u64 },

    #[error("balance sum {got} does not match channel capacity {capacity}")]
    CapacityMismatch { capacity: MinorUnits, got: MinorUnits },

    // ── Claimable balance errors ─────────────────────────────────────────────
    #[error("unknown claimable balance: {0}")]
    UnknownBalance(BalanceId),

    #[error("no claimant matches the claiming key")]
    NoMatchingClaimant,

    #[error("claim predicate not satisfied")]
    PredicateUnsatisfied,

    // ── Atomic swap errors ───────────────────────────────────────────────────
    #[error("swap timeout not reached (refundable at {timeout})")]
    TimeoutNotReached { timeout: Timestamp },

    // ── Liquidity errors ─────────────────────────────────────────────────────
    #[error("epoch {0} is not finalized")]
    EpochNotFinalized(u32),

    #[error("reward already claimed")]
    AlreadyClaimed,

    #[error("merkle inclusion proof does not reproduce the epoch root")]
    InvalidMerkleProof,

    #[error("insufficient attestors: need {need}, got {got}")]
    InsufficientAttestors { need: usize, got: usize },

    // ── Auxiliary proof-of-work errors ───────────────────────────────────────
    #[error("auxiliary proof-of-work is disabled")]
    AuxPowDisabled,

    #[error("auxiliary proof-of-work has been sunset")]
    AuxPowSunset,

    // ── Internal ─────────────────────────────────────────────────────────────
    #[error("internal error: {0}")]
    Internal(String),
}

impl ShellError {
    /// Map onto the protocol reject code for the peer-facing boundary.
    /// Everything that is not relay policy maps to `INVALID`.
    pub fn reject_code(&self) -> u8 {
        match self {
            ShellError::Malformed(_) => reject::MALFORMED,
            ShellError::Duplicate(_) => reject::DUPLICATE,
            ShellError::Nonstandard(_) => reject::NONSTANDARD,
            ShellError::InsufficientFee { .. } => reject::INSUFFICIENT_FEE,
            _ => reject::INVALID,
        }
    }

    /// True when the caller may retry once the missing parents arrive.
    pub fn is_orphan(&self) -> bool {
        matches!(self, ShellError::Orphan { .. })
    }
}
