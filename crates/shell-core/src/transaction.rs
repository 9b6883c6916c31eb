use serde::{Deserialize, Serialize};

use crate::types::{Hash256, MinorUnits, OutPoint};

// ── TxIn / TxOut ─────────────────────────────────────────────────────────────

/// A transaction input: the outpoint it spends, a legacy signature script,
/// a segregated witness stack, and a sequence number.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIn {
    pub prev_out: OutPoint,
    pub sig_script: Vec<u8>,
    /// Witness stack; empty for non-witness inputs.
    pub witness: Vec<Vec<u8>>,
    pub sequence: u32,
}

impl TxIn {
    pub fn new(prev_out: OutPoint) -> Self {
        Self {
            prev_out,
            sig_script: Vec::new(),
            witness: Vec::new(),
            sequence: SEQUENCE_FINAL,
        }
    }
}

/// A transaction output: a value in minor units and the locking script.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    pub value: MinorUnits,
    pub pk_script: Vec<u8>,
}

impl TxOut {
    pub fn new(value: MinorUnits, pk_script: Vec<u8>) -> Self {
        Self { value, pk_script }
    }
}

/// Sequence value that makes an input final.
pub const SEQUENCE_FINAL: u32 = 0xffff_ffff;

/// Highest sequence value that still signals BIP 125 replaceability.
pub const MAX_RBF_SEQUENCE: u32 = 0xffff_fffe;

// ── Transaction ──────────────────────────────────────────────────────────────

/// A fully-formed Shell transaction.
///
/// The transaction id is the double-SHA-256 of the canonical non-witness
/// encoding; sizes, weight and the id itself are computed by `shell-wire`,
/// which owns the canonical byte layout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    pub fn new(version: i32) -> Self {
        Self {
            version,
            inputs: Vec::new(),
            outputs: Vec::new(),
            lock_time: 0,
        }
    }

    /// True when any input carries witness data.
    pub fn has_witness(&self) -> bool {
        self.inputs.iter().any(|i| !i.witness.is_empty())
    }

    /// A coinbase transaction has exactly one input spending the null
    /// outpoint.
    pub fn is_coinbase_shape(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].prev_out.is_null()
    }

    /// Sum of output values. Saturates rather than wrapping on hostile input;
    /// range validity is the chain adapter's sanity check.
    pub fn total_output_value(&self) -> MinorUnits {
        self.outputs.iter().fold(0i64, |acc, o| acc.saturating_add(o.value))
    }

    /// True when every input signals BIP 125 replaceability is *not* opted
    /// out, i.e. at least one sequence is low enough to signal replacement.
    pub fn signals_replacement(&self) -> bool {
        self.inputs.iter().any(|i| i.sequence <= MAX_RBF_SEQUENCE)
    }
}

// ── BlockHeader ──────────────────────────────────────────────────────────────

/// Block header: the standard 80-byte layout plus the 8-byte thermal proof
/// appended for the mobile-mining variant.
///
/// The block hash covers only the 80-byte base encoding; `thermal_proof` is
/// validated by the mining subsystem and is non-structural here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_block: Hash256,
    pub merkle_root: Hash256,
    pub timestamp: u32,
    /// Compact difficulty target (Bitcoin mantissa/exponent form).
    pub bits: u32,
    pub nonce: u32,
    /// Opaque 8-byte thermal attestation; zero for non-mobile blocks.
    pub thermal_proof: u64,
}

impl BlockHeader {
    pub fn new(version: i32, prev_block: Hash256, merkle_root: Hash256) -> Self {
        Self {
            version,
            prev_block,
            merkle_root,
            timestamp: 0,
            bits: 0,
            nonce: 0,
            thermal_proof: 0,
        }
    }
}
