//! shell-fees
//!
//! Fee calculation: a size-based burn fee, per-opcode surcharges, and the
//! maker rebate signalled by an in-witness tag.

use serde::{Deserialize, Serialize};

use shell_core::constants::{
    BASE_FEE_RATE_PER_BYTE, FEE_ATOMIC_SWAP, FEE_CHANNEL_CLOSE, FEE_CHANNEL_OPEN,
    FEE_CHANNEL_UPDATE, FEE_CLAIMABLE_CLAIM, FEE_CLAIMABLE_CREATE, MAKER_REBATE_RATE_PER_BYTE,
    MAKER_TAG,
};
use shell_core::error::ShellError;
use shell_core::transaction::Transaction;
use shell_core::types::MinorUnits;
use shell_script::{classify_input, SettlementOpcode};
use shell_wire::tx_total_size;

/// Operation classes carrying a fee surcharge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeeOpClass {
    ChannelOpen,
    ChannelUpdate,
    ChannelClose,
    ClaimableCreate,
    ClaimableClaim,
    DocumentHash,
    AtomicSwap,
}

impl FeeOpClass {
    pub fn surcharge(&self) -> MinorUnits {
        match self {
            FeeOpClass::ChannelOpen => FEE_CHANNEL_OPEN,
            FeeOpClass::ChannelUpdate => FEE_CHANNEL_UPDATE,
            FeeOpClass::ChannelClose => FEE_CHANNEL_CLOSE,
            FeeOpClass::ClaimableCreate => FEE_CLAIMABLE_CREATE,
            FeeOpClass::ClaimableClaim => FEE_CLAIMABLE_CLAIM,
            FeeOpClass::DocumentHash => 0,
            FeeOpClass::AtomicSwap => FEE_ATOMIC_SWAP,
        }
    }
}

/// Itemized fee result. `total = base + operation`; `net = total − rebate`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub base_fee: MinorUnits,
    pub operation_fee: MinorUnits,
    pub maker_rebate: MinorUnits,
    pub total: MinorUnits,
    pub net: MinorUnits,
}

/// Estimate fees from a size, an operation list, and the maker flag.
pub fn estimate_fee(size: usize, ops: &[FeeOpClass], is_maker: bool) -> FeeBreakdown {
    let base_fee = BASE_FEE_RATE_PER_BYTE.saturating_mul(size as i64);
    let operation_fee = ops.iter().map(|op| op.surcharge()).sum::<MinorUnits>();

    // Rebate subtracts from the base fee only, clamped to [0, base].
    let maker_rebate = if is_maker {
        MAKER_REBATE_RATE_PER_BYTE
            .saturating_mul(size as i64)
            .min(base_fee)
    } else {
        0
    };

    let total = base_fee.saturating_add(operation_fee);
    FeeBreakdown {
        base_fee,
        operation_fee,
        maker_rebate,
        total,
        net: total - maker_rebate,
    }
}

/// Calculate fees for a concrete transaction: classify settlement inputs,
/// detect HTLC-shaped outputs, and look for the maker tag.
pub fn calculate_fee(tx: &Transaction) -> Result<FeeBreakdown, ShellError> {
    let ops = detect_op_classes(tx)?;
    Ok(estimate_fee(tx_total_size(tx), &ops, is_maker_transaction(tx)))
}

/// The operation classes a transaction performs, from its settlement inputs
/// and HTLC outputs.
pub fn detect_op_classes(tx: &Transaction) -> Result<Vec<FeeOpClass>, ShellError> {
    let mut ops = Vec::new();
    for input in &tx.inputs {
        if let Some(opcode) = classify_input(input)? {
            ops.push(match opcode {
                SettlementOpcode::ChannelOpen => FeeOpClass::ChannelOpen,
                SettlementOpcode::ChannelUpdate => FeeOpClass::ChannelUpdate,
                SettlementOpcode::ChannelClose => FeeOpClass::ChannelClose,
                SettlementOpcode::ClaimableCreate => FeeOpClass::ClaimableCreate,
                SettlementOpcode::ClaimableClaim => FeeOpClass::ClaimableClaim,
                SettlementOpcode::DocumentHash => FeeOpClass::DocumentHash,
            });
        }
    }
    for output in &tx.outputs {
        if is_htlc_shaped(&output.pk_script) {
            ops.push(FeeOpClass::AtomicSwap);
        }
    }
    Ok(ops)
}

/// A transaction is a maker transaction when any witness item of any input
/// starts with the 4-byte `MAKR` tag.
pub fn is_maker_transaction(tx: &Transaction) -> bool {
    tx.inputs
        .iter()
        .flat_map(|input| input.witness.iter())
        .any(|item| item.len() >= MAKER_TAG.len() && item[..MAKER_TAG.len()] == MAKER_TAG[..])
}

const OP_IF: u8 = 0x63;
const OP_ELSE: u8 = 0x67;
const OP_ENDIF: u8 = 0x68;

/// Structural HTLC check: an IF/ELSE/ENDIF bracket with the ENDIF closing
/// the script. The swap layer builds exactly this shape.
fn is_htlc_shaped(script: &[u8]) -> bool {
    script.first() == Some(&OP_IF)
        && script.last() == Some(&OP_ENDIF)
        && script.contains(&OP_ELSE)
}
