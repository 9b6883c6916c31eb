//! Relay standardness rules applied at steps 11–12 of the acceptance
//! pipeline. Consensus validity lives behind the chain adapter; everything
//! here is policy.

use shell_core::error::ShellError;
use shell_core::policy::Policy;
use shell_core::transaction::{Transaction, TxIn, TxOut, SEQUENCE_FINAL};
use shell_core::types::{BlockHeight, MinorUnits, Timestamp};
use shell_chain::UtxoEntry;
use shell_script::{classify_input, validate_taproot_witness};

/// Lock-time values below this are block heights; above, Unix timestamps.
pub const LOCK_TIME_THRESHOLD: u32 = 500_000_000;

const MAX_SIG_SCRIPT_SIZE: usize = 1_650;
const MAX_WITNESS_ITEMS: usize = 128;
const MAX_WITNESS_ITEM_SIZE: usize = 1_650;

const OP_RETURN: u8 = 0x6a;
const OP_PUSHDATA1: u8 = 0x4c;
const OP_PUSHDATA2: u8 = 0x4d;
const OP_PUSHDATA4: u8 = 0x4e;
const OP_16: u8 = 0x60;
const OP_1: u8 = 0x51;

/// A transaction is finalized when its lock time is satisfied for the next
/// block or every input opts out with a final sequence.
pub fn is_finalized(tx: &Transaction, next_height: BlockHeight, mtp: Timestamp) -> bool {
    if tx.lock_time == 0 {
        return true;
    }
    let cutoff = if tx.lock_time < LOCK_TIME_THRESHOLD {
        next_height as i64
    } else {
        mtp
    };
    if (tx.lock_time as i64) < cutoff {
        return true;
    }
    tx.inputs.iter().all(|i| i.sequence == SEQUENCE_FINAL)
}

/// Transaction-level standardness: version bounds, finality, dust outputs.
pub fn check_transaction_standard(
    tx: &Transaction,
    policy: &Policy,
    next_height: BlockHeight,
    mtp: Timestamp,
) -> Result<(), ShellError> {
    if tx.version > policy.max_tx_version || tx.version < 1 {
        return Err(ShellError::Nonstandard(format!(
            "transaction version {} outside [1, {}]",
            tx.version, policy.max_tx_version
        )));
    }
    if !is_finalized(tx, next_height, mtp) {
        return Err(ShellError::Nonstandard("transaction is not finalized".into()));
    }

    let mut data_outputs = 0usize;
    for (index, out) in tx.outputs.iter().enumerate() {
        if out.pk_script.first() == Some(&OP_RETURN) {
            data_outputs += 1;
            continue;
        }
        if out.value < dust_threshold(out, policy.min_relay_tx_fee) {
            return Err(ShellError::Nonstandard(format!(
                "output {index} is dust ({} minor units)",
                out.value
            )));
        }
    }
    if data_outputs > 1 {
        return Err(ShellError::Nonstandard(
            "more than one data-carrier output".into(),
        ));
    }
    Ok(())
}

/// Input-level standardness against the output being spent.
pub fn check_input_standard(input: &TxIn, entry: &UtxoEntry) -> Result<(), ShellError> {
    if input.sig_script.len() > MAX_SIG_SCRIPT_SIZE {
        return Err(ShellError::Nonstandard(format!(
            "signature script of {} bytes exceeds {MAX_SIG_SCRIPT_SIZE}",
            input.sig_script.len()
        )));
    }

    // A settlement input is a single opcode byte; everything else must be
    // push-only. classify_input also rejects family mixing.
    let is_settlement = classify_input(input)?.is_some();
    if !is_settlement && !is_push_only(&input.sig_script) {
        return Err(ShellError::Nonstandard(
            "signature script is not push-only".into(),
        ));
    }

    if input.witness.len() > MAX_WITNESS_ITEMS {
        return Err(ShellError::Nonstandard(format!(
            "witness stack of {} items exceeds {MAX_WITNESS_ITEMS}",
            input.witness.len()
        )));
    }
    for item in &input.witness {
        if item.len() > MAX_WITNESS_ITEM_SIZE {
            return Err(ShellError::Nonstandard(format!(
                "witness item of {} bytes exceeds {MAX_WITNESS_ITEM_SIZE}",
                item.len()
            )));
        }
    }

    if is_pay_to_taproot(&entry.pk_script) {
        validate_taproot_witness(&input.witness)?;
    }
    Ok(())
}

/// OP_1 followed by a 32-byte push.
pub fn is_pay_to_taproot(script: &[u8]) -> bool {
    script.len() == 34 && script[0] == OP_1 && script[1] == 0x20
}

fn is_push_only(script: &[u8]) -> bool {
    let mut i = 0usize;
    while i < script.len() {
        let op = script[i];
        i += 1;
        match op {
            0x01..=0x4b => i += op as usize,
            OP_PUSHDATA1 => {
                let Some(&len) = script.get(i) else { return false };
                i += 1 + len as usize;
            }
            OP_PUSHDATA2 => {
                let Some(bytes) = script.get(i..i + 2) else { return false };
                i += 2 + u16::from_le_bytes([bytes[0], bytes[1]]) as usize;
            }
            OP_PUSHDATA4 => {
                let Some(bytes) = script.get(i..i + 4) else { return false };
                i += 4 + u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
            }
            0x00 | 0x4f..=OP_16 => {}
            _ => return false,
        }
    }
    i == script.len()
}

/// Dust: an output whose value is below three times the relay cost of
/// spending it (output bytes plus a nominal 148-byte input).
pub fn dust_threshold(out: &TxOut, relay_fee_per_kvb: MinorUnits) -> MinorUnits {
    let out_size = 8 + compact_size_len(out.pk_script.len()) + out.pk_script.len();
    ((out_size + 148) as i64)
        .saturating_mul(relay_fee_per_kvb)
        .saturating_mul(3)
        / 1_000
}

fn compact_size_len(n: usize) -> usize {
    match n {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}
