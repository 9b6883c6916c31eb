use secp256k1::ecdsa::Signature;
use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};

use shell_core::error::ShellError;
use shell_core::transaction::{Transaction, TxIn, TxOut, MAX_RBF_SEQUENCE};
use shell_core::types::{Hash256, MinorUnits, OutPoint, Timestamp};

pub const OP_IF: u8 = 0x63;
pub const OP_ELSE: u8 = 0x67;
pub const OP_ENDIF: u8 = 0x68;
const OP_DROP: u8 = 0x75;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_SHA256: u8 = 0xa8;
const OP_CHECKSIG: u8 = 0xac;
const OP_CHECKLOCKTIMEVERIFY: u8 = 0xb1;

/// The parameters one HTLC output commits to.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HtlcTerms {
    /// SHA-256 of the secret preimage.
    pub secret_hash: Hash256,
    pub initiator: PublicKey,
    pub participant: PublicKey,
    /// Absolute Unix time after which the refund branch opens.
    pub timeout: Timestamp,
}

/// Build the canonical HTLC script.
///
/// Redeem branch: reveal a preimage hashing to the commitment, then satisfy
/// the participant key. Refund branch: after `timeout`, satisfy the
/// initiator key.
pub fn build_htlc_script(terms: &HtlcTerms) -> Vec<u8> {
    let mut script = Vec::with_capacity(1 + 2 + 32 + 2 + 33 + 2 + 2 + 8 + 2 + 2 + 33 + 2);
    script.push(OP_IF);
    script.push(OP_SHA256);
    script.push(0x20); // push 32
    script.extend_from_slice(terms.secret_hash.as_bytes());
    script.push(OP_EQUALVERIFY);
    script.push(0x21); // push 33
    script.extend_from_slice(&terms.participant.serialize());
    script.push(OP_CHECKSIG);
    script.push(OP_ELSE);
    script.push(0x08); // push 8
    script.extend_from_slice(&terms.timeout.to_le_bytes());
    script.push(OP_CHECKLOCKTIMEVERIFY);
    script.push(OP_DROP);
    script.push(0x21);
    script.extend_from_slice(&terms.initiator.serialize());
    script.push(OP_CHECKSIG);
    script.push(OP_ENDIF);
    script
}

/// Contract transaction: consumes the funding output, pays the full amount
/// to the HTLC script. Exactly one input and one output.
pub fn build_contract_tx(
    terms: &HtlcTerms,
    funding: OutPoint,
    amount: MinorUnits,
) -> Result<Transaction, ShellError> {
    if amount <= 0 {
        return Err(ShellError::Invalid("swap amount must be positive".into()));
    }
    let mut tx = Transaction::new(2);
    tx.inputs.push(TxIn::new(funding));
    tx.outputs.push(TxOut::new(amount, build_htlc_script(terms)));
    Ok(tx)
}

/// Redeem transaction: spends the contract output with the witness stack
/// `[secret, participant signature, htlc script]`, paying the participant.
pub fn build_redeem_tx(
    contract: &Transaction,
    secret: &[u8],
    participant_sig: &Signature,
    participant_script: Vec<u8>,
    terms: &HtlcTerms,
) -> Result<Transaction, ShellError> {
    let contract_out = single_htlc_output(contract)?;
    let contract_id = shell_wire::tx_hash(contract);

    let mut tx = Transaction::new(2);
    let mut input = TxIn::new(OutPoint::new(contract_id, 0));
    input.witness = vec![
        secret.to_vec(),
        participant_sig.serialize_compact().to_vec(),
        build_htlc_script(terms),
    ];
    tx.inputs.push(input);
    tx.outputs
        .push(TxOut::new(contract_out.value, participant_script));
    Ok(tx)
}

/// Refund transaction: spends the contract output on the timeout branch.
/// Fails with `TimeoutNotReached` while the redeem window is still open;
/// the transaction's lock time carries the timeout proof.
pub fn build_refund_tx(
    contract: &Transaction,
    terms: &HtlcTerms,
    now: Timestamp,
    initiator_sig: &Signature,
    initiator_script: Vec<u8>,
) -> Result<Transaction, ShellError> {
    if now < terms.timeout {
        return Err(ShellError::TimeoutNotReached {
            timeout: terms.timeout,
        });
    }
    let contract_out = single_htlc_output(contract)?;
    let contract_id = shell_wire::tx_hash(contract);

    let mut tx = Transaction::new(2);
    tx.lock_time = terms.timeout as u32;
    let mut input = TxIn::new(OutPoint::new(contract_id, 0));
    input.sequence = MAX_RBF_SEQUENCE; // keep the lock time enforceable
    input.witness = vec![
        initiator_sig.serialize_compact().to_vec(),
        build_htlc_script(terms),
    ];
    tx.inputs.push(input);
    tx.outputs
        .push(TxOut::new(contract_out.value, initiator_script));
    Ok(tx)
}

/// Read the secret preimage from a redeem transaction: the first witness
/// item of the first input.
pub fn extract_secret(redeem: &Transaction) -> Result<Vec<u8>, ShellError> {
    let input = redeem
        .inputs
        .first()
        .ok_or_else(|| ShellError::Invalid("redeem transaction has no inputs".into()))?;
    let secret = input
        .witness
        .first()
        .ok_or_else(|| ShellError::Invalid("redeem witness is empty".into()))?;
    if secret.is_empty() {
        return Err(ShellError::Invalid("secret preimage is absent".into()));
    }
    Ok(secret.clone())
}

fn single_htlc_output(contract: &Transaction) -> Result<&TxOut, ShellError> {
    if contract.outputs.len() != 1 {
        return Err(ShellError::Invalid(format!(
            "contract must have exactly one output, has {}",
            contract.outputs.len()
        )));
    }
    Ok(&contract.outputs[0])
}
