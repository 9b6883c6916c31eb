use secp256k1::ecdsa::Signature;
use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};

use shell_core::constants::MAX_DOCUMENT_REFERENCE_BYTES;
use shell_core::error::ShellError;
use shell_core::transaction::{Transaction, TxIn};
use shell_core::types::{BalanceId, ChannelId, Hash256, MinorUnits, Timestamp};

use crate::predicate::Predicate;

/// The six settlement opcodes. A settlement input carries exactly one of
/// these as its single-byte signature script; the parameters live in the
/// witness stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SettlementOpcode {
    ChannelOpen = 0xc1,
    ChannelUpdate = 0xc2,
    ChannelClose = 0xc3,
    ClaimableCreate = 0xc4,
    ClaimableClaim = 0xc5,
    DocumentHash = 0xc6,
}

impl SettlementOpcode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0xc1 => Some(SettlementOpcode::ChannelOpen),
            0xc2 => Some(SettlementOpcode::ChannelUpdate),
            0xc3 => Some(SettlementOpcode::ChannelClose),
            0xc4 => Some(SettlementOpcode::ClaimableCreate),
            0xc5 => Some(SettlementOpcode::ClaimableClaim),
            0xc6 => Some(SettlementOpcode::DocumentHash),
            _ => None,
        }
    }

    pub fn is_channel_family(&self) -> bool {
        matches!(
            self,
            SettlementOpcode::ChannelOpen
                | SettlementOpcode::ChannelUpdate
                | SettlementOpcode::ChannelClose
        )
    }

    pub fn is_claimable_family(&self) -> bool {
        matches!(
            self,
            SettlementOpcode::ClaimableCreate | SettlementOpcode::ClaimableClaim
        )
    }
}

// ── Typed parameters ─────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct ChannelOpenParams {
    pub alice: PublicKey,
    pub bob: PublicKey,
    pub amount: MinorUnits,
    pub signatures: Vec<Signature>,
}

#[derive(Clone, Debug)]
pub struct ChannelUpdateParams {
    pub channel_id: ChannelId,
    pub balance_a: MinorUnits,
    pub balance_b: MinorUnits,
    pub nonce: u64,
    pub signatures: Vec<Signature>,
}

#[derive(Clone, Debug)]
pub struct ChannelCloseParams {
    pub channel_id: ChannelId,
    pub signatures: Vec<Signature>,
}

#[derive(Clone, Debug)]
pub struct ClaimableCreateParams {
    pub amount: MinorUnits,
    pub claimants: Vec<(PublicKey, Predicate)>,
    pub signature: Signature,
}

#[derive(Clone, Debug)]
pub struct ClaimableClaimParams {
    pub balance_id: BalanceId,
    pub claimer: PublicKey,
    pub proof: Vec<u8>,
    pub signature: Signature,
}

#[derive(Clone, Debug)]
pub struct DocumentHashParams {
    pub doc_hash: Hash256,
    pub timestamp: Timestamp,
    pub reference: Vec<u8>,
}

/// One parsed settlement operation.
#[derive(Clone, Debug)]
pub enum SettlementOp {
    ChannelOpen(ChannelOpenParams),
    ChannelUpdate(ChannelUpdateParams),
    ChannelClose(ChannelCloseParams),
    ClaimableCreate(ClaimableCreateParams),
    ClaimableClaim(ClaimableClaimParams),
    DocumentHash(DocumentHashParams),
}

impl SettlementOp {
    pub fn opcode(&self) -> SettlementOpcode {
        match self {
            SettlementOp::ChannelOpen(_) => SettlementOpcode::ChannelOpen,
            SettlementOp::ChannelUpdate(_) => SettlementOpcode::ChannelUpdate,
            SettlementOp::ChannelClose(_) => SettlementOpcode::ChannelClose,
            SettlementOp::ClaimableCreate(_) => SettlementOpcode::ClaimableCreate,
            SettlementOp::ClaimableClaim(_) => SettlementOpcode::ClaimableClaim,
            SettlementOp::DocumentHash(_) => SettlementOpcode::DocumentHash,
        }
    }
}

// ── Classification ───────────────────────────────────────────────────────────

/// Classify one input. A settlement input's signature script is the single
/// opcode byte; anything else is not a settlement input. A script whose
/// bytes span both the channel and claimable families fails outright.
pub fn classify_input(input: &TxIn) -> Result<Option<SettlementOpcode>, ShellError> {
    let mut has_channel = false;
    let mut has_claimable = false;
    for byte in &input.sig_script {
        if let Some(op) = SettlementOpcode::from_byte(*byte) {
            has_channel |= op.is_channel_family();
            has_claimable |= op.is_claimable_family();
        }
    }
    if has_channel && has_claimable {
        return Err(ShellError::InvalidScript(
            "input mixes channel and claimable opcodes".into(),
        ));
    }

    if input.sig_script.len() != 1 {
        return Ok(None);
    }
    Ok(SettlementOpcode::from_byte(input.sig_script[0]))
}

/// Parse every settlement operation carried by the transaction, in input
/// order. Non-settlement inputs are skipped.
pub fn extract_operations(tx: &Transaction) -> Result<Vec<SettlementOp>, ShellError> {
    let mut ops = Vec::new();
    for input in &tx.inputs {
        if let Some(opcode) = classify_input(input)? {
            ops.push(parse_operation(opcode, &input.witness)?);
        }
    }
    Ok(ops)
}

/// Parse one operation's parameters from a witness stack per the canonical
/// layouts.
pub fn parse_operation(
    opcode: SettlementOpcode,
    witness: &[Vec<u8>],
) -> Result<SettlementOp, ShellError> {
    match opcode {
        SettlementOpcode::ChannelOpen => {
            require_items(witness, 3, "channel open")?;
            Ok(SettlementOp::ChannelOpen(ChannelOpenParams {
                alice: parse_pubkey(&witness[0])?,
                bob: parse_pubkey(&witness[1])?,
                amount: parse_amount(&witness[2])?,
                signatures: parse_signatures(&witness[3..])?,
            }))
        }
        SettlementOpcode::ChannelUpdate => {
            require_items(witness, 4, "channel update")?;
            Ok(SettlementOp::ChannelUpdate(ChannelUpdateParams {
                channel_id: ChannelId(parse_hash(&witness[0])?),
                balance_a: parse_amount(&witness[1])?,
                balance_b: parse_amount(&witness[2])?,
                nonce: parse_amount(&witness[3])? as u64,
                signatures: parse_signatures(&witness[4..])?,
            }))
        }
        SettlementOpcode::ChannelClose => {
            require_items(witness, 1, "channel close")?;
            Ok(SettlementOp::ChannelClose(ChannelCloseParams {
                channel_id: ChannelId(parse_hash(&witness[0])?),
                signatures: parse_signatures(&witness[1..])?,
            }))
        }
        SettlementOpcode::ClaimableCreate => parse_claimable_create(witness),
        SettlementOpcode::ClaimableClaim => {
            require_items(witness, 4, "claimable claim")?;
            Ok(SettlementOp::ClaimableClaim(ClaimableClaimParams {
                balance_id: BalanceId(parse_hash(&witness[0])?),
                claimer: parse_pubkey(&witness[1])?,
                proof: witness[2].clone(),
                signature: parse_signature(&witness[3])?,
            }))
        }
        SettlementOpcode::DocumentHash => {
            require_items(witness, 3, "document hash")?;
            let reference = witness[2].clone();
            if reference.len() > MAX_DOCUMENT_REFERENCE_BYTES {
                return Err(ShellError::InvalidScript(format!(
                    "document reference exceeds {MAX_DOCUMENT_REFERENCE_BYTES} bytes"
                )));
            }
            Ok(SettlementOp::DocumentHash(DocumentHashParams {
                doc_hash: parse_hash(&witness[0])?,
                timestamp: parse_amount(&witness[1])?,
                reference,
            }))
        }
    }
}

fn parse_claimable_create(witness: &[Vec<u8>]) -> Result<SettlementOp, ShellError> {
    require_items(witness, 2, "claimable create")?;
    let amount = parse_amount(&witness[0])?;
    let count = match witness[1].as_slice() {
        [n] => *n as usize,
        _ => {
            return Err(ShellError::InvalidScript(
                "claimant count must be one byte".into(),
            ))
        }
    };

    // count pairs of (pubkey, predicate blob) plus the trailing signature.
    let expected = 2 + count * 2 + 1;
    if witness.len() != expected {
        return Err(ShellError::InvalidScript(format!(
            "claimable create expects {expected} witness items, got {}",
            witness.len()
        )));
    }

    let mut claimants = Vec::with_capacity(count);
    for i in 0..count {
        let dest = parse_pubkey(&witness[2 + i * 2])?;
        let predicate = Predicate::decode(&witness[3 + i * 2])?;
        claimants.push((dest, predicate));
    }
    let signature = parse_signature(&witness[expected - 1])?;

    Ok(SettlementOp::ClaimableCreate(ClaimableCreateParams {
        amount,
        claimants,
        signature,
    }))
}

// ── Field parsers ────────────────────────────────────────────────────────────

fn require_items(witness: &[Vec<u8>], min: usize, what: &str) -> Result<(), ShellError> {
    if witness.len() < min {
        return Err(ShellError::InvalidScript(format!(
            "{what} witness needs at least {min} items, got {}",
            witness.len()
        )));
    }
    Ok(())
}

fn parse_pubkey(item: &[u8]) -> Result<PublicKey, ShellError> {
    if item.len() != 33 {
        return Err(ShellError::InvalidScript(format!(
            "public key must be 33 bytes, got {}",
            item.len()
        )));
    }
    PublicKey::from_slice(item)
        .map_err(|_| ShellError::InvalidScript("invalid compressed public key".into()))
}

fn parse_amount(item: &[u8]) -> Result<i64, ShellError> {
    let arr: [u8; 8] = item
        .try_into()
        .map_err(|_| ShellError::InvalidScript("amount field must be 8 bytes".into()))?;
    Ok(i64::from_le_bytes(arr))
}

fn parse_hash(item: &[u8]) -> Result<Hash256, ShellError> {
    let arr: [u8; 32] = item
        .try_into()
        .map_err(|_| ShellError::InvalidScript("hash field must be 32 bytes".into()))?;
    Ok(Hash256::from_bytes(arr))
}

fn parse_signature(item: &[u8]) -> Result<Signature, ShellError> {
    Signature::from_compact(item)
        .map_err(|_| ShellError::InvalidScript("invalid compact signature".into()))
}

fn parse_signatures(items: &[Vec<u8>]) -> Result<Vec<Signature>, ShellError> {
    items.iter().map(|i| parse_signature(i)).collect()
}
