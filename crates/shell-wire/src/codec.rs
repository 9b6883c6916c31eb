use shell_core::error::ShellError;
use shell_core::transaction::{BlockHeader, Transaction, TxIn, TxOut};
use shell_core::types::{Hash256, OutPoint};
use shell_crypto::hash::sha256d_hash;

use crate::reader::{write_var_bytes, write_varint, Reader};

/// Whether witness data participates in an encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WitnessMode {
    /// Full encoding with the 0x00 0x01 marker/flags pair when any input
    /// carries witness data.
    Full,
    /// Non-witness ("stripped") encoding; this is what the txid commits to.
    Stripped,
}

// ── Outpoints ────────────────────────────────────────────────────────────────

pub fn encode_outpoint(out: &OutPoint) -> Vec<u8> {
    let mut buf = Vec::with_capacity(36);
    write_outpoint(&mut buf, out);
    buf
}

fn write_outpoint(buf: &mut Vec<u8>, out: &OutPoint) {
    buf.extend_from_slice(out.txid.as_bytes());
    buf.extend_from_slice(&out.index.to_le_bytes());
}

// ── Transactions ─────────────────────────────────────────────────────────────

pub fn encode_transaction(tx: &Transaction, mode: WitnessMode) -> Vec<u8> {
    let with_witness = mode == WitnessMode::Full && tx.has_witness();
    let mut buf = Vec::new();

    buf.extend_from_slice(&tx.version.to_le_bytes());
    if with_witness {
        buf.push(0x00); // marker
        buf.push(0x01); // flags
    }

    write_varint(&mut buf, tx.inputs.len() as u64);
    for input in &tx.inputs {
        write_outpoint(&mut buf, &input.prev_out);
        write_var_bytes(&mut buf, &input.sig_script);
        buf.extend_from_slice(&input.sequence.to_le_bytes());
    }

    write_varint(&mut buf, tx.outputs.len() as u64);
    for output in &tx.outputs {
        buf.extend_from_slice(&output.value.to_le_bytes());
        write_var_bytes(&mut buf, &output.pk_script);
    }

    if with_witness {
        for input in &tx.inputs {
            write_varint(&mut buf, input.witness.len() as u64);
            for item in &input.witness {
                write_var_bytes(&mut buf, item);
            }
        }
    }

    buf.extend_from_slice(&tx.lock_time.to_le_bytes());
    buf
}

pub fn decode_transaction(bytes: &[u8]) -> Result<Transaction, ShellError> {
    let mut r = Reader::new(bytes);
    let version = r.read_i32()?;

    let mut input_count = r.read_varint()?;
    let mut segwit = false;
    if input_count == 0 {
        // Either the witness marker or a degenerate empty-input transaction;
        // only the former is a valid wire message.
        let flags = r.read_u8()?;
        if flags != 0x01 {
            return Err(ShellError::Malformed(format!(
                "unknown witness flags {flags:#04x}"
            )));
        }
        segwit = true;
        input_count = r.read_varint()?;
    }

    if input_count > crate::reader::MAX_VAR_BYTES {
        return Err(ShellError::Malformed("input count exceeds maximum".into()));
    }

    let mut inputs = Vec::with_capacity(input_count as usize);
    for _ in 0..input_count {
        let prev_out = r.read_outpoint()?;
        let sig_script = r.read_var_bytes()?;
        let sequence = r.read_u32()?;
        inputs.push(TxIn {
            prev_out,
            sig_script,
            witness: Vec::new(),
            sequence,
        });
    }

    let output_count = r.read_varint()?;
    if output_count > crate::reader::MAX_VAR_BYTES {
        return Err(ShellError::Malformed("output count exceeds maximum".into()));
    }
    let mut outputs = Vec::with_capacity(output_count as usize);
    for _ in 0..output_count {
        let value = r.read_i64()?;
        let pk_script = r.read_var_bytes()?;
        outputs.push(TxOut { value, pk_script });
    }

    if segwit {
        let mut any_witness = false;
        for input in &mut inputs {
            let item_count = r.read_varint()?;
            if item_count > crate::reader::MAX_VAR_BYTES {
                return Err(ShellError::Malformed("witness count exceeds maximum".into()));
            }
            let mut witness = Vec::with_capacity(item_count as usize);
            for _ in 0..item_count {
                witness.push(r.read_var_bytes()?);
            }
            any_witness |= !witness.is_empty();
            input.witness = witness;
        }
        if !any_witness {
            // The marker form with all-empty stacks does not re-encode to
            // the same bytes, so it cannot be canonical.
            return Err(ShellError::Malformed(
                "witness marker present but no witness data".into(),
            ));
        }
    }

    let lock_time = r.read_u32()?;
    r.finish()?;

    Ok(Transaction {
        version,
        inputs,
        outputs,
        lock_time,
    })
}

// ── Hashes and sizes ─────────────────────────────────────────────────────────

/// Transaction id: double-SHA-256 of the non-witness encoding.
pub fn tx_hash(tx: &Transaction) -> Hash256 {
    sha256d_hash(&encode_transaction(tx, WitnessMode::Stripped))
}

/// Witness transaction id over the full encoding.
pub fn wtx_hash(tx: &Transaction) -> Hash256 {
    sha256d_hash(&encode_transaction(tx, WitnessMode::Full))
}

/// Full serialized size including witness data.
pub fn tx_total_size(tx: &Transaction) -> usize {
    encode_transaction(tx, WitnessMode::Full).len()
}

/// Serialized size of the non-witness encoding.
pub fn tx_stripped_size(tx: &Transaction) -> usize {
    encode_transaction(tx, WitnessMode::Stripped).len()
}

/// Weight: non-witness bytes count four, witness bytes one.
pub fn tx_weight(tx: &Transaction) -> usize {
    tx_stripped_size(tx) * 3 + tx_total_size(tx)
}

/// Virtual size: weight divided by four, rounded up.
pub fn tx_vsize(tx: &Transaction) -> usize {
    (tx_weight(tx) + 3) / 4
}

// ── Block headers ────────────────────────────────────────────────────────────

/// Encode a header: the standard 80-byte layout followed by the 8-byte
/// thermal proof.
pub fn encode_block_header(header: &BlockHeader) -> Vec<u8> {
    let mut buf = Vec::with_capacity(88);
    write_header_base(&mut buf, header);
    buf.extend_from_slice(&header.thermal_proof.to_le_bytes());
    buf
}

fn write_header_base(buf: &mut Vec<u8>, header: &BlockHeader) {
    buf.extend_from_slice(&header.version.to_le_bytes());
    buf.extend_from_slice(header.prev_block.as_bytes());
    buf.extend_from_slice(header.merkle_root.as_bytes());
    buf.extend_from_slice(&header.timestamp.to_le_bytes());
    buf.extend_from_slice(&header.bits.to_le_bytes());
    buf.extend_from_slice(&header.nonce.to_le_bytes());
}

pub fn decode_block_header(bytes: &[u8]) -> Result<BlockHeader, ShellError> {
    let mut r = Reader::new(bytes);
    let version = r.read_i32()?;
    let prev_block = r.read_hash()?;
    let merkle_root = r.read_hash()?;
    let timestamp = r.read_u32()?;
    let bits = r.read_u32()?;
    let nonce = r.read_u32()?;
    let thermal_proof = r.read_u64()?;
    r.finish()?;
    Ok(BlockHeader {
        version,
        prev_block,
        merkle_root,
        timestamp,
        bits,
        nonce,
        thermal_proof,
    })
}

/// Block hash over the 80-byte base encoding only; the thermal proof is
/// non-structural.
pub fn block_hash(header: &BlockHeader) -> Hash256 {
    let mut buf = Vec::with_capacity(80);
    write_header_base(&mut buf, header);
    sha256d_hash(&buf)
}
