//! shell-wire
//!
//! Canonical wire codec for Shell Reserve. Little-endian fixed-width
//! integers, Bitcoin CompactSize varints with canonicality enforcement, and
//! the witness transaction layout. Decoding any valid message and
//! re-encoding it yields the original bytes.

pub mod codec;
pub mod reader;

pub use codec::{
    block_hash, decode_block_header, decode_transaction, encode_block_header, encode_outpoint,
    encode_transaction, tx_hash, tx_stripped_size, tx_total_size, tx_vsize, tx_weight, wtx_hash,
    WitnessMode,
};
pub use reader::Reader;
