//! shell-swap
//!
//! Cross-chain atomic swaps: Hash-Time-Locked Contract scripts, the
//! contract / redeem / refund transaction builders, secret extraction, and
//! the swap manager. The manager only ever holds the SHA-256 of the secret;
//! the secret itself belongs to the caller until a redeem publishes it.

pub mod htlc;
pub mod manager;

pub use htlc::{
    build_contract_tx, build_htlc_script, build_redeem_tx, build_refund_tx, extract_secret,
    HtlcTerms,
};
pub use manager::{AtomicSwap, SwapManager, SwapParams, SwapStatus};
