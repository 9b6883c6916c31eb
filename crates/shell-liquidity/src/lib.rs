//! shell-liquidity
//!
//! Liquidity attestation and reward accounting: the fixed 12-epoch
//! schedule, quorum-signed attestations with Merkle inclusion against a
//! finalized epoch root, the weight formula, and the single-claim ledger.

pub mod attestation;
pub mod epoch;
pub mod manager;

pub use attestation::{compute_weight, AttestorSignature, LiquidityAttestation};
pub use epoch::LiquidityEpoch;
pub use manager::{claim_hash, LiquidityManager};
