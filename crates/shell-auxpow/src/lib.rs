//! shell-auxpow
//!
//! Auxiliary proof-of-work (merge mining): validation of parent-chain
//! coinbase commitments and Merkle inclusion, compact-difficulty work
//! comparison, and the hashrate-triggered sunset state machine.

pub mod sunset;
pub mod validator;

pub use sunset::SunsetPhase;
pub use validator::{compact_to_target, scan_commitment, AuxPowRecord, AuxPowValidator};
