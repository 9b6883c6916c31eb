//! shell-settlement
//!
//! Settlement-layer state machines: bilateral payment channels and
//! predicate-guarded claimable balances. Registries validate fully before
//! committing and hold their own locks; nothing here calls back into the
//! mempool.

pub mod channels;
pub mod claimable;
pub mod state;

pub use channels::{derive_channel_id, update_digest, Channel, ChannelRegistry};
pub use claimable::{derive_balance_id, Claimant, ClaimableBalance, ClaimableRegistry};
pub use state::SettlementState;
