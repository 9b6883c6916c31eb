//! shell-mempool
//!
//! Concurrent UTXO-aware transaction pool: orphan handling, Replace-By-Fee,
//! free-transaction rate limiting, and the staged acceptance pipeline. One
//! readers-writer lock guards the pool; every mutating operation runs as
//! straight-line code under the writer half and stamps `last_updated`.

pub mod orphan;
pub mod pool;
pub mod rbf;
pub mod standard;

pub use pool::{MempoolConfig, ProcessOutcome, Tag, TxDesc, TxPool};
