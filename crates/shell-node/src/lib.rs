//! shell-node
//!
//! The core façade: one composition point owning the mempool, settlement
//! registries, swap manager, liquidity manager, and auxiliary-PoW
//! validator. Hosts embed this library and drive it with transaction
//! submissions and block connection notifications; no transport lives here.

use std::sync::Arc;

use tracing::{debug, warn};

use shell_auxpow::AuxPowValidator;
use shell_chain::ChainAdapter;
use shell_core::error::ShellError;
use shell_core::policy::{ChainParams, Policy};
use shell_core::transaction::Transaction;
use shell_core::types::{BlockHeight, Hash256};
use shell_liquidity::LiquidityManager;
use shell_mempool::{MempoolConfig, ProcessOutcome, Tag, TxPool};
use shell_settlement::SettlementState;
use shell_swap::SwapManager;
use shell_wire::tx_hash;

/// Result of a transaction submission.
#[derive(Debug)]
pub enum Submission {
    /// Admitted transaction ids, the submitted one first, then any
    /// promoted orphans in admission order.
    Accepted(Vec<Hash256>),
    /// Stored as an orphan; these parents are missing.
    MissingParents(Vec<Hash256>),
}

/// The Shell Reserve core. Created once at startup; every subsystem holds
/// its own lock and none calls back into another.
pub struct ShellCore {
    chain: Arc<dyn ChainAdapter>,
    pub mempool: TxPool,
    pub settlement: SettlementState,
    pub swaps: SwapManager,
    pub liquidity: LiquidityManager,
    pub auxpow: AuxPowValidator,
}

impl ShellCore {
    pub fn new(chain: Arc<dyn ChainAdapter>, policy: Policy, params: ChainParams) -> Self {
        let mempool = TxPool::new(MempoolConfig {
            policy,
            chain: chain.clone(),
            address_index: None,
            fee_estimator: None,
        });
        Self {
            chain,
            mempool,
            settlement: SettlementState::new(),
            swaps: SwapManager::new(),
            liquidity: LiquidityManager::new(params.clone()),
            auxpow: AuxPowValidator::new(&params),
        }
    }

    /// Submit a transaction from an external source. Orphan status is an
    /// outcome, not an error, for callers that opted in via `allow_orphan`.
    pub fn submit_transaction(
        &self,
        tx: Arc<Transaction>,
        source_tag: Tag,
        allow_orphan: bool,
        rate_limit: bool,
    ) -> Result<Submission, ShellError> {
        match self
            .mempool
            .process_transaction(tx, true, rate_limit, allow_orphan, source_tag)?
        {
            ProcessOutcome::Accepted(descs) => {
                Ok(Submission::Accepted(descs.iter().map(|d| d.txid).collect()))
            }
            ProcessOutcome::Orphaned(parents) => Ok(Submission::MissingParents(parents)),
        }
    }

    /// A block connected to the best chain. Confirmed and conflicting pool
    /// entries are evicted, settlement operations are applied, and the
    /// auxiliary-PoW monitor advances. Never fails: transactions that would
    /// have errored are logged and skipped.
    pub fn block_connected(
        &self,
        txs: &[Arc<Transaction>],
        height: BlockHeight,
        is_aux_block: bool,
    ) {
        let now = self.chain.median_time_past();
        for tx in txs {
            self.mempool.remove_transaction(tx, false);
            self.mempool.remove_double_spends(tx);
            if let Err(err) = self.settlement.apply_transaction(tx, height, now) {
                warn!(tx = %tx_hash(tx), %err, "settlement operation skipped on connect");
            }
        }
        self.auxpow.on_block_connected(height, is_aux_block);
        debug!(height, txs = txs.len(), "block connected");
    }

    /// A block disconnected from the best chain. Its transactions are
    /// reinjected without the new-transaction fee gates; failures are
    /// logged and dropped.
    pub fn block_disconnected(&self, txs: &[Arc<Transaction>]) {
        for tx in txs {
            if self.chain.is_coinbase(tx) {
                continue;
            }
            match self
                .mempool
                .process_transaction(tx.clone(), false, false, true, 0)
            {
                Ok(_) => {}
                Err(err) => {
                    debug!(tx = %tx_hash(tx), %err, "reinjection dropped transaction")
                }
            }
        }
    }
}
