use shell_core::constants::CHANNEL_DEFAULT_LIFETIME_BLOCKS;
use shell_core::error::ShellError;
use shell_core::transaction::Transaction;
use shell_core::types::{BlockHeight, Timestamp};
use shell_script::{classify_input, parse_operation, SettlementOp};

use crate::channels::ChannelRegistry;
use crate::claimable::{Claimant, ClaimableRegistry};

/// The settlement layer: channel and claimable-balance registries behind one
/// composition point. Operations are applied on block connection; the
/// mempool only checks that settlement witnesses parse.
#[derive(Debug, Default)]
pub struct SettlementState {
    pub channels: ChannelRegistry,
    pub claimables: ClaimableRegistry,
}

impl SettlementState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply every settlement operation carried by a confirmed transaction.
    /// The funding outpoint of each operation is the outpoint its input
    /// spends. `now` is the chain's median time past at the connection
    /// point.
    pub fn apply_transaction(
        &self,
        tx: &Transaction,
        height: BlockHeight,
        now: Timestamp,
    ) -> Result<(), ShellError> {
        for input in &tx.inputs {
            let Some(opcode) = classify_input(input)? else {
                continue;
            };
            let op = parse_operation(opcode, &input.witness)?;
            match op {
                SettlementOp::ChannelOpen(p) => {
                    self.channels.open_channel(
                        p.alice,
                        p.bob,
                        p.amount,
                        height + CHANNEL_DEFAULT_LIFETIME_BLOCKS,
                        input.prev_out,
                    )?;
                }
                SettlementOp::ChannelUpdate(p) => {
                    self.channels.update_channel(&p, height)?;
                }
                SettlementOp::ChannelClose(p) => {
                    self.channels.close_channel(&p.channel_id)?;
                }
                SettlementOp::ClaimableCreate(p) => {
                    // The wire layout carries no separate creator key; the
                    // first claimant's destination stands in for id
                    // derivation.
                    let creator = p.claimants[0].0;
                    let claimants = p
                        .claimants
                        .into_iter()
                        .map(|(destination, predicate)| Claimant {
                            destination,
                            predicate,
                        })
                        .collect();
                    self.claimables.create(
                        creator,
                        p.amount,
                        claimants,
                        height,
                        input.prev_out,
                    )?;
                }
                SettlementOp::ClaimableClaim(p) => {
                    self.claimables
                        .claim(&p.balance_id, &p.claimer, &p.proof, now)?;
                }
                SettlementOp::DocumentHash(_) => {
                    // Notarization only: the hash rides in the witness and
                    // needs no registry state.
                }
            }
        }
        Ok(())
    }
}
