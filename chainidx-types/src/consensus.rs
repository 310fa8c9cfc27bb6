//! The shape of data delivered by the external consensus module
//! (spec.md §6 "Inputs consumed from external collaborators"). These types
//! are never persisted directly — the change applier translates them into
//! the indexed [`crate::block::Block`]/[`crate::transaction::Transaction`]
//! forms that the object store owns — so they do not implement the binary
//! codec.

use crate::amount::Currency;
use crate::condition::Condition;
use crate::fulfillment::Fulfillment;
use crate::hash::{Address, BlockId, OutputId, TransactionId};
use crate::target::Target;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncomingPayout {
    pub value: Currency,
    pub recipient: Address,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncomingCoinInput {
    pub parent_output: OutputId,
    pub fulfillment: Fulfillment,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncomingOutput {
    pub value: Currency,
    pub condition: Condition,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncomingTransaction {
    pub id: TransactionId,
    pub version: u8,
    pub coin_inputs: Vec<IncomingCoinInput>,
    pub coin_outputs: Vec<IncomingOutput>,
    pub block_stake_inputs: Vec<IncomingCoinInput>,
    pub block_stake_outputs: Vec<IncomingOutput>,
    pub arbitrary_data: Vec<u8>,
    pub extension_data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncomingBlock {
    pub id: BlockId,
    pub parent_id: BlockId,
    pub timestamp: u64,
    pub miner_payouts: Vec<IncomingPayout>,
    pub transactions: Vec<IncomingTransaction>,
}

/// One atomic unit delivered by the consensus module: zero or more reverted
/// blocks (newest first) followed by one or more applied blocks (oldest
/// first) (spec.md GLOSSARY "Consensus change").
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsensusChange {
    pub id: [u8; 32],
    pub reverted_blocks: Vec<IncomingBlock>,
    pub applied_blocks: Vec<IncomingBlock>,
}

/// `child_target(parent_id) -> Target` for h>0 (spec.md §6).
pub trait ConsensusQuery {
    type Error: std::fmt::Debug;

    fn child_target(&self, parent_id: &BlockId) -> Result<Target, Self::Error>;
}

/// Fixed chain parameters supplied by the consensus module (spec.md §6).
pub trait ChainConstants {
    /// Number of blocks a miner payout must mature before it is spendable.
    fn maturity_delay(&self) -> u64;
    /// Root depth used to convert a target into a difficulty (spec.md §4.4).
    fn root_depth(&self) -> u32;
    /// The target used for the genesis block (height 0).
    fn root_target(&self) -> Target;
    /// The timestamp-vs-block-height threshold `C` used by `ReferencePoint`.
    fn reference_point_threshold(&self) -> u64;
}
