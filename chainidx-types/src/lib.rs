//! Consensus-critical domain types and binary codec for the chain index
//! engine. Mirrors the role `zebra-chain` plays for `zebra-state`: this
//! crate owns the wire format, `chainidx-store` owns persistence and
//! transactional semantics on top of it.

pub mod amount;
pub mod block;
pub mod chain_facts;
pub mod codec;
pub mod condition;
pub mod consensus;
pub mod fulfillment;
pub mod hash;
pub mod output;
pub mod swap;
pub mod target;
pub mod transaction;
pub mod wallet;

pub use amount::Currency;
pub use block::{Block, BlockFacts};
pub use chain_facts::{ChainAggregatedFacts, ChainContext};
pub use codec::{BinaryDecode, BinaryEncode, CodecError};
pub use condition::Condition;
pub use consensus::{
    ChainConstants, ConsensusChange, ConsensusQuery, IncomingBlock, IncomingCoinInput,
    IncomingOutput, IncomingPayout, IncomingTransaction,
};
pub use fulfillment::Fulfillment;
pub use hash::{Address, BlockId, DataId, Hash256, OutputId, TransactionId};
pub use output::{Output, OutputKind, ReferencePoint, Spenditure};
pub use swap::AtomicSwapContract;
pub use target::Target;
pub use transaction::Transaction;
pub use wallet::{Balance, Balances, Wallet};
