//! Disk-resident index of a proof-of-block-stake chain's blocks,
//! transactions, outputs, wallets, and atomic-swap contracts, kept in sync
//! with consensus by applying and reverting [`ConsensusChange`]s.
//!
//! Mirrors the role `zebra-state` plays for `zebra-chain`: [`chainidx_types`]
//! owns the wire format, this crate owns persistence, the transaction
//! boundary, and the secondary indices built on top of it.

pub mod aggregator;
pub mod applier;
pub mod batch;
pub mod config;
pub mod cursor;
pub mod envelope;
pub mod error;
pub mod lock_schedule;
pub mod store;
pub mod streaming;
pub mod trees;
pub mod wallet_ops;

pub use config::Config;
pub use cursor::Cursor;
pub use error::{Result, StoreError};
pub use store::BlockFilter;

use crate::batch::{TreeName, WriteBatch};
use crate::trees::{Trees, META_AGGREGATED_FACTS, META_CHAIN_CONTEXT};
use chainidx_types::{
    Address, AtomicSwapContract, BinaryDecode, Block, BlockFacts, ChainAggregatedFacts,
    ChainConstants, ChainContext, ConsensusChange, ConsensusQuery, Hash256, Output, Transaction,
    Wallet,
};

/// The engine's single entry point: one `Store` per network, owning the
/// `sled::Db` and every secondary index built on top of it (spec.md §6).
pub struct Store {
    #[allow(dead_code)]
    db: sled::Db,
    trees: Trees,
    checkpoint_interval_blocks: u64,
    bucket_width_secs: u64,
}

impl Store {
    pub fn open(config: &Config, network_tag: &str) -> Result<Self> {
        let (db, trees) = Trees::open_at(config, network_tag)?;
        tracing::info!(network = network_tag, path = ?config.store_path(network_tag), "opened chain index store");
        Ok(Store {
            db,
            trees,
            checkpoint_interval_blocks: config.checkpoint_interval_blocks,
            bucket_width_secs: config.lock_bucket_width_secs,
        })
    }

    pub fn get_chain_context(&self) -> Result<ChainContext> {
        let batch = WriteBatch::new();
        match batch.get(&self.trees, TreeName::Metadata, META_CHAIN_CONTEXT)? {
            Some(bytes) => Ok(ChainContext::decode_from_slice(&bytes)?),
            None => Ok(ChainContext::genesis()),
        }
    }

    pub fn get_chain_aggregated_facts(&self) -> Result<ChainAggregatedFacts> {
        let batch = WriteBatch::new();
        match batch.get(&self.trees, TreeName::Metadata, META_AGGREGATED_FACTS)? {
            Some(bytes) => Ok(ChainAggregatedFacts::decode_from_slice(&bytes)?),
            None => Ok(ChainAggregatedFacts::default()),
        }
    }

    pub fn get_block(&self, block_id: &Hash256) -> Result<Block> {
        let batch = WriteBatch::new();
        store::get_block(&self.trees, &batch, block_id)
    }

    /// Returns the per-block constants and aggregated-totals snapshot saved
    /// alongside `block_id` (spec.md §4.2 "save_block(block, facts)").
    pub fn get_block_facts(&self, block_id: &Hash256) -> Result<BlockFacts> {
        let batch = WriteBatch::new();
        store::get_block_facts(&self.trees, &batch, block_id)
    }

    pub fn get_block_at(&self, height: u64) -> Result<Block> {
        let batch = WriteBatch::new();
        store::get_block_at_height(&self.trees, &batch, height)
    }

    pub fn get_block_id_at(&self, height: u64) -> Result<Hash256> {
        let batch = WriteBatch::new();
        store::get_block_id_at_height(&self.trees, &batch, height)
    }

    pub fn get_transaction(&self, id: &Hash256) -> Result<Transaction> {
        let batch = WriteBatch::new();
        store::get_transaction(&self.trees, &batch, id)
    }

    pub fn get_output(&self, id: &Hash256) -> Result<Output> {
        let batch = WriteBatch::new();
        store::get_output(&self.trees, &batch, id)
    }

    pub fn get_free_for_all_wallet(&self, address: &Address) -> Result<Wallet> {
        self.get_wallet_checked(address, |w| matches!(w, Wallet::FreeForAll { .. }))
    }

    pub fn get_single_signature_wallet(&self, address: &Address) -> Result<Wallet> {
        self.get_wallet_checked(address, |w| matches!(w, Wallet::SingleSignature { .. }))
    }

    pub fn get_multi_signature_wallet(&self, address: &Address) -> Result<Wallet> {
        self.get_wallet_checked(address, |w| matches!(w, Wallet::MultiSignature { .. }))
    }

    fn get_wallet_checked(&self, address: &Address, matches_kind: impl Fn(&Wallet) -> bool) -> Result<Wallet> {
        let batch = WriteBatch::new();
        let wallet = store::get_wallet(&self.trees, &batch, address)?;
        if matches_kind(&wallet) {
            Ok(wallet)
        } else {
            Err(StoreError::TypeMismatch)
        }
    }

    pub fn get_atomic_swap_contract(&self, address: &Address) -> Result<AtomicSwapContract> {
        let batch = WriteBatch::new();
        store::get_contract(&self.trees, &batch, address)
    }

    pub fn get_public_key(&self, address: &Address) -> Result<[u8; 32]> {
        let batch = WriteBatch::new();
        store::get_public_key(&self.trees, &batch, address)
    }

    pub fn get_blocks(
        &self,
        filter: &BlockFilter,
        cursor: Option<Cursor>,
        limit: usize,
    ) -> Result<(Vec<Block>, Option<Cursor>)> {
        store::get_blocks(&self.trees, filter, cursor, limit)
    }

    /// Applies one consensus change end to end, persisting the resulting
    /// chain context and aggregated facts (spec.md §4.5/§4.6). Any
    /// `StoreError` returned here is fatal: the caller must stop consuming
    /// the change stream (spec.md §7).
    pub fn apply_change<Q: ConsensusQuery, C: ChainConstants>(
        &self,
        query: &Q,
        constants: &C,
        change: &ConsensusChange,
    ) -> Result<()> {
        let context = self.get_chain_context()?;
        let facts = self.get_chain_aggregated_facts()?;
        applier::apply_change(
            &self.trees,
            query,
            constants,
            self.checkpoint_interval_blocks,
            self.bucket_width_secs,
            context,
            facts,
            change,
        )
        .map_err(|err| {
            metrics::counter!("chainidx_store_apply_change_errors_total", 1);
            tracing::error!(error = ?err, "consensus change application failed");
            err.into_fatal()
        })?;
        Ok(())
    }
}

/// Fixtures shared by this crate's own tests and `streaming`'s, since both
/// need a `Store` built from private fields without going through
/// `Store::open`'s filesystem path.
#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chainidx_types::Target;

    pub(crate) struct FixedConstants;
    impl ChainConstants for FixedConstants {
        fn maturity_delay(&self) -> u64 {
            10
        }
        fn root_depth(&self) -> u32 {
            16
        }
        fn root_target(&self) -> Target {
            Target::from_bytes_be(&[1u8 << 7])
        }
        fn reference_point_threshold(&self) -> u64 {
            500_000_000
        }
    }

    pub(crate) struct FixedQuery;
    impl ConsensusQuery for FixedQuery {
        type Error = std::convert::Infallible;
        fn child_target(&self, _parent_id: &Hash256) -> std::result::Result<Target, Self::Error> {
            Ok(Target::from_bytes_be(&[1u8 << 7]))
        }
    }

    pub(crate) fn open_test_store() -> Store {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let trees = Trees::open(&db).unwrap();
        Store {
            db,
            trees,
            checkpoint_interval_blocks: 1000,
            bucket_width_secs: 240,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{open_test_store, FixedConstants, FixedQuery};
    use chainidx_types::{
        Condition, Currency, Fulfillment, IncomingBlock, IncomingCoinInput, IncomingOutput,
        IncomingPayout, IncomingTransaction, Target,
    };

    #[test]
    fn applying_a_single_block_indexes_it_and_advances_context() {
        let store = open_test_store();
        let genesis_id = Hash256::zero();
        let block_id = Hash256([7u8; 32]);
        let change = ConsensusChange {
            id: [1u8; 32],
            reverted_blocks: vec![],
            applied_blocks: vec![IncomingBlock {
                id: block_id,
                parent_id: genesis_id,
                timestamp: 1_600_000_000,
                miner_payouts: vec![IncomingPayout {
                    value: Currency::from_u64(1000),
                    recipient: Address::new(Address::SINGLE_SIGNATURE, Hash256([2u8; 32])),
                }],
                transactions: vec![],
            }],
        };

        store.apply_change(&FixedQuery, &FixedConstants, &change).unwrap();

        let context = store.get_chain_context().unwrap();
        assert_eq!(context.height, 1);
        assert_eq!(context.last_block_id, block_id);

        let block = store.get_block(&block_id).unwrap();
        assert_eq!(block.height, 1);
        assert_eq!(block.payouts.len(), 1);

        let facts = store.get_chain_aggregated_facts().unwrap();
        assert_eq!(facts.total_coins, Currency::from_u64(1000));
        assert_eq!(facts.total_locked_coins, Currency::from_u64(1000));

        let block_facts = store.get_block_facts(&block_id).unwrap();
        assert_eq!(block_facts.target, FixedConstants.root_target());
        assert_eq!(block_facts.total_coins, facts.total_coins);
        assert_eq!(block_facts.total_locked_coins, facts.total_locked_coins);
    }

    #[test]
    fn reverting_a_block_restores_the_prior_context_and_totals() {
        let store = open_test_store();
        let block_id = Hash256([7u8; 32]);
        let apply = ConsensusChange {
            id: [1u8; 32],
            reverted_blocks: vec![],
            applied_blocks: vec![IncomingBlock {
                id: block_id,
                parent_id: Hash256::zero(),
                timestamp: 1_600_000_000,
                miner_payouts: vec![IncomingPayout {
                    value: Currency::from_u64(1000),
                    recipient: Address::new(Address::SINGLE_SIGNATURE, Hash256([2u8; 32])),
                }],
                transactions: vec![],
            }],
        };
        store.apply_change(&FixedQuery, &FixedConstants, &apply).unwrap();

        let revert = ConsensusChange {
            id: [2u8; 32],
            reverted_blocks: vec![apply.applied_blocks[0].clone()],
            applied_blocks: vec![],
        };
        store.apply_change(&FixedQuery, &FixedConstants, &revert).unwrap();

        let context = store.get_chain_context().unwrap();
        assert_eq!(context.height, 0);
        assert!(matches!(store.get_block(&block_id).unwrap_err(), StoreError::NotFound));
        assert!(matches!(store.get_block_facts(&block_id).unwrap_err(), StoreError::NotFound));

        let facts = store.get_chain_aggregated_facts().unwrap();
        assert_eq!(facts.total_coins, Currency::zero());
        assert_eq!(facts.total_locked_coins, Currency::zero());
    }

    #[test]
    fn spending_an_output_moves_value_between_wallets_and_conserves_total() {
        let store = open_test_store();
        let miner = Address::new(Address::SINGLE_SIGNATURE, Hash256([2u8; 32]));
        let recipient = Address::new(Address::SINGLE_SIGNATURE, Hash256([3u8; 32]));
        let genesis_block_id = Hash256([7u8; 32]);

        let fund = ConsensusChange {
            id: [1u8; 32],
            reverted_blocks: vec![],
            applied_blocks: vec![IncomingBlock {
                id: genesis_block_id,
                parent_id: Hash256::zero(),
                timestamp: 1_600_000_000,
                miner_payouts: vec![IncomingPayout {
                    value: Currency::from_u64(150),
                    recipient: miner,
                }],
                transactions: vec![],
            }],
        };
        store.apply_change(&FixedQuery, &FixedConstants, &fund).unwrap();

        // `FixedConstants::maturity_delay` is 10, so the payout is still
        // locked here; mature it by applying empty blocks up to height 11.
        let mut parent_id = genesis_block_id;
        for height in 2..=11u64 {
            let block_id = Hash256([(height + 50) as u8; 32]);
            let step = ConsensusChange {
                id: [height as u8; 32],
                reverted_blocks: vec![],
                applied_blocks: vec![IncomingBlock {
                    id: block_id,
                    parent_id,
                    timestamp: 1_600_000_000 + height,
                    miner_payouts: vec![],
                    transactions: vec![],
                }],
            };
            store.apply_change(&FixedQuery, &FixedConstants, &step).unwrap();
            parent_id = block_id;
        }

        let payout_id = store.get_block(&genesis_block_id).unwrap().payouts[0];
        let miner_wallet = store.get_single_signature_wallet(&miner).unwrap();
        assert_eq!(miner_wallet.balances().coins.unlocked, Currency::from_u64(150));
        assert_eq!(miner_wallet.balances().coins.locked, Currency::zero());

        let spend_tx_id = Hash256([99u8; 32]);
        let spend_block_id = Hash256([100u8; 32]);
        let spend = ConsensusChange {
            id: [200u8; 32],
            reverted_blocks: vec![],
            applied_blocks: vec![IncomingBlock {
                id: spend_block_id,
                parent_id,
                timestamp: 1_600_000_020,
                miner_payouts: vec![],
                transactions: vec![IncomingTransaction {
                    id: spend_tx_id,
                    version: 1,
                    coin_inputs: vec![IncomingCoinInput {
                        parent_output: payout_id,
                        fulfillment: Fulfillment::Unknown {
                            tag: 0xFF,
                            raw: vec![],
                        },
                    }],
                    coin_outputs: vec![IncomingOutput {
                        value: Currency::from_u64(150),
                        condition: Condition::UnlockHash(recipient),
                    }],
                    block_stake_inputs: vec![],
                    block_stake_outputs: vec![],
                    arbitrary_data: vec![],
                    extension_data: vec![],
                }],
            }],
        };
        store.apply_change(&FixedQuery, &FixedConstants, &spend).unwrap();

        let miner_wallet = store.get_single_signature_wallet(&miner);
        assert!(matches!(miner_wallet.unwrap_err(), StoreError::NotFound));
        let recipient_wallet = store.get_single_signature_wallet(&recipient).unwrap();
        assert_eq!(recipient_wallet.balances().coins.unlocked, Currency::from_u64(150));

        let facts = store.get_chain_aggregated_facts().unwrap();
        assert_eq!(facts.total_coins, Currency::from_u64(150));
    }

    #[test]
    fn double_spending_an_output_in_one_change_is_surfaced_as_fatal() {
        let store = open_test_store();
        let miner = Address::new(Address::SINGLE_SIGNATURE, Hash256([2u8; 32]));
        let genesis_block_id = Hash256([7u8; 32]);

        let fund = ConsensusChange {
            id: [1u8; 32],
            reverted_blocks: vec![],
            applied_blocks: vec![IncomingBlock {
                id: genesis_block_id,
                parent_id: Hash256::zero(),
                timestamp: 1_600_000_000,
                miner_payouts: vec![IncomingPayout {
                    value: Currency::from_u64(150),
                    recipient: miner,
                }],
                transactions: vec![],
            }],
        };
        store.apply_change(&FixedQuery, &FixedConstants, &fund).unwrap();

        let mut parent_id = genesis_block_id;
        for height in 2..=11u64 {
            let block_id = Hash256([(height + 50) as u8; 32]);
            let step = ConsensusChange {
                id: [height as u8; 32],
                reverted_blocks: vec![],
                applied_blocks: vec![IncomingBlock {
                    id: block_id,
                    parent_id,
                    timestamp: 1_600_000_000 + height,
                    miner_payouts: vec![],
                    transactions: vec![],
                }],
            };
            store.apply_change(&FixedQuery, &FixedConstants, &step).unwrap();
            parent_id = block_id;
        }

        let payout_id = store.get_block(&genesis_block_id).unwrap().payouts[0];
        let recipient = Address::new(Address::SINGLE_SIGNATURE, Hash256([3u8; 32]));
        let fulfillment = Fulfillment::Unknown { tag: 0xFF, raw: vec![] };

        // Two transactions in the same block both name the same coin input
        // as spent: the second `update_output_spenditure` call must fail
        // with `InvariantViolation`, which `apply_change` classes `Fatal`
        // (spec.md §7).
        let double_spend = ConsensusChange {
            id: [200u8; 32],
            reverted_blocks: vec![],
            applied_blocks: vec![IncomingBlock {
                id: Hash256([100u8; 32]),
                parent_id,
                timestamp: 1_600_000_020,
                miner_payouts: vec![],
                transactions: vec![
                    IncomingTransaction {
                        id: Hash256([99u8; 32]),
                        version: 1,
                        coin_inputs: vec![IncomingCoinInput {
                            parent_output: payout_id,
                            fulfillment: fulfillment.clone(),
                        }],
                        coin_outputs: vec![IncomingOutput {
                            value: Currency::from_u64(150),
                            condition: Condition::UnlockHash(recipient),
                        }],
                        block_stake_inputs: vec![],
                        block_stake_outputs: vec![],
                        arbitrary_data: vec![],
                        extension_data: vec![],
                    },
                    IncomingTransaction {
                        id: Hash256([98u8; 32]),
                        version: 1,
                        coin_inputs: vec![IncomingCoinInput {
                            parent_output: payout_id,
                            fulfillment,
                        }],
                        coin_outputs: vec![],
                        block_stake_inputs: vec![],
                        block_stake_outputs: vec![],
                        arbitrary_data: vec![],
                        extension_data: vec![],
                    },
                ],
            }],
        };

        let err = store
            .apply_change(&FixedQuery, &FixedConstants, &double_spend)
            .unwrap_err();
        assert!(err.is_fatal());
    }
}

#[cfg(test)]
mod reversibility_proptests {
    use super::test_support::{open_test_store, FixedConstants, FixedQuery};
    use super::*;
    use chainidx_types::{Currency, IncomingBlock, IncomingPayout};
    use proptest::prelude::*;

    fn block_id(index: usize) -> Hash256 {
        // `index` is always < values.len(), itself capped at 6, so this
        // never collides with `Hash256::zero()` (the genesis parent).
        Hash256([(index + 1) as u8; 32])
    }

    fn chain_of(values: &[u64]) -> Vec<IncomingBlock> {
        let miner = Address::new(Address::SINGLE_SIGNATURE, Hash256([42u8; 32]));
        let mut parent_id = Hash256::zero();
        let mut blocks = Vec::with_capacity(values.len());
        for (i, value) in values.iter().enumerate() {
            let id = block_id(i);
            blocks.push(IncomingBlock {
                id,
                parent_id,
                timestamp: 1_600_000_000 + i as u64,
                miner_payouts: vec![IncomingPayout {
                    value: Currency::from_u64(*value),
                    recipient: miner,
                }],
                transactions: vec![],
            });
            parent_id = id;
        }
        blocks
    }

    proptest! {
        /// Applying a chain and then reverting its last `k` blocks in one
        /// change must land the store in exactly the state reached by
        /// applying only the retained prefix directly (spec.md §8
        /// Invariant 1 "reversibility"). Every block's payout stays locked
        /// throughout (chain length is capped below `maturity_delay`), so
        /// this isolates reversibility from the unlock schedule.
        #[test]
        fn reverting_a_suffix_matches_applying_only_the_prefix(
            values in prop::collection::vec(1u64..=1_000, 1..=6),
            cut_seed: usize,
        ) {
            let blocks = chain_of(&values);
            let cut = cut_seed % (blocks.len() + 1);
            let kept = blocks.len() - cut;

            let reverted = open_test_store();
            for (i, block) in blocks.iter().enumerate() {
                let change = ConsensusChange {
                    id: [i as u8; 32],
                    reverted_blocks: vec![],
                    applied_blocks: vec![block.clone()],
                };
                reverted.apply_change(&FixedQuery, &FixedConstants, &change).unwrap();
            }
            if cut > 0 {
                let undo = ConsensusChange {
                    id: [200u8; 32],
                    reverted_blocks: blocks[kept..].iter().rev().cloned().collect(),
                    applied_blocks: vec![],
                };
                reverted.apply_change(&FixedQuery, &FixedConstants, &undo).unwrap();
            }

            let prefix_only = open_test_store();
            for (i, block) in blocks[..kept].iter().enumerate() {
                let change = ConsensusChange {
                    id: [i as u8; 32],
                    reverted_blocks: vec![],
                    applied_blocks: vec![block.clone()],
                };
                prefix_only.apply_change(&FixedQuery, &FixedConstants, &change).unwrap();
            }

            prop_assert_eq!(
                reverted.get_chain_context().unwrap(),
                prefix_only.get_chain_context().unwrap()
            );
            prop_assert_eq!(
                reverted.get_chain_aggregated_facts().unwrap(),
                prefix_only.get_chain_aggregated_facts().unwrap()
            );
        }
    }
}
