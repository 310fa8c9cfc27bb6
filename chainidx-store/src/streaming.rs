//! Streaming consumption of the upstream consensus change stream (spec.md
//! §5, §9 "Streaming apply"): a typed, single-producer/single-consumer
//! channel instead of a synchronous call per change, so the upstream
//! consensus module and the indexer can run on separate tasks without a
//! thread pool. Grounded on `zebra-state`'s `tokio::sync` dependency
//! (`pending_utxos.rs`'s `broadcast` channel), which establishes
//! `tokio::sync` as the channel family this crate already reaches for.
//!
//! Each change received from the channel is applied with the same
//! [`crate::Store::apply_change`] used by a one-shot caller, so the
//! per-change checkpointing in `applier::apply_change` already bounds how
//! much staged state accumulates before touching disk; this loop adds
//! nothing beyond sequencing.

use crate::{Result, Store};
use chainidx_types::{ChainConstants, ConsensusChange, ConsensusQuery};
use tokio::sync::mpsc;

/// Bounded channel capacity the upstream consensus module is expected to
/// use when feeding changes into [`run`] (spec.md §9: "typed channel,
/// single producer, single consumer").
pub const CHANNEL_CAPACITY: usize = 1;

pub fn channel() -> (mpsc::Sender<ConsensusChange>, mpsc::Receiver<ConsensusChange>) {
    mpsc::channel(CHANNEL_CAPACITY)
}

/// Applies every change received on `changes`, in order, until the sender
/// half is dropped. Closing the channel is the caller's cancellation
/// mechanism (spec.md §5 "Suspension points"); a closed channel ends the
/// loop normally rather than as an error.
///
/// Returns on the first `Fatal` error, leaving the channel's remaining
/// changes (if any) unconsumed: the caller is expected to stop producing
/// once this returns (spec.md §7).
pub async fn run<Q: ConsensusQuery, C: ChainConstants>(
    store: &Store,
    query: &Q,
    constants: &C,
    mut changes: mpsc::Receiver<ConsensusChange>,
) -> Result<()> {
    while let Some(change) = changes.recv().await {
        store.apply_change(query, constants, &change)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{open_test_store, FixedConstants, FixedQuery};
    use chainidx_types::{Address, Currency, Hash256, IncomingBlock, IncomingPayout};

    #[tokio::test]
    async fn streaming_apply_consumes_changes_in_order_until_closed() {
        let store = open_test_store();
        let (sender, receiver) = channel();

        // Capacity is fixed at 1, so the consumer has to be draining
        // concurrently with the sends below or the producer deadlocks.
        let applied = tokio::spawn(async move {
            run(&store, &FixedQuery, &FixedConstants, receiver).await.unwrap();
            store
        });

        let miner = Address::new(Address::SINGLE_SIGNATURE, Hash256([2u8; 32]));
        let mut parent_id = Hash256::zero();
        let mut block_ids = Vec::new();
        for i in 0..3u8 {
            let block_id = Hash256([i + 1; 32]);
            let change = ConsensusChange {
                id: [i; 32],
                reverted_blocks: vec![],
                applied_blocks: vec![IncomingBlock {
                    id: block_id,
                    parent_id,
                    timestamp: 1_600_000_000 + i as u64,
                    miner_payouts: vec![IncomingPayout {
                        value: Currency::from_u64(10),
                        recipient: miner,
                    }],
                    transactions: vec![],
                }],
            };
            sender.send(change).await.unwrap();
            block_ids.push(block_id);
            parent_id = block_id;
        }
        drop(sender);

        let store = applied.await.unwrap();
        let context = store.get_chain_context().unwrap();
        assert_eq!(context.height, 3);
        assert_eq!(context.last_block_id, *block_ids.last().unwrap());
        for block_id in block_ids {
            store.get_block(&block_id).unwrap();
        }
    }
}
