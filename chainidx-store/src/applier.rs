//! The change applier (spec.md §4.5 "C5 Change applier").
//!
//! Translates one [`ConsensusChange`] into object-store/aggregator/lock-
//! schedule mutations staged into a [`WriteBatch`]: every reverted block
//! undone tip-first, then every applied block indexed parent-first, with
//! the batch checkpointed every `checkpoint_interval_blocks` so one very
//! long change does not hold an unbounded amount of staged state in
//! memory (spec.md §4.6).

use crate::aggregator;
use crate::batch::WriteBatch;
use crate::error::{Result, StoreError};
use crate::lock_schedule;
use crate::store;
use crate::trees::{Trees, META_AGGREGATED_FACTS, META_CHAIN_CONTEXT};
use crate::wallet_ops;
use chainidx_types::{
    Address, Block, BlockFacts, ChainAggregatedFacts, ChainConstants, ChainContext, Condition,
    ConsensusChange, ConsensusQuery, Currency, Fulfillment, Hash256, IncomingBlock, Output,
    OutputKind, ReferencePoint, Spenditure, Transaction,
};
use sha2::{Digest, Sha256};

/// Records the public key a spend fulfillment reveals, where the spent
/// output's condition names a single address directly (spec.md §3 "Public
/// key recovery"). `Fulfillment::MultiSignature` is skipped: a multisig
/// fulfillment carries one `SignaturePair` per co-signer but nothing here
/// ties a given pair back to which owner address supplied it, so recording
/// would require guessing. `Fulfillment::Unknown` never names a key.
fn maybe_record_public_key(trees: &Trees, batch: &mut WriteBatch, output: &Output, fulfillment: &Fulfillment) {
    match (wallet_ops::resolved_condition(&output.condition), fulfillment) {
        (Condition::UnlockHash(address), Fulfillment::SingleSignature(pair)) => {
            store::record_public_key(batch, address, &pair.public_key);
        }
        (
            Condition::AtomicSwap { sender, receiver, .. },
            Fulfillment::AtomicSwap { pair, secret },
        ) => {
            let claimant: &Address = if secret.is_some() { receiver } else { sender };
            store::record_public_key(batch, claimant, &pair.public_key);
        }
        _ => {}
    }
}

fn derive_output_id(parent: &Hash256, salt: u8, index: u64) -> Hash256 {
    let mut hasher = Sha256::new();
    hasher.update(parent.as_bytes());
    hasher.update([salt]);
    hasher.update(index.to_be_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&digest);
    Hash256(bytes)
}

const SALT_PAYOUT: u8 = 0;
const SALT_COIN_OUTPUT: u8 = 1;
const SALT_BLOCK_STAKE_OUTPUT: u8 = 2;

struct Cx<'a, Q: ConsensusQuery, C: ChainConstants> {
    trees: &'a Trees,
    query: &'a Q,
    constants: &'a C,
    threshold: u64,
    bucket_width_secs: u64,
}

/// Applies one consensus change in full, persisting the resulting
/// [`ChainContext`]/[`ChainAggregatedFacts`] at the end of every
/// checkpoint slice. Returns the final context and facts.
pub fn apply_change<Q: ConsensusQuery, C: ChainConstants>(
    trees: &Trees,
    query: &Q,
    constants: &C,
    checkpoint_interval_blocks: u64,
    bucket_width_secs: u64,
    mut context: ChainContext,
    mut facts: ChainAggregatedFacts,
    change: &ConsensusChange,
) -> Result<(ChainContext, ChainAggregatedFacts)> {
    let cx = Cx {
        trees,
        query,
        constants,
        threshold: constants.reference_point_threshold(),
        bucket_width_secs,
    };

    let mut batch = WriteBatch::new();
    let mut blocks_since_checkpoint = 0u64;

    for incoming in change.reverted_blocks.iter() {
        revert_block(&cx, &mut batch, &mut facts, incoming)?;
        context.height = context.height.saturating_sub(1);
        context.last_block_id = incoming.parent_id;
        blocks_since_checkpoint += 1;
        if blocks_since_checkpoint >= checkpoint_interval_blocks {
            checkpoint(trees, &mut batch, &context, &facts)?;
            blocks_since_checkpoint = 0;
        }
    }

    for incoming in change.applied_blocks.iter() {
        apply_block(&cx, &mut batch, &mut facts, &context, incoming)?;
        context.height += 1;
        context.last_block_timestamp = incoming.timestamp;
        context.last_block_id = incoming.id;
        blocks_since_checkpoint += 1;
        if blocks_since_checkpoint >= checkpoint_interval_blocks {
            checkpoint(trees, &mut batch, &context, &facts)?;
            blocks_since_checkpoint = 0;
        }
    }

    context.consensus_change_id = change.id;
    checkpoint(trees, &mut batch, &context, &facts)?;
    Ok((context, facts))
}

fn checkpoint(trees: &Trees, batch: &mut WriteBatch, context: &ChainContext, facts: &ChainAggregatedFacts) -> Result<()> {
    use crate::batch::TreeName;
    use chainidx_types::BinaryEncode;
    batch.insert(
        TreeName::Metadata,
        META_CHAIN_CONTEXT.to_vec(),
        context.encode_to_vec(),
    );
    batch.insert(
        TreeName::Metadata,
        META_AGGREGATED_FACTS.to_vec(),
        facts.encode_to_vec(),
    );
    let staged = std::mem::replace(batch, WriteBatch::new());
    staged.commit(trees)
}

fn apply_block<Q: ConsensusQuery, C: ChainConstants>(
    cx: &Cx<Q, C>,
    batch: &mut WriteBatch,
    facts: &mut ChainAggregatedFacts,
    context: &ChainContext,
    incoming: &IncomingBlock,
) -> Result<()> {
    let height = context.height + 1;
    let target = if incoming.parent_id == Hash256::zero() {
        cx.constants.root_target()
    } else {
        cx.query
            .child_target(&incoming.parent_id)
            .map_err(|e| StoreError::Fatal(format!("{:?}", e)))?
    };

    let maturity_point = ReferencePoint(height + cx.constants.maturity_delay());
    let mut payout_ids = Vec::with_capacity(incoming.miner_payouts.len());
    for (index, payout) in incoming.miner_payouts.iter().enumerate() {
        let kind = if index == 0 {
            OutputKind::BlockCreationReward
        } else {
            OutputKind::TransactionFee
        };
        let output = chainidx_types::Output {
            id: derive_output_id(&incoming.id, SALT_PAYOUT, index as u64),
            parent_id: incoming.id,
            kind,
            value: payout.value.clone(),
            condition: chainidx_types::Condition::UnlockHash(payout.recipient),
            reference_point: maturity_point,
            spenditure: None,
        };
        let locked = store::save_output(
            cx.trees,
            batch,
            &output,
            height,
            incoming.timestamp,
            cx.threshold,
            cx.bucket_width_secs,
        )?;
        aggregator::apply_output(facts, &output, locked);
        wallet_ops::credit_output(cx.trees, batch, &output, locked)?;
        payout_ids.push(output.id);
    }

    let mut tx_ids = Vec::with_capacity(incoming.transactions.len());
    for (tx_index, incoming_tx) in incoming.transactions.iter().enumerate() {
        let fee_payout = if tx_index == 0 { payout_ids.get(1).copied() } else { None };

        let mut coin_outputs = Vec::with_capacity(incoming_tx.coin_outputs.len());
        for (i, out) in incoming_tx.coin_outputs.iter().enumerate() {
            let output = chainidx_types::Output {
                id: derive_output_id(&incoming_tx.id, SALT_COIN_OUTPUT, i as u64),
                parent_id: incoming_tx.id,
                kind: OutputKind::Coin,
                value: out.value.clone(),
                condition: out.condition.clone(),
                reference_point: ReferencePoint::ALWAYS_UNLOCKED,
                spenditure: None,
            };
            let locked = store::save_output(
                cx.trees,
                batch,
                &output,
                height,
                incoming.timestamp,
                cx.threshold,
                cx.bucket_width_secs,
            )?;
            aggregator::apply_output(facts, &output, locked);
            wallet_ops::credit_output(cx.trees, batch, &output, locked)?;
            coin_outputs.push(output.id);
        }

        let mut block_stake_outputs = Vec::with_capacity(incoming_tx.block_stake_outputs.len());
        for (i, out) in incoming_tx.block_stake_outputs.iter().enumerate() {
            let output = chainidx_types::Output {
                id: derive_output_id(&incoming_tx.id, SALT_BLOCK_STAKE_OUTPUT, i as u64),
                parent_id: incoming_tx.id,
                kind: OutputKind::BlockStake,
                value: out.value.clone(),
                condition: out.condition.clone(),
                reference_point: ReferencePoint::ALWAYS_UNLOCKED,
                spenditure: None,
            };
            let locked = store::save_output(
                cx.trees,
                batch,
                &output,
                height,
                incoming.timestamp,
                cx.threshold,
                cx.bucket_width_secs,
            )?;
            aggregator::apply_output(facts, &output, locked);
            wallet_ops::credit_output(cx.trees, batch, &output, locked)?;
            block_stake_outputs.push(output.id);
        }

        for input in incoming_tx.coin_inputs.iter().chain(incoming_tx.block_stake_inputs.iter()) {
            let spent_output = store::get_output(cx.trees, batch, &input.parent_output)?;
            // Reject an already-spent input before touching the aggregator
            // or wallet balances: a double-spend within one change must
            // surface `InvariantViolation` (Fatal) here, not underflow a
            // wallet that the first spend already drained (spec.md §7).
            store::update_output_spenditure(
                cx.trees,
                batch,
                &input.parent_output,
                Some(Spenditure {
                    fulfillment: input.fulfillment.clone(),
                    spending_transaction: incoming_tx.id,
                }),
            )?;
            aggregator::revert_output(facts, &spent_output, false);
            wallet_ops::spend_output(cx.trees, batch, &spent_output, &input.fulfillment, incoming_tx.id)?;
            maybe_record_public_key(cx.trees, batch, &spent_output, &input.fulfillment);
        }

        let coin_inputs = incoming_tx.coin_inputs.iter().map(|i| i.parent_output).collect();
        let block_stake_inputs = incoming_tx.block_stake_inputs.iter().map(|i| i.parent_output).collect();

        let tx = Transaction {
            id: incoming_tx.id,
            parent_block: incoming.id,
            version: incoming_tx.version,
            coin_inputs,
            coin_outputs,
            block_stake_inputs,
            block_stake_outputs,
            fee_payout,
            arbitrary_data: incoming_tx.arbitrary_data.clone(),
            extension_data: incoming_tx.extension_data.clone(),
        };
        store::save_transaction(cx.trees, batch, &tx)?;
        tx_ids.push(tx.id);
    }

    let block = Block {
        id: incoming.id,
        parent_id: incoming.parent_id,
        height,
        timestamp: incoming.timestamp,
        payouts: payout_ids,
        transactions: tx_ids,
    };
    aggregator::apply_block(facts, target.clone(), incoming.timestamp, cx.constants.root_depth());

    let unlocked = lock_schedule::unlock(
        cx.trees,
        batch,
        cx.bucket_width_secs,
        height,
        context.last_block_timestamp,
        incoming.timestamp,
    )?;
    for output in unlocked {
        aggregator::move_locked_total(facts, &output, false);
        wallet_ops::move_locked(cx.trees, batch, &output, false)?;
    }

    let difficulty = target.difficulty(cx.constants.root_depth());
    let block_facts = BlockFacts {
        target,
        difficulty: Currency::from_bytes_be(&difficulty.to_bytes_be()),
        total_coins: facts.total_coins.clone(),
        total_locked_coins: facts.total_locked_coins.clone(),
        total_block_stakes: facts.total_block_stakes.clone(),
        total_locked_block_stakes: facts.total_locked_block_stakes.clone(),
        estimated_active_block_stakes: facts.estimated_active_block_stakes.clone(),
    };
    store::save_block(cx.trees, batch, &block, &block_facts)?;

    Ok(())
}

fn revert_block<Q: ConsensusQuery, C: ChainConstants>(
    cx: &Cx<Q, C>,
    batch: &mut WriteBatch,
    facts: &mut ChainAggregatedFacts,
    incoming: &IncomingBlock,
) -> Result<()> {
    let block = store::get_block(cx.trees, batch, &incoming.id)?;
    let height_after_revert = block.height.saturating_sub(1);
    let parent = store::get_block(cx.trees, batch, &block.parent_id).unwrap_or_else(|_| Block {
        id: Hash256::zero(),
        parent_id: Hash256::zero(),
        height: 0,
        timestamp: 0,
        payouts: Vec::new(),
        transactions: Vec::new(),
    });
    let timestamp_after_revert = parent.timestamp;

    let relocked = lock_schedule::relock(
        cx.trees,
        batch,
        cx.bucket_width_secs,
        cx.threshold,
        block.height,
        timestamp_after_revert,
        block.timestamp,
    )?;
    for output in relocked {
        aggregator::move_locked_total(facts, &output, true);
        wallet_ops::move_locked(cx.trees, batch, &output, true)?;
    }

    for tx_id in block.transactions.iter().rev() {
        let tx = store::get_transaction(cx.trees, batch, tx_id)?;
        for input_id in tx.coin_inputs.iter().chain(tx.block_stake_inputs.iter()) {
            let spent_output = store::get_output(cx.trees, batch, input_id)?;
            store::update_output_spenditure(cx.trees, batch, input_id, None)?;
            aggregator::apply_output(facts, &spent_output, false);
            wallet_ops::unspend_output(cx.trees, batch, &spent_output, *tx_id)?;
        }
        for output_id in tx.coin_outputs.iter().chain(tx.block_stake_outputs.iter()) {
            let output = store::get_output(cx.trees, batch, output_id)?;
            let locked = output.is_locked(height_after_revert, timestamp_after_revert, cx.threshold);
            aggregator::revert_output(facts, &output, locked);
            wallet_ops::destroy_output(cx.trees, batch, &output, locked)?;
            store::delete_output(
                cx.trees,
                batch,
                output_id,
                output.reference_point,
                cx.threshold,
                cx.bucket_width_secs,
            )?;
        }
        store::delete_transaction(cx.trees, batch, tx_id)?;
    }

    for payout_id in block.payouts.iter() {
        let output = store::get_output(cx.trees, batch, payout_id)?;
        let locked = output.is_locked(height_after_revert, timestamp_after_revert, cx.threshold);
        aggregator::revert_output(facts, &output, locked);
        wallet_ops::destroy_output(cx.trees, batch, &output, locked)?;
        store::delete_output(
            cx.trees,
            batch,
            payout_id,
            output.reference_point,
            cx.threshold,
            cx.bucket_width_secs,
        )?;
    }

    store::delete_block(cx.trees, batch, &block.id)?;
    aggregator::revert_block(facts, cx.constants.root_depth());
    Ok(())
}
