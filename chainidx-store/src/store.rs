//! The object store (spec.md §4.2 "C2 Object store").
//!
//! Every persisted entity (block, transaction, output, wallet, contract)
//! is stored twice: a small [`Envelope`] under the entity's public id in
//! `object_envelopes`, and the full payload under an internal, ever
//! increasing [`DataId`] in `object_payloads`. Looking an entity up by id
//! is therefore always two lookups — cheap, and it keeps the envelope
//! scan `relock` depends on (spec.md §4.3) from ever deserializing a full
//! payload it doesn't need.
//!
//! Wallet and atomic-swap-contract objects are keyed by the 32-byte hash
//! inside their [`Address`], not by a separately derived id: every
//! `Address` already uniquely names one on-chain entity once its
//! `unlock_type` disambiguates the object kind, and the envelope's
//! `object_type` carries that disambiguation through the lookup.

use crate::batch::{TreeName, WriteBatch};
use crate::cursor::Cursor;
use crate::envelope::{Envelope, ObjectType};
use crate::error::{Result, StoreError};
use crate::lock_schedule;
use crate::trees::{address_key, data_id_key, object_id_key, u64_key, Trees, META_LAST_DATA_ID};
use chainidx_types::{
    Address, AtomicSwapContract, BinaryDecode, BinaryEncode, Block, BlockFacts, DataId, Hash256,
    Output, ReferencePoint, Transaction, Wallet,
};

fn next_data_id(trees: &Trees, batch: &mut WriteBatch) -> Result<DataId> {
    let current = match batch.get(trees, TreeName::Metadata, META_LAST_DATA_ID)? {
        Some(bytes) => u64::decode_from_slice(&bytes)?,
        None => 0,
    };
    let next = current + 1;
    batch.insert(
        TreeName::Metadata,
        META_LAST_DATA_ID.to_vec(),
        next.encode_to_vec(),
    );
    Ok(DataId(next))
}

fn put_object(
    batch: &mut WriteBatch,
    object_type: ObjectType,
    object_id: &Hash256,
    data_id: DataId,
    payload: &impl BinaryEncode,
) {
    let envelope = Envelope::new(object_type, data_id);
    batch.insert(
        TreeName::ObjectEnvelopes,
        object_id_key(object_id).to_vec(),
        envelope.encode_to_vec(),
    );
    batch.insert(
        TreeName::ObjectPayloads,
        data_id_key(data_id).to_vec(),
        payload.encode_to_vec(),
    );
}

fn get_envelope(trees: &Trees, batch: &WriteBatch, object_id: &Hash256) -> Result<Option<Envelope>> {
    match batch.get(trees, TreeName::ObjectEnvelopes, &object_id_key(object_id))? {
        Some(bytes) => Ok(Some(Envelope::decode_from_slice(&bytes)?)),
        None => Ok(None),
    }
}

fn get_payload<T: BinaryDecode>(
    trees: &Trees,
    batch: &WriteBatch,
    object_id: &Hash256,
    expected: ObjectType,
) -> Result<T> {
    let envelope = get_envelope(trees, batch, object_id)?.ok_or(StoreError::NotFound)?;
    if envelope.object_type != expected {
        return Err(StoreError::TypeMismatch);
    }
    let bytes = batch
        .get(trees, TreeName::ObjectPayloads, &data_id_key(envelope.data_id))?
        .ok_or(StoreError::NotFound)?;
    Ok(T::decode_from_slice(&bytes)?)
}

fn delete_object(batch: &mut WriteBatch, trees: &Trees, object_id: &Hash256) -> Result<Option<Envelope>> {
    let envelope = get_envelope(trees, batch, object_id)?;
    if let Some(envelope) = &envelope {
        batch.remove(TreeName::ObjectEnvelopes, object_id_key(object_id).to_vec());
        batch.remove(TreeName::ObjectPayloads, data_id_key(envelope.data_id).to_vec());
    }
    Ok(envelope)
}

// ---------------------------------------------------------------- blocks

/// Indexes `block` and its accompanying [`BlockFacts`] snapshot (spec.md
/// §4.2 "save_block(block, facts)"). `facts` is stored directly under the
/// block's id rather than through the envelope/data-id machinery: it is not
/// an independently addressable object, just an immutable annotation on one.
pub fn save_block(trees: &Trees, batch: &mut WriteBatch, block: &Block, facts: &BlockFacts) -> Result<()> {
    let data_id = next_data_id(trees, batch)?;
    put_object(batch, ObjectType::Block, &block.id, data_id, block);
    batch.insert(
        TreeName::BlockByHeight,
        u64_key(block.height).to_vec(),
        block.id.as_bytes().to_vec(),
    );
    batch.insert(
        TreeName::BlockByTimestamp,
        u64_key(block.timestamp).to_vec(),
        block.id.as_bytes().to_vec(),
    );
    batch.insert(
        TreeName::BlockFacts,
        object_id_key(&block.id).to_vec(),
        facts.encode_to_vec(),
    );
    Ok(())
}

pub fn get_block(trees: &Trees, batch: &WriteBatch, block_id: &Hash256) -> Result<Block> {
    get_payload(trees, batch, block_id, ObjectType::Block)
}

pub fn get_block_facts(trees: &Trees, batch: &WriteBatch, block_id: &Hash256) -> Result<BlockFacts> {
    let bytes = batch
        .get(trees, TreeName::BlockFacts, &object_id_key(block_id))?
        .ok_or(StoreError::NotFound)?;
    Ok(BlockFacts::decode_from_slice(&bytes)?)
}

pub fn get_block_id_at_height(trees: &Trees, batch: &WriteBatch, height: u64) -> Result<Hash256> {
    let bytes = batch
        .get(trees, TreeName::BlockByHeight, &u64_key(height))?
        .ok_or(StoreError::NotFound)?;
    Ok(Hash256(<[u8; 32]>::decode_from_slice(&bytes)?))
}

pub fn get_block_at_height(trees: &Trees, batch: &WriteBatch, height: u64) -> Result<Block> {
    let block_id = get_block_id_at_height(trees, batch, height)?;
    get_block(trees, batch, &block_id)
}

/// Intersection of optional ranges on height, timestamp, and transaction
/// count (spec.md §4.2 "`get_blocks` semantics"). All bounds are inclusive;
/// an unset bound imposes no constraint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BlockFilter {
    pub min_height: Option<u64>,
    pub max_height: Option<u64>,
    pub min_timestamp: Option<u64>,
    pub max_timestamp: Option<u64>,
    pub min_transaction_count: Option<u64>,
    pub max_transaction_count: Option<u64>,
}

impl BlockFilter {
    fn matches(&self, block: &Block) -> bool {
        let tx_count = block.transactions.len() as u64;
        self.min_timestamp.map_or(true, |v| block.timestamp >= v)
            && self.max_timestamp.map_or(true, |v| block.timestamp <= v)
            && self.min_transaction_count.map_or(true, |v| tx_count >= v)
            && self.max_transaction_count.map_or(true, |v| tx_count <= v)
    }
}

/// Lists blocks in ascending height order matching `filter`, starting
/// strictly after `cursor.after_height` (or from genesis if `cursor` is
/// `None`), returning up to `limit` blocks and a cursor to resume from if
/// more remain (spec.md §4.2, §4.7).
///
/// The caller-supplied cursor tightens the height filter's lower bound: a
/// stricter `filter.min_height` still wins over a looser cursor position,
/// and vice versa (spec.md §4.2 "any stricter caller-supplied bound wins").
///
/// Reads against the durable tree directly: `get_blocks` is a read-only
/// query issued between changes, never while a `WriteBatch` for an
/// in-flight change is still open.
pub fn get_blocks(
    trees: &Trees,
    filter: &BlockFilter,
    cursor: Option<Cursor>,
    limit: usize,
) -> Result<(Vec<Block>, Option<Cursor>)> {
    let cursor_start = cursor.map(|c| c.after_height + 1).unwrap_or(0);
    let filter_start = filter.min_height.unwrap_or(0);
    let start = cursor_start.max(filter_start);

    let batch = WriteBatch::new();
    let mut blocks = Vec::with_capacity(limit);
    let mut next_cursor = None;

    for entry in trees.block_by_height.range(u64_key(start)..) {
        let (key, block_id_bytes) = entry?;
        let height = u64::from_be_bytes(key.as_ref().try_into().expect("8-byte height key"));
        if let Some(max_height) = filter.max_height {
            if height > max_height {
                break;
            }
        }
        let block_id = Hash256(<[u8; 32]>::decode_from_slice(&block_id_bytes)?);
        let block = get_block(trees, &batch, &block_id)?;
        if !filter.matches(&block) {
            continue;
        }
        if blocks.len() == limit {
            next_cursor = Some(Cursor::after(blocks.last().unwrap().height));
            break;
        }
        blocks.push(block);
    }

    Ok((blocks, next_cursor))
}

pub fn delete_block(trees: &Trees, batch: &mut WriteBatch, block_id: &Hash256) -> Result<()> {
    let block: Block = get_block(trees, batch, block_id)?;
    delete_object(batch, trees, block_id)?;
    batch.remove(TreeName::BlockByHeight, u64_key(block.height).to_vec());
    batch.remove(TreeName::BlockByTimestamp, u64_key(block.timestamp).to_vec());
    batch.remove(TreeName::BlockFacts, object_id_key(block_id).to_vec());
    Ok(())
}

// ----------------------------------------------------------- transactions

pub fn save_transaction(trees: &Trees, batch: &mut WriteBatch, tx: &Transaction) -> Result<()> {
    let data_id = next_data_id(trees, batch)?;
    put_object(batch, ObjectType::Transaction, &tx.id, data_id, tx);
    Ok(())
}

pub fn get_transaction(trees: &Trees, batch: &WriteBatch, id: &Hash256) -> Result<Transaction> {
    get_payload(trees, batch, id, ObjectType::Transaction)
}

pub fn delete_transaction(trees: &Trees, batch: &mut WriteBatch, id: &Hash256) -> Result<()> {
    delete_object(batch, trees, id)?;
    Ok(())
}

// --------------------------------------------------------------- outputs

/// Saves an output and, if its reference point is not yet reached at the
/// given chain tip, registers it in the lock schedule (spec.md §4.2,
/// §4.3).
pub fn save_output(
    trees: &Trees,
    batch: &mut WriteBatch,
    output: &Output,
    height: u64,
    timestamp: u64,
    threshold: u64,
    bucket_width_secs: u64,
) -> Result<bool> {
    let data_id = next_data_id(trees, batch)?;
    put_object(batch, ObjectType::Output, &output.id, data_id, output);
    let locked = output.is_locked(height, timestamp, threshold);
    if locked {
        lock_schedule::register(
            trees,
            batch,
            bucket_width_secs,
            output.reference_point,
            threshold,
            data_id,
        )?;
    }
    Ok(locked)
}

pub fn get_output(trees: &Trees, batch: &WriteBatch, id: &Hash256) -> Result<Output> {
    get_payload(trees, batch, id, ObjectType::Output)
}

/// Deletes an output, removing its lock-schedule entry first if it was
/// still locked (spec.md §4.3, used when reverting the block that created
/// this output).
pub fn delete_output(
    trees: &Trees,
    batch: &mut WriteBatch,
    id: &Hash256,
    reference_point: ReferencePoint,
    threshold: u64,
    bucket_width_secs: u64,
) -> Result<()> {
    let envelope = get_envelope(trees, batch, id)?.ok_or(StoreError::NotFound)?;
    lock_schedule::unreference(trees, batch, bucket_width_secs, threshold, reference_point, envelope.data_id)?;
    delete_object(batch, trees, id)?;
    Ok(())
}

/// Overwrites the spenditure field on an already-stored output in place
/// (spec.md §4.2 "C5 writes spends through an update, not a full
/// rewrite").
pub fn update_output_spenditure(
    trees: &Trees,
    batch: &mut WriteBatch,
    id: &Hash256,
    spenditure: Option<chainidx_types::Spenditure>,
) -> Result<Output> {
    let envelope = get_envelope(trees, batch, id)?.ok_or(StoreError::NotFound)?;
    if envelope.object_type != ObjectType::Output {
        return Err(StoreError::TypeMismatch);
    }
    let bytes = batch
        .get(trees, TreeName::ObjectPayloads, &data_id_key(envelope.data_id))?
        .ok_or(StoreError::NotFound)?;
    let mut output = Output::decode_from_slice(&bytes)?;
    match (&output.spenditure, &spenditure) {
        (Some(_), Some(_)) => {
            return Err(StoreError::InvariantViolation(format!(
                "output {:?} is already spent",
                id
            )))
        }
        (None, None) => {
            return Err(StoreError::InvariantViolation(format!(
                "output {:?} is not spent",
                id
            )))
        }
        _ => {}
    }
    output.spenditure = spenditure;
    batch.insert(
        TreeName::ObjectPayloads,
        data_id_key(envelope.data_id).to_vec(),
        output.encode_to_vec(),
    );
    Ok(output)
}

// --------------------------------------------------------------- wallets

fn wallet_object_type(wallet: &Wallet) -> ObjectType {
    match wallet {
        Wallet::FreeForAll { .. } => ObjectType::WalletFreeForAll,
        Wallet::SingleSignature { .. } => ObjectType::WalletSingleSignature,
        Wallet::MultiSignature { .. } => ObjectType::WalletMultiSignature,
    }
}

fn wallet_object_id(address: &Address) -> Hash256 {
    address.hash
}

pub fn save_wallet(trees: &Trees, batch: &mut WriteBatch, wallet: &Wallet) -> Result<()> {
    let object_id = wallet_object_id(&wallet.address());
    let existing = get_envelope(trees, batch, &object_id)?;
    let data_id = match existing {
        Some(envelope) => envelope.data_id,
        None => next_data_id(trees, batch)?,
    };
    put_object(batch, wallet_object_type(wallet), &object_id, data_id, wallet);
    Ok(())
}

pub fn get_wallet(trees: &Trees, batch: &WriteBatch, address: &Address) -> Result<Wallet> {
    let object_id = wallet_object_id(address);
    let envelope = get_envelope(trees, batch, &object_id)?.ok_or(StoreError::NotFound)?;
    let bytes = batch
        .get(trees, TreeName::ObjectPayloads, &data_id_key(envelope.data_id))?
        .ok_or(StoreError::NotFound)?;
    let wallet = Wallet::decode_from_slice(&bytes)?;
    match (&envelope.object_type, &wallet) {
        (ObjectType::WalletFreeForAll, Wallet::FreeForAll { .. }) => Ok(wallet),
        (ObjectType::WalletSingleSignature, Wallet::SingleSignature { .. }) => Ok(wallet),
        (ObjectType::WalletMultiSignature, Wallet::MultiSignature { .. }) => Ok(wallet),
        _ => Err(StoreError::TypeMismatch),
    }
}

pub fn delete_wallet(trees: &Trees, batch: &mut WriteBatch, address: &Address) -> Result<()> {
    delete_object(batch, trees, &wallet_object_id(address))?;
    Ok(())
}

// ------------------------------------------------------------- contracts

pub fn save_contract(trees: &Trees, batch: &mut WriteBatch, contract: &AtomicSwapContract) -> Result<()> {
    let object_id = contract.address.hash;
    let existing = get_envelope(trees, batch, &object_id)?;
    let data_id = match existing {
        Some(envelope) => envelope.data_id,
        None => next_data_id(trees, batch)?,
    };
    put_object(batch, ObjectType::AtomicSwapContract, &object_id, data_id, contract);
    Ok(())
}

pub fn get_contract(trees: &Trees, batch: &WriteBatch, address: &Address) -> Result<AtomicSwapContract> {
    get_payload(trees, batch, &address.hash, ObjectType::AtomicSwapContract)
}

pub fn delete_contract(trees: &Trees, batch: &mut WriteBatch, address: &Address) -> Result<()> {
    delete_object(batch, trees, &address.hash)?;
    Ok(())
}

// ----------------------------------------------------------- public keys

/// Records the public key a fulfillment revealed for an unlock hash
/// (spec.md §3 "Public key recovery"), so it can later be returned from a
/// query even though the chain itself only ever stores hashes.
pub fn record_public_key(batch: &mut WriteBatch, address: &Address, public_key: &[u8; 32]) {
    batch.insert(
        TreeName::PublicKeys,
        address_key(address).to_vec(),
        public_key.to_vec(),
    );
}

pub fn get_public_key(trees: &Trees, batch: &WriteBatch, address: &Address) -> Result<[u8; 32]> {
    let bytes = batch
        .get(trees, TreeName::PublicKeys, &address_key(address))?
        .ok_or(StoreError::NotFound)?;
    <[u8; 32]>::decode_from_slice(&bytes).map_err(StoreError::from)
}
