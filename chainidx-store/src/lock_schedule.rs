//! Secondary index mapping a reference point to the set of output ids
//! locked until that point (spec.md §4.3), so that unlocking at block B is
//! an indexed range query rather than a full scan of every output.

use crate::batch::{TreeName, WriteBatch};
use crate::envelope::{Envelope, ObjectType};
use crate::error::{Result, StoreError};
use crate::trees::{data_id_key, u64_key, Trees};
use chainidx_types::{BinaryDecode, BinaryEncode, DataId, Output, ReferencePoint};

fn read_height_entry(trees: &Trees, batch: &WriteBatch, height: u64) -> Result<Vec<DataId>> {
    match batch.get(trees, TreeName::LockedByHeight, &u64_key(height))? {
        Some(bytes) => Ok(Vec::<DataId>::decode_from_slice(&bytes)?),
        None => Ok(Vec::new()),
    }
}

fn write_height_entry(batch: &mut WriteBatch, height: u64, entries: Vec<DataId>) {
    let key = u64_key(height);
    if entries.is_empty() {
        batch.remove(TreeName::LockedByHeight, key.to_vec());
    } else {
        batch.insert(TreeName::LockedByHeight, key.to_vec(), entries.encode_to_vec());
    }
}

fn read_bucket_entry(trees: &Trees, batch: &WriteBatch, bucket: u64) -> Result<Vec<(DataId, u8)>> {
    match batch.get(trees, TreeName::LockedByTimestampBucket, &u64_key(bucket))? {
        Some(bytes) => Ok(Vec::<(DataId, u8)>::decode_from_slice(&bytes)?),
        None => Ok(Vec::new()),
    }
}

fn write_bucket_entry(batch: &mut WriteBatch, bucket: u64, entries: Vec<(DataId, u8)>) {
    let key = u64_key(bucket);
    if entries.is_empty() {
        batch.remove(TreeName::LockedByTimestampBucket, key.to_vec());
    } else {
        batch.insert(
            TreeName::LockedByTimestampBucket,
            key.to_vec(),
            entries.encode_to_vec(),
        );
    }
}

fn read_output_payload(trees: &Trees, batch: &WriteBatch, data_id: DataId) -> Result<Output> {
    let bytes = batch
        .get(trees, TreeName::ObjectPayloads, &data_id_key(data_id))?
        .ok_or(StoreError::NotFound)?;
    Ok(Output::decode_from_slice(&bytes)?)
}

/// Registers a newly locked output under its reference point. Called by
/// the object store when `save_output` determines the output is not yet
/// unlocked at the current chain tip (spec.md §4.2, §4.3).
pub fn register(
    trees: &Trees,
    batch: &mut WriteBatch,
    bucket_width_secs: u64,
    reference_point: ReferencePoint,
    threshold: u64,
    data_id: DataId,
) -> Result<()> {
    if reference_point.is_height(threshold) {
        let mut entries = read_height_entry(trees, batch, reference_point.0)?;
        entries.push(data_id);
        write_height_entry(batch, reference_point.0, entries);
    } else {
        let bucket = reference_point.0 / bucket_width_secs;
        let offset = (reference_point.0 % bucket_width_secs) as u8;
        let mut entries = read_bucket_entry(trees, batch, bucket)?;
        entries.push((data_id, offset));
        write_bucket_entry(batch, bucket, entries);
    }
    Ok(())
}

/// Unlocks every output whose reference point is reached by a block at
/// `height` with timestamp in `(min_ts_exclusive, max_ts_inclusive]`
/// (spec.md §4.3). A no-op time window (`max_ts <= min_ts`) is legal: the
/// upstream stake algorithm permits non-monotonic block timestamps.
pub fn unlock(
    trees: &Trees,
    batch: &mut WriteBatch,
    bucket_width_secs: u64,
    height: u64,
    min_ts_exclusive: u64,
    max_ts_inclusive: u64,
) -> Result<Vec<Output>> {
    let mut unlocked = Vec::new();

    let height_entries = read_height_entry(trees, batch, height)?;
    if !height_entries.is_empty() {
        write_height_entry(batch, height, Vec::new());
        for data_id in height_entries {
            unlocked.push(read_output_payload(trees, batch, data_id)?);
        }
    }

    if max_ts_inclusive > min_ts_exclusive {
        let first_bucket = min_ts_exclusive / bucket_width_secs;
        let last_bucket = max_ts_inclusive / bucket_width_secs;
        // Only enumerate *populated* bucket keys in range: the window can
        // span millions of empty integer bucket ids (e.g. the very first
        // block after a fresh store, where `min_ts_exclusive` is 0), and
        // this must stay an indexed range query, not a scan proportional
        // to the width of the timestamp window (spec.md §4.3).
        let bucket_keys = batch.range_keys(
            trees,
            TreeName::LockedByTimestampBucket,
            &u64_key(first_bucket),
            &u64_key(last_bucket),
        )?;
        for key in bucket_keys {
            let bucket = u64::from_be_bytes(key.as_slice().try_into().expect("8-byte bucket key"));
            let entries = read_bucket_entry(trees, batch, bucket)?;
            if entries.is_empty() {
                continue;
            }
            let bucket_start = bucket * bucket_width_secs;
            let mut remaining = Vec::with_capacity(entries.len());
            for (data_id, offset) in entries {
                let ts = bucket_start + offset as u64;
                if ts > min_ts_exclusive && ts <= max_ts_inclusive {
                    unlocked.push(read_output_payload(trees, batch, data_id)?);
                } else {
                    remaining.push((data_id, offset));
                }
            }
            write_bucket_entry(batch, bucket, remaining);
        }
    }

    unlocked.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(unlocked)
}

/// Inverse of [`unlock`]: used during revert to put back the schedule
/// entries for every output that this block's apply had unlocked
/// (spec.md §4.3, §4.5). Scans every currently stored output for a
/// reference point matching `height` or inside the timestamp window,
/// since (by construction) none of them are in the lock schedule any more.
///
/// This is the one operation in the store that performs a full scan rather
/// than an indexed lookup; spec.md §4.3 names it explicitly as a scan, and
/// it is only exercised on the (bounded-depth) revert path.
pub fn relock(
    trees: &Trees,
    batch: &mut WriteBatch,
    bucket_width_secs: u64,
    threshold: u64,
    height: u64,
    min_ts_exclusive: u64,
    max_ts_inclusive: u64,
) -> Result<Vec<Output>> {
    let mut relocked = Vec::new();

    for entry in trees.object_envelopes.iter() {
        let (object_id, envelope_bytes) = entry?;
        let envelope = Envelope::decode_from_slice(&envelope_bytes)?;
        if envelope.object_type != ObjectType::Output {
            continue;
        }
        let payload = trees
            .object_payloads
            .get(data_id_key(envelope.data_id))?
            .ok_or(StoreError::NotFound)?;
        let output = Output::decode_from_slice(&payload)?;
        debug_assert_eq!(output.id.as_bytes()[..], object_id[..]);

        let rp = output.reference_point;
        if rp.is_height(threshold) && rp.0 == height {
            register(trees, batch, bucket_width_secs, rp, threshold, envelope.data_id)?;
            relocked.push(output);
        } else if rp.is_timestamp(threshold) && rp.0 > min_ts_exclusive && rp.0 <= max_ts_inclusive {
            register(trees, batch, bucket_width_secs, rp, threshold, envelope.data_id)?;
            relocked.push(output);
        }
    }

    relocked.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(relocked)
}

/// Removes a single data id from its lock-schedule entry, deleting the
/// entry's shell if it becomes empty (spec.md §4.3, used by `delete_output`
/// when the output being deleted was still locked).
pub fn unreference(
    trees: &Trees,
    batch: &mut WriteBatch,
    bucket_width_secs: u64,
    threshold: u64,
    reference_point: ReferencePoint,
    data_id: DataId,
) -> Result<()> {
    if reference_point.is_always_unlocked() {
        return Ok(());
    }
    if reference_point.is_height(threshold) {
        let mut entries = read_height_entry(trees, batch, reference_point.0)?;
        entries.retain(|id| *id != data_id);
        write_height_entry(batch, reference_point.0, entries);
    } else {
        let bucket = reference_point.0 / bucket_width_secs;
        let mut entries = read_bucket_entry(trees, batch, bucket)?;
        entries.retain(|(id, _)| *id != data_id);
        write_bucket_entry(batch, bucket, entries);
    }
    Ok(())
}
