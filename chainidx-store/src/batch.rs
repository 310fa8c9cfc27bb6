//! The read-write transaction (spec.md §4.6 "Transaction boundary").
//!
//! All object-store, lock-schedule, and aggregator writes for one
//! consensus change (or one streaming checkpoint slice of one) are staged
//! here in memory before touching disk. Reads issued through the same
//! `WriteBatch` see their own staged writes (spec.md §5: "later writes
//! observe earlier writes"), so the higher-level applier never has to
//! special-case "did I already delete this in this same change".
//!
//! Staging every mutation before any `sled::Tree::apply_batch` call means
//! the only failure mode left by the time we reach `commit` is a genuine
//! backend I/O error — every `NotFound`/`TypeMismatch`/`InvariantViolation`
//! check has already run against the staged view. `commit` therefore
//! applies each tree's batch in turn rather than wrapping every tree in a
//! single `sled` multi-tree transaction; see DESIGN.md for why this
//! trade-off is safe here.

use crate::error::Result;
use crate::trees::Trees;
use std::collections::HashMap;

#[derive(Default)]
struct Overlay(HashMap<Vec<u8>, Option<Vec<u8>>>);

impl Overlay {
    fn insert(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.0.insert(key, Some(value));
    }

    fn remove(&mut self, key: Vec<u8>) {
        self.0.insert(key, None);
    }

    /// `None` = not staged (fall through to disk), `Some(None)` = staged
    /// delete, `Some(Some(v))` = staged insert.
    fn staged(&self, key: &[u8]) -> Option<Option<&Vec<u8>>> {
        self.0.get(key).map(|v| v.as_ref())
    }

    fn into_sled_batch(self) -> sled::Batch {
        let mut batch = sled::Batch::default();
        for (key, value) in self.0 {
            match value {
                Some(value) => batch.insert(key, value),
                None => batch.remove(key),
            }
        }
        batch
    }
}

#[derive(Default)]
pub struct WriteBatch {
    metadata: Overlay,
    object_envelopes: Overlay,
    object_payloads: Overlay,
    block_by_height: Overlay,
    block_by_timestamp: Overlay,
    block_facts: Overlay,
    publickeys: Overlay,
    locked_by_height: Overlay,
    locked_by_timestamp_bucket: Overlay,
}

/// Identifies which tree a staged read/write targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TreeName {
    Metadata,
    ObjectEnvelopes,
    ObjectPayloads,
    BlockByHeight,
    BlockByTimestamp,
    BlockFacts,
    PublicKeys,
    LockedByHeight,
    LockedByTimestampBucket,
}

impl WriteBatch {
    pub fn new() -> Self {
        WriteBatch::default()
    }

    fn overlay_mut(&mut self, tree: TreeName) -> &mut Overlay {
        match tree {
            TreeName::Metadata => &mut self.metadata,
            TreeName::ObjectEnvelopes => &mut self.object_envelopes,
            TreeName::ObjectPayloads => &mut self.object_payloads,
            TreeName::BlockByHeight => &mut self.block_by_height,
            TreeName::BlockByTimestamp => &mut self.block_by_timestamp,
            TreeName::BlockFacts => &mut self.block_facts,
            TreeName::PublicKeys => &mut self.publickeys,
            TreeName::LockedByHeight => &mut self.locked_by_height,
            TreeName::LockedByTimestampBucket => &mut self.locked_by_timestamp_bucket,
        }
    }

    fn overlay(&self, tree: TreeName) -> &Overlay {
        match tree {
            TreeName::Metadata => &self.metadata,
            TreeName::ObjectEnvelopes => &self.object_envelopes,
            TreeName::ObjectPayloads => &self.object_payloads,
            TreeName::BlockByHeight => &self.block_by_height,
            TreeName::BlockByTimestamp => &self.block_by_timestamp,
            TreeName::BlockFacts => &self.block_facts,
            TreeName::PublicKeys => &self.publickeys,
            TreeName::LockedByHeight => &self.locked_by_height,
            TreeName::LockedByTimestampBucket => &self.locked_by_timestamp_bucket,
        }
    }

    pub fn insert(&mut self, tree: TreeName, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.overlay_mut(tree).insert(key.into(), value.into());
    }

    pub fn remove(&mut self, tree: TreeName, key: impl Into<Vec<u8>>) {
        self.overlay_mut(tree).remove(key.into());
    }

    /// Reads through the staged overlay first, falling back to the
    /// durable tree committed so far.
    pub fn get(&self, trees: &Trees, tree: TreeName, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(staged) = self.overlay(tree).staged(key) {
            return Ok(staged.cloned());
        }
        let durable_tree = Self::durable_tree(trees, tree);
        Ok(durable_tree.get(key)?.map(|ivec| ivec.to_vec()))
    }

    /// Keys populated in `start..=end`, unioning the durable tree with any
    /// staged overlay writes (a staged insert adds a key the durable tree
    /// doesn't have yet, a staged delete removes one it does). Used where a
    /// caller must enumerate only populated entries in a range instead of
    /// every possible key in it (see `lock_schedule::unlock`'s bucket scan,
    /// which must cost proportional to populated buckets, not to the width
    /// of the timestamp window).
    pub fn range_keys(&self, trees: &Trees, tree: TreeName, start: &[u8], end: &[u8]) -> Result<Vec<Vec<u8>>> {
        use std::collections::BTreeSet;
        let mut keys: BTreeSet<Vec<u8>> = BTreeSet::new();
        let durable_tree = Self::durable_tree(trees, tree);
        for entry in durable_tree.range(start.to_vec()..=end.to_vec()) {
            let (key, _) = entry?;
            keys.insert(key.to_vec());
        }
        for (key, value) in self.overlay(tree).0.iter() {
            if key.as_slice() < start || key.as_slice() > end {
                continue;
            }
            if value.is_some() {
                keys.insert(key.clone());
            } else {
                keys.remove(key);
            }
        }
        Ok(keys.into_iter().collect())
    }

    fn durable_tree<'a>(trees: &'a Trees, tree: TreeName) -> &'a sled::Tree {
        match tree {
            TreeName::Metadata => &trees.metadata,
            TreeName::ObjectEnvelopes => &trees.object_envelopes,
            TreeName::ObjectPayloads => &trees.object_payloads,
            TreeName::BlockByHeight => &trees.block_by_height,
            TreeName::BlockByTimestamp => &trees.block_by_timestamp,
            TreeName::BlockFacts => &trees.block_facts,
            TreeName::PublicKeys => &trees.publickeys,
            TreeName::LockedByHeight => &trees.locked_by_height,
            TreeName::LockedByTimestampBucket => &trees.locked_by_timestamp_bucket,
        }
    }

    /// Applies every staged mutation to disk, one tree at a time. Called
    /// exactly once, either at the end of a whole consensus change or at a
    /// streaming checkpoint boundary (spec.md §4.5/§4.6).
    pub fn commit(self, trees: &Trees) -> Result<()> {
        trees.metadata.apply_batch(self.metadata.into_sled_batch())?;
        trees
            .object_envelopes
            .apply_batch(self.object_envelopes.into_sled_batch())?;
        trees
            .object_payloads
            .apply_batch(self.object_payloads.into_sled_batch())?;
        trees
            .block_by_height
            .apply_batch(self.block_by_height.into_sled_batch())?;
        trees
            .block_by_timestamp
            .apply_batch(self.block_by_timestamp.into_sled_batch())?;
        trees.block_facts.apply_batch(self.block_facts.into_sled_batch())?;
        trees.publickeys.apply_batch(self.publickeys.into_sled_batch())?;
        trees
            .locked_by_height
            .apply_batch(self.locked_by_height.into_sled_batch())?;
        trees
            .locked_by_timestamp_bucket
            .apply_batch(self.locked_by_timestamp_bucket.into_sled_batch())?;
        Ok(())
    }
}
