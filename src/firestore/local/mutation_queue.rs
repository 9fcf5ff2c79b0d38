use std::collections::{BTreeMap, BTreeSet};

use crate::firestore::error::{failed_precondition, FirestoreResult};
use crate::firestore::local::mutation::MutationBatch;
use crate::firestore::local::query::Query;
use crate::firestore::model::{DocumentKey, Timestamp};

/// A per-user ordered log of locally issued, not-yet-acknowledged mutation
/// batches (spec §4.2). Batch ids are assigned in strictly increasing order,
/// so the underlying `BTreeMap` iterates in insertion order for free.
#[derive(Default)]
pub struct MutationQueue {
    next_batch_id: i64,
    batches: BTreeMap<i64, MutationBatch>,
    /// `key -> batch ids touching it`, insertion-ordered per key.
    batches_by_key: BTreeMap<DocumentKey, Vec<i64>>,
    last_stream_token: Vec<u8>,
}

impl MutationQueue {
    pub fn new() -> Self {
        Self {
            next_batch_id: 1,
            ..Default::default()
        }
    }

    pub fn add_batch(&mut self, local_write_time: Timestamp, mutations: Vec<crate::firestore::local::mutation::Mutation>) -> MutationBatch {
        let batch_id = self.next_batch_id;
        self.next_batch_id += 1;

        let batch = MutationBatch::new(batch_id, local_write_time, mutations);
        for key in batch.keys() {
            self.batches_by_key.entry(key).or_default().push(batch_id);
        }
        self.batches.insert(batch_id, batch.clone());
        batch
    }

    pub fn lookup_batch(&self, batch_id: i64) -> Option<&MutationBatch> {
        self.batches.get(&batch_id)
    }

    /// The batch with the smallest id strictly greater than `batch_id`.
    pub fn next_batch_after(&self, batch_id: i64) -> Option<&MutationBatch> {
        self.batches
            .range((std::ops::Bound::Excluded(batch_id), std::ops::Bound::Unbounded))
            .next()
            .map(|(_, batch)| batch)
    }

    /// Batches touching `key`, oldest first.
    pub fn all_batches_affecting_key(&self, key: &DocumentKey) -> Vec<&MutationBatch> {
        self.batches_by_key
            .get(key)
            .into_iter()
            .flatten()
            .filter_map(|batch_id| self.batches.get(batch_id))
            .collect()
    }

    /// Batches with at least one mutation whose key falls under `query`'s
    /// path, oldest first and de-duplicated.
    pub fn all_batches_affecting_query(&self, query: &Query) -> Vec<&MutationBatch> {
        let mut ids = BTreeSet::new();
        for (key, batch_ids) in &self.batches_by_key {
            let matches_path = match query {
                Query::Collection { path } => key.collection_path() == *path,
                Query::Document { key: doc_key } => key == doc_key,
            };
            if matches_path {
                ids.extend(batch_ids.iter().copied());
            }
        }
        ids.into_iter().filter_map(|id| self.batches.get(&id)).collect()
    }

    pub fn highest_batch_id(&self) -> Option<i64> {
        self.batches.keys().next_back().copied()
    }

    fn head_batch_id(&self) -> Option<i64> {
        self.batches.keys().next().copied()
    }

    /// Removes `batch_id` from the queue. Only the head of the queue may be
    /// removed; removing any other batch is a programmer error (spec §4.2).
    pub fn remove_batch(&mut self, batch_id: i64) -> FirestoreResult<MutationBatch> {
        if self.head_batch_id() != Some(batch_id) {
            return Err(failed_precondition(format!(
                "cannot remove mutation batch {batch_id}: it is not at the head of the queue"
            )));
        }

        let batch = self
            .batches
            .remove(&batch_id)
            .expect("head_batch_id matched an entry that must exist");

        for key in batch.keys() {
            if let Some(ids) = self.batches_by_key.get_mut(&key) {
                ids.retain(|id| *id != batch_id);
                if ids.is_empty() {
                    self.batches_by_key.remove(&key);
                }
            }
        }

        Ok(batch)
    }

    /// Removes the head batch and records the stream token issued alongside
    /// its acknowledgement, as a single queue-level operation.
    pub fn acknowledge_batch(&mut self, batch_id: i64, stream_token: Vec<u8>) -> FirestoreResult<MutationBatch> {
        let batch = self.remove_batch(batch_id)?;
        self.set_last_stream_token(stream_token);
        Ok(batch)
    }

    pub fn last_stream_token(&self) -> &[u8] {
        &self.last_stream_token
    }

    pub fn set_last_stream_token(&mut self, token: Vec<u8>) {
        self.last_stream_token = token;
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }
}
