use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::firestore::error::{failed_precondition, FirestoreResult};
use crate::firestore::local::document::{MaybeDocument, SnapshotVersion};
use crate::firestore::local::garbage_collector::GarbageCollector;
use crate::firestore::local::local_documents::LocalDocumentsView;
use crate::firestore::local::mutation::{AcknowledgedBatch, Mutation, MutationResult};
use crate::firestore::local::mutation_queue::MutationQueue;
use crate::firestore::local::persistence::Persistence;
use crate::firestore::local::query::{Query, QueryData, QueryPurpose};
use crate::firestore::local::reference_set::{local_view_pin_id, ReferenceSet, MUTATION_PIN_ID};
use crate::firestore::local::remote_document_cache::RemoteDocumentCache;
use crate::firestore::local::target_cache::TargetCache;
use crate::firestore::model::DocumentKey;
use crate::firestore::model::Timestamp;
use crate::firestore::remote::RemoteEvent;

/// Identifies which signed-in user a `LocalStore`'s mutation queue belongs
/// to. The remote baseline, target registry, and reference set are shared
/// across users within one `LocalStore`; only the queue is per-user.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// What the UI reports about a target's locally rendered view: which keys
/// became visible and which stopped being visible, per spec §4.7's
/// `notifyLocalViewChanges`.
#[derive(Clone, Debug, Default)]
pub struct LocalViewChanges {
    pub target_id: i32,
    pub added: BTreeSet<DocumentKey>,
    pub removed: BTreeSet<DocumentKey>,
}

/// Result of `writeLocally`: the assigned batch id and the recomputed local
/// view for every key the batch touched.
#[derive(Debug, Clone)]
pub struct LocalWriteResult {
    pub batch_id: i64,
    pub changes: BTreeMap<DocumentKey, Option<MaybeDocument>>,
}

/// The public façade coordinating the remote baseline, mutation queue,
/// target registry, and reference set into one consistent local view (spec
/// §4.7). Every public operation here is one atomic transaction: either the
/// whole set of component updates lands, or (on an `Err`) none of it does.
pub struct LocalStore<P: Persistence, G: GarbageCollector> {
    persistence: Arc<P>,
    gc: Arc<G>,
    user: UserId,
    remote_documents: RemoteDocumentCache,
    mutations: MutationQueue,
    targets: TargetCache,
    references: ReferenceSet,
    last_remote_snapshot_version: SnapshotVersion,
    next_sequence_number: u64,
}

impl<P: Persistence, G: GarbageCollector> LocalStore<P, G> {
    pub fn new(persistence: Arc<P>, gc: Arc<G>, user: UserId) -> Self {
        Self {
            persistence,
            gc,
            user,
            remote_documents: RemoteDocumentCache::new(),
            mutations: MutationQueue::new(),
            targets: TargetCache::new(),
            references: ReferenceSet::new(),
            last_remote_snapshot_version: SnapshotVersion::MIN,
            next_sequence_number: 0,
        }
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    /// Rebinds the store to a different signed-in user: the remote baseline,
    /// target registry, and reference set carry over, but the new user gets
    /// a fresh, empty `MutationQueue`.
    pub fn for_user(&self, user: UserId) -> Self {
        Self {
            persistence: Arc::clone(&self.persistence),
            gc: Arc::clone(&self.gc),
            user,
            remote_documents: self.remote_documents.clone(),
            mutations: MutationQueue::new(),
            targets: self.targets.clone(),
            references: self.references.clone(),
            last_remote_snapshot_version: self.last_remote_snapshot_version,
            next_sequence_number: self.next_sequence_number,
        }
    }

    fn allocate_sequence_number(&mut self) -> u64 {
        let sequence_number = self.next_sequence_number;
        self.next_sequence_number += 1;
        sequence_number
    }

    fn recompute_view(
        &self,
        keys: &BTreeSet<DocumentKey>,
    ) -> FirestoreResult<BTreeMap<DocumentKey, Option<MaybeDocument>>> {
        let view = LocalDocumentsView::new(&self.remote_documents, &self.mutations);
        let keys: Vec<DocumentKey> = keys.iter().cloned().collect();
        view.get_documents(&keys)
    }

    pub async fn write_locally(
        &mut self,
        mutations: Vec<Mutation>,
    ) -> FirestoreResult<LocalWriteResult> {
        let persistence = Arc::clone(&self.persistence);
        persistence
            .run_transaction("writeLocally", move || self.write_locally_sync(mutations))
            .await
    }

    fn write_locally_sync(&mut self, mutations: Vec<Mutation>) -> FirestoreResult<LocalWriteResult> {
        let affected_keys: BTreeSet<DocumentKey> =
            mutations.iter().map(|m| m.key().clone()).collect();
        let batch = self.mutations.add_batch(Timestamp::now(), mutations);
        for key in &affected_keys {
            self.references.add_reference(key.clone(), MUTATION_PIN_ID);
        }
        let changes = self.recompute_view(&affected_keys)?;
        Ok(LocalWriteResult {
            batch_id: batch.batch_id,
            changes,
        })
    }

    pub async fn apply_remote_event(
        &mut self,
        event: RemoteEvent,
    ) -> FirestoreResult<BTreeMap<DocumentKey, Option<MaybeDocument>>> {
        let persistence = Arc::clone(&self.persistence);
        persistence
            .run_transaction("applyRemoteEvent", move || {
                self.apply_remote_event_sync(event)
            })
            .await
    }

    fn apply_remote_event_sync(
        &mut self,
        event: RemoteEvent,
    ) -> FirestoreResult<BTreeMap<DocumentKey, Option<MaybeDocument>>> {
        for (target_id, change) in &event.target_changes {
            let existing = match self.targets.get_query_data_by_target_id(*target_id) {
                Some(data) => data.clone(),
                None => continue,
            };

            let mut resume_token = existing.resume_token.clone();
            if let Some(token) = &change.resume_token {
                if !token.is_empty() {
                    resume_token = token.clone();
                }
            }
            let snapshot_version = match event.snapshot_version {
                Some(timestamp) => {
                    let candidate = SnapshotVersion::from(timestamp);
                    if candidate > existing.snapshot_version {
                        candidate
                    } else {
                        existing.snapshot_version
                    }
                }
                None => existing.snapshot_version,
            };
            self.targets
                .update_query_data(existing.with_resume_state(snapshot_version, resume_token));

            self.targets
                .add_matching_keys(change.added_documents.iter().cloned(), *target_id);
            for key in &change.added_documents {
                self.references.add_reference(key.clone(), *target_id);
            }
            self.targets
                .remove_matching_keys(change.removed_documents.iter().cloned(), *target_id);
            for key in &change.removed_documents {
                self.references.remove_reference(key, *target_id);
            }
        }

        let known_targets_present = !event.target_changes.is_empty();
        let mut changed_keys = BTreeSet::new();

        for (key, update) in &event.document_updates {
            if known_targets_present {
                let referenced_by_known_target = event.target_changes.iter().any(|(target_id, change)| {
                    self.targets.get_query_data_by_target_id(*target_id).is_some()
                        && (change.added_documents.contains(key) || change.modified_documents.contains(key))
                });
                if !referenced_by_known_target {
                    continue;
                }
            }

            let Some(new_document) = update else {
                continue;
            };

            let existing = self.remote_documents.get(key).cloned();
            let should_apply = match &existing {
                None => true,
                Some(existing_document) => existing_document.should_be_replaced_by(new_document),
            };
            if should_apply {
                self.remote_documents.add(new_document.clone());
                changed_keys.insert(key.clone());
            }
        }

        if let Some(timestamp) = event.snapshot_version {
            let candidate = SnapshotVersion::from(timestamp);
            if candidate > self.last_remote_snapshot_version {
                self.last_remote_snapshot_version = candidate;
            }
        }

        let changes = self.recompute_view(&changed_keys)?;

        let mut gc_candidates = BTreeSet::new();
        for change in event.target_changes.values() {
            gc_candidates.extend(change.removed_documents.iter().cloned());
        }
        self.gc
            .collect(&gc_candidates, &self.references, &mut self.remote_documents);

        Ok(changes)
    }

    pub async fn acknowledge_batch(
        &mut self,
        result: AcknowledgedBatch,
    ) -> FirestoreResult<BTreeMap<DocumentKey, Option<MaybeDocument>>> {
        let persistence = Arc::clone(&self.persistence);
        persistence
            .run_transaction("acknowledgeBatch", move || self.acknowledge_batch_sync(result))
            .await
    }

    fn acknowledge_batch_sync(
        &mut self,
        result: AcknowledgedBatch,
    ) -> FirestoreResult<BTreeMap<DocumentKey, Option<MaybeDocument>>> {
        let AcknowledgedBatch {
            batch,
            commit_version,
            mutation_results,
            stream_token,
        } = result;

        self.mutations.acknowledge_batch(batch.batch_id, stream_token)?;

        for (mutation, mutation_result) in batch.mutations.iter().zip(mutation_results.iter()) {
            let key = mutation.key();
            let existing_version = self.remote_documents.get(key).map(|document| document.version());

            // No existing entry: always write. Otherwise only a strictly
            // newer remote event should have pre-empted this ack; a tie (e.g.
            // a v0 ack with no prior baseline) must still land.
            if let Some(existing_version) = existing_version {
                if commit_version < existing_version {
                    continue;
                }
            }

            match mutation_result {
                MutationResult::Set { fields } => {
                    self.remote_documents.add(MaybeDocument::Document {
                        key: key.clone(),
                        version: commit_version,
                        fields: fields.clone(),
                        has_local_mutations: false,
                    });
                }
                MutationResult::Delete => {
                    self.remote_documents.add(MaybeDocument::NoDocument {
                        key: key.clone(),
                        version: commit_version,
                    });
                }
                MutationResult::TransformUnknown => {
                    self.remote_documents.add(MaybeDocument::UnknownDocument {
                        key: key.clone(),
                        version: commit_version,
                    });
                }
                MutationResult::NoAckedDocument => {}
            }
        }

        let keys = batch.keys();
        for key in &keys {
            self.references.remove_reference(key, MUTATION_PIN_ID);
        }

        let changes = self.recompute_view(&keys)?;
        self.gc.collect(&keys, &self.references, &mut self.remote_documents);
        Ok(changes)
    }

    pub async fn reject_batch(
        &mut self,
        batch_id: i64,
    ) -> FirestoreResult<BTreeMap<DocumentKey, Option<MaybeDocument>>> {
        let persistence = Arc::clone(&self.persistence);
        persistence
            .run_transaction("rejectBatch", move || self.reject_batch_sync(batch_id))
            .await
    }

    fn reject_batch_sync(
        &mut self,
        batch_id: i64,
    ) -> FirestoreResult<BTreeMap<DocumentKey, Option<MaybeDocument>>> {
        let batch = self.mutations.remove_batch(batch_id)?;
        let keys = batch.keys();
        for key in &keys {
            self.references.remove_reference(key, MUTATION_PIN_ID);
        }
        let changes = self.recompute_view(&keys)?;
        self.gc.collect(&keys, &self.references, &mut self.remote_documents);
        Ok(changes)
    }

    pub async fn allocate_query(&mut self, query: Query) -> FirestoreResult<QueryData> {
        let persistence = Arc::clone(&self.persistence);
        persistence
            .run_transaction("allocateQuery", move || self.allocate_query_sync(query))
            .await
    }

    fn allocate_query_sync(&mut self, query: Query) -> FirestoreResult<QueryData> {
        if let Some(existing) = self.targets.get_query_data(&query) {
            return Ok(existing.clone());
        }
        let target_id = self.targets.allocate_target_id();
        let sequence_number = self.allocate_sequence_number();
        let data = QueryData::new(query, target_id, QueryPurpose::Listen, sequence_number);
        self.targets.add_query_data(data.clone());
        Ok(data)
    }

    pub async fn release_query(&mut self, query: Query) -> FirestoreResult<()> {
        let persistence = Arc::clone(&self.persistence);
        persistence
            .run_transaction("releaseQuery", move || self.release_query_sync(query))
            .await
    }

    fn release_query_sync(&mut self, query: Query) -> FirestoreResult<()> {
        let data = self
            .targets
            .get_query_data(&query)
            .cloned()
            .ok_or_else(|| failed_precondition("cannot release a query that was never allocated"))?;
        let target_id = data.target_id;

        let matching_keys = self.targets.get_matching_keys_for_target_id(target_id);
        self.targets
            .remove_matching_keys(matching_keys.iter().cloned(), target_id);
        self.references.remove_references_for_id(target_id);
        self.references
            .remove_references_for_id(local_view_pin_id(target_id));

        if self.gc.is_eager() {
            self.targets.remove_query_data(target_id);
        }

        self.gc
            .collect(&matching_keys, &self.references, &mut self.remote_documents);
        Ok(())
    }

    pub async fn execute_query(
        &self,
        query: Query,
    ) -> FirestoreResult<BTreeMap<DocumentKey, MaybeDocument>> {
        let persistence = Arc::clone(&self.persistence);
        persistence
            .run_transaction("executeQuery", move || self.execute_query_sync(&query))
            .await
    }

    fn execute_query_sync(&self, query: &Query) -> FirestoreResult<BTreeMap<DocumentKey, MaybeDocument>> {
        let view = LocalDocumentsView::new(&self.remote_documents, &self.mutations);
        let overlaid = view.get_documents_matching_query(query)?;
        Ok(overlaid
            .into_iter()
            .filter_map(|(key, maybe_document)| match maybe_document {
                Some(document @ MaybeDocument::Document { .. }) => Some((key, document)),
                _ => None,
            })
            .collect())
    }

    pub async fn notify_local_view_changes(
        &mut self,
        changes: Vec<LocalViewChanges>,
    ) -> FirestoreResult<()> {
        let persistence = Arc::clone(&self.persistence);
        persistence
            .run_transaction("notifyLocalViewChanges", move || {
                self.notify_local_view_changes_sync(changes)
            })
            .await
    }

    fn notify_local_view_changes_sync(&mut self, changes: Vec<LocalViewChanges>) -> FirestoreResult<()> {
        let mut gc_candidates = BTreeSet::new();
        for change in changes {
            let pin_id = local_view_pin_id(change.target_id);
            for key in &change.added {
                self.references.add_reference(key.clone(), pin_id);
            }
            for key in &change.removed {
                self.references.remove_reference(key, pin_id);
                gc_candidates.insert(key.clone());
            }
        }
        self.gc
            .collect(&gc_candidates, &self.references, &mut self.remote_documents);
        Ok(())
    }

    pub async fn read_document(&self, key: DocumentKey) -> FirestoreResult<Option<MaybeDocument>> {
        let persistence = Arc::clone(&self.persistence);
        persistence
            .run_transaction("readDocument", move || {
                LocalDocumentsView::new(&self.remote_documents, &self.mutations).get_document(&key)
            })
            .await
    }

    pub async fn get_remote_document_keys(
        &self,
        target_id: i32,
    ) -> FirestoreResult<BTreeSet<DocumentKey>> {
        let persistence = Arc::clone(&self.persistence);
        persistence
            .run_transaction("getRemoteDocumentKeys", move || {
                Ok(self.targets.get_matching_keys_for_target_id(target_id))
            })
            .await
    }
}
