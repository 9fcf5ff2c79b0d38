use std::collections::BTreeMap;

use crate::firestore::error::FirestoreResult;
use crate::firestore::local::document::MaybeDocument;
use crate::firestore::local::mutation_queue::MutationQueue;
use crate::firestore::local::overlay;
use crate::firestore::local::query::Query;
use crate::firestore::local::remote_document_cache::RemoteDocumentCache;
use crate::firestore::model::DocumentKey;

/// A pure, read-only view over `(RemoteDocumentCache, MutationQueue)` that
/// reconstructs "what the app should see right now" by layering every
/// pending mutation on top of the last known remote state (spec §4.4).
/// Holds no state of its own and never persists anything.
pub struct LocalDocumentsView<'a> {
    remote: &'a RemoteDocumentCache,
    mutations: &'a MutationQueue,
}

impl<'a> LocalDocumentsView<'a> {
    pub fn new(remote: &'a RemoteDocumentCache, mutations: &'a MutationQueue) -> Self {
        Self { remote, mutations }
    }

    /// The remote baseline for `key` with every pending mutation touching it
    /// applied, in batch-insertion order. `None` means nothing is known
    /// about the key at all (no baseline, no materializing mutation).
    pub fn get_document(&self, key: &DocumentKey) -> FirestoreResult<Option<MaybeDocument>> {
        let mut current = self.remote.get(key).cloned();
        for batch in self.mutations.all_batches_affecting_key(key) {
            for mutation in &batch.mutations {
                if mutation.key() == key {
                    current = overlay::apply_mutation(current, key, mutation)?;
                }
            }
        }
        Ok(current)
    }

    pub fn get_documents(
        &self,
        keys: &[DocumentKey],
    ) -> FirestoreResult<BTreeMap<DocumentKey, Option<MaybeDocument>>> {
        let mut result = BTreeMap::new();
        for key in keys {
            result.insert(key.clone(), self.get_document(key)?);
        }
        Ok(result)
    }

    /// The overlaid view for every key the query could possibly match: the
    /// remote cache's own matches, unioned with any key a pending mutation
    /// touches under the query's path (so a purely local create shows up
    /// before the server has ever heard of it).
    pub fn get_documents_matching_query(
        &self,
        query: &Query,
    ) -> FirestoreResult<BTreeMap<DocumentKey, Option<MaybeDocument>>> {
        let mut candidate_keys: Vec<DocumentKey> =
            self.remote.get_matching(query).into_keys().collect();

        for batch in self.mutations.all_batches_affecting_query(query) {
            for mutation in &batch.mutations {
                if !candidate_keys.contains(mutation.key()) {
                    candidate_keys.push(mutation.key().clone());
                }
            }
        }

        let mut result = BTreeMap::new();
        for key in candidate_keys {
            let document = self.get_document(&key)?;
            result.insert(key, document);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firestore::local::document::SnapshotVersion;
    use crate::firestore::local::mutation::{Mutation, Precondition};
    use crate::firestore::model::Timestamp;
    use crate::firestore::value::MapValue;
    use std::collections::BTreeMap as StdBTreeMap;

    #[test]
    fn overlays_pending_set_on_top_of_remote_baseline() {
        let mut remote = RemoteDocumentCache::new();
        let key = DocumentKey::from_string("cities/sf").unwrap();
        remote.add(MaybeDocument::Document {
            key: key.clone(),
            version: SnapshotVersion::MIN,
            fields: MapValue::new(StdBTreeMap::new()),
            has_local_mutations: false,
        });

        let mut queue = MutationQueue::new();
        let mut fields = StdBTreeMap::new();
        fields.insert(
            "name".to_string(),
            crate::firestore::value::FirestoreValue::from_string("San Francisco"),
        );
        queue.add_batch(
            Timestamp::now(),
            vec![Mutation::Set {
                key: key.clone(),
                fields: MapValue::new(fields),
                precondition: Precondition::None,
            }],
        );

        let view = LocalDocumentsView::new(&remote, &queue);
        let document = view.get_document(&key).unwrap().unwrap();
        assert!(document.has_local_mutations());
    }

    #[test]
    fn purely_local_create_is_visible_before_remote_baseline_exists() {
        let remote = RemoteDocumentCache::new();
        let mut queue = MutationQueue::new();
        let key = DocumentKey::from_string("cities/nyc").unwrap();
        queue.add_batch(
            Timestamp::now(),
            vec![Mutation::Set {
                key: key.clone(),
                fields: MapValue::new(StdBTreeMap::new()),
                precondition: Precondition::None,
            }],
        );

        let view = LocalDocumentsView::new(&remote, &queue);
        let document = view.get_document(&key).unwrap();
        assert!(document.is_some());
    }
}
