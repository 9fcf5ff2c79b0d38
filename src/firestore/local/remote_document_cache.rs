use std::collections::BTreeMap;

use crate::firestore::local::document::MaybeDocument;
use crate::firestore::local::query::Query;
use crate::firestore::model::{DocumentKey, ResourcePath};

/// The authoritative cache of the last known remote state for each document,
/// per spec §4.1. Pure in-memory storage keyed by `DocumentKey`; the
/// `Persistence` layer decides how (or whether) this survives a restart.
#[derive(Default, Clone)]
pub struct RemoteDocumentCache {
    documents: BTreeMap<DocumentKey, MaybeDocument>,
}

impl RemoteDocumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &DocumentKey) -> Option<&MaybeDocument> {
        self.documents.get(key)
    }

    pub fn get_all(&self, keys: &[DocumentKey]) -> BTreeMap<DocumentKey, Option<MaybeDocument>> {
        keys.iter()
            .map(|key| (key.clone(), self.documents.get(key).cloned()))
            .collect()
    }

    /// Documents whose key falls directly under `collection_path`, for a
    /// collection-scoped `Query`.
    pub fn get_matching(&self, query: &Query) -> BTreeMap<DocumentKey, MaybeDocument> {
        self.documents
            .iter()
            .filter(|(_, document)| query.matches(document))
            .map(|(key, document)| (key.clone(), document.clone()))
            .collect()
    }

    fn collection_range(
        &self,
        collection_path: &ResourcePath,
    ) -> impl Iterator<Item = (&DocumentKey, &MaybeDocument)> {
        self.documents
            .iter()
            .filter(move |(key, _)| key.collection_path() == *collection_path)
    }

    /// Documents directly under `collection_path`, regardless of kind
    /// (`NoDocument`/`UnknownDocument` included) — used by `LocalDocumentsView`
    /// when it needs to see tombstones alongside live documents.
    pub fn get_all_in_collection(
        &self,
        collection_path: &ResourcePath,
    ) -> BTreeMap<DocumentKey, MaybeDocument> {
        self.collection_range(collection_path)
            .map(|(key, document)| (key.clone(), document.clone()))
            .collect()
    }

    /// Inserts or overwrites the cached remote state for `document`'s key.
    /// Callers are expected to have already checked
    /// `MaybeDocument::should_be_replaced_by` before calling this (spec
    /// §4.7.2's monotonicity rule is enforced by `LocalStore`, not here).
    pub fn add(&mut self, document: MaybeDocument) {
        self.documents.insert(document.key().clone(), document);
    }

    /// Removes any cached entry for `key`, as when a document falls out of
    /// the cache's write set via eager GC (spec §4.6).
    pub fn remove(&mut self, key: &DocumentKey) {
        self.documents.remove(key);
    }

    pub fn contains_key(&self, key: &DocumentKey) -> bool {
        self.documents.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &DocumentKey> {
        self.documents.keys()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firestore::local::document::SnapshotVersion;
    use crate::firestore::value::MapValue;
    use std::collections::BTreeMap as StdBTreeMap;

    fn doc(path: &str) -> MaybeDocument {
        MaybeDocument::Document {
            key: DocumentKey::from_string(path).unwrap(),
            version: SnapshotVersion::MIN,
            fields: MapValue::new(StdBTreeMap::new()),
            has_local_mutations: false,
        }
    }

    #[test]
    fn add_and_get_round_trip() {
        let mut cache = RemoteDocumentCache::new();
        cache.add(doc("cities/sf"));
        let key = DocumentKey::from_string("cities/sf").unwrap();
        assert!(cache.get(&key).is_some());
    }

    #[test]
    fn get_matching_scopes_to_collection() {
        let mut cache = RemoteDocumentCache::new();
        cache.add(doc("cities/sf"));
        cache.add(doc("cities/sf/neighborhoods/mission"));
        let query = Query::collection(ResourcePath::from_string("cities").unwrap());
        let matches = cache.get_matching(&query);
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn remove_drops_entry() {
        let mut cache = RemoteDocumentCache::new();
        cache.add(doc("cities/sf"));
        let key = DocumentKey::from_string("cities/sf").unwrap();
        cache.remove(&key);
        assert!(cache.get(&key).is_none());
    }
}
