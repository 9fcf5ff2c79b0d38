use std::collections::{BTreeMap, BTreeSet};

use crate::firestore::local::document::SnapshotVersion;
use crate::firestore::local::query::{Query, QueryData};
use crate::firestore::model::DocumentKey;

/// Persists which queries ("targets") the client has allocated and which
/// document keys currently match each of them (spec §4.3). Target ids `0`
/// and `1` are reserved; the first id handed out is `2`.
#[derive(Clone)]
pub struct TargetCache {
    next_target_id: i32,
    queries_by_canonical: BTreeMap<String, QueryData>,
    queries_by_target_id: BTreeMap<i32, String>,
    matching_keys: BTreeMap<i32, BTreeSet<DocumentKey>>,
}

impl Default for TargetCache {
    fn default() -> Self {
        Self {
            next_target_id: 2,
            queries_by_canonical: BTreeMap::new(),
            queries_by_target_id: BTreeMap::new(),
            matching_keys: BTreeMap::new(),
        }
    }
}

impl TargetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate_target_id(&mut self) -> i32 {
        let id = self.next_target_id;
        self.next_target_id += 1;
        id
    }

    pub fn add_query_data(&mut self, query_data: QueryData) {
        let canonical = canonical_key(&query_data.query);
        self.queries_by_target_id.insert(query_data.target_id, canonical.clone());
        self.queries_by_canonical.insert(canonical, query_data);
    }

    /// Replaces the stored `QueryData`, honoring the resume-token rule: an
    /// empty incoming token never clears a previously stored one.
    pub fn update_query_data(&mut self, mut query_data: QueryData) {
        if query_data.resume_token.is_empty() {
            if let Some(existing) = self.get_query_data_by_target_id(query_data.target_id) {
                query_data.resume_token = existing.resume_token.clone();
            }
        }
        self.add_query_data(query_data);
    }

    pub fn remove_query_data(&mut self, target_id: i32) -> Option<QueryData> {
        let canonical = self.queries_by_target_id.remove(&target_id)?;
        self.matching_keys.remove(&target_id);
        self.queries_by_canonical.remove(&canonical)
    }

    pub fn get_query_data(&self, query: &Query) -> Option<&QueryData> {
        self.queries_by_canonical.get(&canonical_key(query))
    }

    pub fn get_query_data_by_target_id(&self, target_id: i32) -> Option<&QueryData> {
        let canonical = self.queries_by_target_id.get(&target_id)?;
        self.queries_by_canonical.get(canonical)
    }

    pub fn add_matching_keys(&mut self, keys: impl IntoIterator<Item = DocumentKey>, target_id: i32) {
        self.matching_keys.entry(target_id).or_default().extend(keys);
    }

    pub fn remove_matching_keys(&mut self, keys: impl IntoIterator<Item = DocumentKey>, target_id: i32) {
        if let Some(existing) = self.matching_keys.get_mut(&target_id) {
            for key in keys {
                existing.remove(&key);
            }
        }
    }

    pub fn get_matching_keys_for_target_id(&self, target_id: i32) -> BTreeSet<DocumentKey> {
        self.matching_keys.get(&target_id).cloned().unwrap_or_default()
    }

    pub fn contains_key(&self, key: &DocumentKey) -> bool {
        self.matching_keys.values().any(|keys| keys.contains(key))
    }

    /// The highest `snapshotVersion` seen across all stored targets, an
    /// upper bound `LocalStore` uses to track `lastRemoteSnapshotVersion`.
    pub fn highest_snapshot_version(&self) -> SnapshotVersion {
        self.queries_by_canonical
            .values()
            .map(|data| data.snapshot_version)
            .max()
            .unwrap_or(SnapshotVersion::MIN)
    }
}

fn canonical_key(query: &Query) -> String {
    match query {
        Query::Collection { path } => format!("collection:{}", path.canonical_string()),
        Query::Document { key } => format!("document:{}", key.path().canonical_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firestore::local::query::QueryPurpose;
    use crate::firestore::model::ResourcePath;

    #[test]
    fn allocate_target_id_starts_at_two() {
        let mut cache = TargetCache::new();
        assert_eq!(cache.allocate_target_id(), 2);
        assert_eq!(cache.allocate_target_id(), 3);
    }

    #[test]
    fn empty_resume_token_never_clears_existing() {
        let mut cache = TargetCache::new();
        let query = Query::collection(ResourcePath::from_string("cities").unwrap());
        let target_id = cache.allocate_target_id();
        let mut data = QueryData::new(query.clone(), target_id, QueryPurpose::Listen, 1);
        data.resume_token = vec![1, 2, 3];
        cache.add_query_data(data);

        let stale = QueryData::new(query.clone(), target_id, QueryPurpose::Listen, 2);
        cache.update_query_data(stale);

        let stored = cache.get_query_data(&query).unwrap();
        assert_eq!(stored.resume_token, vec![1, 2, 3]);
    }

    #[test]
    fn reuses_query_data_by_canonical_query() {
        let mut cache = TargetCache::new();
        let query = Query::collection(ResourcePath::from_string("cities").unwrap());
        let target_id = cache.allocate_target_id();
        cache.add_query_data(QueryData::new(query.clone(), target_id, QueryPurpose::Listen, 1));
        assert!(cache.get_query_data(&query).is_some());
    }
}
