use crate::firestore::local::document::MaybeDocument;
use crate::firestore::local::document::SnapshotVersion;
use crate::firestore::model::{DocumentKey, ResourcePath};

/// What the local cache is being asked to keep in sync, per spec §3's
/// `Query`. Only collection-scoped queries and single-document lookups are
/// represented; richer filters/orderBy live in the query engine the
/// `LocalStore` sits underneath and are out of scope here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Query {
    Collection { path: ResourcePath },
    Document { key: DocumentKey },
}

impl Query {
    pub fn collection(path: ResourcePath) -> Self {
        Query::Collection { path }
    }

    pub fn document(key: DocumentKey) -> Self {
        Query::Document { key }
    }

    /// The resource-path prefix documents must fall under to be considered.
    pub fn path(&self) -> &ResourcePath {
        match self {
            Query::Collection { path } => path,
            Query::Document { key } => key.path(),
        }
    }

    pub fn matches(&self, document: &MaybeDocument) -> bool {
        if !document.is_document() {
            return false;
        }

        match self {
            Query::Collection { path } => document.key().collection_path() == *path,
            Query::Document { key } => document.key() == key,
        }
    }
}

/// Why a target was allocated, mirroring spec §3's `QueryData.purpose`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryPurpose {
    Listen,
    ExistenceFilterMismatch,
    LimboResolution,
}

/// Metadata the `TargetCache` persists for an active target: identity,
/// sequencing, and resume state. Spec §3/§4.3.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryData {
    pub query: Query,
    pub target_id: i32,
    pub purpose: QueryPurpose,
    pub sequence_number: u64,
    pub snapshot_version: SnapshotVersion,
    pub resume_token: Vec<u8>,
}

impl QueryData {
    pub fn new(query: Query, target_id: i32, purpose: QueryPurpose, sequence_number: u64) -> Self {
        Self {
            query,
            target_id,
            purpose,
            sequence_number,
            snapshot_version: SnapshotVersion::MIN,
            resume_token: Vec::new(),
        }
    }

    /// A copy carrying a later snapshot version/resume token, as produced by
    /// `updateQueryData` when a target observes a new remote snapshot.
    pub fn with_resume_state(&self, snapshot_version: SnapshotVersion, resume_token: Vec<u8>) -> Self {
        Self {
            snapshot_version,
            resume_token,
            ..self.clone()
        }
    }

    /// A copy with a freshly allocated sequence number, used whenever the
    /// target is touched by a query execution (spec §4.6's LRU bookkeeping).
    pub fn with_sequence_number(&self, sequence_number: u64) -> Self {
        Self {
            sequence_number,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firestore::value::MapValue;
    use std::collections::BTreeMap;

    #[test]
    fn collection_query_matches_direct_children_only() {
        let query = Query::collection(ResourcePath::from_string("cities").unwrap());
        let matching = MaybeDocument::Document {
            key: DocumentKey::from_string("cities/sf").unwrap(),
            version: SnapshotVersion::MIN,
            fields: MapValue::new(BTreeMap::new()),
            has_local_mutations: false,
        };
        let non_matching = MaybeDocument::Document {
            key: DocumentKey::from_string("cities/sf/neighborhoods/mission").unwrap(),
            version: SnapshotVersion::MIN,
            fields: MapValue::new(BTreeMap::new()),
            has_local_mutations: false,
        };

        assert!(query.matches(&matching));
        assert!(!query.matches(&non_matching));
    }

    #[test]
    fn document_query_matches_only_its_key() {
        let query = Query::document(DocumentKey::from_string("cities/sf").unwrap());
        let doc = MaybeDocument::Document {
            key: DocumentKey::from_string("cities/sf").unwrap(),
            version: SnapshotVersion::MIN,
            fields: MapValue::new(BTreeMap::new()),
            has_local_mutations: false,
        };
        assert!(query.matches(&doc));
    }

    #[test]
    fn tombstones_never_match() {
        let query = Query::collection(ResourcePath::from_string("cities").unwrap());
        let tombstone = MaybeDocument::NoDocument {
            key: DocumentKey::from_string("cities/sf").unwrap(),
            version: SnapshotVersion::MIN,
        };
        assert!(!query.matches(&tombstone));
    }
}
