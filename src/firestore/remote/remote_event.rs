use std::collections::{BTreeMap, BTreeSet};

use crate::firestore::local::document::MaybeDocument;
use crate::firestore::model::{DocumentKey, Timestamp};

/// Aggregated result of applying a batch of watch changes, the sole input to
/// `LocalStore::applyRemoteEvent` (spec §4.7.2 / §5).
#[derive(Debug, Clone, Default)]
pub struct RemoteEvent {
    pub snapshot_version: Option<Timestamp>,
    pub target_changes: BTreeMap<i32, TargetChange>,
    pub target_resets: BTreeSet<i32>,
    pub document_updates: BTreeMap<DocumentKey, Option<MaybeDocument>>,
    pub resolved_limbo_documents: BTreeSet<DocumentKey>,
}

impl RemoteEvent {
    pub fn is_empty(&self) -> bool {
        self.target_changes.is_empty()
            && self.document_updates.is_empty()
            && self.target_resets.is_empty()
            && self.resolved_limbo_documents.is_empty()
    }
}

/// Per-target change metadata: which keys newly matched, stopped matching,
/// or were modified, plus a resume token to persist once the change is
/// committed.
#[derive(Debug, Clone, Default)]
pub struct TargetChange {
    pub resume_token: Option<Vec<u8>>,
    pub current: bool,
    pub added_documents: BTreeSet<DocumentKey>,
    pub modified_documents: BTreeSet<DocumentKey>,
    pub removed_documents: BTreeSet<DocumentKey>,
}
