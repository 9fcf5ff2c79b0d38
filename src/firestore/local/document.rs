use std::cmp::Ordering;

use crate::firestore::model::{DocumentKey, Timestamp};
use crate::firestore::value::MapValue;

/// Server-assigned version of a document. Purely local documents (never
/// acknowledged by the server) carry [`SnapshotVersion::MIN`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SnapshotVersion(Timestamp);

impl SnapshotVersion {
    pub const MIN: SnapshotVersion = SnapshotVersion(Timestamp { seconds: 0, nanos: 0 });

    pub fn new(timestamp: Timestamp) -> Self {
        Self(timestamp)
    }

    pub fn timestamp(&self) -> Timestamp {
        self.0
    }
}

impl From<Timestamp> for SnapshotVersion {
    fn from(timestamp: Timestamp) -> Self {
        Self(timestamp)
    }
}

/// The locally visible state of a document: present with fields, a tombstone,
/// or known-to-exist-but-fields-unknown (produced by some transform acks).
#[derive(Clone, Debug, PartialEq)]
pub enum MaybeDocument {
    Document {
        key: DocumentKey,
        version: SnapshotVersion,
        fields: MapValue,
        has_local_mutations: bool,
    },
    NoDocument {
        key: DocumentKey,
        version: SnapshotVersion,
    },
    UnknownDocument {
        key: DocumentKey,
        version: SnapshotVersion,
    },
}

impl MaybeDocument {
    pub fn key(&self) -> &DocumentKey {
        match self {
            MaybeDocument::Document { key, .. }
            | MaybeDocument::NoDocument { key, .. }
            | MaybeDocument::UnknownDocument { key, .. } => key,
        }
    }

    pub fn version(&self) -> SnapshotVersion {
        match self {
            MaybeDocument::Document { version, .. }
            | MaybeDocument::NoDocument { version, .. }
            | MaybeDocument::UnknownDocument { version, .. } => *version,
        }
    }

    pub fn is_document(&self) -> bool {
        matches!(self, MaybeDocument::Document { .. })
    }

    pub fn has_local_mutations(&self) -> bool {
        matches!(
            self,
            MaybeDocument::Document {
                has_local_mutations: true,
                ..
            }
        )
    }

    pub fn fields(&self) -> Option<&MapValue> {
        match self {
            MaybeDocument::Document { fields, .. } => Some(fields),
            _ => None,
        }
    }

    /// A document's kind, for the "upgrade beats same-version overwrite"
    /// ordering rule in `applyRemoteEvent` (§4.7.2).
    fn kind_rank(&self) -> u8 {
        match self {
            MaybeDocument::NoDocument { .. } => 0,
            MaybeDocument::UnknownDocument { .. } => 1,
            MaybeDocument::Document { .. } => 2,
        }
    }

    /// Whether `new` should replace `self` as the remote baseline, per the
    /// monotonicity rule in spec §4.7.2: strictly newer version, or same
    /// version upgrading a tombstone/unknown to a full document.
    pub fn should_be_replaced_by(&self, new: &MaybeDocument) -> bool {
        match new.version().cmp(&self.version()) {
            Ordering::Greater => true,
            Ordering::Equal => new.kind_rank() > self.kind_rank(),
            Ordering::Less => false,
        }
    }
}
