use std::collections::BTreeSet;

use crate::firestore::local::document::SnapshotVersion;
use crate::firestore::model::{DocumentKey, FieldPath, Timestamp};
use crate::firestore::value::{FirestoreValue, MapValue};

/// A condition a mutation requires of the document it targets before it is
/// allowed to take effect. Represented as a tagged variant (not a nullable
/// object) so "no precondition" is distinct from `Exists(false)`.
#[derive(Clone, Debug, PartialEq)]
pub enum Precondition {
    None,
    Exists(bool),
    UpdateTime(SnapshotVersion),
}

impl Precondition {
    pub fn is_none(&self) -> bool {
        matches!(self, Precondition::None)
    }
}

/// A single field transform to apply on top of a `Set`/`Patch`'s field
/// values, evaluated against the document state the overlay has produced so
/// far (see `local::overlay`).
#[derive(Clone, Debug, PartialEq)]
pub struct FieldTransform {
    field_path: FieldPath,
    operation: TransformOperation,
}

impl FieldTransform {
    pub fn new(field_path: FieldPath, operation: TransformOperation) -> Self {
        Self {
            field_path,
            operation,
        }
    }

    pub fn field_path(&self) -> &FieldPath {
        &self.field_path
    }

    pub fn operation(&self) -> &TransformOperation {
        &self.operation
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TransformOperation {
    ServerTimestamp,
    ArrayUnion(Vec<FirestoreValue>),
    ArrayRemove(Vec<FirestoreValue>),
    NumericIncrement(FirestoreValue),
}

/// One write within a `MutationBatch`. Mirrors spec §3's `Set`/`Patch`/
/// `Delete`/`Transform` variants, each carrying its own precondition.
#[derive(Clone, Debug, PartialEq)]
pub enum Mutation {
    Set {
        key: DocumentKey,
        fields: MapValue,
        precondition: Precondition,
    },
    Patch {
        key: DocumentKey,
        field_mask: Vec<FieldPath>,
        fields: MapValue,
        precondition: Precondition,
    },
    Delete {
        key: DocumentKey,
        precondition: Precondition,
    },
    Transform {
        key: DocumentKey,
        transforms: Vec<FieldTransform>,
        precondition: Precondition,
    },
}

impl Mutation {
    pub fn key(&self) -> &DocumentKey {
        match self {
            Mutation::Set { key, .. }
            | Mutation::Patch { key, .. }
            | Mutation::Delete { key, .. }
            | Mutation::Transform { key, .. } => key,
        }
    }

    pub fn precondition(&self) -> &Precondition {
        match self {
            Mutation::Set { precondition, .. }
            | Mutation::Patch { precondition, .. }
            | Mutation::Delete { precondition, .. }
            | Mutation::Transform { precondition, .. } => precondition,
        }
    }
}

/// An ordered, atomically-queued group of mutations, issued in strictly
/// increasing `batch_id` order per user (spec §3).
#[derive(Clone, Debug, PartialEq)]
pub struct MutationBatch {
    pub batch_id: i64,
    pub local_write_time: Timestamp,
    pub mutations: Vec<Mutation>,
}

impl MutationBatch {
    pub fn new(batch_id: i64, local_write_time: Timestamp, mutations: Vec<Mutation>) -> Self {
        Self {
            batch_id,
            local_write_time,
            mutations,
        }
    }

    /// Union of every mutation's target key, per spec §3's `keys()`.
    pub fn keys(&self) -> BTreeSet<DocumentKey> {
        self.mutations.iter().map(|m| m.key().clone()).collect()
    }
}

/// What a single acknowledged mutation produced, used by `acknowledgeBatch`
/// to decide whether (and at what version) to write the remote baseline.
#[derive(Clone, Debug, PartialEq)]
pub enum MutationResult {
    /// The mutation produced no document update worth writing back (e.g. a
    /// transform whose value is only meaningful relative to the server).
    NoAckedDocument,
    Set {
        fields: MapValue,
    },
    Delete,
    /// A transform acknowledgement whose resulting fields are not known to
    /// the client (spec §3's `UnknownDocument`).
    TransformUnknown,
}

#[derive(Clone, Debug)]
pub struct AcknowledgedBatch {
    pub batch: MutationBatch,
    pub commit_version: SnapshotVersion,
    pub mutation_results: Vec<MutationResult>,
    pub stream_token: Vec<u8>,
}
