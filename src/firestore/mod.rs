#![doc = include_str!("README.md")]
pub mod error;
pub mod local;
pub mod model;
pub mod remote;
pub mod value;

#[doc(inline)]
pub use model::{DocumentKey, FieldPath, GeoPoint, IntoFieldPath, ResourcePath, Timestamp};

#[doc(inline)]
pub use local::{
    AcknowledgedBatch, DurableMemoryPersistence, EagerGarbageCollector, FieldTransform,
    GarbageCollector, LocalDocumentsView, LocalStore, LocalViewChanges, LocalWriteResult,
    MaybeDocument, MemoryPersistence, Mutation, MutationBatch, MutationQueue, MutationResult,
    NoOpGarbageCollector, Persistence, Precondition, Query, QueryData, QueryPurpose, ReferenceSet,
    RemoteDocumentCache, SnapshotVersion, TargetCache, TransformOperation, UserId,
};

#[doc(inline)]
pub use remote::{
    DocumentChange, DocumentDelete, DocumentRemove, ExistenceFilterChange, RemoteEvent,
    TargetChange, TargetChangeState, TargetMetadataProvider, WatchChange, WatchChangeAggregator,
    WatchTargetChange,
};

#[doc(inline)]
pub use value::{ArrayValue, BytesValue, FirestoreValue, MapValue, ValueKind};

#[doc(inline)]
pub use error::{FirestoreError, FirestoreErrorCode, FirestoreResult};
