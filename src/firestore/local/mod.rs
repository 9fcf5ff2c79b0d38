pub mod document;
pub mod garbage_collector;
pub mod local_documents;
pub mod local_store;
pub mod mutation;
pub mod mutation_queue;
pub mod overlay;
pub mod persistence;
pub mod query;
pub mod reference_set;
pub mod remote_document_cache;
pub mod target_cache;

#[doc(inline)]
pub use document::{MaybeDocument, SnapshotVersion};
#[doc(inline)]
pub use garbage_collector::{EagerGarbageCollector, GarbageCollector, NoOpGarbageCollector};
#[doc(inline)]
pub use local_documents::LocalDocumentsView;
#[doc(inline)]
pub use local_store::{LocalStore, LocalViewChanges, LocalWriteResult, UserId};
#[doc(inline)]
pub use mutation::{
    AcknowledgedBatch, FieldTransform, Mutation, MutationBatch, MutationResult, Precondition,
    TransformOperation,
};
#[doc(inline)]
pub use mutation_queue::MutationQueue;
#[doc(inline)]
pub use persistence::{DurableMemoryPersistence, MemoryPersistence, Persistence};
#[doc(inline)]
pub use query::{Query, QueryData, QueryPurpose};
#[doc(inline)]
pub use reference_set::{local_view_pin_id, ReferenceSet, LOCAL_VIEW_PIN_ID, MUTATION_PIN_ID};
#[doc(inline)]
pub use remote_document_cache::RemoteDocumentCache;
#[doc(inline)]
pub use target_cache::TargetCache;
