pub mod remote_event;
pub mod watch_change;
pub mod watch_change_aggregator;

pub use remote_event::{RemoteEvent, TargetChange};
pub use watch_change::{
    DocumentChange, DocumentDelete, DocumentRemove, ExistenceFilterChange, TargetChangeState,
    WatchChange, WatchTargetChange,
};
pub use watch_change_aggregator::{TargetMetadataProvider, WatchChangeAggregator};
