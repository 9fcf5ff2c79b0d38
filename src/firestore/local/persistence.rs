use async_lock::Mutex;
use async_trait::async_trait;

use crate::firestore::error::FirestoreResult;

/// The persisted-layout boundary beneath `LocalStore`: a single-writer
/// transaction envelope around whatever the caller's closure does to the
/// in-memory components. `MemoryPersistence` and `DurableMemoryPersistence`
/// both serialize transactions the same way; they differ only in whether a
/// committed transaction's effects are considered durable across a
/// simulated "restart" (see `DurableMemoryPersistence::transaction_count`).
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Runs `action` with exclusive access to the store, labeled for
    /// logging/diagnostics (e.g. `"writeLocally"`, `"applyRemoteEvent"`).
    /// `action` must be infallible with respect to partial state: either it
    /// returns `Ok` and every mutation it made is committed, or it returns
    /// `Err` and the caller is responsible for having made no visible change.
    async fn run_transaction<T, F>(&self, label: &str, action: F) -> FirestoreResult<T>
    where
        F: FnOnce() -> FirestoreResult<T> + Send,
        T: Send;
}

/// Pure in-process storage: no durability across process restarts. Pairs
/// naturally with eager GC, since nothing is ever expected to survive a
/// restart to begin with.
#[derive(Default)]
pub struct MemoryPersistence {
    lock: Mutex<()>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Persistence for MemoryPersistence {
    async fn run_transaction<T, F>(&self, label: &str, action: F) -> FirestoreResult<T>
    where
        F: FnOnce() -> FirestoreResult<T> + Send,
        T: Send,
    {
        let _guard = self.lock.lock().await;
        log::debug!("running transaction {label}");
        action()
    }
}

/// Same in-memory storage shape as `MemoryPersistence`, but retains a commit
/// log (simulating a durable backend without depending on an external KV
/// crate). Pairs naturally with deferred GC: committed state is expected to
/// remain inspectable until an explicit sweep, rather than vanishing the
/// instant a reference is dropped.
#[derive(Default)]
pub struct DurableMemoryPersistence {
    lock: Mutex<()>,
    committed: std::sync::atomic::AtomicU64,
}

impl DurableMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of transactions committed since construction.
    pub fn transaction_count(&self) -> u64 {
        self.committed.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl Persistence for DurableMemoryPersistence {
    async fn run_transaction<T, F>(&self, label: &str, action: F) -> FirestoreResult<T>
    where
        F: FnOnce() -> FirestoreResult<T> + Send,
        T: Send,
    {
        let _guard = self.lock.lock().await;
        log::debug!("running durable transaction {label}");
        let result = action();
        if result.is_ok() {
            self.committed.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_persistence_runs_the_action() {
        let persistence = MemoryPersistence::new();
        let result = persistence.run_transaction("test", || Ok(42)).await.unwrap();
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn durable_persistence_counts_commits() {
        let persistence = DurableMemoryPersistence::new();
        persistence.run_transaction("a", || Ok(())).await.unwrap();
        let failure: FirestoreResult<()> = Err(crate::firestore::error::internal_error("boom"));
        let _ = persistence.run_transaction("b", || failure).await;
        assert_eq!(persistence.transaction_count(), 1);
    }
}
