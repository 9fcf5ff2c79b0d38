use std::collections::BTreeSet;

use crate::firestore::local::reference_set::ReferenceSet;
use crate::firestore::local::remote_document_cache::RemoteDocumentCache;
use crate::firestore::model::DocumentKey;

/// Reclaims `RemoteDocumentCache` entries no longer held by any reference
/// source. Two interchangeable regimes exist (spec §4.6); both must leave
/// the cache in the same final state, differing only in when the removal
/// happens.
pub trait GarbageCollector: Send + Sync {
    /// Called by `LocalStore` after any operation that could have dropped a
    /// key's reference count to zero, with the set of keys worth
    /// rechecking. Eager collectors remove unreferenced keys here; deferred
    /// collectors are a no-op and rely on `sweep`.
    fn collect(
        &self,
        candidate_keys: &BTreeSet<DocumentKey>,
        references: &ReferenceSet,
        cache: &mut RemoteDocumentCache,
    );

    /// Whether `releaseQuery` should delete the released target's `QueryData`
    /// outright (eager) or leave it in place for reuse (deferred).
    fn is_eager(&self) -> bool {
        false
    }
}

/// Removes unreferenced documents from the cache on every opportunity, so a
/// document vanishes from `readDocument` the moment its last reference
/// disappears.
pub struct EagerGarbageCollector;

impl GarbageCollector for EagerGarbageCollector {
    fn collect(
        &self,
        candidate_keys: &BTreeSet<DocumentKey>,
        references: &ReferenceSet,
        cache: &mut RemoteDocumentCache,
    ) {
        for key in candidate_keys {
            if !references.is_referenced(key) {
                cache.remove(key);
            }
        }
    }

    fn is_eager(&self) -> bool {
        true
    }
}

/// Never reclaims on the hot path; documents remain readable (including
/// tombstones) until an explicit `sweep` runs.
pub struct NoOpGarbageCollector;

impl GarbageCollector for NoOpGarbageCollector {
    fn collect(
        &self,
        _candidate_keys: &BTreeSet<DocumentKey>,
        _references: &ReferenceSet,
        _cache: &mut RemoteDocumentCache,
    ) {
    }
}

impl NoOpGarbageCollector {
    /// Reclaims every currently unreferenced document in the cache. Callers
    /// decide when to invoke this (e.g. on an idle timer); the spec leaves
    /// the deferred sweep's trigger unspecified.
    pub fn sweep(&self, references: &ReferenceSet, cache: &mut RemoteDocumentCache) -> usize {
        let unreferenced: Vec<DocumentKey> = cache
            .keys()
            .filter(|key| !references.is_referenced(key))
            .cloned()
            .collect();

        let removed = unreferenced.len();
        for key in unreferenced {
            cache.remove(&key);
        }
        removed
    }
}
