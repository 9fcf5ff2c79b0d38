use std::collections::{BTreeMap, BTreeSet};

use crate::firestore::model::DocumentKey;

/// Sentinel id for the "pinned by pending mutation" reference source (spec
/// §4.5). Real target ids start at `2`, so this uses a negative value to
/// avoid ever colliding with one.
pub const MUTATION_PIN_ID: i32 = -1;

/// Base offset for "pinned by local view" reference ids. A local-view pin is
/// scoped per target (spec §4.5's third reference source is "local view
/// pins, maintained... pinned under that target's id"), but it must not
/// collide with the same target's own matching-key reference — otherwise
/// dropping the view pin would also look like dropping the target's match,
/// unreferencing a key the target still has synced (P2). `local_view_pin_id`
/// maps each positive `target_id` to a distinct negative id instead.
pub const LOCAL_VIEW_PIN_ID: i32 = -2;

/// The reference id under which `target_id`'s local-view pins are held,
/// distinct from both `target_id` itself and `MUTATION_PIN_ID`.
pub fn local_view_pin_id(target_id: i32) -> i32 {
    LOCAL_VIEW_PIN_ID - target_id
}

/// A relation `(document_key, id)` recording everything currently keeping a
/// key "alive": target listeners, pending mutations, and local-view pins. A
/// key's reference count is the number of distinct ids referencing it.
#[derive(Default, Clone)]
pub struct ReferenceSet {
    references: BTreeMap<DocumentKey, BTreeSet<i32>>,
}

impl ReferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_reference(&mut self, key: DocumentKey, id: i32) {
        self.references.entry(key).or_default().insert(id);
    }

    pub fn remove_reference(&mut self, key: &DocumentKey, id: i32) {
        if let Some(ids) = self.references.get_mut(key) {
            ids.remove(&id);
            if ids.is_empty() {
                self.references.remove(key);
            }
        }
    }

    /// Drops every reference held by `id`, e.g. when a target is released or
    /// a mutation batch is acknowledged/rejected.
    pub fn remove_references_for_id(&mut self, id: i32) {
        self.references.retain(|_, ids| {
            ids.remove(&id);
            !ids.is_empty()
        });
    }

    pub fn is_referenced(&self, key: &DocumentKey) -> bool {
        self.references.get(key).is_some_and(|ids| !ids.is_empty())
    }

    pub fn reference_count(&self, key: &DocumentKey) -> usize {
        self.references.get(key).map(BTreeSet::len).unwrap_or(0)
    }

    /// Keys held by `id`, used when removing a target/batch to know which
    /// keys must be re-checked for garbage collection.
    pub fn keys_for_id(&self, id: i32) -> BTreeSet<DocumentKey> {
        self.references
            .iter()
            .filter(|(_, ids)| ids.contains(&id))
            .map(|(key, _)| key.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(path: &str) -> DocumentKey {
        DocumentKey::from_string(path).unwrap()
    }

    #[test]
    fn reference_count_tracks_distinct_ids() {
        let mut refs = ReferenceSet::new();
        let k = key("cities/sf");
        refs.add_reference(k.clone(), 2);
        refs.add_reference(k.clone(), MUTATION_PIN_ID);
        assert_eq!(refs.reference_count(&k), 2);
        refs.remove_reference(&k, 2);
        assert!(refs.is_referenced(&k));
        refs.remove_reference(&k, MUTATION_PIN_ID);
        assert!(!refs.is_referenced(&k));
    }

    #[test]
    fn remove_references_for_id_drops_all_its_keys() {
        let mut refs = ReferenceSet::new();
        refs.add_reference(key("cities/sf"), 2);
        refs.add_reference(key("cities/la"), 2);
        refs.add_reference(key("cities/la"), MUTATION_PIN_ID);
        refs.remove_references_for_id(2);
        assert!(!refs.is_referenced(&key("cities/sf")));
        assert!(refs.is_referenced(&key("cities/la")));
    }

    #[test]
    fn local_view_pin_id_never_collides_with_its_own_target_or_the_mutation_pin() {
        for target_id in 2..10 {
            let pin_id = local_view_pin_id(target_id);
            assert_ne!(pin_id, target_id);
            assert_ne!(pin_id, MUTATION_PIN_ID);
        }
        assert_ne!(local_view_pin_id(2), local_view_pin_id(3));
    }

    #[test]
    fn releasing_a_local_view_pin_does_not_drop_the_target_reference() {
        let mut refs = ReferenceSet::new();
        let k = key("cities/sf");
        let target_id = 2;
        refs.add_reference(k.clone(), target_id);
        refs.add_reference(k.clone(), local_view_pin_id(target_id));

        refs.remove_reference(&k, local_view_pin_id(target_id));
        assert!(refs.is_referenced(&k));
        assert_eq!(refs.reference_count(&k), 1);
    }
}
