//! Per-run identity cache.
//!
//! Two structures with different meanings: the id map guarantees at most one
//! surrogate id per natural key within a run (populated the moment a row is
//! loaded or parsed), while the current-set records which records finished
//! reconciliation. A key that is registered but not current is "exists, not
//! yet verified this run" — re-entering it is what the in-flight guard
//! catches.

use std::collections::{HashMap, HashSet};

use dexsync_core::Kind;

#[derive(Debug, Default)]
pub(crate) struct IdentityCache {
    ids: HashMap<(Kind, i64), i64>,
    current: HashSet<(Kind, i64)>,
}

impl IdentityCache {
    pub(crate) fn new() -> Self {
        IdentityCache::default()
    }

    /// Surrogate id if the record finished reconciliation this run.
    pub(crate) fn current_id(&self, kind: Kind, api_id: i64) -> Option<i64> {
        if self.current.contains(&(kind, api_id)) {
            self.ids.get(&(kind, api_id)).copied()
        } else {
            None
        }
    }

    /// Surrogate id regardless of reconciliation state.
    pub(crate) fn peek(&self, kind: Kind, api_id: i64) -> Option<i64> {
        self.ids.get(&(kind, api_id)).copied()
    }

    pub(crate) fn register(&mut self, kind: Kind, api_id: i64, id: i64) {
        self.ids.insert((kind, api_id), id);
    }

    pub(crate) fn mark_current(&mut self, kind: Kind, api_id: i64) {
        self.current.insert((kind, api_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_ids_are_visible_but_not_current() {
        let mut cache = IdentityCache::new();
        cache.register(Kind::Species, 1, 500);
        assert_eq!(cache.peek(Kind::Species, 1), Some(500));
        assert_eq!(cache.current_id(Kind::Species, 1), None);
        cache.mark_current(Kind::Species, 1);
        assert_eq!(cache.current_id(Kind::Species, 1), Some(500));
    }

    #[test]
    fn keys_are_scoped_by_kind() {
        let mut cache = IdentityCache::new();
        cache.register(Kind::Species, 1, 500);
        assert_eq!(cache.peek(Kind::Pokemon, 1), None);
    }

    #[test]
    fn re_registering_keeps_one_id_per_natural_key() {
        let mut cache = IdentityCache::new();
        cache.register(Kind::Language, 9, 10);
        cache.register(Kind::Language, 9, 10);
        assert_eq!(cache.peek(Kind::Language, 9), Some(10));
    }
}
