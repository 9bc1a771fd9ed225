//! Shared task ids
//!
//! Live task ids are handed out as `Arc<str>` from one global pool, so the
//! live table, the graph, the output store and the event log all point at
//! the same allocation for a given id.

use std::sync::Arc;

use dashmap::DashSet;
use once_cell::sync::Lazy;

static POOL: Lazy<Interner> = Lazy::new(Interner::new);

/// Concurrent id pool
pub struct Interner {
    pool: DashSet<Arc<str>>,
}

impl Interner {
    pub fn new() -> Self {
        Self {
            pool: DashSet::new(),
        }
    }

    /// Pooled copy of `id`, added on first use
    pub fn intern(&self, id: &str) -> Arc<str> {
        if let Some(hit) = self.lookup(id) {
            return hit;
        }

        let fresh: Arc<str> = Arc::from(id);
        if self.pool.insert(Arc::clone(&fresh)) {
            fresh
        } else {
            // lost a race against another insert of the same id
            self.lookup(id).unwrap_or(fresh)
        }
    }

    /// Pooled copy of `id`, without adding it
    pub fn lookup(&self, id: &str) -> Option<Arc<str>> {
        self.pool.get(id).map(|entry| Arc::clone(entry.key()))
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

/// Intern through the global pool
#[inline]
pub fn intern(id: &str) -> Arc<str> {
    POOL.intern(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_id_shares_allocation() {
        let pool = Interner::new();
        let first = pool.intern("summarize");
        let again = pool.intern("summarize");
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn lookup_does_not_insert() {
        let pool = Interner::new();
        assert!(pool.lookup("each_0").is_none());
        assert!(pool.is_empty());

        let spawned = pool.intern("each_0");
        assert!(Arc::ptr_eq(&pool.lookup("each_0").unwrap(), &spawned));
    }

    #[test]
    fn global_pool_is_shared() {
        assert!(Arc::ptr_eq(&intern("route"), &intern("route")));
    }

    #[test]
    fn racing_threads_get_one_copy() {
        let pool = Arc::new(Interner::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || pool.intern("fanout_child"))
            })
            .collect();

        let ids: Vec<Arc<str>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ids.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(pool.len(), 1);
    }
}
