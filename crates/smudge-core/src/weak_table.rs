//! Identity-keyed weak index of tracked handles.
//!
//! Entries are keyed by the address of an `Rc` allocation and hold only a
//! `Weak` to it, so the index never keeps a value alive and never owns any
//! tracking state. The weak reference keeps the allocation reserved, so an
//! address cannot be handed to a new value while its entry is still present.
//! Entries whose key has no strong references left are dead and are dropped
//! by [`WeakTable::sweep`].

use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tracing::debug;

/// A weak set of `Rc` allocations with periodic sweeping of dead entries.
pub(crate) struct WeakTable<K> {
    name: &'static str,
    entries: HashMap<usize, Weak<K>>,
    inserts_since_sweep: usize,
    sweep_interval: usize,
}

fn address<K>(key: &Rc<K>) -> usize {
    Rc::as_ptr(key) as *const () as usize
}

impl<K> WeakTable<K> {
    pub(crate) fn new(name: &'static str, sweep_interval: usize) -> Self {
        Self {
            name,
            entries: HashMap::new(),
            inserts_since_sweep: 0,
            sweep_interval: sweep_interval.max(1),
        }
    }

    pub(crate) fn set_sweep_interval(&mut self, sweep_interval: usize) {
        self.sweep_interval = sweep_interval.max(1);
    }

    pub(crate) fn contains(&self, key: &Rc<K>) -> bool {
        self.entries.contains_key(&address(key))
    }

    /// Add `key`. Returns `false` if it was already present.
    pub(crate) fn insert(&mut self, key: &Rc<K>) -> bool {
        let addr = address(key);
        if self.entries.contains_key(&addr) {
            return false;
        }
        self.note_insert();
        self.entries.insert(addr, Rc::downgrade(key));
        true
    }

    /// Remove `key`. Returns `false` if it was not present.
    pub(crate) fn remove(&mut self, key: &Rc<K>) -> bool {
        self.entries.remove(&address(key)).is_some()
    }

    /// Number of entries whose key is still alive.
    pub(crate) fn live_len(&self) -> usize {
        self.entries.values().filter(|key| key.strong_count() > 0).count()
    }

    /// Drop every entry whose key is gone. Returns the number removed.
    pub(crate) fn sweep(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, key| key.strong_count() > 0);
        self.inserts_since_sweep = 0;
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!(
                table = self.name,
                removed,
                remaining = self.entries.len(),
                "swept dead registry entries"
            );
        }
        removed
    }

    fn note_insert(&mut self) {
        self.inserts_since_sweep += 1;
        if self.inserts_since_sweep >= self.sweep_interval {
            self.sweep();
        }
    }
}
