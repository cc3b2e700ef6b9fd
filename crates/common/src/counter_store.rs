//! Per-mount storage for counter values
//!
//! Every counter file in a mounted tree is backed by one entry in the
//! [`CounterStore`] owned by that mount's superblock. Entries are plain
//! atomic integers: `get`, `increment` and `set` are each linearizable on
//! their own and nothing spans more than one entry.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Identifier of a counter within one store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CounterId(usize);

impl CounterId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for CounterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "counter#{}", self.0)
    }
}

/// A single counter value, shareable with open handles
#[derive(Debug, Clone)]
pub struct CounterEntry {
    value: Arc<AtomicI64>,
}

impl CounterEntry {
    fn new(initial: i64) -> Self {
        Self {
            value: Arc::new(AtomicI64::new(initial)),
        }
    }

    pub fn get(&self) -> i64 {
        self.value.load(Ordering::SeqCst)
    }

    /// Advance the counter by one, wrapping at the `i64` boundary
    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::SeqCst);
    }

    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::SeqCst);
    }
}

/// Owns every counter of one mounted instance
#[derive(Debug, Default)]
pub struct CounterStore {
    entries: Vec<CounterEntry>,
}

impl CounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh entry holding `initial`
    pub fn create(&mut self, initial: i64) -> CounterId {
        let id = CounterId(self.entries.len());
        self.entries.push(CounterEntry::new(initial));
        id
    }

    /// Shared handle to an entry, used to bind open files
    pub fn entry(&self, id: CounterId) -> Option<&CounterEntry> {
        self.entries.get(id.0)
    }

    /* Store operations */

    /// Current value of `id`, or `None` if the id belongs to another store
    pub fn get(&self, id: CounterId) -> Option<i64> {
        self.entry(id).map(CounterEntry::get)
    }

    /// Returns `false` if the id is unknown
    pub fn increment(&self, id: CounterId) -> bool {
        match self.entry(id) {
            Some(entry) => {
                entry.increment();
                true
            }
            None => false,
        }
    }

    /// Returns `false` if the id is unknown
    pub fn set(&self, id: CounterId, value: i64) -> bool {
        match self.entry(id) {
            Some(entry) => {
                entry.set(value);
                true
            }
            None => false,
        }
    }

    /* Getters */

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
