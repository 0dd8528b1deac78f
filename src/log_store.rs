//! In-memory append-only log.
//!
//! Keys are allocated contiguously by [`LogStore::add`] (primary path);
//! [`LogStore::set`] lets a follower store a primary-assigned key directly.
//! Visibility through [`LogStore::list`] depends on `ListMode` and on each
//! entry's two-phase state.

use std::collections::BTreeMap;
use std::sync::RwLock;

/// Lifecycle state of a single entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Added,
    Committed,
    RolledBack,
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub key: u64,
    pub value: String,
    pub state: EntryState,
}

impl Entry {
    fn is_committed(&self) -> bool {
        self.state == EntryState::Committed
    }

    fn is_added(&self) -> bool {
        self.state == EntryState::Added
    }
}

/// Which entries `list()` surfaces, in key order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListMode {
    /// Every entry regardless of state.
    All,
    /// Only committed entries, skipping gaps and uncommitted entries.
    AllCommitted,
    /// The longest gap-free, fully-committed prefix. Stops at the first
    /// uncommitted entry or the first gap in keys. This is the mode the
    /// external HTTP contract uses.
    #[default]
    ConsistentOrder,
}

struct Inner {
    entries: BTreeMap<u64, Entry>,
    high_water: u64,
    list_mode: ListMode,
}

/// Thread-safe keyed log. Mutations take the write lock; reads take the
/// read lock, matching the read-mostly access pattern of the rest of this
/// node (point reads and listing vastly outnumber appends and commits).
pub struct LogStore {
    inner: RwLock<Inner>,
}

impl LogStore {
    pub fn new() -> Self {
        Self::with_mode(ListMode::ConsistentOrder)
    }

    pub fn with_mode(list_mode: ListMode) -> Self {
        Self {
            inner: RwLock::new(Inner {
                entries: BTreeMap::new(),
                high_water: 0,
                list_mode,
            }),
        }
    }

    /// Allocates the next contiguous key and stores `value` as `Added`.
    /// Used exclusively by the primary.
    pub fn add(&self, value: String) -> u64 {
        let mut inner = self.inner.write().unwrap();
        let key = inner.high_water + 1;
        inner.entries.insert(
            key,
            Entry {
                key,
                value,
                state: EntryState::Added,
            },
        );
        inner.high_water = key;
        key
    }

    /// Stores `value` under a caller-supplied `key`. Returns `false`
    /// without modifying storage if `key` already exists and `override_`
    /// is false — this makes replicated delivery of the same key idempotent.
    pub fn set(&self, key: u64, value: String, commit: bool, override_: bool) -> bool {
        let mut inner = self.inner.write().unwrap();
        if inner.entries.contains_key(&key) && !override_ {
            return false;
        }
        let state = if commit {
            EntryState::Committed
        } else {
            EntryState::Added
        };
        inner.entries.insert(key, Entry { key, value, state });
        inner.high_water = inner.high_water.max(key);
        true
    }

    /// Marks `key` committed. Returns `false` if `key` is unknown.
    pub fn commit(&self, key: u64) -> bool {
        let mut inner = self.inner.write().unwrap();
        match inner.entries.get_mut(&key) {
            Some(entry) => {
                entry.state = EntryState::Committed;
                true
            }
            None => false,
        }
    }

    /// Marks `key` rolled back. Returns `false` if `key` is unknown.
    pub fn rollback(&self, key: u64) -> bool {
        let mut inner = self.inner.write().unwrap();
        match inner.entries.get_mut(&key) {
            Some(entry) => {
                entry.state = EntryState::RolledBack;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, key: u64) -> Option<String> {
        let inner = self.inner.read().unwrap();
        inner.entries.get(&key).map(|e| e.value.clone())
    }

    /// Returns the current high-water mark (highest key ever stored).
    pub fn high_water(&self) -> u64 {
        self.inner.read().unwrap().high_water
    }

    pub fn set_list_mode(&self, mode: ListMode) {
        self.inner.write().unwrap().list_mode = mode;
    }

    pub fn list_mode(&self) -> ListMode {
        self.inner.read().unwrap().list_mode
    }

    /// Returns the values visible under the current list mode, in key order.
    pub fn list(&self) -> Vec<String> {
        let inner = self.inner.read().unwrap();
        let mut values = Vec::new();
        let mut previous_key: Option<u64> = None;

        for (&key, entry) in inner.entries.iter() {
            let distance = key - previous_key.unwrap_or(key);
            previous_key = Some(key);

            if inner.list_mode == ListMode::ConsistentOrder && (entry.is_added() || distance > 1) {
                break;
            }
            if inner.list_mode == ListMode::AllCommitted && !entry.is_committed() {
                continue;
            }

            if entry.is_committed() || inner.list_mode == ListMode::All {
                values.push(entry.value.clone());
            }
        }

        values
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LogStore {
    fn default() -> Self {
        Self::new()
    }
}
