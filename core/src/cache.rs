//! Lazily built, shared derived data.
//!
//! [`LazyCache<T>`] owns a read-write lock around an optional value. Readers
//! take the shared lock; the first caller that finds the slot empty takes the
//! exclusive lock, checks again and only then builds the value, so concurrent
//! first accesses construct it exactly once.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

/// A value computed on first access and shared afterwards.
pub struct LazyCache<T> {
    slot: RwLock<Option<Arc<T>>>,
}

impl<T> LazyCache<T> {
    /// Create an empty cache.
    pub const fn new() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }

    /// Return the cached value if it has been built.
    pub fn get(&self) -> Option<Arc<T>> {
        self.slot.read().clone()
    }

    /// Return the cached value, building it with `init` if absent.
    ///
    /// `init` runs at most once per fill, even under concurrent callers.
    pub fn get_or_init(&self, init: impl FnOnce() -> T) -> Arc<T> {
        if let Some(value) = self.slot.read().as_ref() {
            return Arc::clone(value);
        }

        let mut slot = self.slot.write();
        // Another writer may have filled the slot while we waited.
        if let Some(value) = slot.as_ref() {
            return Arc::clone(value);
        }
        let value = Arc::new(init());
        *slot = Some(Arc::clone(&value));
        value
    }

    /// Whether the value has been built.
    pub fn is_initialized(&self) -> bool {
        self.slot.read().is_some()
    }

    /// Drop the cached value so the next access rebuilds it.
    pub fn invalidate(&self) {
        *self.slot.write() = None;
    }
}

impl<T> Default for LazyCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for LazyCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyCache")
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

static_assertions::assert_impl_all!(LazyCache<Vec<i32>>: Send, Sync);
