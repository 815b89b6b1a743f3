//! Keyed mutex registry
//!
//! Maps an absolute file path to a mutex so that all operations against one
//! file are serialised while operations against different files proceed in
//! parallel. Entries live for the process lifetime; contention is bounded by
//! the number of distinct files.
//!
//! ## Deadlock rule
//!
//! A handler holding two mutexes must acquire them in lexical path order.
//! [`PathLocks::with_lock_pair`] is the only way this crate hands out two
//! guards, and it sorts internally, so the rule cannot be broken through
//! this API.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Process-wide registry of per-path mutexes
#[derive(Default)]
pub struct PathLocks {
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl PathLocks {
    /// Create an empty registry
    pub fn new() -> Self {
        PathLocks {
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        self.locks
            .entry(path.to_path_buf())
            .or_default()
            .clone()
    }

    /// Run `f` while holding the mutex for `path`.
    ///
    /// The guard is released on every exit path, including panics and `?`
    /// returns inside `f`.
    pub fn with_lock<T>(&self, path: &Path, f: impl FnOnce() -> T) -> T {
        let lock = self.lock_for(path);
        let _guard = lock.lock();
        f()
    }

    /// Run `f` while holding the mutexes for both paths, acquired in
    /// lexical path order. Passing the same path twice degrades to a single
    /// acquisition.
    pub fn with_lock_pair<T>(&self, a: &Path, b: &Path, f: impl FnOnce() -> T) -> T {
        if a == b {
            return self.with_lock(a, f);
        }
        let (first, second) = if a < b { (a, b) } else { (b, a) };
        let first_lock = self.lock_for(first);
        let second_lock = self.lock_for(second);
        let _first = first_lock.lock();
        let _second = second_lock.lock();
        f()
    }

    /// Number of registered paths
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// True when no path has been locked yet
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
