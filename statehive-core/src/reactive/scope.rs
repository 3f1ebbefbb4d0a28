//! Mutation scope marker
//!
//! A re-entrant flag that is active while a tracked mutation runs. Strict mode
//! checks it on every observed state change. The flag is kept per thread, so
//! a mutation running on one thread does not cover writes made on another.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::thread::{self, ThreadId};

/// Re-entrant "inside a mutation" marker
#[derive(Debug, Default)]
pub struct MutationScope {
    depths: Mutex<HashMap<ThreadId, usize>>,
}

impl MutationScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the scope on the current thread; it stays active until the guard is dropped
    pub fn enter(&self) -> ScopeGuard<'_> {
        let thread = thread::current().id();
        *self.lock().entry(thread).or_default() += 1;
        ScopeGuard { scope: self, thread }
    }

    /// Whether a mutation is running on the current thread
    pub fn is_active(&self) -> bool {
        self.lock().get(&thread::current().id()).is_some_and(|depth| *depth > 0)
    }

    /// Run `f` inside the scope
    pub fn with<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.enter();
        f()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ThreadId, usize>> {
        self.depths.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Keeps a [`MutationScope`] active while alive
#[must_use = "the mutation scope is exited when the guard is dropped"]
pub struct ScopeGuard<'a> {
    scope: &'a MutationScope,
    thread: ThreadId,
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        if let Entry::Occupied(mut depth) = self.scope.lock().entry(self.thread) {
            *depth.get_mut() -= 1;
            if *depth.get() == 0 {
                depth.remove();
            }
        }
    }
}
