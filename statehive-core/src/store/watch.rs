//! Reactive watchers over state and getters

use super::getters::Getters;
use super::{Store, WeakStore};
use crate::reactive::{ChangeSet, DeepObserver};
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tracing::trace;

/// Selects the watched value from `(root state, getters)`
pub type WatchGetter = Arc<dyn Fn(&Value, &Getters) -> Value + Send + Sync>;

/// Called with `(new value, old value)`
pub type WatchCallback = Arc<dyn Fn(&Value, &Value) + Send + Sync>;

#[derive(Debug, Clone, Copy, Default)]
pub struct WatchOptions {
    /// Call the callback right away with the current value and a `null` old value
    pub immediate: bool,
}

pub(crate) struct Watcher {
    getter: WatchGetter,
    callback: WatchCallback,
    last: Mutex<Value>,
    store: WeakStore,
}

impl Watcher {
    pub(crate) fn new(store: &Store, getter: WatchGetter, callback: WatchCallback) -> Self {
        let initial = getter(&store.state(), &store.getters());
        Self { getter, callback, last: Mutex::new(initial), store: store.downgrade() }
    }

    pub(crate) fn current(&self) -> Value {
        self.last.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub(crate) fn fire_immediately(&self) {
        (self.callback)(&self.current(), &Value::Null);
    }

    /// Re-evaluate and call back if the value changed
    pub(crate) fn run(&self) {
        let Some(store) = self.store.upgrade() else {
            return;
        };
        let value = (self.getter)(&store.state(), &store.getters());

        let old = {
            let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
            if *last == value {
                return;
            }
            std::mem::replace(&mut *last, value.clone())
        };
        trace!("watched value changed");
        (self.callback)(&value, &old);
    }
}

impl DeepObserver for Watcher {
    fn on_change(&self, _change: &ChangeSet) {
        self.run();
    }
}

/// Returned by [`Store::watch`]; dropping it keeps the watcher alive
pub struct WatchHandle {
    watcher: Weak<Watcher>,
    store: WeakStore,
}

impl WatchHandle {
    pub(crate) fn new(watcher: &Arc<Watcher>, store: WeakStore) -> Self {
        Self { watcher: Arc::downgrade(watcher), store }
    }

    /// Stop watching
    pub fn unwatch(self) {
        if let (Some(watcher), Some(store)) = (self.watcher.upgrade(), self.store.upgrade()) {
            store.remove_watcher(&watcher);
        }
    }

    /// Whether the watcher is still registered
    pub fn is_active(&self) -> bool {
        self.watcher.strong_count() > 0
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle").field("active", &self.is_active()).finish()
    }
}
