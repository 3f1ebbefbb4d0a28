//! Observed root state
//!
//! `ReactiveRoot` owns the whole state tree. Every write diffs what it
//! touched and notifies the registered [`DeepObserver`]s synchronously with
//! the changed pointers, once per write.

use super::diff::{changed_pointers, lookup, lookup_mut, overlaps, pointer_of};
use serde_json::Value;
use std::sync::{Mutex, PoisonError, RwLock, Weak};
use tracing::trace;

/// The set of JSON pointers changed by one write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    pointers: Vec<String>,
}

impl ChangeSet {
    pub fn new(pointers: Vec<String>) -> Self {
        Self { pointers }
    }

    /// A change that touches everything
    pub fn everything() -> Self {
        Self { pointers: vec![String::new()] }
    }

    pub fn pointers(&self) -> &[String] {
        &self.pointers
    }

    pub fn is_empty(&self) -> bool {
        self.pointers.is_empty()
    }

    /// Whether this change touches `pointer`, an ancestor of it, or a descendant
    pub fn touches(&self, pointer: &str) -> bool {
        self.pointers.iter().any(|changed| overlaps(changed, pointer))
    }
}

/// Receives deep change notifications from a [`ReactiveRoot`]
pub trait DeepObserver: Send + Sync {
    fn on_change(&self, change: &ChangeSet);
}

/// Root of the observed state tree
pub struct ReactiveRoot {
    value: RwLock<Value>,
    observers: Mutex<Vec<Weak<dyn DeepObserver>>>,
}

impl ReactiveRoot {
    pub fn new(value: Value) -> Self {
        Self { value: RwLock::new(value), observers: Mutex::new(Vec::new()) }
    }

    /// Register an observer after the existing ones
    pub fn observe(&self, observer: Weak<dyn DeepObserver>) {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner).push(observer);
    }

    /// Register an observer ahead of the existing ones
    ///
    /// Used for cache invalidation, which has to happen before any observer
    /// that reads derived values reacts to the same change.
    pub fn observe_first(&self, observer: Weak<dyn DeepObserver>) {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner).insert(0, observer);
    }

    /// Number of live observers
    pub fn observer_count(&self) -> usize {
        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        observers.retain(|observer| observer.strong_count() > 0);
        observers.len()
    }

    /// Read the whole tree
    pub fn read<R>(&self, f: impl FnOnce(&Value) -> R) -> R {
        let guard = self.value.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Clone the subtree at `path`
    pub fn get<S: AsRef<str>>(&self, path: &[S]) -> Option<Value> {
        self.read(|root| lookup(root, path).cloned())
    }

    /// Clone the whole tree
    pub fn snapshot(&self) -> Value {
        self.read(Value::clone)
    }

    /// Mutate the whole tree and notify observers of what changed
    pub fn write<R>(&self, f: impl FnOnce(&mut Value) -> R) -> R {
        let (result, changes) = {
            let mut guard = self.value.write().unwrap_or_else(PoisonError::into_inner);
            let before = guard.clone();
            let result = f(&mut guard);

            let mut changes = Vec::new();
            changed_pointers("", &before, &guard, &mut changes);
            (result, changes)
        };

        if !changes.is_empty() {
            self.notify(&ChangeSet::new(changes));
        }
        result
    }

    /// Mutate the subtree at `path` and notify observers of what changed
    ///
    /// Returns `None` without calling `f` when `path` does not resolve.
    pub fn write_at<S: AsRef<str>, R>(
        &self,
        path: &[S],
        f: impl FnOnce(&mut Value) -> R,
    ) -> Option<R> {
        let (result, changes) = {
            let mut guard = self.value.write().unwrap_or_else(PoisonError::into_inner);
            let target = lookup_mut(&mut *guard, path)?;
            let before = target.clone();
            let result = f(target);

            let mut changes = Vec::new();
            changed_pointers(&pointer_of(path), &before, target, &mut changes);
            (result, changes)
        };

        if !changes.is_empty() {
            self.notify(&ChangeSet::new(changes));
        }
        Some(result)
    }

    /// Mutate several subtrees as one write
    ///
    /// `f` gets the whole tree under a single lock. Only the subtrees at
    /// `paths` are diffed, and observers are notified once with the combined
    /// change, so they never see a state between two parts of the write.
    pub fn write_within<S: AsRef<str>, R>(&self, paths: &[&[S]], f: impl FnOnce(&mut Value) -> R) -> R {
        let (result, changes) = {
            let mut guard = self.value.write().unwrap_or_else(PoisonError::into_inner);
            let before: Vec<(&[S], Option<Value>)> =
                paths.iter().map(|path| (*path, lookup(&guard, *path).cloned())).collect();
            let result = f(&mut guard);

            let mut changes = Vec::new();
            for (path, before) in &before {
                let path: &[S] = path;
                match (before, lookup(&guard, path)) {
                    (Some(before), Some(after)) => {
                        changed_pointers(&pointer_of(path), before, after, &mut changes)
                    }
                    (None, None) => {}
                    _ => changes.push(pointer_of(path)),
                }
            }
            changes.sort();
            changes.dedup();
            (result, changes)
        };

        if !changes.is_empty() {
            self.notify(&ChangeSet::new(changes));
        }
        result
    }

    /// Add or overwrite `key` on the object at `parent`
    ///
    /// Returns false when `parent` is missing or is not an object.
    pub fn set_property<S: AsRef<str>>(&self, parent: &[S], key: &str, value: Value) -> bool {
        self.write_at(parent, |target| match target.as_object_mut() {
            Some(map) => {
                map.insert(key.to_string(), value);
                true
            }
            None => false,
        })
        .unwrap_or(false)
    }

    /// Remove `key` from the object at `parent`, returning the removed value
    pub fn delete_property<S: AsRef<str>>(&self, parent: &[S], key: &str) -> Option<Value> {
        self.write_at(parent, |target| target.as_object_mut().and_then(|map| map.remove(key)))
            .flatten()
    }

    /// Replace the whole tree
    pub fn replace(&self, value: Value) {
        {
            let mut guard = self.value.write().unwrap_or_else(PoisonError::into_inner);
            *guard = value;
        }
        self.notify(&ChangeSet::everything());
    }

    /// Notify observers without a write, e.g. to force re-evaluation
    pub fn notify(&self, change: &ChangeSet) {
        // observers may register or drop others while reacting, so work on a copy
        let observers: Vec<_> = {
            let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
            observers.retain(|observer| observer.strong_count() > 0);
            observers.clone()
        };

        trace!(pointers = ?change.pointers(), observers = observers.len(), "state changed");
        for observer in observers.iter().filter_map(Weak::upgrade) {
            observer.on_change(change);
        }
    }
}

impl std::fmt::Debug for ReactiveRoot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactiveRoot").field("value", &self.snapshot()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Default)]
    struct Recorder {
        changes: Mutex<Vec<ChangeSet>>,
    }

    impl DeepObserver for Recorder {
        fn on_change(&self, change: &ChangeSet) {
            self.changes.lock().unwrap().push(change.clone());
        }
    }

    fn observed(root: &ReactiveRoot) -> Arc<Recorder> {
        let recorder = Arc::new(Recorder::default());
        let weak: Weak<dyn DeepObserver> = Arc::downgrade(&recorder) as Weak<dyn DeepObserver>;
        root.observe(weak);
        recorder
    }

    #[test]
    fn test_write_within_notifies_once() {
        let root = ReactiveRoot::new(json!({"a": 0, "m": {"b": 0}, "other": 1}));
        let recorder = observed(&root);

        let paths: [&[&str]; 2] = [&[], &["m"]];
        root.write_within(&paths[..], |state| {
            state["a"] = json!(1);
            state["m"]["b"] = json!(1);
        });

        let changes = recorder.changes.lock().unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].pointers(), ["/a".to_string(), "/m/b".to_string()]);
    }

    #[test]
    fn test_write_at_reports_changed_pointers() {
        let root = ReactiveRoot::new(json!({"cart": {"count": 1}, "user": {"name": "ann"}}));
        let recorder = observed(&root);

        root.write_at(&["cart"], |cart| cart["count"] = json!(2));

        let changes = recorder.changes.lock().unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].pointers(), &["/cart/count".to_string()]);
        assert_eq!(root.get(&["cart", "count"]), Some(json!(2)));
    }

    #[test]
    fn test_noop_write_does_not_notify() {
        let root = ReactiveRoot::new(json!({"a": 1}));
        let recorder = observed(&root);

        root.write_at::<&str, _>(&[], |value| value["a"] = json!(1));
        assert!(recorder.changes.lock().unwrap().is_empty());
    }

    #[test]
    fn test_write_at_missing_path() {
        let root = ReactiveRoot::new(json!({"a": 1}));
        let called = root.write_at(&["missing"], |_| ());
        assert!(called.is_none());
    }

    #[test]
    fn test_set_and_delete_property() {
        let root = ReactiveRoot::new(json!({}));
        let recorder = observed(&root);

        assert!(root.set_property::<&str>(&[], "cart", json!({"count": 0})));
        assert_eq!(root.get(&["cart"]), Some(json!({"count": 0})));

        assert_eq!(root.delete_property::<&str>(&[], "cart"), Some(json!({"count": 0})));
        assert_eq!(root.get(&["cart"]), None);

        let changes = recorder.changes.lock().unwrap();
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|change| change.touches("/cart")));
    }

    #[test]
    fn test_set_property_on_non_object() {
        let root = ReactiveRoot::new(json!({"leaf": 3}));
        assert!(!root.set_property(&["leaf"], "x", json!(1)));
    }

    #[test]
    fn test_dropped_observers_are_pruned() {
        let root = ReactiveRoot::new(json!({}));
        {
            let _recorder = observed(&root);
            assert_eq!(root.observer_count(), 1);
        }
        assert_eq!(root.observer_count(), 0);
    }

    #[test]
    fn test_observe_first_runs_before_others() {
        struct Ordered(Arc<Mutex<Vec<&'static str>>>, &'static str);
        impl DeepObserver for Ordered {
            fn on_change(&self, _change: &ChangeSet) {
                self.0.lock().unwrap().push(self.1);
            }
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let root = ReactiveRoot::new(json!({}));
        let late: Arc<dyn DeepObserver> = Arc::new(Ordered(log.clone(), "late"));
        let early: Arc<dyn DeepObserver> = Arc::new(Ordered(log.clone(), "early"));
        root.observe(Arc::downgrade(&late));
        root.observe_first(Arc::downgrade(&early));

        root.replace(json!({"x": 1}));
        assert_eq!(*log.lock().unwrap(), vec!["early", "late"]);
    }
}
