//! Getter views
//!
//! [`GetterArgs`] is what a getter function receives while it is evaluated.
//! [`Getters`] and [`LocalGetters`] are read-only views handed to callers:
//! the first over the full getter registry, the second over one namespace
//! with the prefix stripped.

use super::{Store, WeakStore};
use crate::module::ModulePath;
use crate::reactive::{EvalContext, Tracked};
use serde_json::Value;

/// Arguments of a getter function
///
/// State reads through [`Tracked`] views and reads of other getters are
/// recorded, so the getter is recomputed only when one of them changes.
pub struct GetterArgs<'a> {
    ctx: &'a EvalContext<'a>,
    path: &'a ModulePath,
    namespace: &'a str,
}

impl<'a> GetterArgs<'a> {
    pub(crate) fn new(ctx: &'a EvalContext<'a>, path: &'a ModulePath, namespace: &'a str) -> Self {
        Self { ctx, path, namespace }
    }

    /// State of the module declaring the getter
    pub fn state(&self) -> Tracked<'a> {
        self.ctx.tracked(self.path.segments())
    }

    pub fn root_state(&self) -> Tracked<'a> {
        self.ctx.tracked::<&str>(&[])
    }

    /// Getter of the same namespace, by local name; `null` if absent
    pub fn getter(&self, name: &str) -> Value {
        self.ctx.computed(&format!("{}{}", self.namespace, name)).unwrap_or(Value::Null)
    }

    /// Getter by its full registered path; `null` if absent
    pub fn root_getter(&self, path: &str) -> Value {
        self.ctx.computed(path).unwrap_or(Value::Null)
    }

    /// Local names of the getters in this namespace
    pub fn getter_names(&self) -> Vec<String> {
        strip_namespace(self.ctx.layer().keys(), self.namespace)
    }

    pub fn namespace(&self) -> &str {
        self.namespace
    }

    pub fn module_path(&self) -> &ModulePath {
        self.path
    }
}

/// Read-only view over all registered getters
///
/// Always resolves against the store's current registry.
#[derive(Clone)]
pub struct Getters {
    store: Store,
}

impl Getters {
    pub(crate) fn new(store: Store) -> Self {
        Self { store }
    }

    /// Evaluate the getter registered under `path`
    pub fn get(&self, path: &str) -> Option<Value> {
        self.store.evaluate_getter(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.store.active().getters.contains(path)
    }

    /// Registered getter paths, sorted
    pub fn keys(&self) -> Vec<String> {
        self.store.active().getters.keys()
    }

    pub fn len(&self) -> usize {
        self.store.active().getters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All getters evaluated into one object
    pub fn to_value(&self) -> Value {
        self.keys()
            .into_iter()
            .filter_map(|key| self.get(&key).map(|value| (key, value)))
            .collect::<serde_json::Map<_, _>>()
            .into()
    }
}

impl std::fmt::Debug for Getters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Getters").field("keys", &self.keys()).finish()
    }
}

/// Namespace-local view over the getter registry
///
/// The key set is derived on every access, so getters registered after the
/// view was created are visible. With an empty namespace this is the full
/// registry.
#[derive(Clone)]
pub struct LocalGetters {
    store: WeakStore,
    namespace: String,
}

impl LocalGetters {
    pub(crate) fn new(store: WeakStore, namespace: String) -> Self {
        Self { store, namespace }
    }

    /// Evaluate a getter of this namespace by its local name
    pub fn get(&self, name: &str) -> Option<Value> {
        let store = self.store.upgrade()?;
        store.evaluate_getter(&format!("{}{}", self.namespace, name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.store.upgrade().map_or(false, |store| {
            store.active().getters.contains(&format!("{}{}", self.namespace, name))
        })
    }

    /// Local names, sorted
    pub fn keys(&self) -> Vec<String> {
        self.store
            .upgrade()
            .map(|store| strip_namespace(store.active().getters.keys(), &self.namespace))
            .unwrap_or_default()
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl std::fmt::Debug for LocalGetters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalGetters")
            .field("namespace", &self.namespace)
            .field("keys", &self.keys())
            .finish()
    }
}

/// Keep the paths under `namespace`, with the prefix removed
///
/// Only a full prefix match counts and the remainder must be non-empty.
pub(crate) fn strip_namespace(paths: Vec<String>, namespace: &str) -> Vec<String> {
    paths
        .into_iter()
        .filter_map(|path| {
            path.strip_prefix(namespace)
                .filter(|local| !local.is_empty())
                .map(str::to_owned)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths() -> Vec<String> {
        ["a/x", "a/b/y", "ab/z", "root"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_strip_namespace_requires_full_prefix() {
        assert_eq!(strip_namespace(paths(), "a/"), vec!["x", "b/y"]);
        assert_eq!(strip_namespace(paths(), "a/b/"), vec!["y"]);
        assert!(strip_namespace(paths(), "c/").is_empty());
    }

    #[test]
    fn test_empty_namespace_keeps_everything() {
        assert_eq!(strip_namespace(paths(), ""), paths());
    }
}
