//! Dependency tracking for derived values
//!
//! A computation reads state through [`Tracked`] handles. Navigation is free;
//! materializing a value records the pointer it came from, so a later change
//! at, above, or below that pointer marks the computation stale.

use super::diff::{child_pointer, step};
use super::root::ChangeSet;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeSet;

static NULL: Value = Value::Null;

/// Pointers read by one computation
#[derive(Debug, Default)]
pub struct DependencySet {
    pointers: RefCell<BTreeSet<String>>,
}

impl DependencySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, pointer: &str) {
        self.pointers.borrow_mut().insert(pointer.to_string());
    }

    pub fn extend<'a>(&self, pointers: impl IntoIterator<Item = &'a String>) {
        self.pointers.borrow_mut().extend(pointers.into_iter().cloned());
    }

    pub fn into_pointers(self) -> BTreeSet<String> {
        self.pointers.into_inner()
    }

    pub fn len(&self) -> usize {
        self.pointers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pointers.borrow().is_empty()
    }
}

/// Whether any of `pointers` is touched by `change`
pub fn is_affected(pointers: &BTreeSet<String>, change: &ChangeSet) -> bool {
    pointers.iter().any(|pointer| change.touches(pointer))
}

/// A dependency-recording view into the state tree
#[derive(Clone)]
pub struct Tracked<'a> {
    value: Option<&'a Value>,
    pointer: String,
    deps: &'a DependencySet,
}

impl<'a> Tracked<'a> {
    pub fn new(value: Option<&'a Value>, pointer: String, deps: &'a DependencySet) -> Self {
        Self { value, pointer, deps }
    }

    /// Child by object key (or array index written as a string)
    pub fn get(&self, key: &str) -> Tracked<'a> {
        Tracked {
            value: self.value.and_then(|value| step(value, key)),
            pointer: child_pointer(&self.pointer, key),
            deps: self.deps,
        }
    }

    /// Child by array index
    pub fn index(&self, index: usize) -> Tracked<'a> {
        self.get(&index.to_string())
    }

    /// The pointer this view reads from
    pub fn pointer(&self) -> &str {
        &self.pointer
    }

    /// The value at this position, `null` if missing; records a dependency
    pub fn value(&self) -> &'a Value {
        self.deps.record(&self.pointer);
        self.value.unwrap_or(&NULL)
    }

    pub fn cloned(&self) -> Value {
        self.value().clone()
    }

    pub fn exists(&self) -> bool {
        self.deps.record(&self.pointer);
        self.value.is_some()
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.value().as_i64()
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.value().as_u64()
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.value().as_f64()
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.value().as_bool()
    }

    pub fn as_str(&self) -> Option<&'a str> {
        self.value().as_str()
    }

    /// Length of an array or object, 0 for anything else
    pub fn len(&self) -> usize {
        match self.value() {
            Value::Array(items) => items.len(),
            Value::Object(map) => map.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tracked views of every array element
    pub fn items(&self) -> Vec<Tracked<'a>> {
        // membership depends on the array itself
        let len = match self.value() {
            Value::Array(items) => items.len(),
            _ => 0,
        };
        (0..len).map(|index| self.index(index)).collect()
    }
}

impl std::fmt::Debug for Tracked<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracked")
            .field("pointer", &self.pointer)
            .field("value", &self.value)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_navigation_records_nothing() {
        let state = json!({"cart": {"items": [1, 2]}});
        let deps = DependencySet::new();
        let root = Tracked::new(Some(&state), String::new(), &deps);

        let _ = root.get("cart").get("items");
        assert!(deps.is_empty());
    }

    #[test]
    fn test_reading_records_pointer() {
        let state = json!({"cart": {"count": 3, "name": "x"}});
        let deps = DependencySet::new();
        let root = Tracked::new(Some(&state), String::new(), &deps);

        assert_eq!(root.get("cart").get("count").as_i64(), Some(3));
        let pointers = deps.into_pointers();
        assert_eq!(pointers.into_iter().collect::<Vec<_>>(), vec!["/cart/count"]);
    }

    #[test]
    fn test_missing_values_read_as_null_and_are_tracked() {
        let state = json!({});
        let deps = DependencySet::new();
        let root = Tracked::new(Some(&state), String::new(), &deps);

        let missing = root.get("later").get("field");
        assert!(missing.value().is_null());
        assert!(!missing.exists());
        assert_eq!(deps.len(), 1);
    }

    #[test]
    fn test_items_tracks_array_and_elements() {
        let state = json!({"todos": [{"done": true}, {"done": false}]});
        let deps = DependencySet::new();
        let root = Tracked::new(Some(&state), String::new(), &deps);

        let done = root
            .get("todos")
            .items()
            .iter()
            .filter(|todo| todo.get("done").as_bool() == Some(true))
            .count();
        assert_eq!(done, 1);

        let pointers = deps.into_pointers();
        assert!(pointers.contains("/todos"));
        assert!(pointers.contains("/todos/0/done"));
        assert!(pointers.contains("/todos/1/done"));
    }

    #[test]
    fn test_is_affected() {
        let pointers: BTreeSet<String> = ["/cart/count".to_string()].into_iter().collect();
        assert!(is_affected(&pointers, &ChangeSet::new(vec!["/cart".to_string()])));
        assert!(is_affected(&pointers, &ChangeSet::new(vec!["/cart/count".to_string()])));
        assert!(!is_affected(&pointers, &ChangeSet::new(vec!["/cart/name".to_string()])));
        assert!(is_affected(&pointers, &ChangeSet::everything()));
    }
}
