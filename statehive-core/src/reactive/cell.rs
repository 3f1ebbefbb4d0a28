//! Cached computations
//!
//! A [`ComputedLayer`] holds one lazily evaluated [`ComputedCell`] per key.
//! A cell remembers the pointers its last evaluation read; the layer observes
//! the [`ReactiveRoot`](super::ReactiveRoot) and drops a cell's cached value
//! when a change touches one of them. Cells may read other cells of the same
//! layer, in which case the dependencies are merged.

use super::root::{ChangeSet, DeepObserver};
use super::tracker::{is_affected, DependencySet, Tracked};
use crate::metrics;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, trace};

/// Function evaluated by a cell
pub type ComputeFn = Arc<dyn Fn(&EvalContext<'_>) -> Value + Send + Sync>;

/// A memoized value derived from the root state
pub trait CachedComputation: Send + Sync {
    /// Current value, recomputed only if stale
    fn get(&self, ctx: &EvalContext<'_>) -> Value;

    /// Drop the cached value if `change` touches what it read
    fn invalidate(&self, change: &ChangeSet) -> bool;

    /// Whether a cached value is available
    fn is_fresh(&self) -> bool;
}

/// What a computation can see while it runs
pub struct EvalContext<'a> {
    root: &'a Value,
    layer: &'a ComputedLayer,
    deps: &'a DependencySet,
}

impl<'a> EvalContext<'a> {
    /// Tracked view of the subtree at `path`
    pub fn tracked<S: AsRef<str>>(&self, path: &[S]) -> Tracked<'a> {
        path.iter().fold(Tracked::new(Some(self.root), String::new(), self.deps), |view, key| {
            view.get(key.as_ref())
        })
    }

    /// Value of another cell in the same layer; its dependencies become ours
    pub fn computed(&self, key: &str) -> Option<Value> {
        self.layer.evaluate_into(key, self.root, Some(self.deps))
    }

    pub fn layer(&self) -> &'a ComputedLayer {
        self.layer
    }
}

struct Cached {
    value: Value,
    deps: BTreeSet<String>,
}

/// One memoized computation
pub struct ComputedCell {
    compute: ComputeFn,
    cached: Mutex<Option<Cached>>,
}

impl ComputedCell {
    pub fn new(compute: ComputeFn) -> Self {
        Self { compute, cached: Mutex::new(None) }
    }

    fn lookup(&self) -> Option<(Value, BTreeSet<String>)> {
        self.cached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|cached| (cached.value.clone(), cached.deps.clone()))
    }

    fn evaluate(&self, root: &Value, layer: &ComputedLayer) -> (Value, BTreeSet<String>) {
        if let Some(hit) = self.lookup() {
            return hit;
        }

        // the lock is not held while computing: the function may read other cells
        let deps = DependencySet::new();
        let value = (self.compute)(&EvalContext { root, layer, deps: &deps });
        let deps = deps.into_pointers();
        metrics::record_getter_recomputed();

        *self.cached.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Cached { value: value.clone(), deps: deps.clone() });
        (value, deps)
    }
}

impl CachedComputation for ComputedCell {
    fn get(&self, ctx: &EvalContext<'_>) -> Value {
        let (value, deps) = self.evaluate(ctx.root, ctx.layer);
        ctx.deps.extend(&deps);
        value
    }

    fn invalidate(&self, change: &ChangeSet) -> bool {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        let stale = cached.as_ref().map_or(false, |cached| is_affected(&cached.deps, change));
        if stale {
            *cached = None;
        }
        stale
    }

    fn is_fresh(&self) -> bool {
        self.cached.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }
}

/// A set of cells keyed by name, built once per registry snapshot
pub struct ComputedLayer {
    cells: HashMap<String, ComputedCell>,
    retired: AtomicBool,
}

impl ComputedLayer {
    pub fn new(computations: impl IntoIterator<Item = (String, ComputeFn)>) -> Self {
        let cells = computations
            .into_iter()
            .map(|(key, compute)| (key, ComputedCell::new(compute)))
            .collect();
        Self { cells, retired: AtomicBool::new(false) }
    }

    /// Evaluate `key` against `root`
    pub fn evaluate(&self, key: &str, root: &Value) -> Option<Value> {
        self.evaluate_into(key, root, None)
    }

    fn evaluate_into(&self, key: &str, root: &Value, parent: Option<&DependencySet>) -> Option<Value> {
        let cell = self.cells.get(key)?;
        let (value, deps) = cell.evaluate(root, self);
        if let Some(parent) = parent {
            parent.extend(&deps);
        }
        Some(value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.cells.contains_key(key)
    }

    /// All keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.cells.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Whether `key` currently holds a cached value
    pub fn is_fresh(&self, key: &str) -> bool {
        self.cells.get(key).map_or(false, CachedComputation::is_fresh)
    }

    /// Stop reacting to changes; called when a newer layer replaces this one
    pub fn retire(&self) {
        if !self.retired.swap(true, Ordering::SeqCst) {
            debug!(cells = self.cells.len(), "retiring computed layer");
        }
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }
}

impl DeepObserver for ComputedLayer {
    fn on_change(&self, change: &ChangeSet) {
        if self.is_retired() {
            return;
        }
        let invalidated = self.cells.values().filter(|cell| cell.invalidate(change)).count();
        if invalidated > 0 {
            trace!(invalidated, "computed cells invalidated");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: Arc<AtomicUsize>, f: impl Fn(&EvalContext<'_>) -> Value + Send + Sync + 'static) -> ComputeFn {
        Arc::new(move |ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
            f(ctx)
        })
    }

    #[test]
    fn test_cell_is_memoized_until_dependency_changes() {
        let runs = Arc::new(AtomicUsize::new(0));
        let layer = ComputedLayer::new(vec![(
            "double".to_string(),
            counting(runs.clone(), |ctx| json!(ctx.tracked(&["count"]).as_i64().unwrap_or(0) * 2)),
        )]);

        let state = json!({"count": 2, "other": 1});
        assert_eq!(layer.evaluate("double", &state), Some(json!(4)));
        assert_eq!(layer.evaluate("double", &state), Some(json!(4)));
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        layer.on_change(&ChangeSet::new(vec!["/other".to_string()]));
        assert!(layer.is_fresh("double"));

        layer.on_change(&ChangeSet::new(vec!["/count".to_string()]));
        assert!(!layer.is_fresh("double"));

        let state = json!({"count": 5, "other": 1});
        assert_eq!(layer.evaluate("double", &state), Some(json!(10)));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cell_reading_other_cell_inherits_dependencies() {
        let layer = ComputedLayer::new(vec![
            ("base".to_string(), Arc::new(|ctx: &EvalContext<'_>| ctx.tracked(&["n"]).cloned()) as ComputeFn),
            (
                "plus_one".to_string(),
                Arc::new(|ctx: &EvalContext<'_>| {
                    json!(ctx.computed("base").and_then(|v| v.as_i64()).unwrap_or(0) + 1)
                }) as ComputeFn,
            ),
        ]);

        let state = json!({"n": 1});
        assert_eq!(layer.evaluate("plus_one", &state), Some(json!(2)));

        layer.on_change(&ChangeSet::new(vec!["/n".to_string()]));
        assert!(!layer.is_fresh("plus_one"));
        assert!(!layer.is_fresh("base"));
    }

    #[test]
    fn test_unknown_key() {
        let layer = ComputedLayer::new(Vec::new());
        assert!(layer.is_empty());
        assert_eq!(layer.evaluate("missing", &json!({})), None);
    }

    #[test]
    fn test_retired_layer_ignores_changes() {
        let layer = ComputedLayer::new(vec![(
            "all".to_string(),
            Arc::new(|ctx: &EvalContext<'_>| ctx.tracked::<&str>(&[]).cloned()) as ComputeFn,
        )]);
        layer.evaluate("all", &json!({"a": 1}));
        layer.retire();
        layer.on_change(&ChangeSet::everything());
        assert!(layer.is_fresh("all"));
        assert!(layer.is_retired());
    }
}
