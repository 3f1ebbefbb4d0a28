/*
    registry.rs - Flattened handler registries

    Walks the module tree and registers every mutation, action and getter
    under its namespaced type. A registry is immutable once built; the store
    swaps in a new snapshot whenever the tree changes.
*/

use super::context::{ActionContext, LocalContext};
use super::errors::StoreError;
use super::events::StoreEvent;
use super::getters::GetterArgs;
use super::{Store, WeakStore};
use crate::module::{ActionFn, ActionFuture, GetterFn, Module, ModulePath, ModuleTree, MutationFn};
use crate::reactive::{ComputeFn, ComputedLayer, EvalContext};
use futures::future::ready;
use futures::task::noop_waker;
use futures::FutureExt;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::debug;

/// A mutation handler bound to the state of its module
#[derive(Clone)]
pub(crate) struct MutationEntry {
    pub(crate) module_path: ModulePath,
    pub(crate) handler: MutationFn,
}

/// An action handler bound to its module's local context
#[derive(Clone)]
pub(crate) struct ActionEntry {
    pub(crate) context: LocalContext,
    pub(crate) handler: ActionFn,
}

impl ActionEntry {
    /// Start the handler
    ///
    /// The handler body runs up to its first suspension point before this
    /// returns, so commits made before any await happen even if the caller
    /// drops the returned future. While an event listener is attached, a
    /// failure is also broadcast as an `ActionError` event before it reaches
    /// the caller.
    pub(crate) fn invoke(&self, store: &Store, action_type: &str, payload: Value) -> ActionFuture {
        let ctx = ActionContext::new(self.context.clone(), store.clone());
        let future = (self.handler)(ctx, payload);

        let events = store.events();
        if !events.is_attached() {
            return start(future);
        }

        let events = events.clone();
        let action_type = action_type.to_string();
        start(
            async move {
                future.await.map_err(|err| {
                    events.emit(StoreEvent::ActionError { action_type, message: format!("{err:#}") });
                    err
                })
            }
            .boxed(),
        )
    }
}

/// Poll `future` once, handing back either its result or the rest of it
///
/// Wakeups from this first poll go nowhere; whoever awaits the returned
/// future polls it again with a real waker.
fn start(mut future: ActionFuture) -> ActionFuture {
    let waker = noop_waker();
    let mut cx = Context::from_waker(&waker);
    match future.as_mut().poll(&mut cx) {
        Poll::Ready(result) => ready(result).boxed(),
        Poll::Pending => future,
    }
}

/// A getter bound to its module's path and namespace
#[derive(Clone)]
pub(crate) struct WrappedGetter {
    module_path: ModulePath,
    namespace: String,
    handler: GetterFn,
}

impl WrappedGetter {
    fn compute_fn(&self) -> ComputeFn {
        let getter = self.clone();
        Arc::new(move |ctx: &EvalContext<'_>| {
            let args = GetterArgs::new(ctx, &getter.module_path, &getter.namespace);
            (getter.handler)(&args)
        })
    }
}

#[derive(Default)]
pub(crate) struct Registry {
    mutations: HashMap<String, Vec<MutationEntry>>,
    actions: HashMap<String, Vec<ActionEntry>>,
    getters: HashMap<String, WrappedGetter>,
    namespaces: HashMap<String, LocalContext>,
    contexts: HashMap<ModulePath, LocalContext>,
}

impl Registry {
    pub(crate) fn mutations(&self, mutation_type: &str) -> Option<&[MutationEntry]> {
        self.mutations.get(mutation_type).map(Vec::as_slice)
    }

    pub(crate) fn actions(&self, action_type: &str) -> Option<&[ActionEntry]> {
        self.actions.get(action_type).map(Vec::as_slice)
    }

    pub(crate) fn has_mutation(&self, mutation_type: &str) -> bool {
        self.mutations.contains_key(mutation_type)
    }

    pub(crate) fn has_action(&self, action_type: &str) -> bool {
        self.actions.contains_key(action_type)
    }

    /// Context of the namespaced module owning `namespace`
    pub(crate) fn namespace(&self, namespace: &str) -> Option<&LocalContext> {
        self.namespaces.get(namespace)
    }

    pub(crate) fn context(&self, path: &ModulePath) -> Option<&LocalContext> {
        self.contexts.get(path)
    }

    pub(crate) fn mutation_types(&self) -> Vec<String> {
        sorted(self.mutations.keys())
    }

    pub(crate) fn action_types(&self) -> Vec<String> {
        sorted(self.actions.keys())
    }

    pub(crate) fn namespaces(&self) -> Vec<String> {
        sorted(self.namespaces.keys())
    }

    /// A fresh set of memoized cells, one per registered getter
    pub(crate) fn computed_layer(&self) -> ComputedLayer {
        ComputedLayer::new(self.getters.iter().map(|(path, getter)| (path.clone(), getter.compute_fn())))
    }
}

fn sorted<'a>(keys: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut keys: Vec<String> = keys.cloned().collect();
    keys.sort();
    keys
}

/// Builds a [`Registry`] from a module tree, collecting diagnostics
pub(crate) struct RegistryBuilder<'a> {
    tree: &'a ModuleTree,
    store: WeakStore,
    registry: Registry,
    diagnostics: Vec<StoreError>,
}

impl<'a> RegistryBuilder<'a> {
    pub(crate) fn new(tree: &'a ModuleTree, store: WeakStore) -> Self {
        Self { tree, store, registry: Registry::default(), diagnostics: Vec::new() }
    }

    /// Install every module depth-first, parents before children
    pub(crate) fn build(mut self) -> (Registry, Vec<StoreError>) {
        let tree = self.tree;
        self.install(&ModulePath::root(), tree.root());
        debug!(
            mutations = self.registry.mutations.len(),
            actions = self.registry.actions.len(),
            getters = self.registry.getters.len(),
            "registry built"
        );
        (self.registry, self.diagnostics)
    }

    fn install(&mut self, path: &ModulePath, module: &'a Module) {
        let Some(namespace) = self.tree.get_namespace(path) else {
            return;
        };

        let context = LocalContext::new(namespace.clone(), path.clone(), self.store.clone());
        if module.namespaced() {
            if self.registry.namespaces.insert(namespace.clone(), context.clone()).is_some() {
                self.diagnostics.push(StoreError::NamespaceConflict {
                    namespace: namespace.clone(),
                    module: path.to_string(),
                });
            }
        }
        self.registry.contexts.insert(path.clone(), context.clone());

        for (name, handler) in module.mutations() {
            self.registry
                .mutations
                .entry(format!("{}{}", namespace, name))
                .or_default()
                .push(MutationEntry { module_path: path.clone(), handler: handler.clone() });
        }

        for (name, action) in module.actions() {
            let (handler, root) = action.clone().into_parts();
            let action_type = if root { name.clone() } else { format!("{}{}", namespace, name) };
            self.registry
                .actions
                .entry(action_type)
                .or_default()
                .push(ActionEntry { context: context.clone(), handler });
        }

        for (name, handler) in module.getters() {
            let getter_path = format!("{}{}", namespace, name);
            if self.registry.getters.contains_key(&getter_path) {
                self.diagnostics.push(StoreError::DuplicateGetterPath(getter_path));
                continue;
            }
            self.registry.getters.insert(
                getter_path,
                WrappedGetter {
                    module_path: path.clone(),
                    namespace: namespace.clone(),
                    handler: handler.clone(),
                },
            );
        }

        for (key, child) in module.children() {
            self.install(&path.child(key.clone()), child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::RawModule;
    use serde_json::json;

    fn build(raw: &RawModule) -> (Registry, Vec<StoreError>) {
        let tree = ModuleTree::new(raw).unwrap();
        RegistryBuilder::new(&tree, WeakStore::default()).build()
    }

    #[test]
    fn test_types_are_namespaced() {
        let raw = RawModule::new()
            .mutation("reset", |_, _| {})
            .module(
                "cart",
                RawModule::new()
                    .namespaced(true)
                    .mutation("add", |_, _| {})
                    .getter("total", |_| json!(0))
                    .module("plain", RawModule::new().mutation("touch", |_, _| {})),
            );

        let (registry, diagnostics) = build(&raw);
        assert!(diagnostics.is_empty());
        assert_eq!(registry.mutation_types(), vec!["cart/add", "cart/touch", "reset"]);
        assert_eq!(registry.namespaces(), vec!["cart/"]);
        assert_eq!(
            registry.namespace("cart/").map(|context| context.path().clone()),
            Some(ModulePath::from(["cart"]))
        );
        assert!(registry.getters.contains_key("cart/total"));
    }

    #[test]
    fn test_same_type_from_two_modules_keeps_both_in_order() {
        let raw = RawModule::new()
            .mutation("inc", |_, _| {})
            .module("a", RawModule::new().mutation("inc", |_, _| {}));

        let (registry, _) = build(&raw);
        let entries = registry.mutations("inc").unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].module_path.is_root());
        assert_eq!(entries[1].module_path, ModulePath::from(["a"]));
    }

    #[test]
    fn test_root_action_escapes_namespace() {
        let raw = RawModule::new().module(
            "ns",
            RawModule::new()
                .namespaced(true)
                .root_action("global", |_, _| async { Ok(Value::Null) })
                .action_sync("local", |_, _| Ok(Value::Null)),
        );

        let (registry, _) = build(&raw);
        assert_eq!(registry.action_types(), vec!["global", "ns/local"]);
    }

    #[test]
    fn test_duplicate_getter_keeps_first() {
        let raw = RawModule::new()
            .getter("count", |_| json!("root"))
            .module("plain", RawModule::new().getter("count", |_| json!("child")));

        let (registry, diagnostics) = build(&raw);
        assert_eq!(diagnostics, vec![StoreError::DuplicateGetterPath("count".to_string())]);
        assert!(registry.getters["count"].module_path.is_root());
    }

    #[test]
    fn test_namespace_conflict_is_reported() {
        // p.ns and q.ns both resolve to "ns/"
        let raw = RawModule::new()
            .module("p", RawModule::new().module("ns", RawModule::new().namespaced(true)))
            .module("q", RawModule::new().module("ns", RawModule::new().namespaced(true)));

        let (registry, diagnostics) = build(&raw);
        assert_eq!(
            diagnostics,
            vec![StoreError::NamespaceConflict {
                namespace: "ns/".to_string(),
                module: "q.ns".to_string()
            }]
        );
        assert_eq!(
            registry.namespace("ns/").map(|context| context.path().clone()),
            Some(ModulePath::from(["q", "ns"]))
        );
    }

    #[test]
    fn test_every_module_gets_a_context() {
        let raw = RawModule::new().module("a", RawModule::new().module("b", RawModule::new().namespaced(true)));
        let (registry, _) = build(&raw);

        assert_eq!(registry.context(&ModulePath::root()).map(LocalContext::namespace), Some(""));
        assert_eq!(registry.context(&ModulePath::from(["a"])).map(LocalContext::namespace), Some(""));
        assert_eq!(registry.context(&ModulePath::from(["a", "b"])).map(LocalContext::namespace), Some("b/"));
    }
}
