/*
    store - The state container

    Owns the module tree, the reactive state root and the active registry
    snapshot. Commits run mutation handlers inside the mutation scope and
    then notify subscribers; dispatches start action handlers and hand back
    a future that resolves once all of them finish.

    The active snapshot (registries + computed getter layer) is replaced as a
    whole whenever modules are registered, unregistered or hot-updated, so a
    reader sees either the old or the new registries, never a mix.
*/

pub mod context;
pub(crate) mod diagnostics;
pub mod errors;
pub mod events;
pub mod getters;
pub mod helpers;
pub(crate) mod registry;
pub mod subscribers;
pub mod watch;

pub use context::{ActionContext, LocalContext};
pub use errors::{StoreError, StoreResult};
pub use events::{EventBroadcaster, StoreEvent};
pub use getters::{GetterArgs, Getters, LocalGetters};
pub use helpers::{normalize_namespace, NamespacedHelpers};
pub use subscribers::{ActionRecord, ActionSubscriber, MutationRecord, MutationSubscriber, Subscription};
pub use watch::{WatchCallback, WatchGetter, WatchHandle, WatchOptions};

use crate::config::StoreConfig;
use crate::metrics;
use crate::module::{ActionFuture, ModulePath, ModuleTree, RawModule};
use crate::reactive::diff::lookup_mut;
use crate::reactive::{ChangeSet, ComputedLayer, DeepObserver, MutationScope, ReactiveRoot};
use diagnostics::Diagnostics;
use futures::future::{try_join_all, FutureExt};
use registry::{Registry, RegistryBuilder};
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use subscribers::SubscriberList;
use tracing::{debug, error, info, warn};
use watch::Watcher;

/// Called once with the new store, after construction
pub type Plugin = Arc<dyn Fn(&Store) + Send + Sync>;

#[derive(Clone, Default)]
pub struct StoreOptions {
    pub config: StoreConfig,
    plugins: Vec<Plugin>,
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.config.strict = strict;
        self
    }

    pub fn plugin<F>(mut self, plugin: F) -> Self
    where
        F: Fn(&Store) + Send + Sync + 'static,
    {
        self.plugins.push(Arc::new(plugin));
        self
    }
}

impl std::fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreOptions")
            .field("config", &self.config)
            .field("plugins", &self.plugins.len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CommitOptions {
    /// From a local context: commit the bare type at the root
    pub root: bool,
    /// Accepted for compatibility; only logs a warning
    pub silent: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchOptions {
    /// From a local context: dispatch the bare type at the root
    pub root: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RegisterOptions {
    /// Keep whatever state already sits at the module's path
    pub preserve_state: bool,
}

/// One registry generation and its memoized getters
pub(crate) struct Snapshot {
    pub(crate) registry: Registry,
    pub(crate) getters: Arc<ComputedLayer>,
}

impl Snapshot {
    fn empty() -> Self {
        Self { registry: Registry::default(), getters: Arc::new(ComputedLayer::new(Vec::new())) }
    }
}

/// Panics on state changes made outside a mutation handler
struct StrictModeGuard {
    scope: Arc<MutationScope>,
}

impl DeepObserver for StrictModeGuard {
    fn on_change(&self, change: &ChangeSet) {
        if self.scope.is_active() {
            return;
        }
        let err = StoreError::StrictModeViolation { pointers: change.pointers().to_vec() };
        error!(error = %err, "strict mode violation");
        panic!("{}", err);
    }
}

pub(crate) struct StoreInner {
    config: StoreConfig,
    modules: RwLock<ModuleTree>,
    state: ReactiveRoot,
    scope: Arc<MutationScope>,
    active: RwLock<Arc<Snapshot>>,
    subscribers: SubscriberList<MutationRecord>,
    action_subscribers: SubscriberList<ActionRecord>,
    watchers: Mutex<Vec<Arc<Watcher>>>,
    // observed weakly by the state root
    strict_guard: Option<Arc<StrictModeGuard>>,
    diagnostics: Diagnostics,
    events: EventBroadcaster,
}

/// Non-owning store handle held by local contexts and watchers
#[derive(Clone, Default)]
pub(crate) struct WeakStore(Weak<StoreInner>);

impl WeakStore {
    pub(crate) fn upgrade(&self) -> Option<Store> {
        self.0.upgrade().map(|inner| Store { inner })
    }
}

/// The state container; cheap to clone, clones share everything
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Build a store with default options
    pub fn new(raw: RawModule) -> StoreResult<Self> {
        Self::with_options(raw, StoreOptions::default())
    }

    pub fn with_options(raw: RawModule, options: StoreOptions) -> StoreResult<Self> {
        let StoreOptions { config, plugins } = options;
        let tree = ModuleTree::new(&raw)?;
        let state = ReactiveRoot::new(tree.root().compose_state());
        let scope = Arc::new(MutationScope::new());

        let strict_guard = config.strict.then(|| Arc::new(StrictModeGuard { scope: scope.clone() }));
        if let Some(guard) = &strict_guard {
            state.observe(Arc::downgrade(guard) as Weak<dyn DeepObserver>);
        }

        let store = Store {
            inner: Arc::new(StoreInner {
                modules: RwLock::new(tree),
                state,
                scope,
                active: RwLock::new(Arc::new(Snapshot::empty())),
                subscribers: SubscriberList::new(),
                action_subscribers: SubscriberList::new(),
                watchers: Mutex::new(Vec::new()),
                strict_guard,
                diagnostics: Diagnostics::new(config.diagnostics_capacity),
                events: EventBroadcaster::new(config.event_capacity),
                config,
            }),
        };
        store.reset_store();

        for plugin in &plugins {
            plugin(&store);
        }

        info!(strict = store.inner.config.strict, plugins = plugins.len(), "store created");
        store.inner.events.emit_with(|| StoreEvent::Init { state: store.state() });
        Ok(store)
    }

    pub(crate) fn downgrade(&self) -> WeakStore {
        WeakStore(Arc::downgrade(&self.inner))
    }

    pub(crate) fn active(&self) -> Arc<Snapshot> {
        self.inner.active.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub(crate) fn report(&self, err: StoreError) -> StoreError {
        self.inner.diagnostics.report(err)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn is_strict(&self) -> bool {
        self.inner.strict_guard.is_some()
    }

    /// Snapshot of the root state
    pub fn state(&self) -> Value {
        self.inner.state.snapshot()
    }

    /// Snapshot of the state at `path`
    pub fn module_state(&self, path: &ModulePath) -> Option<Value> {
        self.inner.state.get(path.segments())
    }

    /// Replace the whole root state, inside the mutation scope
    pub fn replace_state(&self, state: Value) {
        self.inner.scope.with(|| self.inner.state.replace(state));
        debug!("root state replaced");
        self.inner.events.emit_with(|| StoreEvent::StateReplaced);
    }

    /// Write to the state outside any mutation
    ///
    /// Observers are notified as for a commit; in strict mode this panics.
    pub fn with_state_mut<R>(&self, f: impl FnOnce(&mut Value) -> R) -> R {
        self.inner.state.write(f)
    }

    pub fn commit(&self, mutation_type: &str, payload: Value) -> StoreResult<()> {
        self.commit_with_options(mutation_type, payload, CommitOptions::default())
    }

    /// Run every handler registered under `mutation_type`, then notify subscribers
    pub fn commit_with_options(&self, mutation_type: &str, payload: Value, options: CommitOptions) -> StoreResult<()> {
        let snapshot = self.active();
        let Some(entries) = snapshot.registry.mutations(mutation_type) else {
            return Err(self.report(StoreError::UnknownMutationType(mutation_type.to_string())));
        };

        // all handlers form one state transition, observed once
        let paths: Vec<&[String]> = entries.iter().map(|entry| entry.module_path.segments()).collect();
        let missing: Vec<&ModulePath> = {
            let _scope = self.inner.scope.enter();
            self.inner.state.write_within(&paths, |root| {
                entries
                    .iter()
                    .filter_map(|entry| match lookup_mut(root, entry.module_path.segments()) {
                        Some(local) => {
                            (entry.handler)(local, &payload);
                            None
                        }
                        None => Some(&entry.module_path),
                    })
                    .collect()
            })
        };
        for path in missing {
            self.report(StoreError::StateNotFound(path.to_string()));
        }
        metrics::record_mutation_committed();
        debug!(mutation = mutation_type, handlers = entries.len(), "mutation committed");

        let record = MutationRecord { mutation_type: mutation_type.to_string(), payload };
        self.notify_mutation(&record);

        if options.silent {
            warn!(mutation = mutation_type, "the silent option has been removed and has no effect");
        }
        Ok(())
    }

    /// Commit an object carrying its type in a `type` field; the object is the payload
    pub fn commit_object(&self, mutation: Value, options: CommitOptions) -> StoreResult<()> {
        let mutation_type = type_field(&mutation)
            .ok_or_else(|| StoreError::InvalidMutationType(mutation.to_string()))?;
        self.commit_with_options(&mutation_type, mutation, options)
    }

    fn notify_mutation(&self, record: &MutationRecord) {
        let attached = self.inner.events.is_attached();
        if self.inner.subscribers.is_empty() && !attached {
            return;
        }
        let state = self.state();
        self.inner.subscribers.notify(record, &state);
        if attached {
            self.inner.events.emit(StoreEvent::Mutation { mutation: record.clone(), state });
        }
    }

    /// Start every handler registered under `action_type`
    ///
    /// Action subscribers are notified before any handler runs. Handlers
    /// start in registration order before this returns, each running up to
    /// its first await; the future only drives the rest. One handler
    /// resolves to its own result; several resolve to an array of results
    /// in registration order, failing with the first error.
    pub fn dispatch(&self, action_type: &str, payload: Value) -> StoreResult<ActionFuture> {
        let snapshot = self.active();
        let Some(entries) = snapshot.registry.actions(action_type) else {
            return Err(self.report(StoreError::UnknownActionType(action_type.to_string())));
        };

        let record = ActionRecord { action_type: action_type.to_string(), payload };
        if !self.inner.action_subscribers.is_empty() {
            self.inner.action_subscribers.notify(&record, &self.state());
        }
        metrics::record_action_dispatched();
        debug!(action = action_type, handlers = entries.len(), "action dispatched");

        let futures: Vec<ActionFuture> = entries
            .iter()
            .map(|entry| entry.invoke(self, action_type, record.payload.clone()))
            .collect();

        Ok(match <[ActionFuture; 1]>::try_from(futures) {
            Ok([single]) => single,
            Err(futures) => async move { try_join_all(futures).await.map(Value::Array) }.boxed(),
        })
    }

    /// Dispatch an object carrying its type in a `type` field; the object is the payload
    pub fn dispatch_object(&self, action: Value) -> StoreResult<ActionFuture> {
        let action_type =
            type_field(&action).ok_or_else(|| StoreError::InvalidActionType(action.to_string()))?;
        self.dispatch(&action_type, action)
    }

    /// Observe every committed mutation
    pub fn subscribe<F>(&self, subscriber: F) -> Subscription
    where
        F: Fn(&MutationRecord, &Value) + Send + Sync + 'static,
    {
        self.subscribe_arc(Arc::new(subscriber))
    }

    /// Observe mutations; subscribing the same `Arc` twice registers it once
    pub fn subscribe_arc(&self, subscriber: MutationSubscriber) -> Subscription {
        self.inner.subscribers.subscribe(subscriber)
    }

    /// Observe every dispatched action, before its handlers run
    pub fn subscribe_action<F>(&self, subscriber: F) -> Subscription
    where
        F: Fn(&ActionRecord, &Value) + Send + Sync + 'static,
    {
        self.subscribe_action_arc(Arc::new(subscriber))
    }

    pub fn subscribe_action_arc(&self, subscriber: ActionSubscriber) -> Subscription {
        self.inner.action_subscribers.subscribe(subscriber)
    }

    pub fn getters(&self) -> Getters {
        Getters::new(self.clone())
    }

    /// Evaluate the getter registered under `path`
    pub fn getter(&self, path: &str) -> Option<Value> {
        self.evaluate_getter(path)
    }

    pub(crate) fn evaluate_getter(&self, path: &str) -> Option<Value> {
        let snapshot = self.active();
        self.inner.state.read(|root| snapshot.getters.evaluate(path, root))
    }

    /// Call `callback(new, old)` whenever `getter(state, getters)` changes
    pub fn watch<G, C>(&self, getter: G, callback: C, options: WatchOptions) -> WatchHandle
    where
        G: Fn(&Value, &Getters) -> Value + Send + Sync + 'static,
        C: Fn(&Value, &Value) + Send + Sync + 'static,
    {
        let watcher = Arc::new(Watcher::new(self, Arc::new(getter), Arc::new(callback)));
        if options.immediate {
            watcher.fire_immediately();
        }

        self.inner.state.observe(Arc::downgrade(&watcher) as Weak<dyn DeepObserver>);
        self.inner.watchers.lock().unwrap_or_else(PoisonError::into_inner).push(watcher.clone());
        WatchHandle::new(&watcher, self.downgrade())
    }

    pub(crate) fn remove_watcher(&self, watcher: &Arc<Watcher>) {
        self.inner
            .watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|existing| !Arc::ptr_eq(existing, watcher));
    }

    fn run_watchers(&self) {
        let watchers = self.inner.watchers.lock().unwrap_or_else(PoisonError::into_inner).clone();
        for watcher in watchers {
            watcher.run();
        }
    }

    /// Attach a module at runtime under a non-empty `path`
    ///
    /// Unless `preserve_state` is set, the module's initial state (with its
    /// children's nested in) is written at `path`, replacing what was there.
    pub fn register_module(
        &self,
        path: impl Into<ModulePath>,
        raw: RawModule,
        options: RegisterOptions,
    ) -> StoreResult<()> {
        let path = path.into();
        if path.is_root() {
            return Err(StoreError::InvalidModulePath(
                "cannot register the root module by using register_module".to_string(),
            ));
        }

        let state = {
            let mut modules = self.inner.modules.write().unwrap_or_else(PoisonError::into_inner);
            modules.register(&path, &raw, true)?;
            modules.get(&path).map(|module| module.compose_state())
        };

        if !options.preserve_state {
            if let (Some(state), Some(parent), Some(key)) = (state, path.parent(), path.key()) {
                let grafted = self
                    .inner
                    .scope
                    .with(|| self.inner.state.set_property(parent.segments(), key, state));
                if !grafted {
                    self.report(StoreError::StateNotFound(parent.to_string()));
                }
            }
        }

        self.reset_store();
        info!(path = %path, preserve_state = options.preserve_state, "module registered");
        self.inner.events.emit_with(|| StoreEvent::ModuleRegistered { path: path.to_string() });
        Ok(())
    }

    /// Detach a module registered at runtime, together with its state
    ///
    /// Modules from the initial declaration stay in place. An unknown path
    /// is reported and otherwise ignored.
    pub fn unregister_module(&self, path: impl Into<ModulePath>) -> StoreResult<()> {
        let path = path.into();
        let removed = {
            let mut modules = self.inner.modules.write().unwrap_or_else(PoisonError::into_inner);
            modules.unregister(&path)
        };

        match removed {
            Ok(true) => {}
            Ok(false) => {
                warn!(path = %path, "static modules cannot be unregistered");
                return Ok(());
            }
            Err(err) if !err.is_fatal() => {
                self.report(err);
                return Ok(());
            }
            Err(err) => return Err(err),
        }

        if let (Some(parent), Some(key)) = (path.parent(), path.key()) {
            self.inner
                .scope
                .with(|| self.inner.state.delete_property(parent.segments(), key));
        }

        self.reset_store();
        info!(path = %path, "module unregistered");
        self.inner.events.emit_with(|| StoreEvent::ModuleUnregistered { path: path.to_string() });
        Ok(())
    }

    pub fn has_module(&self, path: impl Into<ModulePath>) -> bool {
        let path = path.into();
        self.inner.modules.read().unwrap_or_else(PoisonError::into_inner).contains(&path)
    }

    /// Swap in new handler definitions, keeping the current state
    ///
    /// Keys that do not exist in the current tree are reported and skipped.
    /// Watchers are re-evaluated against the new getters.
    pub fn hot_update(&self, raw: RawModule) -> StoreResult<()> {
        let mismatches = {
            let mut modules = self.inner.modules.write().unwrap_or_else(PoisonError::into_inner);
            modules.update(&raw)?
        };
        for mismatch in mismatches {
            self.report(mismatch);
        }

        self.reset_store();
        info!("store hot updated");
        self.inner.events.emit_with(|| StoreEvent::HotUpdated);
        Ok(())
    }

    /// Rebuild the registries and getter layer from the module tree
    ///
    /// Watchers are re-evaluated afterwards, since getters they read may
    /// have appeared, vanished or changed definition.
    fn reset_store(&self) {
        let (registry, diagnostics) = {
            let modules = self.inner.modules.read().unwrap_or_else(PoisonError::into_inner);
            RegistryBuilder::new(&modules, self.downgrade()).build()
        };
        for diagnostic in diagnostics {
            self.report(diagnostic);
        }

        let getters = Arc::new(registry.computed_layer());
        // invalidate before watchers re-read getters
        self.inner.state.observe_first(Arc::downgrade(&getters) as Weak<dyn DeepObserver>);

        let previous = {
            let mut active = self.inner.active.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *active, Arc::new(Snapshot { registry, getters }))
        };
        previous.getters.retire();
        metrics::record_registry_rebuild();
        self.run_watchers();
    }

    pub fn has_mutation(&self, mutation_type: &str) -> bool {
        self.active().registry.has_mutation(mutation_type)
    }

    pub fn has_action(&self, action_type: &str) -> bool {
        self.active().registry.has_action(action_type)
    }

    pub fn mutation_types(&self) -> Vec<String> {
        self.active().registry.mutation_types()
    }

    pub fn action_types(&self) -> Vec<String> {
        self.active().registry.action_types()
    }

    /// Registered namespaces, each with its trailing `/`
    pub fn namespaces(&self) -> Vec<String> {
        self.active().registry.namespaces()
    }

    /// Local context of the module at `path`
    pub fn local_context(&self, path: impl Into<ModulePath>) -> Option<LocalContext> {
        self.active().registry.context(&path.into()).cloned()
    }

    /// Diagnostics reported so far, oldest first
    pub fn diagnostics(&self) -> Vec<StoreError> {
        self.inner.diagnostics.entries()
    }

    pub fn clear_diagnostics(&self) {
        self.inner.diagnostics.clear()
    }

    /// Event hook for debugging tools
    pub fn events(&self) -> &EventBroadcaster {
        &self.inner.events
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    pub fn action_subscriber_count(&self) -> usize {
        self.inner.action_subscribers.len()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("strict", &self.is_strict())
            .field("mutations", &self.mutation_types())
            .field("actions", &self.action_types())
            .field("getters", &self.getters().keys())
            .finish()
    }
}

impl std::fmt::Debug for WeakStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WeakStore")
    }
}

fn type_field(value: &Value) -> Option<String> {
    value.get("type").and_then(Value::as_str).map(str::to_owned)
}
