/*
    context.rs - Namespace-local views of the store

    A LocalContext rewrites commit/dispatch types into its module's namespace
    and exposes the module's state and getters. It holds the store weakly: a
    context that outlives its store fails with StoreDropped.
*/

use super::errors::{StoreError, StoreResult};
use super::getters::{Getters, LocalGetters};
use super::{CommitOptions, DispatchOptions, Store, WeakStore};
use crate::module::{ActionFuture, ModulePath};
use serde_json::Value;

#[derive(Clone)]
pub struct LocalContext {
    namespace: String,
    path: ModulePath,
    store: WeakStore,
}

impl LocalContext {
    pub(crate) fn new(namespace: String, path: ModulePath, store: WeakStore) -> Self {
        Self { namespace, path, store }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn path(&self) -> &ModulePath {
        &self.path
    }

    fn store(&self) -> StoreResult<Store> {
        self.store.upgrade().ok_or(StoreError::StoreDropped)
    }

    pub fn commit(&self, mutation_type: &str, payload: Value) -> StoreResult<()> {
        self.commit_with_options(mutation_type, payload, CommitOptions::default())
    }

    /// Commit within this namespace, or at the root when `options.root` is set
    pub fn commit_with_options(&self, mutation_type: &str, payload: Value, options: CommitOptions) -> StoreResult<()> {
        let store = self.store()?;
        let resolved = if self.namespace.is_empty() || options.root {
            mutation_type.to_string()
        } else {
            let global = format!("{}{}", self.namespace, mutation_type);
            if !store.has_mutation(&global) {
                return Err(store.report(StoreError::UnknownLocalMutationType {
                    local: mutation_type.to_string(),
                    global,
                }));
            }
            global
        };
        store.commit_with_options(&resolved, payload, options)
    }

    pub fn dispatch(&self, action_type: &str, payload: Value) -> StoreResult<ActionFuture> {
        self.dispatch_with_options(action_type, payload, DispatchOptions::default())
    }

    /// Dispatch within this namespace, or at the root when `options.root` is set
    pub fn dispatch_with_options(
        &self,
        action_type: &str,
        payload: Value,
        options: DispatchOptions,
    ) -> StoreResult<ActionFuture> {
        let store = self.store()?;
        let resolved = if self.namespace.is_empty() || options.root {
            action_type.to_string()
        } else {
            let global = format!("{}{}", self.namespace, action_type);
            if !store.has_action(&global) {
                return Err(store.report(StoreError::UnknownLocalActionType {
                    local: action_type.to_string(),
                    global,
                }));
            }
            global
        };
        store.dispatch(&resolved, payload)
    }

    /// Current state of this module; `null` once the module or store is gone
    pub fn state(&self) -> Value {
        self.store
            .upgrade()
            .and_then(|store| store.module_state(&self.path))
            .unwrap_or(Value::Null)
    }

    /// Getters of this namespace, by local name
    pub fn getters(&self) -> LocalGetters {
        LocalGetters::new(self.store.clone(), self.namespace.clone())
    }
}

impl std::fmt::Debug for LocalContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalContext")
            .field("namespace", &self.namespace)
            .field("path", &self.path)
            .finish()
    }
}

/// What an action handler receives: the local context plus the root store
#[derive(Clone)]
pub struct ActionContext {
    local: LocalContext,
    store: Store,
}

impl ActionContext {
    pub(crate) fn new(local: LocalContext, store: Store) -> Self {
        Self { local, store }
    }

    pub fn commit(&self, mutation_type: &str, payload: Value) -> StoreResult<()> {
        self.local.commit(mutation_type, payload)
    }

    pub fn commit_with_options(&self, mutation_type: &str, payload: Value, options: CommitOptions) -> StoreResult<()> {
        self.local.commit_with_options(mutation_type, payload, options)
    }

    pub fn dispatch(&self, action_type: &str, payload: Value) -> StoreResult<ActionFuture> {
        self.local.dispatch(action_type, payload)
    }

    pub fn dispatch_with_options(
        &self,
        action_type: &str,
        payload: Value,
        options: DispatchOptions,
    ) -> StoreResult<ActionFuture> {
        self.local.dispatch_with_options(action_type, payload, options)
    }

    pub fn state(&self) -> Value {
        self.local.state()
    }

    pub fn getters(&self) -> LocalGetters {
        self.local.getters()
    }

    pub fn root_state(&self) -> Value {
        self.store.state()
    }

    pub fn root_getters(&self) -> Getters {
        self.store.getters()
    }

    pub fn local(&self) -> &LocalContext {
        &self.local
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}

impl std::fmt::Debug for ActionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionContext").field("local", &self.local).finish()
    }
}
