//! Raw module declarations
//!
//! A [`RawModule`] is what callers hand to the store: a state initializer,
//! named mutations, actions and getters, and nested child declarations.

use crate::store::{ActionContext, GetterArgs};
use futures::future::{BoxFuture, FutureExt};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Synchronous state transition: `(local state, payload)`
pub type MutationFn = Arc<dyn Fn(&mut Value, &Value) + Send + Sync>;

/// Derived value over local and root state/getters
pub type GetterFn = Arc<dyn Fn(&GetterArgs<'_>) -> Value + Send + Sync>;

/// Future returned by every action handler
pub type ActionFuture = BoxFuture<'static, anyhow::Result<Value>>;

/// Possibly asynchronous operation: `(context, payload)`
pub type ActionFn = Arc<dyn Fn(ActionContext, Value) -> ActionFuture + Send + Sync>;

/// Initial state of a module
#[derive(Clone)]
pub enum StateInit {
    /// Cloned for every module instance
    Static(Value),
    /// Invoked once per module instance
    Factory(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl StateInit {
    /// Produce a fresh state value; `null` becomes an empty object
    pub fn materialize(&self) -> Value {
        let value = match self {
            StateInit::Static(value) => value.clone(),
            StateInit::Factory(factory) => factory(),
        };
        if value.is_null() {
            json!({})
        } else {
            value
        }
    }
}

impl fmt::Debug for StateInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateInit::Static(value) => f.debug_tuple("Static").field(value).finish(),
            StateInit::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// An action declaration
///
/// `WithOptions { root: true }` registers the handler under its bare name,
/// outside the module's namespace.
#[derive(Clone)]
pub enum Action {
    Plain(ActionFn),
    WithOptions { handler: ActionFn, root: bool },
}

impl Action {
    /// Wrap an async handler
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(ActionContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Action::Plain(Arc::new(move |ctx, payload| handler(ctx, payload).boxed()))
    }

    /// Wrap a synchronous handler; its result is returned as a ready future
    pub fn from_sync<F>(handler: F) -> Self
    where
        F: Fn(ActionContext, Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Action::Plain(Arc::new(move |ctx, payload| {
            futures::future::ready(handler(ctx, payload)).boxed()
        }))
    }

    /// Register this action at the root, ignoring the module namespace
    pub fn at_root(self) -> Self {
        Action::WithOptions { handler: self.into_parts().0, root: true }
    }

    /// Normalized `(handler, root)` pair
    pub fn into_parts(self) -> (ActionFn, bool) {
        match self {
            Action::Plain(handler) => (handler, false),
            Action::WithOptions { handler, root } => (handler, root),
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, Action::WithOptions { root: true, .. })
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Plain(_) => f.write_str("Plain(..)"),
            Action::WithOptions { root, .. } => {
                f.debug_struct("WithOptions").field("root", root).finish_non_exhaustive()
            }
        }
    }
}

/// Declaration of a module and its nested modules
#[derive(Clone, Default)]
pub struct RawModule {
    pub(crate) state: Option<StateInit>,
    pub(crate) namespaced: bool,
    pub(crate) getters: BTreeMap<String, GetterFn>,
    pub(crate) mutations: BTreeMap<String, MutationFn>,
    pub(crate) actions: BTreeMap<String, Action>,
    pub(crate) modules: BTreeMap<String, RawModule>,
}

impl RawModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Static initial state
    pub fn state(mut self, state: Value) -> Self {
        self.state = Some(StateInit::Static(state));
        self
    }

    /// Initial state produced by a factory, once per module instance
    pub fn state_fn<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.state = Some(StateInit::Factory(Arc::new(factory)));
        self
    }

    pub fn namespaced(mut self, namespaced: bool) -> Self {
        self.namespaced = namespaced;
        self
    }

    pub fn mutation<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut Value, &Value) + Send + Sync + 'static,
    {
        self.mutations.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn getter<F>(mut self, name: impl Into<String>, getter: F) -> Self
    where
        F: Fn(&GetterArgs<'_>) -> Value + Send + Sync + 'static,
    {
        self.getters.insert(name.into(), Arc::new(getter));
        self
    }

    /// Async action handler
    pub fn action<F, Fut>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ActionContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.with_action(name, Action::new(handler))
    }

    /// Synchronous action handler
    pub fn action_sync<F>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ActionContext, Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.with_action(name, Action::from_sync(handler))
    }

    /// Async action registered outside the module namespace
    pub fn root_action<F, Fut>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ActionContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.with_action(name, Action::new(handler).at_root())
    }

    pub fn with_action(mut self, name: impl Into<String>, action: Action) -> Self {
        self.actions.insert(name.into(), action);
        self
    }

    /// Nested module
    pub fn module(mut self, key: impl Into<String>, module: RawModule) -> Self {
        self.modules.insert(key.into(), module);
        self
    }

    pub fn is_namespaced(&self) -> bool {
        self.namespaced
    }

    pub fn modules(&self) -> &BTreeMap<String, RawModule> {
        &self.modules
    }

    pub fn initial_state(&self) -> Value {
        self.state.as_ref().map_or_else(|| json!({}), StateInit::materialize)
    }
}

impl fmt::Debug for RawModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawModule")
            .field("namespaced", &self.namespaced)
            .field("state", &self.state)
            .field("getters", &self.getters.keys().collect::<Vec<_>>())
            .field("mutations", &self.mutations.keys().collect::<Vec<_>>())
            .field("actions", &self.actions)
            .field("modules", &self.modules)
            .finish()
    }
}
