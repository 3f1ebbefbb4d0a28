//! Namespace helpers
//!
//! Resolve a namespace string to the local context of the module that owns
//! it, and bind state/getter/commit/dispatch lookups to that context.

use super::context::LocalContext;
use super::errors::{StoreError, StoreResult};
use super::Store;
use crate::module::ActionFuture;
use serde_json::Value;

/// Append the trailing `/` a registered namespace carries
pub fn normalize_namespace(namespace: &str) -> String {
    if namespace.is_empty() || namespace.ends_with('/') {
        namespace.to_string()
    } else {
        format!("{}/", namespace)
    }
}

impl Store {
    /// Local context of the module registered under `namespace`
    ///
    /// A missing namespace is reported as a diagnostic naming `helper`.
    pub fn module_by_namespace(&self, helper: &str, namespace: &str) -> Option<LocalContext> {
        let namespace = normalize_namespace(namespace);
        let found = self.active().registry.namespace(&namespace).cloned();
        if found.is_none() {
            self.report(StoreError::NamespaceNotFound { helper: helper.to_string(), namespace });
        }
        found
    }

    /// Helpers bound to `namespace`
    pub fn namespaced(&self, namespace: &str) -> Option<NamespacedHelpers> {
        self.module_by_namespace("namespaced", namespace)
            .map(|context| NamespacedHelpers { context })
    }
}

/// State, getter, commit and dispatch lookups bound to one namespace
#[derive(Debug, Clone)]
pub struct NamespacedHelpers {
    context: LocalContext,
}

impl NamespacedHelpers {
    /// Field `key` of the module's state
    pub fn state(&self, key: &str) -> Value {
        self.context.state().get(key).cloned().unwrap_or(Value::Null)
    }

    /// Getter by local name
    pub fn getter(&self, name: &str) -> Option<Value> {
        self.context.getters().get(name)
    }

    pub fn commit(&self, mutation_type: &str, payload: Value) -> StoreResult<()> {
        self.context.commit(mutation_type, payload)
    }

    pub fn dispatch(&self, action_type: &str, payload: Value) -> StoreResult<ActionFuture> {
        self.context.dispatch(action_type, payload)
    }

    pub fn context(&self) -> &LocalContext {
        &self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_namespace() {
        assert_eq!(normalize_namespace("cart"), "cart/");
        assert_eq!(normalize_namespace("cart/"), "cart/");
        assert_eq!(normalize_namespace("a/b"), "a/b/");
        assert_eq!(normalize_namespace(""), "");
    }
}
