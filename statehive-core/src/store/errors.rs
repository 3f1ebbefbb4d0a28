/*
    errors.rs - Error types for the store subsystem

    Covers:
    - Module configuration problems (fatal at registration time)
    - Unknown mutation/action/getter addresses (reported, no-op)
    - Registry collisions and hot-reload mismatches (reported)
    - Strict mode violations (panic)
*/

use thiserror::Error;

/// Errors that can occur in the store subsystem
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Malformed module declaration
    #[error("{field} should be {expected} but \"{field}.{name}\"{} is {found}.", in_module(.module))]
    Configuration {
        module: String,
        field: String,
        name: String,
        found: String,
        expected: String,
    },

    /// Path cannot be used for the requested tree operation
    #[error("Invalid module path: {0}")]
    InvalidModulePath(String),

    /// Object-style commit without a string `type`
    #[error("expects string as the mutation type, but found {0}")]
    InvalidMutationType(String),

    /// Object-style dispatch without a string `type`
    #[error("expects string as the action type, but found {0}")]
    InvalidActionType(String),

    #[error("unknown mutation type: {0}")]
    UnknownMutationType(String),

    #[error("unknown action type: {0}")]
    UnknownActionType(String),

    #[error("unknown local mutation type: {local}, global type: {global}")]
    UnknownLocalMutationType { local: String, global: String },

    #[error("unknown local action type: {local}, global type: {global}")]
    UnknownLocalActionType { local: String, global: String },

    /// Two getters resolved to the same full path
    #[error("duplicate getter key: {0}")]
    DuplicateGetterPath(String),

    /// Two namespaced modules resolved to the same namespace
    #[error("duplicate namespace {namespace} for the namespaced module {module}")]
    NamespaceConflict { namespace: String, module: String },

    #[error("module namespace not found in {helper}(): {namespace}")]
    NamespaceNotFound { helper: String, namespace: String },

    /// Hot update referenced a module that is not in the tree
    #[error("trying to add a new module '{key}' on hot reloading at \"{module}\", manual reload is needed")]
    HotReloadStructuralMismatch { module: String, key: String },

    #[error("module not found: {0}")]
    ModuleNotFound(String),

    /// Module state is missing from the root state
    #[error("state not found at {0}")]
    StateNotFound(String),

    #[error("do not mutate store state outside mutation handlers (changed: {})", .pointers.join(", "))]
    StrictModeViolation { pointers: Vec<String> },

    #[error("store has been dropped")]
    StoreDropped,
}

fn in_module(module: &str) -> String {
    if module.is_empty() {
        String::new()
    } else {
        format!(" in module \"{}\"", module)
    }
}

impl StoreError {
    /// Whether this error is an unrecoverable programmer error
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StoreError::Configuration { .. }
                | StoreError::InvalidModulePath(_)
                | StoreError::StrictModeViolation { .. }
        )
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
