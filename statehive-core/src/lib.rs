//! Hierarchical, namespace-aware state container
//!
//! A [`Store`] is built from a tree of [`RawModule`] declarations. Each module
//! contributes state, synchronous mutations, asynchronous actions and cached
//! getters; namespaced modules prefix their handler types with their key.
//!
//! ```
//! use serde_json::json;
//! use statehive_core::{RawModule, Store};
//!
//! let store = Store::new(
//!     RawModule::new()
//!         .state(json!({"count": 0}))
//!         .mutation("increment", |state, _| {
//!             state["count"] = json!(state["count"].as_i64().unwrap_or(0) + 1);
//!         })
//!         .getter("double", |args| json!(args.state().get("count").as_i64().unwrap_or(0) * 2)),
//! )
//! .unwrap();
//!
//! store.commit("increment", json!(null)).unwrap();
//! assert_eq!(store.getter("double"), Some(json!(2)));
//! ```

pub mod config;
pub mod logging;
pub mod metrics;
pub mod module;
pub mod reactive;
pub mod store;

pub use config::{ConfigError, LoggingConfig, StoreConfig};
pub use logging::{init_logging, LogLevel, LoggingError};
pub use module::{Action, ActionFuture, ModulePath, RawModule};
pub use store::{
    ActionContext, ActionRecord, CommitOptions, DispatchOptions, GetterArgs, Getters, LocalContext,
    LocalGetters, MutationRecord, NamespacedHelpers, RegisterOptions, Store, StoreError, StoreEvent,
    StoreOptions, StoreResult, Subscription, WatchHandle, WatchOptions,
};
