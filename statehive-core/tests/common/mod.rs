//! Shared fixtures for store integration tests

#![allow(dead_code)]

use serde_json::{json, Value};
use statehive_core::RawModule;

/// Read `state[key]` as an integer, 0 if absent
pub fn int(state: &Value, key: &str) -> i64 {
    state.get(key).and_then(Value::as_i64).unwrap_or(0)
}

/// Add the payload's `by` (default 1) to `state.count`
pub fn increment(state: &mut Value, payload: &Value) {
    let by = payload.get("by").and_then(Value::as_i64).unwrap_or(1);
    state["count"] = json!(int(state, "count") + by);
}

/// A module holding `{count}` with `inc` and a `double` getter
pub fn counter(namespaced: bool, start: i64) -> RawModule {
    RawModule::new()
        .namespaced(namespaced)
        .state(json!({ "count": start }))
        .mutation("inc", increment)
        .getter("double", |args| json!(args.state().get("count").as_i64().unwrap_or(0) * 2))
}
