//! Store counters
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! application installs a recorder.

use ::metrics::{counter, describe_counter};

pub const MUTATIONS_COMMITTED: &str = "store.mutations.committed";
pub const ACTIONS_DISPATCHED: &str = "store.actions.dispatched";
pub const GETTERS_RECOMPUTED: &str = "store.getters.recomputed";
pub const REGISTRY_REBUILDS: &str = "store.registry.rebuilds";
pub const DIAGNOSTICS_REPORTED: &str = "store.diagnostics.reported";

/// Initialize metrics with descriptions
pub fn init_metrics() {
    describe_counter!(MUTATIONS_COMMITTED, "Number of committed mutations");
    describe_counter!(ACTIONS_DISPATCHED, "Number of dispatched actions");
    describe_counter!(GETTERS_RECOMPUTED, "Number of getter evaluations that missed the cache");
    describe_counter!(REGISTRY_REBUILDS, "Number of registry rebuilds");
    describe_counter!(DIAGNOSTICS_REPORTED, "Number of reported store diagnostics");
}

pub(crate) fn record_mutation_committed() {
    counter!(MUTATIONS_COMMITTED).increment(1);
}

pub(crate) fn record_action_dispatched() {
    counter!(ACTIONS_DISPATCHED).increment(1);
}

pub(crate) fn record_getter_recomputed() {
    counter!(GETTERS_RECOMPUTED).increment(1);
}

pub(crate) fn record_registry_rebuild() {
    counter!(REGISTRY_REBUILDS).increment(1);
}

pub(crate) fn record_diagnostic() {
    counter!(DIAGNOSTICS_REPORTED).increment(1);
}
