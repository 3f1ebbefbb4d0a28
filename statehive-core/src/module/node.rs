//! A registered module: one node of the module tree

use super::raw::{Action, GetterFn, MutationFn, RawModule};
use serde_json::Value;
use std::collections::BTreeMap;

/// One node of the module tree
///
/// Holds the declarations of its raw module (children excluded), the state
/// materialized when it was registered, and its child modules.
pub struct Module {
    raw: RawModule,
    state: Value,
    children: BTreeMap<String, Module>,
    runtime: bool,
}

impl Module {
    /// Build a node from a declaration; child declarations are not followed
    pub fn new(raw: &RawModule, runtime: bool) -> Self {
        let state = raw.initial_state();
        let raw = RawModule { modules: BTreeMap::new(), ..raw.clone() };
        Self { raw, state, children: BTreeMap::new(), runtime }
    }

    pub fn namespaced(&self) -> bool {
        self.raw.namespaced
    }

    /// Whether the module was registered after store creation
    pub fn runtime(&self) -> bool {
        self.runtime
    }

    /// State materialized at registration
    pub fn state(&self) -> &Value {
        &self.state
    }

    pub fn add_child(&mut self, key: impl Into<String>, module: Module) {
        self.children.insert(key.into(), module);
    }

    pub fn remove_child(&mut self, key: &str) -> Option<Module> {
        self.children.remove(key)
    }

    pub fn get_child(&self, key: &str) -> Option<&Module> {
        self.children.get(key)
    }

    pub fn get_child_mut(&mut self, key: &str) -> Option<&mut Module> {
        self.children.get_mut(key)
    }

    pub fn children(&self) -> impl Iterator<Item = (&String, &Module)> {
        self.children.iter()
    }

    pub fn mutations(&self) -> impl Iterator<Item = (&String, &MutationFn)> {
        self.raw.mutations.iter()
    }

    pub fn actions(&self) -> impl Iterator<Item = (&String, &Action)> {
        self.raw.actions.iter()
    }

    pub fn getters(&self) -> impl Iterator<Item = (&String, &GetterFn)> {
        self.raw.getters.iter()
    }

    /// Hot-reload the declarations in place; state is left alone
    ///
    /// The namespaced flag is always taken over; an empty declaration map
    /// counts as "not provided" and keeps the current handlers.
    pub fn update(&mut self, raw: &RawModule) {
        self.raw.namespaced = raw.namespaced;
        if !raw.actions.is_empty() {
            self.raw.actions = raw.actions.clone();
        }
        if !raw.mutations.is_empty() {
            self.raw.mutations = raw.mutations.clone();
        }
        if !raw.getters.is_empty() {
            self.raw.getters = raw.getters.clone();
        }
    }

    /// This module's state with every descendant's state nested under its key
    pub fn compose_state(&self) -> Value {
        let mut state = self.state.clone();
        if let Some(map) = state.as_object_mut() {
            for (key, child) in &self.children {
                map.insert(key.clone(), child.compose_state());
            }
        }
        state
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("namespaced", &self.namespaced())
            .field("runtime", &self.runtime)
            .field("state", &self.state)
            .field("children", &self.children)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_update_keeps_state_and_unset_maps() {
        let raw = RawModule::new()
            .state(json!({"count": 1}))
            .mutation("inc", |_, _| {})
            .getter("count", |_| json!(0));
        let mut module = Module::new(&raw, false);

        module.update(&RawModule::new().namespaced(true).mutation("dec", |_, _| {}));

        assert!(module.namespaced());
        assert_eq!(module.state(), &json!({"count": 1}));
        let mutations: Vec<_> = module.mutations().map(|(name, _)| name.clone()).collect();
        assert_eq!(mutations, vec!["dec"]);
        assert_eq!(module.getters().count(), 1);
    }

    #[test]
    fn test_compose_state_nests_children() {
        let mut root = Module::new(&RawModule::new().state(json!({"ready": true})), false);
        let mut cart = Module::new(&RawModule::new().state(json!({"items": []})), false);
        cart.add_child("promo", Module::new(&RawModule::new().state(json!({"code": null})), false));
        root.add_child("cart", cart);

        assert_eq!(
            root.compose_state(),
            json!({"ready": true, "cart": {"items": [], "promo": {"code": null}}})
        );
    }

    #[test]
    fn test_children_are_not_copied_from_raw() {
        let raw = RawModule::new().module("child", RawModule::new());
        let module = Module::new(&raw, true);
        assert_eq!(module.children().count(), 0);
        assert!(module.runtime());
    }
}
