/*
    namespace_props.rs - Property tests for namespace resolution
*/

use proptest::prelude::*;
use serde_json::Value;
use statehive_core::module::ModuleTree;
use statehive_core::{ModulePath, RawModule, Store};

/// Nest one module per flag, the last one declaring a `touch` mutation
fn chain(keys: &[String], flags: &[bool]) -> RawModule {
    let last = flags.len() - 1;
    let mut module = RawModule::new().namespaced(flags[last]).mutation("touch", |_, _| {});
    for index in (0..last).rev() {
        module = RawModule::new().namespaced(flags[index]).module(keys[index + 1].clone(), module);
    }
    RawModule::new().module(keys[0].clone(), module)
}

fn expected_namespace(keys: &[String], flags: &[bool]) -> String {
    keys.iter()
        .zip(flags)
        .filter(|(_, namespaced)| **namespaced)
        .map(|(key, _)| format!("{}/", key))
        .collect()
}

proptest! {
    #[test]
    fn prop_namespace_concatenates_namespaced_keys(
        flags in prop::collection::vec(any::<bool>(), 1..6),
    ) {
        let keys: Vec<String> = (0..flags.len()).map(|i| format!("m{}", i)).collect();
        let root = chain(&keys, &flags);
        let expected = expected_namespace(&keys, &flags);

        let tree = ModuleTree::new(&root).unwrap();
        prop_assert_eq!(tree.get_namespace(&ModulePath::from(keys.clone())), Some(expected.clone()));

        let store = Store::new(root).unwrap();
        let mutation_type = format!("{}touch", expected);
        prop_assert_eq!(store.mutation_types(), vec![mutation_type.clone()]);
        prop_assert!(store.commit(&mutation_type, Value::Null).is_ok());
    }

    #[test]
    fn prop_registered_module_resolves_like_static(
        flags in prop::collection::vec(any::<bool>(), 1..5),
    ) {
        let keys: Vec<String> = (0..flags.len()).map(|i| format!("d{}", i)).collect();
        let expected = expected_namespace(&keys, &flags);

        // register the first module of the chain at runtime instead
        let nested = chain(&keys, &flags);
        let first = nested.modules()[&keys[0]].clone();
        let store = Store::new(RawModule::new()).unwrap();
        store
            .register_module(keys[0].as_str(), first, statehive_core::RegisterOptions::default())
            .unwrap();

        prop_assert_eq!(store.mutation_types(), vec![format!("{}touch", expected)]);
    }
}

#[test]
fn test_plain_module_between_namespaced_ones() {
    let keys: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
    let root = chain(&keys, &[true, false, true]);
    let tree = ModuleTree::new(&root).unwrap();
    assert_eq!(tree.get_namespace(&ModulePath::from(["a", "b", "c"])), Some("a/c/".to_string()));
}
