/*
    tree.rs - The module tree

    Owns the root module and registers, unregisters and hot-updates nodes by
    path. Namespaces are derived here and nowhere else: walking from the root,
    every namespaced node on the path contributes "<key>/".
*/

use super::node::Module;
use super::path::ModulePath;
use super::raw::RawModule;
use crate::store::errors::{StoreError, StoreResult};
use tracing::{debug, warn};

pub struct ModuleTree {
    root: Module,
}

impl ModuleTree {
    /// Build the tree from the static root declaration
    pub fn new(raw: &RawModule) -> StoreResult<Self> {
        let root = ModulePath::root();
        validate_tree(&root, raw)?;
        let root = build(&root, raw, false)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Module {
        &self.root
    }

    /// Module at `path`, `None` if any segment is missing
    pub fn get(&self, path: &ModulePath) -> Option<&Module> {
        path.segments().iter().try_fold(&self.root, |module, key| module.get_child(key))
    }

    fn get_mut(&mut self, path: &ModulePath) -> Option<&mut Module> {
        path.segments()
            .iter()
            .try_fold(&mut self.root, |module, key| module.get_child_mut(key))
    }

    /// Namespace prefix for the module at `path`
    ///
    /// Concatenates `key + "/"` for every namespaced module on the path,
    /// the target included. `None` if the path does not resolve.
    pub fn get_namespace(&self, path: &ModulePath) -> Option<String> {
        let mut module = &self.root;
        let mut namespace = String::new();
        for key in path.segments() {
            module = module.get_child(key)?;
            if module.namespaced() {
                namespace.push_str(key);
                namespace.push('/');
            }
        }
        Some(namespace)
    }

    /// Attach `raw` (and its nested modules) at `path`
    ///
    /// The whole declaration is validated and built before anything is attached.
    pub fn register(&mut self, path: &ModulePath, raw: &RawModule, runtime: bool) -> StoreResult<()> {
        validate_tree(path, raw)?;

        let Some((key, parent_path)) = path.segments().split_last() else {
            self.root = build(path, raw, runtime)?;
            return Ok(());
        };

        let parent_path = ModulePath::from(parent_path.to_vec());
        let parent = self.get_mut(&parent_path).ok_or_else(|| {
            StoreError::InvalidModulePath(format!(
                "parent module \"{}\" of \"{}\" is not registered",
                parent_path, path
            ))
        })?;
        parent.add_child(key.clone(), build(path, raw, runtime)?);
        debug!(path = %path, runtime, "module registered");
        Ok(())
    }

    /// Detach the module at `path`
    ///
    /// Returns `Ok(false)` without touching the tree when the module was part
    /// of the static configuration.
    pub fn unregister(&mut self, path: &ModulePath) -> StoreResult<bool> {
        let (Some(key), Some(parent_path)) = (path.key(), path.parent()) else {
            return Err(StoreError::InvalidModulePath("cannot unregister the root module".to_string()));
        };

        let parent = self
            .get_mut(&parent_path)
            .ok_or_else(|| StoreError::ModuleNotFound(path.to_string()))?;
        let runtime = parent
            .get_child(key)
            .map(Module::runtime)
            .ok_or_else(|| StoreError::ModuleNotFound(path.to_string()))?;

        if !runtime {
            debug!(path = %path, "ignoring unregister of a static module");
            return Ok(false);
        }
        parent.remove_child(key);
        debug!(path = %path, "module unregistered");
        Ok(true)
    }

    /// Hot-update declarations in place from a new root declaration
    ///
    /// Declarations are validated first; a configuration error leaves the tree
    /// untouched. A child key missing from the current tree skips that subtree
    /// and is returned as a structural mismatch; matching siblings still update.
    pub fn update(&mut self, raw: &RawModule) -> StoreResult<Vec<StoreError>> {
        validate_tree(&ModulePath::root(), raw)?;
        let mut mismatches = Vec::new();
        update_module(&ModulePath::root(), &mut self.root, raw, &mut mismatches);
        Ok(mismatches)
    }

    pub fn contains(&self, path: &ModulePath) -> bool {
        self.get(path).is_some()
    }
}

/// Build the node for `raw` and its nested modules
///
/// Each state factory runs exactly once, here. A module with children must
/// end up with object state so the children's state can be nested into it.
fn build(path: &ModulePath, raw: &RawModule, runtime: bool) -> StoreResult<Module> {
    let mut module = Module::new(raw, runtime);
    if !raw.modules().is_empty() && !module.state().is_object() {
        return Err(StoreError::Configuration {
            module: path.to_string(),
            field: "state".to_string(),
            name: "<initial>".to_string(),
            found: module.state().to_string(),
            expected: "an object when nested modules are declared".to_string(),
        });
    }
    for (key, child) in raw.modules() {
        module.add_child(key.clone(), build(&path.child(key.clone()), child, runtime)?);
    }
    Ok(module)
}

fn update_module(path: &ModulePath, target: &mut Module, raw: &RawModule, mismatches: &mut Vec<StoreError>) {
    target.update(raw);

    for (key, child_raw) in raw.modules() {
        let child_path = path.child(key.clone());
        match target.get_child_mut(key) {
            Some(child) => update_module(&child_path, child, child_raw, mismatches),
            None => {
                warn!(module = %path, key = %key, "hot update references an unknown module");
                mismatches.push(StoreError::HotReloadStructuralMismatch {
                    module: path.to_string(),
                    key: key.clone(),
                });
            }
        }
    }
}

/// Check declaration names for `raw` and all nested modules
pub fn validate_tree(path: &ModulePath, raw: &RawModule) -> StoreResult<()> {
    validate_module(path, raw)?;
    for (key, child) in raw.modules() {
        validate_tree(&path.child(key.clone()), child)?;
    }
    Ok(())
}

fn validate_module(path: &ModulePath, raw: &RawModule) -> StoreResult<()> {
    let module = path.to_string();
    let fields: [(&str, Vec<&String>); 3] = [
        ("getters", raw.getters.keys().collect()),
        ("mutations", raw.mutations.keys().collect()),
        ("actions", raw.actions.keys().collect()),
    ];

    for (field, names) in fields {
        for name in names {
            check_name(&module, field, name)?;
        }
    }

    for key in raw.modules().keys() {
        check_name(&module, "modules", key)?;
        if key.contains('/') {
            return Err(configuration(&module, "modules", key, "a key without '/'"));
        }
    }
    Ok(())
}

fn check_name(module: &str, field: &str, name: &str) -> StoreResult<()> {
    if name.is_empty() {
        return Err(configuration(module, field, name, "a non-empty name"));
    }
    if name.trim() != name {
        return Err(configuration(module, field, name, "a name without surrounding whitespace"));
    }
    Ok(())
}

fn configuration(module: &str, field: &str, name: &str, expected: &str) -> StoreError {
    StoreError::Configuration {
        module: module.to_string(),
        field: field.to_string(),
        name: name.to_string(),
        found: serde_json::Value::String(name.to_string()).to_string(),
        expected: expected.to_string(),
    }
}
