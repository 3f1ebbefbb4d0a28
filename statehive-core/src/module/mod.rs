/*
    module - Module declarations and the module tree
*/

pub mod node;
pub mod path;
pub mod raw;
pub mod tree;

pub use node::Module;
pub use path::ModulePath;
pub use raw::{Action, ActionFn, ActionFuture, GetterFn, MutationFn, RawModule, StateInit};
pub use tree::ModuleTree;
