/*
    reactive - Change tracking and memoization for the state tree

    The store relies on three capabilities from this layer:
    - structural property add/remove on an observed tree (ReactiveRoot)
    - lazily recomputed cached cells with dependency invalidation (ComputedLayer)
    - synchronous deep change observation (DeepObserver)

    The store only talks to it through these types, so another incremental
    computation engine can be dropped in behind the same traits.
*/

pub mod cell;
pub mod diff;
pub mod root;
pub mod scope;
pub mod tracker;

pub use cell::{CachedComputation, ComputeFn, ComputedCell, ComputedLayer, EvalContext};
pub use root::{ChangeSet, DeepObserver, ReactiveRoot};
pub use scope::{MutationScope, ScopeGuard};
pub use tracker::{DependencySet, Tracked};
