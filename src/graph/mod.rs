//! Plan graph storage: canonical lookups plus the concurrent append forms
//! written during parallel phases.

pub mod multimap;
pub mod plan_graph;

pub use multimap::{ConcurrentMultiMap, MultiMap};
pub use plan_graph::{EdgeBatch, PlanGraph};
