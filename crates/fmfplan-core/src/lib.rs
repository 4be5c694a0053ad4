//! Core library for evaluating fmf/tmt style test plan trees.

pub mod catalog;
pub mod context;
pub mod filter;
pub mod guard;
pub mod plan;
pub mod tree;

pub use catalog::{TestCatalog, TestMeta};
pub use context::{Context, ContextError};
pub use filter::{Filter, FilterError};
pub use guard::{Guard, GuardError};
pub use plan::{PlanError, PlanTree, ResolvedPlan};
pub use tree::{Tree, TreeError};
