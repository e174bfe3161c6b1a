//! Pipeline execution runtime
//!
//! This crate provides the node registry, the dependency resolver and the
//! sequential runner, plus the configuration layer that assembles pipelines
//! from declared node instances.

mod catalog;
pub mod config;
mod executor;
mod graph;
mod plan;
mod registry;
mod resolver;
mod runtime;
mod summary;
mod targets;

pub use catalog::{
    NodeCatalog, NodeConfig, NodeFactory, NodeMetadata, NodeSpec, OptionDefinition,
};
pub use config::PipelineConfig;
pub use executor::{NodeResult, RunReport, Runner};
pub use graph::DependencyGraph;
pub use plan::{ExecutionPlan, PlanStep};
pub use registry::{NodeIds, NodeRegistry};
pub use resolver::DependencyResolver;
pub use runtime::{Pipeline, RuntimeConfig};
pub use summary::{CheckTally, RowStatus, RunSummary, SummaryRow};
pub use targets::TargetGroups;
