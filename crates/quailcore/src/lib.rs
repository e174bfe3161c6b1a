//! Core abstractions for quail pipelines
//!
//! This crate provides the value, result, context and node types that the
//! runtime and node library build on. It performs no scheduling itself.

pub mod context;
mod error;
pub mod events;
mod node;
mod result;
mod value;

pub use context::{Artifact, Environment, ExecutionContext, Params};
pub use error::{NodeError, QuailError, RegistryError, ResolveError};
pub use events::{EventBus, EventEmitter, MessageLevel, RunEvent, RunId};
pub use node::{Check, NodeBehavior, NodeDescriptor, NodeKind, Task};
pub use result::{CheckResult, CheckStatus, Severity};
pub use value::Value;

/// Result type for quail operations
pub type Result<T> = std::result::Result<T, QuailError>;
