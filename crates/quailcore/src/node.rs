use crate::{CheckResult, ExecutionContext, NodeError, Severity, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Task,
    Check,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Task => "task",
            NodeKind::Check => "check",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A producer node. Its output is stored under the node id, and object
/// outputs are also merged into the context key by key.
pub trait Task: Send + Sync {
    fn run(&self, ctx: &mut ExecutionContext) -> Result<Value, NodeError>;
}

/// A verdict-emitting node.
pub trait Check: Send + Sync {
    fn run(&self, ctx: &mut ExecutionContext) -> Result<CheckResult, NodeError>;
}

impl<F> Task for F
where
    F: Fn(&mut ExecutionContext) -> Result<Value, NodeError> + Send + Sync,
{
    fn run(&self, ctx: &mut ExecutionContext) -> Result<Value, NodeError> {
        self(ctx)
    }
}

impl<F> Check for F
where
    F: Fn(&mut ExecutionContext) -> Result<CheckResult, NodeError> + Send + Sync,
{
    fn run(&self, ctx: &mut ExecutionContext) -> Result<CheckResult, NodeError> {
        self(ctx)
    }
}

/// What a node does when invoked
#[derive(Clone)]
pub enum NodeBehavior {
    Task(Arc<dyn Task>),
    Check {
        severity: Severity,
        check: Arc<dyn Check>,
    },
}

impl NodeBehavior {
    pub fn task(task: impl Task + 'static) -> Self {
        NodeBehavior::Task(Arc::new(task))
    }

    pub fn check(severity: Severity, check: impl Check + 'static) -> Self {
        NodeBehavior::Check {
            severity,
            check: Arc::new(check),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            NodeBehavior::Task(_) => NodeKind::Task,
            NodeBehavior::Check { .. } => NodeKind::Check,
        }
    }
}

/// Identity and behaviour of one registered node.
///
/// Fields are private: once built, id, kind and requires never change.
#[derive(Clone)]
pub struct NodeDescriptor {
    id: String,
    requires: Vec<String>,
    behavior: NodeBehavior,
}

impl NodeDescriptor {
    pub fn new(id: impl Into<String>, requires: Vec<String>, behavior: NodeBehavior) -> Self {
        Self {
            id: id.into(),
            requires,
            behavior,
        }
    }

    pub fn task<F>(id: impl Into<String>, requires: &[&str], task: F) -> Self
    where
        F: Fn(&mut ExecutionContext) -> Result<Value, NodeError> + Send + Sync + 'static,
    {
        Self::new(id, owned(requires), NodeBehavior::task(task))
    }

    pub fn check<F>(id: impl Into<String>, requires: &[&str], severity: Severity, check: F) -> Self
    where
        F: Fn(&mut ExecutionContext) -> Result<CheckResult, NodeError> + Send + Sync + 'static,
    {
        Self::new(id, owned(requires), NodeBehavior::check(severity, check))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.behavior.kind()
    }

    pub fn requires(&self) -> &[String] {
        &self.requires
    }

    /// Declared severity; `None` for tasks
    pub fn severity(&self) -> Option<Severity> {
        match &self.behavior {
            NodeBehavior::Task(_) => None,
            NodeBehavior::Check { severity, .. } => Some(*severity),
        }
    }

    pub fn behavior(&self) -> &NodeBehavior {
        &self.behavior
    }
}

impl fmt::Debug for NodeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeDescriptor")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("requires", &self.requires)
            .field("severity", &self.severity())
            .finish()
    }
}

fn owned(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}
