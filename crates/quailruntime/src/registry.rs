use indexmap::IndexMap;
use quailcore::{
    CheckResult, ExecutionContext, NodeDescriptor, NodeError, NodeKind, RegistryError, Severity,
    Value,
};
use serde::Serialize;

/// Node ids partitioned by kind, in registration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NodeIds {
    pub tasks: Vec<String>,
    pub checks: Vec<String>,
}

/// Registry of task and check descriptors.
///
/// Tasks and checks share one id namespace. The registry is a plain value:
/// build one per pipeline and share it behind an `Arc`.
#[derive(Default)]
pub struct NodeRegistry {
    tasks: IndexMap<String, NodeDescriptor>,
    checks: IndexMap<String, NodeDescriptor>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor
    pub fn register(&mut self, descriptor: NodeDescriptor) -> Result<(), RegistryError> {
        let id = descriptor.id();
        if id.trim().is_empty() {
            return Err(RegistryError::InvalidNode {
                id: id.to_string(),
                reason: "node id must not be empty".to_string(),
            });
        }
        if self.contains(id) {
            return Err(RegistryError::DuplicateNode(id.to_string()));
        }

        tracing::debug!(
            "Registering {} '{}' (requires: {:?})",
            descriptor.kind(),
            id,
            descriptor.requires()
        );

        let id = id.to_string();
        match descriptor.kind() {
            NodeKind::Task => self.tasks.insert(id, descriptor),
            NodeKind::Check => self.checks.insert(id, descriptor),
        };
        Ok(())
    }

    pub fn register_task<F>(
        &mut self,
        id: impl Into<String>,
        requires: &[&str],
        task: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(&mut ExecutionContext) -> Result<Value, NodeError> + Send + Sync + 'static,
    {
        self.register(NodeDescriptor::task(id, requires, task))
    }

    pub fn register_check<F>(
        &mut self,
        id: impl Into<String>,
        requires: &[&str],
        severity: Severity,
        check: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(&mut ExecutionContext) -> Result<CheckResult, NodeError> + Send + Sync + 'static,
    {
        self.register(NodeDescriptor::check(id, requires, severity, check))
    }

    pub fn lookup(&self, id: &str) -> Result<&NodeDescriptor, RegistryError> {
        self.get(id)
            .ok_or_else(|| RegistryError::UnknownNode(id.to_string()))
    }

    pub fn get(&self, id: &str) -> Option<&NodeDescriptor> {
        self.tasks.get(id).or_else(|| self.checks.get(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.contains_key(id) || self.checks.contains_key(id)
    }

    pub fn list_ids(&self) -> NodeIds {
        NodeIds {
            tasks: self.tasks.keys().cloned().collect(),
            checks: self.checks.keys().cloned().collect(),
        }
    }

    /// All descriptors, tasks first, each group in registration order
    pub fn descriptors(&self) -> impl Iterator<Item = &NodeDescriptor> {
        self.tasks.values().chain(self.checks.values())
    }

    pub fn len(&self) -> usize {
        self.tasks.len() + self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
