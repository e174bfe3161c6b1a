use crate::registry::NodeRegistry;
use indexmap::IndexMap;
use quailcore::{NodeBehavior, NodeDescriptor, NodeError, NodeKind, RegistryError, Severity, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Free-form options of a configured node
pub type NodeConfig = BTreeMap<String, Value>;

/// A node instance as declared in pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub config: NodeConfig,
}

impl NodeSpec {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            requires: Vec::new(),
            severity: None,
            description: None,
            config: NodeConfig::new(),
        }
    }

    pub fn requires(mut self, id: impl Into<String>) -> Self {
        self.requires.push(id.into());
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn severity_or_default(&self) -> Severity {
        self.severity.unwrap_or_default()
    }
}

/// Creates node behaviour from configuration
pub trait NodeFactory: Send + Sync {
    /// Type identifier used in configuration (e.g. "check.not_null")
    fn node_type(&self) -> &str;

    fn kind(&self) -> NodeKind;

    /// Build the behaviour for one configured instance
    fn create(&self, spec: &NodeSpec) -> Result<NodeBehavior, NodeError>;

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata::default()
    }
}

/// Metadata about a node type
#[derive(Debug, Clone, Serialize)]
pub struct NodeMetadata {
    pub description: String,
    pub category: String,
    pub options: Vec<OptionDefinition>,
}

impl Default for NodeMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            category: "general".to_string(),
            options: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OptionDefinition {
    pub name: String,
    pub description: String,
    pub required: bool,
}

impl OptionDefinition {
    pub fn required(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            required: true,
        }
    }

    pub fn optional(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            required: false,
        }
    }
}

/// Catalog of available node types
#[derive(Default)]
pub struct NodeCatalog {
    factories: IndexMap<String, Arc<dyn NodeFactory>>,
}

impl NodeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node factory
    pub fn register(&mut self, factory: Arc<dyn NodeFactory>) {
        let node_type = factory.node_type().to_string();
        tracing::debug!("Registering node type: {}", node_type);
        self.factories.insert(node_type, factory);
    }

    /// Turn a configured node into a descriptor
    pub fn instantiate(&self, spec: &NodeSpec) -> Result<NodeDescriptor, RegistryError> {
        let factory = self
            .factories
            .get(&spec.node_type)
            .ok_or_else(|| RegistryError::UnknownNodeType(spec.node_type.clone()))?;

        if factory.kind() == NodeKind::Task && spec.severity.is_some() {
            tracing::warn!("Severity on task '{}' is ignored", spec.id);
        }

        let behavior = factory.create(spec).map_err(|e| RegistryError::InvalidNode {
            id: spec.id.clone(),
            reason: e.to_string(),
        })?;

        Ok(NodeDescriptor::new(
            spec.id.clone(),
            spec.requires.clone(),
            behavior,
        ))
    }

    /// Instantiate every spec into `registry`
    pub fn populate(
        &self,
        registry: &mut NodeRegistry,
        specs: &[NodeSpec],
    ) -> Result<(), RegistryError> {
        for spec in specs {
            registry.register(self.instantiate(spec)?)?;
        }
        Ok(())
    }

    /// Get all registered node types
    pub fn list_node_types(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    pub fn get_metadata(&self, node_type: &str) -> Option<NodeMetadata> {
        self.factories.get(node_type).map(|f| f.metadata())
    }

    pub fn kind_of(&self, node_type: &str) -> Option<NodeKind> {
        self.factories.get(node_type).map(|f| f.kind())
    }
}
