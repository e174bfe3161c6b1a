use crate::support::{optional_str, publish, require_str};
use quailcore::{ExecutionContext, NodeBehavior, NodeError, NodeKind, Task, Value};
use quailruntime::{NodeFactory, NodeMetadata, NodeSpec, OptionDefinition};
use std::path::{Path, PathBuf};

/// Loads an array of records from a JSON or JSON Lines file
pub struct JsonDatasetNode {
    path: PathBuf,
    publish_as: Option<String>,
}

impl JsonDatasetNode {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            publish_as: None,
        }
    }

    pub fn publish_as(mut self, key: impl Into<String>) -> Self {
        self.publish_as = Some(key.into());
        self
    }
}

fn is_json_lines(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("jsonl") | Some("ndjson")
    )
}

fn parse_rows(path: &Path, text: &str) -> Result<Vec<Value>, NodeError> {
    let invalid = |e: serde_json::Error| {
        NodeError::ExecutionFailed(format!("invalid JSON in {}: {}", path.display(), e))
    };

    if is_json_lines(path) {
        return text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str::<serde_json::Value>(line)
                    .map(Value::from)
                    .map_err(invalid)
            })
            .collect();
    }

    match Value::from(serde_json::from_str::<serde_json::Value>(text).map_err(invalid)?) {
        Value::Array(rows) => Ok(rows),
        other => Err(NodeError::InvalidInputType {
            field: path.display().to_string(),
            expected: "array of records".to_string(),
            actual: other.type_name().to_string(),
        }),
    }
}

impl Task for JsonDatasetNode {
    fn run(&self, ctx: &mut ExecutionContext) -> Result<Value, NodeError> {
        let path = ctx.resolve_path(&self.path);
        tracing::debug!("Reading dataset {}", path.display());
        let text = std::fs::read_to_string(&path).map_err(|e| {
            NodeError::ExecutionFailed(format!("cannot read {}: {}", path.display(), e))
        })?;
        let rows = parse_rows(&path, &text)?;

        ctx.info(format!("Loaded {} rows from {}", rows.len(), path.display()));
        Ok(publish(rows, &self.publish_as))
    }
}

pub struct JsonDatasetFactory;

impl NodeFactory for JsonDatasetFactory {
    fn node_type(&self) -> &str {
        "dataset.json"
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Task
    }

    fn create(&self, spec: &NodeSpec) -> Result<NodeBehavior, NodeError> {
        let mut node = JsonDatasetNode::new(require_str(spec, "path")?);
        if let Some(key) = optional_str(spec, "publish_as")? {
            node = node.publish_as(key);
        }
        Ok(NodeBehavior::task(node))
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Loads records from a JSON array or JSON Lines file".to_string(),
            category: "dataset".to_string(),
            options: vec![
                OptionDefinition::required("path", "File path, relative to the pipeline directory"),
                OptionDefinition::optional("publish_as", "Extra context key for the rows"),
            ],
        }
    }
}

/// Records declared directly in configuration
pub struct InlineDatasetNode {
    rows: Vec<Value>,
    publish_as: Option<String>,
}

impl Task for InlineDatasetNode {
    fn run(&self, _ctx: &mut ExecutionContext) -> Result<Value, NodeError> {
        Ok(publish(self.rows.clone(), &self.publish_as))
    }
}

pub struct InlineDatasetFactory;

impl NodeFactory for InlineDatasetFactory {
    fn node_type(&self) -> &str {
        "dataset.inline"
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Task
    }

    fn create(&self, spec: &NodeSpec) -> Result<NodeBehavior, NodeError> {
        let rows = match spec.config.get("rows") {
            Some(Value::Array(rows)) => rows.clone(),
            Some(other) => {
                return Err(NodeError::InvalidInputType {
                    field: "rows".to_string(),
                    expected: "array".to_string(),
                    actual: other.type_name().to_string(),
                })
            }
            None => Vec::new(),
        };

        Ok(NodeBehavior::task(InlineDatasetNode {
            rows,
            publish_as: optional_str(spec, "publish_as")?,
        }))
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Publishes records given in configuration".to_string(),
            category: "dataset".to_string(),
            options: vec![
                OptionDefinition::optional("rows", "Array of records"),
                OptionDefinition::optional("publish_as", "Extra context key for the rows"),
            ],
        }
    }
}
