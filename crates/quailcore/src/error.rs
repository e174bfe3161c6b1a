use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuailError {
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Resolution error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Task '{node}' failed: {source}")]
    TaskFailed {
        node: String,
        #[source]
        source: NodeError,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure raised by a node callable.
#[derive(Error, Debug, Clone)]
pub enum NodeError {
    #[error("Missing artifact: {0}")]
    MissingArtifact(String),

    #[error("Missing parameter: {0}")]
    MissingParam(String),

    #[error("Missing environment resource: {0}")]
    MissingResource(String),

    #[error("Invalid input type for '{field}': expected {expected}, got {actual}")]
    InvalidInputType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

impl NodeError {
    pub fn failed(message: impl Into<String>) -> Self {
        NodeError::ExecutionFailed(message.into())
    }

    /// The failure's own message, without the variant prefix where the
    /// payload already is a message
    pub fn message(&self) -> String {
        match self {
            NodeError::ExecutionFailed(message) | NodeError::Configuration(message) => {
                message.clone()
            }
            other => other.to_string(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),

    #[error("Unknown node: {0}")]
    UnknownNode(String),

    #[error("Invalid node '{id}': {reason}")]
    InvalidNode { id: String, reason: String },

    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Unknown node/target: {0}")]
    UnknownTarget(String),

    #[error("Unknown dependency '{missing}' required by '{node}'")]
    UnknownDependency { node: String, missing: String },

    #[error("Cyclic dependency detected: {}", path.join(" -> "))]
    CyclicDependency { path: Vec<String> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_drops_the_variant_prefix() {
        assert_eq!(NodeError::failed("division by zero").message(), "division by zero");
        assert_eq!(NodeError::Configuration("bad path".into()).message(), "bad path");
        assert_eq!(
            NodeError::MissingParam("limit".into()).message(),
            "Missing parameter: limit"
        );
        assert_eq!(
            NodeError::failed("division by zero").to_string(),
            "Execution failed: division by zero"
        );
    }
}
