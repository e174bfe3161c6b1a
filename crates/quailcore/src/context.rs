use crate::events::{EventEmitter, MessageLevel};
use crate::{CheckResult, NodeError, Value};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Pipeline parameters, read-only during a run
pub type Params = BTreeMap<String, Value>;

/// Named resources supplied by the caller (database handles, pools, settings).
///
/// The core only reads these; ownership and shutdown stay with whoever built
/// the environment.
#[derive(Clone, Default)]
pub struct Environment {
    resources: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment whose entries are plain values, as read from configuration
    pub fn from_values(values: impl IntoIterator<Item = (String, Value)>) -> Self {
        let mut env = Self::new();
        for (key, value) in values {
            env.insert(key, value);
        }
        env
    }

    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, resource: T) {
        self.resources.insert(key.into(), Arc::new(resource));
    }

    pub fn insert_shared(&mut self, key: impl Into<String>, resource: Arc<dyn Any + Send + Sync>) {
        self.resources.insert(key.into(), resource);
    }

    pub fn with<T: Any + Send + Sync>(mut self, key: impl Into<String>, resource: T) -> Self {
        self.insert(key, resource);
        self
    }

    /// Typed lookup; `None` when absent or of another type
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.resources.get(key).and_then(|r| r.downcast_ref::<T>())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.resources.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.keys().collect();
        keys.sort_unstable();
        f.debug_struct("Environment").field("keys", &keys).finish()
    }
}

/// Something stored in the artifact store
#[derive(Debug, Clone)]
pub enum Artifact {
    Value(Value),
    Check(CheckResult),
}

impl Artifact {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Artifact::Value(v) => Some(v),
            Artifact::Check(_) => None,
        }
    }

    pub fn as_check(&self) -> Option<&CheckResult> {
        match self {
            Artifact::Check(c) => Some(c),
            Artifact::Value(_) => None,
        }
    }
}

impl From<Value> for Artifact {
    fn from(value: Value) -> Self {
        Artifact::Value(value)
    }
}

impl From<CheckResult> for Artifact {
    fn from(result: CheckResult) -> Self {
        Artifact::Check(result)
    }
}

/// Scratch space for exactly one run.
///
/// Access is sequential: the executor hands a `&mut` to one node at a time,
/// so there is no internal locking.
pub struct ExecutionContext {
    env: Arc<Environment>,
    params: Arc<Params>,
    artifacts: HashMap<String, Artifact>,
    workdir: PathBuf,
    events: Option<EventEmitter>,
    current_node: Option<String>,
}

impl ExecutionContext {
    pub fn new(env: Arc<Environment>, params: Arc<Params>) -> Self {
        Self {
            env,
            params,
            artifacts: HashMap::new(),
            workdir: PathBuf::from("."),
            events: None,
            current_node: None,
        }
    }

    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = workdir.into();
        self
    }

    pub fn with_events(mut self, emitter: EventEmitter) -> Self {
        self.events = Some(emitter);
        self
    }

    /// Store an artifact, replacing any previous value under `key`
    pub fn put(&mut self, key: impl Into<String>, artifact: impl Into<Artifact>) {
        self.artifacts.insert(key.into(), artifact.into());
    }

    pub fn get(&self, key: &str) -> Option<&Artifact> {
        self.artifacts.get(key)
    }

    /// Stored artifact or `default`; never fails
    pub fn get_or(&self, key: &str, default: impl Into<Artifact>) -> Artifact {
        self.artifacts
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.into())
    }

    pub fn has(&self, key: &str) -> bool {
        self.artifacts.contains_key(key)
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.get(key).and_then(Artifact::as_value)
    }

    /// Value artifact or `MissingArtifact`
    pub fn require_value(&self, key: &str) -> Result<&Value, NodeError> {
        match self.get(key) {
            Some(Artifact::Value(v)) => Ok(v),
            Some(Artifact::Check(_)) => Err(NodeError::InvalidInputType {
                field: key.to_string(),
                expected: "value".to_string(),
                actual: "check result".to_string(),
            }),
            None => Err(NodeError::MissingArtifact(key.to_string())),
        }
    }

    pub fn check_result(&self, key: &str) -> Option<&CheckResult> {
        self.get(key).and_then(Artifact::as_check)
    }

    pub fn artifacts(&self) -> impl Iterator<Item = (&str, &Artifact)> {
        self.artifacts.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    pub fn require_param(&self, key: &str) -> Result<&Value, NodeError> {
        self.param(key)
            .ok_or_else(|| NodeError::MissingParam(key.to_string()))
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn env<T: Any>(&self, key: &str) -> Option<&T> {
        self.env.get(key)
    }

    pub fn require_env<T: Any>(&self, key: &str) -> Result<&T, NodeError> {
        self.env
            .get(key)
            .ok_or_else(|| NodeError::MissingResource(key.to_string()))
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Resolve a possibly relative path against the workdir
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workdir.join(path)
        }
    }

    /// Record which node is about to run, so messages are attributed to it
    pub fn enter_node(&mut self, node_id: &str) {
        self.current_node = Some(node_id.to_string());
    }

    pub fn leave_node(&mut self) {
        self.current_node = None;
    }

    pub fn current_node(&self) -> Option<&str> {
        self.current_node.as_deref()
    }

    pub fn info(&self, message: impl Into<String>) {
        self.message(MessageLevel::Info, message.into());
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.message(MessageLevel::Warning, message.into());
    }

    fn message(&self, level: MessageLevel, message: String) {
        let node = self.current_node.as_deref().unwrap_or("-");
        match level {
            MessageLevel::Info => tracing::info!(node, "{}", message),
            MessageLevel::Warning => tracing::warn!(node, "{}", message),
        }
        if let Some(events) = &self.events {
            events.message(node, level, message);
        }
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.artifacts.keys().collect();
        keys.sort_unstable();
        f.debug_struct("ExecutionContext")
            .field("env", &self.env)
            .field("params", &self.params)
            .field("artifacts", &keys)
            .field("workdir", &self.workdir)
            .finish()
    }
}
