use crate::catalog::NodeCatalog;
use crate::config::PipelineConfig;
use crate::executor::{RunReport, Runner};
use crate::graph::DependencyGraph;
use crate::plan::ExecutionPlan;
use crate::registry::NodeRegistry;
use crate::targets::TargetGroups;
use quailcore::{Environment, EventBus, Params, ResolveError, RunEvent};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Configuration for assembling a pipeline
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Overrides the profile selected by the document or environment
    pub profile: Option<String>,
    /// Base directory for node paths; defaults to the config file's directory
    pub workdir: Option<PathBuf>,
    pub event_buffer_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            profile: None,
            workdir: None,
            event_buffer_size: 1000,
        }
    }
}

/// A configured pipeline: registry, environment, params and target groups
pub struct Pipeline {
    registry: Arc<NodeRegistry>,
    targets: TargetGroups,
    env: Arc<Environment>,
    params: Params,
    profile: String,
    workdir: PathBuf,
    event_bus: Arc<EventBus>,
}

impl Pipeline {
    /// Build a pipeline from a parsed document
    pub fn from_config(
        config: &PipelineConfig,
        catalog: &NodeCatalog,
        runtime: RuntimeConfig,
    ) -> quailcore::Result<Self> {
        let profile = config.resolve_profile(runtime.profile.as_deref());
        tracing::info!("Using profile: {}", profile);

        let mut registry = NodeRegistry::new();
        catalog.populate(&mut registry, &config.nodes)?;

        Ok(Self {
            registry: Arc::new(registry),
            targets: config.target_groups(),
            env: Arc::new(config.environment(&profile)),
            params: config.expanded_params(),
            profile,
            workdir: runtime.workdir.unwrap_or_else(|| PathBuf::from(".")),
            event_bus: Arc::new(EventBus::new(runtime.event_buffer_size)),
        })
    }

    /// Load a pipeline document from disk
    pub fn load(
        path: impl AsRef<Path>,
        catalog: &NodeCatalog,
        mut runtime: RuntimeConfig,
    ) -> quailcore::Result<Self> {
        let path = path.as_ref();
        let config = PipelineConfig::load(path)?;
        if runtime.workdir.is_none() {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            runtime.workdir = Some(dir.to_path_buf());
        }
        Self::from_config(&config, catalog, runtime)
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn targets(&self) -> &TargetGroups {
        &self.targets
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Subscribe to run events
    pub fn subscribe_events(&self) -> broadcast::Receiver<RunEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Runner bound to this pipeline's registry, env, params and event bus
    pub fn runner(&self) -> Runner {
        Runner::new(self.registry.clone())
            .with_shared_env(self.env.clone())
            .with_params(self.params.clone())
            .with_workdir(self.workdir.clone())
            .with_event_bus(self.event_bus.clone())
    }

    /// Expand group names, then run
    pub fn run<S: AsRef<str>>(&self, requested: &[S]) -> quailcore::Result<RunReport> {
        let targets = self.expand_targets(requested)?;
        self.runner().run(&targets)
    }

    /// Expand and resolve like `run`, without executing any node
    pub fn plan<S: AsRef<str>>(&self, requested: &[S]) -> quailcore::Result<ExecutionPlan> {
        let targets = self.expand_targets(requested)?;
        let order = self.runner().resolve(&targets)?;
        Ok(ExecutionPlan::from_order(&self.registry, targets, &order)?)
    }

    fn expand_targets<S: AsRef<str>>(&self, requested: &[S]) -> quailcore::Result<Vec<String>> {
        let targets = self.targets.expand(requested)?;
        if targets.is_empty() {
            return Err(quailcore::QuailError::Config("no targets to execute".to_string()));
        }
        Ok(targets)
    }

    /// Whole-registry graph, checked for unknown dependencies and cycles
    pub fn graph(&self) -> Result<DependencyGraph, ResolveError> {
        let graph = DependencyGraph::from_registry(&self.registry)?;
        graph.validate()?;
        Ok(graph)
    }
}
