use crate::registry::NodeRegistry;
use crate::resolver::DependencyResolver;
use crate::summary::RunSummary;
use chrono::Utc;
use indexmap::IndexMap;
use quailcore::{
    Artifact, Check, CheckResult, CheckStatus, Environment, EventBus, ExecutionContext,
    NodeBehavior, NodeKind, Params, QuailError, ResolveError, RunEvent, RunId, Severity, Task,
    Value,
};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome of one node in a run
#[derive(Debug, Clone)]
pub enum NodeResult {
    Task(Value),
    Check(CheckResult),
}

impl NodeResult {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeResult::Task(_) => NodeKind::Task,
            NodeResult::Check(_) => NodeKind::Check,
        }
    }

    pub fn as_task(&self) -> Option<&Value> {
        match self {
            NodeResult::Task(v) => Some(v),
            NodeResult::Check(_) => None,
        }
    }

    pub fn as_check(&self) -> Option<&CheckResult> {
        match self {
            NodeResult::Check(c) => Some(c),
            NodeResult::Task(_) => None,
        }
    }
}

/// Everything a run produced
#[derive(Debug)]
pub struct RunReport {
    pub run_id: RunId,
    /// Node results in execution order
    pub results: IndexMap<String, NodeResult>,
    pub summary: RunSummary,
    /// The run's context, kept for introspection
    pub context: ExecutionContext,
}

impl RunReport {
    pub fn get(&self, node_id: &str) -> Option<&NodeResult> {
        self.results.get(node_id)
    }

    pub fn check(&self, node_id: &str) -> Option<&CheckResult> {
        self.get(node_id).and_then(NodeResult::as_check)
    }

    pub fn task(&self, node_id: &str) -> Option<&Value> {
        self.get(node_id).and_then(NodeResult::as_task)
    }
}

/// Runs resolved node orders against a fresh context.
///
/// Execution is sequential: a node starts only after its predecessor in the
/// order has returned. Task failures abort the run; check failures are
/// captured as `error` results.
pub struct Runner {
    registry: Arc<NodeRegistry>,
    env: Arc<Environment>,
    params: Arc<Params>,
    workdir: PathBuf,
    events: Option<Arc<EventBus>>,
}

impl Runner {
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self {
            registry,
            env: Arc::new(Environment::new()),
            params: Arc::new(Params::new()),
            workdir: PathBuf::from("."),
            events: None,
        }
    }

    pub fn with_env(mut self, env: Environment) -> Self {
        self.env = Arc::new(env);
        self
    }

    pub fn with_shared_env(mut self, env: Arc<Environment>) -> Self {
        self.env = env;
        self
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = Arc::new(params);
        self
    }

    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = workdir.into();
        self
    }

    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// Execution order for `targets` without running anything
    pub fn resolve<S: AsRef<str>>(&self, targets: &[S]) -> Result<Vec<String>, ResolveError> {
        DependencyResolver::new(&self.registry).resolve(targets)
    }

    /// Resolve `targets` and run every node of the order once
    pub fn run<S: AsRef<str>>(&self, targets: &[S]) -> quailcore::Result<RunReport> {
        let run_id = RunId::new_v4();
        let start_time = Instant::now();

        let order = match self.resolve(targets) {
            Ok(order) => order,
            Err(e) => {
                tracing::error!("Resolution failed: {}", e);
                self.emit(RunEvent::RunFailed {
                    run_id,
                    node_id: None,
                    error: e.to_string(),
                    timestamp: Utc::now(),
                });
                return Err(e.into());
            }
        };

        self.emit(RunEvent::RunStarted {
            run_id,
            targets: targets.iter().map(|t| t.as_ref().to_string()).collect(),
            order: order.clone(),
            timestamp: Utc::now(),
        });
        tracing::info!("Starting run {} ({} nodes)", run_id, order.len());

        let mut ctx = self.new_context(run_id);
        let mut results = IndexMap::with_capacity(order.len());
        let mut summary = RunSummary::new(run_id);

        for node_id in &order {
            let descriptor = self.registry.lookup(node_id)?;

            self.emit(RunEvent::NodeStarted {
                run_id,
                node_id: node_id.clone(),
                kind: descriptor.kind(),
                timestamp: Utc::now(),
            });

            match descriptor.behavior() {
                NodeBehavior::Task(task) => {
                    let (value, cached, duration) =
                        self.run_task(run_id, node_id, task.as_ref(), &mut ctx)?;
                    summary.record_task(node_id, cached, duration);
                    results.insert(node_id.clone(), NodeResult::Task(value));
                }
                NodeBehavior::Check { severity, check } => {
                    let (result, cached) =
                        self.run_check(run_id, node_id, *severity, check.as_ref(), &mut ctx);
                    summary.record_check(&result, cached);
                    results.insert(node_id.clone(), NodeResult::Check(result));
                }
            }
        }

        summary.duration = start_time.elapsed();
        tracing::info!(
            "Run {} finished in {}ms: tasks {} | checks {} pass, {} fail, {} skip, {} error",
            run_id,
            summary.duration.as_millis(),
            summary.tasks_run,
            summary.checks.pass,
            summary.checks.fail,
            summary.checks.skip,
            summary.checks.error
        );
        self.emit(RunEvent::RunCompleted {
            run_id,
            tasks_run: summary.tasks_run,
            passed: summary.checks.pass,
            failed: summary.checks.fail,
            skipped: summary.checks.skip,
            errored: summary.checks.error,
            duration_ms: millis(summary.duration),
            timestamp: Utc::now(),
        });

        Ok(RunReport {
            run_id,
            results,
            summary,
            context: ctx,
        })
    }

    fn new_context(&self, run_id: RunId) -> ExecutionContext {
        let ctx = ExecutionContext::new(self.env.clone(), self.params.clone())
            .with_workdir(self.workdir.clone());
        match &self.events {
            Some(bus) => ctx.with_events(bus.create_emitter(run_id)),
            None => ctx,
        }
    }

    /// Memoized producer: an id already present in the context is reused.
    fn run_task(
        &self,
        run_id: RunId,
        node_id: &str,
        task: &dyn Task,
        ctx: &mut ExecutionContext,
    ) -> quailcore::Result<(Value, bool, Duration)> {
        if let Some(artifact) = ctx.get(node_id) {
            tracing::debug!("Reusing cached artifact for task '{}'", node_id);
            let value = match artifact {
                Artifact::Value(v) => v.clone(),
                Artifact::Check(c) => Value::from(serde_json::to_value(c)?),
            };
            self.emit(RunEvent::TaskCompleted {
                run_id,
                node_id: node_id.to_string(),
                cached: true,
                duration_ms: 0,
                timestamp: Utc::now(),
            });
            return Ok((value, true, Duration::ZERO));
        }

        tracing::info!("running: {} [task]", node_id);
        let started = Instant::now();
        ctx.enter_node(node_id);
        let outcome = task.run(ctx);
        ctx.leave_node();
        let duration = started.elapsed();

        let value = match outcome {
            Ok(value) => value,
            Err(source) => {
                tracing::error!("Task '{}' failed: {}", node_id, source);
                self.emit(RunEvent::RunFailed {
                    run_id,
                    node_id: Some(node_id.to_string()),
                    error: source.to_string(),
                    timestamp: Utc::now(),
                });
                return Err(QuailError::TaskFailed {
                    node: node_id.to_string(),
                    source,
                });
            }
        };

        ctx.put(node_id, value.clone());
        if let Value::Object(entries) = &value {
            for (key, entry) in entries {
                ctx.put(key.clone(), entry.clone());
            }
        }

        tracing::info!("done: {} ({}ms)", node_id, duration.as_millis());
        self.emit(RunEvent::TaskCompleted {
            run_id,
            node_id: node_id.to_string(),
            cached: false,
            duration_ms: millis(duration),
            timestamp: Utc::now(),
        });
        Ok((value, false, duration))
    }

    /// Check invocation behind a containment boundary; never fails the run.
    fn run_check(
        &self,
        run_id: RunId,
        node_id: &str,
        severity: Severity,
        check: &dyn Check,
        ctx: &mut ExecutionContext,
    ) -> (CheckResult, bool) {
        if let Some(artifact) = ctx.get(node_id) {
            tracing::debug!("Reusing cached result for check '{}'", node_id);
            let result = match artifact {
                Artifact::Check(result) => result.clone(),
                Artifact::Value(value) => {
                    let now = Utc::now();
                    CheckResult::error(
                        node_id,
                        format!(
                            "artifact '{}' holds a {} value, not a check result",
                            node_id,
                            value.type_name()
                        ),
                    )
                    .normalized(node_id, severity, now, now)
                }
            };
            self.emit_check(run_id, &result, true);
            return (result, true);
        }

        tracing::info!("running: {} [check]", node_id);
        let started = Utc::now();
        ctx.enter_node(node_id);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| check.run(ctx)));
        ctx.leave_node();
        let finished = Utc::now();

        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => CheckResult::error(node_id, e.message()).with_timing(started, finished),
            Err(payload) => CheckResult::error(node_id, panic_message(payload.as_ref()))
                .with_timing(started, finished),
        }
        .normalized(node_id, severity, started, finished);

        ctx.put(node_id, result.clone());
        log_verdict(&result);
        self.emit_check(run_id, &result, false);
        (result, false)
    }

    fn emit_check(&self, run_id: RunId, result: &CheckResult, cached: bool) {
        self.emit(RunEvent::CheckCompleted {
            run_id,
            node_id: result.id().to_string(),
            status: result.status(),
            severity: result.severity(),
            cached,
            duration_ms: millis(result.duration()),
            metrics: result.metrics().clone(),
            error: result.error_message().map(str::to_string),
            timestamp: Utc::now(),
        });
    }

    fn emit(&self, event: RunEvent) {
        if let Some(bus) = &self.events {
            bus.emit(event);
        }
    }
}

fn log_verdict(result: &CheckResult) {
    let ms = result.duration().as_millis();
    let metrics = metric_snippet(result);
    match result.status() {
        CheckStatus::Pass => {
            tracing::info!("PASS: {} [{}] ({}ms){}", result.id(), result.severity(), ms, metrics)
        }
        CheckStatus::Skip => {
            tracing::info!("SKIP: {} [{}] ({}ms){}", result.id(), result.severity(), ms, metrics)
        }
        CheckStatus::Fail => {
            tracing::warn!("FAIL: {} [{}] ({}ms){}", result.id(), result.severity(), ms, metrics)
        }
        CheckStatus::Error => tracing::warn!(
            "ERROR: {} [{}] ({}ms): {}",
            result.id(),
            result.severity(),
            ms,
            result.error_message().unwrap_or("unknown error")
        ),
    }
}

/// First two metrics as `k=v`, values shortened to 80 chars
fn metric_snippet(result: &CheckResult) -> String {
    result
        .metrics()
        .iter()
        .take(2)
        .map(|(k, v)| format!(" {}={}", k, shorten(&v.to_string(), 80)))
        .collect()
}

fn shorten(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "check panicked".to_string()
    }
}

fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shorten_truncates_long_values() {
        assert_eq!(shorten("abc", 80), "abc");
        let long = "x".repeat(100);
        let short = shorten(&long, 80);
        assert_eq!(short.chars().count(), 80);
        assert!(short.ends_with("..."));
    }

    #[test]
    fn test_panic_payloads_become_messages() {
        let err = panic::catch_unwind(|| panic!("static message")).unwrap_err();
        assert_eq!(panic_message(err.as_ref()), "static message");

        let err = panic::catch_unwind(|| panic!("formatted {}", 42)).unwrap_err();
        assert_eq!(panic_message(err.as_ref()), "formatted 42");
    }
}
