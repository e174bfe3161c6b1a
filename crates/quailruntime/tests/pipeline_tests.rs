use quailcore::{
    CheckResult, CheckStatus, ExecutionContext, NodeBehavior, NodeError, NodeKind, QuailError,
    RegistryError, ResolveError, Severity, Value,
};
use quailruntime::config::{masked_params, HIDDEN};
use quailruntime::{
    NodeCatalog, NodeFactory, NodeSpec, Pipeline, PipelineConfig, PlanStep, RuntimeConfig,
};
use std::sync::Arc;
use tempfile::TempDir;

/// Task publishing `config.value`
struct ConstFactory;

impl NodeFactory for ConstFactory {
    fn node_type(&self) -> &str {
        "test.const"
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Task
    }

    fn create(&self, spec: &NodeSpec) -> Result<NodeBehavior, NodeError> {
        let value = spec
            .config
            .get("value")
            .cloned()
            .ok_or_else(|| NodeError::Configuration("missing 'value'".to_string()))?;
        Ok(NodeBehavior::task(
            move |_: &mut ExecutionContext| -> Result<Value, NodeError> { Ok(value.clone()) },
        ))
    }
}

/// Check that artifact `config.key` equals `config.expected`
struct EqualsFactory;

impl NodeFactory for EqualsFactory {
    fn node_type(&self) -> &str {
        "test.equals"
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Check
    }

    fn create(&self, spec: &NodeSpec) -> Result<NodeBehavior, NodeError> {
        let id = spec.id.clone();
        let key = spec
            .config
            .get("key")
            .and_then(Value::as_str)
            .ok_or_else(|| NodeError::Configuration("missing 'key'".to_string()))?
            .to_string();
        let expected = spec.config.get("expected").cloned().unwrap_or_default();
        Ok(NodeBehavior::check(
            spec.severity_or_default(),
            move |ctx: &mut ExecutionContext| -> Result<CheckResult, NodeError> {
                let actual = ctx.require_value(&key)?;
                let status = if *actual == expected {
                    CheckStatus::Pass
                } else {
                    CheckStatus::Fail
                };
                Ok(CheckResult::new(id.clone(), status).with_metric("actual", actual.clone()))
            },
        ))
    }
}

fn catalog() -> NodeCatalog {
    let mut catalog = NodeCatalog::new();
    catalog.register(Arc::new(ConstFactory));
    catalog.register(Arc::new(EqualsFactory));
    catalog
}

const DOCUMENT: &str = r#"{
    "profile": "dev",
    "envs": {"dev": {"schema": "raw"}, "prod": {"schema": "live"}},
    "params": {"owner": "data-team"},
    "targets": {"daily": ["answer_ok"], "all": ["answer_ok", "answer_wrong"]},
    "default_target": "daily",
    "nodes": [
        {"id": "answer", "type": "test.const", "config": {"value": 42}},
        {"id": "answer_ok", "type": "test.equals", "requires": ["answer"],
         "config": {"key": "answer", "expected": 42}},
        {"id": "answer_wrong", "type": "test.equals", "requires": ["answer"], "severity": "warning",
         "config": {"key": "answer", "expected": 7}}
    ]
}"#;

#[test]
fn test_default_target_runs_when_nothing_is_requested() {
    let config = PipelineConfig::from_json_str(DOCUMENT).unwrap();
    let pipeline = Pipeline::from_config(&config, &catalog(), RuntimeConfig::default()).unwrap();

    let report = pipeline.run::<&str>(&[]).unwrap();
    let ids: Vec<&str> = report.results.keys().map(String::as_str).collect();
    assert_eq!(ids, vec!["answer", "answer_ok"]);
    assert_eq!(report.check("answer_ok").unwrap().status(), CheckStatus::Pass);
}

#[test]
fn test_groups_expand_and_severity_comes_from_config() {
    let config = PipelineConfig::from_json_str(DOCUMENT).unwrap();
    let pipeline = Pipeline::from_config(&config, &catalog(), RuntimeConfig::default()).unwrap();

    let report = pipeline.run(&["all"]).unwrap();
    let wrong = report.check("answer_wrong").unwrap();
    assert_eq!(wrong.status(), CheckStatus::Fail);
    assert_eq!(wrong.severity(), quailcore::Severity::Warning);
    assert_eq!(wrong.metric("actual"), Some(&Value::from(42_i64)));
    assert!(!report.summary.has_blocking_failures());
    assert_eq!(report.summary.checks.pass, 1);
    assert_eq!(report.summary.checks.fail, 1);
}

#[test]
fn test_explicit_profile_selects_environment() {
    let config = PipelineConfig::from_json_str(DOCUMENT).unwrap();
    let runtime = RuntimeConfig {
        profile: Some("prod".to_string()),
        ..Default::default()
    };
    let pipeline = Pipeline::from_config(&config, &catalog(), runtime).unwrap();
    assert_eq!(pipeline.profile(), "prod");

    let report = pipeline.run(&["answer"]).unwrap();
    let schema = report
        .context
        .env::<Value>("schema")
        .and_then(Value::as_str);
    assert_eq!(schema, Some("live"));
    assert_eq!(report.context.param("owner"), Some(&Value::from("data-team")));
}

#[test]
fn test_load_uses_the_config_directory_as_workdir() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("quail.json");
    std::fs::write(&path, DOCUMENT).unwrap();

    let pipeline = Pipeline::load(&path, &catalog(), RuntimeConfig::default()).unwrap();
    assert_eq!(pipeline.workdir(), dir.path());
    assert_eq!(pipeline.registry().list_ids().checks, vec!["answer_ok", "answer_wrong"]);

    let graph = pipeline.graph().unwrap();
    assert_eq!(graph.edge_count(), 2);
}

#[test]
fn test_unknown_node_type_is_rejected() {
    let config = PipelineConfig {
        nodes: vec![NodeSpec::new("x", "test.missing")],
        ..Default::default()
    };
    let err = Pipeline::from_config(&config, &catalog(), RuntimeConfig::default())
        .err()
        .unwrap();
    assert!(matches!(
        err,
        QuailError::Registry(RegistryError::UnknownNodeType(ref t)) if t == "test.missing"
    ));
}

#[test]
fn test_factory_errors_name_the_node() {
    let config = PipelineConfig {
        nodes: vec![NodeSpec::new("bad", "test.const")],
        ..Default::default()
    };
    let err = Pipeline::from_config(&config, &catalog(), RuntimeConfig::default())
        .err()
        .unwrap();
    assert!(matches!(
        err,
        QuailError::Registry(RegistryError::InvalidNode { ref id, .. }) if id == "bad"
    ));
}

#[test]
fn test_duplicate_ids_in_config_are_rejected() {
    let config = PipelineConfig {
        nodes: vec![
            NodeSpec::new("same", "test.const").with_config("value", 1_i64),
            NodeSpec::new("same", "test.equals").with_config("key", "same"),
        ],
        ..Default::default()
    };
    let err = Pipeline::from_config(&config, &catalog(), RuntimeConfig::default())
        .err()
        .unwrap();
    assert!(matches!(
        err,
        QuailError::Registry(RegistryError::DuplicateNode(ref id)) if id == "same"
    ));
}

#[test]
fn test_cyclic_config_fails_graph_validation_and_resolution() {
    let config = PipelineConfig {
        nodes: vec![
            NodeSpec::new("a", "test.const").with_config("value", 1_i64).requires("b"),
            NodeSpec::new("b", "test.const").with_config("value", 2_i64).requires("a"),
        ],
        ..Default::default()
    };
    let pipeline = Pipeline::from_config(&config, &catalog(), RuntimeConfig::default()).unwrap();

    assert!(matches!(pipeline.graph(), Err(ResolveError::CyclicDependency { .. })));
    assert!(matches!(
        pipeline.run(&["a"]),
        Err(QuailError::Resolve(ResolveError::CyclicDependency { .. }))
    ));
}

#[test]
fn test_plan_orders_nodes_without_running_them() {
    let config = PipelineConfig::from_json_str(DOCUMENT).unwrap();
    let pipeline = Pipeline::from_config(&config, &catalog(), RuntimeConfig::default()).unwrap();

    let plan = pipeline.plan(&["all"]).unwrap();
    assert_eq!(plan.targets, vec!["answer_ok", "answer_wrong"]);
    assert_eq!(plan.len(), 3);
    assert_eq!(
        plan.steps[0],
        PlanStep {
            id: "answer".to_string(),
            kind: NodeKind::Task,
            requires: vec![],
            severity: None,
        }
    );
    let wrong = plan.step("answer_wrong").unwrap();
    assert_eq!(wrong.kind, NodeKind::Check);
    assert_eq!(wrong.requires, vec!["answer"]);
    assert_eq!(wrong.severity, Some(Severity::Warning));

    let printed = plan.to_string();
    assert!(printed.starts_with("Targets: answer_ok, answer_wrong"));
    assert!(printed.contains("answer_wrong"));
    assert!(printed.contains("<- answer"));
    assert!(printed.ends_with("3 nodes"));
}

#[test]
fn test_plan_uses_the_default_group_and_rejects_unknown_targets() {
    let config = PipelineConfig::from_json_str(DOCUMENT).unwrap();
    let pipeline = Pipeline::from_config(&config, &catalog(), RuntimeConfig::default()).unwrap();

    let plan = pipeline.plan::<&str>(&[]).unwrap();
    let ids: Vec<&str> = plan.steps.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["answer", "answer_ok"]);

    assert!(matches!(
        pipeline.plan(&["missing"]),
        Err(QuailError::Resolve(ResolveError::UnknownTarget(_)))
    ));
}

#[test]
fn test_pipeline_params_print_with_credentials_hidden() {
    let document = r#"{
        "params": {"owner": "data-team", "db_password": "hunter2", "apiToken": "t0k"},
        "nodes": []
    }"#;
    let config = PipelineConfig::from_json_str(document).unwrap();
    let pipeline = Pipeline::from_config(&config, &catalog(), RuntimeConfig::default()).unwrap();

    let shown = masked_params(pipeline.params());
    assert_eq!(shown["owner"], Value::from("data-team"));
    assert_eq!(shown["db_password"], Value::from(HIDDEN));
    assert_eq!(shown["apiToken"], Value::from(HIDDEN));
    assert_eq!(pipeline.params()["db_password"], Value::from("hunter2"));
}
