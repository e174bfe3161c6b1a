use quailcore::{
    CheckStatus, Environment, EventBus, ExecutionContext, MessageLevel, Params, RunEvent, Severity,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

#[tokio::test]
async fn test_node_messages_reach_subscribers() {
    init_tracing();

    let bus = EventBus::new(16);
    let mut events = bus.subscribe();
    let run_id = Uuid::new_v4();

    let mut ctx = ExecutionContext::new(Arc::new(Environment::new()), Arc::new(Params::new()))
        .with_events(bus.create_emitter(run_id));
    ctx.enter_node("orders");
    ctx.info("loaded 3 rows");
    ctx.leave_node();
    ctx.warn("after the node");

    match events.recv().await.unwrap() {
        RunEvent::NodeMessage {
            run_id: id,
            node_id,
            level,
            message,
            ..
        } => {
            assert_eq!(id, run_id);
            assert_eq!(node_id, "orders");
            assert_eq!(level, MessageLevel::Info);
            assert_eq!(message, "loaded 3 rows");
        }
        other => panic!("unexpected event: {:?}", other),
    }

    match events.recv().await.unwrap() {
        RunEvent::NodeMessage { node_id, level, .. } => {
            assert_eq!(node_id, "-");
            assert_eq!(level, MessageLevel::Warning);
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_emitting_without_subscribers_is_silent() {
    let bus = EventBus::new(4);
    let emitter = bus.create_emitter(Uuid::new_v4());
    for i in 0..10 {
        emitter.message("n", MessageLevel::Info, format!("message {}", i));
    }

    // late subscribers only see what comes after them
    let mut events = bus.subscribe();
    emitter.message("n", MessageLevel::Info, "last");
    match events.recv().await.unwrap() {
        RunEvent::NodeMessage { message, .. } => assert_eq!(message, "last"),
        other => panic!("unexpected event: {:?}", other),
    }
}

#[test]
fn test_events_serialize_with_type_tag() {
    let event = RunEvent::CheckCompleted {
        run_id: Uuid::nil(),
        node_id: "ids_unique".to_string(),
        status: CheckStatus::Fail,
        severity: Severity::Warning,
        cached: false,
        duration_ms: 3,
        metrics: BTreeMap::from([("duplicate_count".to_string(), 2_i64.into())]),
        error: None,
        timestamp: chrono::Utc::now(),
    };

    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "CheckCompleted");
    assert_eq!(json["status"], "fail");
    assert_eq!(json["severity"], "warning");
    assert_eq!(json["metrics"]["duplicate_count"], 2.0);

    let back: RunEvent = serde_json::from_value(json).unwrap();
    assert!(matches!(back, RunEvent::CheckCompleted { status: CheckStatus::Fail, .. }));
}
