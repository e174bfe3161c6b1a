use crate::{CheckStatus, NodeKind, Severity, Value};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::broadcast;
use uuid::Uuid;

pub type RunId = Uuid;

/// Events emitted during a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RunEvent {
    RunStarted {
        run_id: RunId,
        targets: Vec<String>,
        order: Vec<String>,
        timestamp: DateTime<Utc>,
    },
    NodeStarted {
        run_id: RunId,
        node_id: String,
        kind: NodeKind,
        timestamp: DateTime<Utc>,
    },
    TaskCompleted {
        run_id: RunId,
        node_id: String,
        cached: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    CheckCompleted {
        run_id: RunId,
        node_id: String,
        status: CheckStatus,
        severity: Severity,
        cached: bool,
        duration_ms: u64,
        metrics: BTreeMap<String, Value>,
        error: Option<String>,
        timestamp: DateTime<Utc>,
    },
    NodeMessage {
        run_id: RunId,
        node_id: String,
        level: MessageLevel,
        message: String,
        timestamp: DateTime<Utc>,
    },
    RunFailed {
        run_id: RunId,
        node_id: Option<String>,
        error: String,
        timestamp: DateTime<Utc>,
    },
    RunCompleted {
        run_id: RunId,
        tasks_run: usize,
        passed: usize,
        failed: usize,
        skipped: usize,
        errored: usize,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Warning,
}

/// Emitter bound to one run, handed to the context so nodes can report progress
#[derive(Clone)]
pub struct EventEmitter {
    run_id: RunId,
    sender: broadcast::Sender<RunEvent>,
}

impl EventEmitter {
    pub fn new(run_id: RunId, sender: broadcast::Sender<RunEvent>) -> Self {
        Self { run_id, sender }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn emit(&self, event: RunEvent) {
        let _ = self.sender.send(event);
    }

    /// Emit a message on behalf of a node
    pub fn message(&self, node_id: &str, level: MessageLevel, message: impl Into<String>) {
        self.emit(RunEvent::NodeMessage {
            run_id: self.run_id,
            node_id: node_id.to_string(),
            level,
            message: message.into(),
            timestamp: Utc::now(),
        });
    }
}

/// Broadcast bus for run events. Sending never blocks; events with no
/// subscriber are dropped.
pub struct EventBus {
    sender: broadcast::Sender<RunEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: RunEvent) {
        let _ = self.sender.send(event);
    }

    pub fn create_emitter(&self, run_id: RunId) -> EventEmitter {
        EventEmitter::new(run_id, self.sender.clone())
    }
}
