use crate::Value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Verdict of a check. Closed set: anything else is coerced to `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum CheckStatus {
    Pass,
    Fail,
    Error,
    Skip,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Pass => "pass",
            CheckStatus::Fail => "fail",
            CheckStatus::Error => "error",
            CheckStatus::Skip => "skip",
        }
    }
}

impl From<&str> for CheckStatus {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "pass" => CheckStatus::Pass,
            "fail" => CheckStatus::Fail,
            "skip" => CheckStatus::Skip,
            _ => CheckStatus::Error,
        }
    }
}

impl From<String> for CheckStatus {
    fn from(s: String) -> Self {
        CheckStatus::from(s.as_str())
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much a failing check matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(Severity::Error),
            "warning" | "warn" => Ok(Severity::Warning),
            "info" => Ok(Severity::Info),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict produced by a check.
///
/// Built once and then only transformed by value; there are no setters.
/// Timestamps left unset report the construction instant until the
/// executor stamps them with the measured invocation bounds.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    id: String,
    status: CheckStatus,
    severity: Severity,
    metrics: BTreeMap<String, Value>,
    description: Option<String>,
    error: Option<String>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    created_at: DateTime<Utc>,
}

impl CheckResult {
    pub fn new(id: impl Into<String>, status: impl Into<CheckStatus>) -> Self {
        Self {
            id: id.into(),
            status: status.into(),
            severity: Severity::default(),
            metrics: BTreeMap::new(),
            description: None,
            error: None,
            started_at: None,
            finished_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn pass(id: impl Into<String>) -> Self {
        Self::new(id, CheckStatus::Pass)
    }

    pub fn fail(id: impl Into<String>) -> Self {
        Self::new(id, CheckStatus::Fail)
    }

    pub fn skip(id: impl Into<String>) -> Self {
        Self::new(id, CheckStatus::Skip)
    }

    pub fn error(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(id, CheckStatus::Error).with_error(message)
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metrics.insert(name.into(), value.into());
        self
    }

    pub fn with_metrics(mut self, metrics: BTreeMap<String, Value>) -> Self {
        self.metrics.extend(metrics);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    pub fn with_timing(mut self, started_at: DateTime<Utc>, finished_at: DateTime<Utc>) -> Self {
        self.started_at = Some(started_at);
        self.finished_at = Some(finished_at.max(started_at));
        self
    }

    /// Pins identity and severity to the declared values and fills unset
    /// timestamps with the given invocation bounds.
    pub fn normalized(
        mut self,
        id: &str,
        severity: Severity,
        started: DateTime<Utc>,
        finished: DateTime<Utc>,
    ) -> Self {
        if self.id != id {
            self.id = id.to_string();
        }
        self.severity = severity;
        let start = *self.started_at.get_or_insert(started);
        let end = self.finished_at.get_or_insert(finished);
        if *end < start {
            *end = start;
        }
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> CheckStatus {
        self.status
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn metrics(&self) -> &BTreeMap<String, Value> {
        &self.metrics
    }

    pub fn metric(&self, name: &str) -> Option<&Value> {
        self.metrics.get(name)
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at.unwrap_or(self.created_at)
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at.unwrap_or(self.created_at).max(self.started_at())
    }

    /// Whether both timestamps were set explicitly or by the executor.
    pub fn is_timed(&self) -> bool {
        self.started_at.is_some() && self.finished_at.is_some()
    }

    pub fn duration(&self) -> Duration {
        (self.finished_at() - self.started_at())
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}
