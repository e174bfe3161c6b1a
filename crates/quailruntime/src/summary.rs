use quailcore::{CheckResult, CheckStatus, NodeKind, RunId, Severity};
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

const RULE_WIDTH: usize = 72;

/// Outcome column of a summary row: "done" for tasks, the verdict for checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStatus {
    Done,
    Check(CheckStatus),
}

impl fmt::Display for RowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowStatus::Done => f.write_str("done"),
            RowStatus::Check(status) => f.write_str(status.as_str()),
        }
    }
}

impl Serialize for RowStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryRow {
    pub node_id: String,
    pub kind: NodeKind,
    pub status: RowStatus,
    pub severity: Option<Severity>,
    pub cached: bool,
    pub duration: Duration,
}

impl SummaryRow {
    /// Severity column, "-" for tasks
    pub fn severity_label(&self) -> &'static str {
        self.severity.map(|s| s.as_str()).unwrap_or("-")
    }
}

/// Check verdict counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CheckTally {
    pub pass: usize,
    pub fail: usize,
    pub skip: usize,
    pub error: usize,
}

impl CheckTally {
    pub fn record(&mut self, status: CheckStatus) {
        match status {
            CheckStatus::Pass => self.pass += 1,
            CheckStatus::Fail => self.fail += 1,
            CheckStatus::Skip => self.skip += 1,
            CheckStatus::Error => self.error += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.pass + self.fail + self.skip + self.error
    }
}

/// Per-run summary, derived from the executed order
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub rows: Vec<SummaryRow>,
    pub checks: CheckTally,
    /// Tasks whose callable was invoked
    pub tasks_run: usize,
    /// Nodes served from the memo cache
    pub cached: usize,
    pub duration: Duration,
}

impl RunSummary {
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            rows: Vec::new(),
            checks: CheckTally::default(),
            tasks_run: 0,
            cached: 0,
            duration: Duration::ZERO,
        }
    }

    pub fn record_task(&mut self, node_id: &str, cached: bool, duration: Duration) {
        if cached {
            self.cached += 1;
        } else {
            self.tasks_run += 1;
        }
        self.rows.push(SummaryRow {
            node_id: node_id.to_string(),
            kind: NodeKind::Task,
            status: RowStatus::Done,
            severity: None,
            cached,
            duration,
        });
    }

    pub fn record_check(&mut self, result: &CheckResult, cached: bool) {
        if cached {
            self.cached += 1;
        }
        self.checks.record(result.status());
        self.rows.push(SummaryRow {
            node_id: result.id().to_string(),
            kind: NodeKind::Check,
            status: RowStatus::Check(result.status()),
            severity: Some(result.severity()),
            cached,
            duration: result.duration(),
        });
    }

    /// True when a check of severity `error` failed or errored
    pub fn has_blocking_failures(&self) -> bool {
        self.rows.iter().any(|row| {
            row.severity == Some(Severity::Error)
                && matches!(
                    row.status,
                    RowStatus::Check(CheckStatus::Fail) | RowStatus::Check(CheckStatus::Error)
                )
        })
    }

    pub fn row(&self, node_id: &str) -> Option<&SummaryRow> {
        self.rows.iter().find(|row| row.node_id == node_id)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "─".repeat(RULE_WIDTH);
        writeln!(
            f,
            "• tasks: {} | checks: {} pass, {} fail, {} skip, {} error",
            self.tasks_run, self.checks.pass, self.checks.fail, self.checks.skip, self.checks.error
        )?;
        writeln!(f, "{}", rule)?;
        writeln!(
            f,
            "{:30} {:6} {:8} {:6} {:>8}",
            "node", "type", "status", "sev", "time(ms)"
        )?;
        writeln!(f, "{}", rule)?;
        for row in &self.rows {
            let name: String = row.node_id.chars().take(30).collect();
            let status = if row.cached {
                format!("{}*", row.status)
            } else {
                row.status.to_string()
            };
            writeln!(
                f,
                "{:30} {:6} {:8} {:6} {:>8.0}",
                name,
                row.kind.as_str(),
                status,
                row.severity_label(),
                row.duration.as_secs_f64() * 1000.0
            )?;
        }
        write!(f, "{}", rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_tally_and_blocking_failures() {
        let mut summary = RunSummary::new(Uuid::new_v4());
        summary.record_task("load", false, Duration::from_millis(3));
        summary.record_check(&CheckResult::pass("a").with_severity(Severity::Error), false);
        summary.record_check(&CheckResult::fail("b").with_severity(Severity::Warning), false);
        assert!(!summary.has_blocking_failures());

        summary.record_check(&CheckResult::error("c", "boom").with_severity(Severity::Error), true);
        assert!(summary.has_blocking_failures());

        assert_eq!(summary.tasks_run, 1);
        assert_eq!(summary.cached, 1);
        assert_eq!(
            summary.checks,
            CheckTally { pass: 1, fail: 1, skip: 0, error: 1 }
        );
        assert_eq!(summary.checks.total(), 3);
    }

    #[test]
    fn test_table_lists_rows_in_order() {
        let mut summary = RunSummary::new(Uuid::new_v4());
        summary.record_task("hello", false, Duration::from_millis(1));
        let skipped = CheckResult::skip("check_hello").with_severity(Severity::Info);
        summary.record_check(&skipped, false);

        let table = summary.to_string();
        let hello = table.find("hello").unwrap();
        let check = table.find("check_hello").unwrap();
        assert!(hello < check);
        assert!(table.contains("done"));
        assert!(table.contains("skip"));
        assert!(table.contains("info"));
        assert!(table.starts_with("• tasks: 1 | checks: 0 pass, 0 fail, 1 skip, 0 error"));

        let row = summary.row("hello").unwrap();
        assert_eq!(row.severity_label(), "-");
        assert_eq!(row.status.to_string(), "done");
    }
}
