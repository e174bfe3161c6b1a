use crate::registry::NodeRegistry;
use quailcore::{NodeKind, RegistryError, Severity};
use serde::Serialize;
use std::fmt;

/// One node of a dry run, in execution order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanStep {
    pub id: String,
    pub kind: NodeKind,
    pub requires: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
}

/// What a run would execute, without executing anything
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionPlan {
    pub targets: Vec<String>,
    pub steps: Vec<PlanStep>,
}

impl ExecutionPlan {
    /// Describe an already resolved `order`
    pub fn from_order(
        registry: &NodeRegistry,
        targets: Vec<String>,
        order: &[String],
    ) -> Result<Self, RegistryError> {
        let steps = order
            .iter()
            .map(|id| {
                let descriptor = registry.lookup(id)?;
                Ok(PlanStep {
                    id: descriptor.id().to_string(),
                    kind: descriptor.kind(),
                    requires: descriptor.requires().to_vec(),
                    severity: descriptor.severity(),
                })
            })
            .collect::<Result<Vec<_>, RegistryError>>()?;
        Ok(Self { targets, steps })
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, id: &str) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.id == id)
    }
}

impl fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Targets: {}", self.targets.join(", "))?;
        for (n, step) in self.steps.iter().enumerate() {
            let label = match step.severity {
                Some(severity) => format!("{}:{}", step.kind, severity),
                None => step.kind.to_string(),
            };
            write!(f, "{:>4}. {:30} [{}]", n + 1, step.id, label)?;
            if !step.requires.is_empty() {
                write!(f, " <- {}", step.requires.join(", "))?;
            }
            writeln!(f)?;
        }
        write!(f, "{} nodes", self.steps.len())
    }
}
