use crate::support::{column, dataset_rows, require_str, resolve_optional, Threshold};
use quailcore::{
    Check, CheckResult, CheckStatus, ExecutionContext, NodeBehavior, NodeError, NodeKind, Value,
};
use quailruntime::{NodeFactory, NodeMetadata, NodeSpec, OptionDefinition};
use std::collections::HashSet;

fn bounds_label(min: Option<f64>, max: Option<f64>) -> String {
    let fmt = |b: Option<f64>| {
        b.map(|v| Value::from(v).to_string())
            .unwrap_or_else(|| "-".to_string())
    };
    format!("[{}, {}]", fmt(min), fmt(max))
}

fn within(value: f64, min: Option<f64>, max: Option<f64>) -> bool {
    min.map_or(true, |m| value >= m) && max.map_or(true, |m| value <= m)
}

/// Comparison key for uniqueness; whole numbers key by their exact integer
fn unique_key(value: &Value, column: &str) -> Result<String, NodeError> {
    if let Some(i) = value.as_i64() {
        return Ok(i.to_string());
    }
    serde_json::to_string(value)
        .map_err(|e| NodeError::failed(format!("cannot compare '{}': {}", column, e)))
}

fn empty_dataset(id: &str, dataset: &str) -> CheckResult {
    CheckResult::skip(id).with_description(format!("dataset '{}' is empty", dataset))
}

/// Number of records must fall within `[min, max]`
pub struct RowCountCheck {
    id: String,
    dataset: String,
    min: Option<Threshold>,
    max: Option<Threshold>,
}

impl Check for RowCountCheck {
    fn run(&self, ctx: &mut ExecutionContext) -> Result<CheckResult, NodeError> {
        let min = resolve_optional(&self.min, ctx)?;
        let max = resolve_optional(&self.max, ctx)?;
        let rows = dataset_rows(ctx, &self.dataset)?.len();

        let status = if within(rows as f64, min, max) {
            CheckStatus::Pass
        } else {
            CheckStatus::Fail
        };

        let mut result = CheckResult::new(self.id.clone(), status)
            .with_metric("row_count", rows)
            .with_description(format!("{} rows, expected {}", rows, bounds_label(min, max)));
        if let Some(min) = min {
            result = result.with_metric("min", min);
        }
        if let Some(max) = max {
            result = result.with_metric("max", max);
        }
        Ok(result)
    }
}

pub struct RowCountFactory;

impl NodeFactory for RowCountFactory {
    fn node_type(&self) -> &str {
        "check.row_count"
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Check
    }

    fn create(&self, spec: &NodeSpec) -> Result<NodeBehavior, NodeError> {
        let check = RowCountCheck {
            id: spec.id.clone(),
            dataset: require_str(spec, "dataset")?,
            min: Threshold::from_config(spec, "min")?,
            max: Threshold::from_config(spec, "max")?,
        };
        Ok(NodeBehavior::check(spec.severity_or_default(), check))
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Checks the number of records in a dataset".to_string(),
            category: "volume".to_string(),
            options: vec![
                OptionDefinition::required("dataset", "Context key of the dataset"),
                OptionDefinition::optional("min", "Minimum row count, number or \"$param\""),
                OptionDefinition::optional("max", "Maximum row count, number or \"$param\""),
            ],
        }
    }
}

/// No record may leave `column` null or missing
pub struct NotNullCheck {
    id: String,
    dataset: String,
    column: String,
}

impl Check for NotNullCheck {
    fn run(&self, ctx: &mut ExecutionContext) -> Result<CheckResult, NodeError> {
        let rows = dataset_rows(ctx, &self.dataset)?;
        if rows.is_empty() {
            return Ok(empty_dataset(&self.id, &self.dataset));
        }

        let nulls = rows.iter().filter(|row| column(row, &self.column).is_null()).count();
        let status = if nulls == 0 { CheckStatus::Pass } else { CheckStatus::Fail };

        Ok(CheckResult::new(self.id.clone(), status)
            .with_metric("null_count", nulls)
            .with_metric("row_count", rows.len())
            .with_description(format!(
                "{} of {} rows have no '{}'",
                nulls,
                rows.len(),
                self.column
            )))
    }
}

pub struct NotNullFactory;

impl NodeFactory for NotNullFactory {
    fn node_type(&self) -> &str {
        "check.not_null"
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Check
    }

    fn create(&self, spec: &NodeSpec) -> Result<NodeBehavior, NodeError> {
        let check = NotNullCheck {
            id: spec.id.clone(),
            dataset: require_str(spec, "dataset")?,
            column: require_str(spec, "column")?,
        };
        Ok(NodeBehavior::check(spec.severity_or_default(), check))
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Checks that a column is always present".to_string(),
            category: "completeness".to_string(),
            options: vec![
                OptionDefinition::required("dataset", "Context key of the dataset"),
                OptionDefinition::required("column", "Column name"),
            ],
        }
    }
}

/// Non-null values of `column` must be distinct
pub struct UniqueCheck {
    id: String,
    dataset: String,
    column: String,
}

impl Check for UniqueCheck {
    fn run(&self, ctx: &mut ExecutionContext) -> Result<CheckResult, NodeError> {
        let rows = dataset_rows(ctx, &self.dataset)?;
        if rows.is_empty() {
            return Ok(empty_dataset(&self.id, &self.dataset));
        }

        let mut seen = HashSet::new();
        let mut duplicates = 0usize;
        for value in rows.iter().map(|row| column(row, &self.column)) {
            if value.is_null() {
                continue;
            }
            if !seen.insert(unique_key(value, &self.column)?) {
                duplicates += 1;
            }
        }

        let status = if duplicates == 0 { CheckStatus::Pass } else { CheckStatus::Fail };
        Ok(CheckResult::new(self.id.clone(), status)
            .with_metric("duplicate_count", duplicates)
            .with_metric("distinct_count", seen.len()))
    }
}

pub struct UniqueFactory;

impl NodeFactory for UniqueFactory {
    fn node_type(&self) -> &str {
        "check.unique"
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Check
    }

    fn create(&self, spec: &NodeSpec) -> Result<NodeBehavior, NodeError> {
        let check = UniqueCheck {
            id: spec.id.clone(),
            dataset: require_str(spec, "dataset")?,
            column: require_str(spec, "column")?,
        };
        Ok(NodeBehavior::check(spec.severity_or_default(), check))
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Checks that a column holds no duplicate values".to_string(),
            category: "uniqueness".to_string(),
            options: vec![
                OptionDefinition::required("dataset", "Context key of the dataset"),
                OptionDefinition::required("column", "Column name"),
            ],
        }
    }
}

/// Numeric values of `column` must fall within `[min, max]`; nulls are ignored
pub struct RangeCheck {
    id: String,
    dataset: String,
    column: String,
    min: Option<Threshold>,
    max: Option<Threshold>,
}

impl Check for RangeCheck {
    fn run(&self, ctx: &mut ExecutionContext) -> Result<CheckResult, NodeError> {
        let min = resolve_optional(&self.min, ctx)?;
        let max = resolve_optional(&self.max, ctx)?;
        let rows = dataset_rows(ctx, &self.dataset)?;
        if rows.is_empty() {
            return Ok(empty_dataset(&self.id, &self.dataset));
        }

        let mut out_of_range = 0usize;
        let mut non_numeric = 0usize;
        for value in rows.iter().map(|row| column(row, &self.column)) {
            if value.is_null() {
                continue;
            }
            match value.as_f64() {
                Some(n) if !within(n, min, max) => out_of_range += 1,
                Some(_) => {}
                None => non_numeric += 1,
            }
        }

        let status = if out_of_range + non_numeric == 0 {
            CheckStatus::Pass
        } else {
            CheckStatus::Fail
        };
        let description = format!("'{}' expected within {}", self.column, bounds_label(min, max));
        Ok(CheckResult::new(self.id.clone(), status)
            .with_metric("out_of_range", out_of_range)
            .with_metric("non_numeric", non_numeric)
            .with_description(description))
    }
}

pub struct RangeFactory;

impl NodeFactory for RangeFactory {
    fn node_type(&self) -> &str {
        "check.range"
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Check
    }

    fn create(&self, spec: &NodeSpec) -> Result<NodeBehavior, NodeError> {
        let min = Threshold::from_config(spec, "min")?;
        let max = Threshold::from_config(spec, "max")?;
        if min.is_none() && max.is_none() {
            return Err(NodeError::Configuration(format!(
                "'{}' needs at least one of 'min' or 'max'",
                spec.id
            )));
        }

        let check = RangeCheck {
            id: spec.id.clone(),
            dataset: require_str(spec, "dataset")?,
            column: require_str(spec, "column")?,
            min,
            max,
        };
        Ok(NodeBehavior::check(spec.severity_or_default(), check))
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Checks that numeric values lie within bounds".to_string(),
            category: "validity".to_string(),
            options: vec![
                OptionDefinition::required("dataset", "Context key of the dataset"),
                OptionDefinition::required("column", "Column name"),
                OptionDefinition::optional("min", "Inclusive lower bound, number or \"$param\""),
                OptionDefinition::optional("max", "Inclusive upper bound, number or \"$param\""),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_render_open_ends() {
        assert_eq!(bounds_label(Some(1.0), None), "[1, -]");
        assert_eq!(bounds_label(None, Some(2.5)), "[-, 2.5]");
    }

    #[test]
    fn test_within_is_inclusive() {
        assert!(within(1.0, Some(1.0), Some(1.0)));
        assert!(!within(0.5, Some(1.0), None));
        assert!(within(1e9, None, None));
    }
}
