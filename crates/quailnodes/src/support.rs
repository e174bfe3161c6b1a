use quailcore::{ExecutionContext, NodeError, Value};
use quailruntime::NodeSpec;
use std::collections::BTreeMap;

pub(crate) fn require_str(spec: &NodeSpec, key: &str) -> Result<String, NodeError> {
    match spec.config.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(other) => Err(NodeError::InvalidInputType {
            field: key.to_string(),
            expected: "non-empty string".to_string(),
            actual: other.type_name().to_string(),
        }),
        None => Err(NodeError::Configuration(format!(
            "'{}' requires option '{}'",
            spec.id, key
        ))),
    }
}

pub(crate) fn optional_str(spec: &NodeSpec, key: &str) -> Result<Option<String>, NodeError> {
    match spec.config.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => require_str(spec, key).map(Some),
    }
}

/// A numeric bound, given literally or as `"$param"`
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Threshold {
    Literal(f64),
    Param(String),
}

impl Threshold {
    pub(crate) fn from_config(spec: &NodeSpec, key: &str) -> Result<Option<Self>, NodeError> {
        match spec.config.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) if value.is_number() => Ok(value.as_f64().map(Threshold::Literal)),
            Some(Value::String(s)) if s.len() > 1 && s.starts_with('$') => {
                Ok(Some(Threshold::Param(s[1..].to_string())))
            }
            Some(other) => Err(NodeError::InvalidInputType {
                field: key.to_string(),
                expected: "number or \"$param\"".to_string(),
                actual: other.type_name().to_string(),
            }),
        }
    }

    pub(crate) fn resolve(&self, ctx: &ExecutionContext) -> Result<f64, NodeError> {
        match self {
            Threshold::Literal(n) => Ok(*n),
            Threshold::Param(name) => match ctx.require_param(name)? {
                value if value.is_number() => Ok(value.as_f64().unwrap_or_default()),
                Value::String(s) => {
                    s.trim()
                        .parse::<f64>()
                        .map_err(|_| NodeError::InvalidInputType {
                            field: name.clone(),
                            expected: "number".to_string(),
                            actual: format!("string '{}'", s),
                        })
                }
                other => Err(NodeError::InvalidInputType {
                    field: name.clone(),
                    expected: "number".to_string(),
                    actual: other.type_name().to_string(),
                }),
            },
        }
    }
}

pub(crate) fn resolve_optional(
    threshold: &Option<Threshold>,
    ctx: &ExecutionContext,
) -> Result<Option<f64>, NodeError> {
    threshold.as_ref().map(|t| t.resolve(ctx)).transpose()
}

/// Rows of a dataset artifact, which must be an array
pub(crate) fn dataset_rows<'a>(
    ctx: &'a ExecutionContext,
    dataset: &str,
) -> Result<&'a [Value], NodeError> {
    let value = ctx.require_value(dataset)?;
    value.as_array().ok_or_else(|| NodeError::InvalidInputType {
        field: dataset.to_string(),
        expected: "array of records".to_string(),
        actual: value.type_name().to_string(),
    })
}

/// Value of `column` in a record; missing fields and non-objects read as null
pub(crate) fn column<'a>(row: &'a Value, column: &str) -> &'a Value {
    const NULL: &Value = &Value::Null;
    row.field(column).unwrap_or(NULL)
}

/// Wrap dataset rows for publication under an extra context key
pub(crate) fn publish(rows: Vec<Value>, publish_as: &Option<String>) -> Value {
    match publish_as {
        Some(key) => {
            let mut out = BTreeMap::new();
            out.insert(key.clone(), Value::Array(rows));
            Value::Object(out)
        }
        None => Value::Array(rows),
    }
}
