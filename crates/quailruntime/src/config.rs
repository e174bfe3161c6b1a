use crate::catalog::NodeSpec;
use crate::targets::TargetGroups;
use quailcore::{Environment, Params, QuailError, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Environment variable selecting the profile
pub const PROFILE_ENV: &str = "QUAIL_PROFILE";
pub const DEFAULT_PROFILE: &str = "dev";
pub const DEFAULT_TARGET: &str = "daily";

/// Pipeline definition as stored on disk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    /// Per-profile environment entries
    #[serde(default)]
    pub envs: BTreeMap<String, BTreeMap<String, Value>>,

    #[serde(default)]
    pub params: Params,

    /// Named target groups
    #[serde(default)]
    pub targets: BTreeMap<String, Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_target: Option<String>,

    /// Older name for `default_target`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_covey: Option<String>,

    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> quailcore::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> quailcore::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            QuailError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&text)
    }

    /// Profile in effect: explicit override, then `QUAIL_PROFILE`, then the
    /// document's `profile`, then "dev"
    pub fn resolve_profile(&self, explicit: Option<&str>) -> String {
        self.resolve_profile_with(explicit, std::env::var(PROFILE_ENV).ok())
    }

    pub fn resolve_profile_with(&self, explicit: Option<&str>, from_env: Option<String>) -> String {
        explicit
            .map(str::to_string)
            .or(from_env.filter(|p| !p.is_empty()))
            .or_else(|| self.profile.clone())
            .unwrap_or_else(|| DEFAULT_PROFILE.to_string())
    }

    /// Environment for a profile; an unknown profile yields an empty one
    pub fn environment(&self, profile: &str) -> Environment {
        match self.envs.get(profile) {
            Some(entries) => Environment::from_values(entries.clone()),
            None => {
                if !self.envs.is_empty() {
                    tracing::warn!("Profile '{}' has no env section", profile);
                }
                Environment::new()
            }
        }
    }

    /// Params with `${VAR}` / `$VAR` references in string values expanded
    pub fn expanded_params(&self) -> Params {
        self.expanded_params_with(|name| std::env::var(name).ok())
    }

    pub fn expanded_params_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Params {
        self.params
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => Value::String(expand_vars(s, &lookup)),
                    other => other.clone(),
                };
                (key.clone(), value)
            })
            .collect()
    }

    pub fn default_target(&self) -> &str {
        self.default_target
            .as_deref()
            .or(self.default_covey.as_deref())
            .unwrap_or(DEFAULT_TARGET)
    }

    pub fn target_groups(&self) -> TargetGroups {
        TargetGroups::new(self.targets.clone(), Some(self.default_target().to_string()))
    }
}

/// Expand `${NAME}` and `$NAME`; unknown variables are left as written
pub fn expand_vars(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(braced) = after.strip_prefix('{') {
            if let Some(end) = braced.find('}') {
                let name = &braced[..end];
                match lookup(name) {
                    Some(value) if !name.is_empty() => out.push_str(&value),
                    _ => out.push_str(&rest[pos..pos + end + 3]),
                }
                rest = &braced[end + 1..];
                continue;
            }
            out.push('$');
            rest = after;
            continue;
        }

        let len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        let name = &after[..len];
        match (name.is_empty(), lookup(name)) {
            (false, Some(value)) => out.push_str(&value),
            _ => {
                out.push('$');
                out.push_str(name);
            }
        }
        rest = &after[len..];
    }

    out.push_str(rest);
    out
}

/// Shown in place of sensitive param values
pub const HIDDEN: &str = "***HIDDEN***";

const SENSITIVE_MARKERS: [&str; 4] = ["password", "secret", "key", "token"];

/// Param names that look like credentials
pub fn is_sensitive(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_MARKERS.iter().any(|marker| key.contains(marker))
}

/// Copy of `params` safe to print
pub fn masked_params(params: &Params) -> Params {
    params
        .iter()
        .map(|(key, value)| {
            let shown = if is_sensitive(key) {
                Value::from(HIDDEN)
            } else {
                value.clone()
            };
            (key.clone(), shown)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "HOME" => Some("/home/q".to_string()),
            "DB" => Some("warehouse".to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_expands_braced_and_bare_variables() {
        assert_eq!(expand_vars("${HOME}/data", lookup), "/home/q/data");
        assert_eq!(expand_vars("db=$DB;", lookup), "db=warehouse;");
        assert_eq!(expand_vars("${NOPE}-$NOPE", lookup), "${NOPE}-$NOPE");
        assert_eq!(expand_vars("cost $ 5 ${", lookup), "cost $ 5 ${");
        assert_eq!(expand_vars("plain", lookup), "plain");
    }

    #[test]
    fn test_profile_precedence() {
        let config = PipelineConfig {
            profile: Some("staging".to_string()),
            ..Default::default()
        };
        assert_eq!(config.resolve_profile_with(Some("prod"), Some("ci".into())), "prod");
        assert_eq!(config.resolve_profile_with(None, Some("ci".into())), "ci");
        assert_eq!(config.resolve_profile_with(None, None), "staging");
        assert_eq!(PipelineConfig::default().resolve_profile_with(None, None), "dev");
    }

    #[test]
    fn test_parses_full_document() {
        let config = PipelineConfig::from_json_str(
            r#"{
                "profile": "dev",
                "envs": {"dev": {"schema": "raw"}},
                "params": {"root": "${HOME}/x", "min_rows": 2},
                "targets": {"daily": ["c1"]},
                "default_covey": "daily",
                "nodes": [
                    {"id": "t1", "type": "dataset.inline", "config": {"rows": []}},
                    {"id": "c1", "type": "check.row_count", "requires": ["t1"],
                     "severity": "warning"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.default_target(), "daily");
        assert_eq!(config.nodes.len(), 2);
        assert_eq!(config.nodes[1].requires, vec!["t1"]);
        assert_eq!(config.nodes[1].severity, Some(quailcore::Severity::Warning));

        let params = config.expanded_params_with(lookup);
        assert_eq!(params["root"], Value::from("/home/q/x"));
        assert_eq!(params["min_rows"], Value::Number(2.0));

        let env = config.environment("dev");
        assert_eq!(env.get::<Value>("schema").and_then(Value::as_str), Some("raw"));
        assert!(config.environment("prod").is_empty());
    }

    #[test]
    fn test_sensitive_params_are_masked() {
        let mut params = Params::new();
        params.insert("db_password".to_string(), Value::from("hunter2"));
        params.insert("API_TOKEN".to_string(), Value::from("abc"));
        params.insert("sort_key".to_string(), Value::from("id"));
        params.insert("min_rows".to_string(), Value::from(5_i64));

        let shown = masked_params(&params);
        assert_eq!(shown["db_password"], Value::from(HIDDEN));
        assert_eq!(shown["API_TOKEN"], Value::from(HIDDEN));
        assert_eq!(shown["sort_key"], Value::from(HIDDEN));
        assert_eq!(shown["min_rows"], Value::from(5_i64));
        assert!(!is_sensitive("owner"));
    }
}
