use quailcore::QuailError;
use std::collections::BTreeMap;

/// Named groups of node ids, expanded before resolution
#[derive(Debug, Clone, Default)]
pub struct TargetGroups {
    groups: BTreeMap<String, Vec<String>>,
    default_group: Option<String>,
}

impl TargetGroups {
    pub fn new(groups: BTreeMap<String, Vec<String>>, default_group: Option<String>) -> Self {
        Self {
            groups,
            default_group,
        }
    }

    pub fn group(&self, name: &str) -> Option<&[String]> {
        self.groups.get(name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn default_group(&self) -> Option<&str> {
        self.default_group.as_deref()
    }

    /// Replace group names by their members; other names pass through as
    /// node ids. With nothing requested the default group is used.
    pub fn expand<S: AsRef<str>>(&self, requested: &[S]) -> Result<Vec<String>, QuailError> {
        if requested.is_empty() {
            let name = self.default_group.as_deref().ok_or_else(|| {
                QuailError::Config(
                    "no targets requested and no default target configured".to_string(),
                )
            })?;
            let members = self.group(name).ok_or_else(|| {
                QuailError::Config(format!(
                    "default target '{}' is not a target group (available: {})",
                    name,
                    self.names().collect::<Vec<_>>().join(", ")
                ))
            })?;
            tracing::info!("Using default target '{}': {:?}", name, members);
            return Ok(members.to_vec());
        }

        let mut resolved = Vec::new();
        for name in requested {
            let name = name.as_ref();
            match self.group(name) {
                Some(members) => {
                    tracing::info!("Expanded target '{}': {:?}", name, members);
                    resolved.extend(members.iter().cloned());
                }
                None => resolved.push(name.to_string()),
            }
        }
        Ok(resolved)
    }
}
