use std::collections::BTreeMap;

use pipeline::{issue_status, issue_type, DomainType, PipelineError};
use serde::{Deserialize, Serialize};

/// Per-project conversion settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TaigaScopeConfig {
    /// Domain types to collect for the scope. Empty means all of them.
    #[serde(default)]
    pub entities: Vec<String>,
    /// Keyed by original Taiga type name, e.g. `"User Story"`.
    #[serde(default)]
    pub type_mappings: BTreeMap<String, TypeMapping>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TypeMapping {
    #[serde(default)]
    pub standard_type: String,
    /// Keyed by original Taiga status name.
    #[serde(default)]
    pub status_mappings: BTreeMap<String, StatusMapping>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StatusMapping {
    pub standard_status: String,
}

impl TaigaScopeConfig {
    /// The scope's entities as domain types. An empty list means every
    /// domain type; an unknown tag is a configuration error.
    pub fn domain_types(&self) -> Result<Vec<DomainType>, PipelineError> {
        if self.entities.is_empty() {
            return Ok(DomainType::ALL.to_vec());
        }
        self.entities
            .iter()
            .map(|tag| {
                DomainType::parse(tag).ok_or_else(|| {
                    PipelineError::configuration(format!("unknown entity type '{tag}'"))
                })
            })
            .collect()
    }

    /// The standard type for `original_type`, falling back to `default`.
    pub fn standard_type<'a>(&'a self, original_type: &str, default: &'a str) -> &'a str {
        self.type_mappings
            .get(original_type)
            .map(|m| m.standard_type.as_str())
            .filter(|t| !t.is_empty())
            .unwrap_or(default)
    }

    /// The standard status for `original_status` of `original_type`.
    ///
    /// Without a mapping, closed items are `DONE` and everything else `TODO`.
    pub fn standard_status(&self, original_type: &str, original_status: &str, is_closed: bool) -> String {
        let mapped = self
            .type_mappings
            .get(original_type)
            .and_then(|m| m.status_mappings.get(original_status))
            .map(|s| s.standard_status.as_str())
            .filter(|s| !s.is_empty());
        match mapped {
            Some(status) => status.to_string(),
            None if is_closed => issue_status::DONE.to_string(),
            None => issue_status::TODO.to_string(),
        }
    }
}

/// Taiga's name for user stories in type mappings.
pub const USER_STORY_TYPE: &str = "User Story";

/// Default standard type of a user story.
pub const USER_STORY_STANDARD_TYPE: &str = issue_type::REQUIREMENT;
