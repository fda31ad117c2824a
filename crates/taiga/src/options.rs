//! Task options carried in a pipeline-plan task.

use pipeline::{ConnectionId, Fingerprint, PipelineError, ProjectId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::TaigaScopeConfig;

/// Options of one Taiga task: which project of which connection, and how to
/// convert it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TaigaOptions {
    pub connection_id: ConnectionId,
    pub project_id: ProjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_config: Option<TaigaScopeConfig>,
}

const FIELDS: &[&str] = &["connectionId", "projectId", "scopeConfig"];

/// Parameters identifying a Taiga run partition.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaigaApiParams {
    pub connection_id: u64,
    pub project_id: u64,
}

impl TaigaOptions {
    /// Decodes options from a loosely typed JSON map.
    ///
    /// Every failure is a configuration error naming the offending field.
    pub fn decode(raw: &Map<String, Value>) -> Result<Self, PipelineError> {
        if let Some(unknown) = raw.keys().find(|k| !FIELDS.contains(&k.as_str())) {
            return Err(PipelineError::configuration(format!(
                "unknown option '{unknown}', expected one of {}",
                FIELDS.join(", ")
            )));
        }

        let connection_id: u64 = required(raw, "connectionId")?;
        let project_id: u64 = required(raw, "projectId")?;
        let scope_config: Option<TaigaScopeConfig> = optional(raw, "scopeConfig")?;

        let options = Self {
            connection_id: ConnectionId::new(connection_id),
            project_id: ProjectId::new(project_id),
            scope_config,
        };
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.connection_id.as_u64() == 0 {
            return Err(PipelineError::configuration("connectionId must be non-zero"));
        }
        if self.project_id.as_u64() == 0 {
            return Err(PipelineError::configuration("projectId must be non-zero"));
        }
        if let Some(scope_config) = &self.scope_config {
            scope_config.domain_types()?;
        }
        Ok(())
    }

    pub fn params(&self) -> TaigaApiParams {
        TaigaApiParams {
            connection_id: self.connection_id.as_u64(),
            project_id: self.project_id.as_u64(),
        }
    }

    /// The fingerprint `{connectionId, projectId}` partitioning this task's data.
    pub fn fingerprint(&self) -> Result<Fingerprint, PipelineError> {
        Fingerprint::from_params(&self.params())
    }
}

fn optional<T: DeserializeOwned>(raw: &Map<String, Value>, field: &str) -> Result<Option<T>, PipelineError> {
    match raw.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| PipelineError::configuration(format!("invalid option '{field}': {e}"))),
    }
}

fn required<T: DeserializeOwned>(raw: &Map<String, Value>, field: &str) -> Result<T, PipelineError> {
    optional(raw, field)?
        .ok_or_else(|| PipelineError::configuration(format!("missing option '{field}'")))
}
