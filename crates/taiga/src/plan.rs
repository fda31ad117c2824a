//! Pipeline plans: which subtasks run for which Taiga projects.

use pipeline::{Board, DomainType, PipelineError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::{TaigaProject, TaigaScopeConfig};
use crate::tasks::{projects::project_board, SUBTASK_METAS};
use crate::PLUGIN_NAME;

/// A project selected for collection and its conversion settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeDetail {
    pub project: TaigaProject,
    #[serde(default)]
    pub scope_config: TaigaScopeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineTask {
    pub plugin: String,
    pub subtasks: Vec<String>,
    /// Decoded by [`crate::TaigaOptions::decode`].
    pub options: Map<String, Value>,
}

/// Tasks of one stage run in parallel; stages run in order.
pub type PipelineStage = Vec<PipelineTask>;
pub type PipelinePlan = Vec<PipelineStage>;

/// Builds one stage per scope, plus the boards of scopes collecting tickets.
pub fn make_pipeline_plan(
    connection_id: u64,
    scopes: &[ScopeDetail],
) -> Result<(PipelinePlan, Vec<Board>), PipelineError> {
    if connection_id == 0 {
        return Err(PipelineError::configuration("connectionId must be non-zero"));
    }

    let mut plan = Vec::with_capacity(scopes.len());
    let mut boards = Vec::new();
    for scope in scopes {
        let entities = scope.scope_config.domain_types()?;
        let subtasks: Vec<String> = SUBTASK_METAS
            .iter()
            .filter(|m| m.enabled_by_default && m.domain_types.iter().any(|d| entities.contains(d)))
            .map(|m| m.name.to_string())
            .collect();

        let mut options = Map::new();
        options.insert("connectionId".into(), connection_id.into());
        options.insert("projectId".into(), scope.project.project_id.into());
        if scope.scope_config != TaigaScopeConfig::default() {
            let config = serde_json::to_value(&scope.scope_config).map_err(|e| {
                PipelineError::configuration(format!("scope config is not serialisable: {e}"))
            })?;
            options.insert("scopeConfig".into(), config);
        }

        plan.push(vec![PipelineTask {
            plugin: PLUGIN_NAME.to_string(),
            subtasks,
            options,
        }]);

        if entities.contains(&DomainType::Ticket) {
            let project = TaigaProject {
                connection_id,
                ..scope.project.clone()
            };
            boards.push(project_board(&project));
        }
    }
    Ok((plan, boards))
}
