//! Taiga plugin: collects projects and user stories from a Taiga instance
//! and converts them into boards and issues.
//!
//! ## Architectural Layer
//!
//! **Plugin.** Everything Taiga-specific lives here: the API shapes, the
//! tool-layer entities, and the subtasks wiring the generic [`stages`] to
//! Taiga's endpoints. Concrete transports and stores are supplied by the
//! caller through [`stages::Stores`] and a [`pipeline::ApiClient`].
//!
//! ## Subtasks
//!
//! | Name | Stage | Writes |
//! |------|-------|--------|
//! | `collectProjects` | collector | `taiga_api_projects` |
//! | `extractProjects` | extractor | `_tool_taiga_projects` |
//! | `collectUserStories` | paged collector | `taiga_api_user_stories` |
//! | `extractUserStories` | extractor | `_tool_taiga_user_stories` |
//! | `convertProjects` | converter | `boards` |
//! | `convertUserStories` | stateful converter | `issues`, `board_issues` |

pub mod models;
pub mod options;
pub mod plan;
pub mod remote;
pub mod tasks;

use std::sync::Arc;

use pipeline::{ApiClient, PipelineError, RunOptions};
use serde_json::{Map, Value};
use stages::{run_subtasks, RunSummary, Stores, SubtaskError, SubtaskMeta, TaskContext};
use tracing::instrument;

pub use models::{TaigaConnection, TaigaProject, TaigaScopeConfig, TaigaUserStory};
pub use options::{TaigaApiParams, TaigaOptions};
pub use plan::{make_pipeline_plan, PipelinePlan, PipelineStage, PipelineTask, ScopeDetail};
pub use remote::{list_remote_projects, test_connection, RemotePage, RemoteProjects};
pub use tasks::{TaigaTaskData, SUBTASK_METAS};

/// Plugin name used in pipeline-plan tasks.
pub const PLUGIN_NAME: &str = "taiga";

/// The Taiga plugin.
#[derive(Debug, Clone, Copy, Default)]
pub struct Taiga;

impl Taiga {
    pub fn name(&self) -> &'static str {
        PLUGIN_NAME
    }

    pub fn description(&self) -> &'static str {
        "collect and convert Taiga projects and user stories"
    }

    pub fn subtask_metas(&self) -> &'static [SubtaskMeta<TaigaTaskData>] {
        &SUBTASK_METAS
    }

    /// Decodes a task's options and builds the data its subtasks share.
    ///
    /// The task must belong to `connection`; an inline scope config in the
    /// options takes the place of the default one. Only entities named by
    /// both `run_options` and the scope config are selected.
    #[instrument(skip_all, fields(connection = %connection.id))]
    pub fn prepare_task_data(
        &self,
        options: &Map<String, Value>,
        run_options: RunOptions,
        connection: &TaigaConnection,
        api: Arc<dyn ApiClient>,
        stores: Stores,
    ) -> Result<TaigaTaskData, PipelineError> {
        let options = TaigaOptions::decode(options)?;
        if options.connection_id != connection.id {
            return Err(PipelineError::configuration(format!(
                "task targets connection {} but connection {} was supplied",
                options.connection_id, connection.id
            )));
        }
        let fingerprint = options.fingerprint()?;
        let scope_config = options.scope_config.clone().unwrap_or_default();
        let run_options = run_options.restricted_to(&scope_config.domain_types()?);
        Ok(TaigaTaskData {
            ctx: TaskContext::new(run_options, fingerprint, api, stores),
            options,
            scope_config,
            endpoint: connection.endpoint.clone(),
        })
    }

    /// Runs the selected subtasks for one prepared task.
    pub async fn run(&self, data: &TaigaTaskData) -> Result<RunSummary, SubtaskError> {
        run_subtasks(data, self.subtask_metas()).await
    }
}
