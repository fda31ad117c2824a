//! The Taiga subtasks and the data they share.

pub(crate) mod projects;
mod user_stories;

use pipeline::{DomainType, ProjectId};
use stages::{AsTaskContext, SubtaskMeta, TaskContext};
use tokio_util::sync::CancellationToken;

use crate::models::TaigaScopeConfig;
use crate::options::TaigaOptions;

pub use projects::{collect_projects, convert_projects, extract_projects};
pub use user_stories::{collect_user_stories, convert_user_stories, extract_user_stories};

pub const RAW_PROJECT_TABLE: &str = "taiga_api_projects";
pub const RAW_USER_STORY_TABLE: &str = "taiga_api_user_stories";

/// Watermark name of the user-story converter.
pub const CONVERT_USER_STORIES: &str = "convertUserStories";

/// Everything a Taiga subtask needs for one (connection, project) run.
pub struct TaigaTaskData {
    pub ctx: TaskContext,
    pub options: TaigaOptions,
    pub scope_config: TaigaScopeConfig,
    /// Connection endpoint, used to build web URLs of extracted projects.
    pub endpoint: String,
}

impl TaigaTaskData {
    pub fn connection_id(&self) -> u64 {
        self.options.connection_id.as_u64()
    }

    pub fn project_id(&self) -> ProjectId {
        self.options.project_id
    }

    /// Ties the run to `cancel`, typically a child of a process-wide token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.ctx = self.ctx.with_cancellation(cancel);
        self
    }
}

impl AsTaskContext for TaigaTaskData {
    fn task_context(&self) -> &TaskContext {
        &self.ctx
    }
}

const TICKET: &[DomainType] = &[DomainType::Ticket];

/// The Taiga subtasks in execution order.
pub static SUBTASK_METAS: [SubtaskMeta<TaigaTaskData>; 6] = [
    SubtaskMeta {
        name: "collectProjects",
        description: "collect Taiga projects",
        enabled_by_default: true,
        domain_types: TICKET,
        entry_point: collect_projects,
    },
    SubtaskMeta {
        name: "extractProjects",
        description: "extract Taiga projects",
        enabled_by_default: true,
        domain_types: TICKET,
        entry_point: extract_projects,
    },
    SubtaskMeta {
        name: "collectUserStories",
        description: "collect Taiga user stories",
        enabled_by_default: true,
        domain_types: TICKET,
        entry_point: collect_user_stories,
    },
    SubtaskMeta {
        name: "extractUserStories",
        description: "extract Taiga user stories",
        enabled_by_default: true,
        domain_types: TICKET,
        entry_point: extract_user_stories,
    },
    SubtaskMeta {
        name: "convertProjects",
        description: "convert Taiga projects into boards",
        enabled_by_default: true,
        domain_types: TICKET,
        entry_point: convert_projects,
    },
    SubtaskMeta {
        name: CONVERT_USER_STORIES,
        description: "convert Taiga user stories into issues",
        enabled_by_default: true,
        domain_types: TICKET,
        entry_point: convert_user_stories,
    },
];
