use pipeline::{Entity, Timestamp};
use serde::{Deserialize, Serialize};

/// A Taiga project, the scope of every pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaigaProject {
    pub connection_id: u64,
    pub project_id: u64,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub url: String,
    pub is_private: bool,
    pub total_milestones: u32,
    pub total_story_points: f64,
    pub created_date: Option<Timestamp>,
    pub modified_date: Option<Timestamp>,
}

impl Entity for TaigaProject {
    const TABLE: &'static str = "_tool_taiga_projects";

    fn natural_key(&self) -> String {
        self.project_id.to_string()
    }

    fn modified_at(&self) -> Option<Timestamp> {
        self.modified_date
    }
}

/// Shape of a project object returned by `api/v1/projects`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiProject {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub total_milestones: Option<u32>,
    #[serde(default)]
    pub total_story_points: Option<f64>,
    #[serde(default)]
    pub created_date: Option<Timestamp>,
    #[serde(default)]
    pub modified_date: Option<Timestamp>,
}

impl ApiProject {
    /// `endpoint` is used to build the project URL.
    pub(crate) fn into_project(self, connection_id: u64, endpoint: &str) -> TaigaProject {
        let url = if self.slug.is_empty() {
            String::new()
        } else {
            format!("{}/project/{}", endpoint.trim_end_matches('/'), self.slug)
        };
        TaigaProject {
            connection_id,
            project_id: self.id,
            name: self.name,
            slug: self.slug,
            description: self.description.unwrap_or_default(),
            url,
            is_private: self.is_private,
            total_milestones: self.total_milestones.unwrap_or_default(),
            total_story_points: self.total_story_points.unwrap_or_default(),
            created_date: self.created_date,
            modified_date: self.modified_date,
        }
    }
}
