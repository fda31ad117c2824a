use pipeline::{Entity, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaigaUserStory {
    pub connection_id: u64,
    pub project_id: u64,
    pub user_story_id: u64,
    /// Project-scoped reference shown in the Taiga UI as `#<ref>`.
    #[serde(rename = "ref")]
    pub reference: u64,
    pub subject: String,
    pub description: String,
    pub status: String,
    pub status_color: String,
    pub is_closed: bool,
    pub created_date: Option<Timestamp>,
    pub modified_date: Option<Timestamp>,
    pub finished_date: Option<Timestamp>,
    pub assigned_to: Option<u64>,
    pub assigned_to_name: Option<String>,
    pub total_points: f64,
    pub milestone_id: Option<u64>,
    pub milestone_name: Option<String>,
    pub priority: String,
    pub is_blocked: bool,
    pub blocked_note: String,
}

impl Entity for TaigaUserStory {
    const TABLE: &'static str = "_tool_taiga_user_stories";

    fn natural_key(&self) -> String {
        self.user_story_id.to_string()
    }

    fn modified_at(&self) -> Option<Timestamp> {
        self.modified_date
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ApiStatusInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub is_closed: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ApiUserInfo {
    #[serde(default)]
    pub full_name_display: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

/// Shape of a user story returned by `api/v1/userstories`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiUserStory {
    pub id: u64,
    #[serde(rename = "ref")]
    pub reference: u64,
    pub subject: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status_extra_info: Option<ApiStatusInfo>,
    #[serde(default)]
    pub is_closed: bool,
    #[serde(default)]
    pub created_date: Option<Timestamp>,
    #[serde(default)]
    pub modified_date: Option<Timestamp>,
    #[serde(default)]
    pub finish_date: Option<Timestamp>,
    #[serde(default)]
    pub assigned_to: Option<u64>,
    #[serde(default)]
    pub assigned_to_extra_info: Option<ApiUserInfo>,
    #[serde(default)]
    pub total_points: Option<f64>,
    #[serde(default)]
    pub milestone: Option<u64>,
    #[serde(default)]
    pub milestone_name: Option<String>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub is_blocked: bool,
    #[serde(default)]
    pub blocked_note: Option<String>,
}

impl ApiUserStory {
    pub(crate) fn into_user_story(self, connection_id: u64, project_id: u64) -> TaigaUserStory {
        let status = self.status_extra_info.unwrap_or_default();
        let assignee = self.assigned_to_extra_info.unwrap_or_default();
        TaigaUserStory {
            connection_id,
            project_id,
            user_story_id: self.id,
            reference: self.reference,
            subject: self.subject,
            description: self.description.unwrap_or_default(),
            status: status.name,
            status_color: status.color,
            is_closed: self.is_closed || status.is_closed,
            created_date: self.created_date,
            modified_date: self.modified_date,
            finished_date: self.finish_date,
            assigned_to: self.assigned_to,
            assigned_to_name: assignee.full_name_display.or(assignee.username),
            total_points: self.total_points.unwrap_or_default(),
            milestone_id: self.milestone,
            milestone_name: self.milestone_name,
            priority: self.priority.map(|p| p.to_string()).unwrap_or_default(),
            is_blocked: self.is_blocked,
            blocked_note: self.blocked_note.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_api_payload_maps_nested_status_and_assignee() {
        let api: ApiUserStory = serde_json::from_value(json!({
            "id": 901,
            "ref": 17,
            "subject": "Export reports",
            "status_extra_info": { "name": "Ready for test", "color": "#fcc000", "is_closed": false },
            "is_closed": false,
            "modified_date": "2024-03-04T10:00:00Z",
            "finish_date": null,
            "assigned_to": 6,
            "assigned_to_extra_info": { "full_name_display": "Ada L.", "username": "ada" },
            "total_points": 5.0,
            "milestone": null
        }))
        .unwrap();

        let story = api.into_user_story(1, 42);

        assert_eq!(story.natural_key(), "901");
        assert_eq!(story.reference, 17);
        assert_eq!(story.status, "Ready for test");
        assert_eq!(story.status_color, "#fcc000");
        assert_eq!(story.assigned_to_name.as_deref(), Some("Ada L."));
        assert_eq!(story.modified_at(), Timestamp::parse_rfc3339("2024-03-04T10:00:00Z"));
        assert!(story.description.is_empty());
        assert!(story.milestone_id.is_none());
    }

    #[test]
    fn test_entity_row_round_trips_through_the_ref_rename() {
        let api: ApiUserStory =
            serde_json::from_value(json!({ "id": 1, "ref": 3, "subject": "s" })).unwrap();
        let story = api.into_user_story(1, 42);
        let row = story.to_row().unwrap();
        assert_eq!(row.data["ref"], 3);
        assert_eq!(TaigaUserStory::from_row(row).unwrap(), story);
    }
}
