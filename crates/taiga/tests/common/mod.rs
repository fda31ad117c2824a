#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use pipeline::{ApiClient, ApiRequest, ApiResponse, ConnectionId, PipelineError, RunOptions};
use serde_json::{json, Map, Value};
use stages::Stores;
use store::MemoryStore;
use taiga::{Taiga, TaigaConnection, TaigaTaskData};
use tokio::sync::Notify;

/// An in-process Taiga answering the endpoints the plugin calls.
#[derive(Default)]
pub struct FakeTaiga {
    pub projects: Mutex<BTreeMap<u64, Value>>,
    pub user_stories: Mutex<Vec<Value>>,
    /// Ignore `page`/`page_size` and return every story at once.
    pub ignore_pagination: bool,
    pub reject_credentials: bool,
    /// While set, user-story requests never answer; `stalled` fires on entry.
    pub stall_user_stories: AtomicBool,
    pub stalled: Notify,
    pub requests: Mutex<Vec<ApiRequest>>,
}

impl FakeTaiga {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(self, id: u64, name: &str) -> Self {
        self.projects.lock().insert(
            id,
            json!({
                "id": id,
                "name": name,
                "slug": format!("team-{id}"),
                "description": format!("{name} description"),
                "is_private": false,
                "total_milestones": 2,
                "total_story_points": 40.0,
                "created_date": "2023-01-01T00:00:00Z",
                "modified_date": "2024-01-01T00:00:00Z"
            }),
        );
        self
    }

    pub fn with_stories(self, count: u64, modified: &str) -> Self {
        {
            let mut stories = self.user_stories.lock();
            for n in 1..=count {
                stories.push(story(n, modified));
            }
        }
        self
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests.lock().iter().map(|r| r.path.clone()).collect()
    }

    fn query(request: &ApiRequest, name: &str) -> Option<u64> {
        request
            .query
            .iter()
            .find(|(k, _)| k == name)
            .and_then(|(_, v)| v.parse().ok())
    }

    fn stories_page(&self, request: &ApiRequest) -> Value {
        let stories = self.user_stories.lock();
        if self.ignore_pagination {
            return Value::Array(stories.clone());
        }
        let page = Self::query(request, "page").unwrap_or(1) as usize;
        let size = Self::query(request, "page_size").unwrap_or(100) as usize;
        Value::Array(stories.iter().skip((page - 1) * size).take(size).cloned().collect())
    }
}

#[async_trait]
impl ApiClient for FakeTaiga {
    async fn request(&self, request: ApiRequest) -> Result<ApiResponse, PipelineError> {
        self.requests.lock().push(request.clone());
        if self.reject_credentials {
            return Err(PipelineError::Unauthorized {
                message: format!("401 from '{}'", request.path),
            });
        }

        let path = request.path.as_str();
        let body = if path == "api/v1/users/me" {
            json!({ "id": 6, "username": "ada" })
        } else if path == "api/v1/userstories" {
            if self.stall_user_stories.load(Ordering::SeqCst) {
                self.stalled.notify_one();
                std::future::pending::<()>().await;
            }
            self.stories_page(&request)
        } else if path == "api/v1/projects" {
            Value::Array(self.projects.lock().values().cloned().collect())
        } else if let Some(id) = path.strip_prefix("api/v1/projects/") {
            let id: u64 = id.parse().map_err(|_| PipelineError::skip("bad id"))?;
            match self.projects.lock().get(&id) {
                Some(project) => project.clone(),
                None => return Err(PipelineError::skip(format!("404 from '{path}'"))),
            }
        } else {
            return Err(PipelineError::skip(format!("404 from '{path}'")));
        };

        Ok(ApiResponse {
            status: 200,
            body: serde_json::to_vec(&body).unwrap(),
        })
    }
}

pub fn story(id: u64, modified: &str) -> Value {
    json!({
        "id": 900 + id,
        "ref": id,
        "subject": format!("story {id}"),
        "status_extra_info": { "name": "New", "color": "#999", "is_closed": false },
        "is_closed": false,
        "created_date": "2024-01-01T00:00:00Z",
        "modified_date": modified,
        "finish_date": null,
        "assigned_to": null,
        "total_points": 2.0,
        "milestone": null,
        "is_blocked": false
    })
}

pub fn connection() -> TaigaConnection {
    TaigaConnection {
        id: ConnectionId::new(1),
        name: "taiga".into(),
        endpoint: "https://taiga.example".into(),
        token: "t0ken-value-123".into(),
        rate_limit_per_hour: None,
    }
}

pub fn task_options(project_id: u64, scope_config: Option<Value>) -> Map<String, Value> {
    let mut options = Map::new();
    options.insert("connectionId".into(), json!(1));
    options.insert("projectId".into(), json!(project_id));
    if let Some(config) = scope_config {
        options.insert("scopeConfig".into(), config);
    }
    options
}

pub fn prepare(
    api: Arc<FakeTaiga>,
    store: Arc<MemoryStore>,
    project_id: u64,
    run_options: RunOptions,
) -> TaigaTaskData {
    Taiga
        .prepare_task_data(
            &task_options(project_id, None),
            run_options,
            &connection(),
            api,
            Stores::shared(store),
        )
        .unwrap()
}
