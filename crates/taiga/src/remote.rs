//! Calls made outside a pipeline run: browsing the projects of a connection
//! and checking that its credentials work.

use pipeline::{ApiClient, ApiRequest, PipelineError, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::models::{ApiProject, TaigaConnection, TaigaProject};

/// One page of the remote project listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemotePage {
    pub page: u32,
    pub page_size: u32,
}

impl Default for RemotePage {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteProjects {
    pub projects: Vec<TaigaProject>,
    /// Set when the page came back full, so another may follow.
    pub next_page: Option<RemotePage>,
}

/// Lists the projects visible to `connection`, optionally filtered by a
/// server-side `search` term.
#[instrument(skip(client, connection), fields(connection = %connection.id))]
pub async fn list_remote_projects(
    client: &dyn ApiClient,
    connection: &TaigaConnection,
    search: Option<&str>,
    page: RemotePage,
) -> Result<RemoteProjects, PipelineError> {
    if page.page == 0 || page.page_size == 0 || page.page_size > MAX_PAGE_SIZE {
        return Err(PipelineError::configuration(format!(
            "page must be at least 1 and page size between 1 and {MAX_PAGE_SIZE}"
        )));
    }

    let mut query = vec![
        ("page".to_string(), page.page.to_string()),
        ("page_size".to_string(), page.page_size.to_string()),
    ];
    if let Some(term) = search.map(str::trim).filter(|t| !t.is_empty()) {
        query.push(("search".to_string(), term.to_string()));
    }

    let response = client
        .request(ApiRequest::get("api/v1/projects").with_query(query))
        .await?;
    let listed: Vec<ApiProject> = response.json("remote projects")?;
    debug!(count = listed.len(), "listed remote projects");

    let next_page = (listed.len() == page.page_size as usize).then(|| RemotePage {
        page: page.page + 1,
        page_size: page.page_size,
    });
    let connection_id = connection.id.as_u64();
    let projects = listed
        .into_iter()
        .map(|p| p.into_project(connection_id, &connection.endpoint))
        .collect();
    Ok(RemoteProjects { projects, next_page })
}

#[derive(Debug, Deserialize)]
struct Me {
    username: String,
}

/// Checks that the connection's credentials are accepted and returns the
/// authenticated username.
#[instrument(skip(client))]
pub async fn test_connection(client: &dyn ApiClient) -> Result<String, PipelineError> {
    let me: Me = client
        .request(ApiRequest::get("api/v1/users/me"))
        .await?
        .json("current user")?;
    Ok(me.username)
}
