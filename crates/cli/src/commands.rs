use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use api_client::AsyncApiClient;
use pipeline::ApiClient;
use stages::{RunSummary, Stores};
use store::MemoryStore;
use taiga::{
    list_remote_projects, make_pipeline_plan, test_connection, RemotePage, ScopeDetail, Taiga,
    TaigaProject,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::CliConfig;

fn client(config: &CliConfig) -> Result<Arc<AsyncApiClient>> {
    let client = AsyncApiClient::new(Arc::new(config.connection.clone()), config.client.clone())
        .context("cannot build API client")?;
    Ok(Arc::new(client))
}

pub async fn run(
    config: CliConfig,
    projects: Vec<u64>,
    full_resync: bool,
    state_file: Option<&Path>,
    cancel: CancellationToken,
) -> Result<()> {
    let run_options = config.options.validate(full_resync)?;
    let projects = if projects.is_empty() {
        config.projects.clone()
    } else {
        projects
    };
    if projects.is_empty() {
        anyhow::bail!("no projects to run: pass --projects or list them in the config file");
    }

    let store = Arc::new(match state_file {
        Some(path) => MemoryStore::load(path)
            .await
            .with_context(|| format!("cannot load state file {}", path.display()))?,
        None => MemoryStore::new(),
    });
    let api: Arc<dyn ApiClient> = client(&config)?;

    let connection_id = config.connection.id.as_u64();
    let scopes: Vec<ScopeDetail> = projects
        .iter()
        .map(|&project_id| ScopeDetail {
            project: TaigaProject {
                connection_id,
                project_id,
                ..TaigaProject::default()
            },
            scope_config: config.scope_config.clone(),
        })
        .collect();
    let (plan, _) = make_pipeline_plan(connection_id, &scopes)?;
    info!(
        connection = ?config.connection.sanitized(),
        stages = plan.len(),
        "pipeline planned"
    );

    let mut summaries: Vec<RunSummary> = Vec::new();
    let mut outcome = Ok(());
    'plan: for stage in &plan {
        for task in stage {
            let data = Taiga
                .prepare_task_data(
                    &task.options,
                    run_options.clone(),
                    &config.connection,
                    api.clone(),
                    Stores::shared(store.clone()),
                )?
                .with_cancellation(cancel.child_token());
            match Taiga.run(&data).await {
                Ok(summary) => summaries.push(summary),
                Err(e) => {
                    error!(subtask = e.subtask, error = %e.source, "task failed");
                    outcome = Err(anyhow::Error::new(e));
                    break 'plan;
                }
            }
        }
    }

    // Watermarks only advance on success, so saving after a failure is safe.
    if let Some(path) = state_file {
        store
            .save(path)
            .await
            .with_context(|| format!("cannot save state file {}", path.display()))?;
    }

    println!("{}", serde_json::to_string_pretty(&summaries)?);
    outcome
}

pub async fn check_connection(config: CliConfig) -> Result<()> {
    let api = client(&config)?;
    match test_connection(api.as_ref()).await {
        Ok(username) => {
            println!("connected to {} as {username}", config.connection.endpoint);
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "connection test failed");
            Err(e.into())
        }
    }
}

pub async fn remote_projects(
    config: CliConfig,
    search: Option<String>,
    page: u32,
    page_size: u32,
) -> Result<()> {
    let api = client(&config)?;
    let listed = list_remote_projects(
        api.as_ref(),
        &config.connection,
        search.as_deref(),
        RemotePage { page, page_size },
    )
    .await?;
    println!("{}", serde_json::to_string_pretty(&listed)?);
    Ok(())
}
