use futures::future::BoxFuture;
use pipeline::{generate_id, Board, ConnectionId, DomainId, DomainRecord, PipelineError, RawRecord};
use stages::{json_object, ApiCollector, ApiExtractor, DataConverter, RecordParser, StageReport};

use super::{TaigaTaskData, RAW_PROJECT_TABLE};
use crate::models::{ApiProject, TaigaProject};

/// Fetches the run's project as a single raw record.
pub fn collect_projects(data: &TaigaTaskData) -> BoxFuture<'_, Result<StageReport, PipelineError>> {
    Box::pin(async move {
        ApiCollector::new(
            &data.ctx,
            RAW_PROJECT_TABLE,
            "api/v1/projects/{projectId}",
            Box::new(json_object),
        )
        .execute()
        .await
    })
}

pub fn extract_projects(data: &TaigaTaskData) -> BoxFuture<'_, Result<StageReport, PipelineError>> {
    let connection_id = data.connection_id();
    let endpoint = data.endpoint.clone();
    let parser: RecordParser<TaigaProject> =
        Box::new(move |record: &RawRecord| -> Result<Vec<TaigaProject>, PipelineError> {
            let project: ApiProject = serde_json::from_value(record.data.clone())
                .map_err(|e| PipelineError::malformed(RAW_PROJECT_TABLE, e))?;
            Ok(vec![project.into_project(connection_id, &endpoint)])
        });
    Box::pin(async move {
        ApiExtractor::new(&data.ctx, RAW_PROJECT_TABLE, parser)
            .execute()
            .await
    })
}

/// Converts every extracted project into a board.
pub fn convert_projects(data: &TaigaTaskData) -> BoxFuture<'_, Result<StageReport, PipelineError>> {
    Box::pin(async move {
        DataConverter::<TaigaProject>::new(
            &data.ctx,
            Box::new(|project: &TaigaProject| -> Result<Vec<DomainRecord>, PipelineError> {
                Ok(vec![project_board(project).into()])
            }),
        )
        .execute()
        .await
    })
}

pub(crate) fn board_id(connection_id: u64, project_id: u64) -> DomainId {
    generate_id("taiga", "TaigaProject", ConnectionId::new(connection_id), project_id)
}

pub(crate) fn project_board(project: &TaigaProject) -> Board {
    Board {
        id: board_id(project.connection_id, project.project_id),
        name: project.name.clone(),
        description: project.description.clone(),
        url: project.url.clone(),
        created_date: project.created_date,
    }
}
