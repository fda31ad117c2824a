use futures::future::BoxFuture;
use pipeline::{
    generate_id, BoardIssue, ConnectionId, DomainRecord, Fingerprint, Issue, PageCursor,
    PipelineError, RawRecord,
};
use stages::{
    json_array, page_query, ApiCollector, ApiExtractor, ConvertFn, RecordParser, StageReport,
    StatefulConverter,
};

use super::projects::board_id;
use super::{TaigaTaskData, CONVERT_USER_STORIES, RAW_USER_STORY_TABLE};
use crate::models::{
    ApiUserStory, TaigaScopeConfig, TaigaUserStory, USER_STORY_STANDARD_TYPE, USER_STORY_TYPE,
};

/// Pages through the project's user stories.
///
/// Taiga may ignore the page size and return every story at once; the
/// collector then stops after that first page.
pub fn collect_user_stories(data: &TaigaTaskData) -> BoxFuture<'_, Result<StageReport, PipelineError>> {
    Box::pin(async move {
        ApiCollector::new(
            &data.ctx,
            RAW_USER_STORY_TABLE,
            "api/v1/userstories",
            Box::new(json_array),
        )
        .paged(data.ctx.options.page_size())
        .with_query(Box::new(project_query))
        .execute()
        .await
    })
}

fn project_query(fp: &Fingerprint, page: Option<PageCursor>) -> Vec<(String, String)> {
    let mut query = Vec::with_capacity(3);
    if let Some(project_id) = fp.get_int("projectId") {
        query.push(("project".to_string(), project_id.to_string()));
    }
    query.extend(page_query(page));
    query
}

pub fn extract_user_stories(data: &TaigaTaskData) -> BoxFuture<'_, Result<StageReport, PipelineError>> {
    let connection_id = data.connection_id();
    let project_id = data.project_id().as_u64();
    let parser: RecordParser<TaigaUserStory> =
        Box::new(move |record: &RawRecord| -> Result<Vec<TaigaUserStory>, PipelineError> {
            let story: ApiUserStory = serde_json::from_value(record.data.clone())
                .map_err(|e| PipelineError::malformed(RAW_USER_STORY_TABLE, e))?;
            Ok(vec![story.into_user_story(connection_id, project_id)])
        });
    Box::pin(async move {
        ApiExtractor::new(&data.ctx, RAW_USER_STORY_TABLE, parser)
            .execute()
            .await
    })
}

/// Converts user stories changed since the last successful run into issues
/// linked to the project's board.
///
/// A change to the scope config's type mappings forces a full conversion.
pub fn convert_user_stories(data: &TaigaTaskData) -> BoxFuture<'_, Result<StageReport, PipelineError>> {
    Box::pin(async move {
        let config = serde_json::to_value(&data.scope_config.type_mappings).map_err(|e| {
            PipelineError::configuration(format!("type mappings are not serialisable: {e}"))
        })?;
        let scope_config = data.scope_config.clone();
        let convert: ConvertFn<TaigaUserStory> = Box::new(
            move |story: &TaigaUserStory| -> Result<Vec<DomainRecord>, PipelineError> {
                Ok(user_story_records(story, &scope_config))
            },
        );
        StatefulConverter::new(&data.ctx, CONVERT_USER_STORIES, config, convert)
            .execute()
            .await
    })
}

pub(crate) fn user_story_records(story: &TaigaUserStory, config: &TaigaScopeConfig) -> Vec<DomainRecord> {
    let connection_id = ConnectionId::new(story.connection_id);
    let issue_id = generate_id("taiga", "TaigaUserStory", connection_id, story.user_story_id);
    let issue = Issue {
        id: issue_id.clone(),
        issue_key: story.reference.to_string(),
        title: story.subject.clone(),
        description: story.description.clone(),
        issue_type: config
            .standard_type(USER_STORY_TYPE, USER_STORY_STANDARD_TYPE)
            .to_string(),
        original_type: USER_STORY_TYPE.to_string(),
        status: config.standard_status(USER_STORY_TYPE, &story.status, story.is_closed),
        original_status: story.status.clone(),
        story_point: (story.total_points > 0.0).then_some(story.total_points),
        priority: story.priority.clone(),
        assignee_id: story
            .assigned_to
            .map(|user| generate_id("taiga", "TaigaAccount", connection_id, user).to_string()),
        assignee_name: story.assigned_to_name.clone(),
        created_date: story.created_date,
        updated_date: story.modified_date,
        resolution_date: story.finished_date,
    };
    let link = BoardIssue {
        board_id: board_id(story.connection_id, story.project_id),
        issue_id,
    };
    vec![issue.into(), link.into()]
}
