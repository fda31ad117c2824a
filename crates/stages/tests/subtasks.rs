mod common;

use std::sync::Arc;

use common::{context, FakeApi};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use pipeline::{DomainType, PipelineError, RunOptions};
use stages::{run_subtasks, select_subtasks, AsTaskContext, StageReport, SubtaskMeta, TaskContext};
use store::MemoryStore;

struct Data {
    ctx: TaskContext,
    log: Mutex<Vec<&'static str>>,
}

impl AsTaskContext for Data {
    fn task_context(&self) -> &TaskContext {
        &self.ctx
    }
}

fn data(options: RunOptions) -> Data {
    Data {
        ctx: context(FakeApi::new(vec![]), Arc::new(MemoryStore::new()), options),
        log: Mutex::new(Vec::new()),
    }
}

fn collect(d: &Data) -> BoxFuture<'_, Result<StageReport, PipelineError>> {
    Box::pin(async move {
        d.log.lock().push("collect");
        Ok(StageReport {
            requests: 1,
            ..StageReport::default()
        })
    })
}

fn convert(d: &Data) -> BoxFuture<'_, Result<StageReport, PipelineError>> {
    Box::pin(async move {
        d.log.lock().push("convert");
        Ok(StageReport::default())
    })
}

fn build_code(d: &Data) -> BoxFuture<'_, Result<StageReport, PipelineError>> {
    Box::pin(async move {
        d.log.lock().push("code");
        Ok(StageReport::default())
    })
}

fn fail(d: &Data) -> BoxFuture<'_, Result<StageReport, PipelineError>> {
    Box::pin(async move {
        d.log.lock().push("fail");
        Err(PipelineError::storage("disk full"))
    })
}

const TICKET: &[DomainType] = &[DomainType::Ticket];
const CODE: &[DomainType] = &[DomainType::Code];

fn meta(
    name: &'static str,
    domain_types: &'static [DomainType],
    entry_point: stages::EntryPoint<Data>,
) -> SubtaskMeta<Data> {
    SubtaskMeta {
        name,
        description: name,
        enabled_by_default: true,
        domain_types,
        entry_point,
    }
}

#[tokio::test]
async fn test_subtasks_run_in_order_filtered_by_entities() {
    let metas = [
        meta("collect", TICKET, collect),
        meta("code", CODE, build_code),
        meta("convert", TICKET, convert),
    ];
    let options = RunOptions::new(None, None, None, Some(vec!["TICKET".into()])).unwrap();
    let d = data(options);

    let summary = run_subtasks(&d, &metas).await.unwrap();

    assert_eq!(*d.log.lock(), vec!["collect", "convert"]);
    let names: Vec<_> = summary.subtasks.iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["collect", "convert"]);
    assert_eq!(summary.subtasks[0].report.requests, 1);
    assert_eq!(summary.run_id, d.ctx.run_id);
}

#[tokio::test]
async fn test_first_failure_stops_later_subtasks() {
    let metas = [
        meta("collect", TICKET, collect),
        meta("fail", TICKET, fail),
        meta("convert", TICKET, convert),
    ];
    let d = data(RunOptions::default());

    let err = run_subtasks(&d, &metas).await.unwrap_err();

    assert_eq!(err.subtask, "fail");
    assert_eq!(err.completed.len(), 1);
    assert!(matches!(err.source, PipelineError::Storage { .. }));
    assert_eq!(*d.log.lock(), vec!["collect", "fail"]);
}

#[tokio::test]
async fn test_cancelled_run_starts_no_subtask() {
    let metas = [meta("collect", TICKET, collect)];
    let d = data(RunOptions::default());
    d.ctx.cancel.cancel();

    let err = run_subtasks(&d, &metas).await.unwrap_err();

    assert!(matches!(err.source, PipelineError::Cancelled));
    assert!(d.log.lock().is_empty());
}

#[test]
fn test_disabled_subtasks_are_not_selected() {
    let mut disabled = meta("convert", TICKET, convert);
    disabled.enabled_by_default = false;
    let metas = [meta("collect", TICKET, collect), disabled];

    let selected = select_subtasks(&metas, &RunOptions::default());

    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].name, "collect");
}
