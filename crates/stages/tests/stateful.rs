mod common;

use std::sync::Arc;

use common::{context, fingerprint, ts, FakeApi, Item, ManualClock};
use parking_lot::Mutex;
use pipeline::{
    generate_id, Board, ConnectionId, DomainRecord, Entity, EntityStore, PipelineError,
    RunOptions, WatermarkKey, WatermarkStore,
};
use serde_json::{json, Value};
use stages::{ConvertFn, DataConverter, StatefulConverter, TaskContext};
use store::MemoryStore;

const SUBTASK: &str = "convertItems";

fn item(id: u64, modified: &str) -> Item {
    Item {
        id,
        name: format!("item {id}"),
        modified: Some(ts(modified)),
    }
}

async fn seed(store: &MemoryStore, items: &[Item]) {
    let rows = items.iter().map(|i| i.to_row().unwrap()).collect();
    EntityStore::upsert(store, Item::TABLE, &fingerprint(), rows)
        .await
        .unwrap();
}

fn to_board(item: &Item) -> Result<Vec<DomainRecord>, PipelineError> {
    Ok(vec![Board {
        id: generate_id("test", "Item", ConnectionId::new(1), item.id),
        name: item.name.clone(),
        description: String::new(),
        url: String::new(),
        created_date: None,
    }
    .into()])
}

/// A conversion function that records the ids it saw.
fn recording(seen: Arc<Mutex<Vec<u64>>>) -> ConvertFn<Item> {
    Box::new(move |item: &Item| {
        seen.lock().push(item.id);
        to_board(item)
    })
}

fn key() -> WatermarkKey {
    WatermarkKey {
        subtask: SUBTASK.into(),
        fingerprint: fingerprint(),
    }
}

fn ctx_at(store: &Arc<MemoryStore>, clock: &Arc<ManualClock>, options: RunOptions) -> TaskContext {
    context(FakeApi::new(vec![]), store.clone(), options).with_clock(clock.clone())
}

async fn run(ctx: &TaskContext, config: Value) -> (Result<stages::StageReport, PipelineError>, Vec<u64>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let result = StatefulConverter::new(ctx, SUBTASK, config, recording(seen.clone()))
        .execute()
        .await;
    let ids = seen.lock().clone();
    (result, ids)
}

#[tokio::test]
async fn test_first_run_is_full_and_sets_watermark_to_start_time() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, &[item(1, "2020-01-01T00:00:00Z"), item(2, "2024-05-01T00:00:00Z")]).await;
    let clock = ManualClock::at("2024-06-01T12:00:00Z");
    let ctx = ctx_at(&store, &clock, RunOptions::default());

    let (result, seen) = run(&ctx, json!({})).await;

    let report = result.unwrap();
    assert_eq!(report.full_scan, Some(true));
    assert_eq!(seen, vec![1, 2]);
    assert_eq!(store.domain_records("boards").len(), 2);
    let watermark = store.get(&key()).await.unwrap().unwrap();
    assert_eq!(watermark.cutoff, ts("2024-06-01T12:00:00Z"));
}

#[tokio::test]
async fn test_second_incremental_run_reads_only_changed_rows() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, &[item(1, "2024-01-01T00:00:00Z"), item(2, "2024-01-02T00:00:00Z")]).await;
    let clock = ManualClock::at("2024-02-01T00:00:00Z");
    let ctx = ctx_at(&store, &clock, RunOptions::default());
    run(&ctx, json!({})).await.0.unwrap();

    // Item 2 changes after the first run; item 3 appears.
    seed(&store, &[item(2, "2024-02-10T00:00:00Z"), item(3, "2024-02-01T00:00:00Z")]).await;
    clock.set("2024-03-01T00:00:00Z");
    let (result, seen) = run(&ctx, json!({})).await;

    let report = result.unwrap();
    assert_eq!(report.full_scan, Some(false));
    assert_eq!(seen, vec![2, 3]);
    assert_eq!(
        store.get(&key()).await.unwrap().unwrap().cutoff,
        ts("2024-03-01T00:00:00Z")
    );
}

#[tokio::test]
async fn test_fatal_error_leaves_watermark_unchanged() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, &[item(1, "2024-01-01T00:00:00Z")]).await;
    let clock = ManualClock::at("2024-02-01T00:00:00Z");
    let ctx = ctx_at(&store, &clock, RunOptions::default());
    run(&ctx, json!({})).await.0.unwrap();
    let before = store.get(&key()).await.unwrap();

    seed(&store, &[item(2, "2024-02-05T00:00:00Z"), item(3, "2024-02-06T00:00:00Z")]).await;
    clock.set("2024-03-01T00:00:00Z");
    let err = StatefulConverter::<Item>::new(
        &ctx,
        SUBTASK,
        json!({}),
        Box::new(|item: &Item| {
            if item.id == 3 {
                Err(PipelineError::storage("domain store unavailable"))
            } else {
                to_board(item)
            }
        }),
    )
    .execute()
    .await
    .unwrap_err();

    assert!(matches!(err, PipelineError::Storage { .. }));
    assert_eq!(store.get(&key()).await.unwrap(), before);
}

#[tokio::test]
async fn test_force_full_resync_reads_everything_and_still_advances() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, &[item(1, "2024-01-01T00:00:00Z"), item(2, "2024-01-02T00:00:00Z")]).await;
    let clock = ManualClock::at("2024-02-01T00:00:00Z");
    run(&ctx_at(&store, &clock, RunOptions::default()), json!({}))
        .await
        .0
        .unwrap();

    clock.set("2024-03-01T00:00:00Z");
    let forced = ctx_at(&store, &clock, RunOptions::default().with_force_full_resync(true));
    let (result, seen) = run(&forced, json!({})).await;

    assert_eq!(result.unwrap().full_scan, Some(true));
    assert_eq!(seen, vec![1, 2]);
    assert_eq!(
        store.get(&key()).await.unwrap().unwrap().cutoff,
        ts("2024-03-01T00:00:00Z")
    );
}

#[tokio::test]
async fn test_config_change_forces_full_scan() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, &[item(1, "2024-01-01T00:00:00Z")]).await;
    let clock = ManualClock::at("2024-02-01T00:00:00Z");
    let ctx = ctx_at(&store, &clock, RunOptions::default());
    run(&ctx, json!({ "typeMappings": {} })).await.0.unwrap();

    clock.set("2024-03-01T00:00:00Z");
    let (result, seen) = run(&ctx, json!({ "typeMappings": { "User Story": "REQUIREMENT" } })).await;

    assert_eq!(result.unwrap().full_scan, Some(true));
    assert_eq!(seen, vec![1]);
    let stored = store.get(&key()).await.unwrap().unwrap();
    assert_eq!(stored.config["typeMappings"]["User Story"], "REQUIREMENT");
}

#[tokio::test]
async fn test_non_incremental_run_is_full() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, &[item(1, "2024-01-01T00:00:00Z")]).await;
    let clock = ManualClock::at("2024-02-01T00:00:00Z");
    run(&ctx_at(&store, &clock, RunOptions::default()), json!({}))
        .await
        .0
        .unwrap();

    let options = RunOptions::new(None, Some(false), None, None).unwrap();
    let (result, seen) = run(&ctx_at(&store, &clock, options), json!({})).await;

    assert_eq!(result.unwrap().full_scan, Some(true));
    assert_eq!(seen, vec![1]);
}

#[tokio::test]
async fn test_stateless_converter_always_reads_everything() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, &[item(1, "2024-01-01T00:00:00Z"), item(2, "2024-01-02T00:00:00Z")]).await;
    let clock = ManualClock::at("2024-02-01T00:00:00Z");
    let ctx = ctx_at(&store, &clock, RunOptions::default());

    for _ in 0..2 {
        let report = DataConverter::<Item>::new(&ctx, Box::new(to_board))
            .execute()
            .await
            .unwrap();
        assert_eq!(report.records_read, 2);
        assert_eq!(report.full_scan, None);
    }
    assert_eq!(store.domain_records("boards").len(), 2);
    assert!(store.get(&key()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_undated_rows_are_only_read_by_full_scans() {
    let store = Arc::new(MemoryStore::new());
    let undated = Item {
        id: 9,
        name: "undated".into(),
        modified: None,
    };
    seed(&store, &[item(1, "2024-01-01T00:00:00Z"), undated]).await;
    let clock = ManualClock::at("2024-02-01T00:00:00Z");
    let ctx = ctx_at(&store, &clock, RunOptions::default());

    let (result, seen) = run(&ctx, json!({})).await;
    assert_eq!(result.unwrap().full_scan, Some(true));
    assert_eq!(seen, vec![1, 9]);

    seed(&store, &[item(2, "2024-02-15T00:00:00Z")]).await;
    clock.set("2024-03-01T00:00:00Z");
    let (result, seen) = run(&ctx, json!({})).await;
    assert_eq!(result.unwrap().full_scan, Some(false));
    assert_eq!(seen, vec![2]);

    clock.set("2024-04-01T00:00:00Z");
    let (result, seen) = run(&ctx, json!({})).await;
    assert_eq!(result.unwrap().full_scan, Some(false));
    assert!(seen.is_empty());
}

#[tokio::test]
async fn test_cancel_during_conversion_leaves_watermark_unchanged() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, &[item(1, "2024-01-01T00:00:00Z")]).await;
    let clock = ManualClock::at("2024-02-01T00:00:00Z");
    let ctx = ctx_at(&store, &clock, RunOptions::default());
    run(&ctx, json!({})).await.0.unwrap();
    let before = store.get(&key()).await.unwrap();

    seed(&store, &[item(2, "2024-02-05T00:00:00Z"), item(3, "2024-02-06T00:00:00Z")]).await;
    clock.set("2024-03-01T00:00:00Z");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let cancel = ctx.cancel.clone();
    let convert: ConvertFn<Item> = {
        let seen = seen.clone();
        Box::new(move |item: &Item| {
            seen.lock().push(item.id);
            cancel.cancel();
            to_board(item)
        })
    };
    let err = StatefulConverter::new(&ctx, SUBTASK, json!({}), convert)
        .execute()
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Cancelled));
    assert_eq!(*seen.lock(), vec![2]);
    assert_eq!(store.get(&key()).await.unwrap(), before);
}
