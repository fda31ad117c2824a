//! Generic pipeline stages reused by every entity of every plugin.
//!
//! ## Architectural Layer
//!
//! **Orchestration.** Stages depend on the port traits of [`pipeline`] and on
//! nothing concrete: they are handed an API client and stores through
//! [`TaskContext`].
//!
//! ## Stages
//!
//! | Stage | Reads | Writes |
//! |-------|-------|--------|
//! | [`ApiCollector`] | remote API | raw table (cleared first) |
//! | [`ApiExtractor`] | raw table | entity table (upsert by natural key) |
//! | [`DataConverter`] | whole entity table | domain tables (upsert by id) |
//! | [`StatefulConverter`] | entity rows changed since the watermark | domain tables, watermark |
//!
//! Within one fingerprint the stages run strictly in order
//! ([`run_subtasks`]); data only flows forward.
//!
//! ## Error handling
//!
//! Stages never reinterpret a [`pipeline::PipelineError`]. They consult its
//! class: skip-class errors are logged, counted in [`StageReport::skipped`],
//! and the stage continues; every other error aborts the stage. Cancellation
//! of [`TaskContext::cancel`] aborts the stage at its next suspension point.

pub mod collector;
pub mod context;
pub mod converter;
pub mod extractor;
pub mod stateful;
pub mod subtask;
pub mod template;

pub use collector::{
    json_array, json_object, page_query, ApiCollector, Pagination, QueryBuilder, ResponseParser,
};
pub use context::{AsTaskContext, StageReport, Stores, TaskContext};
pub use converter::{ConvertFn, DataConverter};
pub use extractor::{ApiExtractor, RecordParser};
pub use stateful::{FullScanReason, ScanMode, StatefulConverter};
pub use subtask::{
    run_subtasks, select_subtasks, EntryPoint, RunSummary, SubtaskError, SubtaskMeta,
    SubtaskOutcome,
};

/// Rows written per store call by extractors and converters.
pub const WRITE_BATCH_SIZE: usize = 500;
