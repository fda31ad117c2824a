//! The explicit per-run context handed to every stage.

use std::future::Future;
use std::sync::Arc;

use pipeline::{
    ApiClient, Clock, DomainStore, EntityStore, Fingerprint, PipelineError, RawDataStore, RunId,
    RunOptions, SystemClock, WatermarkStore,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// Handles to every storage port a run touches.
#[derive(Clone)]
pub struct Stores {
    pub raw: Arc<dyn RawDataStore>,
    pub entities: Arc<dyn EntityStore>,
    pub domain: Arc<dyn DomainStore>,
    pub watermarks: Arc<dyn WatermarkStore>,
}

impl Stores {
    /// Uses one backing store for every port.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: RawDataStore + EntityStore + DomainStore + WatermarkStore + 'static,
    {
        Self {
            raw: store.clone(),
            entities: store.clone(),
            domain: store.clone(),
            watermarks: store,
        }
    }
}

/// Everything a stage needs for one fingerprint's run.
///
/// Built once per fingerprint by the caller and passed by reference into
/// every stage. Nothing in the pipeline holds global state.
#[derive(Clone)]
pub struct TaskContext {
    pub options: RunOptions,
    pub fingerprint: Fingerprint,
    pub api: Arc<dyn ApiClient>,
    pub stores: Stores,
    pub clock: Arc<dyn Clock>,
    pub cancel: CancellationToken,
    pub run_id: RunId,
}

impl std::fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskContext")
            .field("run_id", &self.run_id)
            .field("fingerprint", &self.fingerprint.canonical())
            .field("options", &self.options)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl TaskContext {
    /// Creates a context with the system clock, a fresh run id, and an
    /// un-cancelled token.
    pub fn new(
        options: RunOptions,
        fingerprint: Fingerprint,
        api: Arc<dyn ApiClient>,
        stores: Stores,
    ) -> Self {
        Self {
            options,
            fingerprint,
            api,
            stores,
            clock: Arc::new(SystemClock),
            cancel: CancellationToken::new(),
            run_id: RunId::new_random(),
        }
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the cancellation token, typically with a child of a
    /// process-wide token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Fails with [`PipelineError::Cancelled`] once the run is cancelled.
    pub fn ensure_active(&self) -> Result<(), PipelineError> {
        if self.cancel.is_cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Drives `fut` to completion unless the run is cancelled first, in
    /// which case `fut` is dropped (aborting any in-flight request it owns).
    pub async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, PipelineError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(PipelineError::Cancelled),
            out = fut => Ok(out),
        }
    }
}

/// Implemented by plugin task data so generic machinery can reach the context.
pub trait AsTaskContext: Send + Sync {
    fn task_context(&self) -> &TaskContext;
}

impl AsTaskContext for TaskContext {
    fn task_context(&self) -> &TaskContext {
        self
    }
}

/// Counters reported by one stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageReport {
    /// API requests issued (collectors only).
    pub requests: u64,
    /// Input records consumed.
    pub records_read: u64,
    /// Output records written.
    pub records_written: u64,
    /// Items dropped under skip-and-continue.
    pub skipped: u64,
    /// Whether a stateful converter scanned its whole input.
    pub full_scan: Option<bool>,
}
