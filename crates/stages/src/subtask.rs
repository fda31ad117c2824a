//! Subtask metadata and the sequential per-fingerprint runner.

use futures::future::BoxFuture;
use pipeline::{DomainType, PipelineError, RunId, RunOptions};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, info_span, Instrument};

use crate::context::{AsTaskContext, StageReport};

/// Entry point of one subtask over plugin task data `D`.
pub type EntryPoint<D> = for<'a> fn(&'a D) -> BoxFuture<'a, Result<StageReport, PipelineError>>;

/// Static description of one subtask of a plugin.
pub struct SubtaskMeta<D: 'static> {
    pub name: &'static str,
    pub description: &'static str,
    pub enabled_by_default: bool,
    /// The subtask runs when any of these was requested.
    pub domain_types: &'static [DomainType],
    pub entry_point: EntryPoint<D>,
}

impl<D: 'static> Clone for SubtaskMeta<D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D: 'static> Copy for SubtaskMeta<D> {}

impl<D: 'static> std::fmt::Debug for SubtaskMeta<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubtaskMeta")
            .field("name", &self.name)
            .field("enabled_by_default", &self.enabled_by_default)
            .field("domain_types", &self.domain_types)
            .finish_non_exhaustive()
    }
}

/// Subtasks of `metas` that a run with `options` executes, in declaration order.
pub fn select_subtasks<'m, D: 'static>(
    metas: &'m [SubtaskMeta<D>],
    options: &RunOptions,
) -> Vec<&'m SubtaskMeta<D>> {
    metas
        .iter()
        .filter(|m| m.enabled_by_default && options.wants_any(m.domain_types))
        .collect()
}

/// A subtask failed; later subtasks were not run.
#[derive(Debug, Error)]
#[error("subtask '{subtask}' failed: {source}")]
pub struct SubtaskError {
    pub subtask: &'static str,
    /// Reports of the subtasks that completed before the failure.
    pub completed: Vec<SubtaskOutcome>,
    #[source]
    pub source: PipelineError,
}

/// Result of one completed subtask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubtaskOutcome {
    pub name: &'static str,
    pub report: StageReport,
}

/// Results of all subtasks of one fingerprint's run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub fingerprint: String,
    pub subtasks: Vec<SubtaskOutcome>,
}

/// Runs the selected subtasks one after another; each starts only after the
/// previous one finished writing. The first error stops the run.
pub async fn run_subtasks<D: AsTaskContext + 'static>(
    data: &D,
    metas: &[SubtaskMeta<D>],
) -> Result<RunSummary, SubtaskError> {
    let ctx = data.task_context();
    let selected = select_subtasks(metas, &ctx.options);
    let fingerprint = ctx.fingerprint.canonical();
    info!(
        run_id = %ctx.run_id,
        fingerprint = %fingerprint,
        subtasks = selected.len(),
        "run started"
    );

    let mut completed = Vec::with_capacity(selected.len());
    for meta in selected {
        let span = info_span!(
            "subtask",
            subtask = meta.name,
            fingerprint = %fingerprint,
            run_id = %ctx.run_id
        );
        let result = match ctx.ensure_active() {
            Ok(()) => (meta.entry_point)(data).instrument(span).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(report) => completed.push(SubtaskOutcome {
                name: meta.name,
                report,
            }),
            Err(source) => {
                return Err(SubtaskError {
                    subtask: meta.name,
                    completed,
                    source,
                })
            }
        }
    }

    info!(run_id = %ctx.run_id, fingerprint = %fingerprint, "run finished");
    Ok(RunSummary {
        run_id: ctx.run_id,
        fingerprint,
        subtasks: completed,
    })
}
