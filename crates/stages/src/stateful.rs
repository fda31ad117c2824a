//! [`StatefulConverter`]: a converter that remembers how far it got.
//!
//! Each run reads the watermark of `(subtask, fingerprint)` and picks a scan:
//!
//! | Watermark | Options | Config | Scan |
//! |-----------|---------|--------|------|
//! | absent | any | any | full |
//! | present | `force_full_resync` | any | full |
//! | present | `!incremental` | any | full |
//! | present | incremental | differs | full |
//! | present | incremental | same | rows modified at or after the cutoff |
//!
//! Only a run that consumes its whole input and writes every batch advances
//! the watermark, to the time the run *started*.

use pipeline::{Entity, PipelineError, RowFilter, RunOptions, Timestamp, Watermark, WatermarkKey};
use serde_json::Value;
use tracing::{info, instrument};

use crate::context::{StageReport, TaskContext};
use crate::converter::{convert_rows, ConvertFn};

/// Why a stateful run scans its whole input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullScanReason {
    NoWatermark,
    ForcedResync,
    NotIncremental,
    ConfigChanged,
}

impl FullScanReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoWatermark => "no_watermark",
            Self::ForcedResync => "forced_resync",
            Self::NotIncremental => "not_incremental",
            Self::ConfigChanged => "config_changed",
        }
    }
}

/// The input a stateful run reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    Full(FullScanReason),
    /// Rows modified at or after `since`.
    Incremental { since: Timestamp },
}

impl ScanMode {
    /// Decides the scan for a run given the stored watermark.
    pub fn decide(previous: Option<&Watermark>, options: &RunOptions, config: &Value) -> Self {
        match previous {
            None => Self::Full(FullScanReason::NoWatermark),
            Some(_) if options.force_full_resync() => Self::Full(FullScanReason::ForcedResync),
            Some(_) if !options.incremental() => Self::Full(FullScanReason::NotIncremental),
            Some(w) if w.config != *config => Self::Full(FullScanReason::ConfigChanged),
            Some(w) => Self::Incremental { since: w.cutoff },
        }
    }

    pub fn filter(self) -> RowFilter {
        match self {
            Self::Full(_) => RowFilter::all(),
            Self::Incremental { since } => RowFilter::modified_since(since),
        }
    }

    pub fn is_full(self) -> bool {
        matches!(self, Self::Full(_))
    }
}

/// Incremental converter keyed by subtask name and fingerprint.
pub struct StatefulConverter<'a, E: Entity> {
    ctx: &'a TaskContext,
    subtask: &'static str,
    config: Value,
    convert: ConvertFn<E>,
}

impl<'a, E: Entity> StatefulConverter<'a, E> {
    /// `config` is the converter's configuration digest; a change forces a
    /// full scan on the next run.
    pub fn new(
        ctx: &'a TaskContext,
        subtask: &'static str,
        config: Value,
        convert: ConvertFn<E>,
    ) -> Self {
        Self {
            ctx,
            subtask,
            config,
            convert,
        }
    }

    #[instrument(skip_all, fields(subtask = self.subtask, table = E::TABLE))]
    pub async fn execute(self) -> Result<StageReport, PipelineError> {
        let ctx = self.ctx;
        let started = ctx.clock.now();
        let key = WatermarkKey {
            subtask: self.subtask.to_string(),
            fingerprint: ctx.fingerprint.clone(),
        };

        let previous = ctx.guard(ctx.stores.watermarks.get(&key)).await??;
        let mode = ScanMode::decide(previous.as_ref(), &ctx.options, &self.config);
        match mode {
            ScanMode::Full(reason) => info!(reason = reason.as_str(), "full conversion"),
            ScanMode::Incremental { since } => info!(%since, "incremental conversion"),
        }

        let mut report = convert_rows(ctx, mode.filter(), &self.convert).await?;
        report.full_scan = Some(mode.is_full());

        ctx.guard(ctx.stores.watermarks.set(Watermark {
            key,
            cutoff: started,
            config: self.config,
        }))
        .await??;

        info!(
            read = report.records_read,
            written = report.records_written,
            skipped = report.skipped,
            cutoff = %started,
            "conversion finished, watermark advanced"
        );
        Ok(report)
    }
}
