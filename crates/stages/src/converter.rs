//! [`DataConverter`]: maps every extracted entity of a fingerprint onto
//! domain records.

use futures::StreamExt;
use pipeline::{DomainRecord, Entity, PipelineError, RowFilter};
use tracing::{debug, info, instrument, warn};

use crate::context::{StageReport, TaskContext};
use crate::WRITE_BATCH_SIZE;

/// Maps one entity onto domain records. Must be pure and deterministic.
pub type ConvertFn<E> = Box<dyn Fn(&E) -> Result<Vec<DomainRecord>, PipelineError> + Send + Sync>;

/// Stateless converter: reconverts the whole entity table on every run.
pub struct DataConverter<'a, E: Entity> {
    ctx: &'a TaskContext,
    convert: ConvertFn<E>,
}

impl<'a, E: Entity> DataConverter<'a, E> {
    pub fn new(ctx: &'a TaskContext, convert: ConvertFn<E>) -> Self {
        Self { ctx, convert }
    }

    #[instrument(skip_all, fields(table = E::TABLE))]
    pub async fn execute(self) -> Result<StageReport, PipelineError> {
        let report = convert_rows(self.ctx, RowFilter::all(), &self.convert).await?;
        info!(
            read = report.records_read,
            written = report.records_written,
            skipped = report.skipped,
            "conversion finished"
        );
        Ok(report)
    }
}

/// Streams the rows of `E::TABLE` passing `filter`, converts each, and
/// upserts the results in batches.
pub(crate) async fn convert_rows<E: Entity>(
    ctx: &TaskContext,
    filter: RowFilter,
    convert: &ConvertFn<E>,
) -> Result<StageReport, PipelineError> {
    let mut report = StageReport::default();
    let mut batch: Vec<DomainRecord> = Vec::with_capacity(WRITE_BATCH_SIZE);

    let mut rows = ctx
        .guard(ctx.stores.entities.cursor(E::TABLE, &ctx.fingerprint, filter))
        .await??;

    while let Some(next) = ctx.guard(rows.next()).await? {
        let row = next?;
        report.records_read += 1;
        let key = row.key.clone();
        let entity = E::from_row(row)?;

        match convert(&entity) {
            Ok(records) => batch.extend(records),
            Err(e) if e.is_skip() => {
                warn!(error = %e, key = %key, "skipping entity");
                report.skipped += 1;
                continue;
            }
            Err(e) => return Err(e),
        }

        if batch.len() >= WRITE_BATCH_SIZE {
            report.records_written += flush(ctx, &mut batch).await?;
        }
    }
    report.records_written += flush(ctx, &mut batch).await?;
    Ok(report)
}

async fn flush(ctx: &TaskContext, batch: &mut Vec<DomainRecord>) -> Result<u64, PipelineError> {
    if batch.is_empty() {
        return Ok(0);
    }
    let records = std::mem::take(batch);
    let count = records.len() as u64;
    ctx.guard(ctx.stores.domain.upsert(records)).await??;
    debug!(count, "domain batch written");
    Ok(count)
}
