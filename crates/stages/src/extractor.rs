//! [`ApiExtractor`]: parses raw records into typed entities.

use futures::StreamExt;
use pipeline::{Entity, EntityRow, PipelineError, RawRecord};
use tracing::{debug, info, instrument, warn};

use crate::context::{StageReport, TaskContext};
use crate::WRITE_BATCH_SIZE;

/// Parses one raw record into zero or more entities. Must be pure.
pub type RecordParser<E> = Box<dyn Fn(&RawRecord) -> Result<Vec<E>, PipelineError> + Send + Sync>;

/// Extracts entities of type `E` from raw table `raw_table`.
///
/// A record whose parser fails with a skip-class error (including
/// [`PipelineError::MalformedPayload`]) is logged, counted, and dropped;
/// the remaining records are still extracted. Any other error aborts.
pub struct ApiExtractor<'a, E: Entity> {
    ctx: &'a TaskContext,
    raw_table: &'static str,
    parser: RecordParser<E>,
}

impl<'a, E: Entity> ApiExtractor<'a, E> {
    pub fn new(ctx: &'a TaskContext, raw_table: &'static str, parser: RecordParser<E>) -> Self {
        Self {
            ctx,
            raw_table,
            parser,
        }
    }

    /// Runs the extraction.
    #[instrument(skip_all, fields(raw_table = self.raw_table, table = E::TABLE))]
    pub async fn execute(self) -> Result<StageReport, PipelineError> {
        let ctx = self.ctx;
        let fingerprint = &ctx.fingerprint;
        let mut report = StageReport::default();
        let mut batch: Vec<EntityRow> = Vec::with_capacity(WRITE_BATCH_SIZE);

        let mut records = ctx
            .guard(ctx.stores.raw.cursor(self.raw_table, fingerprint))
            .await??;

        while let Some(next) = ctx.guard(records.next()).await? {
            let record = next?;
            report.records_read += 1;
            if record.fingerprint != *fingerprint {
                return Err(PipelineError::configuration(format!(
                    "raw record in '{}' has fingerprint {} but the run uses {}",
                    self.raw_table, record.fingerprint, fingerprint
                )));
            }

            match (self.parser)(&record) {
                Ok(entities) => {
                    for entity in entities {
                        batch.push(entity.to_row()?);
                    }
                }
                Err(e) if e.is_skip() => {
                    warn!(error = %e, url = %record.url, "skipping raw record");
                    report.skipped += 1;
                    continue;
                }
                Err(e) => return Err(e),
            }

            if batch.len() >= WRITE_BATCH_SIZE {
                report.records_written += self.flush(&mut batch).await?;
            }
        }
        report.records_written += self.flush(&mut batch).await?;

        info!(
            read = report.records_read,
            written = report.records_written,
            skipped = report.skipped,
            "extraction finished"
        );
        Ok(report)
    }

    async fn flush(&self, batch: &mut Vec<EntityRow>) -> Result<u64, PipelineError> {
        if batch.is_empty() {
            return Ok(0);
        }
        let rows = std::mem::take(batch);
        let count = rows.len() as u64;
        self.ctx
            .guard(
                self.ctx
                    .stores
                    .entities
                    .upsert(E::TABLE, &self.ctx.fingerprint, rows),
            )
            .await??;
        debug!(count, "entity batch written");
        Ok(count)
    }
}
