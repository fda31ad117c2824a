//! [`ApiCollector`]: pages through a remote resource and stores every
//! returned message as a raw record of the run's fingerprint.

use pipeline::{ApiRequest, ApiResponse, Fingerprint, PageCursor, PipelineError, RawRecord};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::context::{StageReport, TaskContext};
use crate::template;

/// Builds the query of one request from the fingerprint and page.
pub type QueryBuilder =
    Box<dyn Fn(&Fingerprint, Option<PageCursor>) -> Vec<(String, String)> + Send + Sync>;

/// Splits one response into the raw messages to store.
pub type ResponseParser = Box<dyn Fn(&ApiResponse) -> Result<Vec<Value>, PipelineError> + Send + Sync>;

/// How a collector walks the remote resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    /// One request, no page parameters.
    Unpaged,
    /// Pages of `page_size` starting at 1. Paging continues only while a page
    /// returns exactly `page_size` messages: fewer marks the last page, and
    /// more means the server ignored the page size and returned everything.
    Paged { page_size: u32 },
}

/// The default paged query: `page` and `page_size`.
pub fn page_query(page: Option<PageCursor>) -> Vec<(String, String)> {
    match page {
        Some(p) => vec![
            ("page".to_string(), p.page.to_string()),
            ("page_size".to_string(), p.page_size.to_string()),
        ],
        None => Vec::new(),
    }
}

/// Parser for endpoints returning a JSON array: one message per element.
pub fn json_array(response: &ApiResponse) -> Result<Vec<Value>, PipelineError> {
    match response.json::<Value>("response")? {
        Value::Array(items) => Ok(items),
        other => Err(PipelineError::malformed(
            "response",
            format!("expected a JSON array, got {}", json_kind(&other)),
        )),
    }
}

/// Parser for endpoints returning a single JSON object: one message.
pub fn json_object(response: &ApiResponse) -> Result<Vec<Value>, PipelineError> {
    match response.json::<Value>("response")? {
        obj @ Value::Object(_) => Ok(vec![obj]),
        other => Err(PipelineError::malformed(
            "response",
            format!("expected a JSON object, got {}", json_kind(&other)),
        )),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Collects one remote resource into raw table `table`.
///
/// Every run first clears the `(table, fingerprint)` partition, so re-running
/// replaces rather than accumulates. A run that fails after the clear leaves
/// the partition partially written and must be re-run from scratch.
pub struct ApiCollector<'a> {
    ctx: &'a TaskContext,
    table: &'static str,
    url_template: String,
    pagination: Pagination,
    query: Option<QueryBuilder>,
    parser: ResponseParser,
    skip_statuses: Vec<u16>,
}

impl<'a> ApiCollector<'a> {
    /// Creates an unpaged collector.
    pub fn new(
        ctx: &'a TaskContext,
        table: &'static str,
        url_template: impl Into<String>,
        parser: ResponseParser,
    ) -> Self {
        Self {
            ctx,
            table,
            url_template: url_template.into(),
            pagination: Pagination::Unpaged,
            query: None,
            parser,
            skip_statuses: Vec::new(),
        }
    }

    /// Pages through the resource with `page_size` items per request.
    #[must_use]
    pub fn paged(mut self, page_size: u32) -> Self {
        self.pagination = Pagination::Paged { page_size };
        self
    }

    /// Replaces the default query ([`page_query`]).
    #[must_use]
    pub fn with_query(mut self, query: QueryBuilder) -> Self {
        self.query = Some(query);
        self
    }

    /// Treats `statuses` as skip-and-continue for this resource.
    #[must_use]
    pub fn skipping(mut self, statuses: &[u16]) -> Self {
        self.skip_statuses.extend_from_slice(statuses);
        self
    }

    /// Runs the collection.
    ///
    /// Pages are fetched one at a time, since the stop rule depends on the
    /// previous page's count. Request concurrency comes from the shared API
    /// client serving several tasks at once.
    #[instrument(skip_all, fields(table = self.table))]
    pub async fn execute(self) -> Result<StageReport, PipelineError> {
        let ctx = self.ctx;
        let fingerprint = &ctx.fingerprint;
        let path = template::render(&self.url_template, fingerprint)?;
        if let Pagination::Paged { page_size: 0 } = self.pagination {
            return Err(PipelineError::configuration("collector page size must be non-zero"));
        }

        ctx.ensure_active()?;
        let cleared = ctx
            .guard(ctx.stores.raw.clear(self.table, fingerprint))
            .await??;
        debug!(cleared, "cleared previous raw records");

        let mut report = StageReport::default();
        let mut page = match self.pagination {
            Pagination::Unpaged => None,
            Pagination::Paged { page_size } => Some(PageCursor::first(page_size)),
        };

        loop {
            let input = match &self.query {
                Some(build) => build(fingerprint, page),
                None => page_query(page),
            };
            let request = ApiRequest::get(path.clone())
                .with_query(input.clone())
                .skipping(&self.skip_statuses);

            let outcome = ctx.guard(ctx.api.request(request)).await?;
            report.requests += 1;

            let messages = match outcome.and_then(|response| (self.parser)(&response)) {
                Ok(messages) => messages,
                Err(e) if e.is_skip() => {
                    warn!(error = %e, page = page.map(|p| p.page), "skipping remaining pages");
                    report.skipped += 1;
                    break;
                }
                Err(e) => return Err(e),
            };

            let count = messages.len();
            let records: Vec<RawRecord> = messages
                .into_iter()
                .map(|data| RawRecord {
                    fingerprint: fingerprint.clone(),
                    url: path.clone(),
                    input: input.clone(),
                    page,
                    data,
                })
                .collect();
            ctx.guard(ctx.stores.raw.append(self.table, records))
                .await??;
            report.records_written += count as u64;
            debug!(page = page.map(|p| p.page), count, "page stored");

            page = match page {
                Some(p) if count == p.page_size as usize => Some(p.next()),
                Some(p) if count > p.page_size as usize => {
                    debug!(count, page_size = p.page_size, "server returned the full set in one page");
                    None
                }
                _ => None,
            };
            if page.is_none() {
                break;
            }
        }

        info!(
            requests = report.requests,
            records = report.records_written,
            skipped = report.skipped,
            "collection finished"
        );
        Ok(report)
    }
}
