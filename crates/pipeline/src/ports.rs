//! Port traits implemented by infrastructure crates.
//!
//! The pipeline never opens its own storage or network connection; it is
//! handed implementations of these traits. Cursor methods return a
//! [`RecordStream`]: a lazy, finite, single-pass sequence whose underlying
//! resources are released when the stream is dropped, on every exit path.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::{
    ApiRequest, ApiResponse, DomainRecord, EntityRow, Fingerprint, PipelineError, RawRecord,
    RequestHeaders, RowFilter, Timestamp, Watermark, WatermarkKey,
};

/// Single-pass stream of records read from a store.
pub type RecordStream<T> = BoxStream<'static, Result<T, PipelineError>>;

// ---------------------------------------------------------------------------
// Remote API
// ---------------------------------------------------------------------------

/// Issues requests against one connection's remote API.
///
/// Implementations classify failures: 401/403 → [`PipelineError::Unauthorized`],
/// 404 or a declared skip status → [`PipelineError::Skip`], exhausted transient
/// failures → [`PipelineError::RetriesExhausted`], other non-2xx →
/// [`PipelineError::Http`].
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Sends `request` and returns the 2xx response.
    async fn request(&self, request: ApiRequest) -> Result<ApiResponse, PipelineError>;
}

/// A stored connection: where the remote API lives, how to authenticate, and
/// how fast it may be called.
pub trait Connection: Send + Sync {
    /// Base URL of the remote API.
    fn endpoint(&self) -> &str;

    /// Configured quota in requests per hour, if any.
    fn rate_limit_per_hour(&self) -> Option<u32>;

    /// Adds authentication headers to an outbound request. Never mutates the
    /// stored credential.
    fn apply_authentication(&self, headers: &mut RequestHeaders) -> Result<(), PipelineError>;
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Raw payload storage written by collectors and read by extractors.
#[async_trait]
pub trait RawDataStore: Send + Sync {
    /// Deletes every raw record of `(table, fingerprint)`; returns how many.
    async fn clear(&self, table: &str, fingerprint: &Fingerprint) -> Result<u64, PipelineError>;

    /// Appends records to `table`, each under its own fingerprint.
    async fn append(&self, table: &str, records: Vec<RawRecord>) -> Result<(), PipelineError>;

    /// Streams every raw record of `(table, fingerprint)`.
    async fn cursor(
        &self,
        table: &str,
        fingerprint: &Fingerprint,
    ) -> Result<RecordStream<RawRecord>, PipelineError>;
}

/// Storage of extracted, tool-specific entities.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Inserts rows, replacing rows with the same natural key in `(table, fingerprint)`.
    async fn upsert(
        &self,
        table: &str,
        fingerprint: &Fingerprint,
        rows: Vec<EntityRow>,
    ) -> Result<(), PipelineError>;

    /// Streams the rows of `(table, fingerprint)` that pass `filter`.
    async fn cursor(
        &self,
        table: &str,
        fingerprint: &Fingerprint,
        filter: RowFilter,
    ) -> Result<RecordStream<EntityRow>, PipelineError>;
}

/// Storage of cross-tool domain records.
#[async_trait]
pub trait DomainStore: Send + Sync {
    /// Inserts records, replacing records with the same table and key.
    async fn upsert(&self, records: Vec<DomainRecord>) -> Result<(), PipelineError>;
}

/// Persistence of stateful-converter watermarks.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Returns the watermark for `key`, if one was ever written.
    async fn get(&self, key: &WatermarkKey) -> Result<Option<Watermark>, PipelineError>;

    /// Stores `watermark`, replacing any previous value for its key.
    async fn set(&self, watermark: Watermark) -> Result<(), PipelineError>;
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Source of "now" for watermark cutoffs.
pub trait Clock: Send + Sync {
    /// The current time.
    fn now(&self) -> Timestamp;
}

/// [`Clock`] backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}
