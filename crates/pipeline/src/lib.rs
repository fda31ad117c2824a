//! Core domain for the Taiga ETL pipeline.
//!
//! This crate contains every domain concept, newtype identifier, shared value
//! type, and cross-cutting error type used throughout the workspace.
//! Infrastructure crates implement the traits defined here; they never add
//! domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers and deterministic [`DomainIdGenerator`] |
//! | [`types`] | Shared value types (`Fingerprint`, `RawRecord`, `Watermark`, etc.) |
//! | [`domain`] | Cross-tool domain records (`Board`, `Issue`, `BoardIssue`) |
//! | [`entity`] | The [`Entity`] trait for extracted, tool-specific records |
//! | [`options`] | Validated [`RunOptions`] |
//! | [`http`] | Transport-neutral request/response values |
//! | [`ports`] | Storage, API, and clock traits |
//! | [`errors`] | [`PipelineError`], [`ErrorClass`], and [`RetryPolicy`] |

pub mod domain;
pub mod entity;
pub mod errors;
pub mod http;
pub mod identifiers;
pub mod options;
pub mod ports;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use domain::{issue_status, issue_type, Board, BoardIssue, DomainRecord, Issue};
pub use entity::Entity;
pub use errors::{ErrorClass, PipelineError, Result, RetryPolicy, TRANSIENT_HTTP_STATUSES};
pub use http::{ApiRequest, ApiResponse, HttpMethod, RequestHeaders};
pub use identifiers::{
    generate_id, ConnectionId, DomainId, DomainIdGenerator, IdPart, ProjectId, RunId,
};
pub use options::{DomainType, RunOptions, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use ports::{
    ApiClient, Clock, Connection, DomainStore, EntityStore, RawDataStore, RecordStream,
    SystemClock, WatermarkStore,
};
pub use types::{
    EntityRow, FieldValue, Fingerprint, PageCursor, RawRecord, RowFilter, Timestamp, Watermark,
    WatermarkKey,
};
