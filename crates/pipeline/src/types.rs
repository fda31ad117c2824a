//! Shared value types for the pipeline domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! meaningful values with invariants (fingerprints contain only scalar fields,
//! page sizes are non-zero) and flow between stages through the storage ports.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::PipelineError;

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly; the underlying representation can change without affecting the
/// domain API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Parses an RFC 3339 string (any offset) into a UTC [`Timestamp`].
    pub fn parse_rfc3339(value: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(value)
            .ok()
            .map(|dt| Self(dt.with_timezone(&Utc)))
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

// ---------------------------------------------------------------------------
// Fingerprint
// ---------------------------------------------------------------------------

/// A scalar value inside a [`Fingerprint`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Unsigned integer field (connection id, project id).
    Int(u64),
    /// Textual field (board key, repository name).
    Text(String),
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

/// The key partitioning all pipeline state for one slice of the remote system.
///
/// An ordered set of named scalar fields, e.g. `{connectionId: 1, projectId: 42}`.
/// Every stage of one run reads and writes under the same fingerprint; the
/// canonical form ([`Fingerprint::canonical`]) is the storage partition key.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(BTreeMap<String, FieldValue>);

impl Fingerprint {
    /// Creates an empty fingerprint.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of this fingerprint with `name` set to an integer value.
    #[must_use]
    pub fn with_int(mut self, name: impl Into<String>, value: u64) -> Self {
        self.0.insert(name.into(), FieldValue::Int(value));
        self
    }

    /// Returns a copy of this fingerprint with `name` set to a text value.
    #[must_use]
    pub fn with_text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), FieldValue::Text(value.into()));
        self
    }

    /// Builds a fingerprint from any serialisable params struct whose fields
    /// are all unsigned integers or strings.
    pub fn from_params<P: Serialize>(params: &P) -> Result<Self, PipelineError> {
        let value = serde_json::to_value(params).map_err(|e| {
            PipelineError::configuration(format!("params are not serialisable: {e}"))
        })?;
        let serde_json::Value::Object(map) = value else {
            return Err(PipelineError::configuration("params must be a struct or map"));
        };

        let mut fields = BTreeMap::new();
        for (name, value) in map {
            let field = match value {
                serde_json::Value::Number(n) => n.as_u64().map(FieldValue::Int),
                serde_json::Value::String(s) => Some(FieldValue::Text(s)),
                _ => None,
            }
            .ok_or_else(|| {
                PipelineError::configuration(format!(
                    "param '{name}' must be an unsigned integer or a string"
                ))
            })?;
            fields.insert(name, field);
        }
        Ok(Self(fields))
    }

    /// Returns the value of field `name`, if present.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.get(name)
    }

    /// Returns the integer value of field `name`, if present and integral.
    pub fn get_int(&self, name: &str) -> Option<u64> {
        match self.0.get(name) {
            Some(FieldValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    /// Iterates over the fields in canonical (name) order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns `true` if the fingerprint has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Canonical string form, identical for equal fingerprints.
    pub fn canonical(&self) -> String {
        // A BTreeMap of scalars always serialises.
        serde_json::to_string(&self.0).unwrap_or_default()
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical())
    }
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

/// Transient pagination position of a collector. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCursor {
    /// 1-based page number.
    pub page: u32,
    /// Requested number of items per page.
    pub page_size: u32,
}

impl PageCursor {
    /// The first page for `page_size`.
    pub fn first(page_size: u32) -> Self {
        Self { page: 1, page_size }
    }

    /// The page following this one.
    #[must_use]
    pub fn next(self) -> Self {
        Self {
            page: self.page + 1,
            page_size: self.page_size,
        }
    }
}

// ---------------------------------------------------------------------------
// Raw records
// ---------------------------------------------------------------------------

/// One unparsed payload captured from the remote API.
///
/// Immutable once written. A collector run replaces every raw record of its
/// `(table, fingerprint)` partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Partition this record belongs to.
    pub fingerprint: Fingerprint,
    /// Request path the payload was fetched from (relative to the endpoint).
    pub url: String,
    /// Query parameters used for the request.
    pub input: Vec<(String, String)>,
    /// Page the payload came from; `None` for unpaged requests.
    pub page: Option<PageCursor>,
    /// The payload, uninterpreted by the pipeline machinery.
    pub data: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Extracted rows
// ---------------------------------------------------------------------------

/// A typed entity serialised for the entity store.
///
/// `key` is the entity's natural key within the fingerprint; `modified_at` is
/// the remote last-modified time used by incremental conversion filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRow {
    /// Natural key, unique within `(table, fingerprint)`.
    pub key: String,
    /// Remote modification time, when the entity carries one.
    pub modified_at: Option<Timestamp>,
    /// Serialised entity.
    pub data: serde_json::Value,
}

/// Filter applied to an entity-store cursor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowFilter {
    /// When set, only rows with `modified_at >= since` are returned. Rows
    /// without a modification time only match the unfiltered cursor.
    pub since: Option<Timestamp>,
}

impl RowFilter {
    /// A filter matching every row.
    pub fn all() -> Self {
        Self::default()
    }

    /// A filter matching rows modified at or after `since`.
    pub fn modified_since(since: Timestamp) -> Self {
        Self { since: Some(since) }
    }

    /// Returns `true` if `row` passes this filter.
    pub fn matches(&self, row: &EntityRow) -> bool {
        match (self.since, row.modified_at) {
            (None, _) => true,
            (Some(since), Some(modified)) => modified >= since,
            (Some(_), None) => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Conversion watermark
// ---------------------------------------------------------------------------

/// Identity of one stateful converter's watermark.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WatermarkKey {
    /// Name of the converting subtask, e.g. `"convertUserStories"`.
    pub subtask: String,
    /// Partition the watermark applies to.
    pub fingerprint: Fingerprint,
}

/// Cutoff of the last successful conversion for one [`WatermarkKey`].
///
/// Written only after a conversion has consumed its whole input without an
/// unrecovered error; never partially updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Watermark {
    /// Which converter and partition this watermark belongs to.
    pub key: WatermarkKey,
    /// Start time of the last successful run.
    pub cutoff: Timestamp,
    /// Converter configuration the last successful run used. A different
    /// configuration forces a full scan.
    pub config: serde_json::Value,
}
