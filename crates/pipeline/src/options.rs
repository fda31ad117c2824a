//! Validated run configuration shared by every stage.
//!
//! [`RunOptions`] is built once at the boundary from loosely typed input and is
//! immutable afterwards. Invalid values are rejected with a descriptive
//! [`PipelineError::Configuration`]; nothing is silently defaulted except
//! fields that are absent.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::PipelineError;

/// Default number of items requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Largest page size a collector may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Category of domain data a subtask contributes to.
///
/// Used as the `entities` tag set selecting which subtasks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DomainType {
    Code,
    Ticket,
    CodeReview,
    Cross,
    Cicd,
    CodeQuality,
}

impl DomainType {
    /// Every domain type, in declaration order.
    pub const ALL: [DomainType; 6] = [
        Self::Code,
        Self::Ticket,
        Self::CodeReview,
        Self::Cross,
        Self::Cicd,
        Self::CodeQuality,
    ];

    /// Wire name of the domain type (e.g. `"TICKET"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Code => "CODE",
            Self::Ticket => "TICKET",
            Self::CodeReview => "CODE_REVIEW",
            Self::Cross => "CROSS",
            Self::Cicd => "CICD",
            Self::CodeQuality => "CODE_QUALITY",
        }
    }

    /// Parses a wire name, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

impl std::fmt::Display for DomainType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable, validated options for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOptions {
    page_size: u32,
    incremental: bool,
    force_full_resync: bool,
    entities: BTreeSet<DomainType>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            incremental: true,
            force_full_resync: false,
            entities: DomainType::ALL.into_iter().collect(),
        }
    }
}

impl RunOptions {
    /// Validates raw option values.
    ///
    /// - `page_size`: absent → [`DEFAULT_PAGE_SIZE`]; must be in `1..=MAX_PAGE_SIZE`.
    /// - `incremental`: absent → `true`.
    /// - `force_full_resync`: absent → `false`. Takes precedence over `incremental`.
    /// - `entities`: absent → every [`DomainType`]; each tag must be known and
    ///   the set must not be empty.
    pub fn new(
        page_size: Option<u32>,
        incremental: Option<bool>,
        force_full_resync: Option<bool>,
        entities: Option<Vec<String>>,
    ) -> Result<Self, PipelineError> {
        let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(PipelineError::configuration(format!(
                "pageSize must be between 1 and {MAX_PAGE_SIZE}, got {page_size}"
            )));
        }

        let entities = match entities {
            None => DomainType::ALL.into_iter().collect(),
            Some(tags) => {
                let mut set = BTreeSet::new();
                for tag in &tags {
                    let parsed = DomainType::parse(tag).ok_or_else(|| {
                        PipelineError::configuration(format!("unknown entity type '{tag}'"))
                    })?;
                    set.insert(parsed);
                }
                if set.is_empty() {
                    return Err(PipelineError::configuration(
                        "entities must name at least one domain type",
                    ));
                }
                set
            }
        };

        Ok(Self {
            page_size,
            incremental: incremental.unwrap_or(true),
            force_full_resync: force_full_resync.unwrap_or(false),
            entities,
        })
    }

    /// Page size collectors must request.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Whether stateful converters may restrict their input to changed records.
    pub fn incremental(&self) -> bool {
        self.incremental
    }

    /// Whether stateful converters must ignore their watermark for reading.
    pub fn force_full_resync(&self) -> bool {
        self.force_full_resync
    }

    /// The domain types requested for this run.
    pub fn entities(&self) -> &BTreeSet<DomainType> {
        &self.entities
    }

    /// Returns `true` if any of `domain_types` was requested.
    pub fn wants_any(&self, domain_types: &[DomainType]) -> bool {
        domain_types.iter().any(|t| self.entities.contains(t))
    }

    /// Returns a copy whose entities are narrowed to those also in `allowed`.
    /// The result may be empty, in which case no subtask is selected.
    #[must_use]
    pub fn restricted_to(mut self, allowed: &[DomainType]) -> Self {
        self.entities.retain(|t| allowed.contains(t));
        self
    }

    /// Returns a copy with `force_full_resync` set.
    #[must_use]
    pub fn with_force_full_resync(mut self, force: bool) -> Self {
        self.force_full_resync = force;
        self
    }
}
