//! Cross-tool domain model: boards, issues, and board-issue links.
//!
//! Domain records are keyed by a [`DomainId`] derived deterministically from
//! the tool-layer entity. Conversion only ever upserts them; deletions of
//! remote entities are not modelled.

use serde::{Deserialize, Serialize};

use crate::{DomainId, Timestamp};

/// Standardised issue types.
pub mod issue_type {
    /// A requirement or user story.
    pub const REQUIREMENT: &str = "REQUIREMENT";
    /// A defect.
    pub const BUG: &str = "BUG";
    /// An operational incident.
    pub const INCIDENT: &str = "INCIDENT";
    /// A piece of work that is none of the above.
    pub const TASK: &str = "TASK";
}

/// Standardised issue statuses.
pub mod issue_status {
    /// Not started.
    pub const TODO: &str = "TODO";
    /// In progress.
    pub const IN_PROGRESS: &str = "IN_PROGRESS";
    /// Finished.
    pub const DONE: &str = "DONE";
}

/// A board: the domain counterpart of a tool's project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: DomainId,
    pub name: String,
    pub description: String,
    pub url: String,
    pub created_date: Option<Timestamp>,
}

/// A ticket-like unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: DomainId,
    pub issue_key: String,
    pub title: String,
    pub description: String,
    /// One of the [`issue_type`] constants.
    pub issue_type: String,
    pub original_type: String,
    /// One of the [`issue_status`] constants.
    pub status: String,
    pub original_status: String,
    pub story_point: Option<f64>,
    pub priority: String,
    pub assignee_id: Option<String>,
    pub assignee_name: Option<String>,
    pub created_date: Option<Timestamp>,
    pub updated_date: Option<Timestamp>,
    pub resolution_date: Option<Timestamp>,
}

/// Membership of an issue on a board.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoardIssue {
    pub board_id: DomainId,
    pub issue_id: DomainId,
}

/// Any record a converter can emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainRecord {
    Board(Board),
    Issue(Issue),
    BoardIssue(BoardIssue),
}

impl DomainRecord {
    /// Domain table the record is stored in.
    pub fn table(&self) -> &'static str {
        match self {
            Self::Board(_) => "boards",
            Self::Issue(_) => "issues",
            Self::BoardIssue(_) => "board_issues",
        }
    }

    /// Upsert key within [`DomainRecord::table`].
    ///
    /// Board-issue links have no identifier of their own; their key is the
    /// (board, issue) pair.
    pub fn key(&self) -> String {
        match self {
            Self::Board(b) => b.id.to_string(),
            Self::Issue(i) => i.id.to_string(),
            Self::BoardIssue(l) => format!("{}|{}", l.board_id, l.issue_id),
        }
    }
}

impl From<Board> for DomainRecord {
    fn from(value: Board) -> Self {
        Self::Board(value)
    }
}

impl From<Issue> for DomainRecord {
    fn from(value: Issue) -> Self {
        Self::Issue(value)
    }
}

impl From<BoardIssue> for DomainRecord {
    fn from(value: BoardIssue) -> Self {
        Self::BoardIssue(value)
    }
}
