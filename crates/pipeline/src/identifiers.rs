//! Newtype identifiers and deterministic domain-identifier generation.
//!
//! Every concept that has an identity is represented as a distinct newtype
//! wrapping a primitive. This prevents accidentally interchanging, for example,
//! a [`ConnectionId`] with a [`ProjectId`] even though both are `u64` under the
//! hood.
//!
//! Domain identifiers ([`DomainId`]) are produced by [`DomainIdGenerator`], a
//! pure function of tool name, entity type, and key parts. The same remote
//! entity always maps to the same [`DomainId`] across runs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Macro for u64-wrapped newtypes (remotely or locally assigned integers).
// Generates: struct (Copy), new(), as_u64(), Display.
// ---------------------------------------------------------------------------
macro_rules! u64_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Creates a new identifier from a raw integer.
            pub fn new(value: u64) -> Self {
                Self(value)
            }

            /// Returns the underlying integer value.
            pub fn as_u64(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: integer-backed
// ---------------------------------------------------------------------------

u64_id! {
    /// Identifies a stored connection (base URL, credential, and rate quota).
    ///
    /// Assigned by the connection store; `0` is never a valid connection.
    ConnectionId
}

u64_id! {
    /// Identifies a project in the remote system.
    ProjectId
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (generated locally)
// ---------------------------------------------------------------------------

/// Identifies a single pipeline run for one fingerprint.
///
/// Generated fresh for every run; propagated through spans so all activity of
/// a run can be correlated. Never used as input to domain identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Generates a new random run identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a [`RunId`] from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Identifiers: string-backed
// ---------------------------------------------------------------------------

string_id! {
    /// Globally unique identifier of a domain record (board, issue).
    ///
    /// Format: `<tool>:<EntityType>:<part>[:<part>...]`, e.g.
    /// `taiga:TaigaProject:1:42`. Produced only by [`DomainIdGenerator`].
    DomainId
}

// ---------------------------------------------------------------------------
// Domain identifier generation
// ---------------------------------------------------------------------------

/// One component of a domain identifier key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdPart {
    /// Integer key component (connection id, remote numeric id).
    Int(u64),
    /// Textual key component. Escaped so it can never forge a separator.
    Text(String),
}

impl From<u64> for IdPart {
    fn from(value: u64) -> Self {
        Self::Int(value)
    }
}

impl From<ConnectionId> for IdPart {
    fn from(value: ConnectionId) -> Self {
        Self::Int(value.as_u64())
    }
}

impl From<ProjectId> for IdPart {
    fn from(value: ProjectId) -> Self {
        Self::Int(value.as_u64())
    }
}

impl From<&str> for IdPart {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for IdPart {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl IdPart {
    fn write_escaped(&self, out: &mut String) {
        match self {
            Self::Int(v) => out.push_str(&v.to_string()),
            Self::Text(s) => {
                for ch in s.chars() {
                    match ch {
                        '%' => out.push_str("%25"),
                        ':' => out.push_str("%3A"),
                        c => out.push(c),
                    }
                }
            }
        }
    }
}

/// Deterministic generator of [`DomainId`]s for one tool entity type.
///
/// `generate` is pure: no randomness and no clock. Distinct part lists yield
/// distinct identifiers because `:` and `%` inside text parts are
/// percent-escaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainIdGenerator {
    prefix: String,
}

impl DomainIdGenerator {
    /// Creates a generator for `tool` (e.g. `"taiga"`) and the tool-layer
    /// entity type name (e.g. `"TaigaProject"`).
    pub fn new(tool: &str, entity_type: &str) -> Self {
        let mut prefix = String::new();
        IdPart::from(tool).write_escaped(&mut prefix);
        prefix.push(':');
        IdPart::from(entity_type).write_escaped(&mut prefix);
        Self { prefix }
    }

    /// Generates the identifier for the given key parts.
    pub fn generate<I, P>(&self, parts: I) -> DomainId
    where
        I: IntoIterator<Item = P>,
        P: Into<IdPart>,
    {
        let mut id = self.prefix.clone();
        for part in parts {
            id.push(':');
            part.into().write_escaped(&mut id);
        }
        DomainId(id)
    }
}

/// Generates the domain identifier of a tool-scoped entity keyed by connection
/// and natural id, e.g. `generate_id("taiga", "TaigaProject", 1, 42)`.
pub fn generate_id(
    tool: &str,
    entity_type: &str,
    connection_id: ConnectionId,
    natural_id: impl Into<IdPart>,
) -> DomainId {
    DomainIdGenerator::new(tool, entity_type)
        .generate([IdPart::from(connection_id), natural_id.into()])
}
