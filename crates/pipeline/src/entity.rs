//! The [`Entity`] trait implemented by every extracted, tool-specific record.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{EntityRow, PipelineError, Timestamp};

/// A typed, tool-specific record produced by an extractor.
///
/// Entities are stored as [`EntityRow`]s in table [`Entity::TABLE`],
/// partitioned by fingerprint and keyed by [`Entity::natural_key`].
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Entity table name, e.g. `_tool_taiga_user_stories`.
    const TABLE: &'static str;

    /// Natural key of the entity within its fingerprint.
    fn natural_key(&self) -> String;

    /// Remote last-modified time, if the entity carries one.
    fn modified_at(&self) -> Option<Timestamp> {
        None
    }

    /// Serialises the entity into an [`EntityRow`].
    fn to_row(&self) -> Result<EntityRow, PipelineError> {
        let data = serde_json::to_value(self).map_err(|e| {
            PipelineError::storage(format!("cannot serialise {} row: {e}", Self::TABLE))
        })?;
        Ok(EntityRow {
            key: self.natural_key(),
            modified_at: self.modified_at(),
            data,
        })
    }

    /// Decodes an [`EntityRow`] read back from [`Entity::TABLE`].
    ///
    /// Rows are written only through [`Entity::to_row`], so a row that fails
    /// to decode indicates storage corruption and is fatal.
    fn from_row(row: EntityRow) -> Result<Self, PipelineError> {
        serde_json::from_value(row.data).map_err(|e| {
            PipelineError::storage(format!(
                "cannot decode {} row '{}': {e}",
                Self::TABLE,
                row.key
            ))
        })
    }
}
