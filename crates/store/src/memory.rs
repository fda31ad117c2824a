//! [`MemoryStore`]: every storage port over one in-process state tree.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::RwLock;
use pipeline::{
    DomainRecord, DomainStore, EntityRow, EntityStore, Fingerprint, PipelineError, RawDataStore,
    RawRecord, RecordStream, RowFilter, Watermark, WatermarkKey, WatermarkStore,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::errors::StoreError;

type Partitioned<T> = BTreeMap<String, BTreeMap<String, T>>;

/// Serialisable state of a [`MemoryStore`].
///
/// Partitions are keyed by table name, then by [`Fingerprint::canonical`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct State {
    raw: Partitioned<Vec<RawRecord>>,
    entities: Partitioned<BTreeMap<String, EntityRow>>,
    domain: BTreeMap<String, BTreeMap<String, DomainRecord>>,
    watermarks: BTreeMap<String, Watermark>,
}

fn watermark_slot(key: &WatermarkKey) -> String {
    format!("{}|{}", key.subtask, key.fingerprint.canonical())
}

/// In-memory store implementing [`RawDataStore`], [`EntityStore`],
/// [`DomainStore`], and [`WatermarkStore`].
///
/// Clones share the same state. Cursors iterate over a copy of the partition
/// taken when the cursor is opened, so writes made while a cursor is being
/// consumed are not observed by it.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a store from a JSON snapshot. A missing file yields an empty store.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no snapshot found, starting empty");
                return Ok(Self::new());
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let state: State = serde_json::from_slice(&bytes).map_err(|source| StoreError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        info!(watermarks = state.watermarks.len(), "snapshot loaded");
        Ok(Self {
            state: Arc::new(RwLock::new(state)),
        })
    }

    /// Writes the current state as a JSON snapshot, replacing `path` atomically.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        let bytes = {
            let state = self.state.read();
            serde_json::to_vec_pretty(&*state).map_err(StoreError::Encode)?
        };
        let tmp = path.with_extension("tmp");
        let io_err = |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };
        tokio::fs::write(&tmp, &bytes).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, path).await.map_err(io_err)?;
        debug!(bytes = bytes.len(), "snapshot saved");
        Ok(())
    }

    /// Raw records of one partition, in append order.
    pub fn raw_records(&self, table: &str, fingerprint: &Fingerprint) -> Vec<RawRecord> {
        self.state
            .read()
            .raw
            .get(table)
            .and_then(|t| t.get(&fingerprint.canonical()))
            .cloned()
            .unwrap_or_default()
    }

    /// Entity rows of one partition, ordered by key.
    pub fn entity_rows(&self, table: &str, fingerprint: &Fingerprint) -> Vec<EntityRow> {
        self.state
            .read()
            .entities
            .get(table)
            .and_then(|t| t.get(&fingerprint.canonical()))
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Domain records of one domain table, ordered by key.
    pub fn domain_records(&self, table: &str) -> Vec<DomainRecord> {
        self.state
            .read()
            .domain
            .get(table)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RawDataStore for MemoryStore {
    #[instrument(level = "debug", skip(self), fields(fingerprint = %fingerprint))]
    async fn clear(&self, table: &str, fingerprint: &Fingerprint) -> Result<u64, PipelineError> {
        let removed = self
            .state
            .write()
            .raw
            .get_mut(table)
            .and_then(|t| t.remove(&fingerprint.canonical()))
            .map_or(0, |records| records.len() as u64);
        Ok(removed)
    }

    #[instrument(level = "debug", skip(self, records), fields(count = records.len()))]
    async fn append(&self, table: &str, records: Vec<RawRecord>) -> Result<(), PipelineError> {
        let mut state = self.state.write();
        let partitions = state.raw.entry(table.to_string()).or_default();
        for record in records {
            partitions
                .entry(record.fingerprint.canonical())
                .or_default()
                .push(record);
        }
        Ok(())
    }

    async fn cursor(
        &self,
        table: &str,
        fingerprint: &Fingerprint,
    ) -> Result<RecordStream<RawRecord>, PipelineError> {
        let records = self.raw_records(table, fingerprint);
        Ok(futures::stream::iter(records.into_iter().map(Ok)).boxed())
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    #[instrument(level = "debug", skip(self, rows), fields(fingerprint = %fingerprint, count = rows.len()))]
    async fn upsert(
        &self,
        table: &str,
        fingerprint: &Fingerprint,
        rows: Vec<EntityRow>,
    ) -> Result<(), PipelineError> {
        let mut state = self.state.write();
        let partition = state
            .entities
            .entry(table.to_string())
            .or_default()
            .entry(fingerprint.canonical())
            .or_default();
        for row in rows {
            partition.insert(row.key.clone(), row);
        }
        Ok(())
    }

    async fn cursor(
        &self,
        table: &str,
        fingerprint: &Fingerprint,
        filter: RowFilter,
    ) -> Result<RecordStream<EntityRow>, PipelineError> {
        let rows: Vec<EntityRow> = self
            .entity_rows(table, fingerprint)
            .into_iter()
            .filter(|row| filter.matches(row))
            .collect();
        Ok(futures::stream::iter(rows.into_iter().map(Ok)).boxed())
    }
}

#[async_trait]
impl DomainStore for MemoryStore {
    #[instrument(level = "debug", skip(self, records), fields(count = records.len()))]
    async fn upsert(&self, records: Vec<DomainRecord>) -> Result<(), PipelineError> {
        let mut state = self.state.write();
        for record in records {
            state
                .domain
                .entry(record.table().to_string())
                .or_default()
                .insert(record.key(), record);
        }
        Ok(())
    }
}

#[async_trait]
impl WatermarkStore for MemoryStore {
    async fn get(&self, key: &WatermarkKey) -> Result<Option<Watermark>, PipelineError> {
        Ok(self.state.read().watermarks.get(&watermark_slot(key)).cloned())
    }

    #[instrument(level = "debug", skip(self, watermark), fields(subtask = %watermark.key.subtask, cutoff = %watermark.cutoff))]
    async fn set(&self, watermark: Watermark) -> Result<(), PipelineError> {
        self.state
            .write()
            .watermarks
            .insert(watermark_slot(&watermark.key), watermark);
        Ok(())
    }
}
