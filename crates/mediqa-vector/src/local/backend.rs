//! Local backend implementation.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use super::LocalConfig;
use crate::TRACING_TARGET;
use crate::error::{VectorError, VectorResult};
use crate::similarity::cosine_similarity;
use crate::store::{ScoredRecord, VectorRecord, VectorStoreBackend};

/// Embedded backend keeping indexes in memory.
///
/// When opened with a directory, each index lives in a JSON snapshot
/// `<dir>/<index>.json` and an append-only change log `<dir>/<index>.log`.
/// Writes only append to the log; the log is folded into the snapshot when
/// the index is next opened.
pub struct LocalBackend {
    root: Option<PathBuf>,
    indexes: RwLock<HashMap<String, LocalIndex>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LocalIndex {
    dimensions: usize,
    /// Records in insertion order.
    records: Vec<VectorRecord>,
    #[serde(skip)]
    positions: HashMap<String, usize>,
}

/// One line of the change log.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum LogEntry {
    Upsert { record: VectorRecord },
    Delete { ids: Vec<String> },
}

impl LocalIndex {
    fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            ..Default::default()
        }
    }

    fn reindex_positions(&mut self) {
        self.positions = self
            .records
            .iter()
            .enumerate()
            .map(|(pos, record)| (record.id.clone(), pos))
            .collect();
    }

    fn apply(&mut self, entry: LogEntry) {
        match entry {
            LogEntry::Upsert { record } => match self.positions.get(&record.id) {
                Some(&pos) => self.records[pos] = record,
                None => {
                    self.positions.insert(record.id.clone(), self.records.len());
                    self.records.push(record);
                }
            },
            LogEntry::Delete { ids } => {
                let ids: HashSet<String> = ids.into_iter().collect();
                self.records.retain(|record| !ids.contains(&record.id));
                self.reindex_positions();
            }
        }
    }

    fn matching_ids(&self, key: &str, value: &str) -> Vec<String> {
        self.records
            .iter()
            .filter(|record| record.metadata.get(key).and_then(|v| v.as_str()) == Some(value))
            .map(|record| record.id.clone())
            .collect()
    }
}

impl LocalBackend {
    /// Creates a backend that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self {
            root: None,
            indexes: RwLock::new(HashMap::new()),
        }
    }

    /// Opens a backend persisted under the configured directory.
    pub async fn open(config: &LocalConfig) -> VectorResult<Self> {
        tokio::fs::create_dir_all(&config.path)
            .await
            .map_err(|e| {
                VectorError::unavailable(format!(
                    "cannot create storage directory {}: {e}",
                    config.path.display()
                ))
            })?;

        tracing::debug!(
            target: TRACING_TARGET,
            path = %config.path.display(),
            "Opened local vector storage"
        );

        Ok(Self {
            root: Some(config.path.clone()),
            indexes: RwLock::new(HashMap::new()),
        })
    }

    fn snapshot_path(root: &Path, name: &str) -> PathBuf {
        root.join(format!("{name}.json"))
    }

    fn log_path(root: &Path, name: &str) -> PathBuf {
        root.join(format!("{name}.log"))
    }

    async fn load(&self, name: &str) -> VectorResult<Option<LocalIndex>> {
        let Some(root) = &self.root else {
            return Ok(None);
        };

        let path = Self::snapshot_path(root, name);
        let Some(bytes) = read_if_exists(&path).await? else {
            return Ok(None);
        };

        let mut index: LocalIndex = serde_json::from_slice(&bytes)?;
        index.reindex_positions();

        let log = Self::log_path(root, name);
        if let Some(bytes) = read_if_exists(&log).await? {
            let replayed = replay(&mut index, &bytes);
            self.persist(name, &index).await?;
            tracing::info!(
                target: TRACING_TARGET,
                index = %name,
                entries = replayed,
                "Compacted change log"
            );
        }

        Ok(Some(index))
    }

    /// Rewrites the snapshot and drops the change log.
    async fn persist(&self, name: &str, index: &LocalIndex) -> VectorResult<()> {
        let Some(root) = &self.root else {
            return Ok(());
        };

        let path = Self::snapshot_path(root, name);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec(index)?;

        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| VectorError::unavailable(format!("cannot write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| {
                VectorError::unavailable(format!("cannot replace {}: {e}", path.display()))
            })?;

        let log = Self::log_path(root, name);
        match tokio::fs::remove_file(&log).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(VectorError::unavailable(format!(
                "cannot remove {}: {e}",
                log.display()
            ))),
        }
    }

    /// Appends entries to the change log of `name`.
    ///
    /// A failed append is truncated back so the log never keeps a torn line.
    async fn append(&self, name: &str, entries: &[LogEntry]) -> VectorResult<()> {
        let Some(root) = &self.root else {
            return Ok(());
        };

        let mut bytes = Vec::new();
        for entry in entries {
            serde_json::to_writer(&mut bytes, entry)?;
            bytes.push(b'\n');
        }

        let path = Self::log_path(root, name);
        let unavailable = |e: std::io::Error| {
            VectorError::unavailable(format!("cannot append to {}: {e}", path.display()))
        };

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(unavailable)?;
        let committed = file.metadata().await.map_err(unavailable)?.len();

        let written = match file.write_all(&bytes).await {
            Ok(()) => file.flush().await,
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            let _ = file.set_len(committed).await;
            return Err(unavailable(e));
        }
        Ok(())
    }
}

async fn read_if_exists(path: &Path) -> VectorResult<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(VectorError::unavailable(format!(
            "cannot read {}: {e}",
            path.display()
        ))),
    }
}

/// Applies log lines in order and returns how many were applied.
///
/// Replay stops at the first unreadable line.
fn replay(index: &mut LocalIndex, log: &[u8]) -> usize {
    let mut applied = 0;
    for line in log.split(|b| *b == b'\n').filter(|line| !line.is_empty()) {
        match serde_json::from_slice::<LogEntry>(line) {
            Ok(entry) => {
                index.apply(entry);
                applied += 1;
            }
            Err(error) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    %error,
                    applied,
                    "Unreadable change log entry, ignoring the rest of the log"
                );
                break;
            }
        }
    }
    applied
}

/// Index names become file names, so only a safe character set is accepted.
fn validate_index_name(name: &str) -> VectorResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if valid {
        Ok(())
    } else {
        Err(VectorError::invalid_config(format!(
            "index name {name:?} may only contain ASCII letters, digits, '_' and '-'"
        )))
    }
}

#[async_trait]
impl VectorStoreBackend for LocalBackend {
    fn backend_name(&self) -> &'static str {
        "local"
    }

    async fn create_or_get_index(&self, name: &str, dimensions: usize) -> VectorResult<()> {
        validate_index_name(name)?;

        let mut indexes = self.indexes.write().await;
        if let Some(existing) = indexes.get(name) {
            if existing.dimensions != dimensions {
                return Err(VectorError::dimension_mismatch(
                    existing.dimensions,
                    dimensions,
                ));
            }
            return Ok(());
        }

        let index = match self.load(name).await? {
            Some(loaded) if loaded.dimensions != dimensions => {
                return Err(VectorError::dimension_mismatch(
                    loaded.dimensions,
                    dimensions,
                ));
            }
            Some(loaded) => {
                tracing::info!(
                    target: TRACING_TARGET,
                    index = %name,
                    records = loaded.records.len(),
                    "Loaded existing index"
                );
                loaded
            }
            None => {
                let created = LocalIndex::new(dimensions);
                self.persist(name, &created).await?;
                tracing::info!(
                    target: TRACING_TARGET,
                    index = %name,
                    dimensions = %dimensions,
                    "Created index"
                );
                created
            }
        };

        indexes.insert(name.to_owned(), index);
        Ok(())
    }

    async fn upsert(&self, index: &str, records: Vec<VectorRecord>) -> VectorResult<()> {
        let mut indexes = self.indexes.write().await;
        let entry = indexes
            .get_mut(index)
            .ok_or_else(|| VectorError::index_not_found(index))?;

        if let Some(bad) = records.iter().find(|r| r.vector.len() != entry.dimensions) {
            return Err(VectorError::dimension_mismatch(
                entry.dimensions,
                bad.vector.len(),
            ));
        }

        let changes: Vec<LogEntry> = records
            .into_iter()
            .map(|record| LogEntry::Upsert { record })
            .collect();

        // Memory only sees what reached the log.
        self.append(index, &changes).await?;
        for change in changes {
            entry.apply(change);
        }
        Ok(())
    }

    async fn delete_by_field(&self, index: &str, key: &str, value: &str) -> VectorResult<()> {
        let mut indexes = self.indexes.write().await;
        let entry = indexes
            .get_mut(index)
            .ok_or_else(|| VectorError::index_not_found(index))?;

        let ids = entry.matching_ids(key, value);
        if ids.is_empty() {
            return Ok(());
        }

        let change = [LogEntry::Delete { ids }];
        self.append(index, &change).await?;
        let [change] = change;
        entry.apply(change);
        Ok(())
    }

    async fn query(
        &self,
        index: &str,
        vector: Vec<f32>,
        top_k: usize,
    ) -> VectorResult<Vec<ScoredRecord>> {
        let indexes = self.indexes.read().await;
        let entry = indexes
            .get(index)
            .ok_or_else(|| VectorError::index_not_found(index))?;

        let mut scored: Vec<(f32, &VectorRecord)> = entry
            .records
            .iter()
            .map(|record| (cosine_similarity(&vector, &record.vector), record))
            .collect();

        // `sort_by` is stable: equal scores keep insertion order.
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(score, record)| ScoredRecord {
                id: record.id.clone(),
                score,
                metadata: record.metadata.clone(),
            })
            .collect())
    }

    async fn existing_ids(&self, index: &str, ids: &[String]) -> VectorResult<HashSet<String>> {
        let indexes = self.indexes.read().await;
        let entry = indexes
            .get(index)
            .ok_or_else(|| VectorError::index_not_found(index))?;

        Ok(ids
            .iter()
            .filter(|id| entry.positions.contains_key(*id))
            .cloned()
            .collect())
    }

    async fn count(&self, index: &str) -> VectorResult<usize> {
        let indexes = self.indexes.read().await;
        indexes
            .get(index)
            .map(|entry| entry.records.len())
            .ok_or_else(|| VectorError::index_not_found(index))
    }
}
