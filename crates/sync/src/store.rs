//! Snapshot persistence between ticks and across restarts.

use async_trait::async_trait;
use flowsmith_core::error::SyncError;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::catalog::CatalogSnapshot;

/// Durable home for the last applied catalog snapshot.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// The last saved snapshot, or `None` before the first sync.
    async fn load(&self) -> Result<Option<CatalogSnapshot>, SyncError>;

    async fn save(&self, snapshot: &CatalogSnapshot) -> Result<(), SyncError>;
}

/// JSON file store. Writes go to a sibling temp file and are renamed into
/// place, so a crash mid-write leaves the previous snapshot intact.
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn load(&self) -> Result<Option<CatalogSnapshot>, SyncError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SyncError::Snapshot(format!(
                    "Failed to read {}: {e}",
                    self.path.display()
                )));
            }
        };
        // An unreadable snapshot is treated as absent so the next save
        // replaces it with a full resync.
        match serde_json::from_str(&content) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring corrupt catalog snapshot");
                Ok(None)
            }
        }
    }

    async fn save(&self, snapshot: &CatalogSnapshot) -> Result<(), SyncError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                SyncError::Snapshot(format!("Failed to create snapshot directory: {e}"))
            })?;
        }

        let content = serde_json::to_string_pretty(snapshot)
            .map_err(|e| SyncError::Serialization(e.to_string()))?;

        let tmp = self.temp_path();
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| SyncError::Snapshot(format!("Failed to write snapshot: {e}")))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| SyncError::Snapshot(format!("Failed to replace snapshot: {e}")))?;

        debug!(path = %self.path.display(), entries = snapshot.len(), "Snapshot saved");
        Ok(())
    }
}

/// Process-local store for tests and one-shot runs.
#[derive(Default)]
pub struct InMemorySnapshotStore {
    snapshot: RwLock<Option<CatalogSnapshot>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn load(&self) -> Result<Option<CatalogSnapshot>, SyncError> {
        Ok(self.snapshot.read().await.clone())
    }

    async fn save(&self, snapshot: &CatalogSnapshot) -> Result<(), SyncError> {
        *self.snapshot.write().await = Some(snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogMap;
    use flowsmith_core::graph::CatalogEntry;

    fn snapshot() -> CatalogSnapshot {
        let catalog: CatalogMap = [CatalogEntry {
            id: "n8n-nodes-base.slack".into(),
            display_name: "Slack".into(),
            version: "2".into(),
        }]
        .into_iter()
        .map(|e| (e.id.clone(), e))
        .collect();
        CatalogSnapshot::new("abc123".into(), &catalog)
    }

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("snapshot.json"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("snapshot.json");

        FileSnapshotStore::new(&path).save(&snapshot()).await.unwrap();

        let reopened = FileSnapshotStore::new(&path);
        let loaded = reopened.load().await.unwrap().unwrap();
        assert_eq!(loaded, snapshot_with_time(loaded.synced_at));
        assert!(!reopened.temp_path().exists());
    }

    fn snapshot_with_time(at: chrono::DateTime<chrono::Utc>) -> CatalogSnapshot {
        CatalogSnapshot {
            synced_at: at,
            ..snapshot()
        }
    }

    #[tokio::test]
    async fn corrupt_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = FileSnapshotStore::new(&path);
        assert!(store.load().await.unwrap().is_none());

        store.save(&snapshot()).await.unwrap();
        assert_eq!(store.load().await.unwrap().unwrap().fingerprint, "abc123");
    }

    #[tokio::test]
    async fn in_memory_store_keeps_last_save() {
        let store = InMemorySnapshotStore::new();
        assert!(store.load().await.unwrap().is_none());
        store.save(&snapshot()).await.unwrap();
        assert_eq!(store.load().await.unwrap().unwrap().fingerprint, "abc123");
    }
}
