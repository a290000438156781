//! Disk-backed manifest of uploaded documents.
//!
//! The whole entry list lives in memory behind a single async mutex and is
//! rewritten to a JSON file after every mutation. Writes go to a sibling
//! `.tmp` file that is fsynced and renamed over the manifest, so a crash
//! mid-write leaves the previous manifest intact.

use crate::models::FileEntry;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("No manifest entry for id {0}")]
    NotFound(String),

    #[error("Manifest already contains id {0}")]
    DuplicateId(String),

    #[error("Manifest I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Manifest serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub struct ManifestStore {
    path: PathBuf,
    entries: Mutex<Vec<FileEntry>>,
}

impl ManifestStore {
    /// Loads the manifest at `path`. A missing, unreadable or corrupt file
    /// yields an empty manifest.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = load_entries(&path).await;
        info!(
            "📒 Manifest loaded from {} ({} entries)",
            path.display(),
            entries.len()
        );
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    /// All entries, most recently uploaded first.
    pub async fn list(&self) -> Vec<FileEntry> {
        let mut entries = self.entries.lock().await.clone();
        sort_newest_first(&mut entries);
        entries
    }

    pub async fn get(&self, id: &str) -> Option<FileEntry> {
        self.entries
            .lock()
            .await
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    pub async fn append(&self, entries: Vec<FileEntry>) -> Result<(), ManifestError> {
        self.lock().await.append(entries).await
    }

    pub async fn remove(&self, id: &str) -> Result<FileEntry, ManifestError> {
        self.lock().await.remove(id).await
    }

    /// Exclusive access for a check / side-effect / mutate sequence.
    pub async fn lock(&self) -> ManifestGuard<'_> {
        ManifestGuard {
            path: &self.path,
            entries: self.entries.lock().await,
        }
    }
}

pub struct ManifestGuard<'a> {
    path: &'a Path,
    entries: MutexGuard<'a, Vec<FileEntry>>,
}

impl ManifestGuard<'_> {
    pub fn get(&self, id: &str) -> Option<&FileEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Appends every entry and persists, or appends nothing.
    pub async fn append(&mut self, entries: Vec<FileEntry>) -> Result<(), ManifestError> {
        let mut seen: HashSet<&str> = self.entries.iter().map(|e| e.id.as_str()).collect();
        for entry in &entries {
            if !seen.insert(entry.id.as_str()) {
                return Err(ManifestError::DuplicateId(entry.id.clone()));
            }
        }

        let previous_len = self.entries.len();
        self.entries.extend(entries);

        if let Err(e) = self.persist().await {
            self.entries.truncate(previous_len);
            return Err(e);
        }
        Ok(())
    }

    /// Drops the entry for `id` and persists.
    pub async fn remove(&mut self, id: &str) -> Result<FileEntry, ManifestError> {
        let index = self
            .entries
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| ManifestError::NotFound(id.to_string()))?;

        let removed = self.entries.remove(index);

        if let Err(e) = self.persist().await {
            self.entries.insert(index, removed);
            return Err(e);
        }
        Ok(removed)
    }

    /// Writes the full entry list, replacing the previous manifest atomically.
    pub async fn persist(&self) -> Result<(), ManifestError> {
        let body = serde_json::to_vec_pretty(&*self.entries)?;
        let tmp = temp_path(self.path);

        let write = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(&body).await?;
            file.sync_all().await?;
            tokio::fs::rename(&tmp, self.path).await
        };

        if let Err(e) = write.await {
            tracing::error!("Failed to persist manifest {}: {}", self.path.display(), e);
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

pub fn sort_newest_first(entries: &mut [FileEntry]) {
    entries.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
}

async fn load_entries(path: &Path) -> Vec<FileEntry> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!("Unable to read manifest {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    let entries: Vec<FileEntry> = match serde_json::from_slice(&raw) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(
                "Manifest {} is corrupt, starting empty: {}",
                path.display(),
                e
            );
            return Vec::new();
        }
    };

    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|entry| {
            let fresh = seen.insert(entry.id.clone());
            if !fresh {
                warn!("Dropping duplicate manifest entry {}", entry.id);
            }
            fresh
        })
        .collect()
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn entry(id: &str, minutes: i64) -> FileEntry {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        FileEntry::new(
            id.to_string(),
            format!("{}.pdf", id),
            10,
            base + Duration::minutes(minutes),
        )
    }

    #[tokio::test]
    async fn test_missing_manifest_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManifestStore::open(dir.path().join("_manifest.json")).await;
        assert!(store.is_empty().await);
        assert!(!dir.path().join("_manifest.json").exists());
    }

    #[tokio::test]
    async fn test_corrupt_manifest_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("_manifest.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let store = ManifestStore::open(&path).await;
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_append_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("_manifest.json");

        let store = ManifestStore::open(&path).await;
        store
            .append(vec![entry("a", 0), entry("b", 5)])
            .await
            .unwrap();
        assert!(!temp_path(&path).exists());

        let first = std::fs::read(&path).unwrap();
        let reloaded = ManifestStore::open(&path).await;
        assert_eq!(reloaded.list().await, store.list().await);

        reloaded.lock().await.persist().await.unwrap();
        let second = std::fs::read(&path).unwrap();
        let a: serde_json::Value = serde_json::from_slice(&first).unwrap();
        let b: serde_json::Value = serde_json::from_slice(&second).unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManifestStore::open(dir.path().join("m.json")).await;
        store
            .append(vec![entry("old", 0), entry("new", 30), entry("mid", 10)])
            .await
            .unwrap();

        let ids: Vec<String> = store.list().await.into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[tokio::test]
    async fn test_duplicate_ids_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManifestStore::open(dir.path().join("m.json")).await;
        store.append(vec![entry("a", 0)]).await.unwrap();

        let err = store
            .append(vec![entry("b", 1), entry("a", 2)])
            .await
            .unwrap_err();
        assert!(matches!(err, ManifestError::DuplicateId(id) if id == "a"));
        assert_eq!(store.len().await, 1);

        let err = store
            .append(vec![entry("c", 1), entry("c", 2)])
            .await
            .unwrap_err();
        assert!(matches!(err, ManifestError::DuplicateId(_)));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_remove() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.json");
        let store = ManifestStore::open(&path).await;
        store
            .append(vec![entry("a", 0), entry("b", 1)])
            .await
            .unwrap();

        let removed = store.remove("a").await.unwrap();
        assert_eq!(removed.id, "a");
        assert!(matches!(
            store.remove("a").await,
            Err(ManifestError::NotFound(_))
        ));

        let reloaded = ManifestStore::open(&path).await;
        let ids: Vec<String> = reloaded.list().await.into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[tokio::test]
    async fn test_failed_persist_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManifestStore::open(dir.path().join("missing").join("m.json")).await;

        assert!(matches!(
            store.append(vec![entry("a", 0)]).await,
            Err(ManifestError::Io(_))
        ));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_duplicates_dropped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.json");
        let raw = serde_json::to_vec(&vec![entry("a", 0), entry("a", 5), entry("b", 1)]).unwrap();
        std::fs::write(&path, raw).unwrap();

        let store = ManifestStore::open(&path).await;
        assert_eq!(store.len().await, 2);
        assert_eq!(
            store.get("a").await.unwrap().uploaded_at,
            entry("a", 0).uploaded_at
        );
    }
}
