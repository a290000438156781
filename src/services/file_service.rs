use crate::api::error::AppError;
use crate::config::AppConfig;
use crate::models::FileEntry;
use crate::services::manifest::ManifestStore;
use crate::services::storage::{OpenedFile, StorageError, StorageService};
use crate::utils::validation::{stored_name, validate_mime_type};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::io::AsyncRead;

pub struct FileService {
    manifest: Arc<ManifestStore>,
    storage: Arc<dyn StorageService>,
    config: AppConfig,
}

/// A document written to storage but not yet recorded in the manifest.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub stored_name: String,
    pub original_name: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

impl StagedFile {
    fn into_entry(self) -> FileEntry {
        FileEntry::new(
            self.stored_name,
            self.original_name,
            self.size,
            self.uploaded_at,
        )
    }
}

pub struct Download {
    pub entry: FileEntry,
    pub file: OpenedFile,
}

impl FileService {
    pub fn new(
        manifest: Arc<ManifestStore>,
        storage: Arc<dyn StorageService>,
        config: AppConfig,
    ) -> Self {
        Self {
            manifest,
            storage,
            config,
        }
    }

    pub fn manifest(&self) -> &ManifestStore {
        &self.manifest
    }

    pub async fn list_files(&self) -> Vec<FileEntry> {
        self.manifest.list().await
    }

    /// Validates one uploaded part and streams it into the storage directory.
    pub async fn stage_upload<R>(
        &self,
        original_name: &str,
        content_type: Option<&str>,
        mut reader: R,
    ) -> Result<StagedFile, AppError>
    where
        R: AsyncRead + Unpin + Send,
    {
        validate_mime_type(content_type).map_err(|e| {
            tracing::warn!(
                "Rejected upload {} with content type {:?}",
                original_name,
                content_type
            );
            AppError::BadRequest(e.to_string())
        })?;

        let limit = self.config.max_file_size;
        let mut last_timestamp: Option<i64> = None;

        // Each retry takes a strictly later millisecond, so a taken name only
        // delays the upload until a free slot comes up.
        loop {
            let now = Utc::now().timestamp_millis();
            let timestamp = last_timestamp.map_or(now, |last| now.max(last + 1));
            last_timestamp = Some(timestamp);
            let name = stored_name(timestamp, original_name);

            match self.storage.write_stream(&name, &mut reader, limit).await {
                Ok(size) => {
                    tracing::info!("📄 Stored {} as {} ({} bytes)", original_name, name, size);
                    let uploaded_at = DateTime::from_timestamp_millis(timestamp).ok_or_else(|| {
                        AppError::Internal(format!("Timestamp {} out of range", timestamp))
                    })?;
                    return Ok(StagedFile {
                        stored_name: name,
                        original_name: original_name.to_string(),
                        size,
                        uploaded_at,
                    });
                }
                Err(StorageError::AlreadyExists(taken)) => {
                    tracing::debug!("Stored name {} is taken, retrying", taken);
                }
                Err(StorageError::TooLarge { limit }) => {
                    tracing::warn!("Rejected upload {}: larger than {} bytes", original_name, limit);
                    return Err(AppError::PayloadTooLarge(format!(
                        "File exceeds the maximum allowed size of {} MB.",
                        limit / 1024 / 1024
                    )));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Records every staged file in the manifest in one append. On failure
    /// the staged files are removed from storage.
    pub async fn commit_uploads(&self, staged: Vec<StagedFile>) -> Result<Vec<FileEntry>, AppError> {
        let entries: Vec<FileEntry> = staged.iter().cloned().map(StagedFile::into_entry).collect();

        if let Err(e) = self.manifest.append(entries.clone()).await {
            self.discard_uploads(&staged).await;
            return Err(e.into());
        }

        tracing::info!("✅ Recorded {} new file(s)", entries.len());
        Ok(entries)
    }

    /// Best-effort removal of files that will not be recorded.
    pub async fn discard_uploads(&self, staged: &[StagedFile]) {
        for file in staged {
            if let Err(e) = self.storage.delete_file(&file.stored_name).await {
                tracing::warn!("Failed to discard staged file {}: {}", file.stored_name, e);
            }
        }
    }

    /// Deletes the stored file, then its manifest entry. The manifest is left
    /// untouched when the file cannot be deleted.
    pub async fn delete_file(&self, id: &str) -> Result<FileEntry, AppError> {
        let mut manifest = self.manifest.lock().await;

        let stored_name = manifest
            .get(id)
            .map(|entry| entry.stored_name.clone())
            .ok_or_else(AppError::file_not_found)?;

        if let Err(e) = self.storage.delete_file(&stored_name).await {
            tracing::error!("Unable to delete {}: {}", stored_name, e);
            return Err(AppError::Internal(format!(
                "Unable to delete file {}: {}",
                stored_name, e
            )));
        }

        let removed = manifest.remove(id).await?;
        tracing::info!("🗑️  Deleted {} ({})", removed.id, removed.original_name);
        Ok(removed)
    }

    /// Resolves `id` to an open file. Unknown ids and entries whose file has
    /// vanished from disk are both reported as not found.
    pub async fn open_download(&self, id: &str) -> Result<Download, AppError> {
        let entry = self
            .manifest
            .get(id)
            .await
            .ok_or_else(AppError::file_not_found)?;

        let file = match self.storage.open_file(&entry.stored_name).await {
            Ok(file) => file,
            Err(StorageError::NotFound(_)) => {
                tracing::warn!("Manifest entry {} has no file on disk", entry.id);
                return Err(AppError::file_not_found());
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Download { entry, file })
    }

    /// Logs manifest entries whose stored file is missing and returns how
    /// many there are. A failing check is logged and counts as none.
    pub async fn report_missing_files(&self) -> usize {
        match self.find_missing().await {
            Ok(missing) => {
                if !missing.is_empty() {
                    tracing::warn!(
                        "⚠️  {} manifest entr{} without a stored file: {}",
                        missing.len(),
                        if missing.len() == 1 { "y" } else { "ies" },
                        missing
                            .iter()
                            .map(|e| e.id.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    );
                }
                missing.len()
            }
            Err(e) => {
                tracing::warn!("Skipping stored file check: {}", e);
                0
            }
        }
    }

    /// Manifest entries whose stored file is missing.
    pub async fn find_missing(&self) -> Result<Vec<FileEntry>, AppError> {
        let mut missing = Vec::new();
        for entry in self.manifest.list().await {
            if !self.storage.file_exists(&entry.stored_name).await? {
                missing.push(entry);
            }
        }
        Ok(missing)
    }
}
