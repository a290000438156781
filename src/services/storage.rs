use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Stored file not found: {0}")]
    NotFound(String),

    #[error("Stored file already exists: {0}")]
    AlreadyExists(String),

    #[error("File exceeds the maximum allowed size of {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct OpenedFile {
    pub file: File,
    pub size: u64,
}

#[async_trait]
pub trait StorageService: Send + Sync {
    /// Streams `reader` into a new file called `name`. Fails with
    /// `AlreadyExists` before reading anything if the name is taken, and
    /// with `TooLarge` (leaving nothing behind) once more than `limit`
    /// bytes arrive.
    async fn write_stream(
        &self,
        name: &str,
        reader: &mut (dyn AsyncRead + Unpin + Send),
        limit: u64,
    ) -> Result<u64, StorageError>;
    async fn delete_file(&self, name: &str) -> Result<(), StorageError>;
    async fn file_exists(&self, name: &str) -> Result<bool, StorageError>;
    async fn open_file(&self, name: &str) -> Result<OpenedFile, StorageError>;
}

/// Stores documents as plain files in one directory.
pub struct LocalStorageService {
    root: PathBuf,
}

impl LocalStorageService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

#[async_trait]
impl StorageService for LocalStorageService {
    async fn write_stream(
        &self,
        name: &str,
        reader: &mut (dyn AsyncRead + Unpin + Send),
        limit: u64,
    ) -> Result<u64, StorageError> {
        let path = self.path_for(name);
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::AlreadyExists(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        // One byte past the limit is enough to tell an oversize upload apart.
        let mut limited = reader.take(limit.saturating_add(1));
        let copied = tokio::io::copy(&mut limited, &mut file).await;

        let result = match copied {
            Ok(n) if n > limit => Err(StorageError::TooLarge { limit }),
            Ok(n) => file.flush().await.map(|_| n).map_err(StorageError::from),
            Err(e) if is_body_limit_error(&e) => Err(StorageError::TooLarge { limit }),
            Err(e) => Err(e.into()),
        };

        if result.is_err() {
            drop(file);
            if let Err(e) = tokio::fs::remove_file(&path).await {
                tracing::warn!("Failed to clean up partial file {}: {}", path.display(), e);
            }
        }
        result
    }

    async fn delete_file(&self, name: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.path_for(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn file_exists(&self, name: &str) -> Result<bool, StorageError> {
        match tokio::fs::metadata(self.path_for(name)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn open_file(&self, name: &str) -> Result<OpenedFile, StorageError> {
        let file = match File::open(self.path_for(name)).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let meta = file.metadata().await?;
        if !meta.is_file() {
            return Err(StorageError::NotFound(name.to_string()));
        }

        Ok(OpenedFile {
            file,
            size: meta.len(),
        })
    }
}

/// axum reports an exceeded request body limit as a stream error.
fn is_body_limit_error(e: &std::io::Error) -> bool {
    e.to_string().contains("length limit exceeded")
}
