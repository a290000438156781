use std::env;
use std::path::PathBuf;

/// Runtime configuration for the vault
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory holding uploaded documents and the manifest (default: "uploads")
    pub storage_dir: PathBuf,

    /// Manifest file name inside `storage_dir` (default: "_manifest.json")
    pub manifest_file: String,

    /// Maximum size of a single uploaded file in bytes (default: 30 MB)
    pub max_file_size: u64,

    /// Maximum size of a whole request body in bytes (default: 256 MB)
    pub max_request_size: usize,

    /// Directory served for non-API paths, if any
    pub static_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("uploads"),
            manifest_file: "_manifest.json".to_string(),
            max_file_size: 30 * 1024 * 1024,     // 30 MB
            max_request_size: 256 * 1024 * 1024, // 256 MB
            static_dir: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();

        Self {
            storage_dir: lookup("STORAGE_DIR")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(default.storage_dir),

            manifest_file: lookup("MANIFEST_FILE")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(default.manifest_file),

            max_file_size: lookup("MAX_FILE_SIZE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            max_request_size: lookup("MAX_REQUEST_SIZE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_request_size),

            static_dir: lookup("STATIC_DIR")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    /// Config rooted at the given storage directory, everything else default
    pub fn with_storage_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: dir.into(),
            ..Self::default()
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.storage_dir.join(&self.manifest_file)
    }
}
