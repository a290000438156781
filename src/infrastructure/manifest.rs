use crate::config::AppConfig;
use crate::services::manifest::ManifestStore;
use std::sync::Arc;

/// Loads the manifest once for the lifetime of the process.
pub async fn setup_manifest(config: &AppConfig) -> Arc<ManifestStore> {
    Arc::new(ManifestStore::open(config.manifest_path()).await)
}
