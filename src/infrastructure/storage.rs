use crate::config::AppConfig;
use crate::services::storage::LocalStorageService;
use anyhow::Context;
use std::sync::Arc;
use tracing::info;

pub async fn setup_storage(config: &AppConfig) -> anyhow::Result<Arc<LocalStorageService>> {
    let dir = &config.storage_dir;

    // Ensure storage directory exists
    if tokio::fs::metadata(dir).await.is_ok() {
        info!("✅ Storage directory '{}' is ready", dir.display());
    } else {
        info!("📁 Storage directory '{}' not found, creating...", dir.display());
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create storage directory {}", dir.display()))?;
    }

    Ok(Arc::new(LocalStorageService::new(dir.clone())))
}
