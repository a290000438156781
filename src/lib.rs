pub mod api;
pub mod config;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::AppConfig;
use crate::infrastructure::{manifest::setup_manifest, storage::setup_storage};
use crate::services::file_service::FileService;
use crate::services::storage::StorageService;
use axum::{
    Router,
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::files::list_files,
        api::handlers::files::upload_files,
        api::handlers::files::download_file,
        api::handlers::files::delete_file,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            models::FileEntry,
            models::ErrorResponse,
            api::handlers::files::UploadForm,
            api::handlers::health::HealthResponse,
        )
    ),
    tags(
        (name = "files", description = "PDF document storage"),
        (name = "system", description = "Service status")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub file_service: Arc<FileService>,
    pub config: AppConfig,
}

impl AppState {
    /// Prepares the storage directory and loads the manifest.
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let storage: Arc<dyn StorageService> = setup_storage(&config).await?;
        let manifest = setup_manifest(&config).await;
        let file_service = Arc::new(FileService::new(manifest, storage, config.clone()));

        Ok(Self {
            file_service,
            config,
        })
    }
}

pub fn create_app(state: AppState) -> Router {
    let mut router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route("/api/files", get(api::handlers::files::list_files))
        .route("/api/upload", post(api::handlers::files::upload_files))
        .route(
            "/api/files/:id",
            get(api::handlers::files::download_file).delete(api::handlers::files::delete_file),
        );

    if let Some(dir) = &state.config.static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any),
        )
        .layer(axum::extract::DefaultBodyLimit::max(
            state.config.max_request_size,
        ))
        .with_state(state)
}
