use crate::AppState;
use crate::api::error::AppError;
use crate::models::FileEntry;
use crate::services::file_service::{Download, StagedFile};
use axum::{
    Json,
    body::Body,
    extract::{
        Multipart, Path, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::TryStreamExt;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use tokio_util::io::{ReaderStream, StreamReader};
use utoipa::ToSchema;

/// Multipart field carrying the uploaded documents
pub const UPLOAD_FIELD: &str = "files";

#[derive(ToSchema)]
pub struct UploadForm {
    /// One or more PDF documents
    #[schema(value_type = Vec<String>, format = Binary)]
    pub files: Vec<String>,
}

#[utoipa::path(
    get,
    path = "/api/files",
    responses(
        (status = 200, description = "Stored files, most recent first", body = [FileEntry])
    ),
    tag = "files"
)]
pub async fn list_files(State(state): State<AppState>) -> Json<Vec<FileEntry>> {
    Json(state.file_service.list_files().await)
}

#[utoipa::path(
    post,
    path = "/api/upload",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Files stored", body = [FileEntry]),
        (status = 400, description = "No file, or a file that is not a PDF", body = crate::models::ErrorResponse),
        (status = 413, description = "A file exceeds the size limit", body = crate::models::ErrorResponse)
    ),
    tag = "files"
)]
pub async fn upload_files(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<Vec<FileEntry>>), AppError> {
    let mut multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let mut staged: Vec<StagedFile> = Vec::new();

    let result: Result<(), AppError> = async {
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            // Plain text parts carry no document
            let Some(original_name) = field.file_name().map(str::to_string) else {
                continue;
            };

            let name = field.name().unwrap_or_default().to_string();
            if name != UPLOAD_FIELD {
                return Err(AppError::BadRequest(format!("Unexpected field: {}", name)));
            }

            let content_type = field.content_type().map(str::to_string);
            let reader = StreamReader::new(field.map_err(std::io::Error::other));

            let file = state
                .file_service
                .stage_upload(&original_name, content_type.as_deref(), reader)
                .await?;
            staged.push(file);
        }
        Ok(())
    }
    .await;

    if let Err(e) = result {
        tracing::warn!(
            "Upload failed: {}. Discarding {} stored file(s)...",
            e,
            staged.len()
        );
        state.file_service.discard_uploads(&staged).await;

        // Drain the rest of the body so the client sees the error instead of a reset
        while let Ok(Some(mut field)) = multipart.next_field().await {
            while let Ok(Some(_)) = field.chunk().await {}
        }
        return Err(e);
    }

    if staged.is_empty() {
        return Err(AppError::BadRequest("No files received.".to_string()));
    }

    let entries = state.file_service.commit_uploads(staged).await?;
    Ok((StatusCode::CREATED, Json(entries)))
}

#[utoipa::path(
    get,
    path = "/api/files/{id}",
    params(
        ("id" = String, Path, description = "File identifier")
    ),
    responses(
        (status = 200, description = "File content", content_type = "application/pdf"),
        (status = 404, description = "Unknown id or file missing on disk", body = crate::models::ErrorResponse)
    ),
    tag = "files"
)]
pub async fn download_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let Download { entry, file } = state.file_service.open_download(&id).await?;

    let content_type = content_type_for(&entry.stored_name);
    let content_disposition = content_disposition(&entry.original_name);
    let size = file.size;
    let body = Body::from_stream(ReaderStream::new(file.file));

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_LENGTH, size.to_string()),
            (header::CONTENT_DISPOSITION, content_disposition),
        ],
        body,
    )
        .into_response())
}

#[utoipa::path(
    delete,
    path = "/api/files/{id}",
    params(
        ("id" = String, Path, description = "File identifier")
    ),
    responses(
        (status = 204, description = "File deleted"),
        (status = 404, description = "Unknown id", body = crate::models::ErrorResponse),
        (status = 500, description = "The stored file could not be deleted", body = crate::models::ErrorResponse)
    ),
    tag = "files"
)]
pub async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.file_service.delete_file(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
    } else {
        AppError::BadRequest(e.body_text())
    }
}

fn content_type_for(stored_name: &str) -> mime::Mime {
    if stored_name.to_ascii_lowercase().ends_with(".pdf") {
        mime::APPLICATION_PDF
    } else {
        mime::APPLICATION_OCTET_STREAM
    }
}

/// `attachment` disposition with an ASCII fallback and an RFC 5987 UTF-8 name.
fn content_disposition(filename: &str) -> String {
    let ascii_filename = filename
        .chars()
        .filter(|c| c.is_ascii() && !c.is_control() && *c != '"' && *c != '\\' && *c != ';')
        .collect::<String>();
    let fallback_filename = if ascii_filename.trim().is_empty() {
        "file"
    } else {
        &ascii_filename
    };

    let encoded_filename = utf8_percent_encode(filename, NON_ALPHANUMERIC).to_string();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback_filename, encoded_filename
    )
}
