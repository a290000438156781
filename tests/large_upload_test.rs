use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use mission_vault::config::AppConfig;
use mission_vault::{AppState, create_app};
use serde_json::Value;
use tower::ServiceExt;

const BOUNDARY: &str = "----large-upload-boundary";

fn upload_request(filename: &str, content: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\n\
        Content-Disposition: form-data; name=\"files\"; filename=\"{filename}\"\r\n\
        Content-Type: application/pdf\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_default_size_limit_boundary() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig::with_storage_dir(dir.path());
    let limit = config.max_file_size as usize;
    assert_eq!(limit, 30 * 1024 * 1024);

    let app = create_app(AppState::from_config(config).await.unwrap());

    // Exactly at the limit is accepted
    let mut content = vec![b'0'; limit];
    content[..8].copy_from_slice(b"%PDF-1.7");
    let response = app
        .clone()
        .oneshot(upload_request("at-limit.pdf", &content))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json[0]["size"], limit as u64);

    // One byte more is rejected and leaves nothing behind
    content.push(b'0');
    let response = app
        .clone()
        .oneshot(upload_request("over-limit.pdf", &content))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let stored: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .filter(|n| n.contains("limit"))
        .collect();
    assert_eq!(stored.len(), 1);
    assert!(stored[0].ends_with("__at-limit.pdf"));
}
