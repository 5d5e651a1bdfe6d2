//! Integration tests for the inbound HTTP API.

use avito_agent::api::{router, AppState};
use avito_agent::config::{Settings, PROMPT_FILE};
use avito_agent::prompts::PromptStore;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

const CODE: &str = "s3cret";
const BOUNDARY: &str = "test-boundary";

fn test_settings() -> Settings {
    Settings {
        avito_client_id: "id".to_string(),
        avito_client_secret: "secret".to_string(),
        openai_api_key: None,
        security_code: CODE.to_string(),
        proxy_url: None,
        avito_base_url: "https://api.avito.ru".to_string(),
        completion_model: "gpt-4o-mini".to_string(),
        prompt_dir: "data".to_string(),
        cache_ttl_secs: 3600,
        autoreply_interval_secs: None,
        autoreply_chat_types_str: None,
        bind_addr: "127.0.0.1:0".to_string(),
    }
}

fn test_app(initial_prompt: &str) -> (TempDir, Router) {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join(PROMPT_FILE), initial_prompt).expect("write prompt");
    let state = AppState {
        settings: Arc::new(test_settings()),
        prompts: PromptStore::new(dir.path()).expect("store"),
    };
    (dir, router(state))
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}

fn multipart_upload(filename: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; \
             filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn put_prompt(code: &str, filename: &str, content: &[u8]) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(format!("/api/prompt/{code}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_upload(filename, content)))
        .expect("request")
}

fn get_prompt(code: &str) -> Request<Body> {
    Request::builder()
        .uri(format!("/api/prompt/{code}"))
        .body(Body::empty())
        .expect("request")
}

#[tokio::test]
async fn test_health() {
    let (_dir, app) = test_app("prompt");
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("ok"));
}

#[tokio::test]
async fn test_read_prompt_requires_code() {
    let (_dir, app) = test_app("prompt text");
    let response = app
        .oneshot(get_prompt("wrong-code"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(body_string(response).await.contains("error"));
}

#[tokio::test]
async fn test_read_prompt_returns_text() {
    let (_dir, app) = test_app("Ты менеджер по продажам");
    let response = app.oneshot(get_prompt(CODE)).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "Ты менеджер по продажам");
}

#[tokio::test]
async fn test_replace_prompt_roundtrip() {
    let (_dir, app) = test_app("old prompt");

    let response = app
        .clone()
        .oneshot(put_prompt(CODE, "prompt.md", "new prompt".as_bytes()))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get_prompt(CODE)).await.expect("response");
    assert_eq!(body_string(response).await, "new prompt");
}

#[tokio::test]
async fn test_replace_prompt_requires_code() {
    let (_dir, app) = test_app("old");
    let response = app
        .oneshot(put_prompt("nope", "prompt.md", b"new"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_replace_rejects_wrong_extension() {
    let (_dir, app) = test_app("old");
    let response = app
        .oneshot(put_prompt(CODE, "prompt.pdf", b"binary"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_string(response).await.contains("error"));
}

#[tokio::test]
async fn test_replace_rejects_non_utf8() {
    let (_dir, app) = test_app("old");
    let response = app
        .clone()
        .oneshot(put_prompt(CODE, "prompt.txt", &[0xFF, 0xFE, 0xFD]))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // The stored prompt is untouched after a rejected upload
    let response = app.oneshot(get_prompt(CODE)).await.expect("response");
    assert_eq!(body_string(response).await, "old");
}
