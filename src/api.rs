//! Inbound HTTP API
//!
//! A liveness endpoint plus an admin pair to read and replace the stored
//! system prompt. The admin endpoints are gated by a shared secret code in
//! the path; rejected requests get a JSON error payload, never a panic.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

use crate::config::Settings;
use crate::prompts::PromptStore;

/// Shared state of the HTTP API
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub prompts: PromptStore,
}

/// Build the API router
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/prompt/{code}", get(read_prompt).put(replace_prompt))
        .with_state(state)
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn check_code(state: &AppState, code: &str) -> Option<Response> {
    if code == state.settings.security_code {
        None
    } else {
        Some(error_response(
            StatusCode::FORBIDDEN,
            "Ошибка! Неверный код доступа",
        ))
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Returns the active system prompt
async fn read_prompt(State(state): State<AppState>, Path(code): Path<String>) -> Response {
    if let Some(denied) = check_code(&state, &code) {
        return denied;
    }
    match state.prompts.read().await {
        Ok(text) => text.into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to read prompt");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

fn is_text_filename(name: &str) -> bool {
    name.ends_with(".md") || name.ends_with(".txt")
}

/// Replaces the stored prompt with an uploaded `.md`/`.txt` file
async fn replace_prompt(
    State(state): State<AppState>,
    Path(code): Path<String>,
    mut multipart: Multipart,
) -> Response {
    if let Some(denied) = check_code(&state, &code) {
        return denied;
    }

    let field = loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.file_name().is_some() => break field,
            Ok(Some(_)) => continue,
            Ok(None) => {
                return error_response(StatusCode::BAD_REQUEST, "Ошибка! Файл не передан");
            }
            Err(e) => {
                return error_response(StatusCode::BAD_REQUEST, &e.to_string());
            }
        }
    };

    let filename = field.file_name().unwrap_or_default().to_string();
    if !is_text_filename(&filename) {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Ошибка! Файл должен быть текстовым (txt, md, и т.д.)",
        );
    }

    let bytes = match field.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };

    let Ok(content) = String::from_utf8(bytes.to_vec()) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Ошибка декодирования файла. Убедитесь, что файл в кодировке UTF-8",
        );
    };

    match state.prompts.replace(&content).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "Файл успешно загружен!" })),
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to replace prompt");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_filename_check() {
        assert!(is_text_filename("prompt.md"));
        assert!(is_text_filename("prompt.txt"));
        assert!(!is_text_filename("prompt.pdf"));
        assert!(!is_text_filename("prompt"));
    }
}
