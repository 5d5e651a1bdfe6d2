//! Avito messenger API client
//!
//! Wraps the remote REST API: client-credentials authentication, chat and
//! message retrieval, webhook management and message sending.

pub mod client;
pub mod models;

use async_trait::async_trait;
use thiserror::Error;

pub use client::AvitoClient;

/// Errors that can occur when talking to the Avito API
#[derive(Debug, Error)]
pub enum AvitoError {
    /// Token exchange rejected or no token available
    #[error("Auth error: {0}")]
    Auth(String),
    /// Non-2xx response from the API
    #[error("API error: {0}")]
    Api(String),
    /// Error during network communication
    #[error("Network error: {0}")]
    Network(String),
    /// Response body does not match the expected shape
    #[error("JSON error: {0}")]
    Json(String),
}

/// The subset of the messenger API consumed by the auto-reply workflow
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessengerApi: Send + Sync {
    /// List chats owned by the current account, optionally filtered
    async fn get_chats(
        &self,
        filter: Option<models::ChatFilter>,
    ) -> Result<models::ChatsResponse, AvitoError>;

    /// List all messages of a chat, most recent first
    async fn get_chat_messages(
        &self,
        chat_id: &str,
    ) -> Result<models::MessagesResponse, AvitoError>;

    /// Send a text message; `automated` appends the auto-reply marker
    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        automated: bool,
    ) -> Result<models::Message, AvitoError>;
}
