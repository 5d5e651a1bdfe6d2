//! Completion API client
//!
//! A thin provider seam over an OpenAI-compatible chat-completion API.
//! The orchestrator only sees the [`CompletionProvider`] trait so tests can
//! substitute a mock.

use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::{config::OpenAIConfig, Client};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during completion calls
#[derive(Debug, Error)]
pub enum LlmError {
    /// Error returned by the provider's API
    #[error("API error: {0}")]
    ApiError(String),
    /// Error during network communication
    #[error("Network error: {0}")]
    NetworkError(String),
    /// Missing provider configuration or API key
    #[error("Missing client/API key: {0}")]
    MissingConfig(String),
    /// Any other unexpected error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single turn of an assembled conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Interface to the completion API
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate a single reply for the given system prompt and ordered turns
    async fn complete(
        &self,
        system_prompt: &str,
        turns: &[Turn],
        model_id: &str,
    ) -> Result<String, LlmError>;
}

/// Completion provider backed by an OpenAI-compatible endpoint
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
}

impl OpenAiProvider {
    /// Create a provider, optionally routing outbound calls through a proxy
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Unknown` if the proxy URL is invalid.
    pub fn new(api_key: String, proxy_url: Option<&str>) -> Result<Self, LlmError> {
        let config = OpenAIConfig::new().with_api_key(api_key);
        let client = match proxy_url {
            Some(url) => {
                let proxy =
                    reqwest::Proxy::all(url).map_err(|e| LlmError::Unknown(e.to_string()))?;
                let http_client = reqwest::Client::builder()
                    .proxy(proxy)
                    .build()
                    .map_err(|e| LlmError::Unknown(e.to_string()))?;
                Client::with_config(config).with_http_client(http_client)
            }
            None => Client::with_config(config),
        };
        Ok(Self { client })
    }

    fn build_messages(
        system_prompt: &str,
        turns: &[Turn],
    ) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
        let mut messages = vec![ChatCompletionRequestSystemMessageArgs::default()
            .content(system_prompt)
            .build()
            .map_err(|e| LlmError::Unknown(e.to_string()))?
            .into()];

        for turn in turns {
            let m = match turn.role {
                Role::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(turn.content.clone())
                    .build()
                    .map_err(|e| LlmError::Unknown(e.to_string()))?
                    .into(),
                Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(turn.content.clone())
                    .build()
                    .map_err(|e| LlmError::Unknown(e.to_string()))?
                    .into(),
            };
            messages.push(m);
        }

        Ok(messages)
    }
}

#[async_trait::async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn complete(
        &self,
        system_prompt: &str,
        turns: &[Turn],
        model_id: &str,
    ) -> Result<String, LlmError> {
        let messages = Self::build_messages(system_prompt, turns)?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(model_id)
            .messages(messages)
            .build()
            .map_err(|e| LlmError::Unknown(e.to_string()))?;

        debug!(model = model_id, turns = turns.len(), "Sending completion request");

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| LlmError::ApiError(e.to_string()))?;

        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| LlmError::ApiError("Empty response".to_string()))
    }
}
