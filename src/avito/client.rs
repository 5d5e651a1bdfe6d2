//! Typed reqwest client for the Avito messenger API
//!
//! Every public method first ensures a valid bearer token (client-credentials
//! grant with a safety margin), then performs the HTTP call and parses the
//! response. Non-2xx statuses and schema mismatches are fatal for that call;
//! there is no retry.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::models::{
    Chat, ChatFilter, ChatsResponse, Message, MessagesResponse, SendMessagePayload,
    SimpleActionResponse, SubscriptionsResponse, UserData,
};
use super::{AvitoError, MessengerApi};
use crate::config::{AUTO_REPLY_MARKER, DEFAULT_TOKEN_TTL_SECS, TOKEN_SAFETY_MARGIN_SECS};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// An installed bearer token with its effective expiry
#[derive(Debug, Clone)]
struct TokenState {
    access_token: String,
    /// Issue time plus reported validity minus the safety margin
    expires_at: DateTime<Utc>,
}

impl TokenState {
    fn install(access_token: String, expires_in: Option<i64>, now: DateTime<Utc>) -> Self {
        let validity = expires_in.unwrap_or(DEFAULT_TOKEN_TTL_SECS) - TOKEN_SAFETY_MARGIN_SECS;
        Self {
            access_token,
            expires_at: now + Duration::seconds(validity),
        }
    }

    fn is_valid(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Owns the bearer token and refreshes it transparently before use
struct TokenGuard {
    state: Mutex<Option<TokenState>>,
}

impl TokenGuard {
    const fn new() -> Self {
        Self {
            state: Mutex::const_new(None),
        }
    }

    /// Returns the current token if it is still valid
    async fn current(&self, now: DateTime<Utc>) -> Option<String> {
        let guard = self.state.lock().await;
        guard
            .as_ref()
            .filter(|t| t.is_valid(now))
            .map(|t| t.access_token.clone())
    }

    async fn install(&self, access_token: String, expires_in: Option<i64>, now: DateTime<Utc>) {
        let mut guard = self.state.lock().await;
        *guard = Some(TokenState::install(access_token, expires_in, now));
    }
}

/// Client for the Avito messenger API
pub struct AvitoClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    token: TokenGuard,
    user: Mutex<Option<UserData>>,
}

impl AvitoClient {
    /// Create a new client for the given API base URL and credentials
    #[must_use]
    pub fn new(base_url: impl Into<String>, client_id: String, client_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            client_id,
            client_secret,
            token: TokenGuard::new(),
            user: Mutex::new(None),
        }
    }

    /// Appends the zero-width auto-reply marker when `automated` is set
    #[must_use]
    pub fn apply_marker(text: &str, automated: bool) -> String {
        if automated {
            format!("{text}{AUTO_REPLY_MARKER}")
        } else {
            text.to_string()
        }
    }

    /// Exchange client credentials for a fresh bearer token
    ///
    /// # Errors
    ///
    /// Returns `AvitoError::Auth` if the exchange is rejected.
    async fn update_auth(&self) -> Result<String, AvitoError> {
        let url = format!("{}/token/", self.base_url);
        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AvitoError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AvitoError::Auth(format!(
                "token exchange failed: {status} - {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AvitoError::Json(e.to_string()))?;

        info!("Avito token refreshed");
        self.token
            .install(token.access_token.clone(), token.expires_in, Utc::now())
            .await;
        Ok(token.access_token)
    }

    /// Guarantees a non-expired token and returns it
    async fn ensure_valid_token(&self) -> Result<String, AvitoError> {
        if let Some(token) = self.token.current(Utc::now()).await {
            return Ok(token);
        }
        self.update_auth().await
    }

    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, AvitoError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let truncated = if body.chars().count() > 500 {
                let head: String = body.chars().take(500).collect();
                format!("{head}... (truncated)")
            } else {
                body
            };
            return Err(AvitoError::Api(format!("{status} - {truncated}")));
        }
        response
            .json()
            .await
            .map_err(|e| AvitoError::Json(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<T, AvitoError> {
        let token = self.ensure_valid_token().await?;
        let url = format!("{}{path}", self.base_url);
        debug!(path = path, "Avito GET");
        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(|e| AvitoError::Network(e.to_string()))?;
        Self::parse_response(response).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T, AvitoError> {
        let token = self.ensure_valid_token().await?;
        let url = format!("{}{path}", self.base_url);
        debug!(path = path, "Avito POST");
        let mut request = self.http.post(&url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| AvitoError::Network(e.to_string()))?;
        Self::parse_response(response).await
    }

    /// Fetch and cache the current account data
    ///
    /// # Errors
    ///
    /// Returns `AvitoError` on any remote or parsing failure.
    pub async fn get_user_data(&self) -> Result<UserData, AvitoError> {
        let user: UserData = self.get_json("/core/v1/accounts/self", &[]).await?;
        let mut guard = self.user.lock().await;
        *guard = Some(user.clone());
        Ok(user)
    }

    /// Returns the cached account id, fetching it on first use
    async fn current_user_id(&self) -> Result<i64, AvitoError> {
        {
            let guard = self.user.lock().await;
            if let Some(user) = guard.as_ref() {
                return Ok(user.id);
            }
        }
        Ok(self.get_user_data().await?.id)
    }

    /// List chats owned by the current account
    ///
    /// # Errors
    ///
    /// Returns `AvitoError` on any remote or parsing failure.
    pub async fn get_chats(&self, filter: Option<ChatFilter>) -> Result<Vec<Chat>, AvitoError> {
        let user_id = self.current_user_id().await?;
        let query = filter.unwrap_or_default().to_query();
        let response: ChatsResponse = self
            .get_json(&format!("/messenger/v2/accounts/{user_id}/chats"), &query)
            .await?;
        Ok(response.chats)
    }

    /// List all messages of a chat, in the order the API returns them
    /// (observed as most recent first)
    ///
    /// # Errors
    ///
    /// Returns `AvitoError` on any remote or parsing failure.
    pub async fn get_chat_messages(&self, chat_id: &str) -> Result<MessagesResponse, AvitoError> {
        let user_id = self.current_user_id().await?;
        self.get_json(
            &format!("/messenger/v3/accounts/{user_id}/chats/{chat_id}/messages/"),
            &[],
        )
        .await
    }

    /// List active webhook subscriptions
    ///
    /// # Errors
    ///
    /// Returns `AvitoError` on any remote or parsing failure.
    pub async fn subscriptions(&self) -> Result<SubscriptionsResponse, AvitoError> {
        self.post_json("/messenger/v1/subscriptions", None).await
    }

    /// Register a webhook for incoming messages
    ///
    /// # Errors
    ///
    /// Returns `AvitoError` on any remote or parsing failure.
    pub async fn subscribe_webhook(&self, url: &str) -> Result<SimpleActionResponse, AvitoError> {
        self.post_json("/messenger/v3/webhook", Some(&json!({ "url": url })))
            .await
    }

    /// Remove a webhook registration
    ///
    /// # Errors
    ///
    /// Returns `AvitoError` on any remote or parsing failure.
    pub async fn unsubscribe_webhook(&self, url: &str) -> Result<SimpleActionResponse, AvitoError> {
        self.post_json(
            "/messenger/v1/webhook/unsubscribe",
            Some(&json!({ "url": url })),
        )
        .await
    }

    /// Send a text message to a chat
    ///
    /// # Errors
    ///
    /// Returns `AvitoError` on any remote or parsing failure.
    pub async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        automated: bool,
    ) -> Result<Message, AvitoError> {
        let user_id = self.current_user_id().await?;
        let payload = SendMessagePayload::text(Self::apply_marker(text, automated));
        let body = serde_json::to_value(&payload).map_err(|e| AvitoError::Json(e.to_string()))?;
        self.post_json(
            &format!("/messenger/v1/accounts/{user_id}/chats/{chat_id}/messages"),
            Some(&body),
        )
        .await
    }
}

#[async_trait]
impl MessengerApi for AvitoClient {
    async fn get_chats(&self, filter: Option<ChatFilter>) -> Result<ChatsResponse, AvitoError> {
        Self::get_chats(self, filter)
            .await
            .map(|chats| ChatsResponse { chats })
    }

    async fn get_chat_messages(&self, chat_id: &str) -> Result<MessagesResponse, AvitoError> {
        Self::get_chat_messages(self, chat_id).await
    }

    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        automated: bool,
    ) -> Result<Message, AvitoError> {
        Self::send_message(self, chat_id, text, automated).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_expiry_includes_safety_margin() {
        let now = Utc::now();
        let token = TokenState::install("t".to_string(), Some(3600), now);
        assert_eq!(
            token.expires_at,
            now + Duration::seconds(3600 - TOKEN_SAFETY_MARGIN_SECS)
        );

        // Missing expires_in falls back to the default lifetime
        let token = TokenState::install("t".to_string(), None, now);
        assert_eq!(
            token.expires_at,
            now + Duration::seconds(DEFAULT_TOKEN_TTL_SECS - TOKEN_SAFETY_MARGIN_SECS)
        );
    }

    #[test]
    fn test_token_validity_boundary() {
        let now = Utc::now();
        let token = TokenState::install("t".to_string(), Some(3600), now);

        assert!(token.is_valid(now));
        assert!(token.is_valid(token.expires_at - Duration::seconds(1)));
        // At or past the effective expiry the token must be refreshed
        assert!(!token.is_valid(token.expires_at));
        assert!(!token.is_valid(token.expires_at + Duration::seconds(1)));
    }

    #[tokio::test]
    async fn test_guard_refresh_semantics() {
        let guard = TokenGuard::new();
        let now = Utc::now();

        // No token installed: a guarded call must refresh
        assert!(guard.current(now).await.is_none());

        guard.install("tok".to_string(), Some(3600), now).await;

        // Still-valid token: no refresh is needed
        assert_eq!(guard.current(now).await.as_deref(), Some("tok"));

        // Past the effective expiry the guard reports the token as absent
        let later = now + Duration::seconds(3600 - TOKEN_SAFETY_MARGIN_SECS);
        assert!(guard.current(later).await.is_none());
    }

    #[test]
    fn test_apply_marker() {
        assert_eq!(AvitoClient::apply_marker("hi", false), "hi");
        let marked = AvitoClient::apply_marker("hi", true);
        assert_eq!(marked, format!("hi{AUTO_REPLY_MARKER}"));
        assert!(marked.contains(AUTO_REPLY_MARKER));
    }
}
