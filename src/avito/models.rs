//! Typed payloads of the Avito messenger API
//!
//! Response bodies are validated by serde on deserialization; a schema
//! mismatch surfaces as `AvitoError::Json` in the client.

use serde::{Deserialize, Serialize};

/// Placeholder passed to the completion API for voice attachments
pub const VOICE_PLACEHOLDER: &str = "Прикрепил аудиосообщение (невозможно прочитать)";
/// Placeholder passed to the completion API for image attachments
pub const IMAGE_PLACEHOLDER: &str = "Прикрепил картинку (невозможно прочитать)";

/// Direction of a message relative to the account owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Sent by the counterparty
    In,
    /// Sent by the account owner
    Out,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallContent {
    pub status: String,
    pub target_user_id: i64,
}

/// Image attachment; the API returns a map of size label to URL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageContent {
    pub sizes: std::collections::HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemContent {
    pub image_url: String,
    pub item_url: String,
    pub price_string: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkContent {
    pub text: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationContent {
    pub kind: String,
    pub lat: f64,
    pub lon: f64,
    pub text: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceContent {
    pub voice_id: String,
}

/// Content union of a message; exactly one field is normally populated
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call: Option<CallContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<ItemContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<LinkContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<VoiceContent>,
}

/// A single message in a chat
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub author_id: i64,
    pub content: MessageContent,
    /// Unix timestamp of creation
    pub created: i64,
    pub direction: Direction,
    #[serde(rename = "type")]
    pub message_type: String,
}

impl Message {
    /// Text representation fed to the completion API.
    ///
    /// Prefers plain text, then link text, then a fixed placeholder for
    /// voice and image attachments which cannot be read.
    #[must_use]
    pub fn completion_text(&self) -> Option<String> {
        if let Some(text) = &self.content.text {
            return Some(text.clone());
        }
        if let Some(link) = &self.content.link {
            return Some(link.text.clone());
        }
        if self.content.voice.is_some() {
            return Some(VOICE_PLACEHOLDER.to_string());
        }
        if self.content.image.is_some() {
            return Some(IMAGE_PLACEHOLDER.to_string());
        }
        None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Avatar {
    pub default: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUserProfile {
    pub avatar: Avatar,
    pub item_id: i64,
    pub url: String,
    pub user_id: i64,
}

/// Participant of a chat
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_user_profile: Option<PublicUserProfile>,
}

/// A chat with its denormalized last message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    pub created: i64,
    pub updated: i64,
    pub users: Vec<User>,
    pub last_message: Message,
    /// Item context attached to `u2i` chats; shape varies, kept opaque
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatsResponse {
    pub chats: Vec<Chat>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
}

/// Chat kinds distinguished by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    /// User-to-item: buyer conversation about a listing
    U2i,
    /// User-to-user: direct conversation
    U2u,
}

impl ChatType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::U2i => "u2i",
            Self::U2u => "u2u",
        }
    }
}

/// Query filter for chat listing
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatFilter {
    pub item_ids: Option<Vec<i64>>,
    pub unread_only: bool,
    pub chat_types: Option<Vec<ChatType>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ChatFilter {
    /// Render the filter as query parameters for the chats endpoint
    #[must_use]
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if let Some(ids) = &self.item_ids {
            let joined = ids
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",");
            query.push(("item_ids".to_string(), joined));
        }
        if self.unread_only {
            query.push(("unread_only".to_string(), "true".to_string()));
        }
        if let Some(types) = &self.chat_types {
            let joined = types
                .iter()
                .map(|t| t.as_str())
                .collect::<Vec<_>>()
                .join(",");
            query.push(("chat_types".to_string(), joined));
        }
        query.push((
            "limit".to_string(),
            self.limit.unwrap_or(100).to_string(),
        ));
        query.push((
            "offset".to_string(),
            self.offset.unwrap_or(0).to_string(),
        ));
        query
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserData {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub phones: Vec<String>,
    #[serde(default)]
    pub profile_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimpleActionResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Subscription {
    pub url: String,
    pub version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionsResponse {
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
}

/// Body of the send-message endpoint
#[derive(Debug, Clone, Serialize)]
pub struct SendMessagePayload {
    pub message: SendMessageText,
    #[serde(rename = "type")]
    pub message_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendMessageText {
    pub text: String,
}

impl SendMessagePayload {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            message: SendMessageText { text: text.into() },
            message_type: "text".to_string(),
        }
    }
}
