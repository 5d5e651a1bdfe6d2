//! Configuration and settings management
//!
//! Loads settings from environment variables and defines service constants.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::avito::models::ChatType;

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Avito application client ID
    pub avito_client_id: String,
    /// Avito application client secret
    pub avito_client_secret: String,

    /// OpenAI API key for the completion service
    pub openai_api_key: Option<String>,

    /// Shared secret code gating the prompt admin endpoints
    pub security_code: String,

    /// Optional HTTP proxy for outbound completion calls (test environments)
    pub proxy_url: Option<String>,

    /// Base URL of the Avito API
    #[serde(default = "default_avito_base_url")]
    pub avito_base_url: String,

    /// Model identifier for the completion API
    #[serde(default = "default_completion_model")]
    pub completion_model: String,

    /// Directory holding the prompt text file
    #[serde(default = "default_prompt_dir")]
    pub prompt_dir: String,

    /// Response cache time-to-live in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Interval between auto-reply passes in seconds; unset disables the scheduler
    pub autoreply_interval_secs: Option<u64>,

    /// Comma-separated chat types scanned by the auto-reply pass (`u2i`, `u2u`)
    #[serde(rename = "autoreply_chat_types")]
    pub autoreply_chat_types_str: Option<String>,

    /// Bind address for the inbound HTTP API
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_avito_base_url() -> String {
    "https://api.avito.ru".to_string()
}

fn default_completion_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_prompt_dir() -> String {
    "data".to_string()
}

const fn default_cache_ttl_secs() -> u64 {
    3600
}

fn default_bind_addr() -> String {
    "127.0.0.1:8000".to_string()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Local overrides, not checked into git
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Environment::default() auto-converts UPPER_SNAKE_CASE to snake_case;
            // ignore_empty treats empty env vars as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        s.try_deserialize()
    }

    /// Returns the chat types scanned by the auto-reply pass
    #[must_use]
    pub fn autoreply_chat_types(&self) -> Vec<ChatType> {
        self.autoreply_chat_types_str
            .as_ref()
            .map(|s| {
                s.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
                    .filter(|token| !token.is_empty())
                    .filter_map(|t| match t.trim() {
                        "u2i" => Some(ChatType::U2i),
                        "u2u" => Some(ChatType::U2u),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_else(|| vec![ChatType::U2i])
    }
}

/// Zero-width space appended to outgoing text to mark automated replies
pub const AUTO_REPLY_MARKER: char = '\u{200B}';

/// Safety margin subtracted from the token lifetime reported by the server
pub const TOKEN_SAFETY_MARGIN_SECS: i64 = 300;

/// Token lifetime assumed when the exchange response omits `expires_in`
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

/// Number of trailing messages hashed into the cache fingerprint
pub const FINGERPRINT_WINDOW: usize = 5;

/// Name of the prompt file inside the data directory
pub const PROMPT_FILE: &str = "text.md";
