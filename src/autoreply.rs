//! Automated reply workflow
//!
//! A single pass scans chats whose counterparty spoke last, continues only
//! in threads the automation has already touched (detected via the
//! zero-width marker on past outgoing messages), and answers them with a
//! completion-API reply, reusing cached replies for unchanged conversation
//! tails.
//!
//! Per-chat failures are isolated: one chat's error is logged and counted,
//! and the pass continues with the remaining chats.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::avito::models::{ChatFilter, ChatType, Direction, Message};
use crate::avito::{AvitoError, MessengerApi};
use crate::cache::{fingerprint, ResponseCache};
use crate::config::{AUTO_REPLY_MARKER, FINGERPRINT_WINDOW};
use crate::llm::{CompletionProvider, LlmError, Turn};
use crate::prompts::{PromptError, PromptStore};

/// Errors that abort an entire pass before any chat is processed
#[derive(Debug, Error)]
pub enum PassError {
    #[error(transparent)]
    Avito(#[from] AvitoError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
}

/// Errors scoped to a single chat within a pass
#[derive(Debug, Error)]
enum ChatError {
    #[error(transparent)]
    Avito(#[from] AvitoError),
    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// Outcome counters of one auto-reply pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassReport {
    /// Unanswered chats inspected
    pub scanned: usize,
    /// Chats the automation had previously touched
    pub eligible: usize,
    /// Replies actually sent
    pub replied: usize,
    /// Replies served from the cache
    pub cache_hits: usize,
    /// Chats that failed and were skipped
    pub failed: usize,
}

enum ChatOutcome {
    Skipped,
    Replied { cache_hit: bool },
}

/// Runs the auto-reply workflow against the messenger and completion APIs
pub struct AutoReplyOrchestrator {
    api: Arc<dyn MessengerApi>,
    llm: Arc<dyn CompletionProvider>,
    cache: ResponseCache,
    prompts: PromptStore,
    model_id: String,
    chat_types: Vec<ChatType>,
}

impl AutoReplyOrchestrator {
    #[must_use]
    pub fn new(
        api: Arc<dyn MessengerApi>,
        llm: Arc<dyn CompletionProvider>,
        cache: ResponseCache,
        prompts: PromptStore,
        model_id: String,
        chat_types: Vec<ChatType>,
    ) -> Self {
        Self {
            api,
            llm,
            cache,
            prompts,
            model_id,
            chat_types,
        }
    }

    /// The response cache backing this orchestrator
    #[must_use]
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Execute one pass over all unanswered chats
    ///
    /// # Errors
    ///
    /// Returns `PassError` if the prompt cannot be read or the chat listing
    /// fails; individual chat failures are counted in the report instead.
    pub async fn run_pass(&self) -> Result<PassReport, PassError> {
        let prompt = self.prompts.read().await?;

        let filter = ChatFilter {
            chat_types: Some(self.chat_types.clone()),
            ..ChatFilter::default()
        };
        let chats = self.api.get_chats(Some(filter)).await?.chats;

        let mut report = PassReport::default();
        for chat in chats
            .iter()
            .filter(|c| c.last_message.direction == Direction::In)
        {
            report.scanned += 1;
            match self.process_chat(&chat.id, &prompt).await {
                Ok(ChatOutcome::Skipped) => {
                    debug!(chat_id = %chat.id, "Chat never touched by automation, skipping");
                }
                Ok(ChatOutcome::Replied { cache_hit }) => {
                    report.eligible += 1;
                    report.replied += 1;
                    if cache_hit {
                        report.cache_hits += 1;
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(chat_id = %chat.id, error = %e, "Auto-reply failed for chat");
                }
            }
        }

        info!(
            scanned = report.scanned,
            eligible = report.eligible,
            replied = report.replied,
            cache_hits = report.cache_hits,
            failed = report.failed,
            "Auto-reply pass finished"
        );
        Ok(report)
    }

    async fn process_chat(&self, chat_id: &str, prompt: &str) -> Result<ChatOutcome, ChatError> {
        let messages = self.api.get_chat_messages(chat_id).await?.messages;

        if !is_automation_eligible(&messages) {
            return Ok(ChatOutcome::Skipped);
        }

        let turns = build_conversation(&messages);
        let window = fingerprint_window(&messages);
        let key = fingerprint(chat_id, prompt, &window);

        let (reply, cache_hit) = match self.cache.get(&key).await {
            Some(cached) => {
                debug!(chat_id = %chat_id, "Reusing cached reply");
                (cached, true)
            }
            None => {
                let generated = self.llm.complete(prompt, &turns, &self.model_id).await?;
                self.cache.put(key, generated.clone()).await;
                (generated, false)
            }
        };

        self.api.send_message(chat_id, &reply, true).await?;
        Ok(ChatOutcome::Replied { cache_hit })
    }
}

/// A chat is eligible when some outgoing message carries the auto-reply
/// marker, i.e. the automation has answered this thread before.
#[must_use]
pub fn is_automation_eligible(messages: &[Message]) -> bool {
    messages.iter().any(|m| {
        m.direction == Direction::Out
            && m.content
                .text
                .as_ref()
                .is_some_and(|t| t.contains(AUTO_REPLY_MARKER))
    })
}

/// Build the chronological conversation for the completion API.
///
/// Input is most recent first, as the messages endpoint returns it;
/// messages without a usable text representation are dropped.
#[must_use]
pub fn build_conversation(messages: &[Message]) -> Vec<Turn> {
    messages
        .iter()
        .rev()
        .filter_map(|m| {
            let content = m.completion_text()?;
            Some(match m.direction {
                Direction::In => Turn::user(content),
                Direction::Out => Turn::assistant(content),
            })
        })
        .collect()
}

/// Texts of the trailing fingerprint window, oldest first.
///
/// The window counts all messages, not only text-bearing ones; messages
/// without a text representation contribute nothing to the hash but still
/// occupy a slot.
fn fingerprint_window(messages: &[Message]) -> Vec<String> {
    let window = &messages[..messages.len().min(FINGERPRINT_WINDOW)];
    window
        .iter()
        .rev()
        .filter_map(Message::completion_text)
        .collect()
}

/// Periodically runs auto-reply passes until the process exits
pub async fn run_scheduler(orchestrator: Arc<AutoReplyOrchestrator>, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        if let Err(e) = orchestrator.run_pass().await {
            warn!(error = %e, "Auto-reply pass aborted");
        }
    }
}
