//! Avito auto-reply backend
//!
//! Wraps the Avito messenger API, layers an automated-response workflow on
//! top of an OpenAI-compatible completion API with an in-memory response
//! cache, and exposes a small HTTP API for health checks and prompt
//! administration.

pub mod api;
pub mod autoreply;
pub mod avito;
pub mod cache;
pub mod config;
pub mod llm;
pub mod prompts;
