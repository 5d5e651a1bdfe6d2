//! File-based prompt storage
//!
//! The system prompt lives as a text file in a data directory. Files are
//! decoded as UTF-8 with a cp1251 fallback, since prompts edited on Windows
//! machines occasionally arrive in the legacy encoding.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::config::PROMPT_FILE;

/// Errors that can occur reading or replacing the prompt
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Prompt file not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reads and replaces the stored system prompt
#[derive(Debug, Clone)]
pub struct PromptStore {
    base_dir: PathBuf,
}

impl PromptStore {
    /// Create a store rooted at `base_dir`
    ///
    /// # Errors
    ///
    /// Returns `PromptError::NotFound` if the directory does not exist.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self, PromptError> {
        let base_dir = base_dir.into();
        if !base_dir.is_dir() {
            return Err(PromptError::NotFound(base_dir.display().to_string()));
        }
        info!(dir = %base_dir.display(), "Prompt store initialized");
        Ok(Self { base_dir })
    }

    fn prompt_path(&self) -> PathBuf {
        self.base_dir.join(PROMPT_FILE)
    }

    fn decode(bytes: Vec<u8>) -> String {
        match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => {
                // Legacy fallback for files saved in cp1251
                let bytes = err.into_bytes();
                let (text, _, _) = encoding_rs::WINDOWS_1251.decode(&bytes);
                text.into_owned()
            }
        }
    }

    /// Read the active system prompt
    ///
    /// # Errors
    ///
    /// Returns `PromptError::NotFound` if the file is missing, or
    /// `PromptError::Io` on any read failure.
    pub async fn read(&self) -> Result<String, PromptError> {
        let path = self.prompt_path();
        if !path.is_file() {
            return Err(PromptError::NotFound(path.display().to_string()));
        }
        let bytes = tokio::fs::read(&path).await?;
        Ok(Self::decode(bytes))
    }

    /// Replace the stored prompt with new content
    ///
    /// # Errors
    ///
    /// Returns `PromptError::Io` on any write failure.
    pub async fn replace(&self, content: &str) -> Result<(), PromptError> {
        let path = self.prompt_path();
        tokio::fs::write(&path, content).await?;
        info!(path = %path.display(), bytes = content.len(), "Prompt replaced");
        Ok(())
    }

    /// The directory this store reads from
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &Path) -> PromptStore {
        PromptStore::new(dir).expect("directory exists")
    }

    #[test]
    fn test_missing_directory_rejected() {
        let err = PromptStore::new("/nonexistent/prompt/dir");
        assert!(matches!(err, Err(PromptError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_read_utf8() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(PROMPT_FILE), "Ты менеджер по продажам")
            .expect("write prompt");

        let store = store_in(dir.path());
        let text = store.read().await.expect("read prompt");
        assert_eq!(text, "Ты менеджер по продажам");
    }

    #[tokio::test]
    async fn test_read_cp1251_fallback() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (encoded, _, _) = encoding_rs::WINDOWS_1251.encode("Привет, покупатель");
        std::fs::write(dir.path().join(PROMPT_FILE), encoded.as_ref()).expect("write prompt");

        let store = store_in(dir.path());
        let text = store.read().await.expect("read prompt");
        assert_eq!(text, "Привет, покупатель");
    }

    #[tokio::test]
    async fn test_replace_then_read() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(PROMPT_FILE), "old").expect("write prompt");

        let store = store_in(dir.path());
        store.replace("new prompt").await.expect("replace");
        assert_eq!(store.read().await.expect("read"), "new prompt");
    }

    #[tokio::test]
    async fn test_missing_file_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        assert!(matches!(store.read().await, Err(PromptError::NotFound(_))));
    }
}
