//! Conversation transcript — an audit log of finished question/answer pairs.
//!
//! The file holds a single pretty-printed JSON array:
//! ```json
//! [
//!   { "question": "Сколько стоит Эрл Грей?", "answer": "200 за 100 гр" }
//! ]
//! ```
//! Non-ASCII text is written as-is.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

/// One logged exchange.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("transcript I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("transcript file is not a JSON array of entries: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Append-only transcript file.
///
/// Appends are read-modify-write of the whole array, serialized by an
/// internal lock so concurrent sessions never lose entries.
pub struct Transcript {
    path: PathBuf,
    lock: Mutex<()>,
}

impl Transcript {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one `{question, answer}` entry.
    ///
    /// A missing or empty file starts a new array.
    pub async fn append(&self, question: &str, answer: &str) -> Result<(), TranscriptError> {
        let _guard = self.lock.lock().await;

        let mut entries = self.read_entries().await?;
        entries.push(TranscriptEntry {
            question: question.to_string(),
            answer: answer.to_string(),
        });

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_string_pretty(&entries)?;
        tokio::fs::write(&self.path, json).await?;

        debug!(
            path = %self.path.display(),
            entries = entries.len(),
            "transcript updated"
        );
        Ok(())
    }

    /// All entries currently in the file.
    pub async fn entries(&self) -> Result<Vec<TranscriptEntry>, TranscriptError> {
        let _guard = self.lock.lock().await;
        self.read_entries().await
    }

    async fn read_entries(&self) -> Result<Vec<TranscriptEntry>, TranscriptError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }
}
