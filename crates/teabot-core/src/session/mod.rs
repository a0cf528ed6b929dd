//! Conversation memory, one session per key.
//!
//! Sessions are cached in memory and optionally persisted as JSONL under
//! `~/.teabot/sessions/`.

pub mod manager;

pub use manager::{SessionHandle, SessionManager, MAX_PERSISTED_KEY_LEN};
