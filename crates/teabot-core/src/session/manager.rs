//! Session store — per-key conversation memory with bounded caching and
//! optional JSONL persistence.
//!
//! File format: JSONL in `~/.teabot/sessions/{hex(key)}.jsonl`
//! - Line 1: `{"_type":"metadata","key":"http:42","created_at":"...","updated_at":"...","metadata":{}}`
//! - Line 2+: `{"role":"user","text":"hello"}`
//!
//! Keys come from clients, so the file name is the hex encoding of the raw
//! key bytes: distinct keys never share a file.

use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::{ConversationTurn, Session};
use crate::utils;

/// Longest key that can be persisted. Hex encoding doubles it and most
/// filesystems cap file names at 255 bytes.
pub const MAX_PERSISTED_KEY_LEN: usize = 120;

/// Shared, lockable handle to one session.
///
/// Holding the lock gives exclusive write access to the session's memory;
/// invocations for the same key serialize on it.
pub type SessionHandle = Arc<tokio::sync::Mutex<Session>>;

/// Metadata header written as the first line of each JSONL session file.
#[derive(Debug, Serialize, Deserialize)]
struct SessionMetadata {
    #[serde(rename = "_type")]
    record_type: String,
    #[serde(default)]
    key: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

struct CacheEntry {
    handle: SessionHandle,
    last_used: u64,
}

// ─────────────────────────────────────────────
// SessionManager
// ─────────────────────────────────────────────

/// Keeps one [`Session`] per conversation key.
///
/// The map itself sits behind a short-lived `std::sync::Mutex`; each session
/// has its own async mutex, so different sessions never contend. At most
/// `max_sessions` sessions are cached; beyond that, the least recently used
/// sessions nobody currently holds are evicted.
pub struct SessionManager {
    /// Where `.jsonl` files go. `None` keeps sessions in memory only.
    sessions_dir: Option<PathBuf>,
    max_sessions: usize,
    cache: Mutex<HashMap<String, CacheEntry>>,
    clock: AtomicU64,
}

impl SessionManager {
    /// Create a persisting session manager.
    ///
    /// `sessions_dir` defaults to `~/.teabot/sessions/` if `None`.
    /// The directory is created if it doesn't exist.
    pub fn new(max_sessions: usize, sessions_dir: Option<PathBuf>) -> std::io::Result<Self> {
        let dir = sessions_dir.unwrap_or_else(utils::get_sessions_path);
        std::fs::create_dir_all(&dir)?;

        Ok(Self {
            sessions_dir: Some(dir),
            ..Self::in_memory(max_sessions)
        })
    }

    /// Create a session manager that never touches the disk.
    pub fn in_memory(max_sessions: usize) -> Self {
        Self {
            sessions_dir: None,
            max_sessions: max_sessions.max(1),
            cache: Mutex::new(HashMap::new()),
            clock: AtomicU64::new(0),
        }
    }

    /// Get the handle for `key`, loading from disk or creating it as needed.
    pub fn handle(&self, key: &str) -> SessionHandle {
        let tick = self.clock.fetch_add(1, Ordering::Relaxed);
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(entry) = cache.get_mut(key) {
            entry.last_used = tick;
            return entry.handle.clone();
        }

        let session = self.load_from_disk(key).unwrap_or_else(|| Session::new(key));
        let handle = Arc::new(tokio::sync::Mutex::new(session));
        cache.insert(
            key.to_string(),
            CacheEntry {
                handle: handle.clone(),
                last_used: tick,
            },
        );
        self.evict_idle(&mut cache);
        handle
    }

    /// Snapshot of the last `max_turns` turns of a session.
    pub async fn history(&self, key: &str, max_turns: usize) -> Vec<ConversationTurn> {
        let handle = self.handle(key);
        let session = handle.lock().await;
        session.history(max_turns).to_vec()
    }

    /// Clear all turns in a session (reset conversation).
    pub async fn clear(&self, key: &str) -> std::io::Result<()> {
        let handle = self.handle(key);
        let mut session = handle.lock().await;
        session.turns.clear();
        session.updated_at = Utc::now();
        self.persist(&session)
    }

    /// Write a session to disk. No-op for in-memory managers.
    ///
    /// Callers pass the session they hold locked, so writes for one key
    /// never interleave.
    pub fn persist(&self, session: &Session) -> std::io::Result<()> {
        let Some(path) = self.session_path(&session.key) else {
            return Ok(());
        };
        if session.key.len() > MAX_PERSISTED_KEY_LEN {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!(
                    "session key is longer than {MAX_PERSISTED_KEY_LEN} bytes and cannot be persisted"
                ),
            ));
        }

        let mut file = std::fs::File::create(&path)?;
        let meta = SessionMetadata {
            record_type: "metadata".to_string(),
            key: Some(session.key.clone()),
            created_at: session.created_at,
            updated_at: session.updated_at,
            metadata: session.metadata.clone(),
        };
        writeln!(file, "{}", serde_json::to_string(&meta)?)?;
        for turn in &session.turns {
            writeln!(file, "{}", serde_json::to_string(turn)?)?;
        }

        debug!(
            "Saved session '{}' ({} turns) to {}",
            session.key,
            session.turns.len(),
            path.display()
        );
        Ok(())
    }

    /// Number of cached sessions.
    pub fn len(&self) -> usize {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop least-recently-used sessions that nobody holds until the cache
    /// fits `max_sessions`.
    fn evict_idle(&self, cache: &mut HashMap<String, CacheEntry>) {
        if cache.len() <= self.max_sessions {
            return;
        }

        let mut idle: Vec<(u64, String)> = cache
            .iter()
            .filter(|(_, entry)| Arc::strong_count(&entry.handle) == 1)
            .map(|(key, entry)| (entry.last_used, key.clone()))
            .collect();
        idle.sort();

        let excess = cache.len() - self.max_sessions;
        for (_, key) in idle.into_iter().take(excess) {
            debug!(session = %key, "evicting idle session");
            cache.remove(&key);
        }

        if cache.len() > self.max_sessions {
            warn!(
                cached = cache.len(),
                max = self.max_sessions,
                "session cache over capacity; all remaining sessions are in use"
            );
        }
    }

    fn session_path(&self, key: &str) -> Option<PathBuf> {
        let dir = self.sessions_dir.as_ref()?;
        Some(dir.join(format!("{}.jsonl", session_file_stem(key))))
    }

    fn load_from_disk(&self, key: &str) -> Option<Session> {
        if key.len() > MAX_PERSISTED_KEY_LEN {
            return None;
        }
        let path = self.session_path(key)?;
        if !path.exists() {
            return None;
        }

        let file = match std::fs::File::open(&path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Failed to open session file {}: {}", path.display(), e);
                return None;
            }
        };

        let mut session = Session::new(key);
        for line in std::io::BufReader::new(file).lines().map_while(Result::ok) {
            if line.trim().is_empty() {
                continue;
            }

            if let Ok(meta) = serde_json::from_str::<SessionMetadata>(&line) {
                if meta.record_type == "metadata" {
                    if let Some(stored) = meta.key.as_deref().filter(|k| *k != key) {
                        warn!(
                            session = key,
                            stored_key = stored,
                            path = %path.display(),
                            "session file belongs to another key; ignoring it"
                        );
                        return None;
                    }
                    session.created_at = meta.created_at;
                    session.updated_at = meta.updated_at;
                    session.metadata = meta.metadata;
                    continue;
                }
            }

            match serde_json::from_str::<ConversationTurn>(&line) {
                Ok(turn) => session.turns.push(turn),
                Err(e) => warn!(session = key, error = %e, "skipping malformed session line"),
            }
        }

        debug!(
            "Loaded session '{}' with {} turns from disk",
            key,
            session.turns.len()
        );
        Some(session)
    }
}

/// Hex encoding of the raw key bytes.
fn session_file_stem(key: &str) -> String {
    key.bytes().map(|b| format!("{b:02x}")).collect()
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
