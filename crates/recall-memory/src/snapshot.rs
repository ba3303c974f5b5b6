//! Session snapshots and their SQLite persistence.
//!
//! A [`SessionSnapshot`] captures everything needed to resume a session: the
//! stored memories, the personalization profile, the active conversation
//! contexts with the current-context pointer, the tail of the transition log
//! and the pending topics.
//!
//! Persistence sits behind the [`SnapshotStore`] trait. The core never calls
//! it on its own; the caller decides when to load and save. A failed save
//! leaves the in-memory session fully usable.
//!
//! # Storage layout
//!
//! [`SqliteSnapshotStore`] creates two tables (if they do not already exist):
//!
//! | table               | columns                                                  |
//! |---------------------|----------------------------------------------------------|
//! | `session_snapshots` | `session_id` TEXT PK, `saved_at` TEXT, `payload` TEXT    |
//! | `archived_contexts` | `id` TEXT, `session_id` TEXT, `topic` TEXT, `archived_at` TEXT, `payload` TEXT |
//!
//! Payloads are JSON; timestamps are RFC-3339 UTC.
//!
//! # Example
//!
//! ```rust
//! use recall_memory::snapshot::{SessionSnapshot, SnapshotStore, SqliteSnapshotStore};
//!
//! let store = SqliteSnapshotStore::open_in_memory().unwrap();
//! assert!(store.load_snapshot("alice").unwrap().is_none());
//!
//! store.save_snapshot("alice", &SessionSnapshot::default()).unwrap();
//! assert!(store.load_snapshot("alice").unwrap().is_some());
//! ```

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use recall_types::{ContextTransition, ConversationContext, PendingTopic, RecallError};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::item::MemoryItem;
use crate::profile::PersonalizationProfile;

/// Bumped whenever the snapshot layout changes incompatibly.
pub const SNAPSHOT_VERSION: u32 = 1;

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can arise while loading or saving snapshots.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unsupported snapshot version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },
}

impl From<SnapshotError> for RecallError {
    fn from(err: SnapshotError) -> Self {
        match err {
            SnapshotError::Json(e) => RecallError::Serialization(e.to_string()),
            other => RecallError::Persistence(other.to_string()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SessionSnapshot
// ─────────────────────────────────────────────────────────────────────────────

/// Serializable state of one user session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub memories: Vec<MemoryItem>,
    pub profile: PersonalizationProfile,
    pub contexts: Vec<ConversationContext>,
    pub current_context: Option<String>,
    pub transitions: Vec<ContextTransition>,
    pub pending_topics: Vec<PendingTopic>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            memories: Vec::new(),
            profile: PersonalizationProfile::default(),
            contexts: Vec::new(),
            current_context: None,
            transitions: Vec::new(),
            pending_topics: Vec::new(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SnapshotStore
// ─────────────────────────────────────────────────────────────────────────────

/// Durable key-value persistence for session snapshots.
pub trait SnapshotStore: Send + Sync {
    /// Load the latest snapshot of `session_id`, `None` if never saved.
    fn load_snapshot(&self, session_id: &str) -> Result<Option<SessionSnapshot>, SnapshotError>;

    /// Save (replace) the snapshot of `session_id`.
    fn save_snapshot(&self, session_id: &str, snapshot: &SessionSnapshot) -> Result<(), SnapshotError>;

    /// Append contexts that left the active working set to the historical log.
    fn archive_contexts(&self, session_id: &str, contexts: &[ConversationContext]) -> Result<(), SnapshotError>;
}

/// SQLite-backed [`SnapshotStore`].
pub struct SqliteSnapshotStore {
    conn: Mutex<Connection>,
}

impl SqliteSnapshotStore {
    /// Open (or create) a persistent SQLite database at `path`.
    pub fn open(path: &str) -> Result<Self, SnapshotError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Open a temporary in-memory database (useful for testing).
    pub fn open_in_memory() -> Result<Self, SnapshotError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, SnapshotError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS session_snapshots (
                session_id TEXT NOT NULL PRIMARY KEY,
                saved_at   TEXT NOT NULL,
                payload    TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS archived_contexts (
                id          TEXT NOT NULL,
                session_id  TEXT NOT NULL,
                topic       TEXT NOT NULL,
                archived_at TEXT NOT NULL,
                payload     TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS archived_contexts_session
                ON archived_contexts (session_id, archived_at);",
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Ids of every session with a saved snapshot, sorted.
    pub fn session_ids(&self) -> Result<Vec<String>, SnapshotError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT session_id FROM session_snapshots ORDER BY session_id ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Remove the snapshot of `session_id`. Returns whether one existed.
    pub fn delete_snapshot(&self, session_id: &str) -> Result<bool, SnapshotError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "DELETE FROM session_snapshots WHERE session_id = ?1",
            params![session_id],
        )?;
        Ok(changed > 0)
    }

    /// Archived contexts of `session_id`, oldest archive first.
    pub fn archived_contexts(&self, session_id: &str) -> Result<Vec<ConversationContext>, SnapshotError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT payload FROM archived_contexts
             WHERE session_id = ?1
             ORDER BY archived_at ASC, rowid ASC",
        )?;
        let rows = stmt.query_map(params![session_id], |row| row.get::<_, String>(0))?;
        let mut contexts = Vec::new();
        for payload in rows {
            contexts.push(serde_json::from_str(&payload?)?);
        }
        Ok(contexts)
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn load_snapshot(&self, session_id: &str) -> Result<Option<SessionSnapshot>, SnapshotError> {
        let conn = self.conn.lock();
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM session_snapshots WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(payload) = payload else {
            return Ok(None);
        };
        let snapshot: SessionSnapshot = serde_json::from_str(&payload)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::Version {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        debug!(session_id, memories = snapshot.memories.len(), "snapshot loaded");
        Ok(Some(snapshot))
    }

    fn save_snapshot(&self, session_id: &str, snapshot: &SessionSnapshot) -> Result<(), SnapshotError> {
        let payload = serde_json::to_string(snapshot)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO session_snapshots (session_id, saved_at, payload)
             VALUES (?1, ?2, ?3)",
            params![session_id, snapshot.saved_at.to_rfc3339(), payload],
        )?;
        debug!(session_id, bytes = payload.len(), "snapshot saved");
        Ok(())
    }

    fn archive_contexts(&self, session_id: &str, contexts: &[ConversationContext]) -> Result<(), SnapshotError> {
        if contexts.is_empty() {
            return Ok(());
        }
        let now = Utc::now().to_rfc3339();
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        for context in contexts {
            let payload = serde_json::to_string(context)?;
            tx.execute(
                "INSERT INTO archived_contexts (id, session_id, topic, archived_at, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![context.id, session_id, context.topic, now, payload],
            )?;
        }
        tx.commit()?;
        debug!(session_id, count = contexts.len(), "contexts archived");
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
