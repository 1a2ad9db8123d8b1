//! SQLite-based local storage.
//!
//! Provides persistent storage for:
//! - Completed timer sessions and statistics (daily and all-time)
//! - Key-value store for application state (timer, sync envelope)
//! - Generated plans, memoized by request fingerprint
//! - The revisioned user record the sync layer writes to

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::data_dir;
use crate::error::{DatabaseError, Result};
use crate::events::SessionCompletion;
use crate::planner::Plan;
use crate::sync::{Revision, UserRecord};
use crate::timer::TimerMode;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: i64,
    pub session_id: Uuid,
    pub mode: TimerMode,
    pub duration_min: u64,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Stats {
    pub total_sessions: u64,
    pub focus_sessions: u64,
    pub total_focus_min: u64,
    pub total_break_min: u64,
    pub today_sessions: u64,
    pub today_focus_min: u64,
}

/// SQLite database at `<data_dir>/timora.db`.
pub struct Database {
    conn: Connection,
}

fn mode_str(mode: TimerMode) -> &'static str {
    match mode {
        TimerMode::Focus => "focus",
        TimerMode::ShortBreak => "short_break",
        TimerMode::LongBreak => "long_break",
    }
}

fn today_start() -> String {
    format!("{}T00:00:00+00:00", Utc::now().format("%Y-%m-%d"))
}

impl Database {
    /// Open the database in the data directory.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(&data_dir()?.join("timora.db"))
    }

    /// # Errors
    /// See [`Database::open`].
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id   TEXT NOT NULL UNIQUE,
                mode         TEXT NOT NULL,
                duration_min INTEGER NOT NULL,
                completed_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS plan_cache (
                fingerprint TEXT PRIMARY KEY,
                plan        TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS user_record (
                id         INTEGER PRIMARY KEY CHECK (id = 1),
                revision   INTEGER NOT NULL,
                record     TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_completed_at ON sessions(completed_at);
            CREATE INDEX IF NOT EXISTS idx_sessions_completed_at_mode ON sessions(completed_at, mode);",
        )?;
        Ok(())
    }

    // ── Sessions ─────────────────────────────────────────────────────

    /// Record a completed session. Returns `false` if it was already recorded.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn record_session(&self, completion: &SessionCompletion) -> Result<bool> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO sessions (session_id, mode, duration_min, completed_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                completion.session_id.to_string(),
                mode_str(completion.mode),
                completion.duration_minutes,
                completion.at.to_rfc3339(),
            ],
        )?;
        Ok(changed > 0)
    }

    /// Most recent sessions first.
    pub fn recent_sessions(&self, limit: usize) -> Result<Vec<SessionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, mode, duration_min, completed_at
             FROM sessions
             ORDER BY completed_at DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, u64>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, session_id, mode, duration_min, completed_at) = row?;
            let corrupt = |what: &str| DatabaseError::QueryFailed(format!("session {id}: bad {what}"));
            out.push(SessionRecord {
                id,
                session_id: session_id.parse().map_err(|_| corrupt("session_id"))?,
                mode: mode.parse().map_err(|_| corrupt("mode"))?,
                duration_min,
                completed_at: DateTime::parse_from_rfc3339(&completed_at)
                    .map_err(|_| corrupt("completed_at"))?
                    .with_timezone(&Utc),
            });
        }
        Ok(out)
    }

    pub fn stats_today(&self) -> Result<Stats> {
        let mut stats = self.totals(Some(&today_start()))?;
        stats.today_sessions = stats.focus_sessions;
        stats.today_focus_min = stats.total_focus_min;
        Ok(stats)
    }

    pub fn stats_all(&self) -> Result<Stats> {
        let mut stats = self.totals(None)?;
        let today = self.totals(Some(&today_start()))?;
        stats.today_sessions = today.focus_sessions;
        stats.today_focus_min = today.total_focus_min;
        Ok(stats)
    }

    fn totals(&self, since: Option<&str>) -> Result<Stats> {
        let mut stmt = self.conn.prepare(
            "SELECT mode, COUNT(*), COALESCE(SUM(duration_min), 0)
             FROM sessions
             WHERE ?1 IS NULL OR completed_at >= ?1
             GROUP BY mode",
        )?;
        let rows = stmt.query_map(params![since], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u64>(1)?,
                row.get::<_, u64>(2)?,
            ))
        })?;

        let mut stats = Stats::default();
        for row in rows {
            let (mode, count, minutes) = row?;
            stats.total_sessions += count;
            if mode == "focus" {
                stats.focus_sessions += count;
                stats.total_focus_min += minutes;
            } else {
                stats.total_break_min += minutes;
            }
        }
        Ok(stats)
    }

    // ── Key-value ────────────────────────────────────────────────────

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.kv_get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn kv_set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.kv_set(key, &serde_json::to_string(value)?)
    }

    pub fn kv_delete(&self, key: &str) -> Result<()> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    // ── Plan cache ───────────────────────────────────────────────────

    pub fn cached_plan(&self, fingerprint: &str) -> Result<Option<Plan>> {
        let raw = self
            .conn
            .query_row(
                "SELECT plan FROM plan_cache WHERE fingerprint = ?1",
                params![fingerprint],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn cache_plan(&self, fingerprint: &str, plan: &Plan) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO plan_cache (fingerprint, plan, created_at) VALUES (?1, ?2, ?3)",
            params![fingerprint, serde_json::to_string(plan)?, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    // ── User record ──────────────────────────────────────────────────

    pub fn user_record(&self) -> Result<Option<(Revision, UserRecord)>> {
        let row = self
            .conn
            .query_row(
                "SELECT revision, record FROM user_record WHERE id = 1",
                [],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;
        match row {
            Some((revision, raw)) => Ok(Some((Revision(revision), serde_json::from_str(&raw)?))),
            None => Ok(None),
        }
    }

    /// Replace the user record, returning the new revision.
    pub fn put_user_record(&self, record: &UserRecord) -> Result<Revision> {
        let raw = serde_json::to_string(record)?;
        let revision: i64 = self.conn.query_row(
            "INSERT INTO user_record (id, revision, record, updated_at) VALUES (1, 1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET
                revision = revision + 1,
                record = excluded.record,
                updated_at = excluded.updated_at
             RETURNING revision",
            params![raw, Utc::now().to_rfc3339()],
            |row| row.get(0),
        )?;
        Ok(Revision(revision))
    }
}
