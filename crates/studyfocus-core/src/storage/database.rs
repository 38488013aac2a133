//! SQLite-backed local state.
//!
//! Provides persistent storage for:
//! - A log of resolved focus sessions
//! - Key-value store for application state (the CLI keeps the live
//!   controller here between invocations)

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::{DatabaseError, Result};
use crate::events::Event;

/// One resolved session as kept in the local log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusLogEntry {
    pub id: i64,
    pub session_id: i64,
    pub kind: String,
    pub action: String,
    pub elapsed_minutes: u64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

pub struct Database {
    conn: Connection,
}

fn label<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        Ok(other) => other.to_string(),
        Err(_) => String::new(),
    }
}

fn parse_time(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_default()
}

impl Database {
    /// Open the database at `~/.config/studyfocus/studyfocus.db`.
    ///
    /// # Errors
    /// Returns an error if the data directory or the database cannot be
    /// prepared.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("studyfocus.db");
        Ok(Self::open_at(&path)?)
    }

    /// # Errors
    /// Returns [`DatabaseError::OpenFailed`] if SQLite cannot open `path`.
    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    #[cfg(test)]
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS focus_log (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id      INTEGER NOT NULL,
                kind            TEXT NOT NULL,
                action          TEXT NOT NULL,
                elapsed_minutes INTEGER NOT NULL,
                started_at      TEXT NOT NULL,
                ended_at        TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_focus_log_ended_at ON focus_log(ended_at);",
        )?;
        Ok(())
    }

    /// Log a `SessionResolved` event. Other events are ignored.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn record_resolution(&self, event: &Event) -> Result<Option<i64>, DatabaseError> {
        let Event::SessionResolved {
            session_id,
            kind,
            action,
            elapsed_minutes,
            started_at,
            at,
        } = event
        else {
            return Ok(None);
        };
        self.conn.execute(
            "INSERT INTO focus_log (session_id, kind, action, elapsed_minutes, started_at, ended_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session_id,
                label(kind),
                label(action),
                elapsed_minutes,
                started_at.to_rfc3339(),
                at.to_rfc3339(),
            ],
        )?;
        Ok(Some(self.conn.last_insert_rowid()))
    }

    /// Most recent entries first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub fn history(&self, limit: usize) -> Result<Vec<FocusLogEntry>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, kind, action, elapsed_minutes, started_at, ended_at
             FROM focus_log
             ORDER BY ended_at DESC, id DESC
             LIMIT ?1",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![limit], |row| {
            Ok(FocusLogEntry {
                id: row.get(0)?,
                session_id: row.get(1)?,
                kind: row.get(2)?,
                action: row.get(3)?,
                elapsed_minutes: row.get(4)?,
                started_at: parse_time(&row.get::<_, String>(5)?),
                ended_at: parse_time(&row.get::<_, String>(6)?),
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Total credited minutes for sessions ending at or after `since`.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub fn minutes_since(&self, since: DateTime<Utc>) -> Result<u64, DatabaseError> {
        let total = self.conn.query_row(
            "SELECT COALESCE(SUM(elapsed_minutes), 0) FROM focus_log WHERE ended_at >= ?1",
            params![since.to_rfc3339()],
            |row| row.get::<_, u64>(0),
        )?;
        Ok(total)
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<bool, DatabaseError> {
        let n = self.conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(n > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionKind;
    use crate::timer::TerminalAction;
    use chrono::TimeZone;

    fn resolved(session_id: i64, minutes: u64, hour: u32) -> Event {
        Event::SessionResolved {
            session_id,
            kind: SessionKind::Scheduled,
            action: TerminalAction::Stop,
            elapsed_minutes: minutes,
            started_at: Utc.with_ymd_and_hms(2026, 3, 2, hour, 0, 0).unwrap(),
            at: Utc.with_ymd_and_hms(2026, 3, 2, hour, 30, 0).unwrap(),
        }
    }

    #[test]
    fn records_and_lists_resolutions() {
        let db = Database::open_memory().unwrap();
        db.record_resolution(&resolved(7, 30, 9)).unwrap();
        db.record_resolution(&resolved(8, 20, 11)).unwrap();
        assert_eq!(
            db.record_resolution(&Event::StopDisarmed { at: Utc::now() }).unwrap(),
            None
        );

        let history = db.history(10).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].session_id, 8);
        assert_eq!(history[0].kind, "scheduled");
        assert_eq!(history[0].action, "stop");
        assert_eq!(db.history(1).unwrap().len(), 1);

        let since = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        assert_eq!(db.minutes_since(since).unwrap(), 20);
    }

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().as_deref(), Some("hello"));
        assert!(db.kv_delete("test").unwrap());
        assert!(!db.kv_delete("test").unwrap());
    }

    #[test]
    fn open_at_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("focus.db");
        Database::open_at(&path).unwrap().kv_set("k", "v").unwrap();
        assert_eq!(
            Database::open_at(&path).unwrap().kv_get("k").unwrap().as_deref(),
            Some("v")
        );
    }
}
