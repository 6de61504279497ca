//! Session-scoped key/value storage: the persisted view scope, the bearer
//! token, and simple UI preferences all live here. Injected explicitly so the
//! core never reads ambient globals.

use crate::error::SessionError;
use log::debug;
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

/// Key under which the auth layer stores the bearer token.
pub const TOKEN_KEY: &str = "access_token";
/// Key under which the scope selector persists the active view.
pub const SCOPE_KEY: &str = "current_view";

pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError>;
    fn set(&self, key: &str, value: &str) -> Result<(), SessionError>;
    fn remove(&self, key: &str) -> Result<(), SessionError>;

    /// Drop everything tied to the authenticated session. Called by the host
    /// app's 401 interceptor; the core itself never triggers it.
    fn clear_auth(&self) -> Result<(), SessionError> {
        self.remove(TOKEN_KEY)?;
        self.remove(SCOPE_KEY)?;
        Ok(())
    }
}

/// In-memory store for tests and hosts with their own persistence.
#[derive(Default)]
pub struct MemorySession {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySession {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        self.values.lock().unwrap().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        self.values.lock().unwrap().remove(key);
        Ok(())
    }
}

/// SQLite-backed store: a single `config` table in `ledgerly.db` under the
/// caller-supplied directory.
pub struct SqliteSession {
    conn: Mutex<Connection>,
}

impl SqliteSession {
    pub fn open(dir: &Path) -> Result<Self, SessionError> {
        std::fs::create_dir_all(dir).map_err(|e| SessionError::Backend(e.to_string()))?;
        let db_path = dir.join("ledgerly.db");
        debug!("session: opening {:?}", db_path);
        let conn = Connection::open(&db_path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS config (key TEXT PRIMARY KEY, value TEXT);",
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }
}

impl SessionStore for SqliteSession {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT value FROM config WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(row.get(0)?));
        }
        Ok(None)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO config (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM config WHERE key = ?1", params![key])?;
        Ok(())
    }
}
