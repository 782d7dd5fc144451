//! Small persisted key-value store for client-side state.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const STATE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS local_state (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// SQLite-backed local state.
pub struct StateStore {
  conn: Mutex<Connection>,
}

impl StateStore {
  /// Open or create the state database at `path`, or at the default location.
  pub fn open(path: Option<&Path>) -> Result<Self> {
    let path = match path {
      Some(p) => p.to_path_buf(),
      None => Self::default_path()?,
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create state directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open state database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Open a throwaway in-memory store.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory state database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(STATE_SCHEMA)
      .map_err(|e| eyre!("Failed to run state migrations: {}", e))?;

    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  /// Default database path under the user data directory.
  pub fn default_path() -> Result<PathBuf> {
    Ok(crate::config::data_dir()?.join("state.db"))
  }

  /// Read the value stored under `key`.
  #[cfg(test)]
  pub fn get(&self, key: &str) -> Result<Option<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .query_row(
        "SELECT value FROM local_state WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read state '{}': {}", key, e))
  }

  /// Store `value` under `key` unless it is already there.
  ///
  /// The read and the write happen under one lock, so of several callers
  /// racing with the same value exactly one sees `true`.
  pub fn set_if_changed(&self, key: &str, value: &str) -> Result<bool> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let current: Option<String> = conn
      .query_row(
        "SELECT value FROM local_state WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read state '{}': {}", key, e))?;

    if current.as_deref() == Some(value) {
      return Ok(false);
    }

    conn
      .execute(
        "INSERT OR REPLACE INTO local_state (key, value, updated_at)
         VALUES (?, ?, datetime('now'))",
        params![key, value],
      )
      .map_err(|e| eyre!("Failed to write state '{}': {}", key, e))?;

    Ok(true)
  }
}
