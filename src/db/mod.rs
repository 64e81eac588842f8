// Database module
//
// The catalog is a single SQLite file in WAL mode so the HTTP handlers can read
// while a scan pass writes. Every caller opens its own short-lived connection.

pub mod migrations;
pub mod schema;

use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;
use anyhow::Result;

use crate::constants::DB_BUSY_TIMEOUT_MS;

/// Open or create the catalog at the given path and bring its schema up to date.
pub fn open_db(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let conn = open_connection(db_path)?;

    // WAL is persistent in the file, so it only needs setting once
    conn.pragma_update(None, "journal_mode", "WAL")?;

    migrations::run_migrations(&conn)?;

    Ok(conn)
}

/// Open a connection to an already-initialized catalog.
pub fn open_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(Duration::from_millis(DB_BUSY_TIMEOUT_MS))?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_db_creates_parent_and_wal() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("nested").join("glimpse.db");
        let conn = open_db(&db_path).unwrap();
        assert!(db_path.exists());

        let mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0)).unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[test]
    fn test_open_db_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("glimpse.db");
        drop(open_db(&db_path).unwrap());
        let conn = open_db(&db_path).unwrap();
        let version: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0)).unwrap();
        assert_eq!(version, migrations::latest_version());
    }
}
