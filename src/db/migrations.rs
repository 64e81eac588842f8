// Database migrations
// Migrations are forward-only. Never edit or delete a migration after it ships.

use rusqlite::Connection;
use anyhow::Result;

/// All migrations in order. Each migration is a SQL string.
const MIGRATIONS: &[&str] = &[
    // Migration 1: Catalog of indexed originals
    r#"
    CREATE TABLE photos (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        original_path TEXT UNIQUE NOT NULL,
        thumbnail_path TEXT NOT NULL,
        folder TEXT NOT NULL,
        filename TEXT NOT NULL,
        extension TEXT NOT NULL,
        file_size INTEGER NOT NULL,
        mod_time TEXT NOT NULL,
        width INTEGER NOT NULL DEFAULT 0,
        height INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
        media_type TEXT NOT NULL DEFAULT 'photo' CHECK (media_type IN ('photo', 'video')),
        duration REAL NOT NULL DEFAULT 0,
        video_codec TEXT NOT NULL DEFAULT '',
        audio_codec TEXT NOT NULL DEFAULT '',
        framerate REAL NOT NULL DEFAULT 0
    );

    CREATE INDEX idx_photos_folder ON photos(folder);
    CREATE INDEX idx_photos_mod_time ON photos(mod_time);
    CREATE INDEX idx_photos_filename ON photos(filename);
    CREATE INDEX idx_photos_media_type ON photos(media_type);
    "#,
];

/// Schema version after all migrations are applied.
pub fn latest_version() -> u32 {
    MIGRATIONS.len() as u32
}

/// Get current schema version from database
fn get_schema_version(conn: &Connection) -> Result<u32> {
    let version: u32 = conn.query_row(
        "PRAGMA user_version",
        [],
        |row| row.get(0)
    )?;
    Ok(version)
}

/// Run all pending migrations. Each one commits together with its version bump.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;
    let target_version = latest_version();

    if current_version > target_version {
        anyhow::bail!(
            "Catalog schema version {} is newer than this build supports (max {})",
            current_version,
            target_version
        );
    }

    if current_version == target_version {
        return Ok(());
    }

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let migration_version = (i + 1) as u32;
        if migration_version <= current_version {
            continue;
        }

        conn.execute_batch(&format!(
            "BEGIN;\n{}\nPRAGMA user_version = {};\nCOMMIT;",
            migration, migration_version
        ))?;

        log::info!("Applied catalog migration {}", migration_version);
    }

    Ok(())
}
