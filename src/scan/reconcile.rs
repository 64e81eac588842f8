// Orphan reconciliation
//
// Drops catalog rows whose original is gone, along with their thumbnails.

use std::path::Path;

use rusqlite::Connection;

use crate::db::schema;
use crate::error::Result;

/// Remove rows for originals that no longer exist. Returns how many went.
///
/// Only listing the catalog can fail the whole step. A row that cannot be
/// deleted is logged and left for the next pass; a thumbnail that cannot be
/// deleted is left on disk, as is one another row still points at.
pub fn remove_orphans(conn: &Connection) -> Result<u64> {
    let mut removed = 0;

    for pair in schema::all_original_paths(conn)? {
        // Treat "can't tell" as present so a flaky mount never empties the catalog
        match Path::new(&pair.original_path).try_exists() {
            Ok(false) => {}
            Ok(true) => continue,
            Err(e) => {
                log::debug!("Could not check {}: {}", pair.original_path, e);
                continue;
            }
        }

        match schema::delete_entry(conn, &pair.original_path) {
            Ok(true) => {
                removed += 1;
                log::info!("Removed orphan {}", pair.original_path);
                match schema::thumbnail_owner(conn, &pair.thumbnail_path, &pair.original_path) {
                    Ok(None) => remove_thumbnail(&pair.thumbnail_path),
                    Ok(Some(owner)) => {
                        log::debug!("Keeping thumbnail {}, still used by {}", pair.thumbnail_path, owner)
                    }
                    Err(e) => log::debug!("Could not check users of {}: {}", pair.thumbnail_path, e),
                }
            }
            Ok(false) => {}
            Err(e) => log::warn!("Failed to remove orphan row {}: {}", pair.original_path, e),
        }
    }

    Ok(removed)
}

fn remove_thumbnail(thumbnail_path: &str) {
    if thumbnail_path.is_empty() {
        return;
    }
    if let Err(e) = std::fs::remove_file(thumbnail_path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::debug!("Left thumbnail {} behind: {}", thumbnail_path, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;
    use crate::db::schema::{MediaKind, NewEntry};
    use tempfile::TempDir;

    fn entry(original: &Path, thumb: &Path) -> NewEntry {
        NewEntry {
            original_path: original.to_string_lossy().to_string(),
            thumbnail_path: thumb.to_string_lossy().to_string(),
            folder: String::new(),
            filename: "x.jpg".to_string(),
            extension: ".jpg".to_string(),
            file_size: 1,
            mod_time: "2024-01-01T00:00:00.000000000Z".to_string(),
            width: 0,
            height: 0,
            media_type: MediaKind::Photo,
            duration: 0.0,
            video_codec: String::new(),
            audio_codec: String::new(),
            framerate: 0.0,
        }
    }

    #[test]
    fn test_only_missing_originals_are_removed() {
        let tmp = TempDir::new().unwrap();
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let present = tmp.path().join("present.jpg");
        let gone = tmp.path().join("gone.jpg");
        let present_thumb = tmp.path().join("present.thumb.jpg");
        let gone_thumb = tmp.path().join("gone.thumb.jpg");
        std::fs::write(&present, b"x").unwrap();
        std::fs::write(&present_thumb, b"t").unwrap();
        std::fs::write(&gone_thumb, b"t").unwrap();

        schema::upsert_entry(&conn, &entry(&present, &present_thumb)).unwrap();
        schema::upsert_entry(&conn, &entry(&gone, &gone_thumb)).unwrap();

        assert_eq!(remove_orphans(&conn).unwrap(), 1);
        assert!(schema::get_entry_by_path(&conn, present.to_str().unwrap()).unwrap().is_some());
        assert!(schema::get_entry_by_path(&conn, gone.to_str().unwrap()).unwrap().is_none());
        assert!(present_thumb.exists());
        assert!(!gone_thumb.exists());
    }

    #[test]
    fn test_shared_thumbnail_survives_its_orphan() {
        let tmp = TempDir::new().unwrap();
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let photo = tmp.path().join("IMG_1.jpg");
        let clip = tmp.path().join("IMG_1.mov");
        let shared = tmp.path().join("thumbs").join("IMG_1.jpg");
        std::fs::write(&photo, b"x").unwrap();
        std::fs::create_dir_all(shared.parent().unwrap()).unwrap();
        std::fs::write(&shared, b"t").unwrap();

        // Rows written before thumbnail names were disambiguated can share one
        schema::upsert_entry(&conn, &entry(&photo, &shared)).unwrap();
        schema::upsert_entry(&conn, &entry(&clip, &shared)).unwrap();

        assert_eq!(remove_orphans(&conn).unwrap(), 1);
        assert!(schema::get_entry_by_path(&conn, clip.to_str().unwrap()).unwrap().is_none());
        assert!(shared.exists());
    }

    #[test]
    fn test_missing_thumbnail_is_not_an_error() {
        let tmp = TempDir::new().unwrap();
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let gone = tmp.path().join("gone.jpg");
        schema::upsert_entry(&conn, &entry(&gone, &tmp.path().join("never-made.jpg"))).unwrap();

        assert_eq!(remove_orphans(&conn).unwrap(), 1);
        assert_eq!(remove_orphans(&conn).unwrap(), 0);
    }
}
