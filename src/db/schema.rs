// Catalog schema types and query helpers

use std::str::FromStr;
use std::time::SystemTime;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::{DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT};
use crate::error::Result;

// ----- Media kind -----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "photo" => Some(MediaKind::Photo),
            "video" => Some(MediaKind::Video),
            _ => None,
        }
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        MediaKind::parse(s).ok_or_else(|| format!("unknown media type '{}'", s))
    }
}

impl ToSql for MediaKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for MediaKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        MediaKind::parse(s).ok_or_else(|| FromSqlError::Other(format!("unknown media type '{}'", s).into()))
    }
}

/// Format a filesystem timestamp the way the catalog stores it.
/// Fixed nanosecond precision keeps equality exact and ordering lexicographic.
pub fn format_timestamp(t: SystemTime) -> String {
    let dt: DateTime<Utc> = t.into();
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

// ----- Catalog entry -----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: i64,
    pub original_path: String,
    pub thumbnail_path: String,
    pub folder: String,
    pub filename: String,
    pub extension: String,
    pub file_size: i64,
    pub mod_time: String,
    pub width: i64,
    pub height: i64,
    pub created_at: String,
    pub media_type: MediaKind,
    pub duration: f64,
    pub video_codec: String,
    pub audio_codec: String,
    pub framerate: f64,
}

/// Row written by a scan pass. Zero/empty derived fields mean "not determined".
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub original_path: String,
    pub thumbnail_path: String,
    pub folder: String,
    pub filename: String,
    pub extension: String,
    pub file_size: i64,
    pub mod_time: String,
    pub width: i64,
    pub height: i64,
    pub media_type: MediaKind,
    pub duration: f64,
    pub video_codec: String,
    pub audio_codec: String,
    pub framerate: f64,
}

const ENTRY_COLUMNS: &str = "id, original_path, thumbnail_path, folder, filename, extension, file_size, \
     mod_time, width, height, created_at, media_type, duration, video_codec, audio_codec, framerate";

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<CatalogEntry> {
    Ok(CatalogEntry {
        id: row.get(0)?,
        original_path: row.get(1)?,
        thumbnail_path: row.get(2)?,
        folder: row.get(3)?,
        filename: row.get(4)?,
        extension: row.get(5)?,
        file_size: row.get(6)?,
        mod_time: row.get(7)?,
        width: row.get(8)?,
        height: row.get(9)?,
        created_at: row.get(10)?,
        media_type: row.get(11)?,
        duration: row.get(12)?,
        video_codec: row.get(13)?,
        audio_codec: row.get(14)?,
        framerate: row.get(15)?,
    })
}

/// Insert a new entry or update the existing row for the same original path.
/// `created_at` and `id` are never touched by the update branch.
pub fn upsert_entry(conn: &Connection, entry: &NewEntry) -> Result<i64> {
    let id = conn.query_row(
        r#"INSERT INTO photos
           (original_path, thumbnail_path, folder, filename, extension, file_size, mod_time,
            width, height, media_type, duration, video_codec, audio_codec, framerate)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
           ON CONFLICT(original_path) DO UPDATE SET
               thumbnail_path = excluded.thumbnail_path,
               folder = excluded.folder,
               filename = excluded.filename,
               extension = excluded.extension,
               file_size = excluded.file_size,
               mod_time = excluded.mod_time,
               width = excluded.width,
               height = excluded.height,
               media_type = excluded.media_type,
               duration = excluded.duration,
               video_codec = excluded.video_codec,
               audio_codec = excluded.audio_codec,
               framerate = excluded.framerate
           RETURNING id"#,
        params![
            entry.original_path,
            entry.thumbnail_path,
            entry.folder,
            entry.filename,
            entry.extension,
            entry.file_size,
            entry.mod_time,
            entry.width,
            entry.height,
            entry.media_type,
            entry.duration,
            entry.video_codec,
            entry.audio_codec,
            entry.framerate,
        ],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Thumbnail path of the row for `path` if it already carries this exact
/// fingerprint, `None` when the row is missing or out of date.
pub fn fresh_thumbnail(conn: &Connection, path: &str, mod_time: &str, file_size: i64) -> Result<Option<String>> {
    let thumbnail = conn
        .query_row(
            "SELECT thumbnail_path FROM photos WHERE original_path = ?1 AND mod_time = ?2 AND file_size = ?3",
            params![path, mod_time, file_size],
            |row| row.get(0),
        )
        .optional()?;
    Ok(thumbnail)
}

/// Original path of some row other than `except` that uses this thumbnail.
pub fn thumbnail_owner(conn: &Connection, thumbnail_path: &str, except: &str) -> Result<Option<String>> {
    let owner = conn
        .query_row(
            "SELECT original_path FROM photos WHERE thumbnail_path = ?1 AND original_path != ?2 LIMIT 1",
            params![thumbnail_path, except],
            |row| row.get(0),
        )
        .optional()?;
    Ok(owner)
}

pub fn get_entry(conn: &Connection, id: i64) -> Result<Option<CatalogEntry>> {
    let result = conn
        .query_row(
            &format!("SELECT {} FROM photos WHERE id = ?1", ENTRY_COLUMNS),
            params![id],
            entry_from_row,
        )
        .optional()?;
    Ok(result)
}

pub fn get_entry_by_path(conn: &Connection, path: &str) -> Result<Option<CatalogEntry>> {
    let result = conn
        .query_row(
            &format!("SELECT {} FROM photos WHERE original_path = ?1", ENTRY_COLUMNS),
            params![path],
            entry_from_row,
        )
        .optional()?;
    Ok(result)
}

/// Delete the row for an original path. Returns whether a row was removed.
pub fn delete_entry(conn: &Connection, path: &str) -> Result<bool> {
    let changed = conn.execute("DELETE FROM photos WHERE original_path = ?1", params![path])?;
    Ok(changed > 0)
}

/// (original path, thumbnail path) pair, as consumed by orphan reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPair {
    pub original_path: String,
    pub thumbnail_path: String,
}

pub fn all_original_paths(conn: &Connection) -> Result<Vec<PathPair>> {
    let mut stmt = conn.prepare("SELECT original_path, thumbnail_path FROM photos")?;
    let pairs = stmt
        .query_map([], |row| {
            Ok(PathPair {
                original_path: row.get(0)?,
                thumbnail_path: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(pairs)
}

// ----- Listing -----

/// Query-string filter. Empty or unparseable values fall back to defaults
/// instead of rejecting the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListFilter {
    /// Folder and all of its descendants; empty means everything.
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub media_type: Option<MediaKind>,
    #[serde(default, deserialize_with = "lenient")]
    pub limit: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub offset: Option<i64>,
}

fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.trim().parse().ok()))
}

impl ListFilter {
    /// Limit clamped to 1..=1000, defaulting to 100 when absent or out of range.
    pub fn effective_limit(&self) -> i64 {
        match self.limit {
            Some(l) if l > 0 && l <= MAX_LIST_LIMIT => l,
            _ => DEFAULT_LIST_LIMIT,
        }
    }

    pub fn effective_offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// Escape LIKE wildcards so folder names are matched literally.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// List entries, newest modification first.
pub fn list_entries(conn: &Connection, filter: &ListFilter) -> Result<Vec<CatalogEntry>> {
    let mut conditions: Vec<&str> = Vec::new();
    let mut args: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(folder) = filter.folder.as_deref().filter(|f| !f.is_empty()) {
        conditions.push("(folder = ? OR folder LIKE ? ESCAPE '\\')");
        args.push(Box::new(folder.to_string()));
        args.push(Box::new(format!("{}/%", escape_like(folder))));
    }
    if let Some(kind) = filter.media_type {
        conditions.push("media_type = ?");
        args.push(Box::new(kind));
    }

    let mut sql = format!("SELECT {} FROM photos", ENTRY_COLUMNS);
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    sql.push_str(" ORDER BY mod_time DESC, id DESC LIMIT ? OFFSET ?");
    args.push(Box::new(filter.effective_limit()));
    args.push(Box::new(filter.effective_offset()));

    let mut stmt = conn.prepare(&sql)?;
    let entries = stmt
        .query_map(rusqlite::params_from_iter(args.iter()), entry_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(entries)
}

// ----- Folders and stats -----

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderCount {
    pub path: String,
    pub photo_count: i64,
}

pub fn list_folders(conn: &Connection) -> Result<Vec<FolderCount>> {
    let mut stmt = conn.prepare(
        "SELECT folder, COUNT(*) FROM photos GROUP BY folder ORDER BY folder",
    )?;
    let folders = stmt
        .query_map([], |row| {
            Ok(FolderCount {
                path: row.get(0)?,
                photo_count: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(folders)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogStats {
    pub total_photos: i64,
    pub total_videos: i64,
    pub total_folders: i64,
    pub total_original_mb: i64,
}

pub fn get_stats(conn: &Connection) -> Result<CatalogStats> {
    let stats = conn.query_row(
        r#"SELECT
               COALESCE(SUM(media_type = 'photo'), 0),
               COALESCE(SUM(media_type = 'video'), 0),
               COUNT(DISTINCT folder),
               COALESCE(SUM(file_size), 0) / 1048576
           FROM photos"#,
        [],
        |row| {
            Ok(CatalogStats {
                total_photos: row.get(0)?,
                total_videos: row.get(1)?,
                total_folders: row.get(2)?,
                total_original_mb: row.get(3)?,
            })
        },
    )?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::migrations::run_migrations(&conn).unwrap();
        conn
    }

    fn sample(path: &str, folder: &str, mod_time: &str, kind: MediaKind) -> NewEntry {
        let filename = path.rsplit('/').next().unwrap().to_string();
        NewEntry {
            original_path: path.to_string(),
            thumbnail_path: format!("/thumbs/{}.jpg", filename),
            folder: folder.to_string(),
            filename,
            extension: ".cr2".to_string(),
            file_size: 2 * 1048576,
            mod_time: mod_time.to_string(),
            width: 6000,
            height: 4000,
            media_type: kind,
            duration: 0.0,
            video_codec: String::new(),
            audio_codec: String::new(),
            framerate: 0.0,
        }
    }

    #[test]
    fn test_upsert_updates_in_place() {
        let conn = setup_test_db();
        let first = sample("/o/a.cr2", "", "2024-01-01T00:00:00.000000000Z", MediaKind::Photo);
        let id = upsert_entry(&conn, &first).unwrap();
        let created = get_entry(&conn, id).unwrap().unwrap().created_at;

        let mut second = first.clone();
        second.mod_time = "2024-02-01T00:00:00.000000000Z".to_string();
        second.width = 100;
        let id2 = upsert_entry(&conn, &second).unwrap();

        assert_eq!(id, id2);
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM photos", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 1);

        let row = get_entry_by_path(&conn, "/o/a.cr2").unwrap().unwrap();
        assert_eq!(row.width, 100);
        assert_eq!(row.mod_time, second.mod_time);
        assert_eq!(row.created_at, created);
    }

    #[test]
    fn test_freshness_requires_exact_fingerprint() {
        let conn = setup_test_db();
        let e = sample("/o/a.cr2", "", "2024-01-01T00:00:00.000000000Z", MediaKind::Photo);
        upsert_entry(&conn, &e).unwrap();

        assert_eq!(
            fresh_thumbnail(&conn, "/o/a.cr2", &e.mod_time, e.file_size).unwrap(),
            Some(e.thumbnail_path.clone())
        );
        assert!(fresh_thumbnail(&conn, "/o/a.cr2", "2024-01-01T00:00:00.000000001Z", e.file_size)
            .unwrap()
            .is_none());
        assert!(fresh_thumbnail(&conn, "/o/a.cr2", &e.mod_time, e.file_size + 1).unwrap().is_none());
        assert!(fresh_thumbnail(&conn, "/o/b.cr2", &e.mod_time, e.file_size).unwrap().is_none());
    }

    #[test]
    fn test_thumbnail_owner_ignores_the_asking_row() {
        let conn = setup_test_db();
        let mut a = sample("/o/a.jpg", "", "t1", MediaKind::Photo);
        a.thumbnail_path = "/thumbs/a.jpg".to_string();
        upsert_entry(&conn, &a).unwrap();

        assert_eq!(thumbnail_owner(&conn, "/thumbs/a.jpg", "/o/a.jpg").unwrap(), None);
        assert_eq!(
            thumbnail_owner(&conn, "/thumbs/a.jpg", "/o/a.mov").unwrap(),
            Some("/o/a.jpg".to_string())
        );
        assert_eq!(thumbnail_owner(&conn, "/thumbs/b.jpg", "/o/a.mov").unwrap(), None);
    }

    #[test]
    fn test_delete_and_path_pairs() {
        let conn = setup_test_db();
        upsert_entry(&conn, &sample("/o/a.cr2", "", "t1", MediaKind::Photo)).unwrap();
        upsert_entry(&conn, &sample("/o/b.cr2", "", "t2", MediaKind::Photo)).unwrap();

        assert_eq!(all_original_paths(&conn).unwrap().len(), 2);
        assert!(delete_entry(&conn, "/o/a.cr2").unwrap());
        assert!(!delete_entry(&conn, "/o/a.cr2").unwrap());

        let pairs = all_original_paths(&conn).unwrap();
        assert_eq!(pairs, vec![PathPair {
            original_path: "/o/b.cr2".to_string(),
            thumbnail_path: "/thumbs/b.cr2.jpg".to_string(),
        }]);
    }

    #[test]
    fn test_list_filters_and_order() {
        let conn = setup_test_db();
        upsert_entry(&conn, &sample("/o/2023/a.cr2", "2023", "2023-01-01", MediaKind::Photo)).unwrap();
        upsert_entry(&conn, &sample("/o/2023/trip/b.cr2", "2023/trip", "2023-06-01", MediaKind::Photo)).unwrap();
        upsert_entry(&conn, &sample("/o/2023_x/c.mp4", "2023_x", "2023-07-01", MediaKind::Video)).unwrap();
        upsert_entry(&conn, &sample("/o/d.cr2", "", "2024-01-01", MediaKind::Photo)).unwrap();

        let all = list_entries(&conn, &ListFilter::default()).unwrap();
        let names: Vec<_> = all.iter().map(|e| e.filename.as_str()).collect();
        assert_eq!(names, vec!["d.cr2", "c.mp4", "b.cr2", "a.cr2"]);

        let in_2023 = list_entries(&conn, &ListFilter {
            folder: Some("2023".to_string()),
            ..Default::default()
        }).unwrap();
        let names: Vec<_> = in_2023.iter().map(|e| e.filename.as_str()).collect();
        assert_eq!(names, vec!["b.cr2", "a.cr2"]);

        let videos = list_entries(&conn, &ListFilter {
            media_type: Some(MediaKind::Video),
            ..Default::default()
        }).unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].media_type, MediaKind::Video);

        let paged = list_entries(&conn, &ListFilter {
            limit: Some(1),
            offset: Some(1),
            ..Default::default()
        }).unwrap();
        assert_eq!(paged.len(), 1);
        assert_eq!(paged[0].filename, "c.mp4");
    }

    #[test]
    fn test_list_limit_clamping() {
        let f = ListFilter { limit: Some(5000), offset: Some(-3), ..Default::default() };
        assert_eq!(f.effective_limit(), DEFAULT_LIST_LIMIT);
        assert_eq!(f.effective_offset(), 0);
        let f = ListFilter { limit: Some(0), ..Default::default() };
        assert_eq!(f.effective_limit(), DEFAULT_LIST_LIMIT);
        let f = ListFilter { limit: Some(1000), ..Default::default() };
        assert_eq!(f.effective_limit(), 1000);
    }

    #[test]
    fn test_filter_ignores_blank_and_garbage_values() {
        let f: ListFilter =
            serde_json::from_str(r#"{"media_type":"","limit":"abc","offset":" 20 "}"#).unwrap();
        assert_eq!(f.media_type, None);
        assert_eq!(f.effective_limit(), DEFAULT_LIST_LIMIT);
        assert_eq!(f.effective_offset(), 20);

        let f: ListFilter = serde_json::from_str(r#"{"media_type":"video","limit":"7"}"#).unwrap();
        assert_eq!(f.media_type, Some(MediaKind::Video));
        assert_eq!(f.effective_limit(), 7);

        let f: ListFilter = serde_json::from_str(r#"{"media_type":"gif"}"#).unwrap();
        assert_eq!(f.media_type, None);
    }

    #[test]
    fn test_folders_and_stats() {
        let conn = setup_test_db();
        upsert_entry(&conn, &sample("/o/x/a.cr2", "x", "t1", MediaKind::Photo)).unwrap();
        upsert_entry(&conn, &sample("/o/x/b.cr2", "x", "t2", MediaKind::Photo)).unwrap();
        upsert_entry(&conn, &sample("/o/c.mp4", "", "t3", MediaKind::Video)).unwrap();

        let folders = list_folders(&conn).unwrap();
        assert_eq!(folders, vec![
            FolderCount { path: String::new(), photo_count: 1 },
            FolderCount { path: "x".to_string(), photo_count: 2 },
        ]);

        let stats = get_stats(&conn).unwrap();
        assert_eq!(stats, CatalogStats {
            total_photos: 2,
            total_videos: 1,
            total_folders: 2,
            total_original_mb: 6,
        });
    }

    #[test]
    fn test_empty_stats() {
        let conn = setup_test_db();
        assert_eq!(get_stats(&conn).unwrap(), CatalogStats::default());
    }

    #[test]
    fn test_format_timestamp_is_fixed_width() {
        let t = SystemTime::UNIX_EPOCH + std::time::Duration::new(1_700_000_000, 5);
        assert_eq!(format_timestamp(t), "2023-11-14T22:13:20.000000005Z");
    }
}
