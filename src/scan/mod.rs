// Synchronization engine
//
// One pass = reconcile orphans, walk the originals tree, derive and upsert
// anything new or changed. Only one pass may run at a time; a second request
// is turned away instead of queued.

pub mod classify;
pub mod reconcile;
pub mod scheduler;


use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;
use serde::Serialize;
use walkdir::{DirEntry, WalkDir};

use crate::config::Config;
use crate::db::{self, schema};
use crate::error::{GlimpseError, Result};
use crate::preview::{Deriver, ThumbnailLayout, ToolDeriver};
use crate::tools::Toolbox;
use classify::{is_hidden_name, lowercase_extension, Classifier};

/// What happened to a single file during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Derived and written to the catalog
    Indexed,
    /// Catalog already matches the file on disk
    Unchanged,
    /// Not something we index (hidden, unsupported, RAW companion, odd name)
    Skipped,
    Failed(String),
}

/// Counters for one completed pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub started_at: String,
    pub finished_at: String,
    pub seen: u64,
    pub indexed: u64,
    pub unchanged: u64,
    pub skipped: u64,
    pub failed: u64,
    pub orphans_removed: u64,
    pub deadline_hit: bool,
}

impl PassSummary {
    fn record(&mut self, outcome: &FileOutcome) {
        self.seen += 1;
        match outcome {
            FileOutcome::Indexed => self.indexed += 1,
            FileOutcome::Unchanged => self.unchanged += 1,
            FileOutcome::Skipped => self.skipped += 1,
            FileOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Result of asking for a background pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Started,
    AlreadyRunning,
}

/// Snapshot for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct ScanStatus {
    pub running: bool,
    pub last_pass: Option<PassSummary>,
}

/// Holds the single-flight flag for the lifetime of a pass.
/// Dropping it (normal return, error or panic) clears the flag.
struct RunGuard {
    flag: Arc<AtomicBool>,
}

impl RunGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard { flag: Arc::clone(flag) })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct Scanner {
    originals_root: PathBuf,
    thumbnails_root: PathBuf,
    database_path: PathBuf,
    deadline: Option<Duration>,
    classifier: Classifier,
    layout: ThumbnailLayout,
    deriver: Arc<dyn Deriver>,
    running: Arc<AtomicBool>,
    last_pass: Mutex<Option<PassSummary>>,
}

impl Scanner {
    /// Scanner wired to the real external tools.
    pub fn from_config(config: &Config) -> Self {
        let deriver = ToolDeriver::new(Toolbox::from_config(config), config.thumbnail_size);
        Self::with_deriver(config, Arc::new(deriver))
    }

    pub fn with_deriver(config: &Config, deriver: Arc<dyn Deriver>) -> Self {
        Self {
            originals_root: config.originals_path.clone(),
            thumbnails_root: config.thumbnails_path.clone(),
            database_path: config.database_path.clone(),
            deadline: config.pass_deadline(),
            classifier: Classifier::new(&config.raw_extensions, &config.video_extensions),
            layout: ThumbnailLayout::new(&config.originals_path, &config.thumbnails_path),
            deriver,
            running: Arc::new(AtomicBool::new(false)),
            last_pass: Mutex::new(None),
        }
    }

    /// Override the pass deadline (`None` = unbounded).
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn last_pass(&self) -> Option<PassSummary> {
        self.last_pass
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn status(&self) -> ScanStatus {
        ScanStatus {
            running: self.is_running(),
            last_pass: self.last_pass(),
        }
    }

    /// Run a pass on the calling thread.
    ///
    /// Fails with `ScanAlreadyRunning` if another pass holds the flag.
    pub fn run_pass(&self) -> Result<PassSummary> {
        let guard = RunGuard::acquire(&self.running).ok_or(GlimpseError::ScanAlreadyRunning)?;
        let result = self.execute_pass();
        drop(guard);
        result
    }

    /// Start a pass on a background thread without waiting for it.
    pub fn try_start(self: &Arc<Self>) -> Result<TriggerOutcome> {
        let guard = match RunGuard::acquire(&self.running) {
            Some(g) => g,
            None => return Ok(TriggerOutcome::AlreadyRunning),
        };

        let scanner = Arc::clone(self);
        std::thread::Builder::new()
            .name("scan-pass".into())
            .spawn(move || {
                let _guard = guard;
                if let Err(e) = scanner.execute_pass() {
                    log::error!("Triggered scan failed: {}", e);
                }
            })?;

        Ok(TriggerOutcome::Started)
    }

    fn execute_pass(&self) -> Result<PassSummary> {
        let clock = Instant::now();
        let mut summary = PassSummary {
            started_at: now_rfc3339(),
            ..Default::default()
        };
        log::info!("Scan pass starting over {}", self.originals_root.display());

        self.check_roots()?;
        let conn = db::open_db(&self.database_path)?;

        summary.orphans_removed = match reconcile::remove_orphans(&conn) {
            Ok(n) => n,
            Err(e) => {
                log::warn!("Orphan reconciliation failed: {}", e);
                0
            }
        };

        let walker = WalkDir::new(&self.originals_root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden_entry(e));

        for entry in walker {
            if let Some(limit) = self.deadline {
                if clock.elapsed() >= limit {
                    log::warn!("Scan pass hit its {}s deadline, stopping walk", limit.as_secs());
                    summary.deadline_hit = true;
                    break;
                }
            }

            let entry = match entry {
                Ok(e) => e,
                Err(e) if e.depth() == 0 => {
                    return Err(GlimpseError::RootUnavailable(format!(
                        "{}: {}",
                        self.originals_root.display(),
                        e
                    )));
                }
                Err(e) => {
                    log::warn!("Walk error: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let outcome = self.process_file(&conn, entry.path());
            if let FileOutcome::Failed(ref reason) = outcome {
                log::warn!("Failed to index {}: {}", entry.path().display(), reason);
            }
            summary.record(&outcome);
        }

        summary.finished_at = now_rfc3339();
        log::info!(
            "Scan pass done in {:.1}s: {} seen, {} indexed, {} unchanged, {} skipped, {} failed, {} orphans removed",
            clock.elapsed().as_secs_f64(),
            summary.seen,
            summary.indexed,
            summary.unchanged,
            summary.skipped,
            summary.failed,
            summary.orphans_removed
        );

        *self
            .last_pass
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(summary.clone());
        Ok(summary)
    }

    /// The originals root must be a readable directory and the thumbnail root
    /// must exist. Reconciling against a missing root would empty the catalog.
    fn check_roots(&self) -> Result<()> {
        let meta = std::fs::metadata(&self.originals_root).map_err(|e| {
            GlimpseError::RootUnavailable(format!("{}: {}", self.originals_root.display(), e))
        })?;
        if !meta.is_dir() {
            return Err(GlimpseError::RootUnavailable(format!(
                "{} is not a directory",
                self.originals_root.display()
            )));
        }

        std::fs::create_dir_all(&self.thumbnails_root).map_err(|e| {
            GlimpseError::RootUnavailable(format!("{}: {}", self.thumbnails_root.display(), e))
        })?;
        Ok(())
    }

    /// Index one file, turning any error into a `Failed` outcome.
    pub fn process_file(&self, conn: &Connection, path: &Path) -> FileOutcome {
        match self.index_file(conn, path) {
            Ok(outcome) => outcome,
            Err(e) => FileOutcome::Failed(e.to_string()),
        }
    }

    fn index_file(&self, conn: &Connection, path: &Path) -> Result<FileOutcome> {
        let path_str = match path.to_str() {
            Some(s) => s,
            None => {
                log::warn!("Skipping non-UTF-8 path {}", path.display());
                return Ok(FileOutcome::Skipped);
            }
        };

        let classification = match self.classifier.classify_for_index(path) {
            Some(c) => c,
            None => return Ok(FileOutcome::Skipped),
        };
        let media_type = match classification.media_kind() {
            Some(k) => k,
            None => return Ok(FileOutcome::Skipped),
        };

        let meta = std::fs::metadata(path)?;
        let mod_time = schema::format_timestamp(meta.modified()?);
        let file_size = meta.len() as i64;

        if let Some(thumbnail) = schema::fresh_thumbnail(conn, path_str, &mod_time, file_size)? {
            if Path::new(&thumbnail).exists() {
                return Ok(FileOutcome::Unchanged);
            }
            log::info!("Thumbnail {} is missing, re-deriving {}", thumbnail, path.display());
        }

        let thumbnail_path = self.choose_thumbnail(conn, path, path_str)?;
        log::debug!("Deriving {} -> {}", path.display(), thumbnail_path.display());
        let derived = self.deriver.derive(path, &thumbnail_path, classification)?;
        let video = derived.video.unwrap_or_default();

        let entry = schema::NewEntry {
            original_path: path_str.to_string(),
            thumbnail_path: derived.thumbnail_path.to_string_lossy().to_string(),
            folder: self.layout.folder_for(path)?,
            filename: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            extension: lowercase_extension(path).unwrap_or_default(),
            file_size,
            mod_time,
            width: derived.dimensions.width,
            height: derived.dimensions.height,
            media_type,
            duration: video.duration,
            video_codec: video.video_codec,
            audio_codec: video.audio_codec,
            framerate: video.framerate,
        };
        schema::upsert_entry(conn, &entry)?;

        Ok(FileOutcome::Indexed)
    }

    /// Where this original's thumbnail goes. A row keeps the path it already
    /// has; otherwise the mirrored name is used unless another row claims it,
    /// in which case the full original file name is kept.
    fn choose_thumbnail(&self, conn: &Connection, path: &Path, path_str: &str) -> Result<PathBuf> {
        let current = schema::get_entry_by_path(conn, path_str)?
            .map(|e| PathBuf::from(e.thumbnail_path))
            .filter(|p| !p.as_os_str().is_empty());

        let candidates = current
            .into_iter()
            .chain([self.layout.thumbnail_for(path)?, self.layout.full_name_thumbnail_for(path)?]);

        for candidate in candidates {
            let candidate_str = candidate.to_string_lossy().into_owned();
            match schema::thumbnail_owner(conn, &candidate_str, path_str)? {
                None => return Ok(candidate),
                Some(owner) => log::debug!("{} is taken by {}", candidate_str, owner),
            }
        }

        Err(GlimpseError::Derivation(format!(
            "no free thumbnail name for {}",
            path.display()
        )))
    }
}

fn is_hidden_entry(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(is_hidden_name)
        .unwrap_or(false)
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
