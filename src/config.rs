// Configuration loading
//
// The config file is JSON. A missing file means "all defaults"; zero or empty
// fields in a present file are filled from defaults after parsing.

use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_DATABASE_PATH, DEFAULT_LISTEN_ADDR, DEFAULT_LOG_LEVEL, DEFAULT_ORIGINALS_PATH,
    DEFAULT_PASS_DEADLINE_SECS, DEFAULT_RAW_EXTENSIONS, DEFAULT_SCAN_INTERVAL_SECS,
    DEFAULT_THUMBNAILS_PATH, DEFAULT_THUMBNAIL_SIZE, DEFAULT_TOOL_TIMEOUT_SECS,
    DEFAULT_VIDEO_EXTENSIONS,
};
use crate::error::{GlimpseError, Result};

/// Explicit locations for the external tools. Unset entries fall back to PATH.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolPaths {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dcraw: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convert: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identify: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ffprobe: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ffmpeg: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub originals_path: PathBuf,
    #[serde(default)]
    pub thumbnails_path: PathBuf,
    #[serde(default)]
    pub database_path: PathBuf,
    #[serde(default)]
    pub listen_addr: String,
    #[serde(default)]
    pub scan_interval_seconds: u64,
    #[serde(default)]
    pub thumbnail_size: u32,
    #[serde(default)]
    pub raw_extensions: Vec<String>,
    #[serde(default)]
    pub video_extensions: Vec<String>,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub tool_timeout_seconds: u64,
    /// `None` means the default deadline; `Some(0)` disables it.
    #[serde(default)]
    pub pass_deadline_seconds: Option<u64>,
    #[serde(default)]
    pub log_level: String,
    #[serde(default)]
    pub tools: ToolPaths,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            originals_path: PathBuf::from(DEFAULT_ORIGINALS_PATH),
            thumbnails_path: PathBuf::from(DEFAULT_THUMBNAILS_PATH),
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            scan_interval_seconds: DEFAULT_SCAN_INTERVAL_SECS,
            thumbnail_size: DEFAULT_THUMBNAIL_SIZE,
            raw_extensions: DEFAULT_RAW_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            video_extensions: DEFAULT_VIDEO_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            api_key: String::new(),
            tool_timeout_seconds: DEFAULT_TOOL_TIMEOUT_SECS,
            pass_deadline_seconds: Some(DEFAULT_PASS_DEADLINE_SECS),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            tools: ToolPaths::default(),
        }
    }
}

impl Config {
    /// Load a config file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let data = match std::fs::read_to_string(path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        Self::from_json(&data)
    }

    /// Parse a config from JSON text and apply defaults.
    pub fn from_json(data: &str) -> Result<Self> {
        let parsed: Config = serde_json::from_str(data)
            .map_err(|e| GlimpseError::Config(format!("Invalid config: {}", e)))?;
        Ok(parsed.with_defaults())
    }

    fn with_defaults(mut self) -> Self {
        let defaults = Self::default();

        if self.originals_path.as_os_str().is_empty() {
            self.originals_path = defaults.originals_path;
        }
        if self.thumbnails_path.as_os_str().is_empty() {
            self.thumbnails_path = defaults.thumbnails_path;
        }
        if self.database_path.as_os_str().is_empty() {
            self.database_path = defaults.database_path;
        }
        if self.listen_addr.is_empty() {
            self.listen_addr = defaults.listen_addr;
        }
        if self.scan_interval_seconds == 0 {
            self.scan_interval_seconds = defaults.scan_interval_seconds;
        }
        if self.thumbnail_size == 0 {
            self.thumbnail_size = defaults.thumbnail_size;
        }
        if self.raw_extensions.is_empty() {
            self.raw_extensions = defaults.raw_extensions;
        }
        if self.video_extensions.is_empty() {
            self.video_extensions = defaults.video_extensions;
        }
        if self.tool_timeout_seconds == 0 {
            self.tool_timeout_seconds = defaults.tool_timeout_seconds;
        }
        if self.pass_deadline_seconds.is_none() {
            self.pass_deadline_seconds = defaults.pass_deadline_seconds;
        }
        if self.log_level.is_empty() {
            self.log_level = defaults.log_level;
        }

        self.raw_extensions = normalize_extensions(&self.raw_extensions);
        self.video_extensions = normalize_extensions(&self.video_extensions);
        self
    }

    /// Write this config as pretty JSON, e.g. as a starting point for editing.
    pub fn save_example(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_seconds)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_seconds)
    }

    pub fn pass_deadline(&self) -> Option<Duration> {
        match self.pass_deadline_seconds {
            Some(0) | None => None,
            Some(secs) => Some(Duration::from_secs(secs)),
        }
    }

    /// Bind address with the `:8080` shorthand expanded to all interfaces.
    pub fn bind_addr(&self) -> String {
        if self.listen_addr.starts_with(':') {
            format!("0.0.0.0{}", self.listen_addr)
        } else {
            self.listen_addr.clone()
        }
    }
}

/// Lowercase each extension and make sure it carries a leading dot.
pub fn normalize_extensions(exts: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(exts.len());
    for ext in exts {
        let trimmed = ext.trim().to_lowercase();
        if trimmed.is_empty() {
            continue;
        }
        let normalized = if trimmed.starts_with('.') {
            trimmed
        } else {
            format!(".{}", trimmed)
        };
        if !out.contains(&normalized) {
            out.push(normalized);
        }
    }
    out
}
