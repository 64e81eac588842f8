// Glimpse Constants

// Thumbnail settings
pub const THUMB_EXTENSION: &str = "jpg";
pub const THUMB_QUALITY: u32 = 85;
pub const THUMB_CONTENT_TYPE: &str = "image/jpeg";
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 800;

// Video poster frame position (fraction of duration)
pub const VIDEO_THUMB_SEEK_PERCENT: f64 = 0.1;

// Temp file naming for decoded RAW previews
pub const RAW_TEMP_PREFIX: &str = "glimpse-";

// Scanning
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_PASS_DEADLINE_SECS: u64 = 6 * 3600;
pub const SCHEDULER_TICK_MS: u64 = 500;

// Default config values
pub const DEFAULT_ORIGINALS_PATH: &str = "/pool/photos/originals";
pub const DEFAULT_THUMBNAILS_PATH: &str = "/pool/thumbnails";
pub const DEFAULT_DATABASE_PATH: &str = "/pool/thumbnails/glimpse.db";
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

// Database
pub const DB_BUSY_TIMEOUT_MS: u64 = 5000;

// HTTP
pub const CACHE_CONTROL: &str = "public, max-age=86400";
pub const API_KEY_HEADER: &str = "x-api-key";
pub const SHUTDOWN_GRACE_SECS: u64 = 30;
pub const DEFAULT_LIST_LIMIT: i64 = 100;
pub const MAX_LIST_LIMIT: i64 = 1000;
pub const OCTET_STREAM: &str = "application/octet-stream";

// Names starting with these prefixes are never indexed ("._" is the AppleDouble resource fork)
pub const HIDDEN_PREFIXES: [&str; 2] = [".", "._"];

// Standard (non-RAW) image extensions inside the image set
pub const STANDARD_IMAGE_EXTENSIONS: [&str; 5] = [".jpg", ".jpeg", ".png", ".tif", ".tiff"];

// Default image extension set (RAW + standard)
pub const DEFAULT_RAW_EXTENSIONS: [&str; 22] = [
    ".cr2", ".cr3", ".nef", ".nrw", ".arw", ".srf", ".sr2", ".orf", ".pef", ".raf",
    ".rw2", ".dng", ".raw", ".rwl", ".3fr", ".fff", ".iiq",
    ".jpg", ".jpeg", ".png", ".tif", ".tiff",
];

// Default video extension set
pub const DEFAULT_VIDEO_EXTENSIONS: [&str; 8] = [
    ".mp4", ".mov", ".mkv", ".avi", ".webm", ".m4v", ".wmv", ".flv",
];

// Video content types for range delivery
pub const VIDEO_CONTENT_TYPES: [(&str, &str); 8] = [
    (".mp4", "video/mp4"),
    (".m4v", "video/mp4"),
    (".mov", "video/quicktime"),
    (".webm", "video/webm"),
    (".mkv", "video/x-matroska"),
    (".avi", "video/x-msvideo"),
    (".wmv", "video/x-ms-wmv"),
    (".flv", "video/x-flv"),
];
