// Metadata extraction module
//
// Thin wrappers around the external reporters: ffprobe for video, dcraw's
// verbose identify mode for RAW sizes, ImageMagick identify for other images.

pub mod ffprobe;
pub mod raw;
pub mod image;

use serde::{Deserialize, Serialize};

/// Video attributes. Zero/empty means "not determined".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub duration: f64,
    pub video_codec: String,
    pub audio_codec: String,
    pub framerate: f64,
    pub width: i64,
    pub height: i64,
}

/// Pixel dimensions. (0, 0) means "not determined".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: i64,
    pub height: i64,
}

impl Dimensions {
    pub fn new(width: i64, height: i64) -> Self {
        Self { width, height }
    }
}
