// File classification for the scanner
//
// Decides, from a file name alone, whether a file is indexed and how. The only
// filesystem access is the RAW companion probe for standard images.

use std::path::Path;

use crate::constants::{HIDDEN_PREFIXES, STANDARD_IMAGE_EXTENSIONS};
use crate::db::schema::MediaKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Hidden or resource-fork file, never looked at
    Ignore,
    Raw,
    StandardImage,
    Video,
    Unsupported,
}

impl Classification {
    pub fn media_kind(&self) -> Option<MediaKind> {
        match self {
            Classification::Raw | Classification::StandardImage => Some(MediaKind::Photo),
            Classification::Video => Some(MediaKind::Video),
            Classification::Ignore | Classification::Unsupported => None,
        }
    }
}

/// Extension sets the classifier matches against (lowercase, leading dot).
#[derive(Debug, Clone)]
pub struct Classifier {
    image_extensions: Vec<String>,
    video_extensions: Vec<String>,
}

impl Classifier {
    pub fn new(image_extensions: &[String], video_extensions: &[String]) -> Self {
        Self {
            image_extensions: crate::config::normalize_extensions(image_extensions),
            video_extensions: crate::config::normalize_extensions(video_extensions),
        }
    }

    pub fn classify(&self, path: &Path) -> Classification {
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n,
            None => return Classification::Unsupported,
        };

        if is_hidden_name(name) {
            return Classification::Ignore;
        }

        let ext = match lowercase_extension(path) {
            Some(e) => e,
            None => return Classification::Unsupported,
        };

        if self.image_extensions.contains(&ext) {
            if is_standard_image_extension(&ext) {
                Classification::StandardImage
            } else {
                Classification::Raw
            }
        } else if self.video_extensions.contains(&ext) {
            Classification::Video
        } else {
            Classification::Unsupported
        }
    }

    /// RAW extensions in the configured image set.
    pub fn raw_extensions(&self) -> impl Iterator<Item = &str> {
        self.image_extensions
            .iter()
            .map(|e| e.as_str())
            .filter(|e| !is_standard_image_extension(e))
    }

    /// Find a RAW file next to `path` with the same stem. Both lowercase and
    /// uppercase spellings of each RAW extension are probed.
    pub fn raw_companion(&self, path: &Path) -> Option<std::path::PathBuf> {
        let stem = path.file_stem().and_then(|s| s.to_str())?;
        let parent = path.parent()?;

        for ext in self.raw_extensions() {
            let bare = ext.trim_start_matches('.');
            for candidate_ext in [bare.to_string(), bare.to_uppercase()] {
                let candidate = parent.join(format!("{}.{}", stem, candidate_ext));
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }

        None
    }

    /// Classify and apply the companion rule: a standard image shadowed by a
    /// RAW sibling is reported as `None` (not indexed).
    pub fn classify_for_index(&self, path: &Path) -> Option<Classification> {
        match self.classify(path) {
            Classification::Ignore | Classification::Unsupported => None,
            Classification::StandardImage => {
                if let Some(raw) = self.raw_companion(path) {
                    log::debug!("Skipping {} (RAW companion {})", path.display(), raw.display());
                    None
                } else {
                    Some(Classification::StandardImage)
                }
            }
            other => Some(other),
        }
    }
}

pub fn is_hidden_name(name: &str) -> bool {
    HIDDEN_PREFIXES.iter().any(|p| name.starts_with(p))
}

pub fn is_standard_image_extension(ext: &str) -> bool {
    STANDARD_IMAGE_EXTENSIONS.contains(&ext)
}

/// Lowercase extension with its leading dot, e.g. ".cr2".
pub fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| format!(".{}", e.to_lowercase()))
}
