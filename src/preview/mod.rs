// Derivation pipeline
//
// Turns an original into a thumbnail plus whatever attributes the external
// reporters can tell us about it:
// - Standard images: resize with ImageMagick, dimensions from identify
// - RAW: embedded preview (or half-size decode) via dcraw, then resize
// - Video: ffprobe attributes, poster frame via ffmpeg

pub mod thumb;
pub mod raw;

use std::path::{Path, PathBuf};

use crate::constants::THUMB_EXTENSION;
use crate::error::{GlimpseError, Result};
use crate::metadata::{self, Dimensions, VideoMetadata};
use crate::scan::classify::Classification;
use crate::tools::Toolbox;

/// Output of one derivation.
#[derive(Debug, Clone, PartialEq)]
pub struct Derived {
    pub thumbnail_path: PathBuf,
    pub dimensions: Dimensions,
    /// Present for videos; fields may still be empty if probing failed.
    pub video: Option<VideoMetadata>,
}

/// Produces thumbnails and derived attributes for a classified original.
/// The caller picks `thumbnail_path`; the deriver only writes it.
pub trait Deriver: Send + Sync {
    fn derive(&self, source: &Path, thumbnail_path: &Path, classification: Classification) -> Result<Derived>;
}

/// Mapping between the originals tree and the mirrored thumbnail tree.
#[derive(Debug, Clone)]
pub struct ThumbnailLayout {
    pub originals_root: PathBuf,
    pub thumbnails_root: PathBuf,
}

impl ThumbnailLayout {
    pub fn new(originals_root: impl Into<PathBuf>, thumbnails_root: impl Into<PathBuf>) -> Self {
        Self {
            originals_root: originals_root.into(),
            thumbnails_root: thumbnails_root.into(),
        }
    }

    fn relative<'a>(&self, source: &'a Path) -> Result<&'a Path> {
        source.strip_prefix(&self.originals_root).map_err(|_| {
            GlimpseError::Derivation(format!(
                "{} is outside {}",
                source.display(),
                self.originals_root.display()
            ))
        })
    }

    /// Thumbnail location: same relative directory, extension swapped.
    pub fn thumbnail_for(&self, source: &Path) -> Result<PathBuf> {
        let rel = self.relative(source)?;
        Ok(self.thumbnails_root.join(rel).with_extension(THUMB_EXTENSION))
    }

    /// Fallback for originals whose swapped name is already taken by a
    /// sibling (`IMG_1.jpg` + `IMG_1.mov`): keep the whole file name.
    pub fn full_name_thumbnail_for(&self, source: &Path) -> Result<PathBuf> {
        let rel = self.relative(source)?;
        let mut name = rel.as_os_str().to_os_string();
        name.push(".");
        name.push(THUMB_EXTENSION);
        Ok(self.thumbnails_root.join(name))
    }

    /// Folder of an original relative to the root, "/"-separated, "" at the root.
    pub fn folder_for(&self, source: &Path) -> Result<String> {
        let rel = self.relative(source)?;
        let folder = rel
            .parent()
            .map(|p| {
                p.components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .unwrap_or_default();
        Ok(folder)
    }
}

/// Production deriver: one external process per step.
#[derive(Debug, Clone)]
pub struct ToolDeriver {
    tools: Toolbox,
    max_edge: u32,
}

impl ToolDeriver {
    pub fn new(tools: Toolbox, max_edge: u32) -> Self {
        Self { tools, max_edge }
    }

    fn derive_standard(&self, source: &Path, thumb_path: &Path) -> Result<Derived> {
        thumb::resize_image(&self.tools, source, thumb_path, self.max_edge)?;

        // Sizing is best-effort, zero means unknown
        let dimensions = match metadata::image::image_dimensions(&self.tools, source) {
            Ok(Some(d)) => d,
            Ok(None) => {
                log::debug!("identify gave no dimensions for {}", source.display());
                Dimensions::default()
            }
            Err(e) => {
                log::warn!("identify failed for {}: {}", source.display(), e);
                Dimensions::default()
            }
        };

        Ok(Derived {
            thumbnail_path: thumb_path.to_path_buf(),
            dimensions,
            video: None,
        })
    }

    fn derive_raw(&self, source: &Path, thumb_path: &Path) -> Result<Derived> {
        let dimensions = raw::derive_raw(&self.tools, source, thumb_path, self.max_edge)?;
        Ok(Derived {
            thumbnail_path: thumb_path.to_path_buf(),
            dimensions,
            video: None,
        })
    }

    fn derive_video(&self, source: &Path, thumb_path: &Path) -> Result<Derived> {
        // Probe failure leaves attributes unknown but does not stop indexing
        let video = match metadata::ffprobe::probe(&self.tools, source) {
            Ok(meta) => meta,
            Err(e) => {
                log::warn!("ffprobe failed for {}: {}", source.display(), e);
                VideoMetadata::default()
            }
        };

        let duration = (video.duration > 0.0).then_some(video.duration);
        thumb::video_poster(&self.tools, source, thumb_path, duration, self.max_edge)?;

        Ok(Derived {
            thumbnail_path: thumb_path.to_path_buf(),
            dimensions: Dimensions::new(video.width, video.height),
            video: Some(video),
        })
    }
}

impl Deriver for ToolDeriver {
    fn derive(&self, source: &Path, thumb_path: &Path, classification: Classification) -> Result<Derived> {
        if let Some(parent) = thumb_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        match classification {
            Classification::StandardImage => self.derive_standard(source, thumb_path),
            Classification::Raw => self.derive_raw(source, thumb_path),
            Classification::Video => self.derive_video(source, thumb_path),
            Classification::Ignore | Classification::Unsupported => Err(GlimpseError::Derivation(
                format!("{} is not a derivable media file", source.display()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeTools;
    use tempfile::TempDir;

    #[test]
    fn test_thumbnail_path_mirrors_tree() {
        let layout = ThumbnailLayout::new("/pool/originals", "/pool/thumbs");
        assert_eq!(
            layout.thumbnail_for(Path::new("/pool/originals/2023/trip/IMG_1.CR2")).unwrap(),
            PathBuf::from("/pool/thumbs/2023/trip/IMG_1.jpg")
        );
        assert_eq!(
            layout.thumbnail_for(Path::new("/pool/originals/a.mov")).unwrap(),
            PathBuf::from("/pool/thumbs/a.jpg")
        );
        assert!(layout.thumbnail_for(Path::new("/elsewhere/a.cr2")).is_err());
    }

    #[test]
    fn test_full_name_thumbnail_keeps_extension() {
        let layout = ThumbnailLayout::new("/pool/originals", "/pool/thumbs");
        assert_eq!(
            layout
                .full_name_thumbnail_for(Path::new("/pool/originals/2023/IMG_1.mov"))
                .unwrap(),
            PathBuf::from("/pool/thumbs/2023/IMG_1.mov.jpg")
        );
        assert_ne!(
            layout.full_name_thumbnail_for(Path::new("/pool/originals/IMG_1.mov")).unwrap(),
            layout.thumbnail_for(Path::new("/pool/originals/IMG_1.jpg")).unwrap()
        );
        assert!(layout.full_name_thumbnail_for(Path::new("/elsewhere/a.mov")).is_err());
    }

    #[test]
    fn test_folder_for() {
        let layout = ThumbnailLayout::new("/pool/originals", "/pool/thumbs");
        assert_eq!(layout.folder_for(Path::new("/pool/originals/a.cr2")).unwrap(), "");
        assert_eq!(
            layout.folder_for(Path::new("/pool/originals/2023/trip/a.cr2")).unwrap(),
            "2023/trip"
        );
    }

    fn source_file(tmp: &TempDir, rel: &str, content: &[u8]) -> PathBuf {
        let path = tmp.path().join("originals").join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_standard_image_derivation() {
        let tmp = TempDir::new().unwrap();
        let fake = FakeTools::new(tmp.path().join("bin"));
        let source = source_file(&tmp, "a/pic.JPG", b"jpeg bytes");
        let thumb = tmp.path().join("thumbs").join("a").join("pic.jpg");

        let deriver = ToolDeriver::new(fake.toolbox(), 800);
        let derived = deriver.derive(&source, &thumb, Classification::StandardImage).unwrap();

        assert_eq!(derived.thumbnail_path, thumb);
        assert!(derived.thumbnail_path.exists());
        assert_eq!(derived.dimensions, Dimensions::new(640, 480));
        assert!(derived.video.is_none());
        assert_eq!(fake.calls("convert"), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_standard_image_without_dimensions_still_gets_thumbnail() {
        let tmp = TempDir::new().unwrap();
        let fake = FakeTools::new(tmp.path().join("bin"));
        fake.fail("identify");
        let source = source_file(&tmp, "pic.png", b"png bytes");
        let thumb = tmp.path().join("thumbs").join("pic.jpg");

        let deriver = ToolDeriver::new(fake.toolbox(), 800);
        let derived = deriver.derive(&source, &thumb, Classification::StandardImage).unwrap();

        assert!(thumb.exists());
        assert_eq!(derived.dimensions, Dimensions::default());
        assert_eq!(fake.calls("identify"), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_video_derivation_with_failed_probe() {
        let tmp = TempDir::new().unwrap();
        let fake = FakeTools::new(tmp.path().join("bin"));
        fake.fail("ffprobe");
        let source = source_file(&tmp, "clip.mp4", b"video");
        let thumb = tmp.path().join("thumbs").join("clip.jpg");

        let deriver = ToolDeriver::new(fake.toolbox(), 800);
        let derived = deriver.derive(&source, &thumb, Classification::Video).unwrap();

        assert!(derived.thumbnail_path.exists());
        assert_eq!(derived.video, Some(VideoMetadata::default()));
        assert_eq!(derived.dimensions, Dimensions::default());
    }

    #[cfg(unix)]
    #[test]
    fn test_video_derivation_with_probe() {
        let tmp = TempDir::new().unwrap();
        let fake = FakeTools::new(tmp.path().join("bin"));
        let source = source_file(&tmp, "clip.mov", b"video");
        let thumb = tmp.path().join("thumbs").join("clip.mov.jpg");

        let deriver = ToolDeriver::new(fake.toolbox(), 800);
        let derived = deriver.derive(&source, &thumb, Classification::Video).unwrap();
        let video = derived.video.unwrap();

        assert_eq!(derived.thumbnail_path, thumb);
        assert!(thumb.exists());
        assert_eq!(video.video_codec, "h264");
        assert_eq!(video.audio_codec, "aac");
        assert!((video.duration - 10.0).abs() < 1e-9);
        assert_eq!(derived.dimensions, Dimensions::new(1920, 1080));
    }

    #[test]
    fn test_unsupported_is_not_derivable() {
        let tmp = TempDir::new().unwrap();
        let deriver = ToolDeriver::new(
            Toolbox::resolve(&Default::default(), std::time::Duration::from_secs(1)),
            800,
        );
        let err = deriver
            .derive(
                &tmp.path().join("originals").join("notes.txt"),
                &tmp.path().join("thumbs").join("notes.jpg"),
                Classification::Unsupported,
            )
            .unwrap_err();
        assert!(matches!(err, GlimpseError::Derivation(_)));
    }
}
