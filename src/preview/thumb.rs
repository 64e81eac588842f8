// Thumbnail rendering
//
// Every thumbnail is written to a sibling temp file first and renamed into
// place once it is known to be non-empty, so a half-written JPEG never shows
// up under the final name.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::constants::{THUMB_EXTENSION, THUMB_QUALITY, VIDEO_THUMB_SEEK_PERCENT};
use crate::error::{GlimpseError, Result};
use crate::tools::Toolbox;

/// Hidden sibling (`.IMG_1.tmp.jpg`). Hidden originals are never indexed, so
/// no mirrored thumbnail can share this name.
fn temp_path_for(output_path: &Path) -> PathBuf {
    let stem = output_path.file_stem().unwrap_or_default().to_string_lossy();
    output_path.with_file_name(format!(".{}.tmp.{}", stem, THUMB_EXTENSION))
}

/// Move a finished temp file into place after checking it has content.
fn commit(tmp_path: &Path, output_path: &Path) -> Result<()> {
    let size = std::fs::metadata(tmp_path).map(|m| m.len()).unwrap_or(0);
    if size == 0 {
        let _ = std::fs::remove_file(tmp_path);
        return Err(GlimpseError::Derivation(format!(
            "thumbnail for {} is empty or missing",
            output_path.display()
        )));
    }

    std::fs::rename(tmp_path, output_path)?;
    Ok(())
}

/// Resize an image with ImageMagick so its longest edge is at most `max_edge`.
///
/// Only shrinks; smaller images are re-encoded at their own size.
pub fn resize_image(tools: &Toolbox, source_path: &Path, output_path: &Path, max_edge: u32) -> Result<()> {
    let tmp_path = temp_path_for(output_path);

    // First frame only, for multi-page TIFFs
    let mut input = source_path.as_os_str().to_os_string();
    input.push("[0]");
    let geometry = format!("{}x{}>", max_edge, max_edge);
    let quality = THUMB_QUALITY.to_string();

    let result = tools.run_checked(
        &tools.convert,
        [
            input.as_os_str(),
            OsStr::new("-auto-orient"),
            OsStr::new("-resize"),
            OsStr::new(&geometry),
            OsStr::new("-quality"),
            OsStr::new(&quality),
            tmp_path.as_os_str(),
        ],
    );

    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e);
    }

    commit(&tmp_path, output_path)
}

/// Grab a poster frame from a video with ffmpeg.
///
/// The frame comes from 10% into the clip to avoid black intros, or 1s in
/// when the duration is unknown.
pub fn video_poster(
    tools: &Toolbox,
    source_path: &Path,
    output_path: &Path,
    duration_secs: Option<f64>,
    max_edge: u32,
) -> Result<()> {
    let tmp_path = temp_path_for(output_path);

    let seek_time = format_duration(seek_seconds(duration_secs));
    let scale_filter = format!(
        "scale='min({0},iw)':'min({0},ih)':force_original_aspect_ratio=decrease",
        max_edge
    );
    let q_value = ffmpeg_quality(THUMB_QUALITY).to_string();

    let result = tools.run_checked(
        &tools.ffmpeg,
        [
            OsStr::new("-y"),
            OsStr::new("-ss"),
            OsStr::new(&seek_time),
            OsStr::new("-i"),
            source_path.as_os_str(),
            OsStr::new("-vframes"),
            OsStr::new("1"),
            OsStr::new("-vf"),
            OsStr::new(&scale_filter),
            OsStr::new("-q:v"),
            OsStr::new(&q_value),
            tmp_path.as_os_str(),
        ],
    );

    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e);
    }

    commit(&tmp_path, output_path)
}

fn seek_seconds(duration_secs: Option<f64>) -> f64 {
    duration_secs
        .filter(|d| d.is_finite() && *d > 0.0)
        .map(|d| d * VIDEO_THUMB_SEEK_PERCENT)
        .unwrap_or(1.0)
        .max(0.1)
}

/// Map a 0-100 JPEG quality onto ffmpeg's 1-31 scale (1 is best).
fn ffmpeg_quality(quality: u32) -> u32 {
    let quality = quality.min(100);
    ((100 - quality) as f32 / 100.0 * 30.0 + 1.0) as u32
}

/// Format seconds as HH:MM:SS.mmm for ffmpeg.
fn format_duration(seconds: f64) -> String {
    let hours = (seconds / 3600.0) as u32;
    let minutes = ((seconds % 3600.0) / 60.0) as u32;
    let secs = seconds % 60.0;
    format!("{:02}:{:02}:{:06.3}", hours, minutes, secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeTools;
    use tempfile::TempDir;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "00:00:00.000");
        assert_eq!(format_duration(5.5), "00:00:05.500");
        assert_eq!(format_duration(65.25), "00:01:05.250");
        assert_eq!(format_duration(3661.0), "01:01:01.000");
    }

    #[test]
    fn test_seek_seconds() {
        assert!((seek_seconds(Some(100.0)) - 10.0).abs() < 1e-9);
        assert!((seek_seconds(None) - 1.0).abs() < 1e-9);
        assert!((seek_seconds(Some(0.0)) - 1.0).abs() < 1e-9);
        assert!((seek_seconds(Some(0.5)) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_ffmpeg_quality() {
        assert_eq!(ffmpeg_quality(100), 1);
        assert_eq!(ffmpeg_quality(85), 5);
        assert_eq!(ffmpeg_quality(0), 31);
    }

    #[test]
    fn test_temp_name_cannot_match_a_thumbnail() {
        let dir = Path::new("/pool/thumbs/2023");
        assert_eq!(temp_path_for(&dir.join("a.jpg")), dir.join(".a.tmp.jpg"));
        // An original named `a.tmp.cr2` mirrors to `a.tmp.jpg`
        assert_ne!(temp_path_for(&dir.join("a.jpg")), dir.join("a.tmp.jpg"));
        assert_eq!(temp_path_for(&dir.join("a.mov.jpg")), dir.join(".a.mov.tmp.jpg"));
    }

    #[cfg(unix)]
    #[test]
    fn test_resize_leaves_no_temp_file() {
        let tmp = TempDir::new().unwrap();
        let fake = FakeTools::new(tmp.path().join("bin"));
        let source = tmp.path().join("in.png");
        std::fs::write(&source, b"png").unwrap();
        let output = tmp.path().join("out.jpg");

        resize_image(&fake.toolbox(), &source, &output, 800).unwrap();

        assert!(output.exists());
        assert!(!temp_path_for(&output).exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_resize_leaves_nothing() {
        let tmp = TempDir::new().unwrap();
        let fake = FakeTools::new(tmp.path().join("bin"));
        fake.fail("convert");
        let source = tmp.path().join("in.png");
        std::fs::write(&source, b"png").unwrap();
        let output = tmp.path().join("out.jpg");

        assert!(resize_image(&fake.toolbox(), &source, &output, 800).is_err());
        assert!(!output.exists());
        assert!(!temp_path_for(&output).exists());
    }
}
