// RAW previews via dcraw
//
// The embedded JPEG preview is preferred since it is fast and already
// rendered by the camera. Files without one are decoded at half size. The
// extracted bytes live in a temp file only for as long as ImageMagick needs
// them.

use std::ffi::OsStr;
use std::io::Write;
use std::path::Path;

use crate::constants::RAW_TEMP_PREFIX;
use crate::error::{GlimpseError, Result};
use crate::metadata::{self, Dimensions};
use crate::preview::thumb;
use crate::tools::Toolbox;

/// Render a RAW file's thumbnail and report its sensor dimensions.
///
/// Dimensions are best-effort: a failing `dcraw -i -v` yields 0x0.
pub fn derive_raw(tools: &Toolbox, source_path: &Path, output_path: &Path, max_edge: u32) -> Result<Dimensions> {
    let preview = extract_preview(tools, source_path)?;

    let mut temp = tempfile::Builder::new()
        .prefix(RAW_TEMP_PREFIX)
        .suffix(preview_suffix(&preview))
        .tempfile()?;
    temp.write_all(&preview)?;
    temp.flush()?;
    drop(preview);

    thumb::resize_image(tools, temp.path(), output_path, max_edge)?;
    if let Err(e) = temp.close() {
        log::debug!("Failed to remove RAW temp file: {}", e);
    }

    let dimensions = match metadata::raw::raw_dimensions(tools, source_path) {
        Ok(Some(d)) => d,
        Ok(None) => {
            log::debug!("dcraw reported no image size for {}", source_path.display());
            Dimensions::default()
        }
        Err(e) => {
            log::debug!("dcraw -i failed for {}: {}", source_path.display(), e);
            Dimensions::default()
        }
    };

    Ok(dimensions)
}

/// Pull image bytes out of a RAW file: embedded preview, else half-size decode.
fn extract_preview(tools: &Toolbox, source_path: &Path) -> Result<Vec<u8>> {
    match tools.run(&tools.dcraw, [OsStr::new("-e"), OsStr::new("-c"), source_path.as_os_str()]) {
        Ok(out) if out.status.success() && !out.stdout.is_empty() => return Ok(out.stdout),
        Ok(out) => log::debug!(
            "No embedded preview in {} (exit {})",
            source_path.display(),
            out.status
        ),
        Err(e) => log::debug!("dcraw -e failed for {}: {}", source_path.display(), e),
    }

    log::info!("Decoding {} at half size", source_path.display());
    let out = tools.run_checked(
        &tools.dcraw,
        [
            OsStr::new("-c"),
            OsStr::new("-w"),
            OsStr::new("-h"),
            source_path.as_os_str(),
        ],
    )?;

    if out.stdout.is_empty() {
        return Err(GlimpseError::Derivation(format!(
            "dcraw produced no image data for {}",
            source_path.display()
        )));
    }
    Ok(out.stdout)
}

/// Temp file suffix so ImageMagick can sniff the format by name as well.
fn preview_suffix(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0xFF, 0xD8]) {
        ".jpg"
    } else if bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*") {
        ".tif"
    } else {
        ".ppm"
    }
}
