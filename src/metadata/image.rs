// ImageMagick identify wrapper for image dimensions

use std::ffi::OsString;
use std::path::Path;

use crate::error::Result;
use crate::metadata::Dimensions;
use crate::tools::Toolbox;

/// Read width/height of the first frame of an image.
pub fn image_dimensions(tools: &Toolbox, path: &Path) -> Result<Option<Dimensions>> {
    let mut first_frame = OsString::from(path.as_os_str());
    first_frame.push("[0]");

    let output = tools.run_checked(
        &tools.identify,
        [OsString::from("-ping"), OsString::from("-format"), OsString::from("%w %h"), first_frame],
    )?;
    Ok(parse_dimensions(&String::from_utf8_lossy(&output.stdout)))
}

/// Parse "W H" (two whitespace-separated integers).
pub fn parse_dimensions(text: &str) -> Option<Dimensions> {
    let mut parts = text.split_whitespace();
    let width = parts.next()?.parse().ok()?;
    let height = parts.next()?.parse().ok()?;
    Some(Dimensions::new(width, height))
}
