// dcraw metadata report parsing
//
// `dcraw -i -v <file>` prints a block of "Label: value" lines; the one we need
// looks like "Image size:  6024 x 4022".

use std::ffi::OsStr;
use std::path::Path;
use std::sync::OnceLock;
use regex::Regex;

use crate::error::Result;
use crate::metadata::Dimensions;
use crate::tools::Toolbox;

fn image_size_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^Image size:\s*(\d+)\s*x\s*(\d+)").expect("static regex is valid")
    })
}

/// Query the original sensor dimensions of a RAW file.
pub fn raw_dimensions(tools: &Toolbox, path: &Path) -> Result<Option<Dimensions>> {
    let output = tools.run_checked(&tools.dcraw, [OsStr::new("-i"), OsStr::new("-v"), path.as_os_str()])?;
    Ok(parse_image_size(&String::from_utf8_lossy(&output.stdout)))
}

/// Find the "Image size:" line and read its two integers.
pub fn parse_image_size(report: &str) -> Option<Dimensions> {
    report.lines().find_map(|line| {
        let caps = image_size_regex().captures(line.trim_start())?;
        let width = caps.get(1)?.as_str().parse().ok()?;
        let height = caps.get(2)?.as_str().parse().ok()?;
        Some(Dimensions::new(width, height))
    })
}
