// FFprobe wrapper for video metadata

use std::ffi::OsStr;
use std::path::Path;
use serde::Deserialize;

use crate::error::{GlimpseError, Result};
use crate::metadata::VideoMetadata;
use crate::tools::Toolbox;

#[derive(Debug, Deserialize)]
struct FFprobeOutput {
    streams: Option<Vec<FFprobeStream>>,
    format: Option<FFprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FFprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<i64>,
    height: Option<i64>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FFprobeFormat {
    duration: Option<String>,
}

/// Run ffprobe on a file and extract video metadata
pub fn probe(tools: &Toolbox, path: &Path) -> Result<VideoMetadata> {
    let output = tools.run_checked(
        &tools.ffprobe,
        [
            OsStr::new("-v"), OsStr::new("quiet"),
            OsStr::new("-print_format"), OsStr::new("json"),
            OsStr::new("-show_format"),
            OsStr::new("-show_streams"),
            path.as_os_str(),
        ],
    )?;

    parse_probe_output(&output.stdout)
}

/// Parse ffprobe's JSON report. The first video and first audio stream win.
pub fn parse_probe_output(stdout: &[u8]) -> Result<VideoMetadata> {
    let probe_output: FFprobeOutput = serde_json::from_slice(stdout)
        .map_err(|e| GlimpseError::tool("ffprobe", format!("unparseable output: {}", e)))?;

    let mut meta = VideoMetadata::default();
    let mut seen_video = false;
    let mut seen_audio = false;

    if let Some(ref streams) = probe_output.streams {
        for stream in streams {
            match stream.codec_type.as_deref() {
                Some("video") if !seen_video => {
                    seen_video = true;
                    meta.video_codec = stream.codec_name.clone().unwrap_or_default();
                    meta.width = stream.width.unwrap_or(0);
                    meta.height = stream.height.unwrap_or(0);
                    meta.framerate = parse_frame_rate(stream.avg_frame_rate.as_deref())
                        .or_else(|| parse_frame_rate(stream.r_frame_rate.as_deref()))
                        .unwrap_or(0.0);
                    if let Some(d) = parse_seconds(stream.duration.as_deref()) {
                        meta.duration = d;
                    }
                }
                Some("audio") if !seen_audio => {
                    seen_audio = true;
                    meta.audio_codec = stream.codec_name.clone().unwrap_or_default();
                }
                _ => {}
            }
        }
    }

    // Container duration is more reliable than the stream's when both exist
    if let Some(ref format) = probe_output.format {
        if let Some(d) = parse_seconds(format.duration.as_deref()) {
            meta.duration = d;
        }
    }

    Ok(meta)
}

/// Parse frame rate string like "30000/1001" to f64
fn parse_frame_rate(rate_str: Option<&str>) -> Option<f64> {
    let rate_str = rate_str?;
    if let Some((num, den)) = rate_str.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 && num > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    rate_str.parse().ok().filter(|r: &f64| *r > 0.0)
}

fn parse_seconds(duration_str: Option<&str>) -> Option<f64> {
    duration_str?.parse().ok().filter(|d: &f64| d.is_finite() && *d > 0.0)
}
