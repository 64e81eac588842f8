// Test fixtures: shell scripts standing in for dcraw, ImageMagick and ffmpeg
//
// Each fake appends its arguments to `<bin>/<tool>.calls` so tests can count
// invocations. The fake `convert` also records the file it was asked to read
// in `<bin>/convert.inputs`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::ToolPaths;
use crate::tools::Toolbox;

const DCRAW: &str = r#"#!/bin/sh
echo "$*" >> "$(dirname "$0")/dcraw.calls"
case "$1" in
  -i) printf 'Filename: fake\nImage size:  6000 x 4000\nOutput size: 6000 x 4000\n'; exit 0 ;;
  -e) printf '\377\330\377\340fakejpeg'; exit 0 ;;
  -c) printf 'P6\n2 2\n255\nabcdefghijkl'; exit 0 ;;
esac
exit 1
"#;

const DCRAW_NO_PREVIEW: &str = r#"#!/bin/sh
echo "$*" >> "$(dirname "$0")/dcraw.calls"
case "$1" in
  -i) printf 'Filename: fake\nImage size:  6000 x 4000\n'; exit 0 ;;
  -e) echo "no embedded thumbnail" >&2; exit 1 ;;
  -c) printf 'P6\n2 2\n255\nabcdefghijkl'; exit 0 ;;
esac
exit 1
"#;

const CONVERT: &str = r#"#!/bin/sh
dir="$(dirname "$0")"
echo "$*" >> "$dir/convert.calls"
input="${1%\[0\]}"
echo "$input" >> "$dir/convert.inputs"
for arg in "$@"; do out="$arg"; done
printf 'fakethumb' > "$out"
"#;

const IDENTIFY: &str = r#"#!/bin/sh
echo "$*" >> "$(dirname "$0")/identify.calls"
printf '640 480'
"#;

const FFPROBE: &str = r#"#!/bin/sh
echo "$*" >> "$(dirname "$0")/ffprobe.calls"
cat <<'JSON'
{"streams":[{"codec_type":"video","codec_name":"h264","width":1920,"height":1080,"avg_frame_rate":"30/1"},{"codec_type":"audio","codec_name":"aac"}],"format":{"duration":"10.000000"}}
JSON
"#;

const FFMPEG: &str = r#"#!/bin/sh
echo "$*" >> "$(dirname "$0")/ffmpeg.calls"
for arg in "$@"; do out="$arg"; done
printf 'fakeframe' > "$out"
"#;

const FAILING: &str = r#"#!/bin/sh
echo "$*" >> "$(dirname "$0")/$(basename "$0").calls"
echo "simulated failure" >&2
exit 1
"#;

/// A directory of fake external tools.
pub struct FakeTools {
    bin: PathBuf,
}

impl FakeTools {
    pub fn new(bin: impl Into<PathBuf>) -> Self {
        let bin = bin.into();
        std::fs::create_dir_all(&bin).unwrap();
        let fake = Self { bin };
        fake.install("dcraw", DCRAW);
        fake.install("convert", CONVERT);
        fake.install("identify", IDENTIFY);
        fake.install("ffprobe", FFPROBE);
        fake.install("ffmpeg", FFMPEG);
        fake
    }

    fn install(&self, name: &str, script: &str) {
        let path = self.bin.join(name);
        std::fs::write(&path, script).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
    }

    /// Make a tool exit non-zero on every call.
    pub fn fail(&self, name: &str) {
        self.install(name, FAILING);
    }

    /// dcraw that has no embedded preview but can still decode.
    pub fn dcraw_without_preview(&self) {
        self.install("dcraw", DCRAW_NO_PREVIEW);
    }

    pub fn tool_paths(&self) -> ToolPaths {
        ToolPaths {
            dcraw: Some(self.bin.join("dcraw")),
            convert: Some(self.bin.join("convert")),
            identify: Some(self.bin.join("identify")),
            ffprobe: Some(self.bin.join("ffprobe")),
            ffmpeg: Some(self.bin.join("ffmpeg")),
        }
    }

    pub fn toolbox(&self) -> Toolbox {
        Toolbox::resolve(&self.tool_paths(), Duration::from_secs(30))
    }

    /// Number of times a tool has been invoked.
    pub fn calls(&self, name: &str) -> usize {
        read_lines(&self.bin.join(format!("{}.calls", name))).len()
    }

    /// Files the fake `convert` was given as input, in call order.
    pub fn convert_inputs(&self) -> Vec<String> {
        read_lines(&self.bin.join("convert.inputs"))
    }
}

fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .map(|s| s.lines().map(str::to_string).collect())
        .unwrap_or_default()
}
