// External tool resolver and runner for dcraw/ImageMagick/ffprobe/ffmpeg
//
// Resolution order:
// 1) Environment variable override (GLIMPSE_DCRAW_PATH, etc.)
// 2) Path configured in the config file
// 3) PATH fallback
//
// Every invocation is bounded by a timeout; a tool that overruns is killed.

use std::env;
use std::ffi::OsStr;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::{Config, ToolPaths};
use crate::error::{GlimpseError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Resolve a tool path from env override, then config, then bare name.
fn resolve_tool(env_key: &str, configured: Option<&Path>, default_name: &str) -> PathBuf {
    if let Ok(v) = env::var(env_key) {
        let p = PathBuf::from(&v);
        if p.exists() {
            return p;
        }
    }

    if let Some(p) = configured {
        return p.to_path_buf();
    }

    let mut filename = default_name.to_string();
    if cfg!(windows) && !filename.to_lowercase().ends_with(".exe") {
        filename.push_str(".exe");
    }
    PathBuf::from(filename)
}

/// Resolved tool locations plus the per-invocation timeout.
#[derive(Debug, Clone)]
pub struct Toolbox {
    pub dcraw: PathBuf,
    pub convert: PathBuf,
    pub identify: PathBuf,
    pub ffprobe: PathBuf,
    pub ffmpeg: PathBuf,
    pub timeout: Duration,
}

impl Toolbox {
    pub fn resolve(paths: &ToolPaths, timeout: Duration) -> Self {
        Self {
            dcraw: resolve_tool("GLIMPSE_DCRAW_PATH", paths.dcraw.as_deref(), "dcraw"),
            convert: resolve_tool("GLIMPSE_CONVERT_PATH", paths.convert.as_deref(), "convert"),
            identify: resolve_tool("GLIMPSE_IDENTIFY_PATH", paths.identify.as_deref(), "identify"),
            ffprobe: resolve_tool("GLIMPSE_FFPROBE_PATH", paths.ffprobe.as_deref(), "ffprobe"),
            ffmpeg: resolve_tool("GLIMPSE_FFMPEG_PATH", paths.ffmpeg.as_deref(), "ffmpeg"),
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::resolve(&config.tools, config.tool_timeout())
    }

    /// Run a tool to completion (or timeout) and capture its output.
    pub fn run<I, S>(&self, tool: &Path, args: I) -> Result<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(tool);
        cmd.args(args);
        run_with_timeout(&tool_name(tool), &mut cmd, self.timeout)
    }

    /// Like `run`, but a non-zero exit status is an error.
    pub fn run_checked<I, S>(&self, tool: &Path, args: I) -> Result<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = self.run(tool, args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GlimpseError::tool(
                tool_name(tool),
                format!("exit {}: {}", output.status, stderr.trim()),
            ));
        }
        Ok(output)
    }
}

fn tool_name(tool: &Path) -> String {
    tool.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| tool.to_string_lossy().to_string())
}

/// Spawn `cmd`, collect stdout/stderr, and kill it if it outlives `timeout`.
pub fn run_with_timeout(name: &str, cmd: &mut Command, timeout: Duration) -> Result<Output> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd
        .spawn()
        .map_err(|e| GlimpseError::tool(name, format!("failed to start: {}", e)))?;

    // Drain pipes on their own threads so a chatty tool never blocks on a full pipe
    let stdout_reader = child.stdout.take().map(|mut out| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = out.read_to_end(&mut buf);
            buf
        })
    });
    let stderr_reader = child.stderr.take().map(|mut err| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = err.read_to_end(&mut buf);
            buf
        })
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait()? {
            Some(status) => break status,
            None => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    log::warn!("{} killed after {}s", name, timeout.as_secs());
                    return Err(GlimpseError::ToolTimeout {
                        tool: name.to_string(),
                        seconds: timeout.as_secs(),
                    });
                }
                thread::sleep(POLL_INTERVAL);
            }
        }
    };

    let stdout = stdout_reader
        .map(|h| h.join().unwrap_or_default())
        .unwrap_or_default();
    let stderr = stderr_reader
        .map(|h| h.join().unwrap_or_default())
        .unwrap_or_default();

    Ok(Output { status, stdout, stderr })
}

/// Check if a tool can be launched at all.
pub fn is_tool_available(tool: &Path) -> bool {
    if tool.is_file() {
        return true;
    }

    Command::new(tool)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}
