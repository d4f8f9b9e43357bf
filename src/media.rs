//! Media transcoding via ffmpeg/ffprobe
//!
//! External processes driven through `tokio::process` with
//! `kill_on_drop(true)`: when a timeout cancels the wait, dropping the child
//! delivers SIGKILL, so unresponsive transcodes cannot accumulate as zombie
//! processes. Outputs go through a temp file and an atomic rename so an
//! interrupted run never leaves a half-written MP4 at the final path.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::error::{Error, Result};

const FFMPEG_BIN: &str = "ffmpeg";
const FFPROBE_BIN: &str = "ffprobe";
const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// ffmpeg/ffprobe front-end for the workers
#[derive(Debug, Clone, Default)]
pub struct Transcoder;

fn remux_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-threads".into(),
        "2".into(),
        "-i".into(),
        input.display().to_string(),
        "-c".into(),
        "copy".into(),
        "-movflags".into(),
        "+faststart".into(),
        "-f".into(),
        "mp4".into(),
        "-y".into(),
        output.display().to_string(),
    ]
}

fn reencode_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-y".into(),
        "-i".into(),
        input.display().to_string(),
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        "veryfast".into(),
        "-crf".into(),
        "28".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-c:a".into(),
        "copy".into(),
        output.display().to_string(),
    ]
}

fn probe_args(path: &Path) -> Vec<String> {
    vec![
        "-v".into(),
        "error".into(),
        "-show_entries".into(),
        "format=duration".into(),
        "-of".into(),
        "default=noprint_wrappers=1:nokey=1".into(),
        path.display().to_string(),
    ]
}

impl Transcoder {
    pub fn new() -> Self {
        Self
    }

    /// Rewrap an H.264 elementary stream into an MP4 container with
    /// fast-start metadata (no re-encode). Writes `{output}.tmp` and renames
    /// into place on success.
    pub async fn remux_to_mp4(
        &self,
        input: &Path,
        output: &Path,
        timeout: Duration,
    ) -> Result<()> {
        let tmp = tmp_path(output);
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let result = run_ffmpeg(&remux_args(input, &tmp), timeout).await;
        match result {
            Ok(()) => {
                tokio::fs::rename(&tmp, output).await?;
                Ok(())
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&tmp).await;
                Err(e)
            }
        }
    }

    /// Re-encode an MP4 to the smaller libx264 profile. The caller supplies
    /// the output path (it must not equal the input) and decides what to do
    /// with the result.
    pub async fn reencode_smaller(
        &self,
        input: &Path,
        output: &Path,
        timeout: Duration,
    ) -> Result<()> {
        let result = run_ffmpeg(&reencode_args(input, output), timeout).await;
        if result.is_err() {
            let _ = tokio::fs::remove_file(output).await;
        }
        result
    }

    /// Duration of a media file in seconds, if ffprobe can determine it.
    pub async fn probe_duration(&self, path: &Path) -> Result<Option<f64>> {
        let child = Command::new(FFPROBE_BIN)
            .args(probe_args(path))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Internal(format!("ffprobe spawn failed: {}", e)))?;

        let output = match tokio::time::timeout(PROBE_TIMEOUT, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(Error::Internal(format!("ffprobe failed: {}", e))),
            Err(_) => return Ok(None),
        };

        if !output.status.success() {
            return Ok(None);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.trim().parse::<f64>().ok())
    }

    /// Check that ffmpeg is on PATH; returns its version line.
    pub async fn check_ffmpeg() -> Result<String> {
        let output = Command::new(FFMPEG_BIN)
            .arg("-version")
            .output()
            .await
            .map_err(|e| Error::Internal(format!("ffmpeg not found: {}", e)))?;

        if !output.status.success() {
            return Err(Error::Internal("ffmpeg version check failed".to_string()));
        }

        let version = String::from_utf8_lossy(&output.stdout);
        let first_line = version.lines().next().unwrap_or("unknown");
        Ok(first_line.to_string())
    }
}

fn tmp_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

async fn run_ffmpeg(args: &[String], timeout: Duration) -> Result<()> {
    let child = Command::new(FFMPEG_BIN)
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::Internal(format!("ffmpeg spawn failed: {}", e)))?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => {
            if output.status.success() {
                Ok(())
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(Error::Internal(format!(
                    "ffmpeg failed: {}",
                    stderr.trim()
                )))
            }
        }
        Ok(Err(e)) => Err(Error::Internal(format!("ffmpeg execution failed: {}", e))),
        Err(_) => {
            tracing::warn!(
                timeout_sec = timeout.as_secs(),
                "ffmpeg timeout, process killed via kill_on_drop"
            );
            Err(Error::Internal(format!(
                "ffmpeg timeout ({}s)",
                timeout.as_secs()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remux_args_copy_container() {
        let args = remux_args(Path::new("in.h264"), Path::new("out.mp4.tmp"));
        let joined = args.join(" ");
        assert!(joined.contains("-c copy"));
        assert!(joined.contains("-movflags +faststart"));
        assert!(joined.contains("-f mp4"));
        assert!(joined.ends_with("out.mp4.tmp"));
    }

    #[test]
    fn test_reencode_args_profile() {
        let args = reencode_args(Path::new("in.mp4"), Path::new("in.mp4.opt.tmp.mp4"));
        let joined = args.join(" ");
        assert!(joined.contains("-c:v libx264"));
        assert!(joined.contains("-preset veryfast"));
        assert!(joined.contains("-crf 28"));
        assert!(joined.contains("-c:a copy"));
    }

    #[test]
    fn test_tmp_path_appends_suffix() {
        assert_eq!(
            tmp_path(Path::new("a/b/video.mp4")),
            PathBuf::from("a/b/video.mp4.tmp")
        );
    }
}
