use async_trait::async_trait;
use relayq_core::domain::job::TaskArgs;
use relayq_core::domain::task::TaskFailure;
use serde_json::{Value, json};
use std::io::{self, ErrorKind};
use std::path::Path;
use tempfile::TempPath;
use tokio::process::Command;
use tracing::debug;

use super::TaskHandler;
use super::process::capture;

/// Codec options used when the caller passes none
pub const DEFAULT_OPTIONS: &str = "-c:v libx264 -crf 23 -c:a aac";

/// `relayq.transcode_video(input_file, output_file, options=None)`
///
/// ffmpeg writes to a hidden file beside the target, which is renamed into
/// place only on success. A redelivered job therefore overwrites a complete
/// output and never leaves a half-written one behind.
pub struct TranscodeVideo {
    ffmpeg: String,
}

impl TranscodeVideo {
    pub fn new(ffmpeg: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }
}

#[async_trait]
impl TaskHandler for TranscodeVideo {
    async fn run(&self, args: &TaskArgs) -> Result<Value, TaskFailure> {
        let input = args
            .get_str(0, "input_file")
            .ok_or_else(|| TaskFailure::invalid_arguments("transcode_video requires input_file"))?;
        let output = args
            .get_str(1, "output_file")
            .ok_or_else(|| TaskFailure::invalid_arguments("transcode_video requires output_file"))?;
        let options = args.get_str(2, "options").unwrap_or(DEFAULT_OPTIONS);

        if !Path::new(input).exists() {
            return Err(TaskFailure::not_found(format!(
                "Input file not found: {input}"
            )));
        }

        let staging = staging_path(Path::new(output)).map_err(|e| {
            TaskFailure::external(format!(
                "Transcode failed: could not stage output next to {output}: {e}"
            ))
        })?;
        let mut ffmpeg = Command::new(&self.ffmpeg);
        ffmpeg
            .arg("-y")
            .arg("-i")
            .arg(input)
            .args(options.split_whitespace())
            .arg(&*staging);

        debug!("Transcoding {} -> {} via {}", input, output, staging.display());

        // `staging` removes itself when dropped, including when this future is
        // cancelled by the time limit.
        let captured = match capture(ffmpeg).await {
            Ok(captured) => captured,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(TaskFailure::tool_missing(format!(
                    "ffmpeg not installed ({}): {e}",
                    self.ffmpeg
                )));
            }
            Err(e) => return Err(TaskFailure::external(format!("Transcode failed: {e}"))),
        };

        if !captured.success() {
            return Err(TaskFailure::external(format!(
                "ffmpeg failed: {}",
                captured.stderr
            )));
        }

        if let Err(e) = staging.persist(output) {
            return Err(TaskFailure::external(format!(
                "Transcode failed: could not move output into place at {output}: {}",
                e.error
            )));
        }

        Ok(json!({ "status": "success", "output": output }))
    }
}

/// Creates `<dir>/.relayq-<random>-<name>`, deleted on drop
///
/// The name ends with the output's file name so ffmpeg picks the same muxer.
fn staging_path(output: &Path) -> io::Result<TempPath> {
    let name = output
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let dir = match output.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    Ok(tempfile::Builder::new()
        .prefix(".relayq-")
        .suffix(&format!("-{name}"))
        .tempfile_in(dir)?
        .into_temp_path())
}
