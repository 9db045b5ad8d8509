use async_trait::async_trait;
use relayq_core::domain::job::TaskArgs;
use relayq_core::domain::task::TaskFailure;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::Path;
use tokio::process::Command;

use super::TaskHandler;
use super::process::capture;

const DEFAULT_MODEL: &str = "base";
const TRANSCRIPT_EXTENSION: &str = "txt";

/// `relayq.transcribe_audio(audio_file, model="base")`: returns the transcript text
///
/// Whisper writes `<stem>.txt` next to the audio file.
pub struct TranscribeAudio {
    whisper: String,
}

impl TranscribeAudio {
    pub fn new(whisper: impl Into<String>) -> Self {
        Self {
            whisper: whisper.into(),
        }
    }

    async fn ensure_installed(&self) -> Result<(), TaskFailure> {
        let mut probe = Command::new(&self.whisper);
        probe.arg("--version");

        match capture(probe).await {
            Ok(captured) if captured.success() => Ok(()),
            _ => Err(TaskFailure::tool_missing(
                "Whisper not installed. Run: pip install openai-whisper",
            )),
        }
    }
}

#[async_trait]
impl TaskHandler for TranscribeAudio {
    async fn run(&self, args: &TaskArgs) -> Result<Value, TaskFailure> {
        let audio = args
            .get_str(0, "audio_file")
            .ok_or_else(|| TaskFailure::invalid_arguments("transcribe_audio requires audio_file"))?;
        let model = args.get_str(1, "model").unwrap_or(DEFAULT_MODEL);

        let audio_path = Path::new(audio);
        if !audio_path.exists() {
            return Err(TaskFailure::not_found(format!(
                "Audio file not found: {audio}"
            )));
        }

        self.ensure_installed().await?;

        let output_dir = match audio_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };

        let mut whisper = Command::new(&self.whisper);
        whisper
            .arg(audio)
            .arg("--model")
            .arg(model)
            .arg("--output_dir")
            .arg(output_dir)
            .arg("--output_format")
            .arg(TRANSCRIPT_EXTENSION);

        let captured = capture(whisper)
            .await
            .map_err(|e| TaskFailure::external(format!("Transcription failed: {e}")))?;

        if !captured.success() {
            return Err(TaskFailure::external(format!(
                "Whisper failed: {}",
                captured.stderr
            )));
        }

        let transcript_path = audio_path.with_extension(TRANSCRIPT_EXTENSION);
        match tokio::fs::read_to_string(&transcript_path).await {
            Ok(transcript) => Ok(Value::String(transcript)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(TaskFailure::external(format!(
                "Whisper reported success but wrote no transcript at {}",
                transcript_path.display()
            ))),
            Err(e) => Err(TaskFailure::external(format!(
                "Failed to read transcript {}: {e}",
                transcript_path.display()
            ))),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::tasks::process::testing::fake_tool;
    use relayq_core::domain::task::FailureKind;

    const FAKE_WHISPER: &str = r#"if [ "$1" = "--version" ]; then echo 20231117; exit 0; fi
audio="$1"; shift
while [ $# -gt 0 ]; do
  case "$1" in
    --output_dir) dir="$2"; shift 2 ;;
    --model) model="$2"; shift 2 ;;
    *) shift ;;
  esac
done
base=$(basename "$audio")
echo "transcript of ${base%.*} with $model" > "$dir/${base%.*}.txt""#;

    #[tokio::test]
    async fn test_missing_audio_is_not_found_without_invoking_whisper() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ran");
        let whisper = fake_tool(dir.path(), "whisper", &format!("touch {}", marker.display()));

        let failure = TranscribeAudio::new(whisper.to_str().unwrap())
            .run(&TaskArgs::new().arg(dir.path().join("gone.mp3").to_str().unwrap()))
            .await
            .unwrap_err();

        assert_eq!(failure.kind, FailureKind::NotFound);
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_reads_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("episode.mp3");
        std::fs::write(&audio, "audio").unwrap();
        let whisper = fake_tool(dir.path(), "whisper", FAKE_WHISPER);

        let value = TranscribeAudio::new(whisper.to_str().unwrap())
            .run(&TaskArgs::new().arg(audio.to_str().unwrap()).kwarg("model", "small"))
            .await
            .unwrap();

        assert_eq!(value, Value::String("transcript of episode with small\n".into()));
    }

    #[tokio::test]
    async fn test_model_defaults_to_base() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("episode.wav");
        std::fs::write(&audio, "audio").unwrap();
        let whisper = fake_tool(dir.path(), "whisper", FAKE_WHISPER);

        let value = TranscribeAudio::new(whisper.to_str().unwrap())
            .run(&TaskArgs::new().arg(audio.to_str().unwrap()))
            .await
            .unwrap();

        assert!(value.as_str().unwrap().ends_with("with base\n"));
    }

    #[tokio::test]
    async fn test_uninstalled_whisper_is_tool_missing() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("episode.mp3");
        std::fs::write(&audio, "audio").unwrap();

        let failure = TranscribeAudio::new("/definitely/not/whisper")
            .run(&TaskArgs::new().arg(audio.to_str().unwrap()))
            .await
            .unwrap_err();

        assert_eq!(failure.kind, FailureKind::ToolMissing);
        assert!(failure.kind.requires_operator());
    }

    #[tokio::test]
    async fn test_missing_transcript_is_external_failure() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("episode.mp3");
        std::fs::write(&audio, "audio").unwrap();
        let whisper = fake_tool(dir.path(), "whisper", "exit 0");

        let failure = TranscribeAudio::new(whisper.to_str().unwrap())
            .run(&TaskArgs::new().arg(audio.to_str().unwrap()))
            .await
            .unwrap_err();

        assert_eq!(failure.kind, FailureKind::ExternalToolFailure);
        assert!(failure.message.contains("episode.txt"));
    }

    #[tokio::test]
    async fn test_whisper_error_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("episode.mp3");
        std::fs::write(&audio, "audio").unwrap();
        let whisper = fake_tool(
            dir.path(),
            "whisper",
            "if [ \"$1\" = \"--version\" ]; then exit 0; fi\necho 'CUDA out of memory' >&2\nexit 2",
        );

        let failure = TranscribeAudio::new(whisper.to_str().unwrap())
            .run(&TaskArgs::new().arg(audio.to_str().unwrap()))
            .await
            .unwrap_err();

        assert_eq!(failure.kind, FailureKind::ExternalToolFailure);
        assert_eq!(failure.message, "Whisper failed: CUDA out of memory\n");
    }
}
