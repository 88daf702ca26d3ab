//! Normalization Gateway
//!
//! Defines the transcoder trait the pipeline is built against and the
//! out-of-process implementation used in production.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use super::types::UploadError;

/// Converts a finished upload into the canonical container.
///
/// Called once per upload with no retry. Returns the path of the converted
/// file, which the caller then owns.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn convert(&self, input: &Path) -> Result<PathBuf, UploadError>;
}

/// Path the converted file is written to: `<stem>-converted.<ext>` next to
/// the input, so an input that already has the canonical extension is
/// never overwritten in place.
pub fn converted_path(input: &Path, extension: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{stem}-converted.{extension}"))
}

// ============================================================================
// External command
// ============================================================================

/// Runs `<program> -y -i <input> -ar <sample_rate> <output>`
#[derive(Debug, Clone)]
pub struct CommandTranscoder {
    program: String,
    sample_rate: u32,
    extension: String,
}

impl CommandTranscoder {
    pub fn new(program: impl Into<String>, sample_rate: u32, extension: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            sample_rate,
            extension: extension.into(),
        }
    }

    fn command(&self, input: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-y")
            .arg("-i")
            .arg(input)
            .arg("-ar")
            .arg(self.sample_rate.to_string())
            .arg(output)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Transcoder for CommandTranscoder {
    async fn convert(&self, input: &Path) -> Result<PathBuf, UploadError> {
        let output_path = converted_path(input, &self.extension);

        tracing::debug!(
            program = %self.program,
            input = %input.display(),
            output = %output_path.display(),
            sample_rate = self.sample_rate,
            "Running transcoder"
        );

        let output = self
            .command(input, &output_path)
            .output()
            .await
            .map_err(|e| UploadError::Conversion(format!("Failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            // A failed run may still leave a partial output behind
            let _ = tokio::fs::remove_file(&output_path).await;
            tracing::debug!(
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr),
                "Transcoder failed"
            );
            return Err(UploadError::Conversion(format!(
                "{} exited with {}",
                self.program, output.status
            )));
        }

        Ok(output_path)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converted_path_never_equals_input() {
        let input = Path::new("/tmp/upload_song_abc.ogg");
        let output = converted_path(input, "ogg");
        assert_eq!(output, Path::new("/tmp/upload_song_abc-converted.ogg"));
        assert_ne!(output, input);
    }

    #[test]
    fn test_converted_path_without_extension() {
        let output = converted_path(Path::new("/tmp/upload_x_1"), "ogg");
        assert_eq!(output, Path::new("/tmp/upload_x_1-converted.ogg"));
    }

    #[test]
    fn test_command_arguments() {
        let transcoder = CommandTranscoder::new("ffmpeg", 48000, "ogg");
        let cmd = transcoder.command(Path::new("/tmp/in.wav"), Path::new("/tmp/out.ogg"));
        let args: Vec<_> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, vec!["-y", "-i", "/tmp/in.wav", "-ar", "48000", "/tmp/out.ogg"]);
    }

    #[tokio::test]
    async fn test_missing_program_is_conversion_error() {
        let transcoder = CommandTranscoder::new("coffer-no-such-transcoder", 48000, "ogg");
        let result = transcoder.convert(Path::new("/tmp/does-not-matter.wav")).await;
        assert!(matches!(result, Err(UploadError::Conversion(_))));
    }
}
