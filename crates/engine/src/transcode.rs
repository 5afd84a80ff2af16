//! Post-capture transcode capability.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::TranscodeError;

/// Container conversion for a finished capture: stream copy, metadata
/// stripped, moov atom up front for progressive playback. Payload is never
/// re-encoded.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(&self, input: &Path, output: &Path) -> Result<(), TranscodeError>;
}

/// [`Transcoder`] backed by the system ffmpeg binary.
pub struct FfmpegTranscoder {
    program: String,
}

impl FfmpegTranscoder {
    pub fn new() -> Self {
        Self::with_program("ffmpeg")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, input: &Path, output: &Path) -> Result<(), TranscodeError> {
        debug!(input = %input.display(), output = %output.display(), "invoking ffmpeg");

        let result = Command::new(&self.program)
            .arg("-hide_banner")
            .arg("-i")
            .arg(input)
            .args(["-c", "copy", "-map_metadata", "-1", "-movflags", "faststart"])
            .arg(output)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| TranscodeError::Spawn { source })?;

        if !result.status.success() {
            return Err(TranscodeError::Failed {
                status: result.status,
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}
