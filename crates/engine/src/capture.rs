//! Stream capture capability: the port definition plus the HTTP
//! implementation used by the CLI.
//!
//! A capture is split into two phases so the orchestrator can register the
//! handle pair before any byte is written: `open` performs the request and
//! reads a prebuffer chunk (catching "reported live but serves nothing"
//! early), `run` drives the transfer to completion. Both handles stay
//! closable from other tasks for the whole transfer — that is what makes
//! the shutdown sweep work.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use humansize::{DECIMAL, format_size};
use parking_lot::Mutex;
use reqwest::Response;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::StreamerConfig;
use crate::error::{CaptureError, EngineError, Result};
use crate::platform::StreamSource;
use crate::registry::RecordingHandle;
use crate::session::build_default_headers;

/// Time between data chunks before the transfer counts as timed out.
const READ_TIMEOUT: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Bytes between progress log lines.
const PROGRESS_STEP_BYTES: u64 = 16 * 1024 * 1024;

/// Read-side handle: closing cancels the in-flight transfer.
#[derive(Default)]
pub struct CaptureHandle {
    token: CancellationToken,
}

impl CaptureHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl RecordingHandle for CaptureHandle {
    fn close(&self) {
        self.token.cancel();
    }
}

/// Write-side handle owning the destination file.
///
/// Closing takes the file out from under a concurrent writer, so a transfer
/// that outlives shutdown fails its next write instead of writing forever.
pub struct OutputHandle {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl OutputHandle {
    pub fn create(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(Some(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, chunk: &[u8]) -> std::io::Result<()> {
        match self.file.lock().as_mut() {
            Some(file) => file.write_all(chunk),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "output handle closed",
            )),
        }
    }
}

impl RecordingHandle for OutputHandle {
    fn close(&self) {
        if let Some(file) = self.file.lock().take() {
            // Best effort; a failed sync must not break the shutdown sweep.
            let _ = file.sync_all();
        }
    }
}

/// An opened transfer, ready to run.
#[async_trait]
pub trait CaptureTransfer: Send {
    fn capture_handle(&self) -> Arc<dyn RecordingHandle>;
    fn output_handle(&self) -> Arc<dyn RecordingHandle>;

    /// Drive the transfer to completion, returning the bytes written.
    async fn run(self: Box<Self>, progress: bool) -> Result<u64, CaptureError>;
}

/// Capture capability: open a resolved stream source for writing to `dest`.
#[async_trait]
pub trait CaptureEngine: Send + Sync {
    async fn open(
        &self,
        source: &StreamSource,
        dest: &Path,
    ) -> Result<Box<dyn CaptureTransfer>, CaptureError>;
}

/// HTTP byte-stream capture engine.
///
/// The transfer client mirrors the streamer's detection session (same
/// headers, cookies, proxy) but is tuned for long-lived transfers: no
/// overall request timeout, segment-sized read timeout instead.
pub struct HttpCaptureEngine {
    client: reqwest::Client,
}

impl HttpCaptureEngine {
    pub fn new(config: &StreamerConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .default_headers(build_default_headers(config))
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(READ_TIMEOUT);

        if let Some(proxy_url) = config.proxy.as_deref() {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        }

        Ok(Self {
            client: builder.build().map_err(EngineError::Client)?,
        })
    }
}

#[async_trait]
impl CaptureEngine for HttpCaptureEngine {
    async fn open(
        &self,
        source: &StreamSource,
        dest: &Path,
    ) -> Result<Box<dyn CaptureTransfer>, CaptureError> {
        let mut request = self.client.get(&source.url);
        for (key, value) in &source.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let mut response = request.send().await.map_err(|error| CaptureError::Open {
            reason: format!("unable to open URL `{}`: {error}", source.url),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CaptureError::Open {
                reason: format!("unable to open URL `{}` ({status})", source.url),
            });
        }

        let prebuffer = match response.chunk().await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                return Err(CaptureError::Open {
                    reason: "no data returned from stream".to_string(),
                });
            }
            Err(error) => return Err(classify_transfer_error(error)),
        };

        let output = Arc::new(OutputHandle::create(dest)?);
        let capture = Arc::new(CaptureHandle::new());

        Ok(Box::new(HttpCaptureTransfer {
            response,
            prebuffer,
            capture,
            output,
        }))
    }
}

struct HttpCaptureTransfer {
    response: Response,
    prebuffer: Bytes,
    capture: Arc<CaptureHandle>,
    output: Arc<OutputHandle>,
}

#[async_trait]
impl CaptureTransfer for HttpCaptureTransfer {
    fn capture_handle(&self) -> Arc<dyn RecordingHandle> {
        self.capture.clone()
    }

    fn output_handle(&self) -> Arc<dyn RecordingHandle> {
        self.output.clone()
    }

    async fn run(mut self: Box<Self>, progress: bool) -> Result<u64, CaptureError> {
        let mut written = 0u64;
        let mut next_report = PROGRESS_STEP_BYTES;

        self.output.write(&self.prebuffer)?;
        written += self.prebuffer.len() as u64;

        loop {
            let chunk = tokio::select! {
                _ = self.capture.cancelled() => return Err(CaptureError::Cancelled),
                chunk = self.response.chunk() => chunk,
            };

            match chunk {
                Ok(Some(bytes)) => {
                    self.output.write(&bytes)?;
                    written += bytes.len() as u64;
                    if progress && written >= next_report {
                        info!(recorded = %format_size(written, DECIMAL), "recording in progress");
                        next_report = written + PROGRESS_STEP_BYTES;
                    }
                }
                // Upstream ended the stream: the broadcast is over.
                Ok(None) => break,
                Err(error) => return Err(classify_transfer_error(error)),
            }
        }

        Ok(written)
    }
}

fn classify_transfer_error(error: reqwest::Error) -> CaptureError {
    if error.is_timeout() {
        CaptureError::Timeout {
            reason: error.to_string(),
        }
    } else {
        CaptureError::Other(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_handle_close_is_idempotent() {
        let handle = CaptureHandle::new();
        assert!(!handle.is_closed());
        handle.close();
        handle.close();
        assert!(handle.is_closed());
    }

    #[test]
    fn output_handle_write_after_close_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.ts");
        let output = OutputHandle::create(&path).unwrap();

        output.write(b"data").unwrap();
        output.close();
        let error = output.write(b"more").unwrap_err();
        assert_eq!(error.kind(), std::io::ErrorKind::BrokenPipe);

        // Double close is tolerated.
        output.close();
        assert_eq!(std::fs::read(&path).unwrap(), b"data");
    }

    #[test]
    fn output_handle_creates_missing_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/out.ts");
        let output = OutputHandle::create(&path).unwrap();
        output.write(b"x").unwrap();
        output.close();
        assert!(path.exists());
    }
}
