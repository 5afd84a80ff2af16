//! Per-streamer recording lifecycle.
//!
//! [`LiveRecorder`] runs the unbounded polling loop: check live status,
//! maybe hand off to capture, sleep, repeat. Detection failures never
//! terminate the loop — a single streamer's recorder survives arbitrary
//! failures and keeps retrying until the process shuts down.
//! [`CaptureOrchestrator`] runs one capture end to end on its own task:
//! filename derivation, registry bookkeeping, transfer, optional transcode.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, warn};

use crate::capture::CaptureEngine;
use crate::config::StreamerConfig;
use crate::error::{CaptureError, EngineError, Result};
use crate::filename::derive_filename;
use crate::platform::{LiveStatus, PlatformClient, StreamSource};
use crate::registry::RecordingRegistry;
use crate::session::HttpSession;
use crate::transcode::Transcoder;

/// Outcome of one capture attempt. Only [`CaptureResult::Completed`]
/// triggers the transcode step; nothing is persisted.
#[derive(Debug)]
pub enum CaptureResult {
    /// Stream captured to disk.
    Completed { bytes_written: u64 },
    /// Channel reported live but no playable stream was resolved.
    NoStream,
    /// Transfer failed with a classified error.
    Failed(CaptureError),
}

/// One recorder per configured streamer.
pub struct LiveRecorder {
    config: Arc<StreamerConfig>,
    session: HttpSession,
    platform: Arc<dyn PlatformClient>,
    registry: Arc<RecordingRegistry>,
    orchestrator: Arc<CaptureOrchestrator>,
}

impl LiveRecorder {
    pub fn new(
        config: StreamerConfig,
        platform: Box<dyn PlatformClient>,
        registry: Arc<RecordingRegistry>,
        engine: Arc<dyn CaptureEngine>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let session = HttpSession::new(config.clone())?;
        let orchestrator = Arc::new(CaptureOrchestrator::new(
            config.clone(),
            registry.clone(),
            engine,
            transcoder,
        ));
        Ok(Self {
            config,
            session,
            platform: Arc::from(platform),
            registry,
            orchestrator,
        })
    }

    /// Poll until `cancel` fires.
    pub async fn start(mut self, cancel: CancellationToken) {
        let span = tracing::info_span!(
            "recorder",
            platform = %self.config.platform,
            streamer = %self.config.display_name(),
        );
        self.run_loop(cancel).instrument(span).await;
    }

    async fn run_loop(&mut self, cancel: CancellationToken) {
        info!("checking live stream status");
        self.log_config();
        let interval = Duration::from_secs(self.config.interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.check_and_maybe_capture() => match result {
                    Ok(()) => {}
                    Err(EngineError::Connection(connection_error)) => {
                        // Transient: rebuild the client, keep looping.
                        // Protocol noise during detection stays out of the
                        // logs.
                        if !connection_error.is_benign() {
                            error!("{connection_error}");
                        }
                        if let Err(rebuild_error) = self.session.rebuild() {
                            error!(error = %rebuild_error, "failed to rebuild http client");
                        }
                    }
                    Err(other) => {
                        error!(error = ?other, "error in live stream detection");
                    }
                },
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        debug!("recorder stopped");
    }

    /// One polling cycle: duplicate-capture skip, status check, handoff.
    ///
    /// The handoff spawns the capture on its own task so a long transfer
    /// never blocks this streamer's (or any other streamer's) polling.
    pub async fn check_and_maybe_capture(&self) -> Result<()> {
        if self.registry.contains(self.platform.registry_key()) {
            debug!("recording already in progress, skipping check");
            return Ok(());
        }

        let status = self.platform.check_live(&self.session).await?;
        let LiveStatus::Live { title, locator } = status else {
            return Ok(());
        };
        info!(title = %title, "live stream detected");

        let source = self.platform.resolve_stream(&locator, &self.session).await?;
        let source_format = self.platform.source_format().to_string();
        let orchestrator = self.orchestrator.clone();
        // The registration key is the same stable identifier the skip check
        // uses, so the two can never disagree.
        let key = self.platform.registry_key().to_string();

        let task = async move {
            if let Err(pipeline_error) = orchestrator
                .record(source, &key, &title, &source_format)
                .await
            {
                // Transcode failures are fatal for the cycle and must not
                // be silently absorbed: the capture on disk is the only
                // copy.
                error!(error = %pipeline_error, key = %key, "recording pipeline failed");
            }
        };
        tokio::spawn(task.instrument(tracing::Span::current()));

        Ok(())
    }

    fn log_config(&self) {
        info!(
            id = %self.config.id,
            interval = self.config.interval,
            format = ?self.config.format,
            proxy = ?self.config.proxy,
            output = %self.config.output.display(),
            "streamer configured"
        );
    }
}

/// Runs one capture end to end.
pub struct CaptureOrchestrator {
    config: Arc<StreamerConfig>,
    flag: String,
    registry: Arc<RecordingRegistry>,
    engine: Arc<dyn CaptureEngine>,
    transcoder: Arc<dyn Transcoder>,
}

impl CaptureOrchestrator {
    pub fn new(
        config: Arc<StreamerConfig>,
        registry: Arc<RecordingRegistry>,
        engine: Arc<dyn CaptureEngine>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Self {
        let flag = config.flag();
        Self {
            config,
            flag,
            registry,
            engine,
            transcoder,
        }
    }

    /// Capture `source` under `key`.
    ///
    /// Transfer failures are classified, logged and absorbed into the
    /// returned [`CaptureResult`]; the next poll cycle retries. Transcode
    /// failures propagate. The key leaves the registry on every path that
    /// reaches the transfer, success or not.
    pub async fn record(
        &self,
        source: Option<StreamSource>,
        key: &str,
        title: &str,
        source_format: &str,
    ) -> Result<CaptureResult> {
        let filename = derive_filename(&self.flag, title, source_format);

        let Some(source) = source else {
            error!(filename = %filename, "no available live stream");
            return Ok(CaptureResult::NoStream);
        };

        let path = self.config.output.join(&filename);
        info!(filename = %filename, "started recording");

        let result = self.write_stream(&source, key, &path, &filename).await;
        self.registry.unregister(key);

        if let CaptureResult::Completed { bytes_written } = &result {
            debug!(bytes = *bytes_written, "capture finished");
            if let Some(target) = self.target_format(source_format) {
                self.run_transcode(&path, &target).await?;
            }
        }

        info!(filename = %filename, "stopped recording");
        Ok(result)
    }

    async fn write_stream(
        &self,
        source: &StreamSource,
        key: &str,
        path: &Path,
        filename: &str,
    ) -> CaptureResult {
        debug!(url = %source.url, "obtained live stream link");

        let transfer = match self.engine.open(source, path).await {
            Ok(transfer) => transfer,
            Err(open_error) => {
                self.log_capture_error(&open_error, filename);
                return CaptureResult::Failed(open_error);
            }
        };

        if let Err(collision) =
            self.registry
                .register(key, transfer.capture_handle(), transfer.output_handle())
        {
            error!(key = %key, error = %collision, "refusing duplicate capture");
            transfer.capture_handle().close();
            transfer.output_handle().close();
            return CaptureResult::Failed(CaptureError::Other(collision.to_string()));
        }

        let output = transfer.output_handle();
        info!(filename = %filename, "recording in progress");

        let result = match transfer.run(true).await {
            Ok(bytes_written) => CaptureResult::Completed { bytes_written },
            Err(transfer_error) => {
                self.log_capture_error(&transfer_error, filename);
                CaptureResult::Failed(transfer_error)
            }
        };

        // Closed on every exit path, success included.
        output.close();
        result
    }

    fn log_capture_error(&self, error: &CaptureError, filename: &str) {
        match error {
            CaptureError::Timeout { .. } => {
                warn!(
                    filename = %filename,
                    error = %error,
                    "recording timed out; the streamer may be offline or the network unstable"
                );
            }
            CaptureError::Open { .. } => {
                warn!(
                    filename = %filename,
                    error = %error,
                    "error opening live stream; the streamer may not be live"
                );
            }
            CaptureError::Cancelled => {
                info!(filename = %filename, "recording cancelled");
            }
            _ => {
                error!(
                    filename = %filename,
                    error = ?error,
                    "error recording live stream"
                );
            }
        }
    }

    /// Target format for the transcode step, when one applies.
    fn target_format(&self, source_format: &str) -> Option<String> {
        self.config
            .format
            .as_deref()
            .filter(|target| !target.eq_ignore_ascii_case(source_format))
            .map(str::to_owned)
    }

    async fn run_transcode(&self, path: &Path, target: &str) -> Result<()> {
        let transcoded_path = path.with_extension(target);
        info!(output = %transcoded_path.display(), "starting ffmpeg processing");
        self.transcoder.transcode(path, &transcoded_path).await?;
        // The source is removed strictly after the transcoder reports
        // success; a failed transcode must never cost the only copy.
        tokio::fs::remove_file(path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::capture::{CaptureHandle, CaptureTransfer, OutputHandle};
    use crate::error::TranscodeError;
    use crate::registry::RecordingHandle;

    struct StubTransfer {
        capture: Arc<CaptureHandle>,
        output: Arc<OutputHandle>,
        payload: Vec<u8>,
    }

    #[async_trait]
    impl CaptureTransfer for StubTransfer {
        fn capture_handle(&self) -> Arc<dyn RecordingHandle> {
            self.capture.clone()
        }

        fn output_handle(&self) -> Arc<dyn RecordingHandle> {
            self.output.clone()
        }

        async fn run(self: Box<Self>, _progress: bool) -> Result<u64, CaptureError> {
            self.output.write(&self.payload)?;
            Ok(self.payload.len() as u64)
        }
    }

    struct StubEngine {
        payload: Vec<u8>,
        opens: AtomicUsize,
    }

    impl StubEngine {
        fn new(payload: &[u8]) -> Self {
            Self {
                payload: payload.to_vec(),
                opens: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CaptureEngine for StubEngine {
        async fn open(
            &self,
            _source: &StreamSource,
            dest: &Path,
        ) -> Result<Box<dyn CaptureTransfer>, CaptureError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(StubTransfer {
                capture: Arc::new(CaptureHandle::new()),
                output: Arc::new(OutputHandle::create(dest)?),
                payload: self.payload.clone(),
            }))
        }
    }

    struct StubTranscoder {
        succeed: bool,
        calls: AtomicUsize,
    }

    impl StubTranscoder {
        fn new(succeed: bool) -> Self {
            Self {
                succeed,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Transcoder for StubTranscoder {
        async fn transcode(&self, _input: &Path, output: &Path) -> Result<(), TranscodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                std::fs::write(output, b"transcoded")?;
                Ok(())
            } else {
                Err(TranscodeError::Spawn {
                    source: std::io::Error::other("stub transcoder failure"),
                })
            }
        }
    }

    fn orchestrator(
        output_dir: PathBuf,
        format: Option<&str>,
        engine: Arc<StubEngine>,
        transcoder: Arc<StubTranscoder>,
    ) -> CaptureOrchestrator {
        let mut config = StreamerConfig::new("x", "p");
        config.output = output_dir;
        config.format = format.map(str::to_owned);
        CaptureOrchestrator::new(
            Arc::new(config),
            Arc::new(RecordingRegistry::new()),
            engine,
            transcoder,
        )
    }

    #[tokio::test]
    async fn no_stream_never_touches_the_registry() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(StubEngine::new(b""));
        let transcoder = Arc::new(StubTranscoder::new(true));
        let orch = orchestrator(
            dir.path().to_path_buf(),
            None,
            engine.clone(),
            transcoder.clone(),
        );

        let result = orch.record(None, "key", "title", "ts").await.unwrap();
        assert!(matches!(result, CaptureResult::NoStream));
        assert_eq!(engine.opens.load(Ordering::SeqCst), 0);
        assert!(orch.registry.is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn completed_capture_without_target_format_skips_transcode() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(StubEngine::new(b"stream-bytes"));
        let transcoder = Arc::new(StubTranscoder::new(true));
        let orch = orchestrator(
            dir.path().to_path_buf(),
            None,
            engine.clone(),
            transcoder.clone(),
        );

        let source = Some(StreamSource::new("https://cdn.example.com/live.ts"));
        let result = orch.record(source, "key", "Test/Stream", "ts").await.unwrap();

        assert!(matches!(
            result,
            CaptureResult::Completed { bytes_written: 12 }
        ));
        assert_eq!(transcoder.calls.load(Ordering::SeqCst), 0);
        assert!(orch.registry.is_empty());

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].contains("Test／Stream"));
        assert!(entries[0].ends_with(".ts"));
    }

    #[tokio::test]
    async fn successful_transcode_deletes_the_source_file() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(StubEngine::new(b"stream-bytes"));
        let transcoder = Arc::new(StubTranscoder::new(true));
        let orch = orchestrator(
            dir.path().to_path_buf(),
            Some("mp4"),
            engine.clone(),
            transcoder.clone(),
        );

        let source = Some(StreamSource::new("https://cdn.example.com/live.ts"));
        orch.record(source, "key", "title", "ts").await.unwrap();

        assert_eq!(transcoder.calls.load(Ordering::SeqCst), 1);
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].ends_with(".mp4"));
    }

    #[tokio::test]
    async fn failed_transcode_propagates_and_keeps_the_source_file() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(StubEngine::new(b"stream-bytes"));
        let transcoder = Arc::new(StubTranscoder::new(false));
        let orch = orchestrator(
            dir.path().to_path_buf(),
            Some("mp4"),
            engine.clone(),
            transcoder.clone(),
        );

        let source = Some(StreamSource::new("https://cdn.example.com/live.ts"));
        let result = orch.record(source, "key", "title", "ts").await;

        assert!(matches!(result, Err(EngineError::Transcode(_))));
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].ends_with(".ts"));
        // The key still leaves the registry before the transcode step.
        assert!(orch.registry.is_empty());
    }

    #[tokio::test]
    async fn matching_source_format_skips_transcode() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(StubEngine::new(b"bytes"));
        let transcoder = Arc::new(StubTranscoder::new(true));
        let orch = orchestrator(
            dir.path().to_path_buf(),
            Some("ts"),
            engine,
            transcoder.clone(),
        );

        let source = Some(StreamSource::new("https://cdn.example.com/live.ts"));
        orch.record(source, "key", "title", "ts").await.unwrap();
        assert_eq!(transcoder.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn target_format_comparison_is_case_insensitive() {
        let engine = Arc::new(StubEngine::new(b""));
        let transcoder = Arc::new(StubTranscoder::new(true));
        let orch = orchestrator(PathBuf::from("output"), Some("TS"), engine, transcoder);
        assert_eq!(orch.target_format("ts"), None);
        assert_eq!(orch.target_format("flv"), Some("TS".to_string()));
    }
}
