//! Livrec engine: the platform-agnostic live recording core.
//!
//! One [`recorder::LiveRecorder`] per configured streamer polls its
//! platform's live status forever, tolerating transient network failure
//! indefinitely. When a channel goes live, the capture is handed off to a
//! dedicated task that registers its handles in the shared
//! [`registry::RecordingRegistry`], streams the broadcast to disk and
//! optionally transcodes the result. On shutdown the
//! [`shutdown::ShutdownCoordinator`] force-closes every registered handle
//! so no transfer outlives the process.
//!
//! Platform status checks, stream capture and transcoding are capability
//! ports ([`platform::PlatformClient`], [`capture::CaptureEngine`],
//! [`transcode::Transcoder`]); the in-tree implementations cover direct
//! media URLs and ffmpeg.

pub mod capture;
pub mod config;
pub mod error;
pub mod filename;
pub mod platform;
pub mod recorder;
pub mod registry;
pub mod session;
pub mod shutdown;
pub mod transcode;

pub use capture::{CaptureEngine, CaptureHandle, CaptureTransfer, HttpCaptureEngine, OutputHandle};
pub use config::StreamerConfig;
pub use error::{CaptureError, ConnectionError, ConnectionKind, EngineError, Result, TranscodeError};
pub use platform::{LiveStatus, PlatformClient, PlatformFactory, StreamLocator, StreamSource};
pub use recorder::{CaptureOrchestrator, CaptureResult, LiveRecorder};
pub use registry::{ActiveRecording, RecordingHandle, RecordingRegistry};
pub use session::HttpSession;
pub use shutdown::ShutdownCoordinator;
pub use transcode::{FfmpegTranscoder, Transcoder};
