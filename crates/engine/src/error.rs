use thiserror::Error;

pub type Result<T, E = EngineError> = std::result::Result<T, E>;

/// Transport-level failure categories.
///
/// Every low-level error raised by a status-check request collapses into one
/// of these; the polling loop only cares that the failure is
/// connection-shaped (rebuild the client, keep looping) and whether it is
/// benign enough to keep out of the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    /// Protocol violation while talking to the platform (truncated body,
    /// bad frame, mid-stream decode failure). Common noise during live
    /// status detection.
    Protocol,
    /// Generic request failure: connect, timeout, DNS, TLS.
    Request,
    /// Failure attributable to the configured proxy.
    Proxy,
}

/// Uniform classification of a failed status-check request.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ConnectionError {
    pub kind: ConnectionKind,
    pub message: String,
}

impl ConnectionError {
    pub fn new(kind: ConnectionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Protocol noise during detection is expected and not worth logging.
    pub fn is_benign(&self) -> bool {
        self.kind == ConnectionKind::Protocol
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("unsupported platform `{0}`")]
    UnsupportedPlatform(String),

    #[error("platform error: {0}")]
    Platform(String),

    #[error("invalid streamer config: {0}")]
    Config(String),

    #[error("a recording is already registered for `{0}`")]
    DuplicateRecording(String),

    #[error("http client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("transcode error: {0}")]
    Transcode(#[from] TranscodeError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a single capture transfer.
///
/// The orchestrator logs each variant differently: timeouts and open
/// failures are routine (the streamer dropped or was never really live),
/// everything else gets full diagnostics.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("live stream recording timeout: {reason}")]
    Timeout { reason: String },

    #[error("unable to open live stream: {reason}")]
    Open { reason: String },

    #[error("capture cancelled")]
    Cancelled,

    #[error("i/o error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("failed to spawn ffmpeg: {source}")]
    Spawn { source: std::io::Error },

    #[error("ffmpeg exited with {status}: {stderr}")]
    Failed {
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("i/o error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}
