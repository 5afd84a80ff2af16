//! Process-wide table of in-flight recordings.
//!
//! The registry is the only state shared across recorder tasks. It exists so
//! the shutdown path can enumerate every open capture/output handle pair and
//! force-close them — task cancellation alone does not reliably stop an
//! in-flight transfer, closing its handles does.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{EngineError, Result};

/// One side of an active recording: the read side of the stream transfer or
/// the write side of the destination file.
///
/// `close` must be idempotent, must never panic, and must be safe to call
/// from any thread while the transfer is still running.
pub trait RecordingHandle: Send + Sync {
    fn close(&self);
}

/// Handle pair for one in-flight capture.
#[derive(Clone)]
pub struct ActiveRecording {
    pub capture: Arc<dyn RecordingHandle>,
    pub output: Arc<dyn RecordingHandle>,
}

/// Synchronized map of stream key → [`ActiveRecording`].
#[derive(Default)]
pub struct RecordingRegistry {
    entries: Mutex<HashMap<String, ActiveRecording>>,
}

impl RecordingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a handle pair under `key`. Fails with
    /// [`EngineError::DuplicateRecording`] when the key is already present —
    /// a collision means some other task is already writing this stream.
    pub fn register(
        &self,
        key: &str,
        capture: Arc<dyn RecordingHandle>,
        output: Arc<dyn RecordingHandle>,
    ) -> Result<()> {
        let mut entries = self.entries.lock();
        if entries.contains_key(key) {
            return Err(EngineError::DuplicateRecording(key.to_string()));
        }
        entries.insert(key.to_string(), ActiveRecording { capture, output });
        Ok(())
    }

    /// Remove the entry for `key`. No-op when absent.
    pub fn unregister(&self, key: &str) -> Option<ActiveRecording> {
        self.entries.lock().remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Stable copy of all entries at call time. Concurrent mutation after
    /// the snapshot is taken does not affect iteration.
    pub fn snapshot(&self) -> Vec<(String, ActiveRecording)> {
        self.entries
            .lock()
            .iter()
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect()
    }

    /// Close every registered handle pair, capture side first.
    ///
    /// Used during shutdown. Handles are idempotent and infallible, so the
    /// sweep always completes; already-closed handles are tolerated.
    pub fn close_all(&self) {
        for (key, entry) in self.snapshot() {
            debug!(key = %key, "closing in-flight recording");
            entry.capture.close();
            entry.output.close();
        }
    }
}
