//! Shutdown sweep for in-flight recordings.
//!
//! Cancelling the recorder tasks is not enough to stop a live transfer —
//! the task may be parked deep inside a read that only terminates when its
//! handles are closed. The coordinator therefore force-closes every
//! registered handle pair once shutdown is requested, regardless of which
//! tasks have already observed cancellation.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::registry::RecordingRegistry;

pub struct ShutdownCoordinator {
    registry: Arc<RecordingRegistry>,
    token: CancellationToken,
}

impl ShutdownCoordinator {
    pub fn new(registry: Arc<RecordingRegistry>) -> Self {
        Self {
            registry,
            token: CancellationToken::new(),
        }
    }

    /// Child token for one recorder task.
    pub fn subscribe(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Signal every subscribed task to stop. Idempotent.
    pub fn request_shutdown(&self) {
        self.token.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait for a shutdown request, then close every registered handle
    /// pair. Logs a single warning; close failures never abort the sweep.
    pub async fn run(&self) {
        self.token.cancelled().await;
        warn!("recording interrupted, closing live streams");
        self.registry.close_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::registry::RecordingHandle;

    #[derive(Default)]
    struct CountingHandle {
        closes: AtomicUsize,
    }

    impl RecordingHandle for CountingHandle {
        fn close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn sweep_closes_every_registered_pair_once() {
        let registry = Arc::new(RecordingRegistry::new());
        let coordinator = Arc::new(ShutdownCoordinator::new(registry.clone()));

        let handles: Vec<Arc<CountingHandle>> =
            (0..4).map(|_| Arc::new(CountingHandle::default())).collect();
        registry
            .register("a", handles[0].clone(), handles[1].clone())
            .unwrap();
        registry
            .register("b", handles[2].clone(), handles[3].clone())
            .unwrap();

        let sweeper = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.run().await }
        });

        coordinator.request_shutdown();
        tokio::time::timeout(Duration::from_secs(1), sweeper)
            .await
            .unwrap()
            .unwrap();

        for handle in &handles {
            assert_eq!(handle.closes.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn subscribed_tokens_observe_shutdown() {
        let registry = Arc::new(RecordingRegistry::new());
        let coordinator = ShutdownCoordinator::new(registry);

        let child = coordinator.subscribe();
        assert!(!child.is_cancelled());
        coordinator.request_shutdown();
        assert!(child.is_cancelled());
        assert!(coordinator.is_shutting_down());
    }

    #[tokio::test]
    async fn sweep_with_empty_registry_completes() {
        let registry = Arc::new(RecordingRegistry::new());
        let coordinator = ShutdownCoordinator::new(registry);
        coordinator.request_shutdown();
        coordinator.run().await;
    }
}
