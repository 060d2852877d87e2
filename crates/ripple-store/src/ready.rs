//! Single-resolution readiness gate.

use std::sync::Arc;
use tokio::sync::watch;

/// Gate that resolves exactly once.
///
/// Waits registered before or after resolution observe the same outcome, and
/// resolving more than once is a no-op. Clones share the same gate.
#[derive(Clone)]
pub struct ReadyGate {
    resolved: Arc<watch::Sender<bool>>,
}

impl ReadyGate {
    pub fn new() -> Self {
        let (resolved, _) = watch::channel(false);
        Self {
            resolved: Arc::new(resolved),
        }
    }

    /// Mark the gate resolved. Idempotent.
    pub fn resolve(&self) {
        self.resolved.send_replace(true);
    }

    pub fn is_ready(&self) -> bool {
        *self.resolved.borrow()
    }

    /// Wait until the gate resolves; returns immediately if it already has.
    pub async fn wait(&self) {
        let mut watcher = self.resolved.subscribe();
        // The send half lives as long as `self`, so the channel cannot close
        // while we are waiting on it.
        let _ = watcher.wait_for(|resolved| *resolved).await;
    }
}

impl Default for ReadyGate {
    fn default() -> Self {
        Self::new()
    }
}
