//! Port abstraction: an addressable, fire-and-forget message endpoint.

use crate::wire::Message;
use std::sync::Arc;

/// Handler invoked for every message delivered to a port.
pub type MessageHandler = Arc<dyn Fn(&Message) + Send + Sync>;

/// Addressable endpoint connecting execution contexts.
///
/// `send` is fire-and-forget: implementations deliver asynchronously
/// relative to the send and owe their users per-destination FIFO order,
/// nothing more. Dropped messages are not surfaced.
pub trait Port: Send + Sync {
    /// This endpoint's identity.
    fn id(&self) -> &str;

    /// Queue `message` for delivery to the port named `to`.
    fn send(&self, to: &str, message: Message);

    /// Register a delivery handler. The registration lives until the
    /// returned guard is dropped or released.
    fn on_message(&self, handler: MessageHandler) -> HandlerGuard;
}

/// Scoped handler registration; dropping it unregisters the handler.
pub struct HandlerGuard {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl HandlerGuard {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Unregister now instead of at drop time.
    pub fn release(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for HandlerGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}
