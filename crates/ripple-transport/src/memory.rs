//! In-process hub transport.

use crate::port::{HandlerGuard, MessageHandler, Port};
use crate::wire::Message;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

type HandlerTable = Arc<Mutex<Vec<(u64, MessageHandler)>>>;

/// Hub connecting any number of in-process ports by id.
///
/// Each port gets an unbounded queue drained by its own delivery task, so
/// sends complete immediately and handlers run on a later scheduler turn —
/// the same decoupling a real cross-context transport exhibits. Sends to ids
/// with no registered port are dropped. Per-destination FIFO holds by
/// construction.
#[derive(Clone, Default)]
pub struct MemoryHub {
    inner: Arc<HubInner>,
}

#[derive(Default)]
struct HubInner {
    ports: Mutex<HashMap<String, mpsc::UnboundedSender<Message>>>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the port named `id` and return its handle.
    ///
    /// Must be called from within a tokio runtime: the delivery pump is a
    /// spawned task. Replacing a port id closes the previous queue; anything
    /// still in flight toward the old port is lost.
    pub fn port(&self, id: impl Into<String>) -> MemoryPort {
        let id = id.into();
        let handlers: HandlerTable = Arc::new(Mutex::new(Vec::new()));
        let (queue, mut delivery) = mpsc::unbounded_channel::<Message>();
        self.inner.ports.lock().insert(id.clone(), queue);

        let pump_handlers = handlers.clone();
        tokio::spawn(async move {
            while let Some(message) = delivery.recv().await {
                // Snapshot the table so handlers may register or release
                // other handlers while one of them runs.
                let snapshot: Vec<MessageHandler> = pump_handlers
                    .lock()
                    .iter()
                    .map(|(_, handler)| handler.clone())
                    .collect();
                for handler in snapshot {
                    handler(&message);
                }
            }
        });

        MemoryPort {
            id,
            hub: self.inner.clone(),
            handlers,
            next_handler: Arc::new(AtomicU64::new(0)),
        }
    }
}

/// One endpoint on a [`MemoryHub`].
#[derive(Clone)]
pub struct MemoryPort {
    id: String,
    hub: Arc<HubInner>,
    handlers: HandlerTable,
    next_handler: Arc<AtomicU64>,
}

impl Port for MemoryPort {
    fn id(&self) -> &str {
        &self.id
    }

    fn send(&self, to: &str, message: Message) {
        let destination = self.hub.ports.lock().get(to).cloned();
        match destination {
            Some(queue) => {
                // A closed queue means the destination was replaced; the
                // message is lost either way.
                if queue.send(message).is_err() {
                    tracing::debug!(to, "dropped message for closed port");
                }
            }
            None => tracing::debug!(to, "dropped message for unknown port"),
        }
    }

    fn on_message(&self, handler: MessageHandler) -> HandlerGuard {
        let id = self.next_handler.fetch_add(1, Ordering::Relaxed);
        self.handlers.lock().push((id, handler));

        let handlers = Arc::downgrade(&self.handlers);
        HandlerGuard::new(move || {
            if let Some(handlers) = handlers.upgrade() {
                handlers.lock().retain(|(entry, _)| *entry != id);
            }
        })
    }
}
