//! Channel membership events and the per-channel endpoint registry.

use crate::shared::SharedStore;
use parking_lot::{Mutex, RwLock};
use ripple_store::Subscription;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Membership change announced through [`ChannelEvents::notify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelEvent {
    Added,
    Removed,
}

type ChannelListener = Arc<dyn Fn(&str, ChannelEvent) + Send + Sync>;

/// Membership bus shared between endpoints and registries.
///
/// Holds the default channel name and fans membership changes out to
/// subscribers synchronously, in registration order. Clones share the bus.
#[derive(Clone)]
pub struct ChannelEvents {
    inner: Arc<EventsInner>,
}

struct EventsInner {
    default_channel: RwLock<String>,
    listeners: Mutex<Vec<(u64, ChannelListener)>>,
    next_id: AtomicU64,
}

impl ChannelEvents {
    pub fn new(default_channel: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EventsInner {
                default_channel: RwLock::new(default_channel.into()),
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    pub fn default_channel(&self) -> String {
        self.inner.default_channel.read().clone()
    }

    pub fn set_default(&self, channel: impl Into<String>) {
        *self.inner.default_channel.write() = channel.into();
    }

    /// Announce a membership change. Listeners run synchronously, so lazy
    /// endpoint creation has happened by the time this returns.
    pub fn notify(&self, channel: &str, event: ChannelEvent) {
        let listeners: Vec<ChannelListener> = self
            .inner
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(channel, event);
        }
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&str, ChannelEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().push((id, Arc::new(listener)));

        let inner = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.listeners.lock().retain(|(entry, _)| *entry != id);
            }
        })
    }
}

impl Default for ChannelEvents {
    fn default() -> Self {
        Self::new("")
    }
}

type Factory<S> = Arc<dyn Fn(&str) -> SharedStore<S> + Send + Sync>;

/// Lazily creates and caches one shared endpoint per channel.
///
/// `Added` notifications create endpoints on demand, idempotently; `Removed`
/// shuts the endpoint down and discards it, releasing its port handler. The
/// default channel's endpoint is created eagerly so a master is always
/// listening for registrations.
pub struct ChannelRegistry<S> {
    inner: Arc<RegistryInner<S>>,
    _membership: Subscription,
}

struct RegistryInner<S> {
    events: ChannelEvents,
    factory: Factory<S>,
    stores: Mutex<HashMap<String, SharedStore<S>>>,
}

impl<S: Clone + Send + Sync + 'static> ChannelRegistry<S> {
    pub fn new(
        events: ChannelEvents,
        factory: impl Fn(&str) -> SharedStore<S> + Send + Sync + 'static,
    ) -> Self {
        let inner = Arc::new(RegistryInner {
            events: events.clone(),
            factory: Arc::new(factory),
            stores: Mutex::new(HashMap::new()),
        });

        let membership = {
            let inner = inner.clone();
            events.subscribe(move |channel, event| match event {
                ChannelEvent::Added => {
                    inner.ensure(channel);
                }
                ChannelEvent::Removed => {
                    if let Some(store) = inner.stores.lock().remove(channel) {
                        tracing::debug!(channel, "tearing down channel endpoint");
                        store.shutdown();
                    }
                }
            })
        };

        inner.ensure(&events.default_channel());

        Self {
            inner,
            _membership: membership,
        }
    }

    /// Endpoint for the default channel.
    pub fn default(&self) -> SharedStore<S> {
        self.channel(&self.inner.events.default_channel())
    }

    /// Endpoint for `channel`, created on first access.
    pub fn channel(&self, channel: &str) -> SharedStore<S> {
        self.inner.ensure(channel)
    }

    /// Channels with a live endpoint.
    pub fn active_channels(&self) -> Vec<String> {
        self.inner.stores.lock().keys().cloned().collect()
    }

    pub fn events(&self) -> &ChannelEvents {
        &self.inner.events
    }
}

impl<S: Clone + Send + Sync + 'static> RegistryInner<S> {
    fn ensure(&self, channel: &str) -> SharedStore<S> {
        let mut stores = self.stores.lock();
        if let Some(existing) = stores.get(channel) {
            return existing.clone();
        }
        tracing::debug!(channel, "creating channel endpoint");
        let created = (self.factory)(channel);
        stores.insert(channel.to_string(), created.clone());
        created
    }
}
