//! Role selection and the shared-store handle.

use crate::channels::ChannelEvents;
use crate::{master, replica, MASTER_PORT_ID};
use ripple_store::{Reducers, Store};
use ripple_transport::Port;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::ops::Deref;
use std::sync::Arc;

/// Replication role of an endpoint, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Master,
    Replica,
}

/// Options for [`shared_store`].
pub struct SyncOptions<S> {
    pub name: String,
    pub channel: String,
    pub port: Arc<dyn Port>,
    pub channels: Option<ChannelEvents>,
    pub state: S,
    pub reducers: Reducers<S>,
}

impl<S> SyncOptions<S> {
    /// Options for `name` on the default (empty) channel.
    pub fn new(
        name: impl Into<String>,
        port: Arc<dyn Port>,
        state: S,
        reducers: Reducers<S>,
    ) -> Self {
        Self {
            name: name.into(),
            channel: String::new(),
            port,
            channels: None,
            state,
            reducers,
        }
    }

    /// Scope the endpoint to `channel` instead of the default channel.
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// Attach a channel membership bus: the master answers registrations
    /// through it, and replicas announce themselves before requesting state.
    pub fn with_channels(mut self, channels: ChannelEvents) -> Self {
        self.channels = Some(channels);
        self
    }
}

pub(crate) trait EndpointControl: Send + Sync {
    fn role(&self) -> Role;
    fn shutdown(&self);
}

/// A store wired to the replication protocol, plus its endpoint controls.
///
/// Derefs to the underlying [`Store`]; cloning yields another handle to the
/// same endpoint.
pub struct SharedStore<S> {
    store: Store<S>,
    endpoint: Arc<dyn EndpointControl>,
}

impl<S> Clone for SharedStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            endpoint: self.endpoint.clone(),
        }
    }
}

impl<S> SharedStore<S> {
    pub(crate) fn new(store: Store<S>, endpoint: Arc<dyn EndpointControl>) -> Self {
        Self { store, endpoint }
    }

    pub fn store(&self) -> &Store<S> {
        &self.store
    }

    pub fn role(&self) -> Role {
        self.endpoint.role()
    }

    /// Release the endpoint's port handler and stop processing. Idempotent.
    ///
    /// On a replica this also drops its pending correlations, so in-flight
    /// dispatches resolve with [`StoreError::Abandoned`](ripple_store::StoreError).
    pub fn shutdown(&self) {
        self.endpoint.shutdown();
    }
}

impl<S> Deref for SharedStore<S> {
    type Target = Store<S>;

    fn deref(&self) -> &Store<S> {
        &self.store
    }
}

/// Build a store replicated over `options.port`.
///
/// The port whose id equals [`MASTER_PORT_ID`] owns the authoritative copy;
/// every other port becomes a replica of it. Must be called within a tokio
/// runtime: replica initialization runs as a spawned task.
pub fn shared_store<S>(options: SyncOptions<S>) -> SharedStore<S>
where
    S: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    if options.port.id() == MASTER_PORT_ID {
        master::build(options)
    } else {
        replica::build(options)
    }
}
