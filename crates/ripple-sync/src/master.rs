//! Master endpoint: the single writer for a (name, channel) pair.

use crate::channels::{ChannelEvent, ChannelEvents};
use crate::shared::{EndpointControl, Role, SharedStore, SyncOptions};
use async_trait::async_trait;
use parking_lot::Mutex;
use ripple_store::{Initializer, Interceptor, ReadyGate, Store, StoreError, StoreHooks};
use ripple_transport::{ActionFrame, Frame, HandlerGuard, Message, MessageHandler, Port};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

pub(crate) struct MasterEndpoint {
    port: Arc<dyn Port>,
    name: String,
    channel: String,
    channels: Option<ChannelEvents>,
    mirrors: Mutex<HashSet<String>>,
    guard: Mutex<Option<HandlerGuard>>,
}

pub(crate) fn build<S>(options: SyncOptions<S>) -> SharedStore<S>
where
    S: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    let SyncOptions {
        name,
        channel,
        port,
        channels,
        state,
        reducers,
    } = options;

    let endpoint = Arc::new(MasterEndpoint {
        port,
        name,
        channel,
        channels,
        mirrors: Mutex::new(HashSet::new()),
        guard: Mutex::new(None),
    });

    let interceptor: Arc<dyn Interceptor<S>> = endpoint.clone();
    let initialize: Initializer<S> = Box::new({
        let endpoint = endpoint.clone();
        move |store: Store<S>, gate: ReadyGate| {
            let handler: MessageHandler = {
                let endpoint = endpoint.clone();
                Arc::new(move |message: &Message| endpoint.handle(&store, message))
            };
            *endpoint.guard.lock() = Some(endpoint.port.on_message(handler));
            // The master needs nothing from the outside world; it is usable
            // as soon as it is listening.
            gate.resolve();
        }
    });

    let store = Store::with_hooks(
        state,
        reducers,
        StoreHooks {
            interceptor: Some(interceptor),
            initialize: Some(initialize),
        },
    );

    SharedStore::new(store, endpoint)
}

impl MasterEndpoint {
    fn mirror_ids(&self) -> Vec<String> {
        self.mirrors.lock().iter().cloned().collect()
    }

    fn broadcast(&self, frame: ActionFrame) {
        for mirror in self.mirror_ids() {
            self.port.send(
                &mirror,
                Message::forward_replica(self.port.id(), &self.name, &self.channel, frame.clone()),
            );
        }
    }

    fn handle<S>(&self, store: &Store<S>, message: &Message)
    where
        S: Clone + Serialize + Send + Sync + 'static,
    {
        if message.name != self.name {
            return;
        }

        // Registration rides on the joining replica's channel, so it is
        // examined before the channel filter; only the endpoint serving the
        // bus's default channel answers.
        if let Frame::RegisterReplica = message.frame {
            if let Some(channels) = &self.channels {
                if self.channel == channels.default_channel() {
                    tracing::debug!(
                        name = %self.name,
                        channel = %message.channel,
                        replica = %message.port_id,
                        "replica registering"
                    );
                    channels.notify(&message.channel, ChannelEvent::Added);
                    self.port.send(
                        &message.port_id,
                        Message::register_success(self.port.id(), &self.name, &message.channel),
                    );
                }
            }
            return;
        }

        if !message.matches_scope(&self.name, &self.channel) {
            return;
        }

        match &message.frame {
            Frame::StateRequest => {
                self.mirrors.lock().insert(message.port_id.clone());
                match serde_json::to_value(store.state()) {
                    Ok(snapshot) => {
                        tracing::debug!(
                            name = %self.name,
                            channel = %self.channel,
                            replica = %message.port_id,
                            "serving state snapshot"
                        );
                        self.port.send(
                            &message.port_id,
                            Message::state_response(
                                self.port.id(),
                                &self.name,
                                &self.channel,
                                snapshot,
                            ),
                        );
                    }
                    Err(error) => tracing::warn!(
                        name = %self.name,
                        channel = %self.channel,
                        %error,
                        "state snapshot could not be encoded"
                    ),
                }
            }
            Frame::ForwardMaster(frame) => {
                // Apply exactly once, then fan out to every mirror — the
                // sender included, so the originator can correlate
                // completion.
                if let Err(error) = store.apply(&frame.action, &frame.payload) {
                    tracing::warn!(
                        name = %self.name,
                        channel = %self.channel,
                        action = %frame.action,
                        %error,
                        "relayed action rejected"
                    );
                    return;
                }
                self.broadcast(frame.clone());
            }
            _ => {}
        }
    }
}

#[async_trait]
impl<S> Interceptor<S> for MasterEndpoint
where
    S: Clone + Send + Sync + 'static,
{
    async fn intercept(
        &self,
        store: &Store<S>,
        action: &str,
        payload: Vec<Value>,
    ) -> Result<Vec<Value>, StoreError> {
        self.broadcast(ActionFrame::new(action, payload.clone()));
        store.apply(action, &payload)
    }
}

impl EndpointControl for MasterEndpoint {
    fn role(&self) -> Role {
        Role::Master
    }

    fn shutdown(&self) {
        if let Some(guard) = self.guard.lock().take() {
            guard.release();
        }
    }
}
