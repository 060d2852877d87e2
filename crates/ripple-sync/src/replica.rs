//! Replica endpoint: applies only what the master confirms.

use crate::shared::{EndpointControl, Role, SharedStore, SyncOptions};
use crate::MASTER_PORT_ID;
use async_trait::async_trait;
use parking_lot::Mutex;
use ripple_store::{Initializer, Interceptor, ReadyGate, Store, StoreError, StoreHooks};
use ripple_transport::{ActionFrame, Frame, HandlerGuard, Message, MessageHandler, Port};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

pub(crate) struct ReplicaEndpoint {
    port: Arc<dyn Port>,
    name: String,
    channel: String,
    /// Whether a membership bus is attached, i.e. the master side runs a
    /// channel registry that wants an announcement before the state request.
    register: bool,
    registered: ReadyGate,
    next_action: AtomicU64,
    pending: Mutex<HashMap<String, oneshot::Sender<Vec<Value>>>>,
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

    let endpoint = Arc::new(ReplicaEndpoint {
        port,
        name,
        channel,
        register: channels.is_some(),
        registered: ReadyGate::new(),
        next_action: AtomicU64::new(0),
        pending: Mutex::new(HashMap::new()),
        guard: Mutex::new(None),
    });

    let interceptor: Arc<dyn Interceptor<S>> = endpoint.clone();
    let initialize: Initializer<S> = Box::new({
        let endpoint = endpoint.clone();
        move |store: Store<S>, gate: ReadyGate| {
            let handler: MessageHandler = {
                let endpoint = endpoint.clone();
                Arc::new(move |message: &Message| endpoint.handle(&store, &gate, message))
            };
            *endpoint.guard.lock() = Some(endpoint.port.on_message(handler));

            // The handler is live; announcing and requesting state can take
            // as many scheduler turns as they need.
            tokio::spawn(async move { endpoint.hydrate().await });
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

impl ReplicaEndpoint {
    /// Announce on the membership bus when one is attached, then request the
    /// snapshot whose arrival resolves readiness.
    async fn hydrate(&self) {
        if self.register {
            self.port.send(
                MASTER_PORT_ID,
                Message::register_replica(self.port.id(), &self.name, &self.channel),
            );
            self.registered.wait().await;
        }
        self.port.send(
            MASTER_PORT_ID,
            Message::state_request(self.port.id(), &self.name, &self.channel),
        );
    }

    fn handle<S>(&self, store: &Store<S>, ready: &ReadyGate, message: &Message)
    where
        S: Clone + DeserializeOwned + Send + Sync + 'static,
    {
        if !message.matches_scope(&self.name, &self.channel) {
            return;
        }

        match &message.frame {
            Frame::RegisterSuccess => self.registered.resolve(),
            Frame::StateResponse(snapshot) => {
                match serde_json::from_value::<S>(snapshot.clone()) {
                    Ok(state) => {
                        tracing::debug!(
                            name = %self.name,
                            channel = %self.channel,
                            "hydrated from master snapshot"
                        );
                        store.set_state(state);
                        ready.resolve();
                    }
                    Err(error) => tracing::warn!(
                        name = %self.name,
                        channel = %self.channel,
                        %error,
                        "state snapshot could not be decoded"
                    ),
                }
            }
            Frame::ForwardReplica(frame) => {
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
                if let Some(id) = &frame.id {
                    // Stale or foreign correlation ids fall through silently.
                    if let Some(resolve) = self.pending.lock().remove(id) {
                        let _ = resolve.send(frame.payload.clone());
                    }
                }
            }
            _ => {}
        }
    }
}

#[async_trait]
impl<S> Interceptor<S> for ReplicaEndpoint
where
    S: Clone + Send + Sync + 'static,
{
    async fn intercept(
        &self,
        _store: &Store<S>,
        action: &str,
        payload: Vec<Value>,
    ) -> Result<Vec<Value>, StoreError> {
        let id = format!(
            "{}_{}",
            self.port.id(),
            self.next_action.fetch_add(1, Ordering::Relaxed)
        );
        let (resolve, resolved) = oneshot::channel();
        self.pending.lock().insert(id.clone(), resolve);

        self.port.send(
            MASTER_PORT_ID,
            Message::forward_master(
                self.port.id(),
                &self.name,
                &self.channel,
                ActionFrame::with_id(id, action, payload),
            ),
        );

        // The local reducer runs only when the master's relay comes back;
        // this resolves with the confirmed payload.
        resolved.await.map_err(|_| StoreError::Abandoned)
    }
}

impl EndpointControl for ReplicaEndpoint {
    fn role(&self) -> Role {
        Role::Replica
    }

    fn shutdown(&self) {
        if let Some(guard) = self.guard.lock().take() {
            guard.release();
        }
        // Nothing can resolve a correlation once the handler is gone;
        // dropping the senders fails the in-flight dispatches instead of
        // leaving them pending forever.
        self.pending.lock().clear();
    }
}
