//! Reducer-driven store with interceptable dispatch.

use crate::cell::{StateCell, Subscription};
use crate::error::StoreError;
use crate::ready::ReadyGate;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Pure state projection: previous state plus action arguments to next state.
pub type Reducer<S> = Arc<dyn Fn(&S, &[Value]) -> S + Send + Sync>;

/// Name of the built-in action that restores the construction-time state.
pub const RESET_ACTION: &str = "reset";

/// Immutable reducer table, keyed by action name.
pub struct Reducers<S> {
    map: HashMap<String, Reducer<S>>,
}

impl<S> Reducers<S> {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Register a reducer under `name`, replacing any previous entry.
    pub fn with(
        mut self,
        name: impl Into<String>,
        reducer: impl Fn(&S, &[Value]) -> S + Send + Sync + 'static,
    ) -> Self {
        self.map.insert(name.into(), Arc::new(reducer));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }
}

impl<S> Clone for Reducers<S> {
    fn clone(&self) -> Self {
        Self {
            map: self.map.clone(),
        }
    }
}

impl<S> Default for Reducers<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Interception hook for the public dispatch path.
///
/// When configured, [`Store::dispatch`] hands every call here instead of
/// applying the reducer directly. Implementations may complete immediately,
/// or defer until some external confirmation arrives; either way the caller
/// receives the action's payload on success.
#[async_trait]
pub trait Interceptor<S>: Send + Sync {
    async fn intercept(
        &self,
        store: &Store<S>,
        action: &str,
        payload: Vec<Value>,
    ) -> Result<Vec<Value>, StoreError>;
}

/// Initialization routine invoked at the end of construction.
///
/// When present it owns readiness: the store counts as usable only once the
/// routine (or something it arranged) resolves the gate it was handed.
pub type Initializer<S> = Box<dyn FnOnce(Store<S>, ReadyGate) + Send>;

/// Optional construction hooks.
pub struct StoreHooks<S> {
    pub interceptor: Option<Arc<dyn Interceptor<S>>>,
    pub initialize: Option<Initializer<S>>,
}

impl<S> Default for StoreHooks<S> {
    fn default() -> Self {
        Self {
            interceptor: None,
            initialize: None,
        }
    }
}

type ActionListener = Arc<dyn Fn(&[Value]) + Send + Sync>;

struct ListenerEntry {
    id: u64,
    action: String,
    listener: ActionListener,
}

/// Reducer-driven state container.
///
/// Cloning yields another handle to the same container.
pub struct Store<S> {
    inner: Arc<StoreInner<S>>,
}

struct StoreInner<S> {
    cell: StateCell<S>,
    reducers: HashMap<String, Reducer<S>>,
    interceptor: Option<Arc<dyn Interceptor<S>>>,
    listeners: Mutex<Vec<ListenerEntry>>,
    next_listener: AtomicU64,
    ready: ReadyGate,
}

impl<S> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: Clone + Send + Sync + 'static> Store<S> {
    /// Build a store with no hooks: dispatch applies reducers directly and
    /// readiness resolves before this returns.
    pub fn new(state: S, reducers: Reducers<S>) -> Self {
        Self::with_hooks(state, reducers, StoreHooks::default())
    }

    pub fn with_hooks(state: S, reducers: Reducers<S>, hooks: StoreHooks<S>) -> Self {
        let mut map = reducers.map;
        let initial = state.clone();
        // A user-supplied `reset` reducer takes precedence over the built-in.
        map.entry(RESET_ACTION.to_string())
            .or_insert_with(|| Arc::new(move |_: &S, _: &[Value]| initial.clone()) as Reducer<S>);

        let ready = ReadyGate::new();
        let store = Store {
            inner: Arc::new(StoreInner {
                cell: StateCell::new(state),
                reducers: map,
                interceptor: hooks.interceptor,
                listeners: Mutex::new(Vec::new()),
                next_listener: AtomicU64::new(0),
                ready: ready.clone(),
            }),
        };

        match hooks.initialize {
            Some(initialize) => initialize(store.clone(), ready),
            None => ready.resolve(),
        }

        store
    }

    /// Current state value.
    pub fn state(&self) -> S {
        self.inner.cell.get()
    }

    /// Replace the state wholesale, notifying subscribers.
    pub fn set_state(&self, next: S) {
        self.inner.cell.set(next);
    }

    /// Observe every state replacement.
    pub fn subscribe(&self, listener: impl Fn(&S) + Send + Sync + 'static) -> Subscription {
        self.inner.cell.subscribe(listener)
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.inner.reducers.contains_key(name)
    }

    /// Apply `action` directly: run its reducer as a full-state replacement,
    /// then invoke the action's listeners with the same arguments, then
    /// return them.
    ///
    /// This is the always-synchronous path; the interceptor never sees it.
    /// Listeners run strictly after subscribers have observed the new state.
    pub fn apply(&self, action: &str, payload: &[Value]) -> Result<Vec<Value>, StoreError> {
        let reducer = self
            .inner
            .reducers
            .get(action)
            .ok_or_else(|| StoreError::UnknownAction(action.to_string()))?
            .clone();
        self.inner.cell.update(|current| reducer(current, payload));
        tracing::trace!(action, "applied");

        let listeners: Vec<ActionListener> = self
            .inner
            .listeners
            .lock()
            .iter()
            .filter(|entry| entry.action == action)
            .map(|entry| entry.listener.clone())
            .collect();
        for listener in listeners {
            listener(payload);
        }

        Ok(payload.to_vec())
    }

    /// Dispatch `action` through the public path.
    ///
    /// With an interceptor configured the completion may be deferred;
    /// without one this is equivalent to [`Store::apply`]. Unknown actions
    /// are rejected before interception.
    pub async fn dispatch(
        &self,
        action: &str,
        payload: Vec<Value>,
    ) -> Result<Vec<Value>, StoreError> {
        if !self.inner.reducers.contains_key(action) {
            return Err(StoreError::UnknownAction(action.to_string()));
        }
        match self.inner.interceptor.clone() {
            Some(interceptor) => interceptor.intercept(self, action, payload).await,
            None => self.apply(action, &payload),
        }
    }

    /// Resolves once the store is usable; see [`Initializer`].
    pub async fn ready(&self) {
        self.inner.ready.wait().await;
    }

    pub fn is_ready(&self) -> bool {
        self.inner.ready.is_ready()
    }

    /// Wait until `predicate` holds: immediately after readiness if the
    /// current state already satisfies it, otherwise on the first
    /// replacement that does.
    pub async fn wait(&self, predicate: impl Fn(&S) -> bool + Send + Sync + 'static) {
        self.ready().await;

        let predicate = Arc::new(predicate);
        let (matched, mut watcher) = watch::channel(false);
        // Subscribe before sampling so a replacement between the two cannot
        // slip through unobserved.
        let _subscription = self.subscribe({
            let predicate = predicate.clone();
            move |state| {
                if predicate(state) {
                    matched.send_replace(true);
                }
            }
        });
        if predicate(&self.state()) {
            return;
        }
        let _ = watcher.wait_for(|hit| *hit).await;
    }

    /// Register `listener` for `action`.
    ///
    /// Listeners are keyed by registration, not by callback: registering the
    /// same function twice yields two independently removable subscriptions.
    pub fn on_action(
        &self,
        action: impl Into<String>,
        listener: impl Fn(&[Value]) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.inner.next_listener.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().push(ListenerEntry {
            id,
            action: action.into(),
            listener: Arc::new(listener),
        });

        let inner = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.listeners.lock().retain(|entry| entry.id != id);
            }
        })
    }
}
