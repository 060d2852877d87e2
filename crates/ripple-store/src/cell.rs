//! Mutable state cell with full-replace semantics and change subscribers.

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type ChangeFn<S> = Arc<dyn Fn(&S) + Send + Sync>;

/// Scoped registration handle: dropping it (or calling
/// [`Subscription::cancel`]) removes the underlying registration.
///
/// Registrations are keyed by handle, not by callback, so the same function
/// registered twice yields two independently removable subscriptions.
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Remove the registration now instead of at drop time.
    pub fn cancel(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// Shared mutable state with wholesale replacement and synchronous change
/// notification.
///
/// The cell never merges: every write replaces the full value, and every
/// subscriber is invoked with the value that replaced it. Callbacks run
/// outside the state lock.
pub struct StateCell<S> {
    inner: Arc<CellInner<S>>,
}

struct CellInner<S> {
    state: RwLock<S>,
    subscribers: Mutex<Vec<(u64, ChangeFn<S>)>>,
    next_id: AtomicU64,
}

impl<S> Clone for StateCell<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: Clone + Send + Sync + 'static> StateCell<S> {
    pub fn new(state: S) -> Self {
        Self {
            inner: Arc::new(CellInner {
                state: RwLock::new(state),
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Current value.
    pub fn get(&self) -> S {
        self.inner.state.read().clone()
    }

    /// Replace the value and notify subscribers with the new state.
    pub fn set(&self, next: S) {
        *self.inner.state.write() = next.clone();
        self.notify(&next);
    }

    /// Atomically derive the next value from the current one, install it,
    /// and notify subscribers. Returns the installed value.
    pub fn update(&self, reduce: impl FnOnce(&S) -> S) -> S {
        let next = {
            let mut state = self.inner.state.write();
            let next = reduce(&state);
            *state = next.clone();
            next
        };
        self.notify(&next);
        next
    }

    /// Observe every replacement. The listener runs synchronously inside
    /// `set`/`update`, after the new value is readable.
    pub fn subscribe(&self, listener: impl Fn(&S) + Send + Sync + 'static) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.lock().push((id, Arc::new(listener)));

        let inner = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.subscribers.lock().retain(|(entry, _)| *entry != id);
            }
        })
    }

    fn notify(&self, state: &S) {
        let subscribers: Vec<ChangeFn<S>> = self
            .inner
            .subscribers
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for subscriber in subscribers {
            subscriber(state);
        }
    }
}
