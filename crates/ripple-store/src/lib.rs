//! # Ripple Store
//!
//! Reducer-driven state container with two dispatch families:
//!
//! - [`Store::apply`] — the always-synchronous path: run the reducer as a
//!   full-state replacement, notify the action's listeners, return the
//!   arguments.
//! - [`Store::dispatch`] — the public path. Without an [`Interceptor`] it is
//!   equivalent to `apply`; with one, the interceptor decides what actually
//!   happens and when the call completes.
//!
//! The split is what makes the container replicable: a replication layer
//! supplies an interceptor that forwards dispatches elsewhere and resolves
//! them only once the authoritative copy has applied the action.

pub mod cell;
pub mod error;
pub mod ready;
pub mod store;

pub use cell::{StateCell, Subscription};
pub use error::StoreError;
pub use ready::ReadyGate;
pub use store::{Initializer, Interceptor, Reducer, Reducers, Store, StoreHooks, RESET_ACTION};
