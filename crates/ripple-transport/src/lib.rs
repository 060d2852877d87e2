//! # Ripple Transport
//!
//! The message plumbing replicated stores run over:
//!
//! - [`wire`] — the envelope and frame grammar that crosses ports.
//! - [`port`] — the [`Port`] abstraction: an addressable, fire-and-forget
//!   endpoint with scoped handler registration.
//! - [`memory`] — an in-process hub implementation for tests, demos, and
//!   single-process embedding.
//!
//! Delivery guarantees are deliberately thin: sends may be dropped, and the
//! only ordering an implementation owes its users is per-destination FIFO.

pub mod memory;
pub mod port;
pub mod wire;

pub use memory::{MemoryHub, MemoryPort};
pub use port::{HandlerGuard, MessageHandler, Port};
pub use wire::{ActionFrame, Frame, Message};
