//! Store error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// No reducer is registered under this action name.
    #[error("unknown action `{0}`")]
    UnknownAction(String),

    /// The interceptor gave up before producing a completion, e.g. its
    /// endpoint was torn down while the dispatch was still in flight.
    #[error("dispatch abandoned before completion")]
    Abandoned,
}
