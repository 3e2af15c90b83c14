//! Transport-layer error types.

use thiserror::Error;

/// Errors surfaced by a [`crate::TransportAdapter`] implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No listener is registered for the requested (identity, aspect) pair.
    #[error("peer unreachable")]
    Unreachable,

    /// The link is not in a state that allows the requested operation.
    #[error("link not connected")]
    NotConnected,

    /// The link closed while the operation was in flight.
    #[error("link closed")]
    Closed,

    /// Establishing the link did not reach `Active` within the timeout.
    #[error("link establishment timed out")]
    EstablishTimeout,

    /// The underlying transport rejected the send (e.g. payload too large).
    #[error("send failed: {0}")]
    SendFailed(String),
}
