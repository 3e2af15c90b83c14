//! Unified error type spanning the six classes in spec.md §7.

use thiserror::Error;
use wais_files::CatalogError;
use wais_transport::TransportError;

use crate::protocol::Response;

/// A session-engine error. Classes 1-2 are handled at the protocol edge as
/// [`crate::protocol::Response::error`] values and rarely constructed as
/// this type; classes 3-6 are this type.
#[derive(Debug, Error)]
pub enum Error {
    /// Class 3: link establishment failure, mid-request closure, send failure.
    #[error(transparent)]
    Transport(#[from] wais_transport::TransportError),

    /// Class 4: decompression failure, digest mismatch, short read.
    #[error(transparent)]
    Integrity(#[from] wais_files::TransferError),

    /// Class 2: file not found / access denied resolving a `get` target.
    #[error(transparent)]
    Resource(#[from] wais_files::CatalogError),

    /// Class 5: an otherwise-unclassified failure inside a request handler.
    #[error("internal error")]
    Internal,

    /// Class 6: identity load/create, data-dir creation, transport init.
    /// Fatal; the entry point exits non-zero on this variant.
    #[error("startup error: {0}")]
    Startup(String),
}

impl Error {
    /// Render as the wire-level error response a peer sees. Internal
    /// details (raw I/O errors, unexpected failures) are logged here but
    /// never echoed back verbatim.
    #[must_use]
    pub fn into_response(self) -> Response {
        match self {
            Error::Resource(CatalogError::AccessDenied) => Response::error("Access denied"),
            Error::Resource(CatalogError::NotFound) => Response::error("File not found"),
            Error::Resource(CatalogError::Io(err)) => {
                tracing::error!(error = %err, "resource I/O error");
                Response::error("Internal error")
            }
            Error::Integrity(err) => {
                tracing::warn!(error = %err, "transfer integrity error");
                Response::error(err.to_string())
            }
            Error::Transport(TransportError::NotConnected) => Response::error("Not connected"),
            Error::Transport(TransportError::Closed) => Response::error("Link closed"),
            Error::Transport(TransportError::EstablishTimeout) => Response::error("Timeout"),
            Error::Transport(TransportError::Unreachable) => Response::error("Unreachable"),
            Error::Transport(err @ TransportError::SendFailed(_)) => {
                tracing::warn!(error = %err, "transport send failed");
                Response::error("Internal error")
            }
            Error::Internal => Response::error("Internal error"),
            Error::Startup(message) => Response::error(message),
        }
    }
}
