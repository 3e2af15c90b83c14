//! Resource- and integrity-level error types (spec.md §7 classes 2 and 4).

use thiserror::Error;

/// Errors resolving or reading a file out of a [`crate::catalog::ServerCatalog`].
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The resolved path escaped the data root, or did not resolve at all.
    #[error("Access denied")]
    AccessDenied,

    /// The path does not exist or is not a regular file.
    #[error("File not found")]
    NotFound,

    /// Reading the file failed after it was confirmed to exist.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors finalizing a receive-side transfer.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The buffered payload did not inflate successfully.
    #[error("Decompression failed")]
    DecompressionFailed,

    /// The recomputed digest did not match the advertised one.
    #[error("Integrity mismatch")]
    IntegrityMismatch,

    /// The link closed before `receivedSize` reached `expectedSize`.
    #[error("Timeout")]
    Incomplete,

    /// Writing the verified bytes to disk failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
