//! Share-directory catalog, hashing, compression, and the send/receive
//! halves of file transfer for Akita WAIS.
//!
//! [`catalog::ServerCatalog`] is the server's traversal-safe view of its
//! data root. [`sender`] implements the server-side `FileSender` state
//! machine (resolve/stat/prepare/digest, then stream). [`receiver`]
//! implements the client-side `TransferState` and its finalization.

pub mod catalog;
pub mod compress;
pub mod error;
pub mod hash;
pub mod receiver;
pub mod sender;

pub use catalog::ServerCatalog;
pub use error::{CatalogError, TransferError};
pub use receiver::TransferState;
pub use sender::{MAX_TRANSFER_RAM, PreparedFile};
