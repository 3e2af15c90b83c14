//! Session protocol engine for Akita WAIS: the server-side request
//! dispatcher, the client-side link lifecycle and file-receive loop, and
//! the JSON wire protocol they share.
//!
//! Discovery ([`wais_discovery`]) and file transfer primitives
//! ([`wais_files`]) are lower layers this crate composes; the mesh overlay
//! itself ([`wais_transport`]) is a dependency both roles consume through
//! [`wais_transport::TransportAdapter`].

pub mod client;
pub mod dispatcher;
pub mod error;
pub mod protocol;

pub use client::LinkClient;
pub use dispatcher::{ServerContext, accept_loop};
pub use error::Error;
