//! Transport infrastructure for the Anvil remote client.
//!
//! Implements the [`protocol::Connection`] contract over concrete wire
//! mechanisms:
//!
//! - [`HttpConnection`] posts each action to a per-server URL and decodes
//!   the XML reply through the message registry.
//! - [`EncryptingConnection`] wraps any other connection, negotiates a
//!   symmetric session key with the server on first use, and transparently
//!   encrypts every subsequent exchange.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** All HTTP details, error classification, and
//! cryptography live here; the [`protocol`] crate never sees them.

mod detached;
pub mod encryption;
pub mod http;

pub use encryption::EncryptingConnection;
pub use http::HttpConnection;

// Callers construct connections from parsed URLs; re-export the type so they
// do not need a direct reqwest dependency.
pub use reqwest::Url;
