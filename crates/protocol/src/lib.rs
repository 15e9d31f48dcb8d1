//! Messaging domain for the Anvil remote client.
//!
//! This crate contains everything a transport needs to carry a remote
//! operation and nothing about how the carrying happens: the typed message
//! model, the XML wire codec with its root-tag registry, the action catalog,
//! the [`Connection`] contract, and the layered error types. Transport
//! implementations live in the `transport` crate; the operation-per-method
//! facade lives in the `client` crate.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`RequestId`, `ServerName`, `SessionToken`, ...) |
//! | [`types`] | Shared value types (`Timestamp`) |
//! | [`messages`] | Request/response subtypes and the `Request`/`Response` enums |
//! | [`codec`] | XML serialisation and the root-tag dispatch registry |
//! | [`actions`] | The action-name catalog |
//! | [`connection`] | The `Connection` trait, completions, observers |
//! | [`errors`] | Protocol, connection, and communications error types |

pub mod actions;
pub mod codec;
pub mod connection;
pub mod errors;
pub mod identifiers;
pub mod messages;
pub mod types;

// Re-export the working set at the crate root for ergonomic usage by the
// transport and client crates.
pub use connection::{Connection, ConnectionObserver, MessageCompletion};
pub use errors::{CommunicationsError, ConnectionError, ProtocolError};
pub use identifiers::{
    BuildName, OperationKey, ProjectName, RequestId, ServerName, SessionToken,
};
pub use messages::{Request, Response, ResponseResult};
pub use types::Timestamp;
