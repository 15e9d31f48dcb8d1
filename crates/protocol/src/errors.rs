//! Error types for the remote communication layer.
//!
//! The taxonomy has three levels, matching who can act on the failure:
//!
//! - [`ProtocolError`]: a message could not be encoded or decoded.
//! - [`ConnectionError`]: a transport could not complete an exchange. This is
//!   the error type every [`crate::Connection`] implementation produces,
//!   including the distinct [`ConnectionError::Security`] class raised when
//!   the encrypted channel cannot be established.
//! - [`CommunicationsError`]: the client-facing error. Collapses server-side
//!   failure detail into one type; callers that need to distinguish a
//!   security failure can still match on the wrapped connection error.
//!
//! Errors are `Clone` because detached-send completions are delivered over a
//! broadcast channel, which requires cloneable payloads.

use thiserror::Error;

/// Errors raised while encoding or decoding wire messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A message could not be serialised to its XML wire form.
    #[error("unable to serialise message: {0}")]
    Serialize(String),

    /// A reply document was recognised but its content could not be decoded.
    #[error("unable to deserialise message '{tag}': {reason}")]
    Deserialize {
        /// Root tag of the offending document.
        tag: String,
        /// Description of the decode failure.
        reason: String,
    },

    /// A reply document's root tag is not in the message registry.
    #[error("unable to translate message: '{tag}' is unknown")]
    UnknownMessage {
        /// The unrecognised root tag.
        tag: String,
    },

    /// A reply was not a well-formed XML document.
    #[error("malformed message document: {0}")]
    Malformed(String),
}

/// Errors raised by a transport while carrying a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// The destination address could not be resolved or reached.
    ///
    /// Surfaced with a fixed user-facing message instead of raw transport
    /// internals; anything else propagates the underlying message via
    /// [`ConnectionError::Transport`].
    #[error("Oops, unknown address")]
    UnknownAddress,

    /// Any other transport failure, carrying the underlying message unchanged.
    #[error("{0}")]
    Transport(String),

    /// A detached send was started with a key that is already in flight.
    #[error("a detached operation with key '{0}' is already in progress")]
    DuplicateOperation(String),

    /// The exchange completed but the payload could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The secure channel could not be established or used.
    ///
    /// Raised for any handshake failure (missing public key, refused key
    /// exchange) and for envelope decryption failures. Never downgraded to a
    /// plaintext exchange.
    #[error("secure channel failure: {0}")]
    Security(String),
}

/// The single error type surfaced by the high-level client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommunicationsError {
    /// The server answered with a non-success result.
    ///
    /// Carries the concatenated error messages from the response; callers do
    /// not need to distinguish further.
    #[error("the server returned a failure: {0}")]
    ServerFailure(String),

    /// The server answered with a response subtype the operation does not expect.
    #[error("unexpected response type for action '{action}'")]
    UnexpectedResponse {
        /// Action whose reply had the wrong shape.
        action: String,
    },

    /// The exchange itself failed before a server result was available.
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}
