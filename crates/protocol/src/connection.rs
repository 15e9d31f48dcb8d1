//! The connection contract every transport and decorator implements.
//!
//! A [`Connection`] carries typed messages to one server endpoint. Two send
//! shapes are offered:
//!
//! - [`Connection::send_message`] awaits the exchange and returns the typed
//!   response directly.
//! - [`Connection::send_message_detached`] returns immediately; exactly one
//!   [`MessageCompletion`] is later delivered on the connection's broadcast
//!   channel, on whatever task the transport runs the exchange on. Callers
//!   must not assume same-task delivery.
//!
//! Detached sends are cancelled cooperatively through [`Connection::cancel`]:
//! the in-flight operation observes the signal and completes with
//! `cancelled = true` and neither a response nor an error. A cancel that
//! lands before the network result is observed wins over both outcomes.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::errors::ConnectionError;
use crate::identifiers::{OperationKey, ServerName};
use crate::messages::{Request, Response};

/// Outcome notification for one detached send.
///
/// Exactly one of `response` and `error` is populated, unless `cancelled` is
/// set, in which case both are empty.
#[derive(Debug, Clone)]
pub struct MessageCompletion {
    /// The typed response, when the exchange succeeded.
    pub response: Option<Response>,
    /// The failure, when the exchange did not produce a response.
    pub error: Option<ConnectionError>,
    /// Whether the operation was cancelled before it produced a result.
    pub cancelled: bool,
    /// The key the send was started with, for matching notifications.
    pub key: Option<OperationKey>,
}

impl MessageCompletion {
    /// A completion for an exchange that produced a response.
    pub fn completed(response: Response, key: Option<OperationKey>) -> Self {
        Self {
            response: Some(response),
            error: None,
            cancelled: false,
            key,
        }
    }

    /// A completion for an exchange that failed.
    pub fn failed(error: ConnectionError, key: Option<OperationKey>) -> Self {
        Self {
            response: None,
            error: Some(error),
            cancelled: false,
            key,
        }
    }

    /// A completion for an exchange that was cancelled.
    pub fn cancelled(key: Option<OperationKey>) -> Self {
        Self {
            response: None,
            error: None,
            cancelled: true,
            key,
        }
    }
}

/// Diagnostic observer notified around every exchange.
///
/// Observers see the action name and the message just before it is sent and
/// just after the reply is decoded. They exist for decorators and
/// diagnostics; nothing in the send path depends on them.
pub trait ConnectionObserver: Send + Sync {
    /// A request is about to be sent.
    fn request_sending(&self, _action: &str, _request: &Request) {}

    /// A response has been received and decoded.
    fn response_received(&self, _action: &str, _response: &Response) {}
}

/// A transport-agnostic connection to one build server endpoint.
///
/// Implemented by concrete transports and by decorators that wrap another
/// connection; decorators forward the introspection methods and own their
/// inner connection so that dropping the outermost handle releases the whole
/// chain.
#[async_trait]
pub trait Connection: Send + Sync {
    /// The transport kind, e.g. `"HTTP"`.
    fn transport_type(&self) -> &'static str;

    /// The logical server this connection fronts by default.
    fn server_name(&self) -> &ServerName;

    /// The endpoint address messages are carried to.
    fn address(&self) -> &str;

    /// Whether any detached operation is still in flight.
    fn is_busy(&self) -> bool;

    /// Sends a request and awaits its typed response.
    ///
    /// The returned response's request identifier always equals the request's
    /// identifier; a reply that cannot be decoded fails with a
    /// [`ConnectionError`] instead.
    async fn send_message(
        &self,
        action: &str,
        request: Request,
    ) -> Result<Response, ConnectionError>;

    /// Starts a send without waiting for it.
    ///
    /// The result is delivered as one [`MessageCompletion`] on the channel
    /// returned by [`Connection::completions`]. Starting a second detached
    /// send with a key that is already in flight delivers an error
    /// completion for the new send and leaves the running one untouched.
    fn send_message_detached(&self, action: &str, request: Request, key: Option<OperationKey>);

    /// Requests cooperative cancellation of one detached send.
    ///
    /// Has no effect when no operation with the key is in flight, or when
    /// the operation has already produced its result.
    fn cancel(&self, key: Option<OperationKey>);

    /// Subscribes to completion notifications for detached sends.
    fn completions(&self) -> broadcast::Receiver<MessageCompletion>;

    /// Registers a diagnostic observer.
    fn subscribe(&self, observer: Arc<dyn ConnectionObserver>);
}
