//! The HTTP transport.
//!
//! Carries actions as form-encoded POSTs to a per-server endpoint:
//! `{base}/server/{ServerName}/RawXmlMessage.aspx`, with the action name in
//! the `action` field and the serialised request in the `message` field.
//! The server name comes from the request, not from this connection's
//! configuration, so one connection can address every logical server behind
//! a shared base address.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use reqwest::{Client, Url};
use tokio::sync::broadcast;
use tracing::debug;

use protocol::connection::{Connection, ConnectionObserver, MessageCompletion};
use protocol::{codec, ConnectionError, OperationKey, Request, Response, ServerName};

use crate::detached::DetachedOperations;

type Observers = Arc<RwLock<Vec<Arc<dyn ConnectionObserver>>>>;

/// A connection to a build server over HTTP.
pub struct HttpConnection {
    dispatcher: Dispatcher,
    server_name: ServerName,
    address: String,
    detached: Arc<DetachedOperations>,
}

impl HttpConnection {
    /// Creates a connection to the server behind `base_address`.
    pub fn new(base_address: Url) -> Self {
        Self::with_client(base_address, Client::new())
    }

    /// Creates a connection using a caller-configured HTTP client
    /// (custom timeouts, proxies, ...).
    pub fn with_client(base_address: Url, client: Client) -> Self {
        let address = base_address.as_str().trim_end_matches('/').to_string();
        let server_name = ServerName::new(base_address.host_str().unwrap_or_default());
        Self {
            dispatcher: Dispatcher {
                client,
                address: address.clone(),
                observers: Arc::new(RwLock::new(Vec::new())),
            },
            server_name,
            address,
            detached: DetachedOperations::new(),
        }
    }
}

#[async_trait]
impl Connection for HttpConnection {
    fn transport_type(&self) -> &'static str {
        "HTTP"
    }

    fn server_name(&self) -> &ServerName {
        &self.server_name
    }

    fn address(&self) -> &str {
        &self.address
    }

    fn is_busy(&self) -> bool {
        self.detached.is_busy()
    }

    async fn send_message(
        &self,
        action: &str,
        request: Request,
    ) -> Result<Response, ConnectionError> {
        self.dispatcher.dispatch(action, &request).await
    }

    fn send_message_detached(&self, action: &str, request: Request, key: Option<OperationKey>) {
        let dispatcher = self.dispatcher.clone();
        let action = action.to_string();
        self.detached.start(key, async move {
            dispatcher.dispatch(&action, &request).await
        });
    }

    fn cancel(&self, key: Option<OperationKey>) {
        self.detached.cancel(&key);
    }

    fn completions(&self) -> broadcast::Receiver<MessageCompletion> {
        self.detached.completions()
    }

    fn subscribe(&self, observer: Arc<dyn ConnectionObserver>) {
        self.dispatcher
            .observers
            .write()
            .expect("observer lock poisoned")
            .push(observer);
    }
}

impl Drop for HttpConnection {
    fn drop(&mut self) {
        self.detached.cancel_all();
    }
}

/// The pieces of the connection a spawned exchange needs: cheap to clone,
/// free of the pending-operation bookkeeping.
#[derive(Clone)]
struct Dispatcher {
    client: Client,
    address: String,
    observers: Observers,
}

impl Dispatcher {
    async fn dispatch(&self, action: &str, request: &Request) -> Result<Response, ConnectionError> {
        let target = self.target_url(request.server_name())?;
        let message = request.to_xml()?;

        self.notify_request_sending(action, request);
        debug!(action, server = %request.server_name(), "posting message");
        let reply = self
            .client
            .post(target)
            .form(&[("action", action), ("message", message.as_str())])
            .send()
            .await
            .map_err(classify_error)?;
        let reply = reply.error_for_status().map_err(classify_error)?;
        let body = reply.bytes().await.map_err(classify_error)?;

        let text = String::from_utf8(body.to_vec())
            .map_err(|source| ConnectionError::Transport(source.to_string()))?;
        let response = codec::parse_response(&text)?;
        self.notify_response_received(action, &response);
        Ok(response)
    }

    /// Builds the per-server message endpoint from the request's server name.
    fn target_url(&self, server_name: &ServerName) -> Result<Url, ConnectionError> {
        let target = format!("{}/server/{}/RawXmlMessage.aspx", self.address, server_name);
        Url::parse(&target).map_err(|source| ConnectionError::Transport(source.to_string()))
    }

    fn notify_request_sending(&self, action: &str, request: &Request) {
        let observers = self.observers.read().expect("observer lock poisoned");
        for observer in observers.iter() {
            observer.request_sending(action, request);
        }
    }

    fn notify_response_received(&self, action: &str, response: &Response) {
        let observers = self.observers.read().expect("observer lock poisoned");
        for observer in observers.iter() {
            observer.response_received(action, response);
        }
    }
}

/// Folds a transport failure into the error taxonomy: unreachable-address
/// classes get the fixed user-facing message, everything else keeps the
/// underlying message.
fn classify_error(source: reqwest::Error) -> ConnectionError {
    if source.is_connect() {
        ConnectionError::UnknownAddress
    } else {
        ConnectionError::Transport(source.to_string())
    }
}
