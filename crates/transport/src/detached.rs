//! Bookkeeping shared by every connection's detached-send path.
//!
//! A detached send runs on a spawned task and reports back through a
//! broadcast channel. This module owns the per-connection pieces of that:
//! the table of in-flight operations keyed by caller-chosen operation key,
//! the cancellation token for each, and the completion channel.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use protocol::{ConnectionError, MessageCompletion, OperationKey, Response};

/// Capacity of the completion broadcast channel. Completions are small;
/// a lagging subscriber loses the oldest notifications first.
const COMPLETION_CHANNEL_CAPACITY: usize = 64;

/// In-flight detached operations for one connection.
pub(crate) struct DetachedOperations {
    pending: Mutex<HashMap<Option<OperationKey>, CancellationToken>>,
    completion_tx: broadcast::Sender<MessageCompletion>,
}

impl DetachedOperations {
    pub(crate) fn new() -> Arc<Self> {
        let (completion_tx, _) = broadcast::channel(COMPLETION_CHANNEL_CAPACITY);
        Arc::new(Self {
            pending: Mutex::new(HashMap::new()),
            completion_tx,
        })
    }

    /// Whether any operation is still in flight.
    pub(crate) fn is_busy(&self) -> bool {
        !self.pending.lock().expect("pending-operations lock poisoned").is_empty()
    }

    /// Opens a new subscription to completion notifications.
    pub(crate) fn completions(&self) -> broadcast::Receiver<MessageCompletion> {
        self.completion_tx.subscribe()
    }

    /// Requests cooperative cancellation of the operation with this key.
    pub(crate) fn cancel(&self, key: &Option<OperationKey>) {
        let pending = self.pending.lock().expect("pending-operations lock poisoned");
        if let Some(token) = pending.get(key) {
            debug!(key = key.as_ref().map(OperationKey::as_str), "cancelling detached send");
            token.cancel();
        }
    }

    /// Cancels every in-flight operation. Used on connection disposal.
    pub(crate) fn cancel_all(&self) {
        let pending = self.pending.lock().expect("pending-operations lock poisoned");
        for token in pending.values() {
            token.cancel();
        }
    }

    /// Starts one detached operation.
    ///
    /// Registers the key, spawns the exchange, and delivers exactly one
    /// completion when it finishes. A cancel that lands before the exchange
    /// result is observed wins over both success and error. A key that is
    /// already in flight is rejected with an error completion and the
    /// running operation is left untouched.
    pub(crate) fn start<F>(self: &Arc<Self>, key: Option<OperationKey>, operation: F)
    where
        F: Future<Output = Result<Response, ConnectionError>> + Send + 'static,
    {
        let token = CancellationToken::new();
        {
            let mut pending = self.pending.lock().expect("pending-operations lock poisoned");
            if pending.contains_key(&key) {
                let described = key
                    .as_ref()
                    .map(|key| key.as_str().to_string())
                    .unwrap_or_default();
                drop(pending);
                let _ = self.completion_tx.send(MessageCompletion::failed(
                    ConnectionError::DuplicateOperation(described),
                    key,
                ));
                return;
            }
            pending.insert(key.clone(), token.clone());
        }

        let operations = Arc::clone(self);
        tokio::spawn(async move {
            let completion = tokio::select! {
                biased;
                _ = token.cancelled() => MessageCompletion::cancelled(key.clone()),
                result = operation => {
                    if token.is_cancelled() {
                        MessageCompletion::cancelled(key.clone())
                    } else {
                        match result {
                            Ok(response) => MessageCompletion::completed(response, key.clone()),
                            Err(error) => MessageCompletion::failed(error, key.clone()),
                        }
                    }
                }
            };
            operations
                .pending
                .lock()
                .expect("pending-operations lock poisoned")
                .remove(&key);
            let _ = operations.completion_tx.send(completion);
        });
    }
}
