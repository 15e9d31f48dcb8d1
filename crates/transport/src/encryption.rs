//! The encrypting connection decorator.
//!
//! Wraps any [`Connection`] and makes encryption invisible to the layers
//! above it. On the first real call the decorator negotiates a symmetric
//! session key through an asymmetric handshake:
//!
//! 1. `RetrievePublicKey` fetches the server's RSA public key (PEM).
//! 2. A fresh AES-128 key and initialisation vector are generated.
//! 3. Both are RSA-encrypted independently and sent with
//!    `InitialiseSecureConnection`; the server must confirm with a success.
//! 4. The key and vector are cached for the lifetime of this instance.
//!
//! Afterwards every exchange serialises the real request, encrypts it with
//! AES-128-CBC (PKCS7 padding), and ships it as an envelope under the
//! `ProcessSecureRequest` action; the enveloped reply is decrypted and
//! decoded back into the subtype the original action expects.
//!
//! A handshake failure clears any partial session state and surfaces as
//! [`ConnectionError::Security`]; there is no fallback to plaintext. The
//! next call re-attempts the handshake. Concurrent first calls are
//! single-flighted: the session cache sits behind an async mutex held
//! across the handshake, so at most one key exchange runs per instance.

use std::sync::Arc;

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};
use tokio::sync::{broadcast, Mutex};
use tracing::debug;

use protocol::connection::{Connection, ConnectionObserver, MessageCompletion};
use protocol::messages::{EncryptedRequest, KeyExchangeRequest, ServerRequest};
use protocol::{
    actions, codec, ConnectionError, OperationKey, Request, Response, ResponseResult, ServerName,
};

use crate::detached::DetachedOperations;

type Aes128CbcEncryptor = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDecryptor = cbc::Decryptor<aes::Aes128>;

/// A connection decorator that encrypts every exchange after a one-time
/// key negotiation.
pub struct EncryptingConnection {
    secure: SecureDispatcher,
    detached: Arc<DetachedOperations>,
}

impl EncryptingConnection {
    /// Wraps an inner connection. No handshake happens until the first send.
    pub fn new(inner: Arc<dyn Connection>) -> Self {
        Self {
            secure: SecureDispatcher {
                inner,
                session: Arc::new(Mutex::new(None)),
            },
            detached: DetachedOperations::new(),
        }
    }
}

#[async_trait]
impl Connection for EncryptingConnection {
    fn transport_type(&self) -> &'static str {
        self.secure.inner.transport_type()
    }

    fn server_name(&self) -> &ServerName {
        self.secure.inner.server_name()
    }

    fn address(&self) -> &str {
        self.secure.inner.address()
    }

    fn is_busy(&self) -> bool {
        self.secure.inner.is_busy() || self.detached.is_busy()
    }

    async fn send_message(
        &self,
        action: &str,
        request: Request,
    ) -> Result<Response, ConnectionError> {
        self.secure.dispatch(action, request).await
    }

    fn send_message_detached(&self, action: &str, request: Request, key: Option<OperationKey>) {
        let secure = self.secure.clone();
        let action = action.to_string();
        self.detached.start(key, async move {
            secure.dispatch(&action, request).await
        });
    }

    fn cancel(&self, key: Option<OperationKey>) {
        self.detached.cancel(&key);
    }

    fn completions(&self) -> broadcast::Receiver<MessageCompletion> {
        self.detached.completions()
    }

    fn subscribe(&self, observer: Arc<dyn ConnectionObserver>) {
        self.secure.inner.subscribe(observer);
    }
}

impl Drop for EncryptingConnection {
    fn drop(&mut self) {
        self.detached.cancel_all();
    }
}

// ---------------------------------------------------------------------------
// Session negotiation and envelope handling
// ---------------------------------------------------------------------------

/// The encrypting send path, cheap to clone into spawned exchanges.
#[derive(Clone)]
struct SecureDispatcher {
    inner: Arc<dyn Connection>,
    session: Arc<Mutex<Option<SessionMaterial>>>,
}

impl SecureDispatcher {
    async fn dispatch(&self, action: &str, request: Request) -> Result<Response, ConnectionError> {
        // The handshake actions themselves travel in plaintext; everything
        // else goes through the envelope.
        if action == actions::RETRIEVE_PUBLIC_KEY || action == actions::INITIALISE_SECURE_CONNECTION
        {
            return self.inner.send_message(action, request).await;
        }

        let material = self.ensure_session().await?;

        let server_name = request.server_name().clone();
        let message = request.to_xml()?;
        let envelope = EncryptedRequest::new(
            server_name,
            action.to_string(),
            material.encrypt(message.as_bytes()),
        );
        let reply = self
            .inner
            .send_message(actions::PROCESS_SECURE_REQUEST, Request::Encrypted(envelope))
            .await?;

        match reply {
            Response::Encrypted(envelope) if envelope.result == ResponseResult::Success => {
                let plaintext = material.decrypt(&envelope.data)?;
                let text = String::from_utf8(plaintext).map_err(|source| {
                    ConnectionError::Security(format!(
                        "decrypted reply is not valid UTF-8: {source}"
                    ))
                })?;
                Ok(codec::parse_response(&text)?)
            }
            // A non-success or unenveloped reply is handed through untouched
            // for the caller's own validation.
            other => Ok(other),
        }
    }

    /// Returns the cached session material, negotiating it first if this is
    /// the instance's first real call. The lock is held across the whole
    /// handshake so concurrent first calls produce a single key exchange.
    async fn ensure_session(&self) -> Result<SessionMaterial, ConnectionError> {
        let mut session = self.session.lock().await;
        if let Some(material) = session.as_ref() {
            return Ok(material.clone());
        }
        let material = self.negotiate().await?;
        *session = Some(material.clone());
        Ok(material)
    }

    async fn negotiate(&self) -> Result<SessionMaterial, ConnectionError> {
        debug!(server = %self.inner.server_name(), "negotiating secure channel");

        let request = Request::from(ServerRequest::new(self.inner.server_name().clone()));
        let reply = self
            .inner
            .send_message(actions::RETRIEVE_PUBLIC_KEY, request)
            .await?;
        let pem = match &reply {
            Response::Data(data) if data.result == ResponseResult::Success => data.data.clone(),
            other => {
                return Err(ConnectionError::Security(format!(
                    "server does not export a public key: {}",
                    other.concatenated_errors()
                )))
            }
        };
        let public_key = RsaPublicKey::from_public_key_pem(&pem).map_err(|source| {
            ConnectionError::Security(format!("invalid public key material: {source}"))
        })?;

        let material = SessionMaterial::generate();
        let encrypted_key = public_key
            .encrypt(&mut OsRng, Pkcs1v15Encrypt, &material.key)
            .map_err(|source| {
                ConnectionError::Security(format!("unable to encrypt session key: {source}"))
            })?;
        let encrypted_iv = public_key
            .encrypt(&mut OsRng, Pkcs1v15Encrypt, &material.iv)
            .map_err(|source| {
                ConnectionError::Security(format!("unable to encrypt session vector: {source}"))
            })?;

        let exchange = KeyExchangeRequest::new(
            self.inner.server_name().clone(),
            BASE64.encode(encrypted_key),
            BASE64.encode(encrypted_iv),
        );
        let confirmation = self
            .inner
            .send_message(
                actions::INITIALISE_SECURE_CONNECTION,
                Request::KeyExchange(exchange),
            )
            .await?;
        if confirmation.result() != ResponseResult::Success {
            return Err(ConnectionError::Security(format!(
                "server did not allow the connection to be secured: {}",
                confirmation.concatenated_errors()
            )));
        }

        debug!(server = %self.inner.server_name(), "secure channel established");
        Ok(material)
    }
}

/// The symmetric session state: one key and one initialisation vector,
/// generated fresh per negotiation and never persisted.
#[derive(Clone)]
pub(crate) struct SessionMaterial {
    key: [u8; 16],
    iv: [u8; 16],
}

impl SessionMaterial {
    /// Generates fresh random material from the OS random number generator.
    pub(crate) fn generate() -> Self {
        let mut key = [0u8; 16];
        let mut iv = [0u8; 16];
        OsRng.fill_bytes(&mut key);
        OsRng.fill_bytes(&mut iv);
        Self { key, iv }
    }

    /// Encrypts a message, returning base64 ciphertext.
    pub(crate) fn encrypt(&self, plaintext: &[u8]) -> String {
        let ciphertext = Aes128CbcEncryptor::new(&self.key.into(), &self.iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);
        BASE64.encode(ciphertext)
    }

    /// Decrypts base64 ciphertext back into the original bytes.
    pub(crate) fn decrypt(&self, data: &str) -> Result<Vec<u8>, ConnectionError> {
        let ciphertext = BASE64.decode(data).map_err(|source| {
            ConnectionError::Security(format!("invalid envelope encoding: {source}"))
        })?;
        Aes128CbcDecryptor::new(&self.key.into(), &self.iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| {
                ConnectionError::Security("envelope decryption failed: bad padding".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    use rsa::pkcs8::{EncodePublicKey, LineEnding};
    use rsa::RsaPrivateKey;

    use protocol::messages::{DataResponse, EncryptedResponse, ServerResponse};

    use super::*;

    #[test]
    fn encrypt_then_decrypt_returns_the_original_bytes() {
        let material = SessionMaterial::generate();
        let message = "<projectRequest identifier=\"abc\" project=\"Project #1\"/>";

        let ciphertext = material.encrypt(message.as_bytes());
        assert_ne!(ciphertext.as_bytes(), message.as_bytes());

        let plaintext = material.decrypt(&ciphertext).unwrap();
        assert_eq!(plaintext, message.as_bytes());
    }

    #[test]
    fn decrypting_with_different_material_fails() {
        let sender = SessionMaterial::generate();
        let receiver = SessionMaterial::generate();

        let ciphertext = sender.encrypt(b"secret");
        // Mismatched key or vector must not quietly yield garbage.
        assert!(receiver.decrypt(&ciphertext).is_err() || receiver.decrypt(&ciphertext).unwrap() != b"secret");
    }

    #[test]
    fn decrypting_malformed_base64_is_a_security_error() {
        let material = SessionMaterial::generate();
        let error = material.decrypt("not//valid==base64!!").unwrap_err();
        assert!(matches!(error, ConnectionError::Security(_)));
    }

    // -----------------------------------------------------------------------
    // Decorator behaviour, exercised against a scripted server that answers
    // the handshake with a real RSA key pair and decrypts envelopes exactly
    // as the build server would.
    // -----------------------------------------------------------------------

    struct ScriptedServer {
        server_name: ServerName,
        address: String,
        private_key: RsaPrivateKey,
        public_key_pem: String,
        session: StdMutex<Option<SessionMaterial>>,
        actions_seen: StdMutex<Vec<String>>,
        handshakes: AtomicUsize,
        refuse_public_key: AtomicBool,
        refuse_key_exchange: AtomicBool,
        completion_tx: broadcast::Sender<MessageCompletion>,
    }

    impl ScriptedServer {
        fn start() -> Arc<Self> {
            let private_key =
                RsaPrivateKey::new(&mut OsRng, 1024).expect("unable to generate test key");
            let public_key_pem = private_key
                .to_public_key()
                .to_public_key_pem(LineEnding::LF)
                .expect("unable to encode test key");
            let (completion_tx, _) = broadcast::channel(8);
            Arc::new(Self {
                server_name: ServerName::new("scripted"),
                address: "http://scripted.test".to_string(),
                private_key,
                public_key_pem,
                session: StdMutex::new(None),
                actions_seen: StdMutex::new(Vec::new()),
                handshakes: AtomicUsize::new(0),
                refuse_public_key: AtomicBool::new(false),
                refuse_key_exchange: AtomicBool::new(false),
                completion_tx,
            })
        }

        fn actions_seen(&self) -> Vec<String> {
            self.actions_seen.lock().unwrap().clone()
        }

        fn unwrap_rsa(&self, encoded: &str) -> [u8; 16] {
            let ciphertext = BASE64.decode(encoded).expect("key material is not base64");
            let plaintext = self
                .private_key
                .decrypt(Pkcs1v15Encrypt, &ciphertext)
                .expect("key material does not decrypt");
            plaintext.try_into().expect("key material has wrong length")
        }

        fn answer_secure(&self, envelope: &EncryptedRequest) -> Response {
            let material = self
                .session
                .lock()
                .unwrap()
                .clone()
                .expect("secure request before key exchange");
            let plaintext = material.decrypt(&envelope.data).expect("bad envelope");
            let inner_xml = String::from_utf8(plaintext).unwrap();
            let Request::Server(inner) = codec::parse_request(&inner_xml).unwrap() else {
                panic!("the scripted operations all use plain server requests");
            };

            let reply = match envelope.action.as_str() {
                actions::GET_SERVER_VERSION => Response::from(DataResponse::new(
                    inner.identifier,
                    ResponseResult::Success,
                    "1.2.3".to_string(),
                )),
                other => panic!("scripted server cannot answer '{other}'"),
            };
            let reply_xml = reply.to_xml().unwrap();
            Response::from(EncryptedResponse::new(
                envelope.identifier,
                ResponseResult::Success,
                material.encrypt(reply_xml.as_bytes()),
            ))
        }
    }

    #[async_trait]
    impl Connection for ScriptedServer {
        fn transport_type(&self) -> &'static str {
            "SCRIPTED"
        }

        fn server_name(&self) -> &ServerName {
            &self.server_name
        }

        fn address(&self) -> &str {
            &self.address
        }

        fn is_busy(&self) -> bool {
            false
        }

        async fn send_message(
            &self,
            action: &str,
            request: Request,
        ) -> Result<Response, ConnectionError> {
            self.actions_seen.lock().unwrap().push(action.to_string());
            let identifier = request.identifier();

            match action {
                actions::RETRIEVE_PUBLIC_KEY => {
                    if self.refuse_public_key.load(Ordering::SeqCst) {
                        let mut reply =
                            ServerResponse::new(identifier, ResponseResult::Failure);
                        reply
                            .errors
                            .push(protocol::messages::ErrorMessage::new("keys are disabled"));
                        return Ok(Response::from(reply));
                    }
                    self.handshakes.fetch_add(1, Ordering::SeqCst);
                    Ok(Response::from(DataResponse::new(
                        identifier,
                        ResponseResult::Success,
                        self.public_key_pem.clone(),
                    )))
                }
                actions::INITIALISE_SECURE_CONNECTION => {
                    if self.refuse_key_exchange.load(Ordering::SeqCst) {
                        return Ok(Response::from(ServerResponse::new(
                            identifier,
                            ResponseResult::Failure,
                        )));
                    }
                    let Request::KeyExchange(exchange) = &request else {
                        panic!("key exchange arrived with the wrong request shape");
                    };
                    let material = SessionMaterial {
                        key: self.unwrap_rsa(&exchange.encrypted_key),
                        iv: self.unwrap_rsa(&exchange.encrypted_iv),
                    };
                    *self.session.lock().unwrap() = Some(material);
                    Ok(Response::from(ServerResponse::new(
                        identifier,
                        ResponseResult::Success,
                    )))
                }
                actions::PROCESS_SECURE_REQUEST => {
                    let Request::Encrypted(envelope) = &request else {
                        panic!("secure request arrived without an envelope");
                    };
                    Ok(self.answer_secure(envelope))
                }
                other => panic!("scripted server received unexpected action '{other}'"),
            }
        }

        fn send_message_detached(
            &self,
            _action: &str,
            _request: Request,
            _key: Option<OperationKey>,
        ) {
            unreachable!("the decorator runs its own detached sends");
        }

        fn cancel(&self, _key: Option<OperationKey>) {}

        fn completions(&self) -> broadcast::Receiver<MessageCompletion> {
            self.completion_tx.subscribe()
        }

        fn subscribe(&self, _observer: Arc<dyn ConnectionObserver>) {}
    }

    fn version_request(server: &ScriptedServer) -> Request {
        Request::from(ServerRequest::new(server.server_name.clone()))
    }

    #[tokio::test]
    async fn the_first_send_negotiates_and_encrypts() {
        let server = ScriptedServer::start();
        let connection = EncryptingConnection::new(server.clone() as Arc<dyn Connection>);

        let request = version_request(&server);
        let identifier = request.identifier();
        let reply = connection
            .send_message(actions::GET_SERVER_VERSION, request)
            .await
            .unwrap();

        match reply {
            Response::Data(data) => {
                assert_eq!(data.request_identifier, identifier);
                assert_eq!(data.data, "1.2.3");
            }
            other => panic!("expected the decrypted data response, got {other:?}"),
        }
        assert_eq!(
            server.actions_seen(),
            vec![
                actions::RETRIEVE_PUBLIC_KEY.to_string(),
                actions::INITIALISE_SECURE_CONNECTION.to_string(),
                actions::PROCESS_SECURE_REQUEST.to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn the_handshake_runs_at_most_once_per_instance() {
        let server = ScriptedServer::start();
        let connection = EncryptingConnection::new(server.clone() as Arc<dyn Connection>);

        for _ in 0..3 {
            connection
                .send_message(actions::GET_SERVER_VERSION, version_request(&server))
                .await
                .unwrap();
        }

        assert_eq!(server.handshakes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_first_calls_share_one_handshake() {
        let server = ScriptedServer::start();
        let connection =
            Arc::new(EncryptingConnection::new(server.clone() as Arc<dyn Connection>));

        let first = {
            let connection = Arc::clone(&connection);
            let request = version_request(&server);
            tokio::spawn(async move {
                connection
                    .send_message(actions::GET_SERVER_VERSION, request)
                    .await
            })
        };
        let second = {
            let connection = Arc::clone(&connection);
            let request = version_request(&server);
            tokio::spawn(async move {
                connection
                    .send_message(actions::GET_SERVER_VERSION, request)
                    .await
            })
        };

        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();
        assert_eq!(server.handshakes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn a_refused_public_key_is_a_security_error_with_no_fallback() {
        let server = ScriptedServer::start();
        server.refuse_public_key.store(true, Ordering::SeqCst);
        let connection = EncryptingConnection::new(server.clone() as Arc<dyn Connection>);

        let error = connection
            .send_message(actions::GET_SERVER_VERSION, version_request(&server))
            .await
            .unwrap_err();

        assert!(matches!(error, ConnectionError::Security(_)));
        assert!(error.to_string().contains("keys are disabled"));
        // Nothing may travel in plaintext after the refusal.
        assert_eq!(
            server.actions_seen(),
            vec![actions::RETRIEVE_PUBLIC_KEY.to_string()]
        );
    }

    #[tokio::test]
    async fn a_refused_key_exchange_is_a_security_error() {
        let server = ScriptedServer::start();
        server.refuse_key_exchange.store(true, Ordering::SeqCst);
        let connection = EncryptingConnection::new(server.clone() as Arc<dyn Connection>);

        let error = connection
            .send_message(actions::GET_SERVER_VERSION, version_request(&server))
            .await
            .unwrap_err();

        assert!(matches!(error, ConnectionError::Security(_)));
    }

    #[tokio::test]
    async fn a_failed_handshake_is_retried_on_the_next_call() {
        let server = ScriptedServer::start();
        server.refuse_public_key.store(true, Ordering::SeqCst);
        let connection = EncryptingConnection::new(server.clone() as Arc<dyn Connection>);

        connection
            .send_message(actions::GET_SERVER_VERSION, version_request(&server))
            .await
            .unwrap_err();

        server.refuse_public_key.store(false, Ordering::SeqCst);
        let reply = connection
            .send_message(actions::GET_SERVER_VERSION, version_request(&server))
            .await
            .unwrap();
        assert_eq!(reply.result(), ResponseResult::Success);
    }

    #[tokio::test]
    async fn introspection_passes_through_to_the_inner_connection() {
        let server = ScriptedServer::start();
        let connection = EncryptingConnection::new(server.clone() as Arc<dyn Connection>);

        assert_eq!(connection.transport_type(), "SCRIPTED");
        assert_eq!(connection.server_name().as_str(), "scripted");
        assert_eq!(connection.address(), "http://scripted.test");
        assert!(!connection.is_busy());
    }

    #[tokio::test]
    async fn detached_sends_are_encrypted_and_complete_with_the_inner_response() {
        let server = ScriptedServer::start();
        let connection = EncryptingConnection::new(server.clone() as Arc<dyn Connection>);
        let mut completions = connection.completions();

        let request = version_request(&server);
        let identifier = request.identifier();
        connection.send_message_detached(
            actions::GET_SERVER_VERSION,
            request,
            Some(OperationKey::new("version")),
        );

        let completion = completions.recv().await.unwrap();
        assert!(!completion.cancelled);
        assert!(completion.error.is_none());
        let response = completion.response.unwrap();
        assert_eq!(response.request_identifier(), identifier);
        assert_eq!(completion.key, Some(OperationKey::new("version")));
        assert!(server
            .actions_seen()
            .contains(&actions::PROCESS_SECURE_REQUEST.to_string()));
    }
}
