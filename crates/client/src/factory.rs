//! The client factory.
//!
//! Builds [`ServerClient`] instances from a server URL, selecting the
//! transport by the URL's scheme through a registry of builders. HTTP and
//! HTTPS are built in; other transports (such as the legacy binary RPC
//! protocol served by older servers) can be plugged in with
//! [`ClientFactory::register`]. A scheme with no registered builder is a
//! configuration error and fails immediately.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use protocol::connection::Connection;
use protocol::ServerName;
use transport::{EncryptingConnection, HttpConnection, Url};

use crate::client::ServerClient;

/// Start-up options applied to every client the factory produces.
#[derive(Debug, Clone, Default)]
pub struct ClientSettings {
    /// Whether to wrap the transport in the encrypting decorator, so every
    /// exchange is carried over a negotiated secure channel.
    pub use_encryption: bool,
}

/// Errors raised while constructing a client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FactoryError {
    /// The address uses a scheme no registered transport understands.
    #[error("unknown transport protocol '{scheme}'")]
    UnknownScheme {
        /// The unrecognised scheme.
        scheme: String,
    },

    /// The address is not a valid URL.
    #[error("invalid server address '{address}': {reason}")]
    InvalidAddress {
        /// The offending address.
        address: String,
        /// Why it could not be parsed.
        reason: String,
    },
}

/// Builds the transport for one URL scheme.
pub type ConnectionBuilder =
    Box<dyn Fn(&Url, &ClientSettings) -> Result<Box<dyn Connection>, FactoryError> + Send + Sync>;

/// Factory for [`ServerClient`] instances, dispatching on the URL scheme.
pub struct ClientFactory {
    builders: HashMap<String, ConnectionBuilder>,
}

impl Default for ClientFactory {
    fn default() -> Self {
        let mut factory = Self {
            builders: HashMap::new(),
        };
        factory.register("http", default_http_builder());
        factory.register("https", default_http_builder());
        factory
    }
}

impl ClientFactory {
    /// Creates a factory with the built-in HTTP and HTTPS transports.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the transport builder for a scheme.
    pub fn register(&mut self, scheme: &str, builder: ConnectionBuilder) {
        self.builders.insert(scheme.to_ascii_lowercase(), builder);
    }

    /// Creates a client for the server at `address`, detecting the transport
    /// from the URL scheme.
    pub fn create_client(&self, address: &str) -> Result<ServerClient, FactoryError> {
        self.create_client_with(address, &ClientSettings::default())
    }

    /// Creates a client with explicit start-up settings.
    pub fn create_client_with(
        &self,
        address: &str,
        settings: &ClientSettings,
    ) -> Result<ServerClient, FactoryError> {
        let url = Url::parse(address).map_err(|source| FactoryError::InvalidAddress {
            address: address.to_string(),
            reason: source.to_string(),
        })?;
        let scheme = url.scheme().to_ascii_lowercase();
        let builder = self
            .builders
            .get(&scheme)
            .ok_or(FactoryError::UnknownScheme { scheme })?;
        let connection = builder(&url, settings)?;
        let connection: Box<dyn Connection> = if settings.use_encryption {
            Box::new(EncryptingConnection::new(Arc::from(connection)))
        } else {
            connection
        };
        Ok(ServerClient::new(connection))
    }

    /// Creates a client addressed at another logical server behind `address`.
    pub fn create_client_for_server(
        &self,
        address: &str,
        target_server: ServerName,
    ) -> Result<ServerClient, FactoryError> {
        self.create_client_for_server_with(address, target_server, &ClientSettings::default())
    }

    /// Creates a client addressed at another logical server, with explicit
    /// start-up settings.
    pub fn create_client_for_server_with(
        &self,
        address: &str,
        target_server: ServerName,
        settings: &ClientSettings,
    ) -> Result<ServerClient, FactoryError> {
        let mut client = self.create_client_with(address, settings)?;
        client.set_target_server(Some(target_server));
        Ok(client)
    }
}

fn default_http_builder() -> ConnectionBuilder {
    Box::new(|url, _settings| Ok(Box::new(HttpConnection::new(url.clone())) as Box<dyn Connection>))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn an_http_address_yields_an_http_backed_client() {
        let factory = ClientFactory::new();
        let client = factory.create_client("http://buildserver:7777/ccnet").unwrap();
        assert_eq!(client.connection().transport_type(), "HTTP");
        assert_eq!(client.address(), "http://buildserver:7777/ccnet");
    }

    #[test]
    fn an_https_address_yields_an_http_backed_client() {
        let factory = ClientFactory::new();
        let client = factory.create_client("https://buildserver/ccnet").unwrap();
        assert_eq!(client.connection().transport_type(), "HTTP");
    }

    #[test]
    fn an_unknown_scheme_fails_fast() {
        let factory = ClientFactory::new();
        let error = factory.create_client("ftp://buildserver/").unwrap_err();
        assert_eq!(
            error,
            FactoryError::UnknownScheme {
                scheme: "ftp".to_string()
            }
        );
    }

    #[test]
    fn a_malformed_address_fails_fast() {
        let factory = ClientFactory::new();
        let error = factory.create_client("not an address").unwrap_err();
        assert!(matches!(error, FactoryError::InvalidAddress { .. }));
    }

    #[test]
    fn schemes_are_matched_case_insensitively() {
        let factory = ClientFactory::new();
        let client = factory.create_client("HTTP://buildserver/").unwrap();
        assert_eq!(client.connection().transport_type(), "HTTP");
    }

    #[test]
    fn a_registered_scheme_takes_over_its_transport() {
        let mut factory = ClientFactory::new();
        factory.register(
            "http",
            Box::new(|url, _| {
                Ok(Box::new(HttpConnection::new(url.clone())) as Box<dyn Connection>)
            }),
        );
        assert!(factory.create_client("http://buildserver/").is_ok());
    }

    #[test]
    fn the_for_server_constructor_stamps_the_target() {
        let factory = ClientFactory::new();
        let client = factory
            .create_client_for_server("http://buildserver/", ServerName::new("other-queue"))
            .unwrap();
        assert_eq!(client.target_server().as_str(), "other-queue");
    }

    #[test]
    fn encryption_wraps_the_transport_transparently() {
        let factory = ClientFactory::new();
        let client = factory
            .create_client_with(
                "http://buildserver/",
                &ClientSettings {
                    use_encryption: true,
                },
            )
            .unwrap();
        // The decorator forwards introspection, so the wrapped client still
        // reports the inner transport.
        assert_eq!(client.connection().transport_type(), "HTTP");
    }
}
