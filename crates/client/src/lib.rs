//! High-level client for the Anvil build server.
//!
//! [`ServerClient`] exposes one method per remote operation and manages the
//! session token across them; [`ClientFactory`] builds clients from a server
//! URL, selecting the transport by scheme and optionally wrapping it in the
//! encrypting decorator.
//!
//! ```no_run
//! use client::ClientFactory;
//! use protocol::ProjectName;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let factory = ClientFactory::new();
//! let client = factory.create_client("http://buildserver:7777/ccnet")?;
//!
//! client.force_build(ProjectName::new("Project #1")).await?;
//! for status in client.get_project_status().await? {
//!     println!("{}: {:?}", status.name, status.build_status);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;

pub use client::ServerClient;
pub use factory::{ClientFactory, ClientSettings, ConnectionBuilder, FactoryError};
