//! chatbox Core - Shared types for the message broadcast hub
//!
//! This crate provides the domain types shared between
//! the daemon (chatboxd), the wire protocol and the CLI client.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod client;
pub mod config;
pub mod error;

// Re-exports for convenience
pub use client::{ClientId, ClientInfo};
pub use config::{Config, ConfigError, HubConfig, ServerConfig, ServiceConfig};
pub use error::{ErrorKind, HubError, HubResult};
