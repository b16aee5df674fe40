//! Client library for the chatbox daemon.
//!
//! [`HubClient`] speaks the newline-delimited JSON protocol over the
//! daemon's Unix socket and exposes one async method per request.

pub mod client;
pub mod error;

pub use client::{default_socket_path, HubClient, HubStatus};
pub use error::{ClientError, Result};
