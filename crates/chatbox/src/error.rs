//! Error types for the chatbox client.
//!
//! **Panic-Free Policy:** This module follows the project's panic-free guidelines.
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, or `todo!()`.

use std::io;
use std::path::PathBuf;

use chatbox_core::ErrorKind;
use chatbox_protocol::{ErrorReply, ProtocolVersion};
use thiserror::Error;

/// Client-side errors.
///
/// Failures reported by the daemon itself arrive as [`ClientError::Hub`],
/// everything else is a local transport or protocol problem.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Could not reach the daemon socket.
    ///
    /// Usually means the daemon is not running; `chatboxd start` fixes it.
    #[error("Failed to connect to daemon at {path}: {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Read or write on an established connection failed.
    #[error("Connection error: {0}")]
    Io(#[from] io::Error),

    /// The daemon closed the connection, or an earlier request on it failed
    /// before its reply was read.
    #[error("Connection to daemon is closed")]
    Disconnected,

    /// No reply arrived in time.
    #[error("Timed out waiting for daemon reply")]
    Timeout,

    /// The daemon refused our protocol version.
    #[error("Daemon rejected connection (server protocol {server}): {reason}")]
    Rejected {
        reason: String,
        server: ProtocolVersion,
    },

    /// A line could not be encoded or decoded.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The reply did not match the request.
    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),

    /// The daemon answered with an error reply.
    #[error("{message} ({code}, status {status})")]
    Hub {
        kind: ErrorKind,
        code: String,
        message: String,
        status: u16,
    },
}

impl ClientError {
    /// Kind of a daemon-side failure, `None` for local errors.
    pub fn hub_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Hub { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// True for a poll that simply found nothing to deliver.
    pub fn is_no_messages(&self) -> bool {
        self.hub_kind() == Some(ErrorKind::NoMessages)
    }
}

impl From<ErrorReply> for ClientError {
    fn from(reply: ErrorReply) -> Self {
        Self::Hub {
            kind: reply.kind(),
            code: reply.code,
            message: reply.message,
            status: reply.status,
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
