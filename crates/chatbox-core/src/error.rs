//! Hub error types following panic-free policy.
//!
//! Every core operation returns `HubResult<T>`. Each `HubError` belongs to one
//! [`ErrorKind`] and carries a stable machine-readable code that the transport
//! adapter forwards to callers.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::client::ClientId;

/// Errors that can occur in hub operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    /// A required request field was empty
    #[error("{field} is required")]
    MissingField { field: &'static str },

    /// No mailbox is registered for the client
    #[error("user not connected: {0}")]
    ClientNotFound(ClientId),

    /// A broadcast reached no recipient
    #[error("no clients received the message")]
    NoReceivers,

    /// The mailbox was closed before or during a poll
    #[error("user's channel is closed: {0}")]
    ChannelClosed(ClientId),

    /// A poll waited its full timeout without a message
    #[error("no messages received")]
    NoMessages,

    /// The overall request deadline expired
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The caller abandoned the request
    #[error("request cancelled")]
    Cancelled,

    /// Anything else
    #[error("internal error: {0}")]
    Internal(String),
}

/// Classification of [`HubError`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    NoReceivers,
    ChannelClosed,
    NoMessages,
    Timeout,
    Internal,
}

impl HubError {
    /// Creates an internal error from any displayable error.
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        Self::Internal(err.to_string())
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingField { .. } => ErrorKind::InvalidInput,
            Self::ClientNotFound(_) => ErrorKind::NotFound,
            Self::NoReceivers => ErrorKind::NoReceivers,
            Self::ChannelClosed(_) => ErrorKind::ChannelClosed,
            Self::NoMessages => ErrorKind::NoMessages,
            Self::Timeout(_) | Self::Cancelled => ErrorKind::Timeout,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns the stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingField { field: "id" } => "ERR_MISSING_USER_ID",
            Self::MissingField { .. } => "ERR_MISSING_FIELD",
            Self::ClientNotFound(_) => "ERR_USER_NOT_FOUND",
            Self::NoReceivers => "ERR_NO_RECEIVERS",
            Self::ChannelClosed(_) => "ERR_CHANNEL_CLOSED",
            Self::NoMessages => "ERR_NO_MESSAGES",
            Self::Timeout(_) => "ERR_TIMEOUT",
            Self::Cancelled => "ERR_CANCELLED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl ErrorKind {
    /// Recovers the kind from a wire code.
    ///
    /// Codes this version does not know decode as `Internal`.
    pub fn from_code(code: &str) -> Self {
        match code {
            "ERR_MISSING_USER_ID" | "ERR_MISSING_FIELD" => Self::InvalidInput,
            "ERR_USER_NOT_FOUND" => Self::NotFound,
            "ERR_NO_RECEIVERS" => Self::NoReceivers,
            "ERR_CHANNEL_CLOSED" => Self::ChannelClosed,
            "ERR_NO_MESSAGES" => Self::NoMessages,
            "ERR_TIMEOUT" | "ERR_CANCELLED" => Self::Timeout,
            _ => Self::Internal,
        }
    }
}

/// Result type for hub operations.
pub type HubResult<T> = Result<T, HubError>;
