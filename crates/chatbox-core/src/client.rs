//! Client identity and snapshot types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{HubError, HubResult};

/// Unique identifier of a chat client.
///
/// Assigned by the client itself at join time and immutable afterwards.
/// The only validation is that it must not be empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Creates a ClientId without validation.
    ///
    /// Prefer [`ClientId::parse`] for identifiers coming from callers.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Validates a caller-supplied identifier.
    ///
    /// # Errors
    ///
    /// Returns `HubError::MissingField { field: "id" }` if `raw` is empty.
    pub fn parse(raw: &str) -> HubResult<Self> {
        if raw.is_empty() {
            return Err(HubError::MissingField { field: "id" });
        }
        Ok(Self(raw.to_string()))
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ClientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Point-in-time view of one registered client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Client identifier
    pub id: ClientId,

    /// Messages waiting in the client's mailbox
    pub pending: usize,

    /// When the mailbox was created
    pub joined_at: DateTime<Utc>,

    /// Seconds since the client last polled
    pub idle_secs: u64,
}
