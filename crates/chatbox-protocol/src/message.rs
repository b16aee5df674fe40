//! Protocol message types for daemon communication.

use chatbox_core::ClientInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::version::ProtocolVersion;

/// Requests a client can send to the daemon.
///
/// Request fields are plain strings so that empty values reach the hub and
/// come back as `ERR_MISSING_*` errors instead of failing to decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageType {
    /// Connection handshake
    Connect {
        /// Connection label (optional, daemon assigns one otherwise)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        connection_id: Option<String>,
    },

    /// Register a chat client, replacing any mailbox with the same id
    Join {
        #[serde(default)]
        id: String,
    },

    /// Broadcast a message to every other client
    Send {
        #[serde(default)]
        from: String,
        #[serde(default)]
        message: String,
    },

    /// Unregister a chat client
    Leave {
        #[serde(default)]
        id: String,
    },

    /// Wait for the next message addressed to a client
    Poll {
        #[serde(default)]
        id: String,
        /// How long to wait; the daemon default applies when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },

    /// Request the current client list
    ListClients,

    /// Request daemon status
    Status,

    /// Ping to check connection
    Ping {
        /// Sequence number for matching pong response
        seq: u64,
    },

    /// Client disconnecting gracefully
    Disconnect,
}

/// Messages sent from client to daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMessage {
    /// Protocol version
    pub protocol_version: ProtocolVersion,

    /// Message payload
    #[serde(flatten)]
    pub message: MessageType,
}

impl ClientMessage {
    /// Creates a new client message with current protocol version.
    pub fn new(message: MessageType) -> Self {
        Self {
            protocol_version: ProtocolVersion::CURRENT,
            message,
        }
    }

    pub fn connect(connection_id: Option<String>) -> Self {
        Self::new(MessageType::Connect { connection_id })
    }

    pub fn join(id: impl Into<String>) -> Self {
        Self::new(MessageType::Join { id: id.into() })
    }

    pub fn send(from: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(MessageType::Send {
            from: from.into(),
            message: message.into(),
        })
    }

    pub fn leave(id: impl Into<String>) -> Self {
        Self::new(MessageType::Leave { id: id.into() })
    }

    pub fn poll(id: impl Into<String>, timeout_ms: Option<u64>) -> Self {
        Self::new(MessageType::Poll {
            id: id.into(),
            timeout_ms,
        })
    }

    pub fn list_clients() -> Self {
        Self::new(MessageType::ListClients)
    }

    pub fn status() -> Self {
        Self::new(MessageType::Status)
    }

    pub fn ping(seq: u64) -> Self {
        Self::new(MessageType::Ping { seq })
    }

    pub fn disconnect() -> Self {
        Self::new(MessageType::Disconnect)
    }
}

/// Messages sent from daemon to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DaemonMessage {
    /// Connection accepted
    Connected {
        /// Daemon's protocol version
        protocol_version: ProtocolVersion,
        /// Assigned connection label
        connection_id: String,
    },

    /// Connection rejected (version mismatch, etc.)
    Rejected {
        /// Reason for rejection
        reason: String,
        /// Daemon's protocol version (for client to upgrade)
        protocol_version: ProtocolVersion,
    },

    /// Join succeeded
    Joined { success: bool, message: String },

    /// Broadcast reached at least one recipient
    Sent {
        success: bool,
        /// Number of mailboxes that accepted the message
        delivered: usize,
        message: String,
    },

    /// Leave succeeded
    Left { success: bool, message: String },

    /// Next message from a poll, formatted `"<from>: <text>"`
    Message { message: String },

    /// Current clients
    ClientList { clients: Vec<ClientInfo> },

    /// Daemon status
    Status {
        clients: usize,
        started_at: DateTime<Utc>,
        protocol_version: ProtocolVersion,
    },

    /// Pong response to ping
    Pong {
        /// Sequence number from ping
        seq: u64,
    },

    /// Failed request
    Error {
        /// Stable machine-readable code, e.g. `ERR_NO_RECEIVERS`
        code: String,
        /// Human readable message
        message: String,
        /// HTTP-style status
        status: u16,
    },
}

impl DaemonMessage {
    pub fn connected(connection_id: String) -> Self {
        Self::Connected {
            protocol_version: ProtocolVersion::CURRENT,
            connection_id,
        }
    }

    pub fn rejected(reason: &str) -> Self {
        Self::Rejected {
            reason: reason.to_string(),
            protocol_version: ProtocolVersion::CURRENT,
        }
    }

    pub fn joined() -> Self {
        Self::Joined {
            success: true,
            message: "User joined successfully".to_string(),
        }
    }

    pub fn sent(delivered: usize) -> Self {
        Self::Sent {
            success: true,
            delivered,
            message: "Message broadcasted".to_string(),
        }
    }

    pub fn left() -> Self {
        Self::Left {
            success: true,
            message: "User disconnected".to_string(),
        }
    }

    pub fn message(message: String) -> Self {
        Self::Message { message }
    }

    pub fn client_list(clients: Vec<ClientInfo>) -> Self {
        Self::ClientList { clients }
    }

    pub fn status(clients: usize, started_at: DateTime<Utc>) -> Self {
        Self::Status {
            clients,
            started_at,
            protocol_version: ProtocolVersion::CURRENT,
        }
    }

    pub fn pong(seq: u64) -> Self {
        Self::Pong { seq }
    }

    /// Error that did not come from the hub (bad handshake, malformed line).
    pub fn protocol_error(message: &str) -> Self {
        Self::Error {
            code: "ERR_PROTOCOL".to_string(),
            message: message.to_string(),
            status: 400,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_serialization() {
        let msg = ClientMessage::send("alice", "hi");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"send\""));
        assert!(json.contains("\"from\":\"alice\""));
        assert!(json.contains("\"protocol_version\":{\"major\":1,\"minor\":0}"));
    }

    #[test]
    fn test_poll_timeout_omitted_when_absent() {
        let json = serde_json::to_string(&ClientMessage::poll("bob", None)).unwrap();
        assert!(!json.contains("timeout_ms"));

        let json = serde_json::to_string(&ClientMessage::poll("bob", Some(1500))).unwrap();
        assert!(json.contains("\"timeout_ms\":1500"));
    }

    #[test]
    fn test_missing_fields_decode_as_empty() {
        let json = r#"{"protocol_version":{"major":1,"minor":0},"type":"join"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.message, MessageType::Join { id: String::new() });
    }

    #[test]
    fn test_message_variant_keeps_payload_field() {
        let msg = DaemonMessage::message("alice: hi".to_string());
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"message","message":"alice: hi"}"#);

        let parsed: DaemonMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_sent_reports_delivery_count() {
        match DaemonMessage::sent(3) {
            DaemonMessage::Sent {
                success,
                delivered,
                message,
            } => {
                assert!(success);
                assert_eq!(delivered, 3);
                assert_eq!(message, "Message broadcasted");
            }
            other => panic!("Expected Sent, got {other:?}"),
        }
    }
}
