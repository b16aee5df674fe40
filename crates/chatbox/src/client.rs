//! Request/reply client for the chatbox daemon.
//!
//! This module provides the `HubClient` which handles:
//! - Connection to the daemon via Unix socket
//! - The `connect` handshake and protocol version check
//! - Typed wrappers around each request
//!
//! Each request waits for its reply before the next one is sent. A poll
//! therefore occupies the connection; use a second client to send while
//! another is listening.
//!
//! **Panic-Free Policy:** This module follows the project's panic-free guidelines.
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, or `todo!()`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chatbox_core::config::{DEFAULT_SOCKET_PATH, SOCKET_ENV_VAR};
use chatbox_core::ClientInfo;
use chatbox_protocol::{ClientMessage, DaemonMessage, ErrorReply, ProtocolVersion};
use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::time::timeout;
use tracing::debug;

use crate::error::{ClientError, Result};

/// How long to wait for any reply other than a poll.
const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(10);

/// Socket path from `CHATBOX_SOCKET`, falling back to the default.
pub fn default_socket_path() -> PathBuf {
    std::env::var_os(SOCKET_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET_PATH))
}

/// Daemon status as reported by a `status` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubStatus {
    pub clients: usize,
    pub started_at: DateTime<Utc>,
    pub protocol_version: ProtocolVersion,
}

/// Connected, handshaken client.
///
/// # Example
///
/// ```rust,ignore
/// use chatbox_cli::HubClient;
///
/// let mut client = HubClient::connect("/tmp/chatbox.sock").await?;
/// client.join("alice").await?;
/// client.send("alice", "hello").await?;
/// ```
pub struct HubClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    connection_id: String,
    reply_timeout: Duration,
    /// A request was written and its reply not read; the stream is out of step
    in_flight: bool,
}

impl HubClient {
    /// Connects to the daemon and performs the handshake.
    pub async fn connect(socket_path: impl AsRef<Path>) -> Result<Self> {
        Self::connect_as(socket_path, None).await
    }

    /// Like [`HubClient::connect`], asking for a specific connection label.
    pub async fn connect_as(
        socket_path: impl AsRef<Path>,
        connection_id: Option<String>,
    ) -> Result<Self> {
        let path = socket_path.as_ref();
        let stream = UnixStream::connect(path)
            .await
            .map_err(|source| ClientError::Connect {
                path: path.to_path_buf(),
                source,
            })?;
        let (reader, writer) = stream.into_split();

        let mut client = Self {
            reader: BufReader::new(reader),
            writer,
            connection_id: String::new(),
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            in_flight: false,
        };

        match client.exchange(ClientMessage::connect(connection_id), DEFAULT_REPLY_TIMEOUT).await? {
            DaemonMessage::Connected {
                connection_id,
                protocol_version,
            } => {
                debug!(
                    connection_id = %connection_id,
                    server_version = %protocol_version,
                    "Connected to daemon"
                );
                client.connection_id = connection_id;
                Ok(client)
            }
            DaemonMessage::Rejected {
                reason,
                protocol_version,
            } => Err(ClientError::Rejected {
                reason,
                server: protocol_version,
            }),
            other => Err(unexpected(other)),
        }
    }

    /// Overrides how long non-poll requests wait for a reply.
    #[must_use]
    pub fn with_reply_timeout(mut self, reply_timeout: Duration) -> Self {
        self.reply_timeout = reply_timeout;
        self
    }

    /// Label the daemon assigned to this connection.
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Registers `id`, replacing any existing registration.
    pub async fn join(&mut self, id: &str) -> Result<()> {
        match self.request(ClientMessage::join(id)).await? {
            DaemonMessage::Joined { .. } => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Broadcasts `message` from `from`. Returns how many clients got it.
    pub async fn send(&mut self, from: &str, message: &str) -> Result<usize> {
        match self.request(ClientMessage::send(from, message)).await? {
            DaemonMessage::Sent { delivered, .. } => Ok(delivered),
            other => Err(unexpected(other)),
        }
    }

    /// Unregisters `id`.
    pub async fn leave(&mut self, id: &str) -> Result<()> {
        match self.request(ClientMessage::leave(id)).await? {
            DaemonMessage::Left { .. } => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Waits for the next message for `id`.
    ///
    /// `wait` of `None` uses the daemon's default. An empty mailbox at the
    /// deadline comes back as a `NoMessages` hub error.
    pub async fn poll(&mut self, id: &str, wait: Option<Duration>) -> Result<String> {
        let timeout_ms = wait.map(|w| u64::try_from(w.as_millis()).unwrap_or(u64::MAX));
        // The daemon enforces the wait; allow it a full reply window on top
        let limit = wait.unwrap_or(DEFAULT_REPLY_TIMEOUT) + self.reply_timeout;

        match self.call(ClientMessage::poll(id, timeout_ms), limit).await? {
            DaemonMessage::Message { message } => Ok(message),
            other => Err(unexpected(other)),
        }
    }

    /// Lists registered clients, sorted by id.
    pub async fn list_clients(&mut self) -> Result<Vec<ClientInfo>> {
        match self.request(ClientMessage::list_clients()).await? {
            DaemonMessage::ClientList { clients } => Ok(clients),
            other => Err(unexpected(other)),
        }
    }

    pub async fn status(&mut self) -> Result<HubStatus> {
        match self.request(ClientMessage::status()).await? {
            DaemonMessage::Status {
                clients,
                started_at,
                protocol_version,
            } => Ok(HubStatus {
                clients,
                started_at,
                protocol_version,
            }),
            other => Err(unexpected(other)),
        }
    }

    /// Round-trips a ping. Returns the echoed sequence number.
    pub async fn ping(&mut self, seq: u64) -> Result<u64> {
        match self.request(ClientMessage::ping(seq)).await? {
            DaemonMessage::Pong { seq } => Ok(seq),
            other => Err(unexpected(other)),
        }
    }

    /// Says goodbye and drops the connection.
    pub async fn close(mut self) -> Result<()> {
        self.write(&ClientMessage::disconnect()).await
    }

    async fn request(&mut self, msg: ClientMessage) -> Result<DaemonMessage> {
        let limit = self.reply_timeout;
        self.call(msg, limit).await
    }

    /// Sends `msg` and turns an error reply into `ClientError::Hub`.
    async fn call(&mut self, msg: ClientMessage, limit: Duration) -> Result<DaemonMessage> {
        match self.exchange(msg, limit).await? {
            DaemonMessage::Error {
                code,
                message,
                status,
            } => Err(ErrorReply {
                code,
                message,
                status,
            }
            .into()),
            reply => Ok(reply),
        }
    }

    /// Writes one request and reads its reply.
    ///
    /// If that fails part way (timeout, I/O error, dropped future) the
    /// reply may still arrive later, so every later call fails with
    /// `Disconnected` instead of reading it as its own reply.
    async fn exchange(&mut self, msg: ClientMessage, limit: Duration) -> Result<DaemonMessage> {
        if self.in_flight {
            return Err(ClientError::Disconnected);
        }
        self.in_flight = true;

        self.write(&msg).await?;
        let reply = timeout(limit, self.read())
            .await
            .map_err(|_| ClientError::Timeout)??;

        self.in_flight = false;
        Ok(reply)
    }

    async fn write(&mut self, msg: &ClientMessage) -> Result<()> {
        let json = serde_json::to_string(msg)?;
        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn read(&mut self) -> Result<DaemonMessage> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Err(ClientError::Disconnected);
        }
        Ok(serde_json::from_str(&line)?)
    }
}

fn unexpected(reply: DaemonMessage) -> ClientError {
    ClientError::UnexpectedReply(format!("{reply:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_socket_path_falls_back() {
        if std::env::var_os(SOCKET_ENV_VAR).is_none() {
            assert_eq!(default_socket_path(), PathBuf::from(DEFAULT_SOCKET_PATH));
        }
    }

    #[tokio::test]
    async fn test_connect_to_missing_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.sock");

        let result = HubClient::connect(&path).await;
        match result {
            Err(ClientError::Connect { path: p, .. }) => assert_eq!(p, path),
            Err(other) => panic!("Expected Connect error, got {other:?}"),
            Ok(_) => panic!("Expected Connect error, got a client"),
        }
    }

    #[test]
    fn test_unexpected_reply_names_variant() {
        let err = unexpected(DaemonMessage::pong(1));
        assert!(err.to_string().contains("Pong"));
    }
}
