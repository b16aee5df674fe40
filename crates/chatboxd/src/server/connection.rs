//! Connection handler for individual client connections.
//!
//! Each client connection gets its own `ConnectionHandler` that:
//! - Performs protocol version negotiation
//! - Parses incoming newline-delimited JSON messages
//! - Routes requests to the `ChatService`
//! - Writes one reply line per request
//!
//! Requests on one connection are handled in order, so a blocking poll holds
//! up that connection only. Clients that want to send while polling open a
//! second connection.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Connection errors are logged and result in graceful disconnect

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use chatbox_core::HubResult;
use chatbox_protocol::{ClientMessage, DaemonMessage, MessageType, ProtocolVersion};

use crate::service::ChatService;

/// Maximum message size (1 MB)
const MAX_MESSAGE_SIZE: usize = 1_048_576;

/// Read timeout for idle connections (5 minutes)
const READ_TIMEOUT: Duration = Duration::from_secs(300);

/// Write timeout (10 seconds)
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection handler for a single client.
pub struct ConnectionHandler {
    /// Buffered reader for incoming messages
    reader: BufReader<OwnedReadHalf>,

    /// Buffered writer for replies
    writer: BufWriter<OwnedWriteHalf>,

    /// Request façade
    service: ChatService,

    /// Fires on server shutdown; aborts reads and in-flight polls
    cancel_token: CancellationToken,

    /// Connection label (assigned at handshake)
    connection_id: Option<String>,

    /// Sequence number of this connection
    connection_number: u64,
}

impl ConnectionHandler {
    pub fn new(
        reader: OwnedReadHalf,
        writer: OwnedWriteHalf,
        service: ChatService,
        cancel_token: CancellationToken,
        connection_number: u64,
    ) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer: BufWriter::new(writer),
            service,
            cancel_token,
            connection_id: None,
            connection_number,
        }
    }

    /// Runs the connection handler.
    ///
    /// Performs the handshake then processes requests until the client
    /// disconnects, idles out, or the server shuts down.
    pub async fn run(mut self) -> Option<String> {
        debug!(connection = self.connection_number, "New client connected");

        if let Err(e) = self.handle_handshake().await {
            warn!(
                connection = self.connection_number,
                error = %e,
                "Handshake failed"
            );
            return None;
        }
        info!(connection_id = ?self.connection_id, "Client handshake completed");

        if let Err(e) = self.process_messages().await {
            debug!(
                connection_id = ?self.connection_id,
                error = %e,
                "Connection closed"
            );
        }

        info!(connection_id = ?self.connection_id, "Client disconnected");
        self.connection_id
    }

    /// Expects a compatible `Connect` message and answers `Connected`.
    async fn handle_handshake(&mut self) -> Result<(), ConnectionError> {
        let msg = match timeout(READ_TIMEOUT, self.read_message()).await {
            Ok(result) => result?,
            Err(_) => return Err(ConnectionError::Timeout),
        };

        let client_version = msg.protocol_version;
        if !client_version.is_compatible_with(&ProtocolVersion::CURRENT) {
            warn!(
                client_version = %client_version,
                server_version = %ProtocolVersion::CURRENT,
                "Protocol version mismatch"
            );

            self.send_message(DaemonMessage::rejected(&format!(
                "Protocol version {} not compatible with server version {}",
                client_version,
                ProtocolVersion::CURRENT
            )))
            .await?;

            return Err(ConnectionError::VersionMismatch {
                client: client_version,
                server: ProtocolVersion::CURRENT,
            });
        }

        match msg.message {
            MessageType::Connect { connection_id } => {
                let assigned = connection_id
                    .unwrap_or_else(|| format!("conn-{}", self.connection_number));
                self.connection_id = Some(assigned.clone());
                self.send_message(DaemonMessage::connected(assigned)).await
            }
            other => {
                self.send_message(DaemonMessage::protocol_error(
                    "Expected Connect message for handshake",
                ))
                .await?;
                Err(ConnectionError::UnexpectedMessage(format!("{other:?}")))
            }
        }
    }

    /// Reads and answers requests until EOF, idle timeout or shutdown.
    async fn process_messages(&mut self) -> Result<(), ConnectionError> {
        let cancel = self.cancel_token.clone();
        loop {
            let read = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(connection_id = ?self.connection_id, "Closing connection for shutdown");
                    return Ok(());
                }
                read = timeout(READ_TIMEOUT, self.read_message()) => read,
            };

            let msg = match read {
                Ok(Ok(msg)) => msg,
                Ok(Err(ConnectionError::Eof)) => {
                    debug!(connection_id = ?self.connection_id, "Client sent EOF");
                    return Ok(());
                }
                Ok(Err(ConnectionError::Parse(reason))) => {
                    // Malformed line: report it and keep the connection
                    self.send_message(DaemonMessage::protocol_error(&reason)).await?;
                    continue;
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    debug!(connection_id = ?self.connection_id, "Connection timed out");
                    return Err(ConnectionError::Timeout);
                }
            };

            if matches!(msg.message, MessageType::Disconnect) {
                debug!(connection_id = ?self.connection_id, "Client requested disconnect");
                return Ok(());
            }

            let reply = self.handle_message(msg.message).await;
            self.send_message(reply).await?;
        }
    }

    /// Turns one request into its reply.
    async fn handle_message(&self, message: MessageType) -> DaemonMessage {
        let cancel = &self.cancel_token;
        let result: HubResult<DaemonMessage> = match message {
            MessageType::Connect { .. } => {
                return DaemonMessage::protocol_error("Already connected");
            }
            MessageType::Join { id } => self.service.join(&id, cancel).await,
            MessageType::Send { from, message } => self.service.send(&from, &message, cancel).await,
            MessageType::Leave { id } => self.service.leave(&id, cancel).await,
            MessageType::Poll { id, timeout_ms } => {
                let wait = timeout_ms.map(Duration::from_millis);
                self.service.poll(&id, wait, cancel).await
            }
            MessageType::ListClients => {
                Ok(DaemonMessage::client_list(self.service.clients().await))
            }
            MessageType::Status => Ok(self.service.status().await),
            MessageType::Ping { seq } => Ok(DaemonMessage::pong(seq)),
            MessageType::Disconnect => {
                return DaemonMessage::protocol_error("Disconnect is handled by the read loop");
            }
        };

        result.unwrap_or_else(|e| DaemonMessage::from(&e))
    }

    /// Reads a single message from the client.
    async fn read_message(&mut self) -> Result<ClientMessage, ConnectionError> {
        let mut line = String::new();

        let bytes_read = self
            .reader
            .read_line(&mut line)
            .await
            .map_err(|e| ConnectionError::Io(e.to_string()))?;

        if bytes_read == 0 {
            return Err(ConnectionError::Eof);
        }

        if line.len() > MAX_MESSAGE_SIZE {
            return Err(ConnectionError::MessageTooLarge {
                size: line.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }

        let msg: ClientMessage =
            serde_json::from_str(&line).map_err(|e| ConnectionError::Parse(e.to_string()))?;

        debug!(
            connection_id = ?self.connection_id,
            message_type = ?std::mem::discriminant(&msg.message),
            "Received message"
        );

        Ok(msg)
    }

    /// Writes one reply line.
    async fn send_message(&mut self, msg: DaemonMessage) -> Result<(), ConnectionError> {
        let json =
            serde_json::to_string(&msg).map_err(|e| ConnectionError::Parse(e.to_string()))?;

        let writer = &mut self.writer;
        match timeout(WRITE_TIMEOUT, async {
            writer.write_all(json.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
            Ok::<(), std::io::Error>(())
        })
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ConnectionError::Io(e.to_string())),
            Err(_) => Err(ConnectionError::WriteTimeout),
        }
    }

    /// Returns the connection label (if the handshake completed).
    pub fn connection_id(&self) -> Option<&str> {
        self.connection_id.as_deref()
    }
}

/// Errors that can occur during connection handling.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Protocol version mismatch: client {client}, server {server}")]
    VersionMismatch {
        client: ProtocolVersion,
        server: ProtocolVersion,
    },

    #[error("Unexpected message: {0}")]
    UnexpectedMessage(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Connection closed")]
    Eof,

    #[error("Read timeout")]
    Timeout,

    #[error("Write timeout")]
    WriteTimeout,

    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_display() {
        let err = ConnectionError::VersionMismatch {
            client: ProtocolVersion::new(2, 0),
            server: ProtocolVersion::new(1, 0),
        };
        assert!(err.to_string().contains("2.0"));
        assert!(err.to_string().contains("1.0"));
    }

    #[test]
    fn test_message_size_error() {
        let err = ConnectionError::MessageTooLarge {
            size: 2_000_000,
            max: MAX_MESSAGE_SIZE,
        };
        assert!(err.to_string().contains("2000000"));
    }
}
