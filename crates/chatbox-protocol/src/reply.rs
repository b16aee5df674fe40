//! Mapping of hub errors onto wire error replies.
//!
//! | kind           | status | code                                    |
//! |----------------|--------|-----------------------------------------|
//! | InvalidInput   | 400    | `ERR_MISSING_USER_ID`, `ERR_MISSING_FIELD` |
//! | NotFound       | 404    | `ERR_USER_NOT_FOUND`                    |
//! | NoReceivers    | 409    | `ERR_NO_RECEIVERS`                      |
//! | ChannelClosed  | 410    | `ERR_CHANNEL_CLOSED`                    |
//! | NoMessages     | 408    | `ERR_NO_MESSAGES`                       |
//! | Timeout        | 503    | `ERR_TIMEOUT`, `ERR_CANCELLED`          |
//! | Internal       | 500    | `INTERNAL_ERROR`                        |

use chatbox_core::{ErrorKind, HubError};
use serde::{Deserialize, Serialize};

use crate::message::DaemonMessage;

/// HTTP-style status for an error kind.
pub fn status_for(kind: ErrorKind) -> u16 {
    match kind {
        ErrorKind::InvalidInput => 400,
        ErrorKind::NotFound => 404,
        ErrorKind::NoReceivers => 409,
        ErrorKind::ChannelClosed => 410,
        ErrorKind::NoMessages => 408,
        ErrorKind::Timeout => 503,
        ErrorKind::Internal => 500,
    }
}

/// Caller-visible form of a failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub code: String,
    pub message: String,
    pub status: u16,
}

impl ErrorReply {
    /// Kind of the error, `Internal` for codes this build does not know.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::from_code(&self.code)
    }
}

impl From<&HubError> for ErrorReply {
    fn from(err: &HubError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            status: status_for(err.kind()),
        }
    }
}

impl From<ErrorReply> for DaemonMessage {
    fn from(reply: ErrorReply) -> Self {
        DaemonMessage::Error {
            code: reply.code,
            message: reply.message,
            status: reply.status,
        }
    }
}

impl From<&HubError> for DaemonMessage {
    fn from(err: &HubError) -> Self {
        ErrorReply::from(err).into()
    }
}
