//! chatbox Protocol - Wire protocol for daemon communication
//!
//! Newline-delimited JSON between the `chatbox` client and the `chatboxd`
//! daemon. Each line is one [`ClientMessage`] or [`DaemonMessage`].

pub mod message;
pub mod reply;
pub mod version;

pub use message::{ClientMessage, DaemonMessage, MessageType};
pub use reply::{status_for, ErrorReply};
pub use version::{ProtocolVersion, VersionError};
