//! chatbox Daemon - message hub and socket server
//!
//! This crate provides the core infrastructure for the chatbox daemon:
//! - `hub` - client registry, mailboxes, broadcaster, poller and idle reaper
//! - `service` - request façade adding deadlines and cancellation
//! - `server` - Unix socket server speaking the chatbox protocol
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      chatboxd daemon                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │  DaemonServer   │────▶│        ChatService          │   │
//! │  │ (Unix Socket)   │     │  (deadlines, cancellation)  │   │
//! │  └────────┬────────┘     └──────────────┬──────────────┘   │
//! │           │                             │                   │
//! │           │ connections                 │ join/send/poll    │
//! │           ▼                             ▼                   │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │ConnectionHandler│     │   Hub: Registry + Reaper    │   │
//! │  │  (per client)   │     │   (per-client Mailboxes)    │   │
//! │  └─────────────────┘     └─────────────────────────────┘   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel and socket failures are handled gracefully

pub mod hub;
pub mod server;
pub mod service;
