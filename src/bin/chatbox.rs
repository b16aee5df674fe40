//! chatbox - command line client for the chatbox daemon
//!
//! # Usage
//!
//! ```text
//! chatbox join alice
//! chatbox send alice "hello everyone"
//! chatbox poll bob --timeout-ms 5000
//! chatbox listen bob          # keep polling, print each message
//! chatbox clients
//! chatbox status
//! chatbox leave alice
//! ```
//!
//! The socket is taken from `--socket`, then `CHATBOX_SOCKET`, then
//! `/tmp/chatbox.sock`.

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use chatbox_cli::{default_socket_path, ClientError, HubClient};

/// chatbox - talk to the chatbox daemon
#[derive(Parser, Debug)]
#[command(name = "chatbox", version, about)]
struct Args {
    /// Daemon socket path
    #[arg(long, short = 's', global = true, value_name = "PATH")]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a client id
    Join { id: String },
    /// Broadcast a message to every other client
    Send { from: String, message: String },
    /// Unregister a client id
    Leave { id: String },
    /// Wait for one message
    Poll {
        id: String,
        /// How long to wait (daemon default when omitted)
        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,
    },
    /// Poll repeatedly and print every message until interrupted
    Listen {
        id: String,
        /// Join before listening
        #[arg(long)]
        join: bool,
    },
    /// List registered clients
    Clients,
    /// Show daemon status
    Status,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chatbox_cli=warn")),
        )
        .init();

    if let Err(e) = run(Args::parse()).await {
        eprintln!("Error: {e:#}");
        process::exit(exit_code(&e));
    }
}

async fn run(args: Args) -> Result<()> {
    let socket_path = args.socket.unwrap_or_else(default_socket_path);
    let mut client = HubClient::connect(&socket_path)
        .await
        .with_context(|| format!("Is chatboxd running? (socket {})", socket_path.display()))?;
    debug!(connection_id = client.connection_id(), "Connected");

    match args.command {
        Command::Join { id } => {
            client.join(&id).await?;
            println!("Joined as {id}");
        }
        Command::Send { from, message } => {
            let delivered = client.send(&from, &message).await?;
            println!("Delivered to {delivered} client(s)");
        }
        Command::Leave { id } => {
            client.leave(&id).await?;
            println!("Left: {id}");
        }
        Command::Poll { id, timeout_ms } => {
            let message = client.poll(&id, timeout_ms.map(Duration::from_millis)).await?;
            println!("{message}");
        }
        Command::Listen { id, join } => {
            if join {
                client.join(&id).await?;
            }
            listen(&mut client, &id).await?;
        }
        Command::Clients => {
            let clients = client.list_clients().await?;
            if clients.is_empty() {
                println!("No clients connected.");
            }
            for info in clients {
                println!(
                    "{:<24} pending={:<4} idle={}s joined={}",
                    info.id,
                    info.pending,
                    info.idle_secs,
                    info.joined_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
        Command::Status => {
            let status = client.status().await?;
            println!("Clients:  {}", status.clients);
            println!("Started:  {}", status.started_at.to_rfc3339());
            println!("Protocol: {}", status.protocol_version);
        }
    }

    client.close().await?;
    Ok(())
}

/// Prints messages until the mailbox closes or Ctrl+C.
async fn listen(client: &mut HubClient, id: &str) -> Result<()> {
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            next = client.poll(id, None) => match next {
                Ok(message) => println!("{message}"),
                Err(e) if e.is_no_messages() => continue,
                Err(e) => return Err(e.into()),
            },
        }
    }
}

/// Maps hub failures to distinct exit codes so scripts can branch on them.
fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<ClientError>() {
        Some(ClientError::Hub { kind, .. }) if *kind == chatbox_core::ErrorKind::NoMessages => 2,
        Some(ClientError::Hub { .. }) => 3,
        Some(ClientError::Connect { .. }) => 4,
        _ => 1,
    }
}
