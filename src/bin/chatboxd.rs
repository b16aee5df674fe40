//! chatbox daemon - message hub behind a Unix socket
//!
//! Runs the client registry, mailboxes and idle reaper, and serves the
//! chatbox protocol to `chatbox` CLI clients.
//!
//! # Usage
//!
//! ```bash
//! # Start in the foreground
//! chatboxd start
//!
//! # Start in the background with a config file
//! chatboxd start -d --config ~/.config/chatbox/chatbox.toml
//!
//! # Stop / inspect a background daemon
//! chatboxd stop
//! chatboxd status --config ~/.config/chatbox/chatbox.toml
//!
//! # Custom socket, verbose logs
//! CHATBOX_SOCKET=/run/chatbox.sock RUST_LOG=chatboxd=debug chatboxd start
//! ```
//!
//! SIGTERM and SIGINT stop the server, then the hub.

use std::fs::{self, File};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chatbox_core::Config;
use chatboxd::hub::Hub;
use chatboxd::server::DaemonServer;
use chatboxd::service::ChatService;

/// How long `stop` waits for the daemon to exit.
const STOP_WAIT: Duration = Duration::from_secs(5);
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// chatbox daemon - in-memory broadcast hub
#[derive(Parser, Debug)]
#[command(name = "chatboxd", version, about)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the daemon
    Start {
        /// Fork into the background
        #[arg(short = 'd', long)]
        daemon: bool,

        /// TOML config file (defaults apply when omitted)
        #[arg(short, long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
    /// Stop the running daemon
    Stop,
    /// Show daemon status
    Status {
        /// TOML config file the daemon was started with
        #[arg(short, long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}

fn state_dir() -> PathBuf {
    dirs::state_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("chatbox")
}

fn pid_file_path() -> PathBuf {
    state_dir().join("chatboxd.pid")
}

fn log_file_path() -> PathBuf {
    state_dir().join("chatboxd.log")
}

fn read_pid() -> Option<i32> {
    fs::read_to_string(pid_file_path()).ok()?.trim().parse().ok()
}

fn write_pid() -> Result<()> {
    let path = pid_file_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create state directory")?;
    }
    fs::write(&path, process::id().to_string())
        .with_context(|| format!("Failed to write PID file {}", path.display()))
}

fn remove_pid_file() {
    let _ = fs::remove_file(pid_file_path());
}

/// Signal 0 probes for existence without delivering anything.
fn is_process_running(pid: i32) -> bool {
    // SAFETY: kill with signal 0 performs only the permission/existence check
    unsafe { libc::kill(pid, 0) == 0 }
}

/// PID of a live daemon. Clears a stale PID file as a side effect.
fn running_daemon() -> Option<i32> {
    let pid = read_pid()?;
    if is_process_running(pid) {
        return Some(pid);
    }
    remove_pid_file();
    None
}

fn send_sigterm(pid: i32) -> Result<()> {
    // SAFETY: plain syscall with a PID read from our own PID file
    let result = unsafe { libc::kill(pid, libc::SIGTERM) };
    if result != 0 {
        bail!("Failed to send SIGTERM to process {pid}");
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let command = args.command.unwrap_or(Command::Start {
        daemon: false,
        config: None,
    });

    match command {
        Command::Start { daemon, config } => {
            if let Some(pid) = running_daemon() {
                eprintln!("Daemon is already running (PID {pid})");
                eprintln!("Use 'chatboxd stop' to stop it first.");
                process::exit(1);
            }

            // Bad config should fail in the terminal, not in the log file
            let config = Config::load(config.as_deref()).context("Failed to load configuration")?;

            if daemon {
                // Fork before the tokio runtime exists
                daemonize()?;
            }

            write_pid()?;
            let result = run_daemon(config);
            remove_pid_file();
            result
        }
        Command::Stop => {
            let Some(pid) = running_daemon() else {
                println!("Daemon is not running.");
                return Ok(());
            };

            println!("Stopping daemon (PID {pid})...");
            send_sigterm(pid)?;

            let attempts = STOP_WAIT.as_millis() / STOP_POLL_INTERVAL.as_millis();
            for _ in 0..attempts {
                if !is_process_running(pid) {
                    println!("Daemon stopped.");
                    return Ok(());
                }
                std::thread::sleep(STOP_POLL_INTERVAL);
            }

            eprintln!("Daemon did not stop within {} seconds.", STOP_WAIT.as_secs());
            process::exit(1);
        }
        Command::Status { config } => {
            let config = Config::load(config.as_deref()).context("Failed to load configuration")?;

            let Some(pid) = running_daemon() else {
                println!("Daemon is not running.");
                process::exit(1);
            };

            println!("Daemon is running (PID {pid})");
            let socket_path = &config.server.socket_path;
            if socket_path.exists() {
                println!("Socket: {}", socket_path.display());
            }
            println!("Log: {}", log_file_path().display());
            Ok(())
        }
    }
}

/// Detaches from the terminal, sending stdout and stderr to the log file.
fn daemonize() -> Result<()> {
    use daemonize::Daemonize;

    let log_path = log_file_path();
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).context("Failed to create log directory")?;
    }

    let stdout = File::create(&log_path).context("Failed to create log file")?;
    let stderr = stdout.try_clone().context("Failed to duplicate log file handle")?;

    Daemonize::new()
        .working_directory("/")
        .stdout(stdout)
        .stderr(stderr)
        .start()
        .context("Failed to daemonize")?;

    Ok(())
}

#[tokio::main]
async fn run_daemon(config: Config) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("chatboxd=info".parse()?)
                .add_directive("chatbox_core=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "chatbox daemon starting"
    );

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let hub = Hub::spawn(&config.hub);
    let service = ChatService::new(hub.clone(), config.service.clone());
    let server = DaemonServer::new(&config.server.socket_path, service, cancel_token);

    info!(socket = %config.server.socket_path.display(), "Starting server");

    let served = server.run().await;
    hub.shutdown().await;

    if let Err(e) = served {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("chatbox daemon stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM"),
        _ = sigint.recv() => info!("Received SIGINT"),
    }

    Ok(())
}
