//! Runtime configuration for the hub, service façade and socket server.
//!
//! Every field has a default, so an empty (or missing) TOML file yields the
//! stock configuration:
//!
//! ```toml
//! [hub]
//! mailbox_capacity = 100
//! poll_timeout_ms = 10000
//! client_ttl_secs = 300
//! reap_interval_secs = 60
//!
//! [service]
//! request_timeout_ms = 5000
//! poll_grace_ms = 1000
//! slow_request_ms = 1000
//!
//! [server]
//! socket_path = "/tmp/chatbox.sock"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable that overrides `server.socket_path`.
pub const SOCKET_ENV_VAR: &str = "CHATBOX_SOCKET";

/// Default socket path
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/chatbox.sock";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub hub: HubConfig,
    pub service: ServiceConfig,
    pub server: ServerConfig,
}

/// Mailbox, poll and reaper tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HubConfig {
    /// Maximum queued messages per client
    pub mailbox_capacity: usize,

    /// How long a poll waits for a message when the caller gives no timeout
    pub poll_timeout_ms: u64,

    /// Idle time after which a client that never polls is reaped
    pub client_ttl_secs: u64,

    /// Interval between reaper sweeps
    pub reap_interval_secs: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 100,
            poll_timeout_ms: 10_000,
            client_ttl_secs: 300,
            reap_interval_secs: 60,
        }
    }
}

impl HubConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn client_ttl(&self) -> Duration {
        Duration::from_secs(self.client_ttl_secs)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }
}

/// Per-request deadlines applied by the service façade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Deadline for join, send and leave
    pub request_timeout_ms: u64,

    /// Extra time a poll request gets on top of its wait before it times out
    pub poll_grace_ms: u64,

    /// Requests slower than this are logged
    pub slow_request_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 5_000,
            poll_grace_ms: 1_000,
            slow_request_ms: 1_000,
        }
    }
}

impl ServiceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn poll_grace(&self) -> Duration {
        Duration::from_millis(self.poll_grace_ms)
    }

    pub fn slow_request(&self) -> Duration {
        Duration::from_millis(self.slow_request_ms)
    }
}

/// Socket server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Path of the Unix socket the daemon listens on
    pub socket_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
        }
    }
}

impl Config {
    /// Loads configuration from an optional TOML file.
    ///
    /// `None` yields the defaults. The `CHATBOX_SOCKET` environment variable
    /// is applied on top, then the result is validated.
    ///
    /// # Errors
    ///
    /// - `ConfigError::Read` if the file cannot be read
    /// - `ConfigError::Parse` if it is not valid TOML for this schema
    /// - `ConfigError::Invalid` if a value is out of range
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let contents = fs::read_to_string(path).map_err(|e| ConfigError::Read {
                    path: path.to_path_buf(),
                    error: e.to_string(),
                })?;
                Self::from_toml(&contents)?
            }
            None => Self::default(),
        };

        if let Ok(socket) = std::env::var(SOCKET_ENV_VAR) {
            if !socket.is_empty() {
                config.server.socket_path = PathBuf::from(socket);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Parses configuration from a TOML string without touching the environment.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Rejects values the hub cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hub.mailbox_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "hub.mailbox_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.hub.reap_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "hub.reap_interval_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.hub.client_ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "hub.client_ttl_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.service.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "service.request_timeout_ms",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.server.socket_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "server.socket_path",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Errors that can occur while loading configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {error}")]
    Read { path: PathBuf, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.hub.mailbox_capacity, 100);
        assert_eq!(config.hub.poll_timeout(), Duration::from_secs(10));
        assert_eq!(config.hub.client_ttl(), Duration::from_secs(300));
        assert_eq!(config.hub.reap_interval(), Duration::from_secs(60));
        assert_eq!(config.service.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.server.socket_path, PathBuf::from(DEFAULT_SOCKET_PATH));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = Config::from_toml(
            r#"
            [hub]
            mailbox_capacity = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.hub.mailbox_capacity, 5);
        assert_eq!(config.hub.poll_timeout_ms, 10_000);
        assert_eq!(config.service, ServiceConfig::default());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = Config::from_toml("[hub]\nmailbox_size = 5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_zero_capacity_invalid() {
        let config = Config::from_toml("[hub]\nmailbox_capacity = 0\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("hub.mailbox_capacity"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[service]\nrequest_timeout_ms = 250").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.service.request_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_load_socket_path_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nsocket_path = \"/tmp/chatbox-alt.sock\"").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        if std::env::var_os(SOCKET_ENV_VAR).is_none() {
            assert_eq!(config.server.socket_path, PathBuf::from("/tmp/chatbox-alt.sock"));
        }
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Some(Path::new("/nonexistent/chatbox.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
