//! Bridge configuration types

use crate::{BridgeError, BridgeResult, LogLevel};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Loopback port the legacy factory listened on
pub const DEFAULT_PORT: u16 = 50007;

/// Outbound reply timeout (two minutes)
pub const DEFAULT_REPLY_TIMEOUT_MS: u64 = 120_000;

/// Configuration for one bridge session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Address the listening endpoint binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port the listening endpoint binds to
    #[serde(default = "default_port")]
    pub port: u16,

    /// How long an outbound request waits for its correlated reply
    #[serde(default = "default_reply_timeout")]
    pub reply_timeout_ms: u64,

    /// Sleep between host event pumps and main-thread result polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Maximum number of queued plugin-bound requests
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Number of queue processor threads
    #[serde(default = "default_queue_workers")]
    pub queue_workers: usize,

    /// Number of async worker threads (default: number of CPU cores)
    #[serde(default)]
    pub worker_threads: Option<usize>,

    /// Initial log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Counterpart executable; relative paths resolve against the module directory
    #[serde(default)]
    pub viewer_executable: Option<PathBuf>,
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_reply_timeout() -> u64 {
    DEFAULT_REPLY_TIMEOUT_MS
}

fn default_poll_interval() -> u64 {
    2
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_queue_workers() -> usize {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            reply_timeout_ms: default_reply_timeout(),
            poll_interval_ms: default_poll_interval(),
            queue_capacity: default_queue_capacity(),
            queue_workers: default_queue_workers(),
            worker_threads: None,
            log_level: default_log_level(),
            viewer_executable: None,
        }
    }
}

impl BridgeConfig {
    /// Create a configuration with the legacy defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Create configuration from JSON bytes
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_slice(bytes)
    }

    /// Set the reply timeout
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the listening port (0 lets the OS pick, useful in tests)
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the number of queue processor threads
    pub fn with_queue_workers(mut self, workers: usize) -> Self {
        self.queue_workers = workers;
        self
    }

    /// Set the plugin-bound queue bound
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// `host:port` of the listening endpoint
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Parsed log level, falling back to `Info` for unknown names
    pub fn log_level(&self) -> LogLevel {
        LogLevel::parse(&self.log_level).unwrap_or(LogLevel::Info)
    }

    /// Resolve the counterpart executable against the directory of the loaded module
    pub fn resolve_viewer_executable(&self, module_dir: &Path) -> Option<PathBuf> {
        self.viewer_executable.as_ref().map(|path| {
            if path.is_absolute() {
                path.clone()
            } else {
                module_dir.join(path)
            }
        })
    }

    /// Reject configurations the bridge cannot run with
    ///
    /// Port 0 is accepted: it binds an ephemeral port.
    pub fn validate(&self) -> BridgeResult<()> {
        if self.reply_timeout_ms == 0 {
            return Err(BridgeError::Config(
                "reply_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(BridgeError::Config(
                "queue_capacity must be greater than zero".to_string(),
            ));
        }
        if self.queue_workers == 0 {
            return Err(BridgeError::Config(
                "queue_workers must be greater than zero".to_string(),
            ));
        }
        if self.bind_address.trim().is_empty() {
            return Err(BridgeError::Config("bind_address is empty".to_string()));
        }
        if LogLevel::parse(&self.log_level).is_none() {
            return Err(BridgeError::Config(format!(
                "unknown log level '{}'",
                self.log_level
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config/config_tests.rs"]
mod config_tests;

#[cfg(test)]
#[path = "config/config_parameterized_tests.rs"]
mod config_parameterized_tests;
