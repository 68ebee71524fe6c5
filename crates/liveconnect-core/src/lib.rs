//! liveconnect-core - Shared types for the LiveConnect bridge
//!
//! This crate provides the foundational types every other bridge crate builds on:
//! - [`BridgeError`] for the bridge's error taxonomy
//! - [`BridgeConfig`] for session configuration
//! - [`SessionState`] for the session lifecycle
//! - [`ReferenceTable`] for reference-counted foreign object identifiers

mod config;
mod error;
mod lifecycle;
mod reference;

pub use config::{BridgeConfig, DEFAULT_PORT, DEFAULT_REPLY_TIMEOUT_MS};
pub use error::{BridgeError, BridgeResult, NOT_IMPLEMENTED_STATUS};
pub use lifecycle::{SessionState, StateCell};
pub use reference::{ObjectId, Reference, ReferenceKind, ReferenceTable};

/// Environment variable consulted by [`LogLevel::from_env`]
pub const LOG_ENV_VAR: &str = "LIVECONNECT_LOG";

/// Log levels understood by the bridge and its host console
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Off = 5,
}

impl LogLevel {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => LogLevel::Trace,
            1 => LogLevel::Debug,
            2 => LogLevel::Info,
            3 => LogLevel::Warn,
            4 => LogLevel::Error,
            _ => LogLevel::Off,
        }
    }

    /// Parse a level name such as `"debug"` (case-insensitive)
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            "off" | "none" => Some(LogLevel::Off),
            _ => None,
        }
    }

    /// Read the level from `LIVECONNECT_LOG`, if it is set to a known name
    pub fn from_env() -> Option<Self> {
        std::env::var(LOG_ENV_VAR)
            .ok()
            .and_then(|value| Self::parse(&value))
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
            LogLevel::Off => write!(f, "OFF"),
        }
    }
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        BridgeConfig, BridgeError, BridgeResult, LogLevel, ObjectId, ReferenceTable, SessionState,
    };
}
