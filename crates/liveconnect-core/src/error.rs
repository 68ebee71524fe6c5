//! Error types for the LiveConnect bridge

use jni::sys::{JNI_ERR, JNI_OK, jint};
use thiserror::Error;

/// Result type alias for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Status returned by JNI entry points the bridge does not implement
///
/// Matches the `NS_ERROR_NOT_IMPLEMENTED` result browsers expect from plugin JNI shims.
pub const NOT_IMPLEMENTED_STATUS: jint = 0x8000_4001_u32 as jint;

/// Error type for bridge operations
///
/// Each variant is a distinct failure class so callers can tell "the counterpart said
/// no" ([`BridgeError::Remote`]) apart from "the bridge is broken"
/// ([`BridgeError::Transport`]).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    /// The duplex stream failed or was closed
    #[error("transport error: {0}")]
    Transport(String),

    /// A message could not be encoded or decoded
    #[error("protocol error: {0}")]
    Protocol(String),

    /// No correlated reply arrived in time
    #[error("request '{command}' timed out after {waited_ms}ms")]
    Timeout { command: String, waited_ms: u64 },

    /// The counterpart answered with an `Error` reply
    #[error("remote error: {0}")]
    Remote(String),

    /// The JNI entry point is a permanent capability gap
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// The session is not in a state that allows the operation
    #[error("invalid session state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Async runtime error
    #[error("runtime error: {0}")]
    Runtime(String),

    /// A command name nobody handles
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// The plugin-bound request queue is at capacity
    #[error("request queue full ({0} pending)")]
    QueueFull(usize),

    /// The scripting engine rejected an operation
    #[error("script error: {0}")]
    Script(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Shorthand for [`BridgeError::NotImplemented`]
    pub fn not_implemented(entry_point: &str) -> Self {
        BridgeError::NotImplemented(entry_point.to_string())
    }

    /// Returns a stable numeric code for this error
    pub fn error_code(&self) -> u32 {
        match self {
            BridgeError::Transport(_) => 1,
            BridgeError::Protocol(_) => 2,
            BridgeError::Timeout { .. } => 3,
            BridgeError::Remote(_) => 4,
            BridgeError::NotImplemented(_) => 5,
            BridgeError::InvalidState { .. } => 6,
            BridgeError::Config(_) => 7,
            BridgeError::Runtime(_) => 8,
            BridgeError::UnknownCommand(_) => 9,
            BridgeError::QueueFull(_) => 10,
            BridgeError::Script(_) => 11,
            BridgeError::Internal(_) => 12,
        }
    }

    /// Rebuild an error from its code and message
    pub fn from_code(code: u32, message: String) -> Self {
        match code {
            1 => BridgeError::Transport(message),
            2 => BridgeError::Protocol(message),
            3 => BridgeError::Timeout {
                command: message,
                waited_ms: 0,
            },
            4 => BridgeError::Remote(message),
            5 => BridgeError::NotImplemented(message),
            6 => BridgeError::InvalidState {
                expected: String::new(),
                actual: message,
            },
            7 => BridgeError::Config(message),
            8 => BridgeError::Runtime(message),
            9 => BridgeError::UnknownCommand(message),
            10 => BridgeError::QueueFull(message.parse().unwrap_or(0)),
            11 => BridgeError::Script(message),
            _ => BridgeError::Internal(message),
        }
    }

    /// JNI status integer reported to native callers
    pub fn jni_status(&self) -> jint {
        match self {
            BridgeError::NotImplemented(_) => NOT_IMPLEMENTED_STATUS,
            _ => JNI_ERR,
        }
    }

    /// Whether the session itself is unusable after this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, BridgeError::Transport(_))
    }

    /// JNI status for an arbitrary result
    pub fn status_of<T>(result: &BridgeResult<T>) -> jint {
        match result {
            Ok(_) => JNI_OK,
            Err(e) => e.jni_status(),
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Config(err.to_string())
    }
}
