//! liveconnect-runtime - Tokio runtime integration
//!
//! This crate provides:
//! - [`AsyncRuntime`] owning the runtime that drives the socket
//! - [`AsyncBridge`] for blocking a JNI thread on a correlated reply
//! - Shutdown signalling with a recorded [`ShutdownReason`]

mod bridge;
mod runtime;
mod shutdown;

pub use bridge::{AsyncBridge, ReplyReceiver, ReplySender, reply_channel};
pub use runtime::{AsyncRuntime, RuntimeConfig};
pub use shutdown::{ShutdownHandle, ShutdownReason, ShutdownSignal};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{AsyncBridge, AsyncRuntime, RuntimeConfig, ShutdownHandle, ShutdownSignal};
}
