//! liveconnect-logging - Tracing setup for the bridge
//!
//! This crate provides:
//! - [`init_logging`] installing a stderr formatter plus the host console layer
//! - [`HostConsoleLayer`] forwarding events to a host-supplied console
//! - Runtime log level changes through [`set_log_level`]

mod console;
mod layer;
mod reload;

pub use console::{ConsoleSink, HostConsole};
pub use layer::{HostConsoleLayer, init_logging};
pub use liveconnect_core::LogLevel;
pub use reload::{ReloadHandle, set_log_level};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{ConsoleSink, HostConsoleLayer, LogLevel, init_logging, set_log_level};
}
