//! Runtime log level changes

use crate::console::ConsoleSink;
use liveconnect_core::{BridgeError, BridgeResult, LogLevel};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{Registry, reload};

/// Handle onto the installed level filter
pub struct ReloadHandle {
    handle: Mutex<Option<reload::Handle<LevelFilter, Registry>>>,
}

impl ReloadHandle {
    pub fn new() -> Self {
        Self {
            handle: Mutex::new(None),
        }
    }

    pub fn global() -> &'static ReloadHandle {
        static INSTANCE: OnceCell<ReloadHandle> = OnceCell::new();
        INSTANCE.get_or_init(ReloadHandle::new)
    }

    pub fn set_handle(&self, handle: reload::Handle<LevelFilter, Registry>) {
        *self.handle.lock() = Some(handle);
    }

    pub fn is_installed(&self) -> bool {
        self.handle.lock().is_some()
    }

    /// Swap the filter for `level`
    pub fn reload_level(&self, level: LogLevel) -> BridgeResult<()> {
        let guard = self.handle.lock();
        let handle = guard
            .as_ref()
            .ok_or_else(|| BridgeError::Internal("log filter not installed".to_string()))?;
        handle
            .reload(Self::filter_for(level))
            .map_err(|e| BridgeError::Internal(format!("failed to reload log filter: {}", e)))
    }

    pub fn filter_for(level: LogLevel) -> LevelFilter {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Off => LevelFilter::OFF,
        }
    }
}

impl Default for ReloadHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Change the level for both stderr output and the host console
///
/// Works before [`crate::init_logging`]; the console level is applied immediately and
/// the filter reload is skipped if nothing is installed yet.
pub fn set_log_level(level: LogLevel) -> BridgeResult<()> {
    ConsoleSink::global().set_level(level);
    let reload = ReloadHandle::global();
    if reload.is_installed() {
        reload.reload_level(level)?;
    }
    tracing::debug!(%level, "log level changed");
    Ok(())
}
