//! Host console forwarding
//!
//! The embedding browser may expose a console (the Java console, a debug pane). When
//! one is installed, every enabled event is handed to it as `(level, target, message)`.

use liveconnect_core::LogLevel;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

/// Console callback supplied by the host
pub type HostConsole = Arc<dyn Fn(LogLevel, &str, &str) + Send + Sync>;

static GLOBAL_SINK: Lazy<Arc<ConsoleSink>> = Lazy::new(|| Arc::new(ConsoleSink::new()));

/// Level gate plus the optional host console
pub struct ConsoleSink {
    console: RwLock<Option<HostConsole>>,
    level: AtomicU8,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self {
            console: RwLock::new(None),
            level: AtomicU8::new(LogLevel::Info as u8),
        }
    }

    /// The process-wide sink used by [`crate::init_logging`]
    pub fn global() -> Arc<ConsoleSink> {
        Arc::clone(&GLOBAL_SINK)
    }

    pub fn set_console(&self, console: Option<HostConsole>) {
        *self.console.write() = console;
    }

    pub fn has_console(&self) -> bool {
        self.console.read().is_some()
    }

    pub fn set_level(&self, level: LogLevel) {
        self.level.store(level as u8, Ordering::SeqCst);
    }

    pub fn level(&self) -> LogLevel {
        LogLevel::from_u8(self.level.load(Ordering::SeqCst))
    }

    pub fn is_enabled(&self, level: LogLevel) -> bool {
        level != LogLevel::Off && level >= self.level()
    }

    /// Forward one line to the console if the level passes
    pub fn log(&self, level: LogLevel, target: &str, message: &str) {
        if !self.is_enabled(level) {
            return;
        }
        // Clone out so the console runs without the lock held.
        let console = self.console.read().clone();
        if let Some(console) = console {
            console(level, target, message);
        }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}
