//! Tracing layer that forwards to the host console

use crate::console::ConsoleSink;
use crate::reload::ReloadHandle;
use liveconnect_core::LogLevel;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;

/// Forwards events to a [`ConsoleSink`]
pub struct HostConsoleLayer {
    sink: Arc<ConsoleSink>,
}

impl HostConsoleLayer {
    /// Layer over the process-wide sink
    pub fn new() -> Self {
        Self {
            sink: ConsoleSink::global(),
        }
    }

    pub fn with_sink(sink: Arc<ConsoleSink>) -> Self {
        Self { sink }
    }

    fn convert_level(level: &Level) -> LogLevel {
        match *level {
            Level::TRACE => LogLevel::Trace,
            Level::DEBUG => LogLevel::Debug,
            Level::INFO => LogLevel::Info,
            Level::WARN => LogLevel::Warn,
            Level::ERROR => LogLevel::Error,
        }
    }
}

impl Default for HostConsoleLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for HostConsoleLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = Self::convert_level(metadata.level());
        if !self.sink.is_enabled(level) || !self.sink.has_console() {
            return;
        }

        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);
        self.sink.log(level, metadata.target(), &visitor.finish());
    }
}

/// Renders an event as `message key=value ...`
#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl LineVisitor {
    fn finish(self) -> String {
        match (self.message.is_empty(), self.fields.is_empty()) {
            (_, true) => self.message,
            (true, false) => self.fields,
            (false, false) => format!("{} {}", self.message, self.fields),
        }
    }

    fn push_field(&mut self, name: &str, value: std::fmt::Arguments<'_>) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{}={}", name, value);
    }
}

impl Visit for LineVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.push_field(field.name(), format_args!("{:?}", value));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.push_field(field.name(), format_args!("{}", value));
        }
    }
}

/// Install the global subscriber
///
/// `LIVECONNECT_LOG` overrides `level` when set to a known name. Events go to stderr
/// and, once the host installs one, to its console. Returns `false` if a global
/// subscriber already existed; the level is applied either way.
pub fn init_logging(level: LogLevel) -> bool {
    use tracing_subscriber::prelude::*;

    let level = LogLevel::from_env().unwrap_or(level);
    ConsoleSink::global().set_level(level);

    let (filter, handle) = tracing_subscriber::reload::Layer::new(ReloadHandle::filter_for(level));
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_names(true),
        )
        .with(HostConsoleLayer::new());

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        let _ = ReloadHandle::global().reload_level(level);
        return false;
    }
    ReloadHandle::global().set_handle(handle);
    true
}
