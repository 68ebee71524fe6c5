//! # liveconnect
//!
//! LiveConnect bridge between a browser's scripting engine and an out-of-process Java
//! applet viewer.
//!
//! The browser side listens on a loopback socket; the viewer connects and both ends
//! exchange NUL-terminated text messages. Traffic flows both ways:
//! - Java-bound: the browser drives a remote JNI environment through
//!   [`ProxyEnvironment`] and blocks until each correlated reply arrives
//! - Plugin-bound: the viewer asks the browser to read, write, call and evaluate script
//!   objects; [`PluginRequestProcessor`] and its [`QueueProcessor`] workers answer
//!
//! ## Quick Start
//!
//! ```ignore
//! use liveconnect::prelude::*;
//!
//! let services = HostServices::new(engine, dispatcher);
//! let listening = BridgeSession::bind(BridgeConfig::default(), services)?;
//! if let Some(mut viewer) = listening.viewer_command(&module_dir)? {
//!     viewer.spawn()?;
//! }
//! let session = listening.accept()?;
//!
//! let env = session.proxy();
//! let class = env.find_class("java/lang/System")?;
//! let method = env.get_static_method_id(class, "currentTimeMillis", "()J")?;
//! let now = env.call_static_method(class, method, &[])?;
//! ```
//!
//! ## Crate Structure
//!
//! This crate builds on:
//! - [`liveconnect_core`] - errors, configuration, lifecycle and the reference table
//! - [`liveconnect_transport`] - wire codec, message envelope and framed channel
//! - [`liveconnect_runtime`] - Tokio runtime and blocking reply waits
//! - [`liveconnect_logging`] - tracing setup and host console forwarding

mod bus;
mod command;
mod java_request;
mod marshal;
mod plugin_request;
mod proxy_env;
mod registry;
mod scripting;
mod session;

#[cfg(test)]
mod test_support;

pub use bus::{MessageBus, Subscriber};
pub use command::{ERROR_COMMAND, JavaCommand, LITERAL_RETURN, PluginCommand, ReplyShape};
pub use java_request::{
    CallResult, HostEventPump, JavaRequestProcessor, MessageSink, Reply, RequestContext,
    RequestState, decode_reply, error_text,
};
pub use marshal::{JS_OBJECT_CLASS, Marshaller};
pub use plugin_request::{PluginHandler, PluginRequestProcessor, QueueProcessor, RequestQueue};
pub use proxy_env::ProxyEnvironment;
pub use registry::SessionRegistry;
pub use scripting::{
    EngineObject, MainThreadDispatcher, ScriptEngine, ScriptObjectTable, Variant, run_on_main,
};
pub use session::{BridgeSession, ChannelSink, HostServices, ListeningSession};

// Re-export the types callers pass through the public API
pub use liveconnect_core::{
    BridgeConfig, BridgeError, BridgeResult, LogLevel, ObjectId, ReferenceTable, SessionState,
};
pub use liveconnect_logging::{ConsoleSink, HostConsole, init_logging, set_log_level};
pub use liveconnect_transport::{JValue, JniType, Message, MethodSignature, Scope, WideString};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        BridgeConfig, BridgeError, BridgeResult, BridgeSession, EngineObject, HostServices,
        JValue, MainThreadDispatcher, ObjectId, ProxyEnvironment, ScriptEngine, SessionState,
        Variant,
    };
}
