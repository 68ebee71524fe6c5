//! Bridge session
//!
//! A session owns everything one browser/viewer pairing needs: the correlation
//! counter, the Java reference table, the script object table, the message bus, the
//! plugin-bound queue workers, and the socket tasks. Nothing is process-global, so
//! several sessions can run side by side.

use crate::bus::{MessageBus, Subscriber};
use crate::java_request::{HostEventPump, MessageSink, RequestContext};
use crate::marshal::Marshaller;
use crate::plugin_request::{PluginHandler, PluginRequestProcessor, QueueProcessor, RequestQueue};
use crate::proxy_env::ProxyEnvironment;
use crate::scripting::{MainThreadDispatcher, ScriptEngine, ScriptObjectTable};
use liveconnect_core::{
    BridgeConfig, BridgeError, BridgeResult, ReferenceTable, SessionState, StateCell,
};
use liveconnect_runtime::{
    AsyncBridge, AsyncRuntime, RuntimeConfig, ShutdownHandle, ShutdownReason, ShutdownSignal,
};
use liveconnect_transport::{
    FrameReader, FrameWriter, Message, TransportChannel, TransportListener,
};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

/// How long [`BridgeSession::close`] lets the socket tasks wind down
const CLOSE_GRACE: Duration = Duration::from_millis(500);

/// Browser capabilities the session is built on
#[derive(Clone)]
pub struct HostServices {
    pub engine: Arc<dyn ScriptEngine>,
    pub dispatcher: Arc<dyn MainThreadDispatcher>,
    pub pump: Option<Arc<dyn HostEventPump>>,
}

impl HostServices {
    pub fn new(engine: Arc<dyn ScriptEngine>, dispatcher: Arc<dyn MainThreadDispatcher>) -> Self {
        Self {
            engine,
            dispatcher,
            pump: None,
        }
    }

    /// Pump host events while a main-thread caller waits for Java
    pub fn with_pump(mut self, pump: Arc<dyn HostEventPump>) -> Self {
        self.pump = Some(pump);
        self
    }
}

/// Sink feeding the socket writer task
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<Message>,
}

impl MessageSink for ChannelSink {
    fn send(&self, message: &Message) -> BridgeResult<()> {
        self.sender
            .send(message.clone())
            .map_err(|_| BridgeError::Transport("writer task has stopped".to_string()))
    }
}

/// Marks the session failed and wakes everything waiting on it
struct Teardown {
    state: Arc<StateCell>,
    bus: Arc<MessageBus>,
    shutdown: ShutdownHandle,
}

impl Teardown {
    fn fail(&self, error: BridgeError) {
        let current = self.state.get();
        if current.is_terminal() || current == SessionState::Closing {
            tracing::debug!(%error, state = %current, "transport ended after close");
            return;
        }
        if self.state.transition_to(SessionState::Failed).is_err() {
            return;
        }
        tracing::error!(%error, "session failed");
        self.bus.shutdown(error.clone());
        self.shutdown
            .trigger(ShutdownReason::TransportLost(error.to_string()));
    }
}

/// A bound endpoint waiting for the counterpart to connect
pub struct ListeningSession {
    config: BridgeConfig,
    services: HostServices,
    runtime: Arc<AsyncRuntime>,
    listener: TransportListener,
    state: Arc<StateCell>,
}

impl ListeningSession {
    pub fn local_addr(&self) -> BridgeResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// Command line launching the configured viewer with the bound port as its argument
    ///
    /// `None` when no viewer executable is configured.
    pub fn viewer_command(&self, module_dir: &Path) -> BridgeResult<Option<Command>> {
        let port = self.local_addr()?.port();
        Ok(self
            .config
            .resolve_viewer_executable(module_dir)
            .map(|executable| {
                let mut command = Command::new(executable);
                command.arg(port.to_string());
                command
            }))
    }

    /// Wait for the counterpart, at most the reply timeout
    pub fn accept(self) -> BridgeResult<BridgeSession> {
        let ListeningSession {
            config,
            services,
            runtime,
            listener,
            state,
        } = self;
        let timeout = config.reply_timeout();

        let accepted = runtime.block_on(async move {
            tokio::time::timeout(timeout, listener.accept()).await
        });
        let channel = match accepted {
            Ok(Ok(Ok(channel))) => channel,
            Ok(Ok(Err(e))) => return Err(never_connected(&state, e.into())),
            Ok(Err(_)) => {
                let error = BridgeError::Timeout {
                    command: "accept".to_string(),
                    waited_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                };
                return Err(never_connected(&state, error));
            }
            Err(e) => return Err(never_connected(&state, e)),
        };
        BridgeSession::start(config, services, runtime, state, channel)
    }
}

fn never_connected(state: &StateCell, error: BridgeError) -> BridgeError {
    state.set(SessionState::Failed);
    tracing::error!(%error, "counterpart never connected");
    error
}

/// One live bridge between a browser and its applet viewer
pub struct BridgeSession {
    config: BridgeConfig,
    state: Arc<StateCell>,
    bus: Arc<MessageBus>,
    references: Arc<ReferenceTable>,
    objects: Arc<ScriptObjectTable>,
    requests: Arc<RequestContext>,
    proxy: Arc<ProxyEnvironment>,
    _plugin: Arc<dyn Subscriber>,
    queue: Mutex<Option<QueueProcessor>>,
    runtime: Arc<AsyncRuntime>,
}

impl BridgeSession {
    /// Bind the configured endpoint
    pub fn bind(config: BridgeConfig, services: HostServices) -> BridgeResult<ListeningSession> {
        config.validate()?;
        liveconnect_logging::init_logging(config.log_level());

        let runtime = Arc::new(AsyncRuntime::new(RuntimeConfig::from_bridge_config(&config))?);
        let address = config.listen_address();
        let listener = runtime.block_on(TransportListener::bind(&address))??;
        tracing::info!(%address, "bridge listening");

        Ok(ListeningSession {
            config,
            services,
            runtime,
            listener,
            state: Arc::new(StateCell::new(SessionState::Listening)),
        })
    }

    /// Bind, then wait for the counterpart
    pub fn listen(config: BridgeConfig, services: HostServices) -> BridgeResult<Self> {
        Self::bind(config, services)?.accept()
    }

    /// Run over an already connected stream
    pub fn over_channel<R, W>(
        config: BridgeConfig,
        services: HostServices,
        channel: TransportChannel<R, W>,
    ) -> BridgeResult<Self>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        config.validate()?;
        liveconnect_logging::init_logging(config.log_level());
        let runtime = Arc::new(AsyncRuntime::new(RuntimeConfig::from_bridge_config(&config))?);
        Self::start(config, services, runtime, Arc::new(StateCell::default()), channel)
    }

    /// Build a session whose outbound messages go to `sink`
    ///
    /// Inbound messages are fed with [`BridgeSession::deliver`].
    pub fn with_sink(
        config: BridgeConfig,
        services: HostServices,
        sink: Arc<dyn MessageSink>,
    ) -> BridgeResult<Self> {
        config.validate()?;
        liveconnect_logging::init_logging(config.log_level());
        let runtime = Arc::new(AsyncRuntime::new(RuntimeConfig::from_bridge_config(&config))?);
        let state = Arc::new(StateCell::default());
        let session = Self::assemble(config, services, runtime, state, sink)?;
        session.connected()?;
        Ok(session)
    }

    fn start<R, W>(
        config: BridgeConfig,
        services: HostServices,
        runtime: Arc<AsyncRuntime>,
        state: Arc<StateCell>,
        channel: TransportChannel<R, W>,
    ) -> BridgeResult<Self>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (reader, writer) = channel.into_split();
        let (sender, outbound) = mpsc::unbounded_channel();
        let sink: Arc<dyn MessageSink> = Arc::new(ChannelSink { sender });
        let session = Self::assemble(config, services, Arc::clone(&runtime), state, sink)?;

        let teardown = Arc::new(Teardown {
            state: Arc::clone(&session.state),
            bus: Arc::clone(&session.bus),
            shutdown: runtime.shutdown_handle(),
        });

        let bus = Arc::clone(&session.bus);
        let signal = runtime.shutdown_signal();
        let on_error = Arc::clone(&teardown);
        runtime.spawn(async move {
            if let Err(e) = read_loop(reader, bus, signal).await {
                on_error.fail(e);
            }
        });

        let signal = runtime.shutdown_signal();
        runtime.spawn(async move {
            if let Err(e) = write_loop(writer, outbound, signal).await {
                teardown.fail(e);
            }
        });

        session.connected()?;
        Ok(session)
    }

    fn assemble(
        config: BridgeConfig,
        services: HostServices,
        runtime: Arc<AsyncRuntime>,
        state: Arc<StateCell>,
        sink: Arc<dyn MessageSink>,
    ) -> BridgeResult<Self> {
        let bus = Arc::new(MessageBus::new());
        let references = Arc::new(ReferenceTable::new());
        let objects = Arc::new(ScriptObjectTable::new());
        let requests = Arc::new(RequestContext {
            bus: Arc::clone(&bus),
            sink: Arc::clone(&sink),
            bridge: Arc::new(AsyncBridge::new(Arc::clone(&runtime))),
            reply_timeout: config.reply_timeout(),
            poll_interval: config.poll_interval(),
            pump: services.pump.clone(),
        });
        let proxy = Arc::new(ProxyEnvironment::new(
            Arc::clone(&requests),
            Arc::clone(&references),
            0,
        ));

        let handler = Arc::new(PluginHandler::new(
            Marshaller::new(Arc::clone(&proxy), services.engine, Arc::clone(&objects)),
            services.dispatcher,
            sink,
            config.poll_interval(),
            config.reply_timeout(),
        ));
        let queue = Arc::new(RequestQueue::new(config.queue_capacity));
        let workers = QueueProcessor::spawn(
            Arc::clone(&queue),
            Arc::clone(&handler),
            config.queue_workers,
        )?;
        let plugin: Arc<dyn Subscriber> = Arc::new(PluginRequestProcessor::new(handler, queue));
        bus.subscribe(&plugin);

        Ok(Self {
            config,
            state,
            bus,
            references,
            objects,
            requests,
            proxy,
            _plugin: plugin,
            queue: Mutex::new(Some(workers)),
            runtime,
        })
    }

    fn connected(&self) -> BridgeResult<()> {
        self.state
            .transition_to(SessionState::Connected)
            .map_err(|actual| BridgeError::InvalidState {
                expected: "Idle or Listening".to_string(),
                actual: actual.to_string(),
            })?;
        tracing::info!("session connected");
        Ok(())
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    pub fn references(&self) -> &Arc<ReferenceTable> {
        &self.references
    }

    pub fn script_objects(&self) -> &Arc<ScriptObjectTable> {
        &self.objects
    }

    /// JNI surface for context 0
    pub fn proxy(&self) -> &Arc<ProxyEnvironment> {
        &self.proxy
    }

    /// JNI surface for another context, sharing this session's reference table
    pub fn environment(&self, context_id: u32) -> ProxyEnvironment {
        ProxyEnvironment::new(
            Arc::clone(&self.requests),
            Arc::clone(&self.references),
            context_id,
        )
    }

    /// Parse one wire message and post it to the bus, returning whether it was consumed
    pub fn deliver(&self, wire: &str) -> BridgeResult<bool> {
        let message = Message::parse(wire)?;
        tracing::trace!(wire, "delivering message");
        Ok(self.bus.post(&message))
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.runtime.shutdown_signal()
    }

    /// Tear the session down; pending requests fail with a transport error
    ///
    /// Idempotent. A failed session stays `Failed`.
    pub fn close(&self) {
        let closing = self.state.transition_to(SessionState::Closing).is_ok();

        self.bus
            .shutdown(BridgeError::Transport("session closed".to_string()));
        if let Some(mut workers) = self.queue.lock().take() {
            workers.stop();
        }
        self.runtime.shutdown(CLOSE_GRACE);

        if closing && self.state.transition_to(SessionState::Closed).is_ok() {
            tracing::info!("session closed");
        }
    }
}

impl Drop for BridgeSession {
    fn drop(&mut self) {
        self.close();
    }
}

async fn read_loop<R: AsyncRead + Unpin>(
    mut reader: FrameReader<R>,
    bus: Arc<MessageBus>,
    mut shutdown: ShutdownSignal,
) -> BridgeResult<()> {
    loop {
        let frame = tokio::select! {
            reason = shutdown.wait() => {
                tracing::debug!(%reason, "reader stopping");
                return Ok(());
            }
            frame = reader.read_message() => frame?,
        };
        let Some(bytes) = frame else {
            return Err(BridgeError::Transport(
                "counterpart closed the connection".to_string(),
            ));
        };
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "dropping non-ASCII message");
                continue;
            }
        };
        match Message::parse(&text) {
            Ok(message) => {
                tracing::trace!(wire = %text, "received");
                bus.post(&message);
            }
            Err(e) => tracing::warn!(error = %e, wire = %text, "dropping malformed message"),
        }
    }
}

async fn write_loop<W: AsyncWrite + Unpin>(
    mut writer: FrameWriter<W>,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    mut shutdown: ShutdownSignal,
) -> BridgeResult<()> {
    loop {
        let message = tokio::select! {
            biased;
            message = outbound.recv() => match message {
                Some(message) => message,
                None => break,
            },
            reason = shutdown.wait() => {
                tracing::debug!(%reason, "writer stopping");
                break;
            }
        };
        tracing::trace!(wire = %message, "sending");
        writer.write_message(message.to_wire().as_bytes()).await?;
    }
    if let Err(e) = writer.shutdown().await {
        tracing::debug!(error = %e, "writer shutdown");
    }
    Ok(())
}

#[cfg(test)]
#[path = "session/session_tests.rs"]
mod session_tests;
