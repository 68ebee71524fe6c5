//! Java-bound request processing
//!
//! A [`JavaRequestProcessor`] sends one command to the Java side and blocks its caller
//! until the reply tagged with the same `(scope id, reference)` arrives, the reply
//! timeout elapses, or the session fails.

use crate::bus::{MessageBus, Subscriber};
use crate::command::{ERROR_COMMAND, JavaCommand, LITERAL_RETURN, ReplyShape};
use liveconnect_core::{BridgeError, BridgeResult, ObjectId};
use liveconnect_runtime::{AsyncBridge, ReplyReceiver, ReplySender, reply_channel};
use liveconnect_transport::codec::{decode_reference, decode_utf8_payload, decode_utf16_payload};
use liveconnect_transport::{Message, Scope, WideString};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outbound half of the transport
pub trait MessageSink: Send + Sync {
    /// Queue one message for the counterpart
    fn send(&self, message: &Message) -> BridgeResult<()>;
}

/// Access to the browser's event loop
///
/// When a Java-bound call is made on the browser main thread the caller keeps the
/// browser responsive by pumping its events while it waits.
pub trait HostEventPump: Send + Sync {
    fn is_main_thread(&self) -> bool;

    /// Process at most one pending host event, returning whether one ran
    fn pump(&self) -> bool;
}

/// Decoded reply payload
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Identifier(ObjectId),
    Text(String),
    Wide(WideString),
    /// A raw primitive token, decoded by the caller against its JNI type
    Literal(String),
    Call(CallResult),
    Ack,
}

/// Result of `CallMethod`/`CallStaticMethod`
#[derive(Debug, Clone, PartialEq)]
pub enum CallResult {
    Literal(String),
    Object(ObjectId),
}

/// Where a request is in its life
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    Sent,
    Waiting,
    Fulfilled,
    TimedOut,
    Error,
}

/// Shared plumbing every request needs
pub struct RequestContext {
    pub bus: Arc<MessageBus>,
    pub sink: Arc<dyn MessageSink>,
    pub bridge: Arc<AsyncBridge>,
    pub reply_timeout: Duration,
    pub poll_interval: Duration,
    pub pump: Option<Arc<dyn HostEventPump>>,
}

/// One outbound request at a time
pub struct JavaRequestProcessor {
    context: Arc<RequestContext>,
    state: Mutex<RequestState>,
}

impl JavaRequestProcessor {
    pub fn new(context: Arc<RequestContext>) -> Self {
        Self {
            context,
            state: Mutex::new(RequestState::Idle),
        }
    }

    pub fn state(&self) -> RequestState {
        *self.state.lock()
    }

    /// Send `command` with `args` and wait for its correlated reply
    ///
    /// The reply subscription is always removed before returning.
    pub fn call(
        &self,
        scope_id: u32,
        source: Option<&str>,
        command: JavaCommand,
        args: Vec<String>,
    ) -> BridgeResult<Reply> {
        let reference = self.context.bridge.next_reference();
        let (sender, receiver) = reply_channel();
        let pending: Arc<dyn Subscriber> = Arc::new(PendingReply {
            scope_id,
            reference,
            command,
            slot: Mutex::new(Some(sender)),
        });

        let mut message =
            Message::new(Scope::Context, scope_id, reference, command.as_str()).args(args);
        if let Some(source) = source {
            message = message.with_source(source);
        }

        self.context.bus.subscribe(&pending);
        let result = self
            .send(&message)
            .and_then(|()| self.wait(receiver, command));
        self.context.bus.unsubscribe(&pending);

        self.set_state(match &result {
            Ok(_) => RequestState::Fulfilled,
            Err(BridgeError::Timeout { .. }) => RequestState::TimedOut,
            Err(_) => RequestState::Error,
        });
        match &result {
            Ok(_) => tracing::debug!(%command, reference, "request fulfilled"),
            Err(e) => tracing::debug!(%command, reference, error = %e, "request failed"),
        }
        result
    }

    fn send(&self, message: &Message) -> BridgeResult<()> {
        tracing::trace!(wire = %message, "sending request");
        self.context.sink.send(message)?;
        self.set_state(RequestState::Sent);
        Ok(())
    }

    fn wait(
        &self,
        mut receiver: ReplyReceiver<Reply>,
        command: JavaCommand,
    ) -> BridgeResult<Reply> {
        self.set_state(RequestState::Waiting);
        let timeout = self.context.reply_timeout;

        let pump = match &self.context.pump {
            Some(pump) if pump.is_main_thread() => pump,
            _ => {
                return self
                    .context
                    .bridge
                    .wait_reply(receiver, timeout, command.as_str());
            }
        };

        let started = Instant::now();
        loop {
            if let Some(result) = AsyncBridge::poll_reply(&mut receiver) {
                return result;
            }
            let waited = started.elapsed();
            if waited >= timeout {
                return Err(BridgeError::Timeout {
                    command: command.as_str().to_string(),
                    waited_ms: u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
                });
            }
            if !pump.pump() {
                std::thread::sleep(self.context.poll_interval);
            }
        }
    }

    fn set_state(&self, state: RequestState) {
        *self.state.lock() = state;
    }
}

/// Bus subscription for one outstanding request
struct PendingReply {
    scope_id: u32,
    reference: i32,
    command: JavaCommand,
    slot: Mutex<Option<ReplySender<Reply>>>,
}

impl Subscriber for PendingReply {
    fn new_message_on_bus(&self, message: &Message) -> bool {
        if message.scope != Scope::Context
            || message.scope_id != self.scope_id
            || message.reference != self.reference
        {
            return false;
        }
        let Some(sender) = self.slot.lock().take() else {
            tracing::warn!(
                command = %self.command,
                reference = self.reference,
                "duplicate reply dropped"
            );
            return true;
        };
        let _ = sender.send(decode_reply(self.command, message));
        true
    }

    fn on_bus_closed(&self, reason: &BridgeError) {
        if let Some(sender) = self.slot.lock().take() {
            let _ = sender.send(Err(reason.clone()));
        }
    }
}

/// Decode a reply according to the command's shape
pub fn decode_reply(command: JavaCommand, message: &Message) -> BridgeResult<Reply> {
    if message.command == ERROR_COMMAND {
        return Err(BridgeError::Remote(error_text(&message.args)));
    }
    if message.command != command.as_str() {
        return Err(BridgeError::Protocol(format!(
            "reply to {} carries command {}",
            command, message.command
        )));
    }

    let reply = match command.reply_shape() {
        ReplyShape::Identifier => Reply::Identifier(decode_reference(message.arg_at(0)?)?),
        ReplyShape::Utf8 => Reply::Text(decode_utf8_payload(&message.args)?.0),
        ReplyShape::Utf16 => Reply::Wide(decode_utf16_payload(&message.args)?.0),
        ReplyShape::Literal => Reply::Literal(message.arg_at(0)?.to_string()),
        ReplyShape::CallResult => {
            let first = message.arg_at(0)?;
            if first == LITERAL_RETURN {
                Reply::Call(CallResult::Literal(message.arg_at(1)?.to_string()))
            } else {
                Reply::Call(CallResult::Object(decode_reference(first)?))
            }
        }
        ReplyShape::Ack => Reply::Ack,
    };
    Ok(reply)
}

/// Error text is a UTF-8 payload, or bare words from older peers
pub fn error_text<S: AsRef<str>>(args: &[S]) -> String {
    match decode_utf8_payload(args) {
        Ok((text, consumed)) if consumed == args.len() => text,
        _ => args
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(" "),
    }
}
