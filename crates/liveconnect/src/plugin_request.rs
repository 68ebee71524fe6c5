//! Plugin-bound request processing
//!
//! The counterpart asks the browser to touch script objects with instance-scoped
//! commands. [`PluginRequestProcessor`] claims them from the bus: `GetWindow` is answered
//! inline, everything else goes onto a bounded FIFO drained by [`QueueProcessor`]
//! workers. Engine work always runs on the browser main thread; operations that mutate
//! script state hold the write side of one lock so they never interleave with each other
//! or with reads.

use crate::bus::Subscriber;
use crate::command::{ERROR_COMMAND, PluginCommand};
use crate::java_request::MessageSink;
use crate::marshal::Marshaller;
use crate::scripting::{EngineObject, MainThreadDispatcher, ScriptEngine, Variant, run_on_main};
use liveconnect_core::{BridgeError, BridgeResult, ObjectId};
use liveconnect_transport::codec::{decode_reference, parse_int};
use liveconnect_transport::{Message, Scope};
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

struct QueueState {
    items: VecDeque<Message>,
    stopped: bool,
}

/// Bounded FIFO of inbound requests
pub struct RequestQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
    capacity: usize,
}

impl RequestQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                stopped: false,
            }),
            ready: Condvar::new(),
            capacity,
        }
    }

    /// Append a request and wake one worker
    pub fn push(&self, message: Message) -> BridgeResult<()> {
        let mut state = self.state.lock();
        if state.stopped {
            return Err(BridgeError::InvalidState {
                expected: "running queue".to_string(),
                actual: "stopped".to_string(),
            });
        }
        if state.items.len() >= self.capacity {
            return Err(BridgeError::QueueFull(state.items.len()));
        }
        state.items.push_back(message);
        drop(state);
        self.ready.notify_one();
        Ok(())
    }

    /// Take the oldest request, waiting while the queue is empty
    ///
    /// Returns `None` once the queue is stopped.
    pub fn pop(&self) -> Option<Message> {
        let mut state = self.state.lock();
        loop {
            if state.stopped {
                return None;
            }
            if let Some(message) = state.items.pop_front() {
                return Some(message);
            }
            self.ready.wait(&mut state);
        }
    }

    /// Stop the queue and wake every worker; returns the requests left behind
    pub fn stop(&self) -> usize {
        let mut state = self.state.lock();
        state.stopped = true;
        let abandoned = state.items.len();
        state.items.clear();
        drop(state);
        self.ready.notify_all();
        abandoned
    }

    pub fn is_stopped(&self) -> bool {
        self.state.lock().stopped
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Executes inbound requests against the script engine
pub struct PluginHandler {
    marshaller: Marshaller,
    dispatcher: Arc<dyn MainThreadDispatcher>,
    sink: Arc<dyn MessageSink>,
    script_lock: RwLock<()>,
    poll_interval: Duration,
    timeout: Duration,
    cancelled: AtomicBool,
}

impl PluginHandler {
    pub fn new(
        marshaller: Marshaller,
        dispatcher: Arc<dyn MainThreadDispatcher>,
        sink: Arc<dyn MessageSink>,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            marshaller,
            dispatcher,
            sink,
            script_lock: RwLock::new(()),
            poll_interval,
            timeout,
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn marshaller(&self) -> &Marshaller {
        &self.marshaller
    }

    /// Abandon every pending main-thread wait
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Execute one request and send its reply
    pub fn handle(&self, message: &Message) {
        let Some(command) = PluginCommand::parse(&message.command) else {
            tracing::warn!(command = %message.command, "unknown plugin command");
            return;
        };
        tracing::debug!(
            %command,
            instance = message.scope_id,
            reference = message.reference,
            "handling plugin request"
        );

        let (reply, handed_over) = match self.execute(command, message) {
            Ok(result) => {
                let reply = Message::context(0, message.reference, command.reply_command());
                match result {
                    Some(id) => (reply.arg(id), hands_over_java_object(command).then_some(id)),
                    None => (reply, None),
                }
            }
            Err(e) => {
                tracing::warn!(%command, error = %e, "plugin request failed");
                (error_reply(message, &e.to_string()), None)
            }
        };

        if message.expects_reply() {
            tracing::trace!(wire = %reply, "replying to plugin request");
            if let Err(e) = self.sink.send(&reply) {
                tracing::error!(%command, error = %e, "failed to send reply");
            }
        }
        // The counterpart owns the result object from here on.
        if let Some(id) = handed_over {
            self.marshaller.env().references().release(id);
        }
    }

    fn execute(&self, command: PluginCommand, message: &Message) -> BridgeResult<Option<ObjectId>> {
        let instance = message.scope_id;
        match command {
            PluginCommand::GetWindow => {
                let window = self.marshaller.engine().window(instance)?;
                Ok(Some(ObjectId::new(self.marshaller.objects().register(window))))
            }
            PluginCommand::GetMember => {
                let target = self.target(message)?;
                let name = self.java_string(message, 1)?;
                let value = self.script(command, move |engine| engine.get_property(target, &name))?;
                self.store(&value).map(Some)
            }
            PluginCommand::SetMember => {
                let target = self.target(message)?;
                let name = self.java_string(message, 1)?;
                let value = self.java_value(instance, message, 2)?;
                self.script(command, move |engine| engine.set_property(target, &name, value))?;
                Ok(None)
            }
            PluginCommand::ToString => {
                let target = self.target(message)?;
                let text = self.script(command, move |engine| engine.to_string(target))?;
                self.marshaller.env().new_string_utf(&text).map(Some)
            }
            PluginCommand::Call => {
                let target = self.target(message)?;
                let name = self.java_string(message, 1)?;
                let args = self.java_arguments(instance, message, 2)?;
                let value =
                    self.script(command, move |engine| engine.invoke(target, &name, &args))?;
                self.store(&value).map(Some)
            }
            PluginCommand::GetSlot => {
                let target = self.target(message)?;
                let index = slot_index(message)?;
                let value = self.script(command, move |engine| engine.get_slot(target, index))?;
                self.store(&value).map(Some)
            }
            PluginCommand::SetSlot => {
                let target = self.target(message)?;
                let index = slot_index(message)?;
                let value = self.java_value(instance, message, 2)?;
                self.script(command, move |engine| engine.set_slot(target, index, value))?;
                Ok(None)
            }
            PluginCommand::Eval => {
                let target = self.target(message)?;
                let script = self.java_string(message, 1)?;
                let value = self.script(command, move |engine| engine.eval(target, &script))?;
                self.store(&value).map(Some)
            }
            PluginCommand::Finalize => {
                let handle = parse_int::<u32>(message.arg_at(0)?, "script object")?;
                if let Some(object) = self.marshaller.objects().release(handle) {
                    self.script(command, move |engine| {
                        engine.release(object);
                        Ok(())
                    })?;
                }
                Ok(None)
            }
        }
    }

    fn target(&self, message: &Message) -> BridgeResult<EngineObject> {
        let handle = parse_int::<u32>(message.arg_at(0)?, "script object")?;
        self.marshaller.objects().require(handle)
    }

    fn java_string(&self, message: &Message, index: usize) -> BridgeResult<String> {
        let id = decode_reference(message.arg_at(index)?)?;
        self.marshaller.env().get_string_utf_chars(id)
    }

    fn java_value(&self, instance: u32, message: &Message, index: usize) -> BridgeResult<Variant> {
        let id = decode_reference(message.arg_at(index)?)?;
        self.marshaller.java_to_variant(instance, id)
    }

    /// Elements of a Java `Object[]`, converted in order; a null array means no arguments
    fn java_arguments(
        &self,
        instance: u32,
        message: &Message,
        index: usize,
    ) -> BridgeResult<Vec<Variant>> {
        let array = decode_reference(message.arg_at(index)?)?;
        if array.is_null() {
            return Ok(Vec::new());
        }
        let env = self.marshaller.env();
        let length = env.get_array_length(array)?;
        (0..length)
            .map(|i| {
                let element = env.get_object_array_element(array, i)?;
                let value = self.marshaller.java_to_variant(instance, element);
                env.delete_local_ref(element)?;
                value
            })
            .collect()
    }

    fn store(&self, value: &Variant) -> BridgeResult<ObjectId> {
        self.marshaller.variant_to_java(value)
    }

    /// Run an engine task on the main thread under the script lock
    ///
    /// Writes take the lock exclusively; reads share it.
    fn script<T, F>(&self, command: PluginCommand, task: F) -> BridgeResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn ScriptEngine) -> BridgeResult<T> + Send + 'static,
    {
        if command.is_write() {
            let _exclusive = self.script_lock.write();
            self.on_main(command.as_str(), task)
        } else {
            let _shared = self.script_lock.read();
            self.on_main(command.as_str(), task)
        }
    }

    fn on_main<T, F>(&self, label: &str, task: F) -> BridgeResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn ScriptEngine) -> BridgeResult<T> + Send + 'static,
    {
        let engine = Arc::clone(self.marshaller.engine());
        run_on_main(
            self.dispatcher.as_ref(),
            self.poll_interval,
            self.timeout,
            &self.cancelled,
            label,
            move || task(engine.as_ref()),
        )?
    }
}

/// Whether a successful result is a Java object id rather than a script handle
fn hands_over_java_object(command: PluginCommand) -> bool {
    command != PluginCommand::GetWindow
}

fn slot_index(message: &Message) -> BridgeResult<i32> {
    Ok(parse_int::<i32>(message.arg_at(1)?, "slot index")?)
}

fn error_reply(request: &Message, text: &str) -> Message {
    Message::context(0, request.reference, ERROR_COMMAND).utf8_arg(text)
}

/// Bus subscriber claiming instance-scoped commands
pub struct PluginRequestProcessor {
    handler: Arc<PluginHandler>,
    queue: Arc<RequestQueue>,
}

impl PluginRequestProcessor {
    pub fn new(handler: Arc<PluginHandler>, queue: Arc<RequestQueue>) -> Self {
        Self { handler, queue }
    }

    pub fn queue(&self) -> &Arc<RequestQueue> {
        &self.queue
    }
}

impl Subscriber for PluginRequestProcessor {
    fn new_message_on_bus(&self, message: &Message) -> bool {
        if message.scope != Scope::Instance {
            return false;
        }
        let Some(command) = PluginCommand::parse(&message.command) else {
            return false;
        };

        if command.is_inline() {
            self.handler.handle(message);
            return true;
        }
        if let Err(e) = self.queue.push(message.clone()) {
            tracing::warn!(%command, error = %e, "plugin request rejected");
            if message.expects_reply() {
                let text = match e {
                    BridgeError::QueueFull(_) => "queue full".to_string(),
                    other => other.to_string(),
                };
                if let Err(send_err) = self.handler.sink.send(&error_reply(message, &text)) {
                    tracing::error!(error = %send_err, "failed to send rejection");
                }
            }
        }
        true
    }

    fn on_bus_closed(&self, reason: &BridgeError) {
        self.handler.cancel();
        let abandoned = self.queue.stop();
        tracing::debug!(%reason, abandoned, "plugin request queue stopped");
    }
}

/// Worker threads draining the plugin-bound queue
pub struct QueueProcessor {
    queue: Arc<RequestQueue>,
    handler: Arc<PluginHandler>,
    workers: Vec<JoinHandle<()>>,
}

impl QueueProcessor {
    /// Start `count` workers, each named `liveconnect-queue-N`
    pub fn spawn(
        queue: Arc<RequestQueue>,
        handler: Arc<PluginHandler>,
        count: usize,
    ) -> BridgeResult<Self> {
        let mut processor = Self {
            queue: Arc::clone(&queue),
            handler: Arc::clone(&handler),
            workers: Vec::with_capacity(count),
        };
        for index in 0..count {
            let queue = Arc::clone(&queue);
            let handler = Arc::clone(&handler);
            let worker = std::thread::Builder::new()
                .name(format!("liveconnect-queue-{}", index))
                .spawn(move || {
                    tracing::debug!(index, "queue processor started");
                    while let Some(message) = queue.pop() {
                        handler.handle(&message);
                    }
                    tracing::debug!(index, "queue processor stopped");
                })
                .map_err(|e| {
                    BridgeError::Runtime(format!("failed to start queue processor: {}", e))
                })?;
            processor.workers.push(worker);
        }
        Ok(processor)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stop the queue and join every worker
    pub fn stop(&mut self) {
        self.handler.cancel();
        self.queue.stop();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::error!("queue processor panicked");
            }
        }
    }
}

impl Drop for QueueProcessor {
    fn drop(&mut self) {
        self.stop();
    }
}
