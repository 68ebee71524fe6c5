//! Fakes shared by the unit tests

use crate::bus::MessageBus;
use crate::java_request::{MessageSink, RequestContext};
use crate::scripting::{EngineObject, MainThreadDispatcher, ScriptEngine, Variant};
use liveconnect_core::{BridgeConfig, BridgeError, BridgeResult, ObjectId};
use liveconnect_runtime::{AsyncBridge, AsyncRuntime, RuntimeConfig};
use liveconnect_transport::{Message, Scope};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::Duration;

pub(crate) type Responder = Arc<dyn Fn(&Message) -> Option<Message> + Send + Sync>;

/// Records every outbound message and answers through the bus
pub(crate) struct ScriptedPeer {
    bus: Mutex<Option<Arc<MessageBus>>>,
    sent: Mutex<Vec<Message>>,
    responder: Mutex<Option<Responder>>,
}

impl ScriptedPeer {
    pub(crate) fn new(bus: Arc<MessageBus>) -> Arc<Self> {
        let peer = Self::unattached();
        peer.attach(bus);
        peer
    }

    /// A peer whose bus is supplied later with [`ScriptedPeer::attach`]
    pub(crate) fn unattached() -> Arc<Self> {
        Arc::new(Self {
            bus: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            responder: Mutex::new(None),
        })
    }

    pub(crate) fn attach(&self, bus: Arc<MessageBus>) {
        *self.bus.lock() = Some(bus);
    }

    pub(crate) fn respond_with<F>(&self, responder: F)
    where
        F: Fn(&Message) -> Option<Message> + Send + Sync + 'static,
    {
        *self.responder.lock() = Some(Arc::new(responder));
    }

    pub(crate) fn sent(&self) -> Vec<Message> {
        self.sent.lock().clone()
    }

    pub(crate) fn sent_commands(&self) -> Vec<String> {
        self.sent.lock().iter().map(|m| m.command.clone()).collect()
    }
}

impl MessageSink for ScriptedPeer {
    fn send(&self, message: &Message) -> BridgeResult<()> {
        self.sent.lock().push(message.clone());
        let responder = self.responder.lock().clone();
        let bus = self.bus.lock().clone();
        if let (Some(reply), Some(bus)) = (responder.and_then(|respond| respond(message)), bus) {
            bus.post(&reply);
        }
        Ok(())
    }
}

/// Reply to `request` carrying `command`
pub(crate) fn reply_to(request: &Message, command: &str) -> Message {
    Message::new(Scope::Context, request.scope_id, request.reference, command)
}

pub(crate) fn test_config() -> BridgeConfig {
    let mut config = BridgeConfig::default()
        .with_port(0)
        .with_reply_timeout(Duration::from_secs(5));
    config.worker_threads = Some(1);
    config
}

pub(crate) fn bridge() -> Arc<AsyncBridge> {
    let runtime = AsyncRuntime::new(RuntimeConfig::new().with_worker_threads(1))
        .map(Arc::new)
        .unwrap();
    Arc::new(AsyncBridge::new(runtime))
}

pub(crate) fn request_context(
    bus: &Arc<MessageBus>,
    sink: Arc<dyn MessageSink>,
    timeout: Duration,
) -> Arc<RequestContext> {
    Arc::new(RequestContext {
        bus: Arc::clone(bus),
        sink,
        bridge: bridge(),
        reply_timeout: timeout,
        poll_interval: Duration::from_millis(1),
        pump: None,
    })
}

/// In-memory engine with a property map per object
#[derive(Default)]
pub(crate) struct FakeEngine {
    pub(crate) properties: Mutex<HashMap<(EngineObject, String), Variant>>,
    pub(crate) slots: Mutex<HashMap<(EngineObject, i32), Variant>>,
    pub(crate) log: Mutex<Vec<String>>,
    pub(crate) released: Mutex<Vec<EngineObject>>,
    pub(crate) threads: Mutex<Vec<ThreadId>>,
}

impl FakeEngine {
    pub(crate) fn window_of(instance: u32) -> EngineObject {
        EngineObject(1000 + u64::from(instance))
    }

    pub(crate) fn java_wrapper(java: ObjectId) -> EngineObject {
        EngineObject(5000 + u64::from(java.get()))
    }

    pub(crate) fn set(&self, object: EngineObject, name: &str, value: Variant) {
        self.properties
            .lock()
            .insert((object, name.to_string()), value);
    }

    pub(crate) fn get(&self, object: EngineObject, name: &str) -> Option<Variant> {
        self.properties
            .lock()
            .get(&(object, name.to_string()))
            .cloned()
    }

    pub(crate) fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    fn touch(&self, entry: String) {
        self.threads.lock().push(std::thread::current().id());
        self.log.lock().push(entry);
    }
}

impl ScriptEngine for FakeEngine {
    fn window(&self, instance: u32) -> BridgeResult<EngineObject> {
        Ok(Self::window_of(instance))
    }

    fn get_property(&self, object: EngineObject, name: &str) -> BridgeResult<Variant> {
        self.touch(format!("get {}", name));
        Ok(self.get(object, name).unwrap_or(Variant::Void))
    }

    fn set_property(&self, object: EngineObject, name: &str, value: Variant) -> BridgeResult<()> {
        self.touch(format!("set {}", name));
        self.set(object, name, value);
        Ok(())
    }

    fn get_slot(&self, object: EngineObject, index: i32) -> BridgeResult<Variant> {
        self.touch(format!("get [{}]", index));
        Ok(self
            .slots
            .lock()
            .get(&(object, index))
            .cloned()
            .unwrap_or(Variant::Void))
    }

    fn set_slot(&self, object: EngineObject, index: i32, value: Variant) -> BridgeResult<()> {
        self.touch(format!("set [{}]", index));
        self.slots.lock().insert((object, index), value);
        Ok(())
    }

    fn invoke(&self, _object: EngineObject, name: &str, args: &[Variant]) -> BridgeResult<Variant> {
        self.touch(format!("invoke {}/{}", name, args.len()));
        if name == "fail" {
            return Err(BridgeError::Script("TypeError: fail is not a function".into()));
        }
        Ok(args.first().cloned().unwrap_or(Variant::Void))
    }

    fn eval(&self, _object: EngineObject, script: &str) -> BridgeResult<Variant> {
        self.touch(format!("eval {}", script));
        Ok(Variant::Int32(i32::try_from(script.len()).unwrap_or(i32::MAX)))
    }

    fn to_string(&self, object: EngineObject) -> BridgeResult<String> {
        self.touch("toString".to_string());
        Ok(format!("[object {}]", object.0))
    }

    fn wrap_java_object(&self, _instance: u32, java: ObjectId) -> BridgeResult<EngineObject> {
        Ok(Self::java_wrapper(java))
    }

    fn unwrap_java_object(&self, object: EngineObject) -> Option<ObjectId> {
        object
            .0
            .checked_sub(5000)
            .and_then(|raw| u32::try_from(raw).ok())
            .map(ObjectId::new)
    }

    fn release(&self, object: EngineObject) {
        self.released.lock().push(object);
    }
}

type Task = Box<dyn FnOnce() + Send>;

/// A dedicated thread standing in for the browser main thread
pub(crate) struct FakeMainThread {
    sender: Mutex<Option<std::sync::mpsc::Sender<Task>>>,
    id: ThreadId,
    handle: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl FakeMainThread {
    pub(crate) fn spawn() -> Arc<Self> {
        let (sender, receiver) = std::sync::mpsc::channel::<Task>();
        let handle = std::thread::Builder::new()
            .name("fake-main".into())
            .spawn(move || {
                while let Ok(task) = receiver.recv() {
                    task();
                }
            })
            .unwrap();
        Arc::new(Self {
            sender: Mutex::new(Some(sender)),
            id: handle.thread().id(),
            handle: Mutex::new(Some(handle)),
        })
    }

    pub(crate) fn id(&self) -> ThreadId {
        self.id
    }
}

impl MainThreadDispatcher for FakeMainThread {
    fn is_main_thread(&self) -> bool {
        std::thread::current().id() == self.id
    }

    fn dispatch(&self, task: Box<dyn FnOnce() + Send>) {
        if let Some(sender) = self.sender.lock().as_ref() {
            let _ = sender.send(task);
        }
    }
}

impl Drop for FakeMainThread {
    fn drop(&mut self) {
        self.sender.lock().take();
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }
}

/// Dispatcher whose tasks never run
pub(crate) struct StalledMainThread;

impl MainThreadDispatcher for StalledMainThread {
    fn is_main_thread(&self) -> bool {
        false
    }

    fn dispatch(&self, _task: Box<dyn FnOnce() + Send>) {}
}
