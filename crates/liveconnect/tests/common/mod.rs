//! Host and counterpart doubles shared by the integration tests

#![allow(dead_code)]

use liveconnect::{
    BridgeConfig, BridgeResult, EngineObject, HostServices, MainThreadDispatcher, Message,
    ObjectId, ScriptEngine, Variant,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread::ThreadId;
use std::time::Duration;

/// Engine backed by a property map
#[derive(Default)]
pub struct MapEngine {
    properties: Mutex<HashMap<(EngineObject, String), Variant>>,
    pub touched_on: Mutex<Vec<ThreadId>>,
}

impl MapEngine {
    pub fn window_of(instance: u32) -> EngineObject {
        EngineObject(u64::from(instance) + 1)
    }

    pub fn set(&self, object: EngineObject, name: &str, value: Variant) {
        self.properties
            .lock()
            .insert((object, name.to_string()), value);
    }

    fn touch(&self) {
        self.touched_on.lock().push(std::thread::current().id());
    }
}

impl ScriptEngine for MapEngine {
    fn window(&self, instance: u32) -> BridgeResult<EngineObject> {
        Ok(Self::window_of(instance))
    }

    fn get_property(&self, object: EngineObject, name: &str) -> BridgeResult<Variant> {
        self.touch();
        Ok(self
            .properties
            .lock()
            .get(&(object, name.to_string()))
            .cloned()
            .unwrap_or(Variant::Void))
    }

    fn set_property(&self, object: EngineObject, name: &str, value: Variant) -> BridgeResult<()> {
        self.touch();
        self.set(object, name, value);
        Ok(())
    }

    fn get_slot(&self, _object: EngineObject, _index: i32) -> BridgeResult<Variant> {
        self.touch();
        Ok(Variant::Void)
    }

    fn set_slot(&self, _object: EngineObject, _index: i32, _value: Variant) -> BridgeResult<()> {
        self.touch();
        Ok(())
    }

    fn invoke(&self, _object: EngineObject, _name: &str, _args: &[Variant]) -> BridgeResult<Variant> {
        self.touch();
        Ok(Variant::Void)
    }

    fn eval(&self, _object: EngineObject, _script: &str) -> BridgeResult<Variant> {
        self.touch();
        Ok(Variant::Void)
    }

    fn to_string(&self, object: EngineObject) -> BridgeResult<String> {
        self.touch();
        Ok(format!("[object {}]", object.0))
    }

    fn wrap_java_object(&self, _instance: u32, java: ObjectId) -> BridgeResult<EngineObject> {
        Ok(EngineObject(1_000_000 + u64::from(java.get())))
    }
}

type Task = Box<dyn FnOnce() + Send>;

/// A thread standing in for the browser main thread
pub struct MainThread {
    sender: Mutex<mpsc::Sender<Task>>,
    id: ThreadId,
}

impl MainThread {
    pub fn spawn() -> Arc<Self> {
        let (sender, receiver) = mpsc::channel::<Task>();
        let handle = std::thread::Builder::new()
            .name("browser-main".into())
            .spawn(move || {
                while let Ok(task) = receiver.recv() {
                    task();
                }
            })
            .unwrap();
        Arc::new(Self {
            sender: Mutex::new(sender),
            id: handle.thread().id(),
        })
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }
}

impl MainThreadDispatcher for MainThread {
    fn is_main_thread(&self) -> bool {
        std::thread::current().id() == self.id
    }

    fn dispatch(&self, task: Box<dyn FnOnce() + Send>) {
        let _ = self.sender.lock().send(task);
    }
}

pub fn host() -> (Arc<MapEngine>, Arc<MainThread>, HostServices) {
    let engine = Arc::new(MapEngine::default());
    let main = MainThread::spawn();
    let services = HostServices::new(engine.clone(), main.clone());
    (engine, main, services)
}

pub fn config(reply_timeout: Duration) -> BridgeConfig {
    let mut config = BridgeConfig::default()
        .with_port(0)
        .with_reply_timeout(reply_timeout);
    config.worker_threads = Some(2);
    config
}

/// Applet viewer side of the socket, speaking the wire format with std I/O
pub struct Counterpart {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Counterpart {
    pub fn connect(address: SocketAddr) -> Self {
        let stream = TcpStream::connect(address).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(10)))
            .unwrap();
        Self {
            reader: BufReader::new(stream.try_clone().unwrap()),
            writer: stream,
        }
    }

    pub fn read(&mut self) -> Message {
        let mut frame = Vec::new();
        self.reader.read_until(0, &mut frame).unwrap();
        assert_eq!(frame.pop(), Some(0), "frame not terminated");
        Message::parse(std::str::from_utf8(&frame).unwrap()).unwrap()
    }

    pub fn send(&mut self, message: &Message) {
        let mut frame = message.to_wire().into_bytes();
        frame.push(0);
        self.writer.write_all(&frame).unwrap();
        self.writer.flush().unwrap();
    }

    /// Answer `request` with `command` and extra tokens
    pub fn reply(request: &Message, command: &str) -> Message {
        Message::context(request.scope_id, request.reference, command)
    }
}

/// Keeps the host doubles alive for the length of a test
pub struct HostHandles {
    pub engine: Arc<MapEngine>,
    pub main: Arc<MainThread>,
}
