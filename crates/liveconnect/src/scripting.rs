//! Browser-side collaborators
//!
//! The bridge does not embed a JavaScript engine. The host supplies a [`ScriptEngine`]
//! and a [`MainThreadDispatcher`]; engine objects cross the wire only as ids from a
//! [`ScriptObjectTable`].

use liveconnect_core::{BridgeError, BridgeResult, ObjectId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Engine-owned object handle; opaque to the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineObject(pub u64);

/// A JavaScript value
#[derive(Debug, Clone, PartialEq)]
pub enum Variant {
    Void,
    Null,
    Bool(bool),
    Int32(i32),
    Double(f64),
    String(String),
    Object(EngineObject),
}

impl Variant {
    pub fn type_name(&self) -> &'static str {
        match self {
            Variant::Void => "void",
            Variant::Null => "null",
            Variant::Bool(_) => "boolean",
            Variant::Int32(_) => "int32",
            Variant::Double(_) => "double",
            Variant::String(_) => "string",
            Variant::Object(_) => "object",
        }
    }
}

/// Scripting operations the bridge needs from the browser
///
/// Every method except [`ScriptEngine::window`] is only called on the main thread.
pub trait ScriptEngine: Send + Sync {
    /// The window object of a plugin instance; cheap and callable from any thread
    fn window(&self, instance: u32) -> BridgeResult<EngineObject>;

    fn get_property(&self, object: EngineObject, name: &str) -> BridgeResult<Variant>;

    fn set_property(&self, object: EngineObject, name: &str, value: Variant) -> BridgeResult<()>;

    fn get_slot(&self, object: EngineObject, index: i32) -> BridgeResult<Variant>;

    fn set_slot(&self, object: EngineObject, index: i32, value: Variant) -> BridgeResult<()>;

    fn invoke(&self, object: EngineObject, name: &str, args: &[Variant]) -> BridgeResult<Variant>;

    fn eval(&self, object: EngineObject, script: &str) -> BridgeResult<Variant>;

    fn to_string(&self, object: EngineObject) -> BridgeResult<String>;

    /// Wrap a Java object so script code can hold it
    fn wrap_java_object(&self, instance: u32, java: ObjectId) -> BridgeResult<EngineObject>;

    /// The Java object behind a wrapper made by [`ScriptEngine::wrap_java_object`]
    ///
    /// Callable from any thread.
    fn unwrap_java_object(&self, _object: EngineObject) -> Option<ObjectId> {
        None
    }

    /// The bridge no longer refers to `object`
    fn release(&self, _object: EngineObject) {}
}

/// Runs closures on the browser main thread
pub trait MainThreadDispatcher: Send + Sync {
    fn is_main_thread(&self) -> bool;

    /// Schedule `task` on the main thread; must not run it inline on another thread
    fn dispatch(&self, task: Box<dyn FnOnce() + Send>);
}

/// Result slot filled on the main thread and polled by the worker
struct ResultBox<T> {
    value: Mutex<Option<T>>,
    ready: AtomicBool,
}

/// Run `task` on the main thread and wait for its result
///
/// Runs inline when already on the main thread. Otherwise the calling worker sleeps in
/// `poll_interval` steps until the result is ready, `timeout` elapses, or `cancel` is set.
pub fn run_on_main<T, F>(
    dispatcher: &dyn MainThreadDispatcher,
    poll_interval: Duration,
    timeout: Duration,
    cancel: &AtomicBool,
    label: &str,
    task: F,
) -> BridgeResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    if dispatcher.is_main_thread() {
        return Ok(task());
    }

    let slot = Arc::new(ResultBox {
        value: Mutex::new(None),
        ready: AtomicBool::new(false),
    });
    let filled = Arc::clone(&slot);
    dispatcher.dispatch(Box::new(move || {
        *filled.value.lock() = Some(task());
        filled.ready.store(true, Ordering::Release);
    }));

    let started = Instant::now();
    while !slot.ready.load(Ordering::Acquire) {
        if cancel.load(Ordering::Acquire) {
            return Err(BridgeError::Transport(format!(
                "{} abandoned: session is shutting down",
                label
            )));
        }
        let waited = started.elapsed();
        if waited >= timeout {
            return Err(BridgeError::Timeout {
                command: label.to_string(),
                waited_ms: u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
            });
        }
        std::thread::sleep(poll_interval);
    }
    slot.value
        .lock()
        .take()
        .ok_or_else(|| BridgeError::Internal(format!("{} result taken twice", label)))
}

struct Entry {
    object: EngineObject,
    refcount: u32,
}

#[derive(Default)]
struct Handles {
    by_id: HashMap<u32, Entry>,
    by_object: HashMap<EngineObject, u32>,
    next_id: u32,
}

/// Stable, refcounted ids for engine objects handed to Java
///
/// Id 0 is reserved for null. The same engine object always maps to the same id while
/// it is registered.
#[derive(Default)]
pub struct ScriptObjectTable {
    handles: Mutex<Handles>,
}

impl ScriptObjectTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one more reference to `object` and return its id
    pub fn register(&self, object: EngineObject) -> u32 {
        let mut handles = self.handles.lock();
        if let Some(id) = handles.by_object.get(&object).copied() {
            if let Some(entry) = handles.by_id.get_mut(&id) {
                entry.refcount = entry.refcount.saturating_add(1);
            }
            return id;
        }
        let id = loop {
            handles.next_id = handles.next_id.wrapping_add(1);
            let candidate = handles.next_id;
            if candidate != 0 && !handles.by_id.contains_key(&candidate) {
                break candidate;
            }
        };
        handles.by_id.insert(
            id,
            Entry {
                object,
                refcount: 1,
            },
        );
        handles.by_object.insert(object, id);
        id
    }

    pub fn resolve(&self, id: u32) -> Option<EngineObject> {
        self.handles.lock().by_id.get(&id).map(|entry| entry.object)
    }

    /// Resolve `id`, failing with a script error if unknown
    pub fn require(&self, id: u32) -> BridgeResult<EngineObject> {
        self.resolve(id)
            .ok_or_else(|| BridgeError::Script(format!("unknown script object {}", id)))
    }

    /// Drop one reference; returns the object when its last reference went away
    pub fn release(&self, id: u32) -> Option<EngineObject> {
        let mut handles = self.handles.lock();
        let entry = handles.by_id.get_mut(&id)?;
        entry.refcount = entry.refcount.saturating_sub(1);
        if entry.refcount > 0 {
            return None;
        }
        let object = entry.object;
        handles.by_id.remove(&id);
        handles.by_object.remove(&object);
        Some(object)
    }

    pub fn refcount(&self, id: u32) -> u32 {
        self.handles
            .lock()
            .by_id
            .get(&id)
            .map_or(0, |entry| entry.refcount)
    }

    pub fn len(&self) -> usize {
        self.handles.lock().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget everything, returning the objects that were still registered
    pub fn clear(&self) -> Vec<EngineObject> {
        let mut handles = self.handles.lock();
        handles.by_object.clear();
        handles.by_id.drain().map(|(_, entry)| entry.object).collect()
    }
}
