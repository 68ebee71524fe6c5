//! Conversions between script values and Java objects
//!
//! Script to Java is a closed dispatch on the value's type:
//!
//! | script value | Java object |
//! |--------------|-------------|
//! | void, null   | empty `java.lang.String` |
//! | boolean      | `java.lang.Boolean` |
//! | int32        | `java.lang.Integer` |
//! | double       | `java.lang.Double` |
//! | string       | `java.lang.String` |
//! | object       | `netscape.javascript.JSObject` holding a handle table id |
//!
//! Java to script dispatches on the object's class name.

use crate::proxy_env::ProxyEnvironment;
use crate::scripting::{ScriptEngine, ScriptObjectTable, Variant};
use liveconnect_core::{BridgeError, BridgeResult, ObjectId};
use liveconnect_transport::JValue;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Java class wrapping script objects
pub const JS_OBJECT_CLASS: &str = "netscape/javascript/JSObject";

/// A constructor used to box a script value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct BoxClass {
    class: &'static str,
    signature: &'static str,
}

const BOOLEAN: BoxClass = BoxClass {
    class: "java/lang/Boolean",
    signature: "(Z)V",
};
const INTEGER: BoxClass = BoxClass {
    class: "java/lang/Integer",
    signature: "(I)V",
};
const DOUBLE: BoxClass = BoxClass {
    class: "java/lang/Double",
    signature: "(D)V",
};
const JS_OBJECT: BoxClass = BoxClass {
    class: JS_OBJECT_CLASS,
    signature: "(J)V",
};

#[derive(Debug, Clone, Copy)]
struct Constructor {
    class: ObjectId,
    method: ObjectId,
}

/// Converts values for one session
///
/// Class and constructor ids are looked up once and cached for the session.
pub struct Marshaller {
    env: Arc<ProxyEnvironment>,
    engine: Arc<dyn ScriptEngine>,
    objects: Arc<ScriptObjectTable>,
    constructors: Mutex<HashMap<BoxClass, Constructor>>,
    internal_reference: Mutex<Option<ObjectId>>,
}

impl Marshaller {
    pub fn new(
        env: Arc<ProxyEnvironment>,
        engine: Arc<dyn ScriptEngine>,
        objects: Arc<ScriptObjectTable>,
    ) -> Self {
        Self {
            env,
            engine,
            objects,
            constructors: Mutex::new(HashMap::new()),
            internal_reference: Mutex::new(None),
        }
    }

    pub fn env(&self) -> &Arc<ProxyEnvironment> {
        &self.env
    }

    pub fn engine(&self) -> &Arc<dyn ScriptEngine> {
        &self.engine
    }

    pub fn objects(&self) -> &Arc<ScriptObjectTable> {
        &self.objects
    }

    /// Store a script value in a new Java object and return its id
    pub fn variant_to_java(&self, value: &Variant) -> BridgeResult<ObjectId> {
        match value {
            Variant::Void | Variant::Null => self.env.new_string_utf(""),
            Variant::Bool(b) => self.construct(BOOLEAN, JValue::Boolean(*b)),
            Variant::Int32(i) => self.construct(INTEGER, JValue::Int(*i)),
            Variant::Double(d) => self.construct(DOUBLE, JValue::Double(*d)),
            Variant::String(s) => self.env.new_string_utf(s),
            Variant::Object(object) => {
                if let Some(java) = self.engine.unwrap_java_object(*object) {
                    return Ok(self.env.new_local_ref(java));
                }
                let handle = self.objects.register(*object);
                self.construct(JS_OBJECT, JValue::Long(i64::from(handle)))
            }
        }
    }

    /// Convert the Java object `java` into a script value for `instance`
    pub fn java_to_variant(&self, instance: u32, java: ObjectId) -> BridgeResult<Variant> {
        if java.is_null() {
            return Ok(Variant::Null);
        }
        let class = self.env.get_object_class(java)?;
        let name = self.env.get_class_name(class);
        self.env.delete_local_ref(class)?;
        let name = name?;
        tracing::trace!(%java, class = %name, "converting java value");

        let value = match name.as_str() {
            "java.lang.String" => Variant::String(self.env.get_string_utf_chars(java)?),
            "java.lang.Character" => Variant::String(self.env.get_to_string_value(java)?),
            "java.lang.Boolean" => {
                let text = self.env.get_to_string_value(java)?;
                Variant::Bool(parse_number::<bool>(&text, &name)?)
            }
            "java.lang.Byte" | "java.lang.Short" | "java.lang.Integer" => {
                let text = self.env.get_to_string_value(java)?;
                Variant::Int32(parse_number::<i32>(&text, &name)?)
            }
            "java.lang.Long" | "java.lang.Float" | "java.lang.Double" => {
                let text = self.env.get_to_string_value(java)?;
                Variant::Double(parse_number::<f64>(&text, &name)?)
            }
            "netscape.javascript.JSObject" => {
                let handle = self.internal_reference_of(java)?;
                Variant::Object(self.objects.require(handle)?)
            }
            _ => {
                // The wrapper keeps its own reference alive past the caller's local one.
                let held = self.env.new_global_ref(java);
                match self.engine.wrap_java_object(instance, held) {
                    Ok(wrapper) => Variant::Object(wrapper),
                    Err(e) => {
                        self.env.delete_global_ref(held)?;
                        return Err(e);
                    }
                }
            }
        };
        Ok(value)
    }

    fn construct(&self, boxed: BoxClass, value: JValue) -> BridgeResult<ObjectId> {
        let constructor = self.constructor(boxed)?;
        self.env
            .new_object(constructor.class, constructor.method, &[value])
    }

    fn constructor(&self, boxed: BoxClass) -> BridgeResult<Constructor> {
        if let Some(found) = self.constructors.lock().get(&boxed).copied() {
            return Ok(found);
        }
        let class = self.env.find_class(boxed.class)?;
        let method = self.env.get_method_id(class, "<init>", boxed.signature)?;
        let constructor = Constructor { class, method };
        self.constructors.lock().insert(boxed, constructor);
        Ok(constructor)
    }

    /// Handle table id stored in a `JSObject`
    fn internal_reference_of(&self, js_object: ObjectId) -> BridgeResult<u32> {
        let cached = *self.internal_reference.lock();
        let method = match cached {
            Some(method) => method,
            None => {
                let class = self.constructor(JS_OBJECT)?.class;
                let method = self
                    .env
                    .get_method_id(class, "getInternalReference", "()J")?;
                *self.internal_reference.lock() = Some(method);
                method
            }
        };
        match self.env.call_method(js_object, method, &[])? {
            JValue::Long(raw) => u32::try_from(raw).map_err(|_| {
                BridgeError::Protocol(format!("JSObject reference {} out of range", raw))
            }),
            other => Err(BridgeError::Protocol(format!(
                "getInternalReference returned {:?}",
                other
            ))),
        }
    }
}

fn parse_number<T: std::str::FromStr>(text: &str, class: &str) -> BridgeResult<T> {
    text.trim()
        .parse::<T>()
        .map_err(|_| BridgeError::Protocol(format!("'{}' is not a valid {}", text, class)))
}
