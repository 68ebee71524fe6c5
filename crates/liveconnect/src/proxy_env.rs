//! JNI call surface over the wire
//!
//! Each implemented entry point becomes one Java-bound request: prefix, receiver and
//! member ids, then the arguments encoded by walking the member's signature. Entry
//! points the bridge cannot support fail with [`BridgeError::NotImplemented`] without
//! touching the transport.

use crate::command::JavaCommand;
use crate::java_request::{CallResult, JavaRequestProcessor, Reply, RequestContext};
use jni::sys::{JNI_VERSION_1_6, jint, jsize};
use liveconnect_core::{BridgeError, BridgeResult, ObjectId, ReferenceTable};
use liveconnect_transport::codec::{decode_value, encode_utf8_string, encode_utf16_string};
use liveconnect_transport::{JValue, JniType, Message, MethodSignature, NO_REFERENCE, WideString};
use parking_lot::Mutex;
use std::sync::Arc;

/// Proxy for a remote JNI environment
pub struct ProxyEnvironment {
    requests: Arc<RequestContext>,
    references: Arc<ReferenceTable>,
    context_id: u32,
    source: Option<String>,
    pending_exception: Mutex<Option<BridgeError>>,
}

impl ProxyEnvironment {
    pub fn new(
        requests: Arc<RequestContext>,
        references: Arc<ReferenceTable>,
        context_id: u32,
    ) -> Self {
        Self {
            requests,
            references,
            context_id,
            source: None,
            pending_exception: Mutex::new(None),
        }
    }

    /// Tag every request with the originating document URI
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn context_id(&self) -> u32 {
        self.context_id
    }

    pub fn references(&self) -> &Arc<ReferenceTable> {
        &self.references
    }

    pub fn get_version(&self) -> jint {
        JNI_VERSION_1_6
    }

    // Classes

    pub fn find_class(&self, name: &str) -> BridgeResult<ObjectId> {
        check_token("class name", name)?;
        self.identifier(JavaCommand::FindClass, vec![name.to_string()])
    }

    pub fn get_superclass(&self, class: ObjectId) -> BridgeResult<ObjectId> {
        self.identifier(JavaCommand::GetSuperclass, vec![class.to_string()])
    }

    pub fn get_object_class(&self, object: ObjectId) -> BridgeResult<ObjectId> {
        self.identifier(JavaCommand::GetObjectClass, vec![object.to_string()])
    }

    /// Fully qualified name of `class`, e.g. `java.lang.Integer`
    pub fn get_class_name(&self, class: ObjectId) -> BridgeResult<String> {
        self.text(JavaCommand::GetClassName, vec![class.to_string()])
    }

    pub fn is_instance_of(&self, object: ObjectId, class: ObjectId) -> BridgeResult<bool> {
        let token = self.literal(
            JavaCommand::IsInstanceOf,
            vec![object.to_string(), class.to_string()],
        )?;
        decode_bool_literal(&token)
    }

    pub fn is_assignable_from(&self, sub: ObjectId, sup: ObjectId) -> BridgeResult<bool> {
        let token = self.literal(
            JavaCommand::IsAssignableFrom,
            vec![sub.to_string(), sup.to_string()],
        )?;
        decode_bool_literal(&token)
    }

    // Member ids

    pub fn get_method_id(
        &self,
        class: ObjectId,
        name: &str,
        signature: &str,
    ) -> BridgeResult<ObjectId> {
        self.method_id(JavaCommand::GetMethodID, class, name, signature)
    }

    pub fn get_static_method_id(
        &self,
        class: ObjectId,
        name: &str,
        signature: &str,
    ) -> BridgeResult<ObjectId> {
        self.method_id(JavaCommand::GetStaticMethodID, class, name, signature)
    }

    pub fn get_field_id(
        &self,
        class: ObjectId,
        name: &str,
        signature: &str,
    ) -> BridgeResult<ObjectId> {
        self.field_id(JavaCommand::GetFieldID, class, name, signature)
    }

    pub fn get_static_field_id(
        &self,
        class: ObjectId,
        name: &str,
        signature: &str,
    ) -> BridgeResult<ObjectId> {
        self.field_id(JavaCommand::GetStaticFieldID, class, name, signature)
    }

    fn method_id(
        &self,
        command: JavaCommand,
        class: ObjectId,
        name: &str,
        signature: &str,
    ) -> BridgeResult<ObjectId> {
        check_token("method name", name)?;
        MethodSignature::parse(signature)?;
        self.member_id(command, class, name, signature)
    }

    fn field_id(
        &self,
        command: JavaCommand,
        class: ObjectId,
        name: &str,
        signature: &str,
    ) -> BridgeResult<ObjectId> {
        check_token("field name", name)?;
        if JniType::parse(signature)? == JniType::Void {
            return Err(BridgeError::Protocol(format!(
                "field descriptor '{}' can not be void",
                signature
            )));
        }
        self.member_id(command, class, name, signature)
    }

    fn member_id(
        &self,
        command: JavaCommand,
        class: ObjectId,
        name: &str,
        signature: &str,
    ) -> BridgeResult<ObjectId> {
        let reply = self.request(
            command,
            vec![class.to_string(), name.to_string(), signature.to_string()],
        )?;
        match reply {
            Reply::Identifier(id) => Ok(self.references.acquire_typed(id, signature)),
            other => Err(unexpected(command, &other)),
        }
    }

    // Fields

    pub fn get_field(&self, object: ObjectId, field: ObjectId) -> BridgeResult<JValue> {
        self.read_field(JavaCommand::GetField, object, field)
    }

    pub fn get_static_field(&self, class: ObjectId, field: ObjectId) -> BridgeResult<JValue> {
        self.read_field(JavaCommand::GetStaticField, class, field)
    }

    pub fn set_field(&self, object: ObjectId, field: ObjectId, value: JValue) -> BridgeResult<()> {
        self.write_field(JavaCommand::SetField, object, field, value)
    }

    pub fn set_static_field(
        &self,
        class: ObjectId,
        field: ObjectId,
        value: JValue,
    ) -> BridgeResult<()> {
        self.write_field(JavaCommand::SetStaticField, class, field, value)
    }

    fn read_field(
        &self,
        command: JavaCommand,
        target: ObjectId,
        field: ObjectId,
    ) -> BridgeResult<JValue> {
        let ty = self.field_type(field)?;
        let token = self.literal(command, vec![target.to_string(), field.to_string()])?;
        self.decode_result(&ty, &token)
    }

    fn write_field(
        &self,
        command: JavaCommand,
        target: ObjectId,
        field: ObjectId,
        value: JValue,
    ) -> BridgeResult<()> {
        let ty = self.field_type(field)?;
        let mut args = vec![target.to_string(), field.to_string()];
        args.extend(liveconnect_transport::encode_arguments(
            std::slice::from_ref(&ty),
            std::slice::from_ref(&value),
        )?);
        self.ack(command, args)
    }

    // Calls

    pub fn call_method(
        &self,
        object: ObjectId,
        method: ObjectId,
        args: &[JValue],
    ) -> BridgeResult<JValue> {
        self.invoke(JavaCommand::CallMethod, object, method, args)
    }

    pub fn call_static_method(
        &self,
        class: ObjectId,
        method: ObjectId,
        args: &[JValue],
    ) -> BridgeResult<JValue> {
        self.invoke(JavaCommand::CallStaticMethod, class, method, args)
    }

    pub fn new_object(
        &self,
        class: ObjectId,
        constructor: ObjectId,
        args: &[JValue],
    ) -> BridgeResult<ObjectId> {
        let signature = self.method_signature(constructor)?;
        let mut tokens = vec![class.to_string(), constructor.to_string()];
        tokens.extend(signature.encode_arguments(args)?);
        self.identifier(JavaCommand::NewObject, tokens)
    }

    fn invoke(
        &self,
        command: JavaCommand,
        target: ObjectId,
        method: ObjectId,
        args: &[JValue],
    ) -> BridgeResult<JValue> {
        let signature = self.method_signature(method)?;
        let mut tokens = vec![target.to_string(), method.to_string()];
        tokens.extend(signature.encode_arguments(args)?);

        let result = match self.request(command, tokens)? {
            Reply::Call(result) => result,
            other => return Err(unexpected(command, &other)),
        };
        match (result, &signature.ret) {
            (_, JniType::Void) => Ok(JValue::Void),
            (CallResult::Literal(token), ty) => self.decode_result(ty, &token),
            (CallResult::Object(id), ty) if ty.is_reference() => {
                Ok(JValue::Object(self.references.acquire(id)))
            }
            (CallResult::Object(id), ty) => Err(BridgeError::Protocol(format!(
                "{} returned object {} for primitive return type {}",
                command, id, ty
            ))),
        }
    }

    // Strings

    pub fn new_string(&self, text: &WideString) -> BridgeResult<ObjectId> {
        self.identifier(JavaCommand::NewString, encode_utf16_string(text))
    }

    pub fn new_string_utf(&self, text: &str) -> BridgeResult<ObjectId> {
        self.identifier(JavaCommand::NewStringUTF, encode_utf8_string(text))
    }

    pub fn get_string_length(&self, string: ObjectId) -> BridgeResult<jsize> {
        self.size(JavaCommand::GetStringLength, vec![string.to_string()])
    }

    pub fn get_string_utf_length(&self, string: ObjectId) -> BridgeResult<jsize> {
        self.size(JavaCommand::GetStringUTFLength, vec![string.to_string()])
    }

    pub fn get_string_chars(&self, string: ObjectId) -> BridgeResult<WideString> {
        match self.request(JavaCommand::GetStringChars, vec![string.to_string()])? {
            Reply::Wide(text) => Ok(text),
            other => Err(unexpected(JavaCommand::GetStringChars, &other)),
        }
    }

    pub fn get_string_utf_chars(&self, string: ObjectId) -> BridgeResult<String> {
        self.text(JavaCommand::GetStringUTFChars, vec![string.to_string()])
    }

    /// `toString()` of any Java object
    pub fn get_to_string_value(&self, object: ObjectId) -> BridgeResult<String> {
        self.text(JavaCommand::GetToStringValue, vec![object.to_string()])
    }

    // Arrays

    pub fn new_array(&self, element: &JniType, length: jsize) -> BridgeResult<ObjectId> {
        check_length(length)?;
        let element_name = element.java_name();
        check_token("array element type", &element_name)?;
        self.identifier(
            JavaCommand::NewArray,
            vec![element_name, length.to_string()],
        )
    }

    pub fn new_object_array(
        &self,
        length: jsize,
        class: ObjectId,
        initial: ObjectId,
    ) -> BridgeResult<ObjectId> {
        check_length(length)?;
        self.identifier(
            JavaCommand::NewObjectArray,
            vec![length.to_string(), class.to_string(), initial.to_string()],
        )
    }

    pub fn get_array_length(&self, array: ObjectId) -> BridgeResult<jsize> {
        self.size(JavaCommand::GetArrayLength, vec![array.to_string()])
    }

    pub fn get_object_array_element(
        &self,
        array: ObjectId,
        index: jsize,
    ) -> BridgeResult<ObjectId> {
        self.identifier(
            JavaCommand::GetObjectArrayElement,
            vec![array.to_string(), index.to_string()],
        )
    }

    pub fn set_object_array_element(
        &self,
        array: ObjectId,
        index: jsize,
        value: ObjectId,
    ) -> BridgeResult<()> {
        self.ack(
            JavaCommand::SetObjectArrayElement,
            vec![array.to_string(), index.to_string(), value.to_string()],
        )
    }

    // References

    pub fn new_global_ref(&self, object: ObjectId) -> ObjectId {
        self.references.acquire(object)
    }

    pub fn new_local_ref(&self, object: ObjectId) -> ObjectId {
        self.references.acquire(object)
    }

    pub fn delete_local_ref(&self, object: ObjectId) -> BridgeResult<()> {
        self.release_reference(JavaCommand::DeleteLocalRef, object)
    }

    pub fn delete_global_ref(&self, object: ObjectId) -> BridgeResult<()> {
        self.release_reference(JavaCommand::DeleteGlobalRef, object)
    }

    /// Drop one local reference; the counterpart hears about it once the last one goes
    fn release_reference(&self, command: JavaCommand, object: ObjectId) -> BridgeResult<()> {
        if object.is_null() || !self.references.release(object) {
            return Ok(());
        }
        let message = Message::context(self.context_id, NO_REFERENCE, command.as_str()).arg(object);
        tracing::trace!(wire = %message, "releasing reference");
        self.requests.sink.send(&message)
    }

    // Exceptions

    pub fn exception_check(&self) -> bool {
        self.pending_exception.lock().is_some()
    }

    pub fn exception_occurred(&self) -> Option<BridgeError> {
        self.pending_exception.lock().clone()
    }

    pub fn exception_clear(&self) {
        self.pending_exception.lock().take();
    }

    // Unsupported entry points

    pub fn throw(&self, _throwable: ObjectId) -> BridgeResult<()> {
        Err(BridgeError::not_implemented("Throw"))
    }

    pub fn throw_new(&self, _class: ObjectId, _message: &str) -> BridgeResult<()> {
        Err(BridgeError::not_implemented("ThrowNew"))
    }

    pub fn define_class(
        &self,
        _name: &str,
        _loader: ObjectId,
        _bytes: &[u8],
    ) -> BridgeResult<ObjectId> {
        Err(BridgeError::not_implemented("DefineClass"))
    }

    pub fn get_array_elements(&self, _array: ObjectId) -> BridgeResult<Vec<JValue>> {
        Err(BridgeError::not_implemented("GetArrayElements"))
    }

    pub fn release_array_elements(
        &self,
        _array: ObjectId,
        _elements: &[JValue],
    ) -> BridgeResult<()> {
        Err(BridgeError::not_implemented("ReleaseArrayElements"))
    }

    pub fn register_natives(&self, _class: ObjectId) -> BridgeResult<()> {
        Err(BridgeError::not_implemented("RegisterNatives"))
    }

    pub fn unregister_natives(&self, _class: ObjectId) -> BridgeResult<()> {
        Err(BridgeError::not_implemented("UnregisterNatives"))
    }

    pub fn monitor_enter(&self, _object: ObjectId) -> BridgeResult<()> {
        Err(BridgeError::not_implemented("MonitorEnter"))
    }

    pub fn monitor_exit(&self, _object: ObjectId) -> BridgeResult<()> {
        Err(BridgeError::not_implemented("MonitorExit"))
    }

    pub fn get_java_vm(&self) -> BridgeResult<()> {
        Err(BridgeError::not_implemented("GetJavaVM"))
    }

    // Plumbing

    fn request(&self, command: JavaCommand, args: Vec<String>) -> BridgeResult<Reply> {
        let processor = JavaRequestProcessor::new(Arc::clone(&self.requests));
        let result = processor.call(self.context_id, self.source.as_deref(), command, args);
        if let Err(BridgeError::Remote(_)) = &result {
            *self.pending_exception.lock() = result.as_ref().err().cloned();
        }
        result
    }

    fn identifier(&self, command: JavaCommand, args: Vec<String>) -> BridgeResult<ObjectId> {
        match self.request(command, args)? {
            Reply::Identifier(id) => Ok(self.references.acquire(id)),
            other => Err(unexpected(command, &other)),
        }
    }

    fn text(&self, command: JavaCommand, args: Vec<String>) -> BridgeResult<String> {
        match self.request(command, args)? {
            Reply::Text(text) => Ok(text),
            other => Err(unexpected(command, &other)),
        }
    }

    fn literal(&self, command: JavaCommand, args: Vec<String>) -> BridgeResult<String> {
        match self.request(command, args)? {
            Reply::Literal(token) => Ok(token),
            other => Err(unexpected(command, &other)),
        }
    }

    fn size(&self, command: JavaCommand, args: Vec<String>) -> BridgeResult<jsize> {
        let token = self.literal(command, args)?;
        Ok(liveconnect_transport::codec::parse_int::<jsize>(&token, "size")?)
    }

    fn ack(&self, command: JavaCommand, args: Vec<String>) -> BridgeResult<()> {
        match self.request(command, args)? {
            Reply::Ack => Ok(()),
            other => Err(unexpected(command, &other)),
        }
    }

    fn decode_result(&self, ty: &JniType, token: &str) -> BridgeResult<JValue> {
        match decode_value(ty, token)? {
            JValue::Object(id) => Ok(JValue::Object(self.references.acquire(id))),
            value => Ok(value),
        }
    }

    fn member_signature(&self, member: ObjectId) -> BridgeResult<Arc<str>> {
        self.references
            .signature(member)
            .ok_or_else(|| BridgeError::Protocol(format!("{} is not a known member id", member)))
    }

    fn method_signature(&self, method: ObjectId) -> BridgeResult<MethodSignature> {
        Ok(MethodSignature::parse(&self.member_signature(method)?)?)
    }

    fn field_type(&self, field: ObjectId) -> BridgeResult<JniType> {
        Ok(JniType::parse(&self.member_signature(field)?)?)
    }
}

fn unexpected(command: JavaCommand, reply: &Reply) -> BridgeError {
    BridgeError::Protocol(format!("unexpected reply to {}: {:?}", command, reply))
}

fn decode_bool_literal(token: &str) -> BridgeResult<bool> {
    Ok(liveconnect_transport::codec::decode_bool(token)?)
}

fn check_token(what: &str, value: &str) -> BridgeResult<()> {
    if value.is_empty() || value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(BridgeError::Protocol(format!("invalid {} '{}'", what, value)));
    }
    Ok(())
}

fn check_length(length: jsize) -> BridgeResult<()> {
    if length < 0 {
        return Err(BridgeError::Protocol(format!("negative array length {}", length)));
    }
    Ok(())
}
