//! JNI type descriptors
//!
//! Descriptors such as `(ILjava/lang/String;[I)V` decide how many argument tokens a call
//! carries and how its result token is decoded.

use crate::codec::{CodecError, JValue, encode_value};
use std::iter::Peekable;
use std::str::Chars;

/// A field type or method return type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JniType {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Void,
    /// Class type by internal name, e.g. `java/lang/String`
    Object(String),
    Array(Box<JniType>),
}

impl JniType {
    /// Parse a complete field descriptor
    pub fn parse(descriptor: &str) -> Result<Self, CodecError> {
        let mut chars = descriptor.chars().peekable();
        let ty = Self::parse_from(&mut chars, descriptor)?;
        match chars.next() {
            None => Ok(ty),
            Some(c) => Err(invalid(descriptor, format!("unexpected leftover '{}'", c))),
        }
    }

    fn parse_from(chars: &mut Peekable<Chars>, source: &str) -> Result<Self, CodecError> {
        let ty = match chars.next() {
            Some('Z') => JniType::Boolean,
            Some('B') => JniType::Byte,
            Some('C') => JniType::Char,
            Some('S') => JniType::Short,
            Some('I') => JniType::Int,
            Some('J') => JniType::Long,
            Some('F') => JniType::Float,
            Some('D') => JniType::Double,
            Some('V') => JniType::Void,
            Some('L') => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some(';') => break,
                        Some(c) if c.is_whitespace() || c.is_control() => {
                            return Err(invalid(source, "whitespace in class name"));
                        }
                        Some(c) => name.push(c),
                        None => return Err(invalid(source, "unterminated class name")),
                    }
                }
                if name.is_empty() {
                    return Err(invalid(source, "empty class name"));
                }
                JniType::Object(name)
            }
            Some('[') => {
                let element = Self::parse_from(chars, source)?;
                if element == JniType::Void {
                    return Err(invalid(source, "array of void"));
                }
                JniType::Array(Box::new(element))
            }
            Some(c) => return Err(invalid(source, format!("invalid type character '{}'", c))),
            None => return Err(invalid(source, "missing type character")),
        };
        Ok(ty)
    }

    /// Render back to descriptor form
    pub fn descriptor(&self) -> String {
        match self {
            JniType::Boolean => "Z".to_string(),
            JniType::Byte => "B".to_string(),
            JniType::Char => "C".to_string(),
            JniType::Short => "S".to_string(),
            JniType::Int => "I".to_string(),
            JniType::Long => "J".to_string(),
            JniType::Float => "F".to_string(),
            JniType::Double => "D".to_string(),
            JniType::Void => "V".to_string(),
            JniType::Object(name) => format!("L{};", name),
            JniType::Array(element) => format!("[{}", element.descriptor()),
        }
    }

    /// Objects and arrays travel as identifiers
    pub fn is_reference(&self) -> bool {
        matches!(self, JniType::Object(_) | JniType::Array(_))
    }

    /// Type name used by the counterpart's array constructors (`int`, `java.lang.String`)
    pub fn java_name(&self) -> String {
        match self {
            JniType::Boolean => "boolean".to_string(),
            JniType::Byte => "byte".to_string(),
            JniType::Char => "char".to_string(),
            JniType::Short => "short".to_string(),
            JniType::Int => "int".to_string(),
            JniType::Long => "long".to_string(),
            JniType::Float => "float".to_string(),
            JniType::Double => "double".to_string(),
            JniType::Void => "void".to_string(),
            JniType::Object(name) => name.replace('/', "."),
            JniType::Array(element) => format!("{}[]", element.java_name()),
        }
    }
}

impl std::fmt::Display for JniType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.descriptor())
    }
}

/// Parsed method descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    pub args: Vec<JniType>,
    pub ret: JniType,
}

impl MethodSignature {
    pub fn parse(descriptor: &str) -> Result<Self, CodecError> {
        let mut chars = descriptor.chars().peekable();
        if chars.next() != Some('(') {
            return Err(invalid(descriptor, "method descriptor must start with '('"));
        }
        let mut args = Vec::new();
        loop {
            match chars.peek() {
                Some(')') => {
                    chars.next();
                    break;
                }
                Some(_) => {
                    let arg = JniType::parse_from(&mut chars, descriptor)?;
                    if arg == JniType::Void {
                        return Err(invalid(descriptor, "void argument"));
                    }
                    args.push(arg);
                }
                None => return Err(invalid(descriptor, "unterminated argument list")),
            }
        }
        let ret = JniType::parse_from(&mut chars, descriptor)?;
        if let Some(c) = chars.next() {
            return Err(invalid(descriptor, format!("unexpected leftover '{}'", c)));
        }
        Ok(Self { args, ret })
    }

    pub fn descriptor(&self) -> String {
        let args: String = self.args.iter().map(JniType::descriptor).collect();
        format!("({}){}", args, self.ret.descriptor())
    }

    /// Encode `values` against the argument list, one token per argument
    pub fn encode_arguments(&self, values: &[JValue]) -> Result<Vec<String>, CodecError> {
        encode_arguments(&self.args, values)
    }
}

/// Encode values against declared argument types
pub fn encode_arguments(types: &[JniType], values: &[JValue]) -> Result<Vec<String>, CodecError> {
    if types.len() != values.len() {
        return Err(CodecError::ArgumentMismatch(format!(
            "expected {} arguments, got {}",
            types.len(),
            values.len()
        )));
    }
    types
        .iter()
        .zip(values)
        .enumerate()
        .map(|(index, (ty, value))| {
            if value.matches(ty) {
                Ok(encode_value(value))
            } else {
                Err(CodecError::ArgumentMismatch(format!(
                    "argument {} should be {}, got {:?}",
                    index, ty, value
                )))
            }
        })
        .collect()
}

fn invalid(signature: &str, reason: impl Into<String>) -> CodecError {
    CodecError::InvalidSignature {
        signature: signature.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
#[path = "signature/signature_tests.rs"]
mod signature_tests;
