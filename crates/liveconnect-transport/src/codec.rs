//! Token-level value codec
//!
//! Every value crossing the socket is one or more space-free ASCII tokens:
//! - booleans are `true`/`false`
//! - integral values are decimal
//! - floating point values use Rust's locale-independent shortest round-trip form
//! - objects are their decimal identifier, `0` for null
//! - a `char` is its low and high byte in decimal joined with `_` (`65_0` for `A`)
//! - UTF-8 strings are a byte count followed by one hex token per byte
//! - UTF-16 strings are a code unit count followed by one `low_high` token per unit

use crate::signature::JniType;
use jni::sys::{jbyte, jchar, jdouble, jfloat, jint, jlong, jshort};
use liveconnect_core::{BridgeError, ObjectId};
use thiserror::Error;

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("malformed {expected} token '{token}'")]
    MalformedToken {
        expected: &'static str,
        token: String,
    },

    #[error("payload truncated: expected {expected} tokens, found {found}")]
    Truncated { expected: usize, found: usize },

    #[error("invalid UTF-8 payload: {0}")]
    InvalidUtf8(String),

    #[error("invalid signature '{signature}': {reason}")]
    InvalidSignature { signature: String, reason: String },

    #[error("argument mismatch: {0}")]
    ArgumentMismatch(String),

    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

impl From<CodecError> for BridgeError {
    fn from(err: CodecError) -> Self {
        BridgeError::Protocol(err.to_string())
    }
}

/// A JNI value as carried on the wire
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JValue {
    Boolean(bool),
    Byte(jbyte),
    Char(jchar),
    Short(jshort),
    Int(jint),
    Long(jlong),
    Float(jfloat),
    Double(jdouble),
    Object(ObjectId),
    Void,
}

impl JValue {
    /// Whether this value may be passed where `ty` is expected
    pub fn matches(&self, ty: &JniType) -> bool {
        matches!(
            (self, ty),
            (JValue::Boolean(_), JniType::Boolean)
                | (JValue::Byte(_), JniType::Byte)
                | (JValue::Char(_), JniType::Char)
                | (JValue::Short(_), JniType::Short)
                | (JValue::Int(_), JniType::Int)
                | (JValue::Long(_), JniType::Long)
                | (JValue::Float(_), JniType::Float)
                | (JValue::Double(_), JniType::Double)
                | (JValue::Object(_), JniType::Object(_))
                | (JValue::Object(_), JniType::Array(_))
                | (JValue::Void, JniType::Void)
        )
    }

    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            JValue::Object(id) => Some(*id),
            _ => None,
        }
    }
}

/// Encode an object reference; null becomes `0`
pub fn encode_reference(id: Option<ObjectId>) -> String {
    id.unwrap_or(ObjectId::NULL).to_string()
}

/// Decode an object reference token
pub fn decode_reference(token: &str) -> Result<ObjectId, CodecError> {
    parse_int::<u32>(token, "reference").map(ObjectId::new)
}

/// Encode a char as `low_high` decimal bytes
pub fn encode_char(c: jchar) -> String {
    format!("{}_{}", c & 0xff, c >> 8)
}

/// Decode a `low_high` char token (a bare decimal code unit is also accepted)
pub fn decode_char(token: &str) -> Result<jchar, CodecError> {
    let malformed = || CodecError::MalformedToken {
        expected: "char",
        token: token.to_string(),
    };
    match token.split_once('_') {
        Some((low, high)) => {
            let low: u8 = low.parse().map_err(|_| malformed())?;
            let high: u8 = high.parse().map_err(|_| malformed())?;
            Ok(((high as jchar) << 8) | low as jchar)
        }
        None => token.parse().map_err(|_| malformed()),
    }
}

/// Encode a value as its wire token
pub fn encode_value(value: &JValue) -> String {
    match value {
        JValue::Boolean(b) => if *b { "true" } else { "false" }.to_string(),
        JValue::Byte(v) => v.to_string(),
        JValue::Char(c) => encode_char(*c),
        JValue::Short(v) => v.to_string(),
        JValue::Int(v) => v.to_string(),
        JValue::Long(v) => v.to_string(),
        JValue::Float(v) => encode_float(*v),
        JValue::Double(v) => encode_float(*v),
        JValue::Object(id) => id.to_string(),
        JValue::Void => String::new(),
    }
}

/// Infinities use Java's spelling so `Double.parseDouble` accepts them
fn encode_float<T: Into<f64> + ToString + Copy>(value: T) -> String {
    let wide: f64 = value.into();
    if wide.is_infinite() {
        if wide > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        value.to_string()
    }
}

/// Decode a single token as a value of type `ty`
pub fn decode_value(ty: &JniType, token: &str) -> Result<JValue, CodecError> {
    let value = match ty {
        JniType::Boolean => JValue::Boolean(decode_bool(token)?),
        JniType::Byte => JValue::Byte(parse_int(token, "byte")?),
        JniType::Char => JValue::Char(decode_char(token)?),
        JniType::Short => JValue::Short(parse_int(token, "short")?),
        JniType::Int => JValue::Int(parse_int(token, "int")?),
        JniType::Long => JValue::Long(parse_int(token, "long")?),
        JniType::Float => JValue::Float(parse_float(token, "float")?),
        JniType::Double => JValue::Double(parse_float(token, "double")?),
        JniType::Object(_) | JniType::Array(_) => JValue::Object(decode_reference(token)?),
        JniType::Void => JValue::Void,
    };
    Ok(value)
}

/// Decode `true`/`false` (the counterpart also sends `1`/`0`)
pub fn decode_bool(token: &str) -> Result<bool, CodecError> {
    match token {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(CodecError::MalformedToken {
            expected: "boolean",
            token: token.to_string(),
        }),
    }
}

/// Parse a decimal integer, or hex with a `0x` prefix
pub fn parse_int<T>(token: &str, expected: &'static str) -> Result<T, CodecError>
where
    T: std::str::FromStr + TryFrom<i128>,
{
    let malformed = || CodecError::MalformedToken {
        expected,
        token: token.to_string(),
    };
    let (negative, digits) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        let magnitude = i128::from_str_radix(hex, 16).map_err(|_| malformed())?;
        let signed = if negative { -magnitude } else { magnitude };
        return T::try_from(signed).map_err(|_| malformed());
    }
    token.parse::<T>().map_err(|_| malformed())
}

fn parse_float<T: std::str::FromStr>(token: &str, expected: &'static str) -> Result<T, CodecError> {
    token.parse::<T>().map_err(|_| CodecError::MalformedToken {
        expected,
        token: token.to_string(),
    })
}

/// Expand a string into the tokens `<byte count> <hex byte>...`
pub fn encode_utf8_string(text: &str) -> Vec<String> {
    let mut tokens = Vec::with_capacity(text.len() + 1);
    tokens.push(text.len().to_string());
    tokens.extend(text.as_bytes().iter().map(|byte| format!("{:x}", byte)));
    tokens
}

/// Rebuild a UTF-8 string from `length` hex byte tokens
pub fn decode_utf8_string<S: AsRef<str>>(length: usize, tokens: &[S]) -> Result<String, CodecError> {
    if tokens.len() < length {
        return Err(CodecError::Truncated {
            expected: length,
            found: tokens.len(),
        });
    }
    let bytes = tokens[..length]
        .iter()
        .map(|token| {
            let token = token.as_ref();
            u8::from_str_radix(token, 16).map_err(|_| CodecError::MalformedToken {
                expected: "hex byte",
                token: token.to_string(),
            })
        })
        .collect::<Result<Vec<u8>, _>>()?;
    String::from_utf8(bytes).map_err(|e| CodecError::InvalidUtf8(e.to_string()))
}

/// Decode a length-prefixed UTF-8 payload, returning the string and tokens consumed
pub fn decode_utf8_payload<S: AsRef<str>>(tokens: &[S]) -> Result<(String, usize), CodecError> {
    let (length, rest) = split_length(tokens)?;
    let text = decode_utf8_string(length, rest)?;
    Ok((text, length + 1))
}

/// A sequence of UTF-16 code units, not validated for surrogate pairing
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct WideString(Vec<jchar>);

impl WideString {
    pub fn from_units(units: Vec<jchar>) -> Self {
        WideString(units)
    }

    pub fn units(&self) -> &[jchar] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lossy conversion; unpaired surrogates become U+FFFD
    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(&self.0)
    }
}

impl From<&str> for WideString {
    fn from(text: &str) -> Self {
        WideString(text.encode_utf16().collect())
    }
}

/// Expand UTF-16 code units into the tokens `<unit count> <low_high>...`
pub fn encode_utf16_string(text: &WideString) -> Vec<String> {
    let mut tokens = Vec::with_capacity(text.len() + 1);
    tokens.push(text.len().to_string());
    tokens.extend(text.units().iter().map(|unit| encode_char(*unit)));
    tokens
}

/// Rebuild `length` UTF-16 code units from `low_high` tokens
pub fn decode_utf16_string<S: AsRef<str>>(
    length: usize,
    tokens: &[S],
) -> Result<WideString, CodecError> {
    if tokens.len() < length {
        return Err(CodecError::Truncated {
            expected: length,
            found: tokens.len(),
        });
    }
    tokens[..length]
        .iter()
        .map(|token| decode_char(token.as_ref()))
        .collect::<Result<Vec<_>, _>>()
        .map(WideString)
}

/// Decode a length-prefixed UTF-16 payload, returning the string and tokens consumed
pub fn decode_utf16_payload<S: AsRef<str>>(
    tokens: &[S],
) -> Result<(WideString, usize), CodecError> {
    let (length, rest) = split_length(tokens)?;
    let text = decode_utf16_string(length, rest)?;
    Ok((text, length + 1))
}

fn split_length<S: AsRef<str>>(tokens: &[S]) -> Result<(usize, &[S]), CodecError> {
    let (first, rest) = tokens.split_first().ok_or(CodecError::Truncated {
        expected: 1,
        found: 0,
    })?;
    let length = parse_int::<usize>(first.as_ref(), "length")?;
    Ok((length, rest))
}
