//! Message envelope
//!
//! ```text
//! ("context"|"instance") SP scopeId SP "reference" SP refId [SP "src" SP uri] SP command (SP arg)*
//! ```

use crate::codec::{CodecError, WideString, encode_utf8_string, encode_utf16_string, parse_int};
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

/// Reference id meaning "no reply expected"
pub const NO_REFERENCE: i32 = -1;

/// Bytes that may never appear raw inside a token
const TOKEN_UNSAFE: &AsciiSet = &CONTROLS.add(b' ').add(b'%');

/// Whether a message addresses a JNI context or a plugin instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Context,
    Instance,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Context => "context",
            Scope::Instance => "instance",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "context" => Some(Scope::Context),
            "instance" => Some(Scope::Instance),
            _ => None,
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the leading tokens of a message
pub fn encode_message_prefix(
    scope: Scope,
    scope_id: u32,
    reference: i32,
    source: Option<&str>,
) -> String {
    let mut prefix = format!("{} {} reference {}", scope, scope_id, reference);
    if let Some(source) = source {
        prefix.push_str(" src ");
        prefix.push_str(&utf8_percent_encode(source, TOKEN_UNSAFE).to_string());
    }
    prefix
}

/// One protocol message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub scope: Scope,
    pub scope_id: u32,
    /// Correlation id; [`NO_REFERENCE`] for fire-and-forget
    pub reference: i32,
    /// Document URI the request originated from (already decoded)
    pub source: Option<String>,
    pub command: String,
    pub args: Vec<String>,
}

impl Message {
    pub fn new(scope: Scope, scope_id: u32, reference: i32, command: impl Into<String>) -> Self {
        Self {
            scope,
            scope_id,
            reference,
            source: None,
            command: command.into(),
            args: Vec::new(),
        }
    }

    /// Message addressed to a plugin instance
    pub fn instance(scope_id: u32, reference: i32, command: impl Into<String>) -> Self {
        Self::new(Scope::Instance, scope_id, reference, command)
    }

    /// Message addressed to a JNI context
    pub fn context(scope_id: u32, reference: i32, command: impl Into<String>) -> Self {
        Self::new(Scope::Context, scope_id, reference, command)
    }

    /// Set the originating document URI
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Append one token; the caller guarantees it is space-free
    pub fn arg(mut self, token: impl ToString) -> Self {
        self.args.push(token.to_string());
        self
    }

    /// Append several tokens
    pub fn args<I, T>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToString,
    {
        self.args.extend(tokens.into_iter().map(|t| t.to_string()));
        self
    }

    /// Append a length-prefixed UTF-8 payload
    pub fn utf8_arg(self, text: &str) -> Self {
        self.args(encode_utf8_string(text))
    }

    /// Append a length-prefixed UTF-16 payload
    pub fn utf16_arg(self, text: &WideString) -> Self {
        self.args(encode_utf16_string(text))
    }

    /// Whether a correlated reply is expected
    pub fn expects_reply(&self) -> bool {
        self.reference != NO_REFERENCE
    }

    /// Argument at `index`, or a decode error naming the command
    pub fn arg_at(&self, index: usize) -> Result<&str, CodecError> {
        self.args.get(index).map(String::as_str).ok_or_else(|| {
            CodecError::InvalidMessage(format!(
                "{} is missing argument {}",
                self.command, index
            ))
        })
    }

    /// Parse one message body (without the NUL terminator)
    pub fn parse(text: &str) -> Result<Self, CodecError> {
        let mut tokens = text.split(' ').filter(|t| !t.is_empty());
        let invalid = |what: &str| CodecError::InvalidMessage(format!("{} in '{}'", what, text));

        let scope = tokens
            .next()
            .and_then(Scope::parse)
            .ok_or_else(|| invalid("missing scope"))?;
        let scope_id = parse_int::<u32>(
            tokens.next().ok_or_else(|| invalid("missing scope id"))?,
            "scope id",
        )?;
        if tokens.next() != Some("reference") {
            return Err(invalid("missing reference keyword"));
        }
        let reference = parse_int::<i32>(
            tokens.next().ok_or_else(|| invalid("missing reference id"))?,
            "reference id",
        )?;

        let mut next = tokens.next().ok_or_else(|| invalid("missing command"))?;
        let mut source = None;
        if next == "src" {
            let encoded = tokens.next().ok_or_else(|| invalid("missing src uri"))?;
            source = Some(percent_decode_str(encoded).decode_utf8_lossy().into_owned());
            next = tokens.next().ok_or_else(|| invalid("missing command"))?;
        }

        Ok(Self {
            scope,
            scope_id,
            reference,
            source,
            command: next.to_string(),
            args: tokens.map(str::to_string).collect(),
        })
    }

    /// Render to the wire form (without the NUL terminator)
    pub fn to_wire(&self) -> String {
        let mut out = encode_message_prefix(
            self.scope,
            self.scope_id,
            self.reference,
            self.source.as_deref(),
        );
        out.push(' ');
        out.push_str(&self.command);
        for arg in &self.args {
            out.push(' ');
            out.push_str(arg);
        }
        out
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_wire())
    }
}

impl std::str::FromStr for Message {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Message::parse(s)
    }
}
