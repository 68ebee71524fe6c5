//! Command tables for both directions
//!
//! Command names are matched once, at the edge, into these enums; everything past the
//! bus dispatches on the variant.

/// How the counterpart answers an outbound command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyShape {
    /// A single object or member identifier
    Identifier,
    /// A length-prefixed UTF-8 payload
    Utf8,
    /// A length-prefixed UTF-16 payload
    Utf16,
    /// A single primitive token, decoded by the caller against its JNI type
    Literal,
    /// `literalreturn <token>` for primitives, otherwise an identifier
    CallResult,
    /// No payload
    Ack,
}

macro_rules! java_commands {
    ($($variant:ident => $shape:ident),+ $(,)?) => {
        /// Requests the bridge sends to the Java side
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum JavaCommand {
            $($variant),+
        }

        impl JavaCommand {
            /// Every outbound command, in table order
            pub const ALL: &'static [JavaCommand] = &[$(JavaCommand::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(JavaCommand::$variant => stringify!($variant)),+
                }
            }

            pub fn reply_shape(&self) -> ReplyShape {
                match self {
                    $(JavaCommand::$variant => ReplyShape::$shape),+
                }
            }

            pub fn parse(name: &str) -> Option<Self> {
                match name {
                    $(stringify!($variant) => Some(JavaCommand::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

java_commands! {
    FindClass => Identifier,
    GetSuperclass => Identifier,
    GetObjectClass => Identifier,
    GetClassName => Utf8,
    IsInstanceOf => Literal,
    IsAssignableFrom => Literal,
    GetMethodID => Identifier,
    GetStaticMethodID => Identifier,
    GetFieldID => Identifier,
    GetStaticFieldID => Identifier,
    GetField => Literal,
    GetStaticField => Literal,
    SetField => Ack,
    SetStaticField => Ack,
    CallMethod => CallResult,
    CallStaticMethod => CallResult,
    NewObject => Identifier,
    NewString => Identifier,
    NewStringUTF => Identifier,
    GetStringLength => Literal,
    GetStringUTFLength => Literal,
    GetStringChars => Utf16,
    GetStringUTFChars => Utf8,
    GetToStringValue => Utf8,
    NewArray => Identifier,
    NewObjectArray => Identifier,
    GetArrayLength => Literal,
    GetObjectArrayElement => Identifier,
    SetObjectArrayElement => Ack,
    DeleteLocalRef => Ack,
    DeleteGlobalRef => Ack,
}

impl std::fmt::Display for JavaCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requests the Java side sends to the browser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginCommand {
    GetWindow,
    GetMember,
    SetMember,
    ToString,
    Call,
    GetSlot,
    SetSlot,
    Eval,
    Finalize,
}

impl PluginCommand {
    pub const ALL: &'static [PluginCommand] = &[
        PluginCommand::GetWindow,
        PluginCommand::GetMember,
        PluginCommand::SetMember,
        PluginCommand::ToString,
        PluginCommand::Call,
        PluginCommand::GetSlot,
        PluginCommand::SetSlot,
        PluginCommand::Eval,
        PluginCommand::Finalize,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == name)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PluginCommand::GetWindow => "GetWindow",
            PluginCommand::GetMember => "GetMember",
            PluginCommand::SetMember => "SetMember",
            PluginCommand::ToString => "ToString",
            PluginCommand::Call => "Call",
            PluginCommand::GetSlot => "GetSlot",
            PluginCommand::SetSlot => "SetSlot",
            PluginCommand::Eval => "Eval",
            PluginCommand::Finalize => "Finalize",
        }
    }

    /// Command token of the reply, e.g. `JavaScriptGetMember`
    pub fn reply_command(&self) -> String {
        format!("JavaScript{}", self.as_str())
    }

    /// Handled on the delivering thread instead of the queue
    pub fn is_inline(&self) -> bool {
        matches!(self, PluginCommand::GetWindow)
    }

    /// Mutates script state; runs exclusively of every other queued operation
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            PluginCommand::SetMember
                | PluginCommand::Call
                | PluginCommand::Eval
                | PluginCommand::SetSlot
                | PluginCommand::Finalize
        )
    }
}

impl std::fmt::Display for PluginCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Command token of a failure reply in either direction
pub const ERROR_COMMAND: &str = "Error";

/// Marker preceding a primitive `CallMethod` result
pub const LITERAL_RETURN: &str = "literalreturn";
