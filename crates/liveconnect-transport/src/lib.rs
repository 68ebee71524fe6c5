//! liveconnect-transport - Wire codec and framed channel
//!
//! This crate provides:
//! - token codecs for values, chars and length-prefixed strings ([`codec`])
//! - JNI descriptor parsing ([`JniType`], [`MethodSignature`])
//! - the [`Message`] envelope shared by both directions
//! - the NUL-framed [`TransportChannel`] over a loopback socket

pub mod codec;
mod channel;
mod message;
mod signature;

pub use channel::{FrameReader, FrameWriter, TransportChannel, TransportError, TransportListener};
pub use codec::{CodecError, JValue, WideString};
pub use message::{Message, NO_REFERENCE, Scope, encode_message_prefix};
pub use signature::{JniType, MethodSignature, encode_arguments};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        CodecError, JValue, JniType, Message, MethodSignature, Scope, TransportChannel,
        TransportError, WideString,
    };
}
