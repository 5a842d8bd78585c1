//! Wire format for the Joint Editors Protocol: a declarative structural
//! serializer, a streaming self-delimited codec, and the closed message
//! schema exchanged between a frontend (editor plugin) and a backend
//! (language-specific analysis process).
//!
//! This crate has no notion of sockets, processes, or configuration — it
//! only knows how to turn a [`schema::Message`] into bytes and back. The
//! connection lifecycle lives in `jep-host`; the listening server lives in
//! `jepd`.

pub mod codec;
pub mod error;
pub mod messages;
pub mod schema;
pub mod serializer;
pub mod value;

pub use codec::{encode, CodecError, Decoder};
pub use error::DecodeError;
pub use messages::TOKEN_FIELD;
pub use schema::{Message, MessageListener, MESSAGE_KEY};
pub use serializer::{Field, FieldMap, Record};
pub use value::{FromValue, ToValue, Value};
