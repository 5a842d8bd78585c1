//! The closed `Message` sum type and its visitor-dispatch trait (spec §4.C).
//!
//! Mirrors the Python originals' `msg.invoke(listener, context)` pattern
//! (`jep.protocol`/`jep_py.backend.FrontendListener`/
//! `jep_py.frontend.BackendListener`): rather than a frontend or backend
//! matching on a message's dynamic type, a decoded [`Message`] is handed to
//! a listener and dispatches itself to the one method that applies, with
//! every other method left at its no-op default.

use crate::error::DecodeError;
use crate::messages::{
    BackendAlive, CompletionInvocation, CompletionRequest, CompletionResponse, ContentSync,
    OutOfSync, ProblemUpdate, Shutdown, StaticSyntaxList, StaticSyntaxRequest,
};
use crate::serializer::{FieldMap, Record};
use crate::value::Value;

/// Reserved key every encoded message carries, naming its variant (spec §3).
pub const MESSAGE_KEY: &str = "_message";

/// The closed set of messages exchanged between a frontend and a backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// frontend → backend: request a graceful shutdown.
    Shutdown(Shutdown),
    /// backend → frontend: periodic liveness heartbeat.
    BackendAlive(BackendAlive),
    /// frontend → backend: range-replace edit of an editor buffer.
    ContentSync(ContentSync),
    /// backend → frontend: a previously sent `ContentSync` could not be applied.
    OutOfSync(OutOfSync),
    /// frontend → backend: request completion options.
    CompletionRequest(CompletionRequest),
    /// backend → frontend: completion options for a prior request.
    CompletionResponse(CompletionResponse),
    /// frontend → backend: an extension-defined action was invoked.
    CompletionInvocation(CompletionInvocation),
    /// backend → frontend: updated diagnostics for one or more files.
    ProblemUpdate(ProblemUpdate),
    /// frontend → backend: request static syntax definitions.
    StaticSyntaxRequest(StaticSyntaxRequest),
    /// backend → frontend: static syntax definitions for a prior request.
    StaticSyntaxList(StaticSyntaxList),
}

macro_rules! variant_name {
    ($($variant:ident),+ $(,)?) => {
        /// The `_message` wire name for this variant.
        #[must_use]
        pub fn variant_name(&self) -> &'static str {
            match self {
                $(Self::$variant(_) => stringify!($variant)),+
            }
        }
    };
}

impl Message {
    variant_name!(
        Shutdown,
        BackendAlive,
        ContentSync,
        OutOfSync,
        CompletionRequest,
        CompletionResponse,
        CompletionInvocation,
        ProblemUpdate,
        StaticSyntaxRequest,
        StaticSyntaxList,
    );

    /// Encodes this message to its structural form, including `_message`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut entries = match self {
            Self::Shutdown(_) | Self::BackendAlive(_) => Vec::new(),
            Self::ContentSync(inner) => as_map_entries(inner),
            Self::OutOfSync(inner) => as_map_entries(inner),
            Self::CompletionRequest(inner) => as_map_entries(inner),
            Self::CompletionResponse(inner) => as_map_entries(inner),
            Self::CompletionInvocation(inner) => as_map_entries(inner),
            Self::ProblemUpdate(inner) => as_map_entries(inner),
            Self::StaticSyntaxRequest(inner) => as_map_entries(inner),
            Self::StaticSyntaxList(inner) => as_map_entries(inner),
        };
        entries.insert(0, (Value::from(MESSAGE_KEY), Value::from(self.variant_name())));
        Value::Map(entries)
    }

    /// Decodes a message from its structural form.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::MalformedEnvelope`] when `value` is not a map
    /// of string keys or lacks [`MESSAGE_KEY`], [`DecodeError::UnknownVariant`]
    /// when `_message` names something outside the closed set, and whatever
    /// [`DecodeError`] the named variant's [`Record::from_fields`] produces.
    pub fn from_value(value: Value) -> Result<Self, DecodeError> {
        let Value::Map(entries) = value else {
            return Err(DecodeError::MalformedEnvelope(
                "expected a map".to_string(),
            ));
        };

        let mut fields = std::collections::HashMap::with_capacity(entries.len());
        for (key, value) in entries {
            let Some(key) = key.as_str() else {
                return Err(DecodeError::MalformedEnvelope(
                    "map keys must be strings".to_string(),
                ));
            };
            fields.insert(key.to_string(), value);
        }

        let variant = fields
            .remove(MESSAGE_KEY)
            .and_then(|value| value.as_str().map(str::to_owned))
            .ok_or_else(|| {
                DecodeError::MalformedEnvelope(format!("missing '{MESSAGE_KEY}' key"))
            })?;

        let mut map = FieldMap::new(fields);
        match variant.as_str() {
            "Shutdown" => Ok(Self::Shutdown(Shutdown)),
            "BackendAlive" => Ok(Self::BackendAlive(BackendAlive)),
            "ContentSync" => ContentSync::from_fields(&mut map).map(Self::ContentSync),
            "OutOfSync" => OutOfSync::from_fields(&mut map).map(Self::OutOfSync),
            "CompletionRequest" => {
                CompletionRequest::from_fields(&mut map).map(Self::CompletionRequest)
            }
            "CompletionResponse" => {
                CompletionResponse::from_fields(&mut map).map(Self::CompletionResponse)
            }
            "CompletionInvocation" => {
                CompletionInvocation::from_fields(&mut map).map(Self::CompletionInvocation)
            }
            "ProblemUpdate" => ProblemUpdate::from_fields(&mut map).map(Self::ProblemUpdate),
            "StaticSyntaxRequest" => {
                StaticSyntaxRequest::from_fields(&mut map).map(Self::StaticSyntaxRequest)
            }
            "StaticSyntaxList" => {
                StaticSyntaxList::from_fields(&mut map).map(Self::StaticSyntaxList)
            }
            other => Err(DecodeError::UnknownVariant(other.to_string())),
        }
    }

    /// Dispatches this message to the one `on_*` method of `listener` that
    /// applies, mirroring the Python originals' `msg.invoke(listener, ctx)`.
    pub fn invoke<Ctx>(&self, listener: &mut impl MessageListener<Ctx>, ctx: &mut Ctx) {
        match self {
            Self::Shutdown(inner) => listener.on_shutdown(inner, ctx),
            Self::BackendAlive(inner) => listener.on_backend_alive(inner, ctx),
            Self::ContentSync(inner) => listener.on_content_sync(inner, ctx),
            Self::OutOfSync(inner) => listener.on_out_of_sync(inner, ctx),
            Self::CompletionRequest(inner) => listener.on_completion_request(inner, ctx),
            Self::CompletionResponse(inner) => listener.on_completion_response(inner, ctx),
            Self::CompletionInvocation(inner) => listener.on_completion_invocation(inner, ctx),
            Self::ProblemUpdate(inner) => listener.on_problem_update(inner, ctx),
            Self::StaticSyntaxRequest(inner) => listener.on_static_syntax_request(inner, ctx),
            Self::StaticSyntaxList(inner) => listener.on_static_syntax_list(inner, ctx),
        }
    }
}

fn as_map_entries<T: Record>(record: &T) -> Vec<(Value, Value)> {
    match crate::serializer::encode_record(record) {
        Value::Map(entries) => entries,
        _ => Vec::new(),
    }
}

/// Visitor over the closed [`Message`] set, one method per variant.
///
/// Every method defaults to a no-op, matching `jep_py.backend.FrontendListener`
/// and `jep_py.frontend.BackendListener`: a listener overrides only the
/// messages it cares about.
#[allow(unused_variables, reason = "default methods intentionally ignore their arguments")]
pub trait MessageListener<Ctx> {
    /// Handles [`Message::Shutdown`].
    fn on_shutdown(&mut self, message: &Shutdown, ctx: &mut Ctx) {}
    /// Handles [`Message::BackendAlive`].
    fn on_backend_alive(&mut self, message: &BackendAlive, ctx: &mut Ctx) {}
    /// Handles [`Message::ContentSync`].
    fn on_content_sync(&mut self, message: &ContentSync, ctx: &mut Ctx) {}
    /// Handles [`Message::OutOfSync`].
    fn on_out_of_sync(&mut self, message: &OutOfSync, ctx: &mut Ctx) {}
    /// Handles [`Message::CompletionRequest`].
    fn on_completion_request(&mut self, message: &CompletionRequest, ctx: &mut Ctx) {}
    /// Handles [`Message::CompletionResponse`].
    fn on_completion_response(&mut self, message: &CompletionResponse, ctx: &mut Ctx) {}
    /// Handles [`Message::CompletionInvocation`].
    fn on_completion_invocation(&mut self, message: &CompletionInvocation, ctx: &mut Ctx) {}
    /// Handles [`Message::ProblemUpdate`].
    fn on_problem_update(&mut self, message: &ProblemUpdate, ctx: &mut Ctx) {}
    /// Handles [`Message::StaticSyntaxRequest`].
    fn on_static_syntax_request(&mut self, message: &StaticSyntaxRequest, ctx: &mut Ctx) {}
    /// Handles [`Message::StaticSyntaxList`].
    fn on_static_syntax_list(&mut self, message: &StaticSyntaxList, ctx: &mut Ctx) {}
}

#[cfg(test)]
mod tests {
    #![expect(clippy::expect_used, reason = "tests use expect for clarity")]

    use super::*;

    #[derive(Default)]
    struct Recorder {
        shutdowns: u32,
        syncs: Vec<String>,
    }

    impl MessageListener<()> for Recorder {
        fn on_shutdown(&mut self, _message: &Shutdown, _ctx: &mut ()) {
            self.shutdowns += 1;
        }

        fn on_content_sync(&mut self, message: &ContentSync, _ctx: &mut ()) {
            self.syncs.push(message.file.clone());
        }
    }

    #[test]
    fn dispatches_to_the_matching_method_only() {
        let mut recorder = Recorder::default();
        let mut ctx = ();

        Message::Shutdown(Shutdown).invoke(&mut recorder, &mut ctx);
        Message::ContentSync(ContentSync {
            file: "a.rs".to_string(),
            data: "x".to_string(),
            start: 0,
            end: None,
        })
        .invoke(&mut recorder, &mut ctx);
        Message::BackendAlive(BackendAlive).invoke(&mut recorder, &mut ctx);

        assert_eq!(recorder.shutdowns, 1);
        assert_eq!(recorder.syncs, vec!["a.rs".to_string()]);
    }

    #[test]
    fn round_trips_a_variant_with_fields() {
        let message = Message::OutOfSync(OutOfSync {
            file: "b.py".to_string(),
        });
        let encoded = message.to_value();
        let decoded = Message::from_value(encoded).expect("decode");
        assert_eq!(decoded, message);
    }

    #[test]
    fn round_trips_a_unit_variant() {
        let message = Message::BackendAlive(BackendAlive);
        let encoded = message.to_value();
        let decoded = Message::from_value(encoded).expect("decode");
        assert_eq!(decoded, message);
    }

    #[test]
    fn unknown_variant_name_is_rejected() {
        let value = Value::Map(vec![(Value::from(MESSAGE_KEY), Value::from("Nonsense"))]);
        let result = Message::from_value(value);
        assert!(matches!(result, Err(DecodeError::UnknownVariant(name)) if name == "Nonsense"));
    }

    #[test]
    fn missing_message_key_is_malformed() {
        let value = Value::Map(vec![]);
        let result = Message::from_value(value);
        assert!(matches!(result, Err(DecodeError::MalformedEnvelope(_))));
    }
}
