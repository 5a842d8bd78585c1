//! Errors surfaced by the structural serializer and message schema.

use thiserror::Error;

/// Failure to map a decoded structural value onto a typed message or record.
///
/// These are distinct from framing errors: by the time a [`DecodeError`] is
/// produced, the codec has already found one complete, self-delimited
/// MessagePack object in the stream. What follows is strictly the reflective
/// mapping described in spec §4.A, so truncated input never reaches this
/// type — see [`crate::codec::Decoder::pull`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// An enum field held a name with no matching variant.
    #[error("unknown enum name '{name}' for field '{field}'")]
    BadEnumName {
        /// Field holding the enum value.
        field: &'static str,
        /// Name that did not match any known variant.
        name: String,
    },
    /// A field without a declared default was absent from the wire map.
    #[error("missing required field '{field}'")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
    },
    /// A field's wire value did not match the expected shape.
    #[error("field '{field}' has the wrong type: {detail}")]
    TypeMismatch {
        /// Name of the mismatched field.
        field: &'static str,
        /// Human-readable description of the mismatch.
        detail: String,
    },
    /// The top-level wire value was not a map, or lacked `_message`.
    #[error("malformed message envelope: {0}")]
    MalformedEnvelope(String),
    /// The `_message` key named a variant outside the closed set.
    #[error("unknown message variant '{0}'")]
    UnknownVariant(String),
}
