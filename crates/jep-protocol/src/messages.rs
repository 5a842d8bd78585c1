//! The closed set of message variants, nested records, and enums (spec §3).

use std::fmt;
use std::str::FromStr;

use crate::error::DecodeError;
use crate::serializer::{Field, FieldMap, Record};
use crate::value::{FromValue, ToValue, Value};

macro_rules! wire_enum {
    ($name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        /// Closed enumeration serialized as its textual wire name (spec §4.A rule 2).
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $(#[allow(missing_docs, reason = "variant names are self-explanatory wire tags")] $variant),+
        }

        impl fmt::Display for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                let label = match self {
                    $(Self::$variant => $wire),+
                };
                formatter.write_str(label)
            }
        }

        impl FromStr for $name {
            type Err = ();

            fn from_str(input: &str) -> Result<Self, Self::Err> {
                match input {
                    $($wire => Ok(Self::$variant),)+
                    _ => Err(()),
                }
            }
        }

        impl ToValue for $name {
            fn to_value(&self) -> Value {
                Value::from(self.to_string())
            }
        }

        impl FromValue for $name {
            fn from_value(field: &'static str, value: Value) -> Result<Self, DecodeError> {
                let name = value.as_str().ok_or_else(|| DecodeError::TypeMismatch {
                    field,
                    detail: "expected an enum name string".to_string(),
                })?;
                Self::from_str(name).map_err(|()| DecodeError::BadEnumName {
                    field,
                    name: name.to_string(),
                })
            }
        }
    };
}

wire_enum!(Severity {
    Debug => "debug",
    Info => "info",
    Warn => "warn",
    Error => "error",
    Fatal => "fatal",
});

wire_enum!(SemanticType {
    Comment => "comment",
    Type => "type",
    String => "string",
    Number => "number",
    Identifier => "identifier",
    Keyword => "keyword",
    Label => "label",
    Link => "link",
    Special1 => "special1",
    Special2 => "special2",
    Special3 => "special3",
    Special4 => "special4",
    Special5 => "special5",
});

wire_enum!(SyntaxFormatType {
    Textmate => "textmate",
    Vim => "vim",
});

/// A single diagnostic raised against a file location.
#[derive(Debug, Clone, PartialEq)]
pub struct Problem {
    /// Human-readable diagnostic text.
    pub message: String,
    /// Severity of the diagnostic.
    pub severity: Severity,
    /// One-based line number the diagnostic applies to.
    pub line: i64,
}

impl Record for Problem {
    fn fields(&self) -> Vec<Field> {
        vec![
            Field::required("message", &self.message),
            Field::required("severity", &self.severity),
            Field::required("line", &self.line),
        ]
    }

    fn from_fields(fields: &mut FieldMap) -> Result<Self, DecodeError> {
        Ok(Self {
            message: fields.required("message")?,
            severity: fields.required("severity")?,
            line: fields.required("line")?,
        })
    }
}

impl ToValue for Problem {
    fn to_value(&self) -> Value {
        crate::serializer::encode_record(self)
    }
}

impl FromValue for Problem {
    fn from_value(_field: &'static str, value: Value) -> Result<Self, DecodeError> {
        crate::serializer::decode_record(value)
    }
}

/// The diagnostics known for a single file, possibly a partial window.
#[derive(Debug, Clone, PartialEq)]
pub struct FileProblems {
    /// File path the problems apply to.
    pub file: String,
    /// Diagnostics for the file.
    pub problems: Vec<Problem>,
    /// Total number of known problems, when the list is a partial window.
    pub total: Option<i64>,
    /// Start of the covered window (default `0`).
    pub start: i64,
    /// End of the covered window, when bounded.
    pub end: Option<i64>,
}

impl Record for FileProblems {
    fn fields(&self) -> Vec<Field> {
        vec![
            Field::required("file", &self.file),
            Field::required("problems", &self.problems),
            Field::defaulted("total", &self.total, Value::Nil),
            Field::defaulted("start", &self.start, Value::from(0_i64)),
            Field::defaulted("end", &self.end, Value::Nil),
        ]
    }

    fn from_fields(fields: &mut FieldMap) -> Result<Self, DecodeError> {
        Ok(Self {
            file: fields.required("file")?,
            problems: fields.required("problems")?,
            total: fields.defaulted("total", None)?,
            start: fields.defaulted("start", 0)?,
            end: fields.defaulted("end", None)?,
        })
    }
}

impl ToValue for FileProblems {
    fn to_value(&self) -> Value {
        crate::serializer::encode_record(self)
    }
}

impl FromValue for FileProblems {
    fn from_value(_field: &'static str, value: Value) -> Result<Self, DecodeError> {
        crate::serializer::decode_record(value)
    }
}

/// A single completion suggestion.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOption {
    /// Text to insert at the completion point.
    pub insert: String,
    /// Short description shown inline.
    pub desc: Option<String>,
    /// Longer description shown on demand.
    pub long_desc: Option<String>,
    /// Semantic classification used for icon/highlighting choices.
    pub semantics: Option<SemanticType>,
    /// Identifier of the extension that contributed this option.
    pub extension_id: Option<String>,
}

impl Record for CompletionOption {
    fn fields(&self) -> Vec<Field> {
        vec![
            Field::required("insert", &self.insert),
            Field::defaulted("desc", &self.desc, Value::Nil),
            Field::defaulted("longDesc", &self.long_desc, Value::Nil),
            Field::defaulted("semantics", &self.semantics, Value::Nil),
            Field::defaulted("extensionId", &self.extension_id, Value::Nil),
        ]
    }

    fn from_fields(fields: &mut FieldMap) -> Result<Self, DecodeError> {
        Ok(Self {
            insert: fields.required("insert")?,
            desc: fields.defaulted("desc", None)?,
            long_desc: fields.defaulted("longDesc", None)?,
            semantics: fields.defaulted("semantics", None)?,
            extension_id: fields.defaulted("extensionId", None)?,
        })
    }
}

impl ToValue for CompletionOption {
    fn to_value(&self) -> Value {
        crate::serializer::encode_record(self)
    }
}

impl FromValue for CompletionOption {
    fn from_value(_field: &'static str, value: Value) -> Result<Self, DecodeError> {
        crate::serializer::decode_record(value)
    }
}

/// A named static syntax definition handed to the frontend verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticSyntax {
    /// Display name of the syntax definition.
    pub name: String,
    /// File extensions the definition applies to.
    pub file_extensions: Vec<String>,
    /// Raw definition body (format-specific; opaque to the protocol).
    pub definition: String,
}

impl Record for StaticSyntax {
    fn fields(&self) -> Vec<Field> {
        vec![
            Field::required("name", &self.name),
            Field::required("fileExtensions", &self.file_extensions),
            Field::required("definition", &self.definition),
        ]
    }

    fn from_fields(fields: &mut FieldMap) -> Result<Self, DecodeError> {
        Ok(Self {
            name: fields.required("name")?,
            file_extensions: fields.required("fileExtensions")?,
            definition: fields.required("definition")?,
        })
    }
}

impl ToValue for StaticSyntax {
    fn to_value(&self) -> Value {
        crate::serializer::encode_record(self)
    }
}

impl FromValue for StaticSyntax {
    fn from_value(_field: &'static str, value: Value) -> Result<Self, DecodeError> {
        crate::serializer::decode_record(value)
    }
}

/// Name of the request/response correlation field, shared by every message
/// type that supports synchronous `requestMessage` semantics. Mirrors
/// `jep.schema.TOKEN_ATTR_NAME` rather than repeating the string literal at
/// every call site (SPEC_FULL.md §2 item 5).
pub const TOKEN_FIELD: &str = "token";

/// frontend → backend: request a graceful shutdown of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Shutdown;

/// backend → frontend: periodic liveness heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackendAlive;

/// frontend → backend: mirror a range-replace edit of an editor buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentSync {
    /// Path of the file being edited.
    pub file: String,
    /// Replacement text for the `[start, end)` range.
    pub data: String,
    /// Start offset of the replaced range (default `0`).
    pub start: i64,
    /// End offset of the replaced range; defaults to the current length.
    pub end: Option<i64>,
}

impl Record for ContentSync {
    fn fields(&self) -> Vec<Field> {
        vec![
            Field::required("file", &self.file),
            Field::required("data", &self.data),
            Field::defaulted("start", &self.start, Value::from(0_i64)),
            Field::defaulted("end", &self.end, Value::Nil),
        ]
    }

    fn from_fields(fields: &mut FieldMap) -> Result<Self, DecodeError> {
        Ok(Self {
            file: fields.required("file")?,
            data: fields.required("data")?,
            start: fields.defaulted("start", 0)?,
            end: fields.defaulted("end", None)?,
        })
    }
}

/// backend → frontend: the previously sent `ContentSync` could not be
/// applied because the range no longer matched the server-side mirror.
#[derive(Debug, Clone, PartialEq)]
pub struct OutOfSync {
    /// File whose synchronization failed.
    pub file: String,
}

impl Record for OutOfSync {
    fn fields(&self) -> Vec<Field> {
        vec![Field::required("file", &self.file)]
    }

    fn from_fields(fields: &mut FieldMap) -> Result<Self, DecodeError> {
        Ok(Self {
            file: fields.required("file")?,
        })
    }
}

/// frontend → backend: request completion options at a buffer position.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// File the completion is requested in.
    pub file: String,
    /// Offset within the file to complete at.
    pub pos: i64,
    /// Maximum number of options the caller wants back.
    pub limit: Option<i64>,
    /// Correlation token, auto-assigned by the connector if left `None`.
    pub token: Option<String>,
}

impl Record for CompletionRequest {
    fn fields(&self) -> Vec<Field> {
        vec![
            Field::required("file", &self.file),
            Field::required("pos", &self.pos),
            Field::defaulted("limit", &self.limit, Value::Nil),
            Field::required("token", &self.token),
        ]
    }

    fn from_fields(fields: &mut FieldMap) -> Result<Self, DecodeError> {
        Ok(Self {
            file: fields.required("file")?,
            pos: fields.required("pos")?,
            limit: fields.defaulted("limit", None)?,
            token: fields.required("token")?,
        })
    }
}

/// backend → frontend: completion options for a previously requested range.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    /// Start of the range the completion applies to.
    pub start: i64,
    /// End of the range the completion applies to.
    pub end: i64,
    /// Whether the backend truncated the option list.
    pub limit_exceeded: bool,
    /// Offered completion options.
    pub options: Vec<CompletionOption>,
    /// Correlation token matching the originating request.
    pub token: Option<String>,
}

impl Record for CompletionResponse {
    fn fields(&self) -> Vec<Field> {
        vec![
            Field::required("start", &self.start),
            Field::required("end", &self.end),
            Field::required("limitExceeded", &self.limit_exceeded),
            Field::required("options", &self.options),
            Field::required("token", &self.token),
        ]
    }

    fn from_fields(fields: &mut FieldMap) -> Result<Self, DecodeError> {
        Ok(Self {
            start: fields.required("start")?,
            end: fields.required("end")?,
            limit_exceeded: fields.required("limitExceeded")?,
            options: fields.required("options")?,
            token: fields.required("token")?,
        })
    }
}

/// frontend → backend: notify that an extension-defined action was invoked.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionInvocation {
    /// Identifier of the invoked extension.
    pub extension_id: String,
}

impl Record for CompletionInvocation {
    fn fields(&self) -> Vec<Field> {
        vec![Field::required("extensionId", &self.extension_id)]
    }

    fn from_fields(fields: &mut FieldMap) -> Result<Self, DecodeError> {
        Ok(Self {
            extension_id: fields.required("extensionId")?,
        })
    }
}

/// backend → frontend: updated diagnostics for one or more files.
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemUpdate {
    /// Diagnostics grouped by file.
    pub file_problems: Vec<FileProblems>,
    /// Whether this update is a partial refinement of a previous one.
    pub partial: bool,
}

impl Record for ProblemUpdate {
    fn fields(&self) -> Vec<Field> {
        vec![
            Field::required("fileProblems", &self.file_problems),
            Field::defaulted("partial", &self.partial, Value::from(false)),
        ]
    }

    fn from_fields(fields: &mut FieldMap) -> Result<Self, DecodeError> {
        Ok(Self {
            file_problems: fields.required("fileProblems")?,
            partial: fields.defaulted("partial", false)?,
        })
    }
}

/// frontend → backend: request static syntax definitions.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticSyntaxRequest {
    /// Syntax file format the caller understands.
    pub format: SyntaxFormatType,
    /// File extensions to filter by; empty means "all extensions".
    pub file_extensions: Vec<String>,
}

impl Record for StaticSyntaxRequest {
    fn fields(&self) -> Vec<Field> {
        vec![
            Field::required("format", &self.format),
            Field::required("fileExtensions", &self.file_extensions),
        ]
    }

    fn from_fields(fields: &mut FieldMap) -> Result<Self, DecodeError> {
        Ok(Self {
            format: fields.required("format")?,
            file_extensions: fields.required("fileExtensions")?,
        })
    }
}

/// backend → frontend: static syntax definitions matching a prior request.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticSyntaxList {
    /// Format the contained syntax definitions are written in.
    pub format: SyntaxFormatType,
    /// Matching syntax definitions.
    pub syntaxes: Vec<StaticSyntax>,
}

impl Record for StaticSyntaxList {
    fn fields(&self) -> Vec<Field> {
        vec![
            Field::required("format", &self.format),
            Field::required("syntaxes", &self.syntaxes),
        ]
    }

    fn from_fields(fields: &mut FieldMap) -> Result<Self, DecodeError> {
        Ok(Self {
            format: fields.required("format")?,
            syntaxes: fields.required("syntaxes")?,
        })
    }
}
