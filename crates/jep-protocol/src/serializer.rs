//! Declarative, attribute-table-driven (de)serialization (spec §4.A).
//!
//! The Python originals (`jep.serializer.SerializableMeta`) build this table
//! once per class by inspecting constructor signatures at import time. A
//! static language has no equivalent reflection step, so each record here
//! builds its own table by hand in [`Record::fields`]/[`Record::from_fields`]
//! — the table itself, not the mechanism that built it, is what the wire
//! format's semantics depend on, exactly as spec's design notes call for.

use std::collections::HashMap;

use crate::error::DecodeError;
use crate::value::{FromValue, ToValue, Value};

/// One declared attribute of a record, captured at encode time.
pub struct Field {
    /// Attribute name as it appears on the wire.
    pub name: &'static str,
    /// Current value, already converted to its structural form.
    pub value: Value,
    /// Declared default, if any. Fields without a default are always
    /// emitted; fields with one are omitted when `value == default`.
    pub default: Option<Value>,
}

impl Field {
    /// Builds a field with no declared default — always emitted on encode,
    /// required on decode.
    pub fn required<T: ToValue>(name: &'static str, value: &T) -> Self {
        Self {
            name,
            value: value.to_value(),
            default: None,
        }
    }

    /// Builds a field with a declared default — omitted on encode when the
    /// current value equals the default; filled with the default on decode
    /// when absent from the wire map.
    pub fn defaulted<T: ToValue>(name: &'static str, value: &T, default: Value) -> Self {
        Self {
            name,
            value: value.to_value(),
            default: Some(default),
        }
    }

    fn omit_from_wire(&self) -> bool {
        self.default.as_ref() == Some(&self.value)
    }
}

/// A record or message variant whose wire shape is driven by a declared
/// attribute table (spec §4.A rule 3).
pub trait Record: Sized {
    /// Returns the declared attributes of this record, in declaration order.
    fn fields(&self) -> Vec<Field>;

    /// Builds a record from a decoded field map, filling declared defaults
    /// for any attribute absent on the wire.
    fn from_fields(fields: &mut FieldMap) -> Result<Self, DecodeError>;
}

/// Wire-form map of a decoded record, consumed field-by-field during decode.
pub struct FieldMap(HashMap<String, Value>);

impl FieldMap {
    /// Wraps a decoded structural map.
    #[must_use]
    pub fn new(entries: HashMap<String, Value>) -> Self {
        Self(entries)
    }

    /// Takes a required field. Fails with [`DecodeError::MissingField`] when
    /// absent, per spec §4.A: "fields without a declared default are always
    /// emitted" on encode, and therefore always expected on decode.
    pub fn required<T: FromValue>(&mut self, name: &'static str) -> Result<T, DecodeError> {
        let value = self
            .0
            .remove(name)
            .ok_or(DecodeError::MissingField { field: name })?;
        T::from_value(name, value)
    }

    /// Takes an optional field, filling `default` when absent from the wire.
    pub fn defaulted<T: FromValue>(
        &mut self,
        name: &'static str,
        default: T,
    ) -> Result<T, DecodeError> {
        match self.0.remove(name) {
            Some(value) => T::from_value(name, value),
            None => Ok(default),
        }
    }
}

/// Encodes a record to its structural map form, omitting default-valued
/// attributes per spec §4.A rule 3.
pub fn encode_record<T: Record>(record: &T) -> Value {
    let entries = record
        .fields()
        .into_iter()
        .filter(|field| !field.omit_from_wire())
        .map(|field| (Value::from(field.name), field.value))
        .collect();
    Value::Map(entries)
}

/// Decodes a record from its structural map form.
pub fn decode_record<T: Record>(value: Value) -> Result<T, DecodeError> {
    let Value::Map(entries) = value else {
        return Err(DecodeError::TypeMismatch {
            field: "<record>",
            detail: "expected a map".to_string(),
        });
    };

    let mut map = HashMap::with_capacity(entries.len());
    for (key, value) in entries {
        let Some(key) = key.as_str() else {
            return Err(DecodeError::TypeMismatch {
                field: "<record>",
                detail: "map keys must be strings".to_string(),
            });
        };
        map.insert(key.to_string(), value);
    }

    T::from_fields(&mut FieldMap::new(map))
}

#[cfg(test)]
mod tests {
    #![expect(
        clippy::expect_used,
        clippy::unreachable,
        reason = "tests use expect/unreachable for clarity"
    )]

    use super::*;

    struct Sample {
        insert: String,
        desc: Option<String>,
    }

    impl Record for Sample {
        fn fields(&self) -> Vec<Field> {
            vec![
                Field::required("insert", &self.insert),
                Field::defaulted("desc", &self.desc, Value::Nil),
            ]
        }

        fn from_fields(fields: &mut FieldMap) -> Result<Self, DecodeError> {
            Ok(Self {
                insert: fields.required("insert")?,
                desc: fields.defaulted("desc", None)?,
            })
        }
    }

    #[test]
    fn omits_default_valued_optional_fields() {
        let sample = Sample {
            insert: "x".to_string(),
            desc: None,
        };
        let Value::Map(entries) = encode_record(&sample) else {
            unreachable!("encode_record always returns a map");
        };
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0.as_str(), Some("insert"));
    }

    #[test]
    fn round_trips_through_decode() {
        let sample = Sample {
            insert: "x".to_string(),
            desc: Some("long".to_string()),
        };
        let encoded = encode_record(&sample);
        let decoded: Sample = decode_record(encoded).expect("decode");
        assert_eq!(decoded.insert, "x");
        assert_eq!(decoded.desc.as_deref(), Some("long"));
    }

    #[test]
    fn missing_required_field_fails() {
        let value = Value::Map(vec![]);
        let result: Result<Sample, _> = decode_record(value);
        assert!(matches!(result, Err(DecodeError::MissingField { field: "insert" })));
    }
}
