//! Generic structural value shared by the serializer and the wire codec.
//!
//! This is the Rust analogue of the Python originals' reliance on bare
//! `dict`/`list`/scalar builtins as the intermediate serialization target
//! (`jep.serializer.serialize_to_builtins`): any self-describing binary
//! encoder can consume or produce it. [`rmpv::Value`] already models a
//! MessagePack object as scalars, byte strings, sequences, and maps, so it
//! is reused directly rather than introduced as a parallel type.

pub use rmpv::Value;

use crate::error::DecodeError;

/// Converts a typed field into its structural representation.
pub trait ToValue {
    /// Produces the structural value for this field.
    fn to_value(&self) -> Value;
}

/// Recovers a typed field from its structural representation.
pub trait FromValue: Sized {
    /// Attempts to recover `Self` from a decoded structural value.
    ///
    /// `field` names the attribute being decoded, used purely for
    /// diagnostics in the returned error.
    fn from_value(field: &'static str, value: Value) -> Result<Self, DecodeError>;
}

macro_rules! impl_scalar {
    ($ty:ty, $to:expr, $from:expr) => {
        impl ToValue for $ty {
            fn to_value(&self) -> Value {
                #[allow(
                    clippy::redundant_closure_call,
                    reason = "uniform macro expansion for both directions"
                )]
                $to(self)
            }
        }

        impl FromValue for $ty {
            fn from_value(field: &'static str, value: Value) -> Result<Self, DecodeError> {
                #[allow(
                    clippy::redundant_closure_call,
                    reason = "uniform macro expansion for both directions"
                )]
                $from(field, value)
            }
        }
    };
}

impl_scalar!(
    String,
    |s: &String| Value::from(s.as_str()),
    |field: &'static str, v: Value| v.as_str().map(str::to_owned).ok_or_else(|| {
        DecodeError::TypeMismatch {
            field,
            detail: "expected a string".to_string(),
        }
    })
);

impl_scalar!(
    bool,
    |b: &bool| Value::from(*b),
    |field: &'static str, v: Value| v.as_bool().ok_or_else(|| DecodeError::TypeMismatch {
        field,
        detail: "expected a boolean".to_string(),
    })
);

impl_scalar!(
    i64,
    |n: &i64| Value::from(*n),
    |field: &'static str, v: Value| v.as_i64().ok_or_else(|| DecodeError::TypeMismatch {
        field,
        detail: "expected a signed integer".to_string(),
    })
);

impl_scalar!(
    u64,
    |n: &u64| Value::from(*n),
    |field: &'static str, v: Value| v.as_u64().ok_or_else(|| DecodeError::TypeMismatch {
        field,
        detail: "expected an unsigned integer".to_string(),
    })
);

impl<T> ToValue for Option<T>
where
    T: ToValue,
{
    fn to_value(&self) -> Value {
        match self {
            Some(inner) => inner.to_value(),
            None => Value::Nil,
        }
    }
}

impl<T> FromValue for Option<T>
where
    T: FromValue,
{
    fn from_value(field: &'static str, value: Value) -> Result<Self, DecodeError> {
        if value.is_nil() {
            Ok(None)
        } else {
            T::from_value(field, value).map(Some)
        }
    }
}

impl<T> ToValue for Vec<T>
where
    T: ToValue,
{
    fn to_value(&self) -> Value {
        Value::Array(self.iter().map(ToValue::to_value).collect())
    }
}

impl<T> FromValue for Vec<T>
where
    T: FromValue,
{
    fn from_value(field: &'static str, value: Value) -> Result<Self, DecodeError> {
        let Value::Array(items) = value else {
            return Err(DecodeError::TypeMismatch {
                field,
                detail: "expected an array".to_string(),
            });
        };
        items.into_iter().map(|item| T::from_value(field, item)).collect()
    }
}
