//! Value types and conversions for ferret

pub use turso::Value;

use crate::error::Error;
use crate::error::Result;

/// Storage affinity of a mapped column
///
/// Used when a member carries no explicit `type` tag: the derive infers one
/// of these from the member's Rust type and records its [`tag`](ColumnType::tag)
/// on the field metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    /// 64-bit signed integer (also used for booleans)
    Integer,
    /// 64-bit floating point number
    Float,
    /// UTF-8 text string
    Text,
    /// Binary data
    Blob,
}

impl ColumnType {
    /// Type tag recorded on [`Field`](crate::metadata::Field) when none is declared
    pub fn tag(&self) -> &'static str {
        match self {
            ColumnType::Integer => "integer",
            ColumnType::Float => "real",
            ColumnType::Text => "text",
            ColumnType::Blob => "blob",
        }
    }
}

/// Trait for converting Rust types into database values
///
/// Implemented for the common scalar types so they can be used as query
/// parameters and written back through [`Record::set`](crate::Record::set).
///
/// # Example
///
/// ```ignore
/// use ferret::IntoValue;
///
/// let value: Value = 42i64.into_value();
/// let text: Value = "hello".into_value();
/// ```
pub trait IntoValue {
    /// Convert this value into a database [`Value`]
    fn into_value(self) -> Value;
}

/// Trait for converting database values into Rust types
///
/// A failed conversion is how the record wrapper rejects a `set` whose value
/// does not fit the target member.
pub trait FromValue: Sized {
    /// Convert a database [`Value`] into this type
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be converted to this type,
    /// or if the value is null and this type is not nullable.
    fn from_value(value: Value) -> Result<Self>;

    /// Convert from value, returning the default value for null
    fn from_value_opt(value: Value) -> Result<Self>
    where Self: Default {
        if matches!(value, Value::Null) { Ok(Self::default()) } else { Self::from_value(value) }
    }
}

fn mismatch(expected: &'static str, actual: &Value) -> Error {
    Error::TypeConversion { expected, actual: kind_of(actual).to_string() }
}

/// Short name of the variant held by `value`, used in conversion errors
pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "Null",
        Value::Integer(_) => "Integer",
        Value::Real(_) => "Real",
        Value::Text(_) => "Text",
        Value::Blob(_) => "Blob",
    }
}

/// Whether `value` counts as present: not null and not the zero value of its kind.
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Integer(v) => *v != 0,
        Value::Real(v) => *v != 0.0,
        Value::Text(v) => !v.is_empty(),
        Value::Blob(v) => !v.is_empty(),
    }
}

/// Plain-text rendering used in validation messages (`john@doe.com`, `1`, ...).
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "<nil>".to_string(),
        Value::Integer(v) => v.to_string(),
        Value::Real(v) => v.to_string(),
        Value::Text(v) => v.clone(),
        Value::Blob(v) => format!("{:?}", v),
    }
}

/// JSON rendering of a stored value.
pub fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(v) => serde_json::Value::from(*v),
        Value::Real(v) => serde_json::Value::from(*v),
        Value::Text(v) => serde_json::Value::from(v.as_str()),
        Value::Blob(v) => serde_json::Value::from(v.clone()),
    }
}

macro_rules! integer_value {
    ($($ty:ty),*) => {
        $(
            impl IntoValue for $ty {
                fn into_value(self) -> Value {
                    Value::Integer(self as i64)
                }
            }

            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self> {
                    let v = i64::from_value(value)?;
                    <$ty>::try_from(v).map_err(|_| Error::TypeConversion {
                        expected: stringify!($ty),
                        actual:   format!("Integer({})", v),
                    })
                }
            }
        )*
    };
}

integer_value!(i32, i16, i8, u32, u16, u8);

impl IntoValue for i64 {
    fn into_value(self) -> Value {
        Value::Integer(self)
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Integer(v) => Ok(v),
            // Whole floats in [-2^63, 2^63) only
            Value::Real(v) if v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 => Ok(v as i64),
            Value::Null => Err(Error::UnexpectedNull),
            other => Err(mismatch("Integer", &other)),
        }
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Real(self)
    }
}

impl IntoValue for f32 {
    fn into_value(self) -> Value {
        Value::Real(self as f64)
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Real(v) => Ok(v),
            Value::Integer(v) => Ok(v as f64),
            Value::Null => Err(Error::UnexpectedNull),
            other => Err(mismatch("Real", &other)),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> Result<Self> {
        f64::from_value(value).map(|v| v as f32)
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::Text(self)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::Text(self.to_string())
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Text(v) => Ok(v),
            Value::Null => Err(Error::UnexpectedNull),
            other => Err(mismatch("Text", &other)),
        }
    }
}

impl IntoValue for Vec<u8> {
    fn into_value(self) -> Value {
        Value::Blob(self)
    }
}

impl IntoValue for &[u8] {
    fn into_value(self) -> Value {
        Value::Blob(self.to_vec())
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Blob(v) => Ok(v),
            Value::Null => Err(Error::UnexpectedNull),
            other => Err(mismatch("Blob", &other)),
        }
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Integer(if self { 1 } else { 0 })
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Integer(v) => Ok(v != 0),
            Value::Null => Err(Error::UnexpectedNull),
            other => Err(mismatch("Integer (boolean)", &other)),
        }
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        match self {
            Some(v) => v.into_value(),
            None => Value::Null,
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }

    fn from_value_opt(value: Value) -> Result<Self> {
        Self::from_value(value)
    }
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

#[cfg(feature = "with-chrono")]
mod chrono_impl {
    use chrono::DateTime;
    use chrono::NaiveDate;
    use chrono::NaiveDateTime;
    use chrono::Utc;

    use super::*;

    const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    fn text(value: Value, expected: &'static str) -> Result<String> {
        match value {
            Value::Text(s) => Ok(s),
            Value::Null => Err(Error::UnexpectedNull),
            other => Err(mismatch(expected, &other)),
        }
    }

    impl IntoValue for NaiveDateTime {
        fn into_value(self) -> Value {
            Value::Text(self.format(DATETIME_FORMAT).to_string())
        }
    }

    impl FromValue for NaiveDateTime {
        fn from_value(value: Value) -> Result<Self> {
            let s = text(value, "Text (datetime)")?;
            NaiveDateTime::parse_from_str(&s, DATETIME_FORMAT)
                .or_else(|_| NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S"))
                .map_err(|_| Error::TypeConversion { expected: "NaiveDateTime", actual: s })
        }
    }

    impl IntoValue for DateTime<Utc> {
        fn into_value(self) -> Value {
            self.naive_utc().into_value()
        }
    }

    impl FromValue for DateTime<Utc> {
        fn from_value(value: Value) -> Result<Self> {
            let ndt = NaiveDateTime::from_value(value)?;
            Ok(DateTime::from_naive_utc_and_offset(ndt, Utc))
        }
    }

    impl IntoValue for NaiveDate {
        fn into_value(self) -> Value {
            Value::Text(self.format("%Y-%m-%d").to_string())
        }
    }

    impl FromValue for NaiveDate {
        fn from_value(value: Value) -> Result<Self> {
            let s = text(value, "Text (date)")?;
            NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|_| Error::TypeConversion { expected: "NaiveDate", actual: s })
        }
    }
}

#[cfg(feature = "with-uuid")]
mod uuid_impl {
    use uuid::Uuid;

    use super::*;

    impl IntoValue for Uuid {
        fn into_value(self) -> Value {
            Value::Text(self.to_string())
        }
    }

    impl FromValue for Uuid {
        fn from_value(value: Value) -> Result<Self> {
            match value {
                Value::Text(s) => Uuid::parse_str(&s).map_err(|_| Error::TypeConversion { expected: "UUID", actual: s }),
                Value::Blob(b) => {
                    Uuid::from_slice(&b).map_err(|_| Error::TypeConversion { expected: "UUID", actual: format!("{:?}", b) })
                }
                Value::Null => Err(Error::UnexpectedNull),
                other => Err(mismatch("Text or Blob (UUID)", &other)),
            }
        }
    }
}

#[cfg(feature = "with-json")]
pub use json_impl::Json;

#[cfg(feature = "with-json")]
mod json_impl {
    use serde::Serialize;
    use serde::de::DeserializeOwned;

    use super::*;

    /// Wrapper storing any serde type as JSON text
    #[derive(Clone, Debug, Default, PartialEq)]
    pub struct Json<T>(pub T);

    impl<T: Serialize> IntoValue for Json<T> {
        fn into_value(self) -> Value {
            match serde_json::to_string(&self.0) {
                Ok(s) => Value::Text(s),
                Err(_) => Value::Null,
            }
        }
    }

    impl<T: DeserializeOwned> FromValue for Json<T> {
        fn from_value(value: Value) -> Result<Self> {
            match value {
                Value::Text(s) => Ok(Json(serde_json::from_str(&s)?)),
                Value::Null => Err(Error::UnexpectedNull),
                other => Err(mismatch("Text (JSON)", &other)),
            }
        }
    }
}
