//! Decoded runtime values.

use bytes::Bytes;
use uuid::Uuid;

/// A value decoded from (or to be encoded into) the wire format.
///
/// Absence is represented outside the value as `Option<Value>::None`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Uuid(Uuid),
    Str(String),
    Bytes(Bytes),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Bool(bool),
    /// JSON document text
    Json(String),
    /// Microsecond-precision duration
    Duration(time::Duration),
    /// Timezone-aware timestamp
    DateTime(time::OffsetDateTime),
    /// Timestamp without timezone
    LocalDateTime(time::PrimitiveDateTime),
    /// Timezone-aware timestamp as chrono type
    #[cfg(feature = "with-chrono")]
    ChronoDateTime(chrono::DateTime<chrono::Utc>),
    /// Enumeration member name
    Enum(String),
    /// Set elements; `None` elements are absent
    Set(Vec<Option<Value>>),
    /// One-dimensional array
    Array(Vec<Value>),
    /// Tuple elements; `None` elements are absent
    Tuple(Vec<Option<Value>>),
}

impl Value {
    /// Name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Uuid(_) => "uuid",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
            Value::Int16(_) => "int16",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Float32(_) => "float32",
            Value::Float64(_) => "float64",
            Value::Bool(_) => "bool",
            Value::Json(_) => "json",
            Value::Duration(_) => "duration",
            Value::DateTime(_) => "datetime",
            Value::LocalDateTime(_) => "local_datetime",
            #[cfg(feature = "with-chrono")]
            Value::ChronoDateTime(_) => "chrono datetime",
            Value::Enum(_) => "enum",
            Value::Set(_) => "set",
            Value::Array(_) => "array",
            Value::Tuple(_) => "tuple",
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )+
    };
}

impl_from!(
    Uuid => Uuid,
    String => Str,
    Bytes => Bytes,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
    bool => Bool,
    time::Duration => Duration,
    time::OffsetDateTime => DateTime,
    time::PrimitiveDateTime => LocalDateTime,
);

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_owned())
    }
}
