//! Scalar codecs for the standard library base types.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use uuid::Uuid;

use super::composite::{self, CompositeScalarCodec};
use super::{Codec, encode_mismatch};
use crate::error::{Error, Result};
use crate::protocol::reader::PacketReader;
use crate::protocol::writer::PacketWriter;
use crate::value::Value;

/// Well-known base scalar type ids.
pub mod std_id {
    use uuid::Uuid;

    pub const UUID: Uuid = Uuid::from_u128(0x100);
    pub const STR: Uuid = Uuid::from_u128(0x101);
    pub const BYTES: Uuid = Uuid::from_u128(0x102);
    pub const INT16: Uuid = Uuid::from_u128(0x103);
    pub const INT32: Uuid = Uuid::from_u128(0x104);
    pub const INT64: Uuid = Uuid::from_u128(0x105);
    pub const FLOAT32: Uuid = Uuid::from_u128(0x106);
    pub const FLOAT64: Uuid = Uuid::from_u128(0x107);
    pub const BOOL: Uuid = Uuid::from_u128(0x109);
    pub const DATETIME: Uuid = Uuid::from_u128(0x10a);
    pub const LOCAL_DATETIME: Uuid = Uuid::from_u128(0x10b);
    pub const DURATION: Uuid = Uuid::from_u128(0x10e);
    pub const JSON: Uuid = Uuid::from_u128(0x10f);
}

/// JSON payloads are prefixed with a format byte.
const JSON_FORMAT: u8 = 1;

/// Wire representation of a scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Uuid,
    Str,
    Bytes,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Bool,
    Json,
    /// i64 microseconds followed by two deprecated i32 fields (days, months)
    Duration,
}

/// Direct bytes to value mapping.
#[derive(Debug, Clone)]
pub struct ScalarCodec {
    /// Type id of the scalar
    pub id: Uuid,
    /// Wire representation
    pub kind: ScalarKind,
}

impl ScalarCodec {
    /// Create a new scalar codec.
    pub fn new(id: Uuid, kind: ScalarKind) -> Self {
        Self { id, kind }
    }

    /// Decode the whole bounded region as one value of `kind`.
    pub fn decode(&self, reader: &mut PacketReader) -> Result<Value> {
        Ok(match self.kind {
            ScalarKind::Uuid => Value::Uuid(reader.read_uuid()?),
            ScalarKind::Str => Value::Str(utf8(reader.consume_remaining().as_ref())?),
            ScalarKind::Bytes => Value::Bytes(reader.consume_remaining()),
            ScalarKind::Int16 => Value::Int16(reader.read_i16()?),
            ScalarKind::Int32 => Value::Int32(reader.read_i32()?),
            ScalarKind::Int64 => Value::Int64(reader.read_i64()?),
            ScalarKind::Float32 => Value::Float32(reader.read_f32()?),
            ScalarKind::Float64 => Value::Float64(reader.read_f64()?),
            ScalarKind::Bool => match reader.read_u8()? {
                0 => Value::Bool(false),
                1 => Value::Bool(true),
                other => {
                    return Err(Error::Decode(format!("invalid bool byte: {}", other)));
                }
            },
            ScalarKind::Json => {
                let format = reader.read_u8()?;
                if format != JSON_FORMAT {
                    return Err(Error::Decode(format!(
                        "unsupported json format: {}",
                        format
                    )));
                }
                Value::Json(utf8(reader.consume_remaining().as_ref())?)
            }
            ScalarKind::Duration => {
                let micros = reader.read_i64()?;
                // days, months
                reader.skip(8)?;
                Value::Duration(time::Duration::microseconds(micros))
            }
        })
    }

    /// Encode a value of the matching [`Value`] variant.
    pub fn encode(&self, writer: &mut PacketWriter<'_>, value: &Value) -> Result<()> {
        match (self.kind, value) {
            (ScalarKind::Uuid, Value::Uuid(v)) => writer.write_uuid(v),
            (ScalarKind::Str, Value::Str(v)) => writer.write_bytes(v.as_bytes()),
            (ScalarKind::Bytes, Value::Bytes(v)) => writer.write_bytes(v),
            (ScalarKind::Int16, Value::Int16(v)) => writer.write_i16(*v),
            (ScalarKind::Int32, Value::Int32(v)) => writer.write_i32(*v),
            (ScalarKind::Int64, Value::Int64(v)) => writer.write_i64(*v),
            (ScalarKind::Float32, Value::Float32(v)) => writer.write_f32(*v),
            (ScalarKind::Float64, Value::Float64(v)) => writer.write_f64(*v),
            (ScalarKind::Bool, Value::Bool(v)) => writer.write_bool(*v),
            (ScalarKind::Json, Value::Json(v)) => {
                writer.write_u8(JSON_FORMAT)?;
                writer.write_bytes(v.as_bytes())
            }
            (ScalarKind::Duration, Value::Duration(v)) => {
                let micros = i64::try_from(v.whole_microseconds()).map_err(|e| {
                    Error::Encode(format!("duration out of range for type {}: {}", self.id, e))
                })?;
                writer.write_i64(micros)?;
                writer.write_i32(0)?;
                writer.write_i32(0)
            }
            _ => Err(encode_mismatch("scalar", self.id, value)),
        }
    }
}

fn utf8(data: &[u8]) -> Result<String> {
    simdutf8::compat::from_utf8(data)
        .map(str::to_owned)
        .map_err(|e| Error::decode("str", e))
}

/// Process-wide registry of base scalar codecs, built once.
static REGISTRY: LazyLock<HashMap<Uuid, Arc<Codec>>> = LazyLock::new(|| {
    let mut map = HashMap::new();
    for (id, kind) in [
        (std_id::UUID, ScalarKind::Uuid),
        (std_id::STR, ScalarKind::Str),
        (std_id::BYTES, ScalarKind::Bytes),
        (std_id::INT16, ScalarKind::Int16),
        (std_id::INT32, ScalarKind::Int32),
        (std_id::INT64, ScalarKind::Int64),
        (std_id::FLOAT32, ScalarKind::Float32),
        (std_id::FLOAT64, ScalarKind::Float64),
        (std_id::BOOL, ScalarKind::Bool),
        (std_id::JSON, ScalarKind::Json),
        (std_id::DURATION, ScalarKind::Duration),
    ] {
        map.insert(id, Arc::new(Codec::Scalar(ScalarCodec::new(id, kind))));
    }

    // Both timestamp adapters share the microsecond node.
    let micros = Arc::clone(&map[&std_id::DURATION]);
    for (id, converter) in [
        (std_id::DATETIME, &composite::DATETIME),
        (std_id::LOCAL_DATETIME, &composite::LOCAL_DATETIME),
    ] {
        let codec = CompositeScalarCodec {
            id,
            inner: Arc::clone(&micros),
            converter,
        };
        map.insert(id, Arc::new(Codec::CompositeScalar(codec)));
    }
    map
});

/// Look up the codec for a base scalar type id.
pub fn base_scalar(id: Uuid) -> Option<Arc<Codec>> {
    REGISTRY.get(&id).cloned()
}

/// `std::datetime` decoded as `chrono::DateTime<Utc>`, over the same inner
/// node as the `time` adapter.
#[cfg(feature = "with-chrono")]
pub fn chrono_datetime() -> Arc<Codec> {
    static CODEC: LazyLock<Arc<Codec>> = LazyLock::new(|| {
        Arc::new(Codec::CompositeScalar(CompositeScalarCodec {
            id: std_id::DATETIME,
            inner: Arc::clone(&REGISTRY[&std_id::DURATION]),
            converter: &composite::CHRONO_DATETIME,
        }))
    });
    Arc::clone(&CODEC)
}
