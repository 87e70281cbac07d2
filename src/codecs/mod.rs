//! Value codecs.
//!
//! A [`Codec`] converts between wire bytes and [`Value`]s for one schema
//! type, identified by its type id. Codecs form a graph: composite scalars,
//! sets, arrays and tuples hold shared references to their inner codecs.
//!
//! Every codec reads from a [`PacketReader`] already bounded to exactly the
//! value's bytes; absence is signalled by the length prefix around the value
//! and never reaches a codec.

pub mod array;
pub mod composite;
pub mod enumeration;
pub mod scalar;
pub mod set;

use std::sync::Arc;

use bytes::Bytes;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::protocol::reader::PacketReader;
use crate::protocol::writer::PacketWriter;
use crate::value::Value;

pub use array::{ArrayCodec, TupleCodec};
pub use composite::{CompositeScalarCodec, ScalarConverter};
pub use enumeration::EnumCodec;
pub use scalar::{ScalarCodec, ScalarKind, base_scalar};
#[cfg(feature = "with-chrono")]
pub use scalar::chrono_datetime;
pub use set::SetCodec;

/// Codec for a single schema type.
#[derive(Debug)]
pub enum Codec {
    /// Direct bytes to value mapping
    Scalar(ScalarCodec),
    /// Scalar exposed through a conversion over an inner scalar
    CompositeScalar(CompositeScalarCodec),
    /// Enumeration validated against its members
    Enum(EnumCodec),
    /// Receive-only set
    Set(SetCodec),
    /// One-dimensional array
    Array(ArrayCodec),
    /// Unnamed tuple
    Tuple(TupleCodec),
}

impl Codec {
    /// Type id this codec was built for.
    pub fn type_id(&self) -> Uuid {
        match self {
            Codec::Scalar(c) => c.id,
            Codec::CompositeScalar(c) => c.id,
            Codec::Enum(c) => c.id,
            Codec::Set(c) => c.id,
            Codec::Array(c) => c.id,
            Codec::Tuple(c) => c.id,
        }
    }

    /// Decode a present value from a bounded reader.
    pub fn decode(&self, reader: &mut PacketReader) -> Result<Option<Value>> {
        match self {
            Codec::Scalar(c) => c.decode(reader).map(Some),
            Codec::CompositeScalar(c) => c.decode(reader),
            Codec::Enum(c) => c.decode(reader).map(Some),
            Codec::Set(c) => c.decode(reader).map(Some),
            Codec::Array(c) => c.decode(reader).map(Some),
            Codec::Tuple(c) => c.decode(reader).map(Some),
        }
    }

    /// Encode a value. `None` writes nothing.
    pub fn encode(&self, writer: &mut PacketWriter<'_>, value: Option<&Value>) -> Result<()> {
        match self {
            Codec::Scalar(c) => value.map_or(Ok(()), |v| c.encode(writer, v)),
            Codec::CompositeScalar(c) => c.encode(writer, value),
            Codec::Enum(c) => value.map_or(Ok(()), |v| c.encode(writer, v)),
            Codec::Set(c) => c.encode(writer, value),
            Codec::Array(c) => value.map_or(Ok(()), |v| c.encode(writer, v)),
            Codec::Tuple(c) => value.map_or(Ok(()), |v| c.encode(writer, v)),
        }
    }

    /// Decode a length-delimited element: absent stays absent, present bytes
    /// must be consumed exactly.
    pub fn decode_bytes(&self, data: Option<Bytes>) -> Result<Option<Value>> {
        let Some(data) = data else {
            return Ok(None);
        };
        let mut reader = PacketReader::new(data);
        let value = self.decode(&mut reader)?;
        reader.finish()?;
        Ok(value)
    }

    /// Encode a value into a fresh buffer.
    pub fn encode_to_vec(&self, value: Option<&Value>) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.encode(&mut PacketWriter::new(&mut buf), value)?;
        Ok(buf)
    }

    /// True for scalar-shaped codecs (plain and composite).
    pub fn is_scalar(&self) -> bool {
        matches!(self, Codec::Scalar(_) | Codec::CompositeScalar(_))
    }

    /// True if set elements of this type use the envelope encoding.
    pub fn is_envelope(&self) -> bool {
        matches!(self, Codec::Array(_))
    }

    /// Same codec under a different type id (derived scalar types).
    pub fn with_type_id(&self, id: Uuid) -> Result<Codec> {
        Ok(match self {
            Codec::Scalar(c) => Codec::Scalar(ScalarCodec::new(id, c.kind)),
            Codec::CompositeScalar(c) => Codec::CompositeScalar(CompositeScalarCodec::new(
                id,
                Arc::clone(&c.inner),
                c.converter,
            )?),
            Codec::Enum(c) => Codec::Enum(EnumCodec::new(id, c.members.clone())),
            _ => {
                return Err(Error::UnsupportedShape {
                    type_id: id,
                    reason: format!("cannot derive a scalar from {}", self.type_id()),
                });
            }
        })
    }
}

fn encode_mismatch(codec: &str, id: Uuid, value: &Value) -> Error {
    Error::Encode(format!(
        "{} codec for type {} cannot encode a {} value",
        codec,
        id,
        value.kind()
    ))
}

/// Element count of a dimension with inclusive `upper`/`lower` bounds.
fn dimension_len(type_id: Uuid, upper: i32, lower: i32) -> Result<usize> {
    let len = i64::from(upper) - i64::from(lower) + 1;
    usize::try_from(len).map_err(|e| {
        Error::Decode(format!(
            "type {type_id}: invalid dimension bounds upper={upper} lower={lower}: {e}"
        ))
    })
}
