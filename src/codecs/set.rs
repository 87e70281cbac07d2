//! Set codec (receive only).

use std::sync::Arc;

use uuid::Uuid;

use super::{Codec, dimension_len};
use crate::error::{Error, Result};
use crate::protocol::reader::PacketReader;
use crate::protocol::writer::PacketWriter;
use crate::value::Value;

/// A set of values of one inner type.
#[derive(Debug, Clone)]
pub struct SetCodec {
    /// Type id of the set descriptor
    pub id: Uuid,
    /// Codec of the set elements
    pub inner: Arc<Codec>,
}

impl SetCodec {
    /// Create a new set codec over `inner`.
    pub fn new(id: Uuid, inner: Arc<Codec>) -> Self {
        Self { id, inner }
    }

    /// Decode a set, choosing the element layout from the inner codec.
    ///
    /// Arrays are wrapped in a single-element envelope; every other element
    /// is a length-prefixed byte array, zero or negative length being absent.
    pub fn decode(&self, reader: &mut PacketReader) -> Result<Value> {
        let dimensions = reader.read_i32()?;
        if dimensions == 0 {
            // An empty set may omit the reserved field entirely.
            if !reader.is_empty() {
                reader.skip(8)?;
            }
            return Ok(Value::Set(Vec::new()));
        }
        if dimensions != 1 {
            return Err(Error::UnsupportedShape {
                type_id: self.id,
                reason: format!("set of {} dimensions, only 1 is supported", dimensions),
            });
        }
        // flags, reserved
        reader.skip(8)?;

        let upper = reader.read_i32()?;
        let lower = reader.read_i32()?;
        let count = dimension_len(self.id, upper, lower)?;

        let mut elements = Vec::with_capacity(count.min(reader.remaining()));
        if self.inner.is_envelope() {
            for _ in 0..count {
                elements.push(self.decode_envelope(reader)?);
            }
        } else {
            for _ in 0..count {
                let data = reader.read_byte_array()?;
                elements.push(self.inner.decode_bytes(data)?);
            }
        }
        Ok(Value::Set(elements))
    }

    fn decode_envelope(&self, reader: &mut PacketReader) -> Result<Option<Value>> {
        reader.skip(4)?;
        let count = reader.read_i32()?;
        if count != 1 {
            return Err(Error::Cardinality {
                type_id: self.id,
                message: format!("envelope should contain 1 element, found {}", count),
            });
        }
        reader.skip(4)?;
        self.inner.decode(reader)
    }

    /// Sets are never sent to the server.
    pub fn encode(&self, _writer: &mut PacketWriter<'_>, _value: Option<&Value>) -> Result<()> {
        Err(Error::UnsupportedShape {
            type_id: self.id,
            reason: "sets cannot be serialized".into(),
        })
    }
}
