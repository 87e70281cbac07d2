//! Array and tuple codecs.

use std::sync::Arc;

use uuid::Uuid;

use super::{Codec, dimension_len, encode_mismatch};
use crate::error::{Error, Result};
use crate::protocol::reader::PacketReader;
use crate::protocol::writer::{PacketWriter, len_i32};
use crate::value::Value;

/// One-dimensional array of a scalar-shaped element type.
#[derive(Debug, Clone)]
pub struct ArrayCodec {
    /// Type id of the descriptor
    pub id: Uuid,
    /// Codec of the array elements
    pub inner: Arc<Codec>,
}

impl ArrayCodec {
    /// Create a new array codec over `inner`.
    pub fn new(id: Uuid, inner: Arc<Codec>) -> Self {
        Self { id, inner }
    }

    /// Decode a one-dimensional array. Elements may not be absent.
    pub fn decode(&self, reader: &mut PacketReader) -> Result<Value> {
        let dimensions = reader.read_i32()?;
        // reserved
        reader.skip(8)?;
        if dimensions == 0 {
            return Ok(Value::Array(Vec::new()));
        }
        if dimensions != 1 {
            return Err(Error::UnsupportedShape {
                type_id: self.id,
                reason: format!("array of {} dimensions, only 1 is supported", dimensions),
            });
        }

        let upper = reader.read_i32()?;
        let lower = reader.read_i32()?;
        let count = dimension_len(self.id, upper, lower)?;

        let mut elements = Vec::with_capacity(count.min(reader.remaining()));
        for index in 0..count {
            let data = reader.read_element()?;
            match self.inner.decode_bytes(data)? {
                Some(value) => elements.push(value),
                None => {
                    return Err(Error::Decode(format!(
                        "array {} has an absent element at index {}",
                        self.id, index
                    )));
                }
            }
        }
        Ok(Value::Array(elements))
    }

    /// Encode a [`Value::Array`]; an empty array is written with zero dimensions.
    pub fn encode(&self, writer: &mut PacketWriter<'_>, value: &Value) -> Result<()> {
        let Value::Array(elements) = value else {
            return Err(encode_mismatch("array", self.id, value));
        };
        if elements.is_empty() {
            writer.write_i32(0)?;
            writer.write_i32(0)?;
            return writer.write_i32(0);
        }
        writer.write_i32(1)?;
        writer.write_i32(0)?;
        writer.write_i32(0)?;
        writer.write_i32(len_i32(elements.len())?)?;
        writer.write_i32(1)?;
        for element in elements {
            writer.write_length_prefixed(|w| self.inner.encode(w, Some(element)))?;
        }
        Ok(())
    }
}

/// Unnamed tuple of fixed element types.
#[derive(Debug, Clone)]
pub struct TupleCodec {
    /// Type id of the descriptor
    pub id: Uuid,
    /// Codecs of the tuple elements, in order
    pub elements: Vec<Arc<Codec>>,
}

impl TupleCodec {
    /// Create a new tuple codec.
    pub fn new(id: Uuid, elements: Vec<Arc<Codec>>) -> Self {
        Self { id, elements }
    }

    /// Decode a tuple whose element count must match the descriptor.
    pub fn decode(&self, reader: &mut PacketReader) -> Result<Value> {
        let count = reader.read_i32()?;
        if usize::try_from(count).ok() != Some(self.elements.len()) {
            return Err(Error::Cardinality {
                type_id: self.id,
                message: format!(
                    "tuple declares {} elements, found {}",
                    self.elements.len(),
                    count
                ),
            });
        }

        let mut values = Vec::with_capacity(self.elements.len());
        for codec in &self.elements {
            // reserved
            reader.skip(4)?;
            let data = reader.read_element()?;
            values.push(codec.decode_bytes(data)?);
        }
        Ok(Value::Tuple(values))
    }

    /// Encode a [`Value::Tuple`] of exactly as many elements as the descriptor.
    pub fn encode(&self, writer: &mut PacketWriter<'_>, value: &Value) -> Result<()> {
        let Value::Tuple(values) = value else {
            return Err(encode_mismatch("tuple", self.id, value));
        };
        if values.len() != self.elements.len() {
            return Err(Error::Cardinality {
                type_id: self.id,
                message: format!(
                    "tuple declares {} elements, got {}",
                    self.elements.len(),
                    values.len()
                ),
            });
        }
        writer.write_i32(len_i32(values.len())?)?;
        for (codec, value) in self.elements.iter().zip(values) {
            writer.write_i32(0)?;
            match value {
                Some(value) => writer.write_length_prefixed(|w| codec.encode(w, Some(value)))?,
                None => writer.write_byte_array(None)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codecs::scalar::{base_scalar, std_id};
    use bytes::Bytes;

    fn str_array() -> Codec {
        Codec::Array(ArrayCodec::new(
            Uuid::from_u128(0xA),
            base_scalar(std_id::STR).unwrap(),
        ))
    }

    #[test]
    fn test_array_bytes() {
        let value = Value::Array(vec![Value::from("ab"), Value::from("")]);
        let bytes = str_array().encode_to_vec(Some(&value)).unwrap();

        let mut expected = Vec::new();
        for n in [1_i32, 0, 0, 2, 1, 2] {
            expected.extend_from_slice(&n.to_be_bytes());
        }
        expected.extend_from_slice(b"ab");
        expected.extend_from_slice(&0_i32.to_be_bytes());
        assert_eq!(bytes, expected);

        assert_eq!(
            str_array().decode_bytes(Some(Bytes::from(bytes))).unwrap(),
            Some(value)
        );
    }

    #[test]
    fn test_empty_array() {
        let bytes = str_array()
            .encode_to_vec(Some(&Value::Array(vec![])))
            .unwrap();
        assert_eq!(bytes, vec![0; 12]);
        assert_eq!(
            str_array().decode_bytes(Some(Bytes::from(bytes))).unwrap(),
            Some(Value::Array(vec![]))
        );
    }

    #[test]
    fn test_array_rejects_absent_element() {
        let mut data = Vec::new();
        for n in [1_i32, 0, 0, 1, 1, -1] {
            data.extend_from_slice(&n.to_be_bytes());
        }
        let err = str_array().decode_bytes(Some(Bytes::from(data))).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    fn pair() -> Codec {
        Codec::Tuple(TupleCodec::new(
            Uuid::from_u128(0xB),
            vec![
                base_scalar(std_id::INT64).unwrap(),
                base_scalar(std_id::STR).unwrap(),
            ],
        ))
    }

    #[test]
    fn test_tuple_round_trip_with_absent() {
        let value = Value::Tuple(vec![Some(Value::Int64(5)), None]);
        let bytes = pair().encode_to_vec(Some(&value)).unwrap();
        assert_eq!(&bytes[..4], &2_i32.to_be_bytes());
        assert_eq!(&bytes[bytes.len() - 4..], &(-1_i32).to_be_bytes());
        assert_eq!(
            pair().decode_bytes(Some(Bytes::from(bytes))).unwrap(),
            Some(value)
        );
    }

    #[test]
    fn test_tuple_count_mismatch() {
        let data = 3_i32.to_be_bytes().to_vec();
        let err = pair().decode_bytes(Some(Bytes::from(data))).unwrap_err();
        assert!(matches!(err, Error::Cardinality { .. }));
    }
}
