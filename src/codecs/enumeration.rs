//! Enumeration codec: member names as UTF-8 text, validated against the
//! declared member list in both directions.

use uuid::Uuid;

use super::encode_mismatch;
use crate::error::{Error, Result};
use crate::protocol::reader::PacketReader;
use crate::protocol::writer::PacketWriter;
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct EnumCodec {
    /// Type id of the enumeration descriptor
    pub id: Uuid,
    /// Member names in declaration order
    pub members: Vec<String>,
}

impl EnumCodec {
    /// Create a new enum codec.
    pub fn new(id: Uuid, members: Vec<String>) -> Self {
        Self { id, members }
    }

    fn check(&self, name: &str) -> Result<()> {
        if self.members.iter().any(|m| m == name) {
            Ok(())
        } else {
            Err(Error::Cardinality {
                type_id: self.id,
                message: format!("{:?} is not one of {:?}", name, self.members),
            })
        }
    }

    /// Decode a member name, rejecting names outside `members`.
    pub fn decode(&self, reader: &mut PacketReader) -> Result<Value> {
        let data = reader.consume_remaining();
        let name = simdutf8::compat::from_utf8(&data).map_err(|e| Error::decode("enum", e))?;
        self.check(name)?;
        Ok(Value::Enum(name.to_owned()))
    }

    /// Encode a [`Value::Enum`] or [`Value::Str`] naming a member.
    pub fn encode(&self, writer: &mut PacketWriter<'_>, value: &Value) -> Result<()> {
        let name = match value {
            Value::Enum(name) | Value::Str(name) => name,
            other => return Err(encode_mismatch("enum", self.id, other)),
        };
        self.check(name)?;
        writer.write_bytes(name.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codecs::Codec;
    use bytes::Bytes;

    fn abc() -> Codec {
        Codec::Enum(EnumCodec::new(
            Uuid::from_u128(0xE),
            vec!["A".into(), "B".into(), "C".into()],
        ))
    }

    #[test]
    fn test_decode_member() {
        assert_eq!(
            abc().decode_bytes(Some(Bytes::from_static(b"B"))).unwrap(),
            Some(Value::Enum("B".into()))
        );
    }

    #[test]
    fn test_decode_unknown_member() {
        let err = abc()
            .decode_bytes(Some(Bytes::from_static(b"D")))
            .unwrap_err();
        assert!(matches!(err, Error::Cardinality { .. }));
    }

    #[test]
    fn test_encode_validates() {
        assert_eq!(
            abc().encode_to_vec(Some(&Value::Enum("C".into()))).unwrap(),
            b"C".to_vec()
        );
        let err = abc().encode_to_vec(Some(&Value::from("Z"))).unwrap_err();
        assert!(matches!(err, Error::Cardinality { .. }));
    }
}
