//! Composite scalars: an inner scalar codec plus a conversion pair.

use std::sync::Arc;

use time::macros::datetime;
use time::{OffsetDateTime, PrimitiveDateTime};
use uuid::Uuid;

use super::Codec;
use crate::error::{Error, Result};
use crate::protocol::reader::PacketReader;
use crate::protocol::writer::PacketWriter;
use crate::value::Value;

/// Timestamps count microseconds from this instant.
pub const EPOCH: OffsetDateTime = datetime!(2000-01-01 0:00 UTC);
const LOCAL_EPOCH: PrimitiveDateTime = datetime!(2000-01-01 0:00);

/// Conversion between an inner scalar value and its outward type.
pub struct ScalarConverter {
    /// Name used in error messages
    pub name: &'static str,
    /// Inner value to outward value
    pub to_outer: fn(Value) -> Result<Value>,
    /// Outward value to inner value
    pub to_inner: fn(&Value) -> Result<Value>,
}

impl std::fmt::Debug for ScalarConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ScalarConverter").field(&self.name).finish()
    }
}

/// `std::datetime` as `time::OffsetDateTime`.
pub static DATETIME: ScalarConverter = ScalarConverter {
    name: "datetime",
    to_outer: |inner| {
        let offset = micros_of(&inner)?;
        EPOCH
            .checked_add(offset)
            .map(Value::DateTime)
            .ok_or_else(|| Error::Decode(format!("datetime out of range: {}", offset)))
    },
    to_inner: |outer| match outer {
        Value::DateTime(dt) => Ok(Value::Duration(*dt - EPOCH)),
        other => Err(Error::Encode(format!(
            "datetime codec cannot encode a {} value",
            other.kind()
        ))),
    },
};

/// `cal::local_datetime` as `time::PrimitiveDateTime`.
pub static LOCAL_DATETIME: ScalarConverter = ScalarConverter {
    name: "local_datetime",
    to_outer: |inner| {
        let offset = micros_of(&inner)?;
        LOCAL_EPOCH
            .checked_add(offset)
            .map(Value::LocalDateTime)
            .ok_or_else(|| Error::Decode(format!("local_datetime out of range: {}", offset)))
    },
    to_inner: |outer| match outer {
        Value::LocalDateTime(dt) => Ok(Value::Duration(*dt - LOCAL_EPOCH)),
        other => Err(Error::Encode(format!(
            "local_datetime codec cannot encode a {} value",
            other.kind()
        ))),
    },
};

/// `std::datetime` as `chrono::DateTime<Utc>`.
#[cfg(feature = "with-chrono")]
pub static CHRONO_DATETIME: ScalarConverter = ScalarConverter {
    name: "chrono datetime",
    to_outer: |inner| {
        let offset = micros_of(&inner)?;
        let micros = i64::try_from(offset.whole_microseconds())
            .map_err(|e| Error::decode("chrono datetime", e))?;
        chrono_epoch()?
            .checked_add_signed(chrono::TimeDelta::microseconds(micros))
            .map(Value::ChronoDateTime)
            .ok_or_else(|| Error::Decode(format!("chrono datetime out of range: {}", micros)))
    },
    to_inner: |outer| match outer {
        Value::ChronoDateTime(dt) => {
            let micros = (*dt - chrono_epoch()?)
                .num_microseconds()
                .ok_or_else(|| Error::Encode(format!("datetime out of range: {}", dt)))?;
            Ok(Value::Duration(time::Duration::microseconds(micros)))
        }
        other => Err(Error::Encode(format!(
            "chrono datetime codec cannot encode a {} value",
            other.kind()
        ))),
    },
};

#[cfg(feature = "with-chrono")]
fn chrono_epoch() -> Result<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::from_timestamp(EPOCH.unix_timestamp(), 0)
        .ok_or_else(|| Error::Unsupported("chrono epoch out of range".into()))
}

fn micros_of(inner: &Value) -> Result<time::Duration> {
    match inner {
        Value::Duration(d) => Ok(*d),
        other => Err(Error::Decode(format!(
            "expected a microsecond count, got {}",
            other.kind()
        ))),
    }
}

/// Adapts an inner scalar codec to an outward type.
#[derive(Debug, Clone)]
pub struct CompositeScalarCodec {
    /// Type id of the composite scalar
    pub id: Uuid,
    /// Scalar codec holding the wire representation
    pub inner: Arc<Codec>,
    /// Conversion between inner and outward values
    pub converter: &'static ScalarConverter,
}

impl CompositeScalarCodec {
    /// Create a new composite scalar. `inner` must be a scalar codec.
    pub fn new(id: Uuid, inner: Arc<Codec>, converter: &'static ScalarConverter) -> Result<Self> {
        if !inner.is_scalar() {
            return Err(Error::UnsupportedShape {
                type_id: id,
                reason: format!(
                    "{} adapter needs a scalar inner codec, got {}",
                    converter.name,
                    inner.type_id()
                ),
            });
        }
        Ok(Self {
            id,
            inner,
            converter,
        })
    }

    /// Decode through the inner codec; absent stays absent.
    pub fn decode(&self, reader: &mut PacketReader) -> Result<Option<Value>> {
        match self.inner.decode(reader)? {
            Some(inner) => (self.converter.to_outer)(inner).map(Some),
            None => Ok(None),
        }
    }

    /// Convert to the inner representation and encode it.
    pub fn encode(&self, writer: &mut PacketWriter<'_>, value: Option<&Value>) -> Result<()> {
        let Some(value) = value else {
            return Ok(());
        };
        let inner = (self.converter.to_inner)(value)?;
        self.inner.encode(writer, Some(&inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codecs::scalar::{base_scalar, std_id};
    use bytes::Bytes;

    fn datetime_codec() -> Arc<Codec> {
        base_scalar(std_id::DATETIME).unwrap()
    }

    #[test]
    fn test_epoch_is_zero() {
        let bytes = datetime_codec()
            .encode_to_vec(Some(&Value::DateTime(EPOCH)))
            .unwrap();
        assert_eq!(bytes, vec![0; 16]);
    }

    #[test]
    fn test_one_second_after_epoch() {
        let value = Value::DateTime(EPOCH + time::Duration::seconds(1));
        let bytes = datetime_codec().encode_to_vec(Some(&value)).unwrap();
        assert_eq!(&bytes[..8], &1_000_000_i64.to_be_bytes());
        assert_eq!(&bytes[8..], &[0; 8]);

        let decoded = datetime_codec()
            .decode_bytes(Some(Bytes::from(bytes)))
            .unwrap();
        assert_eq!(decoded, Some(value));
    }

    #[test]
    fn test_legacy_fields_ignored() {
        let mut data = 1_000_000_i64.to_be_bytes().to_vec();
        data.extend_from_slice(&7_i32.to_be_bytes());
        data.extend_from_slice(&(-3_i32).to_be_bytes());
        let decoded = datetime_codec()
            .decode_bytes(Some(Bytes::from(data)))
            .unwrap();
        assert_eq!(
            decoded,
            Some(Value::DateTime(datetime!(2000-01-01 0:00:01 UTC)))
        );
    }

    #[test]
    fn test_absent_short_circuits() {
        assert_eq!(datetime_codec().decode_bytes(None).unwrap(), None);
        assert!(datetime_codec().encode_to_vec(None).unwrap().is_empty());
    }

    #[test]
    fn test_local_datetime_round_trip() {
        let codec = base_scalar(std_id::LOCAL_DATETIME).unwrap();
        let value = Value::LocalDateTime(datetime!(1999-12-31 23:59:59.5));
        let bytes = codec.encode_to_vec(Some(&value)).unwrap();
        assert_eq!(&bytes[..8], &(-500_000_i64).to_be_bytes());
        assert_eq!(
            codec.decode_bytes(Some(Bytes::from(bytes))).unwrap(),
            Some(value)
        );
    }

    #[test]
    fn test_adapters_share_inner_node() {
        let (Codec::CompositeScalar(a), Codec::CompositeScalar(b)) = (
            &*datetime_codec(),
            &*base_scalar(std_id::LOCAL_DATETIME).unwrap(),
        ) else {
            panic!("expected composite codecs");
        };
        assert!(Arc::ptr_eq(&a.inner, &b.inner));
        assert!(Arc::ptr_eq(
            &a.inner,
            &base_scalar(std_id::DURATION).unwrap()
        ));
    }

    #[test]
    fn test_wrong_outer_type() {
        let err = datetime_codec()
            .encode_to_vec(Some(&Value::Int64(0)))
            .unwrap_err();
        assert!(matches!(err, Error::Encode(_)));
    }

    #[test]
    fn test_non_scalar_inner_rejected() {
        let set = Arc::new(Codec::Set(crate::codecs::SetCodec::new(
            Uuid::from_u128(1),
            base_scalar(std_id::INT64).unwrap(),
        )));
        let err = CompositeScalarCodec::new(Uuid::from_u128(2), set, &DATETIME).unwrap_err();
        assert!(matches!(err, Error::UnsupportedShape { .. }));
    }

    #[cfg(feature = "with-chrono")]
    #[test]
    fn test_chrono_adapter() {
        let codec = crate::codecs::scalar::chrono_datetime();
        let value = Value::ChronoDateTime(chrono_epoch().unwrap() + chrono::TimeDelta::seconds(1));
        let bytes = codec.encode_to_vec(Some(&value)).unwrap();
        assert_eq!(&bytes[..8], &1_000_000_i64.to_be_bytes());
        assert_eq!(
            codec.decode_bytes(Some(Bytes::from(bytes))).unwrap(),
            Some(value)
        );
    }
}
