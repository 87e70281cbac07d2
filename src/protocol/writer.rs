//! Typed big-endian writer with an optional payload bound.

use uuid::Uuid;

use crate::error::{Error, Result};

use super::types::{Annotation, INT_SIZE, KeyValue, SHORT_SIZE};

/// Wire size of an i32-length-prefixed string.
pub fn size_of_string(s: &str) -> usize {
    INT_SIZE + s.len()
}

/// Wire size of an i32-length-prefixed byte array (absent arrays are just the prefix).
pub fn size_of_byte_array(data: Option<&[u8]>) -> usize {
    INT_SIZE + data.map_or(0, <[u8]>::len)
}

/// Wire size of a 16-bit counted annotation list.
pub fn size_of_annotations(annotations: &[Annotation]) -> usize {
    SHORT_SIZE + annotations.iter().map(Annotation::size).sum::<usize>()
}

/// Wire size of a 16-bit counted attribute list.
pub fn size_of_attributes(attributes: &[KeyValue]) -> usize {
    SHORT_SIZE + attributes.iter().map(KeyValue::size).sum::<usize>()
}

/// Sequential writer appending to a `Vec<u8>`.
///
/// A bounded writer refuses to write past the payload size its message
/// declared, so a zero-payload message cannot emit any bytes.
pub struct PacketWriter<'a> {
    buf: &'a mut Vec<u8>,
    start: usize,
    limit: usize,
}

impl<'a> PacketWriter<'a> {
    /// Writer that may emit at most `limit` bytes.
    pub fn bounded(buf: &'a mut Vec<u8>, limit: usize) -> Self {
        let start = buf.len();
        Self { buf, start, limit }
    }

    /// Writer with no payload bound (value serialization).
    pub fn new(buf: &'a mut Vec<u8>) -> Self {
        Self::bounded(buf, usize::MAX)
    }

    /// Bytes written through this writer.
    pub fn written(&self) -> usize {
        self.buf.len() - self.start
    }

    fn reserve(&mut self, len: usize) -> Result<()> {
        if self.written().saturating_add(len) > self.limit {
            return Err(Error::Framing(format!(
                "write of {} bytes exceeds declared payload size {} ({} already written)",
                len,
                self.limit,
                self.written()
            )));
        }
        Ok(())
    }

    fn put(&mut self, data: &[u8]) -> Result<()> {
        self.reserve(data.len())?;
        self.buf.extend_from_slice(data);
        Ok(())
    }

    /// Write 1-byte unsigned integer.
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.put(&[value])
    }

    /// Write a boolean byte.
    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_u8(u8::from(value))
    }

    /// Write 2-byte big-endian signed integer.
    pub fn write_i16(&mut self, value: i16) -> Result<()> {
        self.put(&value.to_be_bytes())
    }

    /// Write 2-byte big-endian unsigned integer.
    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.put(&value.to_be_bytes())
    }

    /// Write 4-byte big-endian signed integer.
    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.put(&value.to_be_bytes())
    }

    /// Write 4-byte big-endian unsigned integer.
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.put(&value.to_be_bytes())
    }

    /// Write 8-byte big-endian signed integer.
    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        self.put(&value.to_be_bytes())
    }

    /// Write 8-byte big-endian unsigned integer.
    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.put(&value.to_be_bytes())
    }

    /// Write 4-byte big-endian float.
    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.put(&value.to_be_bytes())
    }

    /// Write 8-byte big-endian float.
    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        self.put(&value.to_be_bytes())
    }

    /// Write a UUID as two big-endian 64-bit words.
    pub fn write_uuid(&mut self, value: &Uuid) -> Result<()> {
        self.put(value.as_bytes())
    }

    /// Write raw bytes without a length prefix.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.put(data)
    }

    /// Write an i32-length-prefixed byte array; absent is written as length -1.
    pub fn write_byte_array(&mut self, data: Option<&[u8]>) -> Result<()> {
        match data {
            Some(data) => {
                self.reserve(INT_SIZE + data.len())?;
                self.write_i32(len_i32(data.len())?)?;
                self.put(data)
            }
            None => self.write_i32(-1),
        }
    }

    /// Write an i32-length-prefixed UTF-8 string.
    pub fn write_string(&mut self, s: &str) -> Result<()> {
        self.write_byte_array(Some(s.as_bytes()))
    }

    /// Write a 16-bit counted annotation list.
    pub fn write_annotations(&mut self, annotations: &[Annotation]) -> Result<()> {
        self.write_u16(len_u16(annotations.len())?)?;
        for annotation in annotations {
            annotation.write(self)?;
        }
        Ok(())
    }

    /// Write a 16-bit counted attribute list.
    pub fn write_attributes(&mut self, attributes: &[KeyValue]) -> Result<()> {
        self.write_u16(len_u16(attributes.len())?)?;
        for attribute in attributes {
            attribute.write(self)?;
        }
        Ok(())
    }

    /// Write an i32 length placeholder, run `f`, then backfill the length with
    /// the number of bytes `f` wrote.
    pub fn write_length_prefixed(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        self.write_i32(0)?;
        let at = self.buf.len();
        f(self)?;
        let len = len_i32(self.buf.len() - at)?;
        self.buf[at - INT_SIZE..at].copy_from_slice(&len.to_be_bytes());
        Ok(())
    }
}

pub(crate) fn len_i32(len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|e| Error::Encode(format!("length {len} exceeds i32: {e}")))
}

pub(crate) fn len_u16(len: usize) -> Result<u16> {
    u16::try_from(len).map_err(|e| Error::Encode(format!("count {len} exceeds u16: {e}")))
}
