//! Typed big-endian reader over a bounded payload.
//!
//! EdgeDB uses big-endian (network byte order) for all integers, lengths and
//! floats. A `PacketReader` owns a reference-counted [`Bytes`] region and a
//! position inside it; byte arrays read from it are retained sub-slices of
//! the same allocation, so they stay valid after the reader is dropped.

use bytes::Bytes;
use uuid::Uuid;
use zerocopy::byteorder::big_endian::{F32, F64, I16, I32, I64, U16, U32, U64};
use zerocopy::{FromBytes, Immutable, KnownLayout, Unaligned};

use crate::error::{Error, Result};

use super::types::{Annotation, FlagEnum, IntWidth, KeyValue};

/// Sequential reader over a bounded payload.
#[derive(Debug, Clone)]
pub struct PacketReader {
    buf: Bytes,
    pos: usize,
}

impl PacketReader {
    /// Create a reader over exactly `buf`.
    pub fn new(buf: Bytes) -> Self {
        Self { buf, pos: 0 }
    }

    /// Create a reader over a copy of `data`.
    pub fn from_slice(data: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(data))
    }

    /// Bytes consumed so far, relative to the start of this reader.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Total size of the bounded region.
    pub fn size(&self) -> usize {
        self.buf.len()
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// True if no bytes remain in the bounded region.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Fail if any bytes remain unread.
    pub fn finish(&self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Framing(format!(
                "{} trailing bytes after decoding {} of {} bytes",
                self.remaining(),
                self.pos,
                self.size()
            )))
        }
    }

    /// Advance by `count` bytes without reading them.
    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.take(count, "skip").map(|_| ())
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&[u8]> {
        if self.remaining() < len {
            return Err(Error::Framing(format!(
                "{what}: need {len} bytes at offset {}, only {} remain",
                self.pos,
                self.remaining()
            )));
        }
        let start = self.pos;
        self.pos += len;
        Ok(&self.buf[start..self.pos])
    }

    #[inline]
    fn read_be<T>(&mut self, what: &str) -> Result<T>
    where
        T: FromBytes + KnownLayout + Immutable + Unaligned,
    {
        let bytes = self.take(size_of::<T>(), what)?;
        T::read_from_bytes(bytes).map_err(|e| Error::Framing(format!("{what}: {e:?}")))
    }

    /// Read 1-byte unsigned integer.
    pub fn read_u8(&mut self) -> Result<u8> {
        let bytes = self.take(1, "read_u8")?;
        Ok(bytes[0])
    }

    /// Read 1-byte signed integer.
    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(i8::from_be_bytes([self.read_u8()?]))
    }

    /// Read a boolean byte (any non-zero value is true).
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Read 2-byte big-endian signed integer.
    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_be::<I16>("read_i16")?.get())
    }

    /// Read 2-byte big-endian unsigned integer.
    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(self.read_be::<U16>("read_u16")?.get())
    }

    /// Read 4-byte big-endian signed integer.
    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_be::<I32>("read_i32")?.get())
    }

    /// Read 4-byte big-endian unsigned integer.
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(self.read_be::<U32>("read_u32")?.get())
    }

    /// Read 8-byte big-endian signed integer.
    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(self.read_be::<I64>("read_i64")?.get())
    }

    /// Read 8-byte big-endian unsigned integer.
    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(self.read_be::<U64>("read_u64")?.get())
    }

    /// Read 4-byte big-endian IEEE 754 float.
    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(self.read_be::<F32>("read_f32")?.get())
    }

    /// Read 8-byte big-endian IEEE 754 float.
    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(self.read_be::<F64>("read_f64")?.get())
    }

    /// Read a UUID as two consecutive big-endian 64-bit words.
    pub fn read_uuid(&mut self) -> Result<Uuid> {
        let high = self.read_u64()?;
        let low = self.read_u64()?;
        Ok(Uuid::from_u64_pair(high, low))
    }

    /// Read an i32-length-prefixed UTF-8 string.
    ///
    /// A zero or negative length is an empty string.
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_i32()?;
        if len <= 0 {
            return Ok(String::new());
        }
        let bytes = self.take(len as usize, "read_string")?;
        let s = simdutf8::compat::from_utf8(bytes)
            .map_err(|e| Error::decode("read_string: invalid UTF-8", e))?;
        Ok(s.to_owned())
    }

    /// Read an i32-length-prefixed byte array.
    ///
    /// A zero or negative length is absent (`None`).
    pub fn read_byte_array(&mut self) -> Result<Option<Bytes>> {
        let len = self.read_i32()?;
        if len <= 0 {
            return Ok(None);
        }
        self.read_bytes(len as usize).map(Some)
    }

    /// Read an i32-length-prefixed array or tuple element.
    ///
    /// Unlike [`read_byte_array`](Self::read_byte_array), a zero length is a
    /// present element with an empty payload (e.g. an empty string); only a
    /// negative length is absent.
    pub fn read_element(&mut self) -> Result<Option<Bytes>> {
        let len = self.read_i32()?;
        if len < 0 {
            return Ok(None);
        }
        self.read_bytes(len as usize).map(Some)
    }

    /// Read `len` bytes as a retained slice of the underlying buffer.
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        let start = self.pos;
        self.take(len, "read_bytes")?;
        Ok(self.buf.slice(start..self.pos))
    }

    /// Consume everything left in the bounded region.
    pub fn consume_remaining(&mut self) -> Bytes {
        let rest = self.buf.slice(self.pos..);
        self.pos = self.buf.len();
        rest
    }

    /// Read a count-prefixed array, the count being of `width`.
    pub fn read_array_of<T>(
        &mut self,
        width: IntWidth,
        mut read_one: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<Vec<T>> {
        let count = width.read_count(self)?;
        // Cap preallocation by what the payload could possibly hold.
        let mut out = Vec::with_capacity(count.min(self.remaining()));
        for _ in 0..count {
            out.push(read_one(self)?);
        }
        Ok(out)
    }

    /// Read a count-prefixed array of strings.
    pub fn read_string_array(&mut self, width: IntWidth) -> Result<Vec<String>> {
        self.read_array_of(width, Self::read_string)
    }

    /// Read a 16-bit counted annotation list.
    pub fn read_annotations(&mut self) -> Result<Vec<Annotation>> {
        self.read_array_of(IntWidth::U16, Annotation::read)
    }

    /// Read a 16-bit counted attribute list.
    pub fn read_attributes(&mut self) -> Result<Vec<KeyValue>> {
        self.read_array_of(IntWidth::U16, KeyValue::read)
    }

    /// Read an integer of `width` and decode every flag it fully covers.
    pub fn read_flags<F: FlagEnum>(&mut self, width: IntWidth) -> Result<Vec<F>> {
        let value = width.read(self)?;
        Ok(F::from_bits(value as u64))
    }

    /// Open a reader over the next `len` bytes and advance past them.
    pub fn sub_reader(&mut self, len: usize) -> Result<PacketReader> {
        self.read_bytes(len).map(PacketReader::new)
    }
}
