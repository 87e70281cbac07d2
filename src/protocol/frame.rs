//! Message framing.
//!
//! EdgeDB message format:
//! - Type byte (1 byte) - NOT included in length
//! - Length (4 bytes) - includes itself
//! - Payload (Length - 4 bytes)

use bytes::{Buf, Bytes, BytesMut};

use crate::error::{Error, Result};

use super::reader::PacketReader;
use super::types::INT_SIZE;
use super::writer::{PacketWriter, len_i32};

/// Size of the frame header (type byte + length).
pub const HEADER_SIZE: usize = 1 + INT_SIZE;

/// Client → server message.
pub trait Sendable {
    /// Message type byte.
    const OPCODE: u8;

    /// Exact payload size in bytes, excluding type byte and length.
    fn payload_size(&self) -> usize;

    /// Serialize the payload. Zero-payload messages keep the default.
    fn write_payload(&self, _writer: &mut PacketWriter<'_>) -> Result<()> {
        Ok(())
    }
}

/// Server → client message, parsed from a payload bounded to exactly its
/// declared length.
pub trait Receivable: Sized {
    /// Message type byte.
    const OPCODE: u8;

    /// Read the fields in wire order.
    fn read(reader: &mut PacketReader) -> Result<Self>;

    /// Parse a whole payload, failing on overruns and trailing bytes.
    fn parse(payload: Bytes) -> Result<Self> {
        let mut reader = PacketReader::new(payload);
        let message = Self::read(&mut reader)?;
        reader.finish()?;
        Ok(message)
    }
}

/// Append a framed message (opcode, length, payload) to `buf`.
///
/// On error `buf` is truncated back to its original length.
pub fn write_message<S: Sendable + ?Sized>(buf: &mut Vec<u8>, message: &S) -> Result<()> {
    let origin = buf.len();
    let result = write_framed(buf, message);
    if result.is_err() {
        buf.truncate(origin);
    }
    result
}

fn write_framed<S: Sendable + ?Sized>(buf: &mut Vec<u8>, message: &S) -> Result<()> {
    let size = message.payload_size();
    buf.push(S::OPCODE);
    buf.extend_from_slice(&len_i32(size + INT_SIZE)?.to_be_bytes());

    let mut writer = PacketWriter::bounded(buf, size);
    message.write_payload(&mut writer)?;
    if writer.written() != size {
        return Err(Error::Framing(format!(
            "message 0x{:02x} declared {} payload bytes but wrote {}",
            S::OPCODE,
            size,
            writer.written()
        )));
    }
    Ok(())
}

/// Raw message from the server: type byte plus the payload after the length field.
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// Message type byte
    pub opcode: u8,
    /// Message payload (after length field)
    pub payload: Bytes,
}

impl RawMessage {
    /// Create a new RawMessage.
    pub fn new(opcode: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            opcode,
            payload: payload.into(),
        }
    }

    /// Parse the payload as `R`, checking the type byte first.
    pub fn parse<R: Receivable>(&self) -> Result<R> {
        if self.opcode != R::OPCODE {
            return Err(Error::Protocol(format!(
                "expected message '{}', got '{}'",
                R::OPCODE as char,
                self.opcode as char
            )));
        }
        R::parse(self.payload.clone())
    }
}

/// Splits an inbound byte stream into whole messages.
///
/// Bytes are appended with [`FrameDecoder::extend`]; [`FrameDecoder::next_message`]
/// yields a message only once its full declared length is buffered.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
    max_message_len: usize,
}

impl FrameDecoder {
    /// Create a new decoder rejecting messages longer than `max_message_len`,
    /// length field included.
    pub fn new(max_message_len: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(8192),
            max_message_len,
        }
    }

    /// Append bytes read from the transport.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Number of buffered bytes not yet returned as messages.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Take the next complete message, or `None` if more bytes are needed.
    pub fn next_message(&mut self) -> Result<Option<RawMessage>> {
        if self.buf.len() < HEADER_SIZE {
            return Ok(None);
        }
        let opcode = self.buf[0];
        let declared = i32::from_be_bytes([self.buf[1], self.buf[2], self.buf[3], self.buf[4]]);
        let declared = usize::try_from(declared)
            .ok()
            .filter(|len| *len >= INT_SIZE)
            .ok_or_else(|| {
                Error::Framing(format!(
                    "message '{}' declares invalid length {}",
                    opcode as char, declared
                ))
            })?;
        if declared > self.max_message_len {
            return Err(Error::Framing(format!(
                "message '{}' of {} bytes exceeds limit {}",
                opcode as char, declared, self.max_message_len
            )));
        }
        if self.buf.len() < 1 + declared {
            return Ok(None);
        }

        self.buf.advance(HEADER_SIZE);
        let payload = self.buf.split_to(declared - INT_SIZE).freeze();
        tracing::trace!(
            opcode = %(opcode as char),
            len = payload.len(),
            "received message"
        );
        Ok(Some(RawMessage { opcode, payload }))
    }
}
