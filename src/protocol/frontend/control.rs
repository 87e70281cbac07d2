//! Zero-payload control messages.

use crate::error::Result;
use crate::protocol::frame::{Sendable, write_message};

/// Sync message - ends an implicit transaction and requests ReadyForCommand.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sync;

impl Sendable for Sync {
    const OPCODE: u8 = super::msg_type::SYNC;

    fn payload_size(&self) -> usize {
        0
    }
}

/// Flush message - asks the server to send any pending output.
#[derive(Debug, Clone, Copy, Default)]
pub struct Flush;

impl Sendable for Flush {
    const OPCODE: u8 = super::msg_type::FLUSH;

    fn payload_size(&self) -> usize {
        0
    }
}

/// RestoreEof message - marks the end of a restore data stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct RestoreEof;

impl Sendable for RestoreEof {
    const OPCODE: u8 = super::msg_type::RESTORE_EOF;

    fn payload_size(&self) -> usize {
        0
    }
}

/// Write a Sync message.
pub fn write_sync(buf: &mut Vec<u8>) -> Result<()> {
    write_message(buf, &Sync)
}

/// Write a Flush message.
pub fn write_flush(buf: &mut Vec<u8>) -> Result<()> {
    write_message(buf, &Flush)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync() {
        let mut buf = Vec::new();
        write_sync(&mut buf).unwrap();

        assert_eq!(buf.len(), 5);
        assert_eq!(buf[0], b'S');
        assert_eq!(&buf[1..5], &4_i32.to_be_bytes());
    }

    #[test]
    fn test_flush() {
        let mut buf = Vec::new();
        write_flush(&mut buf).unwrap();

        assert_eq!(buf, [b'H', 0, 0, 0, 4]);
    }

    #[test]
    fn test_restore_eof() {
        let mut buf = Vec::new();
        write_message(&mut buf, &RestoreEof).unwrap();

        assert_eq!(buf, [b'.', 0, 0, 0, 4]);
    }
}
