//! Handshake and termination messages.

use crate::error::Result;
use crate::protocol::frame::{Sendable, write_message};
use crate::protocol::types::{ConnectionParam, ProtocolExtension, ProtocolVersion, SHORT_SIZE};
use crate::protocol::writer::{PacketWriter, len_u16};

/// ClientHandshake message - first message on a connection.
#[derive(Debug, Clone)]
pub struct ClientHandshake {
    /// Requested protocol version
    pub version: ProtocolVersion,
    /// Connection parameters (`user`, `database`, `branch`, `secret_key`, ...)
    pub params: Vec<ConnectionParam>,
    /// Requested protocol extensions
    pub extensions: Vec<ProtocolExtension>,
}

impl Sendable for ClientHandshake {
    const OPCODE: u8 = super::msg_type::CLIENT_HANDSHAKE;

    fn payload_size(&self) -> usize {
        SHORT_SIZE * 2
            + SHORT_SIZE
            + self.params.iter().map(ConnectionParam::size).sum::<usize>()
            + SHORT_SIZE
            + self
                .extensions
                .iter()
                .map(ProtocolExtension::size)
                .sum::<usize>()
    }

    fn write_payload(&self, writer: &mut PacketWriter<'_>) -> Result<()> {
        writer.write_u16(self.version.major)?;
        writer.write_u16(self.version.minor)?;

        writer.write_u16(len_u16(self.params.len())?)?;
        for param in &self.params {
            writer.write_string(&param.name)?;
            writer.write_string(&param.value)?;
        }

        writer.write_u16(len_u16(self.extensions.len())?)?;
        for extension in &self.extensions {
            extension.write(writer)?;
        }
        Ok(())
    }
}

/// Terminate message - sent to cleanly close the connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct Terminate;

impl Sendable for Terminate {
    const OPCODE: u8 = super::msg_type::TERMINATE;

    fn payload_size(&self) -> usize {
        0
    }
}

/// Write a Terminate message.
pub fn write_terminate(buf: &mut Vec<u8>) -> Result<()> {
    write_message(buf, &Terminate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_handshake() {
        let msg = ClientHandshake {
            version: ProtocolVersion::new(1, 0),
            params: vec![
                ConnectionParam::new("user", "edgedb"),
                ConnectionParam::new("database", "main"),
            ],
            extensions: Vec::new(),
        };
        let mut buf = Vec::new();
        write_message(&mut buf, &msg).unwrap();

        assert_eq!(buf[0], b'V');
        let len = i32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]);
        assert_eq!(len as usize, buf.len() - 1);
        assert_eq!(len as usize, msg.payload_size() + 4);

        // major, minor, param count
        assert_eq!(&buf[5..11], &[0, 1, 0, 0, 0, 2]);
        // no extensions
        assert!(buf.ends_with(&[0, 0]));
    }

    #[test]
    fn test_terminate() {
        let mut buf = Vec::new();
        write_terminate(&mut buf).unwrap();

        assert_eq!(buf.len(), 5);
        assert_eq!(buf[0], b'X');
        assert_eq!(&buf[1..5], &4_i32.to_be_bytes());
    }
}
