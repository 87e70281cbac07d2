//! Handshake and authentication backend messages.

use bytes::Bytes;
use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::error::{Error, Result};
use crate::protocol::frame::Receivable;
use crate::protocol::reader::PacketReader;
use crate::protocol::types::{
    Annotation, IntWidth, ProtocolExtension, ProtocolVersion, TransactionState,
};

/// Authentication status constants.
pub mod auth_status {
    pub const OK: u32 = 0x00;
    pub const SASL: u32 = 0x0A;
    pub const SASL_CONTINUE: u32 = 0x0B;
    pub const SASL_FINAL: u32 = 0x0C;
}

/// ServerHandshake message - the server's counter-offer of protocol version.
#[derive(Debug, Clone)]
pub struct ServerHandshake {
    /// Highest protocol version the server supports
    pub version: ProtocolVersion,
    /// Protocol extensions the server accepted
    pub extensions: Vec<ProtocolExtension>,
}

impl Receivable for ServerHandshake {
    const OPCODE: u8 = super::msg_type::SERVER_HANDSHAKE;

    fn read(reader: &mut PacketReader) -> Result<Self> {
        let major = reader.read_u16()?;
        let minor = reader.read_u16()?;
        let extensions = reader.read_array_of(IntWidth::U16, ProtocolExtension::read)?;
        Ok(Self {
            version: ProtocolVersion::new(major, minor),
            extensions,
        })
    }
}

/// Authentication message from the server.
#[derive(Debug, Clone)]
pub enum Authentication {
    /// Authentication successful
    Ok,
    /// SASL authentication required (with list of mechanisms)
    Sasl { methods: Vec<String> },
    /// SASL continue (with server-first-message)
    SaslContinue { data: Bytes },
    /// SASL final (with server-final-message)
    SaslFinal { data: Bytes },
}

impl Authentication {
    /// Short name used in state machine diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Authentication::Ok => "AuthenticationOK",
            Authentication::Sasl { .. } => "AuthenticationSASL",
            Authentication::SaslContinue { .. } => "AuthenticationSASLContinue",
            Authentication::SaslFinal { .. } => "AuthenticationSASLFinal",
        }
    }
}

impl Receivable for Authentication {
    const OPCODE: u8 = super::msg_type::AUTHENTICATION;

    fn read(reader: &mut PacketReader) -> Result<Self> {
        let status = reader.read_u32()?;

        match status {
            auth_status::OK => Ok(Authentication::Ok),
            auth_status::SASL => {
                let methods = reader.read_string_array(IntWidth::U32)?;
                Ok(Authentication::Sasl { methods })
            }
            auth_status::SASL_CONTINUE => Ok(Authentication::SaslContinue {
                data: reader.read_byte_array()?.unwrap_or_default(),
            }),
            auth_status::SASL_FINAL => Ok(Authentication::SaslFinal {
                data: reader.read_byte_array()?.unwrap_or_default(),
            }),
            _ => Err(Error::Protocol(format!(
                "Unknown authentication status: {}",
                status
            ))),
        }
    }
}

/// ServerKeyData message - opaque key for cancellation.
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct ServerKeyData {
    pub data: [u8; 32],
}

impl Receivable for ServerKeyData {
    const OPCODE: u8 = super::msg_type::SERVER_KEY_DATA;

    fn read(reader: &mut PacketReader) -> Result<Self> {
        let bytes = reader.read_bytes(size_of::<Self>())?;
        Self::read_from_bytes(&bytes).map_err(|e| Error::Framing(format!("ServerKeyData: {e:?}")))
    }
}

/// ParameterStatus message - server parameter name and raw value.
#[derive(Debug, Clone)]
pub struct ParameterStatus {
    /// Parameter name
    pub name: String,
    /// Parameter value (encoding depends on the parameter)
    pub value: Bytes,
}

impl Receivable for ParameterStatus {
    const OPCODE: u8 = super::msg_type::PARAMETER_STATUS;

    fn read(reader: &mut PacketReader) -> Result<Self> {
        let name = reader.read_string()?;
        let value = reader.read_byte_array()?.unwrap_or_default();
        Ok(Self { name, value })
    }
}

/// ReadyForCommand message - server is ready for a new command.
#[derive(Debug, Clone)]
pub struct ReadyForCommand {
    /// Message annotations
    pub annotations: Vec<Annotation>,
    /// Transaction state byte
    pub state: u8,
}

impl ReadyForCommand {
    /// Get the transaction state.
    pub fn transaction_state(&self) -> Option<TransactionState> {
        TransactionState::from_byte(self.state)
    }
}

impl Receivable for ReadyForCommand {
    const OPCODE: u8 = super::msg_type::READY_FOR_COMMAND;

    fn read(reader: &mut PacketReader) -> Result<Self> {
        let annotations = reader.read_annotations()?;
        let state = reader.read_u8()?;
        Ok(Self { annotations, state })
    }
}
