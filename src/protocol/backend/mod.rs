//! EdgeDB backend (server → client) messages.

pub mod auth;
pub mod command;
pub mod error;

pub use auth::{Authentication, ParameterStatus, ReadyForCommand, ServerHandshake, ServerKeyData};
pub use command::{CommandComplete, CommandDataDescription, Data, StateDataDescription};
pub use error::{ErrorResponse, LogMessage};

use crate::error::{Error, Result};
use crate::protocol::frame::{RawMessage, Receivable};

/// Backend message type bytes.
pub mod msg_type {
    /// ServerHandshake
    pub const SERVER_HANDSHAKE: u8 = b'v';
    /// Authentication
    pub const AUTHENTICATION: u8 = b'R';
    /// ServerKeyData
    pub const SERVER_KEY_DATA: u8 = b'K';
    /// ParameterStatus
    pub const PARAMETER_STATUS: u8 = b'S';
    /// ReadyForCommand
    pub const READY_FOR_COMMAND: u8 = b'Z';
    /// ErrorResponse
    pub const ERROR_RESPONSE: u8 = b'E';
    /// LogMessage
    pub const LOG_MESSAGE: u8 = b'L';
    /// CommandComplete
    pub const COMMAND_COMPLETE: u8 = b'C';
    /// CommandDataDescription
    pub const COMMAND_DATA_DESCRIPTION: u8 = b'T';
    /// StateDataDescription
    pub const STATE_DATA_DESCRIPTION: u8 = b's';
    /// Data
    pub const DATA: u8 = b'D';
}

/// Any message the server can send.
#[derive(Debug, Clone)]
pub enum ServerMessage {
    ServerHandshake(ServerHandshake),
    Authentication(Authentication),
    ServerKeyData(ServerKeyData),
    ParameterStatus(ParameterStatus),
    ReadyForCommand(ReadyForCommand),
    ErrorResponse(ErrorResponse),
    LogMessage(LogMessage),
    CommandComplete(CommandComplete),
    CommandDataDescription(CommandDataDescription),
    StateDataDescription(StateDataDescription),
    Data(Data),
}

impl ServerMessage {
    /// Decode a raw message by its type byte.
    pub fn decode(raw: &RawMessage) -> Result<Self> {
        let payload = raw.payload.clone();
        Ok(match raw.opcode {
            msg_type::SERVER_HANDSHAKE => Self::ServerHandshake(ServerHandshake::parse(payload)?),
            msg_type::AUTHENTICATION => Self::Authentication(Authentication::parse(payload)?),
            msg_type::SERVER_KEY_DATA => Self::ServerKeyData(ServerKeyData::parse(payload)?),
            msg_type::PARAMETER_STATUS => Self::ParameterStatus(ParameterStatus::parse(payload)?),
            msg_type::READY_FOR_COMMAND => Self::ReadyForCommand(ReadyForCommand::parse(payload)?),
            msg_type::ERROR_RESPONSE => Self::ErrorResponse(ErrorResponse::parse(payload)?),
            msg_type::LOG_MESSAGE => Self::LogMessage(LogMessage::parse(payload)?),
            msg_type::COMMAND_COMPLETE => Self::CommandComplete(CommandComplete::parse(payload)?),
            msg_type::COMMAND_DATA_DESCRIPTION => {
                Self::CommandDataDescription(CommandDataDescription::parse(payload)?)
            }
            msg_type::STATE_DATA_DESCRIPTION => {
                Self::StateDataDescription(StateDataDescription::parse(payload)?)
            }
            msg_type::DATA => Self::Data(Data::parse(payload)?),
            other => {
                return Err(Error::Protocol(format!(
                    "unknown server message type '{}' (0x{:02x})",
                    other as char, other
                )));
            }
        })
    }

    /// Type byte of this message.
    pub fn opcode(&self) -> u8 {
        match self {
            Self::ServerHandshake(_) => ServerHandshake::OPCODE,
            Self::Authentication(_) => Authentication::OPCODE,
            Self::ServerKeyData(_) => ServerKeyData::OPCODE,
            Self::ParameterStatus(_) => ParameterStatus::OPCODE,
            Self::ReadyForCommand(_) => ReadyForCommand::OPCODE,
            Self::ErrorResponse(_) => ErrorResponse::OPCODE,
            Self::LogMessage(_) => LogMessage::OPCODE,
            Self::CommandComplete(_) => CommandComplete::OPCODE,
            Self::CommandDataDescription(_) => CommandDataDescription::OPCODE,
            Self::StateDataDescription(_) => StateDataDescription::OPCODE,
            Self::Data(_) => Data::OPCODE,
        }
    }

    /// Check if this is an async message (can arrive at any time).
    pub fn is_async(&self) -> bool {
        matches!(self, Self::ParameterStatus(_) | Self::LogMessage(_))
    }
}
