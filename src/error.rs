//! Error types for zero-edgedb.

use bytes::Bytes;
use thiserror::Error;
use uuid::Uuid;

use crate::state::auth::AuthState;

/// Result type for zero-edgedb operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error severity codes carried by ErrorResponse and LogMessage.
pub mod severity {
    pub const DEBUG: u8 = 0x14;
    pub const INFO: u8 = 0x28;
    pub const NOTICE: u8 = 0x3C;
    pub const WARNING: u8 = 0x50;
    pub const ERROR: u8 = 0x78;
    pub const FATAL: u8 = 0xC8;
    pub const PANIC: u8 = 0xFF;
}

/// Well-known error attribute codes.
pub mod attribute {
    /// Hint for fixing the error
    pub const HINT: u16 = 0x0001;
    /// Detailed error explanation
    pub const DETAILS: u16 = 0x0002;
    /// Server-side traceback
    pub const SERVER_TRACEBACK: u16 = 0x0101;
    /// Query position: start line
    pub const LINE_START: u16 = 0xFFF3;
    /// Query position: start column
    pub const COLUMN_START: u16 = 0xFFF4;
}

/// Error reported by the server in an ErrorResponse message.
#[derive(Debug, Clone, Default)]
pub struct ServerError {
    /// Severity byte (see [`severity`])
    pub severity: u8,
    /// Error code, e.g. `0x04_01_00_00` for InvalidSyntaxError
    pub code: u32,
    /// Primary error message
    pub message: String,
    /// Additional attributes keyed by attribute code
    pub attributes: Vec<(u16, Bytes)>,
}

impl ServerError {
    /// Look up an attribute by code and decode it as UTF-8.
    pub fn attribute(&self, code: u16) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(c, _)| *c == code)
            .and_then(|(_, value)| simdutf8::compat::from_utf8(value).ok())
    }

    /// Hint attribute, if present.
    pub fn hint(&self) -> Option<&str> {
        self.attribute(attribute::HINT)
    }

    /// Details attribute, if present.
    pub fn details(&self) -> Option<&str> {
        self.attribute(attribute::DETAILS)
    }

    /// Returns true if the severity is FATAL or PANIC.
    pub fn is_fatal(&self) -> bool {
        self.severity >= severity::FATAL
    }
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code 0x{:08X})", self.message, self.code)?;
        if let Some(details) = self.details() {
            write!(f, "\nDETAILS: {}", details)?;
        }
        if let Some(hint) = self.hint() {
            write!(f, "\nHINT: {}", hint)?;
        }
        Ok(())
    }
}

/// Error type for zero-edgedb.
#[derive(Debug, Error)]
pub enum Error {
    /// Server error response
    #[error("EdgeDB error: {0}")]
    Server(ServerError),

    /// Declared length inconsistent with the bytes available or consumed
    #[error("Framing error: {0}")]
    Framing(String),

    /// Shape that this client cannot encode or decode
    #[error("Unsupported shape for type {type_id}: {reason}")]
    UnsupportedShape { type_id: Uuid, reason: String },

    /// Element count or enum member outside what the type declares
    #[error("Cardinality error for type {type_id}: {message}")]
    Cardinality { type_id: Uuid, message: String },

    /// Authentication message received in the wrong state
    #[error("Unexpected authentication message in state {state:?}: {message}")]
    ProtocolSequence { state: AuthState, message: String },

    /// Type descriptor could not be turned into a codec
    #[error("Cannot resolve type descriptor {type_id}: {message}")]
    Resolution { type_id: Uuid, message: String },

    /// Malformed value bytes
    #[error("Decode error: {0}")]
    Decode(String),

    /// Value cannot be encoded by the codec it was handed to
    #[error("Encode error: {0}")]
    Encode(String),

    /// Protocol error (unknown opcode, unknown auth status, etc.)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Unsupported feature
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl Error {
    /// Returns true if the error indicates the connection is broken and cannot be reused.
    pub fn is_connection_broken(&self) -> bool {
        match self {
            Error::Framing(_) | Error::ProtocolSequence { .. } | Error::Protocol(_) => true,
            Error::Server(err) => err.is_fatal(),
            _ => false,
        }
    }

    /// Get the server error code if this is a server error.
    pub fn server_code(&self) -> Option<u32> {
        match self {
            Error::Server(err) => Some(err.code),
            _ => None,
        }
    }

    pub(crate) fn decode(what: &str, err: impl std::fmt::Display) -> Self {
        Error::Decode(format!("{what}: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_display_includes_attributes() {
        let err = ServerError {
            severity: severity::ERROR,
            code: 0x0401_0000,
            message: "Unexpected 'SELEC'".into(),
            attributes: vec![
                (attribute::HINT, Bytes::from_static(b"did you mean SELECT?")),
                (attribute::LINE_START, Bytes::from_static(b"1")),
            ],
        };
        let text = err.to_string();
        assert!(text.starts_with("Unexpected 'SELEC' (code 0x04010000)"));
        assert!(text.contains("HINT: did you mean SELECT?"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn broken_connection_classification() {
        assert!(Error::Framing("short".into()).is_connection_broken());
        assert!(
            Error::Server(ServerError {
                severity: severity::FATAL,
                ..Default::default()
            })
            .is_connection_broken()
        );
        assert!(!Error::Decode("bad".into()).is_connection_broken());
    }
}
