//! Error and log messages.

use bytes::Bytes;

use crate::error::{Error, Result, ServerError, attribute, severity};
use crate::protocol::frame::Receivable;
use crate::protocol::reader::PacketReader;
use crate::protocol::types::Annotation;

/// ErrorResponse message - error from server.
#[derive(Debug, Clone)]
pub struct ErrorResponse {
    /// Parsed error fields
    pub error: ServerError,
}

impl ErrorResponse {
    /// Convert to an Error.
    pub fn into_error(self) -> Error {
        Error::Server(self.error)
    }

    /// Get the error code.
    pub fn code(&self) -> u32 {
        self.error.code
    }

    /// Get the primary message.
    pub fn message(&self) -> &str {
        &self.error.message
    }

    /// Get the severity byte.
    pub fn severity(&self) -> u8 {
        self.error.severity
    }
}

impl Receivable for ErrorResponse {
    const OPCODE: u8 = super::msg_type::ERROR_RESPONSE;

    fn read(reader: &mut PacketReader) -> Result<Self> {
        let severity = reader.read_u8()?;
        let code = reader.read_u32()?;
        let message = reader.read_string()?;

        let mut attributes = Vec::new();
        for kv in reader.read_attributes()? {
            match kv.code {
                attribute::HINT
                | attribute::DETAILS
                | attribute::SERVER_TRACEBACK
                | attribute::LINE_START
                | attribute::COLUMN_START => {}
                other => {
                    tracing::debug!("Unknown error attribute: 0x{:04x}", other);
                }
            }
            attributes.push((kv.code, kv.value.unwrap_or_else(Bytes::new)));
        }

        Ok(Self {
            error: ServerError {
                severity,
                code,
                message,
                attributes,
            },
        })
    }
}

/// LogMessage message - non-fatal notice from server.
#[derive(Debug, Clone)]
pub struct LogMessage {
    /// Severity byte
    pub severity: u8,
    /// Message code
    pub code: u32,
    /// Message text
    pub text: String,
    /// Message annotations
    pub annotations: Vec<Annotation>,
}

impl LogMessage {
    /// True for WARNING and above.
    pub fn is_warning(&self) -> bool {
        self.severity >= severity::WARNING
    }
}

impl Receivable for LogMessage {
    const OPCODE: u8 = super::msg_type::LOG_MESSAGE;

    fn read(reader: &mut PacketReader) -> Result<Self> {
        let severity = reader.read_u8()?;
        let code = reader.read_u32()?;
        let text = reader.read_string()?;
        let annotations = reader.read_annotations()?;
        Ok(Self {
            severity,
            code,
            text,
            annotations,
        })
    }
}
