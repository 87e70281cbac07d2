//! Command result and type description messages.

use bytes::Bytes;
use uuid::Uuid;

use crate::error::Result;
use crate::protocol::frame::Receivable;
use crate::protocol::reader::PacketReader;
use crate::protocol::types::{Annotation, Capability, Cardinality, IntWidth};

/// CommandComplete message - a command finished.
#[derive(Debug, Clone)]
pub struct CommandComplete {
    /// Message annotations
    pub annotations: Vec<Annotation>,
    /// Capabilities the command used
    pub capabilities: Vec<Capability>,
    /// Command status, e.g. "SELECT"
    pub status: String,
    /// Type id describing `state_data`
    pub state_typedesc_id: Uuid,
    /// Encoded session state, retained from the inbound buffer
    pub state_data: Option<Bytes>,
}

impl Receivable for CommandComplete {
    const OPCODE: u8 = super::msg_type::COMMAND_COMPLETE;

    fn read(reader: &mut PacketReader) -> Result<Self> {
        let annotations = reader.read_annotations()?;
        let capabilities = reader.read_flags(IntWidth::U64)?;
        let status = reader.read_string()?;
        let state_typedesc_id = reader.read_uuid()?;
        let state_data = reader.read_byte_array()?;
        Ok(Self {
            annotations,
            capabilities,
            status,
            state_typedesc_id,
            state_data,
        })
    }
}

/// StateDataDescription message - describes the session state type.
#[derive(Debug, Clone)]
pub struct StateDataDescription {
    /// Root type id of the state descriptor stream
    pub typedesc_id: Uuid,
    /// Raw descriptor stream
    pub typedesc: Bytes,
}

impl Receivable for StateDataDescription {
    const OPCODE: u8 = super::msg_type::STATE_DATA_DESCRIPTION;

    fn read(reader: &mut PacketReader) -> Result<Self> {
        let typedesc_id = reader.read_uuid()?;
        let typedesc = reader.read_byte_array()?.unwrap_or_default();
        Ok(Self {
            typedesc_id,
            typedesc,
        })
    }
}

/// CommandDataDescription message - input and output types of a command.
#[derive(Debug, Clone)]
pub struct CommandDataDescription {
    /// Message annotations
    pub annotations: Vec<Annotation>,
    /// Capabilities the command needs
    pub capabilities: Vec<Capability>,
    /// Cardinality of the result
    pub result_cardinality: Cardinality,
    /// Root type id of the input descriptor stream
    pub input_typedesc_id: Uuid,
    /// Raw input descriptor stream
    pub input_typedesc: Bytes,
    /// Root type id of the output descriptor stream
    pub output_typedesc_id: Uuid,
    /// Raw output descriptor stream
    pub output_typedesc: Bytes,
}

impl Receivable for CommandDataDescription {
    const OPCODE: u8 = super::msg_type::COMMAND_DATA_DESCRIPTION;

    fn read(reader: &mut PacketReader) -> Result<Self> {
        let annotations = reader.read_annotations()?;
        let capabilities = reader.read_flags(IntWidth::U64)?;
        let result_cardinality = Cardinality::from_byte(reader.read_u8()?)?;
        let input_typedesc_id = reader.read_uuid()?;
        let input_typedesc = reader.read_byte_array()?.unwrap_or_default();
        let output_typedesc_id = reader.read_uuid()?;
        let output_typedesc = reader.read_byte_array()?.unwrap_or_default();
        Ok(Self {
            annotations,
            capabilities,
            result_cardinality,
            input_typedesc_id,
            input_typedesc,
            output_typedesc_id,
            output_typedesc,
        })
    }
}

/// Data message - one or more encoded result elements.
#[derive(Debug, Clone)]
pub struct Data {
    /// Encoded elements; `None` is an absent value
    pub elements: Vec<Option<Bytes>>,
}

impl Receivable for Data {
    const OPCODE: u8 = super::msg_type::DATA;

    fn read(reader: &mut PacketReader) -> Result<Self> {
        let elements = reader.read_array_of(IntWidth::U16, PacketReader::read_byte_array)?;
        Ok(Self { elements })
    }
}
