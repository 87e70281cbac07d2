//! Type descriptor stream parsing.
//!
//! The server describes the types of command inputs, outputs and session
//! state as a flat stream of descriptors. Each descriptor carries a tag, a
//! type id and a tag-specific payload; references to other types are 16-bit
//! positions of earlier descriptors in the same stream.

use bytes::Bytes;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::protocol::reader::PacketReader;
use crate::protocol::types::{Cardinality, IntWidth};

/// Descriptor tags.
pub mod tag {
    pub const SET: u8 = 0;
    pub const OBJECT_SHAPE: u8 = 1;
    pub const BASE_SCALAR: u8 = 2;
    pub const SCALAR: u8 = 3;
    pub const TUPLE: u8 = 4;
    pub const NAMED_TUPLE: u8 = 5;
    pub const ARRAY: u8 = 6;
    pub const ENUMERATION: u8 = 7;
    pub const INPUT_SHAPE: u8 = 8;
    pub const RANGE: u8 = 9;
    /// Tags from here up are type annotations.
    pub const ANNOTATION_MIN: u8 = 0x80;
}

/// Element of an object or input shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeElement {
    pub flags: u32,
    pub cardinality: Cardinality,
    pub name: String,
    pub type_pos: u16,
}

impl ShapeElement {
    fn read(reader: &mut PacketReader) -> Result<Self> {
        Ok(Self {
            flags: reader.read_u32()?,
            cardinality: Cardinality::from_byte(reader.read_u8()?)?,
            name: reader.read_string()?,
            type_pos: reader.read_u16()?,
        })
    }
}

/// Element of a named tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct TupleElement {
    pub name: String,
    pub type_pos: u16,
}

/// Enumeration type: an id and its ordered member names.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumerationTypeDescriptor {
    pub id: Uuid,
    pub members: Vec<String>,
}

/// A single parsed descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDescriptor {
    Set {
        id: Uuid,
        type_pos: u16,
    },
    ObjectShape {
        id: Uuid,
        elements: Vec<ShapeElement>,
    },
    BaseScalar {
        id: Uuid,
    },
    Scalar {
        id: Uuid,
        base_type_pos: u16,
    },
    Tuple {
        id: Uuid,
        element_types: Vec<u16>,
    },
    NamedTuple {
        id: Uuid,
        elements: Vec<TupleElement>,
    },
    Array {
        id: Uuid,
        type_pos: u16,
        /// Declared dimension lengths; `None` for unbounded (-1)
        dimensions: Vec<Option<u32>>,
    },
    Enumeration(EnumerationTypeDescriptor),
    InputShape {
        id: Uuid,
        elements: Vec<ShapeElement>,
    },
    Range {
        id: Uuid,
        type_pos: u16,
    },
    /// Informational annotation (e.g. a type name); still takes a position.
    TypeAnnotation {
        tag: u8,
        id: Uuid,
        annotation: String,
    },
}

impl TypeDescriptor {
    pub fn id(&self) -> Uuid {
        match self {
            TypeDescriptor::Set { id, .. }
            | TypeDescriptor::ObjectShape { id, .. }
            | TypeDescriptor::BaseScalar { id }
            | TypeDescriptor::Scalar { id, .. }
            | TypeDescriptor::Tuple { id, .. }
            | TypeDescriptor::NamedTuple { id, .. }
            | TypeDescriptor::Array { id, .. }
            | TypeDescriptor::InputShape { id, .. }
            | TypeDescriptor::Range { id, .. }
            | TypeDescriptor::TypeAnnotation { id, .. } => *id,
            TypeDescriptor::Enumeration(e) => e.id,
        }
    }

    pub fn is_annotation(&self) -> bool {
        matches!(self, TypeDescriptor::TypeAnnotation { .. })
    }

    /// Read one descriptor.
    pub fn read(reader: &mut PacketReader) -> Result<Self> {
        let tag = reader.read_u8()?;
        let id = reader.read_uuid()?;
        Ok(match tag {
            tag::SET => TypeDescriptor::Set {
                id,
                type_pos: reader.read_u16()?,
            },
            tag::OBJECT_SHAPE => TypeDescriptor::ObjectShape {
                id,
                elements: reader.read_array_of(IntWidth::U16, ShapeElement::read)?,
            },
            tag::BASE_SCALAR => TypeDescriptor::BaseScalar { id },
            tag::SCALAR => TypeDescriptor::Scalar {
                id,
                base_type_pos: reader.read_u16()?,
            },
            tag::TUPLE => TypeDescriptor::Tuple {
                id,
                element_types: reader.read_array_of(IntWidth::U16, PacketReader::read_u16)?,
            },
            tag::NAMED_TUPLE => TypeDescriptor::NamedTuple {
                id,
                elements: reader.read_array_of(IntWidth::U16, |r| {
                    Ok(TupleElement {
                        name: r.read_string()?,
                        type_pos: r.read_u16()?,
                    })
                })?,
            },
            tag::ARRAY => TypeDescriptor::Array {
                id,
                type_pos: reader.read_u16()?,
                dimensions: reader.read_array_of(IntWidth::U16, |r| {
                    Ok(u32::try_from(r.read_i32()?).ok())
                })?,
            },
            tag::ENUMERATION => TypeDescriptor::Enumeration(EnumerationTypeDescriptor {
                id,
                members: reader.read_string_array(IntWidth::U16)?,
            }),
            tag::INPUT_SHAPE => TypeDescriptor::InputShape {
                id,
                elements: reader.read_array_of(IntWidth::U16, ShapeElement::read)?,
            },
            tag::RANGE => TypeDescriptor::Range {
                id,
                type_pos: reader.read_u16()?,
            },
            tag if tag >= tag::ANNOTATION_MIN => TypeDescriptor::TypeAnnotation {
                tag,
                id,
                annotation: reader.read_string()?,
            },
            other => {
                return Err(Error::Resolution {
                    type_id: id,
                    message: format!("unknown descriptor tag 0x{:02x}", other),
                });
            }
        })
    }
}

/// Parse a whole descriptor stream in wire order.
pub fn parse_stream(data: Bytes) -> Result<Vec<TypeDescriptor>> {
    let mut reader = PacketReader::new(data);
    let mut descriptors = Vec::new();
    while !reader.is_empty() {
        descriptors.push(TypeDescriptor::read(&mut reader)?);
    }
    Ok(descriptors)
}

/// Builders for descriptor streams, shared by tests across the crate.
#[cfg(test)]
pub(crate) mod build {
    use uuid::Uuid;

    use super::tag;

    fn head(out: &mut Vec<u8>, tag: u8, id: Uuid) {
        out.push(tag);
        out.extend_from_slice(id.as_bytes());
    }

    fn string(out: &mut Vec<u8>, s: &str) {
        out.extend_from_slice(&(s.len() as i32).to_be_bytes());
        out.extend_from_slice(s.as_bytes());
    }

    pub fn base_scalar(out: &mut Vec<u8>, id: Uuid) {
        head(out, tag::BASE_SCALAR, id);
    }

    pub fn scalar(out: &mut Vec<u8>, id: Uuid, base_pos: u16) {
        head(out, tag::SCALAR, id);
        out.extend_from_slice(&base_pos.to_be_bytes());
    }

    pub fn set(out: &mut Vec<u8>, id: Uuid, type_pos: u16) {
        head(out, tag::SET, id);
        out.extend_from_slice(&type_pos.to_be_bytes());
    }

    pub fn array(out: &mut Vec<u8>, id: Uuid, type_pos: u16, dimensions: &[i32]) {
        head(out, tag::ARRAY, id);
        out.extend_from_slice(&type_pos.to_be_bytes());
        out.extend_from_slice(&(dimensions.len() as u16).to_be_bytes());
        for d in dimensions {
            out.extend_from_slice(&d.to_be_bytes());
        }
    }

    pub fn tuple(out: &mut Vec<u8>, id: Uuid, element_types: &[u16]) {
        head(out, tag::TUPLE, id);
        out.extend_from_slice(&(element_types.len() as u16).to_be_bytes());
        for pos in element_types {
            out.extend_from_slice(&pos.to_be_bytes());
        }
    }

    pub fn enumeration(out: &mut Vec<u8>, id: Uuid, members: &[&str]) {
        head(out, tag::ENUMERATION, id);
        out.extend_from_slice(&(members.len() as u16).to_be_bytes());
        for m in members {
            string(out, m);
        }
    }

    /// Input shape with `(name, type_pos)` elements, all AT_MOST_ONE.
    pub fn input_shape(out: &mut Vec<u8>, id: Uuid, elements: &[(&str, u16)]) {
        head(out, tag::INPUT_SHAPE, id);
        out.extend_from_slice(&(elements.len() as u16).to_be_bytes());
        for (name, pos) in elements {
            out.extend_from_slice(&0_u32.to_be_bytes());
            out.push(0x6f);
            string(out, name);
            out.extend_from_slice(&pos.to_be_bytes());
        }
    }

    pub fn annotation(out: &mut Vec<u8>, id: Uuid, text: &str) {
        head(out, 0xff, id);
        string(out, text);
    }
}
