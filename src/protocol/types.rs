//! Common EdgeDB wire protocol types.

use bytes::Bytes;

use crate::error::{Error, Result};

use super::reader::PacketReader;
use super::writer::{PacketWriter, size_of_byte_array, size_of_string};

/// Size of a length/count prefix on the wire.
pub const INT_SIZE: usize = 4;
/// Size of an i64 on the wire.
pub const LONG_SIZE: usize = 8;
/// Size of an i16 on the wire.
pub const SHORT_SIZE: usize = 2;

/// Protocol version negotiated during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProtocolVersion {
    pub major: u16,
    pub minor: u16,
}

impl ProtocolVersion {
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::new(1, 0)
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Width and signedness of an integer field, used for count prefixes and
/// flag sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntWidth {
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
}

impl IntWidth {
    /// Read an integer of this width, widened to i128.
    pub fn read(self, reader: &mut PacketReader) -> Result<i128> {
        Ok(match self {
            IntWidth::U8 => reader.read_u8()?.into(),
            IntWidth::I16 => reader.read_i16()?.into(),
            IntWidth::U16 => reader.read_u16()?.into(),
            IntWidth::I32 => reader.read_i32()?.into(),
            IntWidth::U32 => reader.read_u32()?.into(),
            IntWidth::I64 => reader.read_i64()?.into(),
            IntWidth::U64 => reader.read_u64()?.into(),
        })
    }

    /// Read a non-negative element count of this width.
    pub fn read_count(self, reader: &mut PacketReader) -> Result<usize> {
        let value = self.read(reader)?;
        usize::try_from(value)
            .map_err(|e| Error::Framing(format!("invalid {self:?} element count {value}: {e}")))
    }
}

/// An enum whose variants are bit flags within an integer field.
///
/// `FLAGS` is the explicit table of `(bits, variant)` pairs; decoding keeps
/// every variant whose bits are all set in the wire value.
pub trait FlagEnum: Sized + Copy + PartialEq + 'static {
    const FLAGS: &'static [(u64, Self)];

    fn bits(self) -> u64 {
        Self::FLAGS
            .iter()
            .find_map(|(bits, flag)| (*flag == self).then_some(*bits))
            .unwrap_or(0)
    }

    /// Decode all flags covered by `value`.
    fn from_bits(value: u64) -> Vec<Self> {
        Self::FLAGS
            .iter()
            .filter(|(bits, _)| value & bits == *bits)
            .map(|(_, flag)| *flag)
            .collect()
    }

    /// Encode a set of flags into a single integer.
    fn to_bits(flags: &[Self]) -> u64 {
        flags.iter().fold(0, |acc, flag| acc | flag.bits())
    }
}

/// Server capabilities a command requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Query is not read-only
    Modifications,
    /// Query changes session configuration
    SessionConfig,
    /// Query contains transaction control commands
    Transaction,
    /// Query contains DDL
    Ddl,
    /// Query changes persistent configuration
    PersistentConfig,
}

impl FlagEnum for Capability {
    const FLAGS: &'static [(u64, Self)] = &[
        (1 << 0, Capability::Modifications),
        (1 << 1, Capability::SessionConfig),
        (1 << 2, Capability::Transaction),
        (1 << 3, Capability::Ddl),
        (1 << 4, Capability::PersistentConfig),
    ];
}

/// Transaction state indicator from ReadyForCommand message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum TransactionState {
    /// Not in a transaction block
    #[default]
    NotInTransaction = b'I',
    /// In a transaction block
    InTransaction = b'T',
    /// In a failed transaction block (commands rejected until rollback)
    InFailedTransaction = b'E',
}

impl TransactionState {
    /// Create a TransactionState from a raw byte value.
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            b'I' => Some(TransactionState::NotInTransaction),
            b'T' => Some(TransactionState::InTransaction),
            b'E' => Some(TransactionState::InFailedTransaction),
            _ => None,
        }
    }

    /// Returns true if currently in a transaction (either active or failed).
    pub fn in_transaction(self) -> bool {
        matches!(
            self,
            TransactionState::InTransaction | TransactionState::InFailedTransaction
        )
    }
}

/// Result cardinality announced by CommandDataDescription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Cardinality {
    NoResult = 0x6e,
    AtMostOne = 0x6f,
    One = 0x41,
    Many = 0x6d,
    AtLeastOne = 0x4d,
}

impl Cardinality {
    pub fn from_byte(value: u8) -> Result<Self> {
        Ok(match value {
            0x6e => Cardinality::NoResult,
            0x6f => Cardinality::AtMostOne,
            0x41 => Cardinality::One,
            0x6d => Cardinality::Many,
            0x4d => Cardinality::AtLeastOne,
            _ => {
                return Err(Error::Protocol(format!(
                    "unknown cardinality byte 0x{value:02x}"
                )));
            }
        })
    }
}

/// Message annotation (name/value pair, 16-bit counted on the wire).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub name: String,
    pub value: String,
}

impl Annotation {
    pub fn read(reader: &mut PacketReader) -> Result<Self> {
        let name = reader.read_string()?;
        let value = reader.read_string()?;
        Ok(Self { name, value })
    }

    pub fn write(&self, writer: &mut PacketWriter<'_>) -> Result<()> {
        writer.write_string(&self.name)?;
        writer.write_string(&self.value)
    }

    pub fn size(&self) -> usize {
        size_of_string(&self.name) + size_of_string(&self.value)
    }
}

/// Code/value attribute pair. The value is a retained slice of the
/// inbound payload, or absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub code: u16,
    pub value: Option<Bytes>,
}

impl KeyValue {
    pub fn read(reader: &mut PacketReader) -> Result<Self> {
        let code = reader.read_u16()?;
        let value = reader.read_byte_array()?;
        Ok(Self { code, value })
    }

    pub fn write(&self, writer: &mut PacketWriter<'_>) -> Result<()> {
        writer.write_u16(self.code)?;
        writer.write_byte_array(self.value.as_deref())
    }

    pub fn size(&self) -> usize {
        SHORT_SIZE + size_of_byte_array(self.value.as_deref())
    }
}

/// Connection parameter sent in ClientHandshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParam {
    pub name: String,
    pub value: String,
}

impl ConnectionParam {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn size(&self) -> usize {
        size_of_string(&self.name) + size_of_string(&self.value)
    }
}

/// Protocol extension with its annotations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolExtension {
    pub name: String,
    pub annotations: Vec<Annotation>,
}

impl ProtocolExtension {
    pub fn read(reader: &mut PacketReader) -> Result<Self> {
        let name = reader.read_string()?;
        let annotations = reader.read_annotations()?;
        Ok(Self { name, annotations })
    }

    pub fn write(&self, writer: &mut PacketWriter<'_>) -> Result<()> {
        writer.write_string(&self.name)?;
        writer.write_annotations(&self.annotations)
    }

    pub fn size(&self) -> usize {
        size_of_string(&self.name)
            + SHORT_SIZE
            + self.annotations.iter().map(Annotation::size).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_flags_fold_over_table() {
        let flags = Capability::from_bits(0b1_0101);
        assert_eq!(
            flags,
            vec![
                Capability::Modifications,
                Capability::Transaction,
                Capability::PersistentConfig
            ]
        );
        assert_eq!(Capability::to_bits(&flags), 0b1_0101);
        assert!(Capability::from_bits(0).is_empty());
    }

    #[test]
    fn all_bits_set_includes_every_flag() {
        assert_eq!(Capability::from_bits(u64::MAX).len(), Capability::FLAGS.len());
    }

    #[test]
    fn negative_count_is_rejected() {
        let mut reader = PacketReader::from_slice(&(-1_i32).to_be_bytes());
        let err = IntWidth::I32.read_count(&mut reader).unwrap_err();
        assert!(matches!(err, Error::Framing(_)));
    }

    #[test]
    fn transaction_state_bytes() {
        assert_eq!(
            TransactionState::from_byte(b'T'),
            Some(TransactionState::InTransaction)
        );
        assert!(TransactionState::InFailedTransaction.in_transaction());
        assert_eq!(TransactionState::from_byte(b'x'), None);
    }
}
