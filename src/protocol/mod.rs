//! EdgeDB binary protocol implementation.
//!
//! This module contains the low-level protocol encoding and decoding.
//!
//! # Structure
//!
//! - `reader` / `writer`: Typed big-endian cursor primitives
//! - `frame`: Message framing (`Sendable`, `Receivable`, `FrameDecoder`)
//! - `backend`: Server → Client messages (parsing)
//! - `frontend`: Client → Server messages (encoding)
//! - `types`: Common protocol types (annotations, flags, transaction state)

pub mod backend;
pub mod frame;
pub mod frontend;
pub mod reader;
pub mod types;
pub mod writer;

// Re-export commonly used types
pub use backend::ServerMessage;
pub use frame::{FrameDecoder, RawMessage, Receivable, Sendable, write_message};
pub use reader::PacketReader;
pub use types::{Capability, FlagEnum, IntWidth, ProtocolVersion, TransactionState};
pub use writer::PacketWriter;
