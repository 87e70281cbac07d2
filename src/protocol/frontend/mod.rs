//! EdgeDB frontend (client → server) messages.

pub mod auth;
pub mod control;
pub mod startup;

pub use auth::{SaslInitialResponse, SaslResponse, ScramClient};
pub use control::{Flush, RestoreEof, Sync, write_flush, write_sync};
pub use startup::{ClientHandshake, Terminate, write_terminate};

/// Frontend message type bytes.
pub mod msg_type {
    /// ClientHandshake
    pub const CLIENT_HANDSHAKE: u8 = b'V';
    /// AuthenticationSASLInitialResponse
    pub const SASL_INITIAL_RESPONSE: u8 = b'p';
    /// AuthenticationSASLResponse
    pub const SASL_RESPONSE: u8 = b'r';
    /// Sync
    pub const SYNC: u8 = b'S';
    /// Flush
    pub const FLUSH: u8 = b'H';
    /// Terminate
    pub const TERMINATE: u8 = b'X';
    /// RestoreEof
    pub const RESTORE_EOF: u8 = b'.';
}
