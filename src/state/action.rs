//! Action types for state machine I/O requests.

use bytes::Bytes;

use crate::protocol::backend::LogMessage;

/// Action requested by a state machine.
///
/// The caller performs the requested I/O and feeds the next complete
/// server message back into the state machine.
#[derive(Debug)]
pub enum Action<'a> {
    /// Write these framed bytes to the server, then read a message.
    WritePacket(&'a [u8]),

    /// Read the next message from the server.
    ReadMessage,

    /// An asynchronous message was received; handle it, then read the next
    /// message.
    AsyncMessage(AsyncMessage),

    /// The state machine has finished successfully.
    Finished,
}

/// Asynchronous message from the server.
#[derive(Debug, Clone)]
pub enum AsyncMessage {
    /// Log message (notice or warning).
    Log(LogMessage),

    /// Server parameter value changed after startup.
    ParameterChanged {
        /// Parameter name
        name: String,
        /// Raw parameter value
        value: Bytes,
    },
}
