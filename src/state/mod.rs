//! Sans-I/O state machines for the EdgeDB protocol.
//!
//! These state machines handle the protocol logic without performing any I/O.
//! They produce `Action` values that tell the caller what to do next.

pub mod action;
pub mod auth;
pub mod connection;

pub use action::{Action, AsyncMessage};
pub use auth::{AuthEvent, AuthState, SaslSession};
pub use connection::{ConnectionState, ConnectionStateMachine};
