//! SASL exchange sequencing.
//!
//! [`SaslSession`] only enforces message order; computing the proof is left
//! to the caller (see [`crate::protocol::frontend::ScramClient`]).

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::protocol::backend::Authentication;
use crate::protocol::frame::write_message;
use crate::protocol::frontend::{SaslInitialResponse, SaslResponse};

/// Position in the SASL exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    NotStarted,
    InitialResponseSent,
    ChallengeReceived,
    FinalResponseSent,
    Authenticated,
    Failed,
}

/// What the caller has to do after an authentication message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// Server challenge; answer with [`SaslSession::respond`].
    Challenge(Bytes),
    /// Server final data; verify it, then wait for the success message.
    ServerFinal(Bytes),
    Authenticated,
}

/// One SASL exchange on a connection.
#[derive(Debug)]
pub struct SaslSession {
    state: AuthState,
    mechanism: Option<String>,
    exchanges: u32,
    server_final_received: bool,
}

impl Default for SaslSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SaslSession {
    /// Create a new session that has not sent anything yet.
    pub fn new() -> Self {
        Self {
            state: AuthState::NotStarted,
            mechanism: None,
            exchanges: 0,
            server_final_received: false,
        }
    }

    /// Current position in the exchange.
    pub fn state(&self) -> AuthState {
        self.state
    }

    /// Mechanism chosen by [`start`](Self::start).
    pub fn mechanism(&self) -> Option<&str> {
        self.mechanism.as_deref()
    }

    /// Messages sent and received so far.
    pub fn exchanges(&self) -> u32 {
        self.exchanges
    }

    fn transition(&mut self, to: AuthState) {
        tracing::debug!("SASL state {:?} -> {:?}", self.state, to);
        self.state = to;
        self.exchanges += 1;
    }

    /// Mark the exchange as failed, e.g. on an ErrorResponse.
    pub fn fail(&mut self) {
        if self.state != AuthState::Failed {
            tracing::debug!("SASL state {:?} -> Failed", self.state);
            self.state = AuthState::Failed;
        }
    }

    fn out_of_sequence(&mut self, message: String) -> Error {
        let err = Error::ProtocolSequence {
            state: self.state,
            message,
        };
        self.fail();
        err
    }

    /// Write the initial response into `buf`.
    pub fn start(&mut self, buf: &mut Vec<u8>, mechanism: &str, data: &[u8]) -> Result<()> {
        if self.state != AuthState::NotStarted {
            return Err(self.out_of_sequence("initial response already sent".into()));
        }
        write_message(buf, &SaslInitialResponse { mechanism, data })?;
        self.mechanism = Some(mechanism.to_string());
        self.transition(AuthState::InitialResponseSent);
        Ok(())
    }

    /// Write the response to a challenge into `buf`.
    pub fn respond(&mut self, buf: &mut Vec<u8>, data: &[u8]) -> Result<()> {
        if self.state != AuthState::ChallengeReceived {
            return Err(self.out_of_sequence("response without a pending challenge".into()));
        }
        write_message(buf, &SaslResponse { data })?;
        self.transition(AuthState::FinalResponseSent);
        Ok(())
    }

    /// Apply an authentication message from the server.
    pub fn receive(&mut self, message: &Authentication) -> Result<AuthEvent> {
        match (self.state, message) {
            (AuthState::InitialResponseSent, Authentication::SaslContinue { data }) => {
                self.transition(AuthState::ChallengeReceived);
                Ok(AuthEvent::Challenge(data.clone()))
            }
            (AuthState::FinalResponseSent, Authentication::SaslFinal { data })
                if !self.server_final_received =>
            {
                self.server_final_received = true;
                self.exchanges += 1;
                Ok(AuthEvent::ServerFinal(data.clone()))
            }
            (AuthState::FinalResponseSent, Authentication::Ok) if self.server_final_received => {
                self.transition(AuthState::Authenticated);
                Ok(AuthEvent::Authenticated)
            }
            (AuthState::FinalResponseSent, Authentication::Ok) => {
                Err(self.out_of_sequence("success before the server final message".into()))
            }
            (_, message) => Err(self.out_of_sequence(format!("unexpected {}", message.kind()))),
        }
    }
}
