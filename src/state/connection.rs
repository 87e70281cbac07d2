//! Connection handshake and authentication state machine.

use std::sync::Arc;

use bytes::Bytes;

use crate::cache::{CodecCache, SchemaGeneration};
use crate::codecs::Codec;
use crate::error::{Error, Result};
use crate::opts::Opts;
use crate::protocol::backend::{
    Authentication, ErrorResponse, LogMessage, ParameterStatus, ReadyForCommand, ServerHandshake,
    ServerKeyData, StateDataDescription, msg_type,
};
use crate::protocol::frame::{RawMessage, write_message};
use crate::protocol::frontend::ClientHandshake;
use crate::protocol::frontend::auth::{SCRAM_SHA_256, ScramClient};
use crate::protocol::types::{ProtocolVersion, TransactionState};

use super::action::{Action, AsyncMessage};
use super::auth::{AuthEvent, AuthState, SaslSession};

/// Connection state during startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Initial,
    WaitingAuth,
    SaslInProgress,
    WaitingReady,
    Ready,
    Failed,
}

/// Connection startup state machine.
pub struct ConnectionStateMachine {
    state: ConnectionState,
    options: Opts,
    cache: Arc<CodecCache>,
    sasl: SaslSession,
    scram_client: Option<ScramClient>,
    server_version: ProtocolVersion,
    key_data: Option<ServerKeyData>,
    server_params: Vec<(String, Bytes)>,
    transaction_state: TransactionState,
    state_codec: Option<Arc<Codec>>,
    write_buffer: Vec<u8>,
}

impl ConnectionStateMachine {
    /// Create a new connection state machine resolving state descriptors
    /// through `cache`.
    pub fn new(options: Opts, cache: Arc<CodecCache>) -> Self {
        let server_version = options.protocol_version;
        Self {
            state: ConnectionState::Initial,
            options,
            cache,
            sasl: SaslSession::new(),
            scram_client: None,
            server_version,
            key_data: None,
            server_params: Vec::new(),
            transaction_state: TransactionState::NotInTransaction,
            state_codec: None,
            write_buffer: Vec::new(),
        }
    }

    /// Get the current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The SASL exchange, if any was needed.
    pub fn sasl(&self) -> &SaslSession {
        &self.sasl
    }

    /// Protocol version in effect.
    pub fn server_version(&self) -> ProtocolVersion {
        self.server_version
    }

    /// Get the server key data.
    pub fn key_data(&self) -> Option<&ServerKeyData> {
        self.key_data.as_ref()
    }

    /// Get server parameters.
    pub fn server_params(&self) -> &[(String, Bytes)] {
        &self.server_params
    }

    /// Get the current transaction state.
    pub fn transaction_state(&self) -> TransactionState {
        self.transaction_state
    }

    /// Codec of the session state type, if the server described one this
    /// client can decode.
    pub fn state_codec(&self) -> Option<&Arc<Codec>> {
        self.state_codec.as_ref()
    }

    /// Start the connection process.
    ///
    /// Returns the initial action to perform.
    pub fn start(&mut self) -> Result<Action<'_>> {
        if self.state != ConnectionState::Initial {
            return Err(Error::Protocol(format!(
                "start called in state {:?}",
                self.state
            )));
        }
        self.write_buffer.clear();
        let handshake = ClientHandshake {
            version: self.options.protocol_version,
            params: self.options.handshake_params(),
            extensions: Vec::new(),
        };
        write_message(&mut self.write_buffer, &handshake)?;
        self.state = ConnectionState::WaitingAuth;
        Ok(Action::WritePacket(&self.write_buffer))
    }

    /// Process a complete message from the server.
    pub fn step(&mut self, msg: &RawMessage) -> Result<Action<'_>> {
        match msg.opcode {
            msg_type::LOG_MESSAGE => {
                let log: LogMessage = msg.parse()?;
                return Ok(Action::AsyncMessage(AsyncMessage::Log(log)));
            }
            msg_type::ERROR_RESPONSE => {
                let error: ErrorResponse = msg.parse()?;
                self.fail();
                return Err(error.into_error());
            }
            _ => {}
        }

        let result = match self.state {
            ConnectionState::WaitingAuth => self.handle_auth_message(msg).map(|()| None),
            ConnectionState::SaslInProgress => self.handle_sasl_message(msg).map(|()| None),
            ConnectionState::WaitingReady => self.handle_ready_message(msg).map(|()| None),
            ConnectionState::Ready if msg.opcode == msg_type::PARAMETER_STATUS => {
                self.handle_parameter_changed(msg).map(Some)
            }
            _ => Err(Error::Protocol(format!(
                "Unexpected message '{}' in state {:?}",
                msg.opcode as char, self.state
            ))),
        };
        let async_message = match result {
            Ok(async_message) => async_message,
            Err(e) => {
                self.fail();
                return Err(e);
            }
        };
        if let Some(async_message) = async_message {
            return Ok(Action::AsyncMessage(async_message));
        }

        Ok(match self.state {
            ConnectionState::SaslInProgress if !self.write_buffer.is_empty() => {
                Action::WritePacket(&self.write_buffer)
            }
            ConnectionState::Ready => Action::Finished,
            _ => Action::ReadMessage,
        })
    }

    fn fail(&mut self) {
        self.state = ConnectionState::Failed;
        if self.sasl.state() != AuthState::NotStarted {
            self.sasl.fail();
        }
    }

    fn handle_auth_message(&mut self, msg: &RawMessage) -> Result<()> {
        self.write_buffer.clear();
        if msg.opcode == msg_type::SERVER_HANDSHAKE {
            let handshake: ServerHandshake = msg.parse()?;
            let requested = self.options.protocol_version;
            if handshake.version != requested {
                tracing::warn!(
                    "Server offered protocol {} instead of {}",
                    handshake.version,
                    requested
                );
                if handshake.version.major != requested.major {
                    return Err(Error::Unsupported(format!(
                        "protocol version {}",
                        handshake.version
                    )));
                }
            }
            self.server_version = handshake.version;
            return Ok(());
        }

        let auth: Authentication = msg.parse()?;
        match auth {
            Authentication::Ok => {
                tracing::debug!("Authenticated without SASL");
                self.state = ConnectionState::WaitingReady;
                Ok(())
            }
            Authentication::Sasl { methods } => {
                if !methods.iter().any(|m| m == SCRAM_SHA_256) {
                    return Err(Error::Auth(format!(
                        "No supported SASL mechanism. Server offers: {:?}",
                        methods
                    )));
                }
                let password = self
                    .options
                    .password
                    .as_ref()
                    .ok_or_else(|| Error::Auth("Password required but not provided".into()))?;

                let scram = ScramClient::new(&self.options.user, password);
                let client_first = scram.client_first_message();
                self.sasl
                    .start(&mut self.write_buffer, SCRAM_SHA_256, client_first.as_bytes())?;
                self.scram_client = Some(scram);
                self.state = ConnectionState::SaslInProgress;
                Ok(())
            }
            other => Err(self.sasl_out_of_sequence(&other)),
        }
    }

    /// Route a stray SASL message through the session so it reports the
    /// sequence error with its current state.
    fn sasl_out_of_sequence(&mut self, auth: &Authentication) -> Error {
        match self.sasl.receive(auth) {
            Err(err) => err,
            Ok(_) => Error::Protocol(format!("Unexpected {}", auth.kind())),
        }
    }

    fn handle_sasl_message(&mut self, msg: &RawMessage) -> Result<()> {
        self.write_buffer.clear();
        if msg.opcode != msg_type::AUTHENTICATION {
            return Err(Error::Protocol(format!(
                "Expected Authentication message, got '{}'",
                msg.opcode as char
            )));
        }
        let auth: Authentication = msg.parse()?;
        let scram = self
            .scram_client
            .as_mut()
            .ok_or_else(|| Error::Protocol("SCRAM client not initialized".into()))?;

        match self.sasl.receive(&auth)? {
            AuthEvent::Challenge(server_first) => {
                let client_final = scram.process_server_first(&server_first)?;
                self.sasl
                    .respond(&mut self.write_buffer, client_final.as_bytes())?;
            }
            AuthEvent::ServerFinal(server_final) => {
                scram.verify_server_final(&server_final)?;
            }
            AuthEvent::Authenticated => {
                self.scram_client = None;
                self.state = ConnectionState::WaitingReady;
            }
        }
        Ok(())
    }

    fn handle_ready_message(&mut self, msg: &RawMessage) -> Result<()> {
        match msg.opcode {
            msg_type::SERVER_KEY_DATA => {
                self.key_data = Some(msg.parse()?);
            }
            msg_type::PARAMETER_STATUS => {
                let param: ParameterStatus = msg.parse()?;
                self.server_params.push((param.name, param.value));
            }
            msg_type::STATE_DATA_DESCRIPTION => {
                let description: StateDataDescription = msg.parse()?;
                self.resolve_state(description)?;
            }
            msg_type::READY_FOR_COMMAND => {
                let ready: ReadyForCommand = msg.parse()?;
                self.transaction_state = ready
                    .transaction_state()
                    .unwrap_or(TransactionState::NotInTransaction);
                self.state = ConnectionState::Ready;
            }
            _ => {
                return Err(Error::Protocol(format!(
                    "Unexpected message during startup: '{}'",
                    msg.opcode as char
                )));
            }
        }
        Ok(())
    }

    fn resolve_state(&mut self, description: StateDataDescription) -> Result<()> {
        let generation = SchemaGeneration(description.typedesc_id);
        if description.typedesc.is_empty() {
            self.cache.set_generation(generation);
            self.state_codec = None;
            return Ok(());
        }
        match self.cache.resolve(description.typedesc, generation) {
            Ok(codec) => self.state_codec = Some(codec),
            Err(Error::UnsupportedShape { type_id, reason }) => {
                tracing::debug!("State type {} not decodable: {}", type_id, reason);
                self.state_codec = None;
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    fn handle_parameter_changed(&mut self, msg: &RawMessage) -> Result<AsyncMessage> {
        let param: ParameterStatus = msg.parse()?;
        if let Some(entry) = self.server_params.iter_mut().find(|(n, _)| *n == param.name) {
            entry.1 = param.value.clone();
        } else {
            self.server_params
                .push((param.name.clone(), param.value.clone()));
        }
        Ok(AsyncMessage::ParameterChanged {
            name: param.name,
            value: param.value,
        })
    }
}
