//! Byte-level connection startup against a scripted server.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use zero_edgedb::protocol::frame::{FrameDecoder, RawMessage};
use zero_edgedb::protocol::reader::PacketReader;
use zero_edgedb::state::{Action, AsyncMessage, AuthState, ConnectionState, ConnectionStateMachine};
use zero_edgedb::{CodecCache, Error, Opts, SchemaGeneration, TransactionState, Value};

const USER: &str = "admin";
const PASSWORD: &str = "secret";
const SALT: &[u8] = b"0123456789abcdef";
const ITERATIONS: u32 = 4096;
const STATE_ID: Uuid = Uuid::from_u128(0x5747_E000);

// Server side message encoding

fn frame(opcode: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![opcode];
    out.extend_from_slice(&(payload.len() as i32 + 4).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

fn string(out: &mut Vec<u8>, s: &[u8]) {
    out.extend_from_slice(&(s.len() as i32).to_be_bytes());
    out.extend_from_slice(s);
}

fn auth(status: u32, data: Option<&[u8]>) -> Vec<u8> {
    let mut payload = status.to_be_bytes().to_vec();
    if let Some(data) = data {
        string(&mut payload, data);
    }
    frame(b'R', &payload)
}

fn auth_sasl(methods: &[&str]) -> Vec<u8> {
    let mut payload = 0x0A_u32.to_be_bytes().to_vec();
    payload.extend_from_slice(&(methods.len() as u32).to_be_bytes());
    for m in methods {
        string(&mut payload, m.as_bytes());
    }
    frame(b'R', &payload)
}

fn server_handshake(major: u16, minor: u16) -> Vec<u8> {
    let mut payload = major.to_be_bytes().to_vec();
    payload.extend_from_slice(&minor.to_be_bytes());
    payload.extend_from_slice(&0_u16.to_be_bytes());
    frame(b'v', &payload)
}

fn parameter_status(name: &str, value: &[u8]) -> Vec<u8> {
    let mut payload = Vec::new();
    string(&mut payload, name.as_bytes());
    string(&mut payload, value);
    frame(b'S', &payload)
}

fn ready(state: u8) -> Vec<u8> {
    frame(b'Z', &[0, 0, state])
}

fn log_message(text: &str) -> Vec<u8> {
    let mut payload = vec![0x50];
    payload.extend_from_slice(&0_u32.to_be_bytes());
    string(&mut payload, text.as_bytes());
    payload.extend_from_slice(&0_u16.to_be_bytes());
    frame(b'L', &payload)
}

fn error_response(code: u32, message: &str) -> Vec<u8> {
    let mut payload = vec![0x78];
    payload.extend_from_slice(&code.to_be_bytes());
    string(&mut payload, message.as_bytes());
    payload.extend_from_slice(&0_u16.to_be_bytes());
    frame(b'E', &payload)
}

// Descriptors

fn base_scalar_desc(out: &mut Vec<u8>, id: u128) {
    out.push(2);
    out.extend_from_slice(Uuid::from_u128(id).as_bytes());
}

fn set_desc(out: &mut Vec<u8>, id: Uuid, type_pos: u16) {
    out.push(0);
    out.extend_from_slice(id.as_bytes());
    out.extend_from_slice(&type_pos.to_be_bytes());
}

fn input_shape_desc(out: &mut Vec<u8>, id: Uuid, name: &str, type_pos: u16) {
    out.push(8);
    out.extend_from_slice(id.as_bytes());
    out.extend_from_slice(&1_u16.to_be_bytes());
    out.extend_from_slice(&0_u32.to_be_bytes());
    out.push(0x6f);
    string(out, name.as_bytes());
    out.extend_from_slice(&type_pos.to_be_bytes());
}

fn state_description() -> Vec<u8> {
    let mut stream = Vec::new();
    base_scalar_desc(&mut stream, 0x101);
    input_shape_desc(&mut stream, STATE_ID, "module", 0);

    let mut payload = STATE_ID.as_bytes().to_vec();
    string(&mut payload, &stream);
    frame(b's', &payload)
}

// Client side message decoding

fn written(action: Action<'_>) -> RawMessage {
    let Action::WritePacket(bytes) = action else {
        panic!("expected WritePacket, got {action:?}");
    };
    let mut decoder = FrameDecoder::new(usize::MAX);
    decoder.extend(bytes);
    let msg = decoder.next_message().unwrap().unwrap();
    assert_eq!(decoder.buffered(), 0);
    msg
}

fn feed<'a>(
    conn: &'a mut ConnectionStateMachine,
    bytes: &[u8],
) -> zero_edgedb::Result<Action<'a>> {
    let mut decoder = FrameDecoder::new(usize::MAX);
    decoder.extend(bytes);
    let msg = decoder.next_message()?.unwrap();
    conn.step(&msg)
}

fn hmac(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key).unwrap();
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// Server half of SCRAM-SHA-256 for one exchange.
struct ScramServer {
    client_first_bare: String,
    server_first: String,
    salted_password: [u8; 32],
}

impl ScramServer {
    fn new(client_first: &str) -> Self {
        let client_first_bare = client_first.strip_prefix("n,,").unwrap().to_string();
        let nonce = client_first_bare.split(",r=").nth(1).unwrap();
        let server_first = format!(
            "r={}srvnonce,s={},i={}",
            nonce,
            STANDARD.encode(SALT),
            ITERATIONS
        );
        let mut salted_password = [0u8; 32];
        pbkdf2::pbkdf2_hmac::<Sha256>(PASSWORD.as_bytes(), SALT, ITERATIONS, &mut salted_password);
        Self {
            client_first_bare,
            server_first,
            salted_password,
        }
    }

    /// Check the client proof and return the server-final-message.
    fn finish(&self, client_final: &str) -> String {
        let (without_proof, proof) = client_final.split_once(",p=").unwrap();
        let auth_message = format!(
            "{},{},{}",
            self.client_first_bare, self.server_first, without_proof
        );

        let client_key = hmac(&self.salted_password, b"Client Key");
        let stored_key = Sha256::digest(client_key);
        let signature = hmac(&stored_key, auth_message.as_bytes());
        let expected: Vec<u8> = client_key
            .iter()
            .zip(signature.iter())
            .map(|(k, s)| k ^ s)
            .collect();
        assert_eq!(STANDARD.decode(proof).unwrap(), expected);

        let server_key = hmac(&self.salted_password, b"Server Key");
        let server_signature = hmac(&server_key, auth_message.as_bytes());
        format!("v={}", STANDARD.encode(server_signature))
    }
}

fn sasl_payload(msg: &RawMessage, initial: bool) -> String {
    let mut reader = PacketReader::new(msg.payload.clone());
    if initial {
        assert_eq!(reader.read_string().unwrap(), "SCRAM-SHA-256");
    }
    let data = reader.read_byte_array().unwrap().unwrap();
    reader.finish().unwrap();
    String::from_utf8(data.to_vec()).unwrap()
}

fn opts() -> Opts {
    Opts {
        user: USER.into(),
        password: Some(PASSWORD.into()),
        branch: Some("main".into()),
        ..Opts::default()
    }
}

/// Drive a machine through SCRAM up to (not including) AuthenticationOK.
fn authenticate(conn: &mut ConnectionStateMachine) {
    let handshake = written(conn.start().unwrap());
    assert_eq!(handshake.opcode, b'V');

    let initial = written(feed(conn, &auth_sasl(&["SCRAM-SHA-256"])).unwrap());
    assert_eq!(initial.opcode, b'p');
    assert_eq!(conn.sasl().state(), AuthState::InitialResponseSent);
    let server = ScramServer::new(&sasl_payload(&initial, true));

    let response = written(feed(conn, &auth(0x0B, Some(server.server_first.as_bytes()))).unwrap());
    assert_eq!(response.opcode, b'r');
    assert_eq!(conn.sasl().state(), AuthState::FinalResponseSent);

    let server_final = server.finish(&sasl_payload(&response, false));
    let action = feed(conn, &auth(0x0C, Some(server_final.as_bytes()))).unwrap();
    assert!(matches!(action, Action::ReadMessage));
}

#[test]
fn handshake_params_are_framed() {
    let mut conn = ConnectionStateMachine::new(opts(), Arc::new(CodecCache::new()));
    let msg = written(conn.start().unwrap());

    let mut reader = PacketReader::new(msg.payload);
    assert_eq!(reader.read_u16().unwrap(), 1);
    assert_eq!(reader.read_u16().unwrap(), 0);
    assert_eq!(reader.read_u16().unwrap(), 2);
    assert_eq!(reader.read_string().unwrap(), "user");
    assert_eq!(reader.read_string().unwrap(), USER);
    assert_eq!(reader.read_string().unwrap(), "branch");
    assert_eq!(reader.read_string().unwrap(), "main");
    assert_eq!(reader.read_u16().unwrap(), 0);
    reader.finish().unwrap();
}

#[test]
fn full_startup_with_scram() {
    let cache = Arc::new(CodecCache::new());
    let mut conn = ConnectionStateMachine::new(opts(), Arc::clone(&cache));
    authenticate(&mut conn);

    assert!(matches!(
        feed(&mut conn, &auth(0, None)).unwrap(),
        Action::ReadMessage
    ));
    assert_eq!(conn.sasl().state(), AuthState::Authenticated);
    assert_eq!(conn.state(), ConnectionState::WaitingReady);

    let key = frame(b'K', &[7; 32]);
    assert!(matches!(feed(&mut conn, &key).unwrap(), Action::ReadMessage));
    assert!(matches!(
        feed(&mut conn, &parameter_status("suggested_pool_concurrency", b"10")).unwrap(),
        Action::ReadMessage
    ));
    assert!(matches!(
        feed(&mut conn, &log_message("hello")).unwrap(),
        Action::AsyncMessage(AsyncMessage::Log(log)) if log.text == "hello"
    ));
    assert!(matches!(
        feed(&mut conn, &state_description()).unwrap(),
        Action::ReadMessage
    ));
    assert!(matches!(feed(&mut conn, &ready(b'I')).unwrap(), Action::Finished));

    assert_eq!(conn.state(), ConnectionState::Ready);
    assert_eq!(conn.key_data().unwrap().data, [7; 32]);
    assert_eq!(conn.server_params()[0].0, "suggested_pool_concurrency");
    assert_eq!(conn.transaction_state(), TransactionState::NotInTransaction);
    // The state type is an input shape: generation switches, nothing to decode.
    assert!(conn.state_codec().is_none());
    assert_eq!(cache.generation(), Some(SchemaGeneration(STATE_ID)));

    match feed(&mut conn, &parameter_status("system_config", b"x")).unwrap() {
        Action::AsyncMessage(AsyncMessage::ParameterChanged { name, value }) => {
            assert_eq!(name, "system_config");
            assert_eq!(value, Bytes::from_static(b"x"));
        }
        other => panic!("unexpected action: {other:?}"),
    }
}

#[test]
fn rejected_proof_fails_connection() {
    let mut conn = ConnectionStateMachine::new(opts(), Arc::new(CodecCache::new()));
    written(conn.start().unwrap());
    let initial = written(feed(&mut conn, &auth_sasl(&["SCRAM-SHA-256"])).unwrap());
    let server = ScramServer::new(&sasl_payload(&initial, true));
    written(feed(&mut conn, &auth(0x0B, Some(server.server_first.as_bytes()))).unwrap());

    let err = feed(&mut conn, &auth(0x0C, Some(b"e=invalid-proof"))).unwrap_err();
    assert!(matches!(err, Error::Auth(_)));
    assert_eq!(conn.state(), ConnectionState::Failed);
    assert_eq!(conn.sasl().state(), AuthState::Failed);
}

#[test]
fn success_without_server_signature_fails() {
    let mut conn = ConnectionStateMachine::new(opts(), Arc::new(CodecCache::new()));
    written(conn.start().unwrap());
    let initial = written(feed(&mut conn, &auth_sasl(&["SCRAM-SHA-256"])).unwrap());
    let server = ScramServer::new(&sasl_payload(&initial, true));
    written(feed(&mut conn, &auth(0x0B, Some(server.server_first.as_bytes()))).unwrap());

    let err = feed(&mut conn, &auth(0, None)).unwrap_err();
    assert!(matches!(
        err,
        Error::ProtocolSequence {
            state: AuthState::FinalResponseSent,
            ..
        }
    ));
    assert_eq!(conn.state(), ConnectionState::Failed);
    assert_eq!(conn.sasl().state(), AuthState::Failed);
}

#[test]
fn server_error_during_auth() {
    let mut conn = ConnectionStateMachine::new(opts(), Arc::new(CodecCache::new()));
    written(conn.start().unwrap());
    let err = feed(&mut conn, &error_response(0x0701_0000, "auth failed")).unwrap_err();
    assert_eq!(err.server_code(), Some(0x0701_0000));
    assert_eq!(conn.state(), ConnectionState::Failed);
}

#[test]
fn challenge_before_sasl_start() {
    let mut conn = ConnectionStateMachine::new(opts(), Arc::new(CodecCache::new()));
    written(conn.start().unwrap());
    let err = feed(&mut conn, &auth(0x0B, Some(b"r=x,s=eA==,i=1"))).unwrap_err();
    assert!(matches!(
        err,
        Error::ProtocolSequence {
            state: AuthState::NotStarted,
            ..
        }
    ));
    assert!(err.is_connection_broken());
}

#[test]
fn trust_auth_skips_sasl() {
    let mut conn = ConnectionStateMachine::new(opts(), Arc::new(CodecCache::new()));
    written(conn.start().unwrap());
    assert!(matches!(
        feed(&mut conn, &server_handshake(1, 0)).unwrap(),
        Action::ReadMessage
    ));
    feed(&mut conn, &auth(0, None)).unwrap();
    assert!(matches!(feed(&mut conn, &ready(b'T')).unwrap(), Action::Finished));
    assert_eq!(conn.sasl().state(), AuthState::NotStarted);
    assert_eq!(conn.transaction_state(), TransactionState::InTransaction);
}

#[test]
fn server_handshake_version_negotiation() {
    let mut conn = ConnectionStateMachine::new(opts(), Arc::new(CodecCache::new()));
    written(conn.start().unwrap());
    feed(&mut conn, &server_handshake(1, 3)).unwrap();
    assert_eq!(conn.server_version().minor, 3);

    let mut conn = ConnectionStateMachine::new(opts(), Arc::new(CodecCache::new()));
    written(conn.start().unwrap());
    let err = feed(&mut conn, &server_handshake(2, 0)).unwrap_err();
    assert!(matches!(err, Error::Unsupported(_)));
}

#[test]
fn unsupported_mechanism() {
    let mut conn = ConnectionStateMachine::new(opts(), Arc::new(CodecCache::new()));
    written(conn.start().unwrap());
    let err = feed(&mut conn, &auth_sasl(&["SCRAM-SHA-1"])).unwrap_err();
    assert!(matches!(err, Error::Auth(_)));
}

#[test]
fn command_output_resolves_and_decodes() {
    let generation = SchemaGeneration(STATE_ID);
    let output_id = Uuid::from_u128(0x5E7);
    let mut stream = Vec::new();
    base_scalar_desc(&mut stream, 0x105);
    set_desc(&mut stream, output_id, 0);

    // CommandDataDescription
    let mut payload = 0_u16.to_be_bytes().to_vec();
    payload.extend_from_slice(&0_u64.to_be_bytes());
    payload.push(0x6d);
    payload.extend_from_slice(Uuid::nil().as_bytes());
    payload.extend_from_slice(&0_i32.to_be_bytes());
    payload.extend_from_slice(output_id.as_bytes());
    string(&mut payload, &stream);

    // Data with one set-of-int64 element
    let mut set = 1_i32.to_be_bytes().to_vec();
    set.extend_from_slice(&[0; 8]);
    set.extend_from_slice(&2_i32.to_be_bytes());
    set.extend_from_slice(&1_i32.to_be_bytes());
    set.extend_from_slice(&8_i32.to_be_bytes());
    set.extend_from_slice(&42_i64.to_be_bytes());
    set.extend_from_slice(&(-1_i32).to_be_bytes());
    let mut data = 1_u16.to_be_bytes().to_vec();
    string(&mut data, &set);

    // Split the stream at an awkward boundary.
    let mut inbound = frame(b'T', &payload);
    inbound.extend(frame(b'D', &data));
    let mut decoder = Opts::default().frame_decoder();
    decoder.extend(&inbound[..7]);
    assert!(decoder.next_message().unwrap().is_none());
    decoder.extend(&inbound[7..]);

    let describe = decoder.next_message().unwrap().unwrap();
    let describe: zero_edgedb::protocol::backend::CommandDataDescription =
        describe.parse().unwrap();
    let row = decoder.next_message().unwrap().unwrap();
    let row: zero_edgedb::protocol::backend::Data = row.parse().unwrap();
    assert!(decoder.next_message().unwrap().is_none());

    let cache = CodecCache::new();
    let codec = cache
        .resolve(describe.output_typedesc.clone(), generation)
        .unwrap();
    assert_eq!(codec.type_id(), describe.output_typedesc_id);
    assert!(Arc::ptr_eq(
        &codec,
        &cache.lookup(generation, output_id).unwrap()
    ));

    let value = codec.decode_bytes(row.elements[0].clone()).unwrap();
    assert_eq!(
        value,
        Some(Value::Set(vec![Some(Value::Int64(42)), None]))
    );
}

#[test]
fn oversized_frame_is_rejected() {
    let opts = Opts {
        max_message_len: 16,
        ..Opts::default()
    };
    let mut decoder = opts.frame_decoder();
    decoder.extend(&frame(b'D', &[0; 32]));
    assert!(matches!(decoder.next_message(), Err(Error::Framing(_))));
}
