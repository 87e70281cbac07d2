//! Authentication messages and the SCRAM-SHA-256 client.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::protocol::frame::Sendable;
use crate::protocol::writer::{PacketWriter, size_of_byte_array, size_of_string};

/// SASL mechanism implemented by [`ScramClient`].
pub const SCRAM_SHA_256: &str = "SCRAM-SHA-256";

/// AuthenticationSASLInitialResponse message.
#[derive(Debug, Clone)]
pub struct SaslInitialResponse<'a> {
    /// SASL mechanism name (e.g., "SCRAM-SHA-256")
    pub mechanism: &'a str,
    /// Client-first-message for SCRAM
    pub data: &'a [u8],
}

impl Sendable for SaslInitialResponse<'_> {
    const OPCODE: u8 = super::msg_type::SASL_INITIAL_RESPONSE;

    fn payload_size(&self) -> usize {
        size_of_string(self.mechanism) + size_of_byte_array(Some(self.data))
    }

    fn write_payload(&self, writer: &mut PacketWriter<'_>) -> Result<()> {
        writer.write_string(self.mechanism)?;
        writer.write_byte_array(Some(self.data))
    }
}

/// AuthenticationSASLResponse message.
#[derive(Debug, Clone)]
pub struct SaslResponse<'a> {
    /// Client-final-message for SCRAM
    pub data: &'a [u8],
}

impl Sendable for SaslResponse<'_> {
    const OPCODE: u8 = super::msg_type::SASL_RESPONSE;

    fn payload_size(&self) -> usize {
        size_of_byte_array(Some(self.data))
    }

    fn write_payload(&self, writer: &mut PacketWriter<'_>) -> Result<()> {
        writer.write_byte_array(Some(self.data))
    }
}

/// SCRAM-SHA-256 client implementation (RFC 5802 / RFC 7677, no channel binding).
pub struct ScramClient {
    /// Escaped username
    username: String,
    /// Password
    password: String,
    /// Client nonce
    nonce: String,
    /// Auth message for signature verification
    auth_message: Option<String>,
    /// Salted password for server signature verification
    salted_password: Option<[u8; 32]>,
}

impl ScramClient {
    /// Create a new SCRAM client with a random 24-byte nonce.
    pub fn new(username: &str, password: &str) -> Self {
        use rand::Rng;

        let mut nonce_bytes = [0u8; 24];
        rand::rng().fill(&mut nonce_bytes);
        Self::with_nonce(username, password, &STANDARD.encode(nonce_bytes))
    }

    /// Create a SCRAM client with a caller-chosen nonce.
    pub fn with_nonce(username: &str, password: &str, nonce: &str) -> Self {
        Self {
            username: username.replace('=', "=3D").replace(',', "=2C"),
            password: password.to_string(),
            nonce: nonce.to_string(),
            auth_message: None,
            salted_password: None,
        }
    }

    /// Generate the client-first-message.
    pub fn client_first_message(&self) -> String {
        format!("n,,{}", self.client_first_message_bare())
    }

    fn client_first_message_bare(&self) -> String {
        format!("n={},r={}", self.username, self.nonce)
    }

    /// Process server-first-message and generate client-final-message.
    pub fn process_server_first(&mut self, server_first: &[u8]) -> Result<String> {
        let server_first = simdutf8::compat::from_utf8(server_first)
            .map_err(|e| Error::Auth(format!("Invalid server-first-message: {}", e)))?;

        // r=<nonce>,s=<salt>,i=<iterations>
        let mut combined_nonce = None;
        let mut salt_b64 = None;
        let mut iterations = None;

        for part in server_first.split(',') {
            if let Some(value) = part.strip_prefix("r=") {
                combined_nonce = Some(value);
            } else if let Some(value) = part.strip_prefix("s=") {
                salt_b64 = Some(value);
            } else if let Some(value) = part.strip_prefix("i=") {
                iterations = value.parse::<u32>().ok();
            }
        }

        let combined_nonce = combined_nonce
            .ok_or_else(|| Error::Auth("Missing nonce in server-first-message".into()))?;
        let salt_b64 =
            salt_b64.ok_or_else(|| Error::Auth("Missing salt in server-first-message".into()))?;
        let iterations = iterations
            .ok_or_else(|| Error::Auth("Missing iterations in server-first-message".into()))?;

        if !combined_nonce.starts_with(&self.nonce) || combined_nonce.len() == self.nonce.len() {
            return Err(Error::Auth(
                "Server nonce doesn't extend client nonce".into(),
            ));
        }

        let salt = STANDARD
            .decode(salt_b64)
            .map_err(|e| Error::Auth(format!("Invalid salt: {}", e)))?;

        // SaltedPassword = Hi(password, salt, iterations)
        let mut salted_password = [0u8; 32];
        pbkdf2::pbkdf2_hmac::<Sha256>(
            self.password.as_bytes(),
            &salt,
            iterations,
            &mut salted_password,
        );

        let client_key = hmac_sha256(&salted_password, b"Client Key")?;
        let stored_key = Sha256::digest(client_key);

        // c=base64("n,,")
        let client_final_without_proof = format!("c=biws,r={}", combined_nonce);
        let auth_message = format!(
            "{},{},{}",
            self.client_first_message_bare(),
            server_first,
            client_final_without_proof
        );

        let client_signature = hmac_sha256(&stored_key, auth_message.as_bytes())?;
        let mut client_proof = [0u8; 32];
        for ((proof, key), signature) in client_proof
            .iter_mut()
            .zip(client_key.iter())
            .zip(client_signature.iter())
        {
            *proof = key ^ signature;
        }

        self.salted_password = Some(salted_password);
        self.auth_message = Some(auth_message);

        Ok(format!(
            "{},p={}",
            client_final_without_proof,
            STANDARD.encode(client_proof)
        ))
    }

    /// Verify server-final-message.
    pub fn verify_server_final(&self, server_final: &[u8]) -> Result<()> {
        let server_final = simdutf8::compat::from_utf8(server_final)
            .map_err(|e| Error::Auth(format!("Invalid server-final-message: {}", e)))?;

        if let Some(err) = server_final.strip_prefix("e=") {
            return Err(Error::Auth(format!("Server rejected proof: {}", err)));
        }

        let server_signature_b64 = server_final
            .strip_prefix("v=")
            .ok_or_else(|| Error::Auth("Invalid server-final-message format".into()))?;
        let server_signature = STANDARD
            .decode(server_signature_b64)
            .map_err(|e| Error::Auth(format!("Invalid server signature: {}", e)))?;

        let salted_password = self
            .salted_password
            .as_ref()
            .ok_or_else(|| Error::Auth("Missing salted password".into()))?;
        let auth_message = self
            .auth_message
            .as_ref()
            .ok_or_else(|| Error::Auth("Missing auth message".into()))?;

        let server_key = hmac_sha256(salted_password, b"Server Key")?;
        let expected_signature = hmac_sha256(&server_key, auth_message.as_bytes())?;

        if server_signature.as_slice() != expected_signature.as_slice() {
            return Err(Error::Auth(
                "The received signature didn't match the expected one".into(),
            ));
        }
        Ok(())
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; 32]> {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key)
        .map_err(|e| Error::Auth(format!("HMAC error: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}
