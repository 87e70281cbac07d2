//! Connection options.

use crate::protocol::frame::FrameDecoder;
use crate::protocol::types::{ConnectionParam, ProtocolVersion};

/// Default upper bound on a single inbound message, length field included.
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 16 * 1024 * 1024;

/// Connection options for EdgeDB.
#[derive(Debug, Clone)]
pub struct Opts {
    /// Username for authentication.
    ///
    /// Default: `"edgedb"`
    pub user: String,

    /// Password for SCRAM authentication.
    ///
    /// Default: `None`
    pub password: Option<String>,

    /// Database name to connect to.
    ///
    /// Default: `None`
    pub database: Option<String>,

    /// Branch name to connect to.
    ///
    /// Default: `None`
    pub branch: Option<String>,

    /// Secret key (JWT) sent in the handshake instead of a password.
    ///
    /// Default: `None`
    pub secret_key: Option<String>,

    /// Largest message accepted from the server; larger frames are rejected.
    ///
    /// Default: `16 MiB`
    pub max_message_len: usize,

    /// Protocol version requested in the handshake.
    ///
    /// Default: `1.0`
    pub protocol_version: ProtocolVersion,

    /// Additional handshake parameters.
    ///
    /// Default: `[]`
    pub params: Vec<(String, String)>,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            user: "edgedb".to_string(),
            password: None,
            database: None,
            branch: None,
            secret_key: None,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
            protocol_version: ProtocolVersion::default(),
            params: Vec::new(),
        }
    }
}

impl Opts {
    /// Parameters for the ClientHandshake message.
    pub fn handshake_params(&self) -> Vec<ConnectionParam> {
        let mut params = vec![ConnectionParam::new("user", &self.user)];
        if let Some(database) = &self.database {
            params.push(ConnectionParam::new("database", database));
        }
        if let Some(branch) = &self.branch {
            params.push(ConnectionParam::new("branch", branch));
        }
        if let Some(secret_key) = &self.secret_key {
            params.push(ConnectionParam::new("secret_key", secret_key));
        }
        for (name, value) in &self.params {
            params.push(ConnectionParam::new(name, value));
        }
        params
    }

    /// Frame decoder bounded by `max_message_len`.
    pub fn frame_decoder(&self) -> FrameDecoder {
        FrameDecoder::new(self.max_message_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = Opts::default();
        assert_eq!(opts.user, "edgedb");
        assert_eq!(opts.max_message_len, 16 * 1024 * 1024);
        assert_eq!(opts.protocol_version, ProtocolVersion::new(1, 0));
    }

    #[test]
    fn test_handshake_params_order() {
        let opts = Opts {
            user: "admin".into(),
            branch: Some("main".into()),
            secret_key: Some("tok".into()),
            params: vec![("x".into(), "y".into())],
            ..Opts::default()
        };
        let names: Vec<_> = opts
            .handshake_params()
            .into_iter()
            .map(|p| (p.name, p.value))
            .collect();
        assert_eq!(
            names,
            vec![
                ("user".to_string(), "admin".to_string()),
                ("branch".into(), "main".into()),
                ("secret_key".into(), "tok".into()),
                ("x".into(), "y".into()),
            ]
        );
    }
}
