//! Binary protocol codec for EdgeDB clients.
//!
//! # Features
//!
//! - **Zero-copy parsing**: Retained payload slices share the inbound buffer
//! - **Sans-I/O state machines**: Protocol logic is separated from I/O
//! - **Descriptor-driven codecs**: Server type descriptors resolve into cached
//!   codec graphs
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use zero_edgedb::state::{Action, ConnectionStateMachine};
//! use zero_edgedb::{CodecCache, Opts};
//!
//! let opts = Opts {
//!     user: "admin".into(),
//!     password: Some("secret".into()),
//!     ..Default::default()
//! };
//! let mut decoder = opts.frame_decoder();
//! let mut conn = ConnectionStateMachine::new(opts, Arc::new(CodecCache::new()));
//!
//! match conn.start()? {
//!     Action::WritePacket(bytes) => assert_eq!(bytes[0], b'V'),
//!     other => panic!("unexpected {other:?}"),
//! }
//! // Feed socket bytes into `decoder` and each message into `conn.step()`.
//! assert!(decoder.next_message()?.is_none());
//! # Ok::<(), zero_edgedb::Error>(())
//! ```

pub mod cache;
pub mod codecs;
pub mod descriptors;
pub mod error;
pub mod opts;
pub mod protocol;
pub mod state;
pub mod value;

pub use cache::{CodecCache, SchemaGeneration};
pub use codecs::Codec;
pub use error::{Error, Result, ServerError};
pub use opts::Opts;
pub use protocol::types::{Cardinality, ProtocolVersion, TransactionState};
pub use value::Value;
