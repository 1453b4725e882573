//! RESP Protocol Implementation
//!
//! This module implements the Redis Serialization Protocol (RESP) codec used
//! on the wire between clients and the server.
//!
//! ## Modules
//!
//! - `types`: The `RespValue` enum and its encoding
//! - `buffer`: Per-connection receive buffer
//! - `parser`: Incremental decoder that reads values out of the buffer
//!
//! ## Example
//!
//! ```
//! use respkv::protocol::{parse_message, Parsed, RespValue};
//! use bytes::Bytes;
//!
//! // Parsing incoming data
//! let data = b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n";
//! let parsed = parse_message(data).unwrap();
//! assert!(matches!(parsed, Parsed::Complete { consumed: 23, .. }));
//!
//! // Creating responses
//! let response = RespValue::bulk_string(Bytes::from("Ariz"));
//! assert_eq!(response.serialize(), b"$4\r\nAriz\r\n");
//! ```

pub mod buffer;
pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use buffer::ByteBuffer;
pub use parser::{parse_message, ParseError, ParseResult, Parsed, RespParser};
pub use types::RespValue;
