//! Per-Connection Protocol Session
//!
//! A [`Session`] is everything a connection needs between socket reads: the
//! receive buffer, the parser and a command handler. It does no I/O itself.
//! The async driver in [`handler`](super::handler) hands it bytes as they
//! arrive and writes out whatever replies it produced.
//!
//! Keeping this synchronous means every request is decoded, executed and
//! encoded without yielding, so replies always come back in request order.

use crate::commands::CommandHandler;
use crate::connection::handler::ConnectionError;
use crate::protocol::{ByteBuffer, ParseError, Parsed, RespParser, RespValue};
use bytes::BytesMut;
use tracing::trace;

/// Maximum number of unparsed bytes a connection may buffer: one maximal
/// bulk string plus room for the surrounding request.
pub const MAX_BUFFER_SIZE: usize = crate::protocol::parser::MAX_BULK_SIZE + 64 * 1024;

/// The callbacks a transport drives a connection through.
pub trait ProtocolHandler {
    /// Feeds newly received bytes. Replies for every request that is now
    /// complete are appended to `out`, in order.
    ///
    /// Returns the number of requests executed. On error, `out` may still
    /// hold replies (including a final error reply) that should be flushed
    /// before the connection is closed.
    fn on_bytes(&mut self, bytes: &[u8], out: &mut BytesMut) -> Result<usize, ConnectionError>;

    /// Releases per-connection state. Shared state is untouched.
    fn on_close(&mut self);
}

/// A connection's buffer, parser and command handler.
#[derive(Debug)]
pub struct Session {
    buffer: ByteBuffer,
    parser: RespParser,
    commands: CommandHandler,
    /// Requests executed over the life of the connection.
    executed: u64,
}

impl Session {
    pub fn new(commands: CommandHandler) -> Self {
        Self {
            buffer: ByteBuffer::new(),
            parser: RespParser::new(),
            commands,
            executed: 0,
        }
    }

    /// Total requests executed so far, including those answered in a batch
    /// that then hit a protocol error.
    pub fn executed(&self) -> u64 {
        self.executed
    }

    /// Bytes received but not yet part of a complete request.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

impl ProtocolHandler for Session {
    fn on_bytes(&mut self, bytes: &[u8], out: &mut BytesMut) -> Result<usize, ConnectionError> {
        self.buffer.append(bytes);

        let mut executed = 0;
        loop {
            match self.parser.parse(&self.buffer) {
                Ok(Parsed::Complete { value, consumed }) => {
                    self.buffer.consume(consumed);
                    trace!(consumed, remaining = self.buffer.len(), "Parsed request");

                    self.commands.execute(value).serialize_into(out);
                    executed += 1;
                    self.executed += 1;
                }
                Ok(Parsed::Insufficient) => break,
                Err(e) => {
                    protocol_error_reply(&e).serialize_into(out);
                    return Err(ConnectionError::ParseError(e));
                }
            }
        }

        if self.buffer.len() > MAX_BUFFER_SIZE {
            return Err(ConnectionError::BufferFull);
        }

        Ok(executed)
    }

    fn on_close(&mut self) {
        trace!(discarded = self.buffer.len(), "Releasing connection buffer");
        self.buffer.clear();
    }
}

fn protocol_error_reply(e: &ParseError) -> RespValue {
    RespValue::error(format!("ERR Protocol error: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageEngine;
    use std::sync::Arc;

    fn session() -> Session {
        Session::new(CommandHandler::new(Arc::new(StorageEngine::new())))
    }

    #[test]
    fn test_single_request() {
        let mut session = session();
        let mut out = BytesMut::new();

        let executed = session.on_bytes(b"*1\r\n$4\r\nPING\r\n", &mut out).unwrap();
        assert_eq!(executed, 1);
        assert_eq!(&out[..], b"+PONG\r\n");
        assert_eq!(session.buffered(), 0);
    }

    #[test]
    fn test_partial_request_is_kept() {
        let mut session = session();
        let mut out = BytesMut::new();

        let executed = session.on_bytes(b"*2\r\n$4\r\nECHO\r\n$5\r\nhel", &mut out).unwrap();
        assert_eq!(executed, 0);
        assert!(out.is_empty());
        assert_eq!(session.buffered(), 21);

        let executed = session.on_bytes(b"lo\r\n", &mut out).unwrap();
        assert_eq!(executed, 1);
        assert_eq!(&out[..], b"$5\r\nhello\r\n");
        assert_eq!(session.buffered(), 0);
    }

    #[test]
    fn test_pipelined_requests_in_order() {
        let mut session = session();
        let mut out = BytesMut::new();

        let executed = session
            .on_bytes(
                b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$2\r\nv1\r\n*2\r\n$3\r\nGET\r\n$1\r\nk\r\n*1\r\n$4\r\nPI",
                &mut out,
            )
            .unwrap();
        assert_eq!(executed, 2);
        assert_eq!(&out[..], b"+OK\r\n$2\r\nv1\r\n");
        assert_eq!(session.buffered(), 10);
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut session = session();
        let mut out = BytesMut::new();
        let request = b"*2\r\n$4\r\nECHO\r\n$3\r\nhey\r\n";

        for (i, byte) in request.iter().enumerate() {
            let executed = session.on_bytes(std::slice::from_ref(byte), &mut out).unwrap();
            let expected = if i + 1 == request.len() { 1 } else { 0 };
            assert_eq!(executed, expected);
        }

        assert_eq!(&out[..], b"$3\r\nhey\r\n");
    }

    #[test]
    fn test_protocol_error_replies_then_fails() {
        let mut session = session();
        let mut out = BytesMut::new();

        let result = session.on_bytes(b"*1\r\n$4\r\nPING\r\n!oops\r\n", &mut out);
        assert!(matches!(
            result,
            Err(ConnectionError::ParseError(ParseError::MalformedType(b'!')))
        ));
        assert_eq!(
            &out[..],
            b"+PONG\r\n-ERR Protocol error: unknown type prefix: 0x21\r\n"
        );
        assert_eq!(session.executed(), 1);
    }

    #[test]
    fn test_unterminated_line_fails_fast() {
        use crate::protocol::parser::MAX_LINE_SIZE;

        let mut session = session();
        let mut out = BytesMut::new();
        let chunk = [b'a'; 4096];

        session.on_bytes(b"+", &mut out).unwrap();
        let mut result = Ok(0);
        let mut fed = 1;
        while result.is_ok() && fed <= MAX_LINE_SIZE + 4096 {
            result = session.on_bytes(&chunk, &mut out);
            fed += chunk.len();
        }

        assert!(matches!(
            result,
            Err(ConnectionError::ParseError(ParseError::MessageTooLarge { .. }))
        ));
        assert!(fed <= MAX_LINE_SIZE + 2 * chunk.len());
        assert!(out.starts_with(b"-ERR Protocol error: message too large"));
    }

    #[test]
    fn test_wrong_arity_keeps_session_usable() {
        let mut session = session();
        let mut out = BytesMut::new();

        session.on_bytes(b"*1\r\n$4\r\nECHO\r\n", &mut out).unwrap();
        session.on_bytes(b"*1\r\n$4\r\nPING\r\n", &mut out).unwrap();

        assert_eq!(
            &out[..],
            b"-ERR wrong number of arguments for 'echo' command\r\n+PONG\r\n"
        );
    }

    #[test]
    fn test_on_close_releases_buffer() {
        let mut session = session();
        let mut out = BytesMut::new();

        session.on_bytes(b"*1\r\n$4\r\nPI", &mut out).unwrap();
        assert!(session.buffered() > 0);

        session.on_close();
        assert_eq!(session.buffered(), 0);
    }

    #[test]
    fn test_close_does_not_touch_store() {
        let storage = Arc::new(StorageEngine::new());
        let mut first = Session::new(CommandHandler::new(Arc::clone(&storage)));
        let mut out = BytesMut::new();

        first
            .on_bytes(b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n", &mut out)
            .unwrap();
        first.on_close();

        assert_eq!(storage.get(b"k"), Some(bytes::Bytes::from("v")));
    }
}
