//! Incremental RESP Protocol Parser
//!
//! The parser reads one complete value from a [`ByteBuffer`] and reports how
//! many bytes it used. It never mutates the buffer and keeps no partial state
//! between calls: when the message is not fully buffered yet it answers
//! [`Parsed::Insufficient`], and the caller simply retries the whole
//! top-level parse after the next read.
//!
//! ## How the Parser Works
//!
//! The parser returns one of:
//! - `Ok(Parsed::Complete { value, consumed })` - a whole value was read
//! - `Ok(Parsed::Insufficient)` - the message is incomplete, read more bytes
//! - `Err(ParseError)` - the stream violates the protocol
//!
//! The caller:
//! 1. Appends incoming network data to the buffer
//! 2. Calls `parse()`
//! 3. On `Complete`, consumes `consumed` bytes from the buffer
//! 4. On `Insufficient`, waits for more data
//! 5. On error, reports it and disconnects the client

use crate::protocol::buffer::ByteBuffer;
use crate::protocol::types::{prefix, RespValue, CRLF};
use bytes::Bytes;
use thiserror::Error;

/// Errors that can occur during RESP parsing.
///
/// All of these are fatal to the connection: once the grammar is broken
/// there is no reliable way to find the start of the next message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Unknown type prefix byte
    #[error("unknown type prefix: {0:#04x}")]
    MalformedType(u8),

    /// Integer, length or count line that is not a base-10 i64
    #[error("invalid integer: {0:?}")]
    MalformedInteger(String),

    /// Bulk string length is negative (but not -1 for null)
    #[error("invalid bulk string length: {0}")]
    InvalidBulkLength(i64),

    /// Array length is negative (but not -1 for null)
    #[error("invalid array length: {0}")]
    InvalidArrayLength(i64),

    /// Bulk string payload not followed by CRLF
    #[error("bulk string missing trailing CRLF")]
    MissingTerminator,

    /// The message exceeds maximum allowed size
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("maximum nesting depth exceeded: {0}")]
    NestingTooDeep(usize),
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Outcome of a parse attempt that did not violate the protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    /// A whole value, and the number of bytes it occupied.
    Complete { value: RespValue, consumed: usize },
    /// The value is not fully buffered yet.
    Insufficient,
}

/// Maximum size for a single bulk string (512 MB, same as Redis)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum array nesting depth (prevent stack overflow)
pub const MAX_NESTING_DEPTH: usize = 32;

/// Maximum length of a simple string, error, integer or length line,
/// excluding the CRLF. Same bound Redis puts on inline requests.
pub const MAX_LINE_SIZE: usize = 64 * 1024;

/// Bails out of a decode step with `Insufficient` when a lookup comes back
/// empty.
macro_rules! need {
    ($lookup:expr) => {
        match $lookup {
            Some(found) => found,
            None => return Ok(Step::Insufficient),
        }
    };
}

/// Internal result of decoding one value at an offset.
enum Step {
    Done(RespValue, usize),
    Insufficient,
}

/// A resumable RESP parser.
///
/// # Example
///
/// ```
/// use respkv::protocol::{ByteBuffer, Parsed, RespParser};
///
/// let mut parser = RespParser::new();
/// let mut buffer = ByteBuffer::from(&b"*2\r\n$3\r\nGET\r\n$4\r\nna"[..]);
/// assert_eq!(parser.parse(&buffer).unwrap(), Parsed::Insufficient);
///
/// buffer.append(b"me\r\n");
/// if let Parsed::Complete { consumed, .. } = parser.parse(&buffer).unwrap() {
///     buffer.consume(consumed);
/// }
/// assert!(buffer.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct RespParser {
    /// Current nesting depth (for array parsing)
    depth: usize,
}

impl RespParser {
    pub fn new() -> Self {
        Self { depth: 0 }
    }

    /// Attempts to parse one top-level RESP value from the start of `buf`.
    pub fn parse(&mut self, buf: &ByteBuffer) -> ParseResult<Parsed> {
        self.depth = 0;
        match self.decode_value(buf, 0)? {
            Step::Done(value, consumed) => Ok(Parsed::Complete { value, consumed }),
            Step::Insufficient => Ok(Parsed::Insufficient),
        }
    }

    /// Decodes the value whose type byte sits at `offset`. On success the
    /// returned offset points just past the value.
    fn decode_value(&mut self, buf: &ByteBuffer, offset: usize) -> ParseResult<Step> {
        if self.depth > MAX_NESTING_DEPTH {
            return Err(ParseError::NestingTooDeep(MAX_NESTING_DEPTH));
        }

        let tag = need!(buf.peek(1, offset));
        let body = offset + 1;

        match tag[0] {
            prefix::SIMPLE_STRING => {
                let (line, next) = need!(read_line(buf, body)?);
                Ok(Step::Done(
                    RespValue::SimpleString(Bytes::copy_from_slice(line)),
                    next,
                ))
            }
            prefix::ERROR => {
                let (line, next) = need!(read_line(buf, body)?);
                Ok(Step::Done(RespValue::Error(Bytes::copy_from_slice(line)), next))
            }
            prefix::INTEGER => {
                let (line, next) = need!(read_line(buf, body)?);
                Ok(Step::Done(RespValue::Integer(parse_integer(line)?), next))
            }
            prefix::BULK_STRING => self.decode_bulk_string(buf, body),
            prefix::ARRAY => self.decode_array(buf, body),
            other => Err(ParseError::MalformedType(other)),
        }
    }

    /// Parses `<length>\r\n<data>\r\n` starting just after the `$`.
    fn decode_bulk_string(&mut self, buf: &ByteBuffer, offset: usize) -> ParseResult<Step> {
        let (line, data_start) = need!(read_line(buf, offset)?);
        let length = parse_integer(line)?;

        if length == -1 {
            return Ok(Step::Done(RespValue::BulkString(None), data_start));
        }
        if length < 0 {
            return Err(ParseError::InvalidBulkLength(length));
        }

        let length = length as usize;
        if length > MAX_BULK_SIZE {
            return Err(ParseError::MessageTooLarge {
                size: length,
                max: MAX_BULK_SIZE,
            });
        }

        let chunk = need!(buf.peek(length + CRLF.len(), data_start));
        if &chunk[length..] != CRLF {
            return Err(ParseError::MissingTerminator);
        }

        let data = Bytes::copy_from_slice(&chunk[..length]);
        Ok(Step::Done(
            RespValue::BulkString(Some(data)),
            data_start + length + CRLF.len(),
        ))
    }

    /// Parses `<count>\r\n<elements...>` starting just after the `*`.
    fn decode_array(&mut self, buf: &ByteBuffer, offset: usize) -> ParseResult<Step> {
        let (line, mut next) = need!(read_line(buf, offset)?);
        let count = parse_integer(line)?;

        if count == -1 {
            return Ok(Step::Done(RespValue::Array(None), next));
        }
        if count < 0 {
            return Err(ParseError::InvalidArrayLength(count));
        }

        // The count is untrusted; don't let it size the allocation.
        let mut elements = Vec::with_capacity((count as usize).min(64));

        self.depth += 1;
        for _ in 0..count {
            match self.decode_value(buf, next)? {
                Step::Done(value, after) => {
                    elements.push(value);
                    next = after;
                }
                Step::Insufficient => return Ok(Step::Insufficient),
            }
        }
        self.depth -= 1;

        Ok(Step::Done(RespValue::Array(Some(elements)), next))
    }
}

/// Returns the bytes from `offset` up to the next CRLF, and the offset just
/// past that CRLF. A line that runs past `MAX_LINE_SIZE` without a CRLF is
/// an error; no lookup scans more than `MAX_LINE_SIZE + 2` bytes.
#[inline]
fn read_line(buf: &ByteBuffer, offset: usize) -> ParseResult<Option<(&[u8], usize)>> {
    let window = MAX_LINE_SIZE + CRLF.len();

    let Some(end) = buf.find_within(CRLF, offset, window) else {
        let buffered = buf.len().saturating_sub(offset);
        if buffered >= window {
            return Err(ParseError::MessageTooLarge {
                size: buffered,
                max: MAX_LINE_SIZE,
            });
        }
        return Ok(None);
    };

    Ok(buf
        .peek(end - offset, offset)
        .map(|line| (line, end + CRLF.len())))
}

fn parse_integer(line: &[u8]) -> ParseResult<i64> {
    let malformed = || ParseError::MalformedInteger(String::from_utf8_lossy(line).into_owned());

    // `str::parse` tolerates a leading '+', RESP does not.
    if line.first() == Some(&b'+') {
        return Err(malformed());
    }

    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(malformed)
}

/// Helper function to parse a single RESP message from bytes.
///
/// This is a convenience function for simple use cases.
pub fn parse_message(bytes: &[u8]) -> ParseResult<Parsed> {
    RespParser::new().parse(&ByteBuffer::from(bytes))
}
