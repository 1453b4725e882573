//! Command Handler Module
//!
//! This module turns decoded client requests into store operations and RESP
//! replies. A request is an array of bulk strings; the first element names
//! the command (case-insensitive), the rest are binary-exact arguments.
//!
//! ## Supported Commands
//!
//! - `PING [message]` - `+PONG`, or `message` as a bulk string
//! - `ECHO message` - `message` as a bulk string
//! - `SET key value [EX seconds | PX milliseconds]` - Set a key, optionally with a TTL
//! - `GET key` - The stored value, or a null bulk string
//!
//! Any other command name is answered with `+OK`. Clients that probe for
//! optional features on connect (`CLIENT SETINFO`, `COMMAND DOCS`, ...) get
//! a harmless acknowledgement instead of an error.

use crate::commands::error::{CommandError, CommandResult};
use crate::protocol::RespValue;
use crate::storage::StorageEngine;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Dispatches requests against the shared store.
///
/// Cheap to clone; every connection gets its own copy.
#[derive(Clone, Debug)]
pub struct CommandHandler {
    /// The storage engine
    storage: Arc<StorageEngine>,
}

impl CommandHandler {
    /// Creates a new command handler with the given storage engine.
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self { storage }
    }

    /// Executes a request and returns the reply.
    ///
    /// Never fails: argument and request-shape problems come back as RESP
    /// error values.
    pub fn execute(&self, request: RespValue) -> RespValue {
        let result = into_args(request).and_then(|args| self.dispatch(&args[0], &args[1..]));
        result.unwrap_or_else(|e| e.to_resp())
    }

    /// Dispatches a command to its handler.
    fn dispatch(&self, name: &[u8], args: &[Bytes]) -> CommandResult {
        match name.to_ascii_uppercase().as_slice() {
            b"PING" => cmd_ping(args),
            b"ECHO" => cmd_echo(args),
            b"SET" => self.cmd_set(args),
            b"GET" => self.cmd_get(args),
            _ => {
                debug!(
                    command = %String::from_utf8_lossy(name),
                    args = args.len(),
                    "Unknown command, replying OK"
                );
                Ok(RespValue::ok())
            }
        }
    }

    /// SET key value [EX seconds | PX milliseconds]
    fn cmd_set(&self, args: &[Bytes]) -> CommandResult {
        let (key, value, options) = match args {
            [key, value, options @ ..] => (key, value, options),
            _ => return Err(CommandError::WrongArity("set")),
        };

        let ttl = match options {
            [] => None,
            [unit, amount] => Some(parse_ttl(unit, amount)?),
            _ => return Err(CommandError::Syntax),
        };

        self.storage.set(key.clone(), value.clone(), ttl);
        Ok(RespValue::ok())
    }

    /// GET key
    fn cmd_get(&self, args: &[Bytes]) -> CommandResult {
        let [key] = args else {
            return Err(CommandError::WrongArity("get"));
        };

        Ok(match self.storage.get(key) {
            Some(value) => RespValue::bulk_string(value),
            None => RespValue::null_bulk_string(),
        })
    }
}

/// PING [message]
fn cmd_ping(args: &[Bytes]) -> CommandResult {
    match args {
        [] => Ok(RespValue::pong()),
        [message] => Ok(RespValue::bulk_string(message.clone())),
        _ => Err(CommandError::WrongArity("ping")),
    }
}

/// ECHO message
fn cmd_echo(args: &[Bytes]) -> CommandResult {
    match args {
        [message] => Ok(RespValue::bulk_string(message.clone())),
        _ => Err(CommandError::WrongArity("echo")),
    }
}

/// Unpacks a request into its bulk-string elements. The result is never
/// empty.
fn into_args(request: RespValue) -> Result<Vec<Bytes>, CommandError> {
    let elements = request
        .into_array()
        .filter(|elements| !elements.is_empty())
        .ok_or(CommandError::InvalidRequest)?;

    elements
        .into_iter()
        .map(|element| match element {
            RespValue::BulkString(Some(bytes)) => Ok(bytes),
            _ => Err(CommandError::InvalidRequest),
        })
        .collect()
}

/// Parses the `EX seconds` / `PX milliseconds` option of SET.
fn parse_ttl(unit: &[u8], amount: &[u8]) -> Result<Duration, CommandError> {
    let millis_per_unit: i64 = if unit.eq_ignore_ascii_case(b"EX") {
        1000
    } else if unit.eq_ignore_ascii_case(b"PX") {
        1
    } else {
        return Err(CommandError::Syntax);
    };

    let amount: i64 = std::str::from_utf8(amount)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(CommandError::NotInteger)?;

    if amount <= 0 {
        return Err(CommandError::InvalidExpire("set"));
    }

    // Redis keeps expiry in milliseconds; reject what wouldn't fit.
    let millis = amount
        .checked_mul(millis_per_unit)
        .ok_or(CommandError::InvalidExpire("set"))?;
    Ok(Duration::from_millis(millis as u64))
}
