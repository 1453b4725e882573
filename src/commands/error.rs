//! Command-level errors.
//!
//! These never close the connection: each one is rendered as a RESP error
//! reply and the client carries on.

use crate::protocol::RespValue;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// A known command with missing or extra arguments.
    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArity(&'static str),

    #[error("ERR syntax error")]
    Syntax,

    #[error("ERR value is not an integer or out of range")]
    NotInteger,

    #[error("ERR invalid expire time in '{0}' command")]
    InvalidExpire(&'static str),

    /// The request was not a non-empty array of bulk strings.
    #[error("ERR invalid request: expected an array of bulk strings")]
    InvalidRequest,
}

impl CommandError {
    pub fn to_resp(&self) -> RespValue {
        RespValue::error(self.to_string())
    }
}

pub type CommandResult = Result<RespValue, CommandError>;
