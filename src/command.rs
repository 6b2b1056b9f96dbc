//! Typed Command Parsing
//!
//! This module converts a decoded wire [`Request`] into a typed
//! [`ClientCommand`]. Dispatch works on this enum rather than on raw
//! command strings, which keeps arity and argument validation in one place
//! and makes the internal expiry-check operation structurally unreachable
//! from the wire: there is simply no [`ClientCommand`] variant for it
//! (see [`crate::queue::Op`]).
//!
//! ## Validation Rules
//!
//! - `get key` - exactly one argument
//! - `set key value [ex seconds]` - two or four arguments; the flag token
//!   must be `ex` and the seconds value must be a non-negative integer
//! - `ping` - no arguments
//! - `echo message` - exactly one argument
//! - `command` - arguments ignored (clients send `COMMAND DOCS` on connect)
//!
//! A violation is a command-semantic error: the client gets a typed error
//! reply and nothing is enqueued, so the store is never half-updated.

use crate::protocol::Request;
use thiserror::Error;

/// Upper bound on the `ex` seconds argument.
///
/// Bounded the way Redis bounds expire times (the largest value whose
/// millisecond form fits in an `i64`), which keeps `now + ttl` comfortably
/// representable as an `Instant`. Anything above this is a range error,
/// not a deadline.
pub const MAX_TTL_SECONDS: u64 = (i64::MAX / 1000) as u64;

/// A validated client command, ready to be enqueued for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// `get key` - read a value
    Get { key: String },
    /// `set key value [ex seconds]` - upsert a value, optionally with a TTL
    Set {
        key: String,
        value: String,
        /// TTL in seconds; `None` means the key never expires
        ttl_seconds: Option<u64>,
    },
    /// `ping` - liveness check
    Ping,
    /// `echo message` - send the message back
    Echo { message: String },
    /// `command` - the capability query clients issue on connect
    Command,
}

/// Errors produced while validating a request into a command.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The command name is not recognized
    #[error("unknown command '{0}'")]
    Unknown(String),

    /// The argument count does not match the command's arity
    #[error("wrong number of arguments for '{0}'")]
    WrongArity(&'static str),

    /// The flag token of a `set` is not `ex`
    #[error("syntax error")]
    Syntax,

    /// The TTL argument is present but not an integer
    #[error("expiry must be an integer")]
    InvalidTtl,

    /// The TTL argument is an integer but too large to be a deadline
    #[error("expiry out of range")]
    TtlOutOfRange,
}

impl ClientCommand {
    /// Validates a decoded request into a typed command.
    ///
    /// The decoder has already lowercased the command name and arguments.
    pub fn from_request(request: Request) -> Result<Self, CommandError> {
        let Request { command, mut args } = request;

        match command.as_str() {
            "get" => {
                if args.len() != 1 {
                    return Err(CommandError::WrongArity("get"));
                }
                Ok(ClientCommand::Get {
                    key: args.remove(0),
                })
            }
            "set" => {
                let ttl_seconds = match args.len() {
                    2 => None,
                    4 => {
                        if args[2] != "ex" {
                            return Err(CommandError::Syntax);
                        }
                        let seconds =
                            args[3].parse::<u64>().map_err(|_| CommandError::InvalidTtl)?;
                        if seconds > MAX_TTL_SECONDS {
                            return Err(CommandError::TtlOutOfRange);
                        }
                        Some(seconds)
                    }
                    _ => return Err(CommandError::WrongArity("set")),
                };
                let value = args.swap_remove(1);
                let key = args.swap_remove(0);
                Ok(ClientCommand::Set {
                    key,
                    value,
                    ttl_seconds,
                })
            }
            "ping" => {
                if !args.is_empty() {
                    return Err(CommandError::WrongArity("ping"));
                }
                Ok(ClientCommand::Ping)
            }
            "echo" => {
                if args.len() != 1 {
                    return Err(CommandError::WrongArity("echo"));
                }
                Ok(ClientCommand::Echo {
                    message: args.remove(0),
                })
            }
            "command" => Ok(ClientCommand::Command),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }

    /// The command's wire name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ClientCommand::Get { .. } => "get",
            ClientCommand::Set { .. } => "set",
            ClientCommand::Ping => "ping",
            ClientCommand::Echo { .. } => "echo",
            ClientCommand::Command => "command",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(command: &str, args: &[&str]) -> Request {
        Request {
            command: command.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_get() {
        let cmd = ClientCommand::from_request(request("get", &["foo"])).unwrap();
        assert_eq!(cmd, ClientCommand::Get { key: "foo".into() });
    }

    #[test]
    fn test_get_wrong_arity() {
        let err = ClientCommand::from_request(request("get", &[])).unwrap_err();
        assert_eq!(err, CommandError::WrongArity("get"));

        let err = ClientCommand::from_request(request("get", &["a", "b"])).unwrap_err();
        assert_eq!(err, CommandError::WrongArity("get"));
    }

    #[test]
    fn test_plain_set() {
        let cmd = ClientCommand::from_request(request("set", &["foo", "bar"])).unwrap();
        assert_eq!(
            cmd,
            ClientCommand::Set {
                key: "foo".into(),
                value: "bar".into(),
                ttl_seconds: None,
            }
        );
    }

    #[test]
    fn test_set_with_expiry() {
        let cmd = ClientCommand::from_request(request("set", &["foo", "bar", "ex", "10"])).unwrap();
        assert_eq!(
            cmd,
            ClientCommand::Set {
                key: "foo".into(),
                value: "bar".into(),
                ttl_seconds: Some(10),
            }
        );
    }

    #[test]
    fn test_set_bad_flag_token() {
        let err =
            ClientCommand::from_request(request("set", &["foo", "bar", "px", "10"])).unwrap_err();
        assert_eq!(err, CommandError::Syntax);
    }

    #[test]
    fn test_set_non_integer_ttl() {
        let err =
            ClientCommand::from_request(request("set", &["foo", "bar", "ex", "soon"])).unwrap_err();
        assert_eq!(err, CommandError::InvalidTtl);
        assert_eq!(err.to_string(), "expiry must be an integer");
    }

    #[test]
    fn test_set_ttl_above_range_is_rejected() {
        // u64::MAX parses as an integer but would overflow `now + ttl` in
        // the executor; it must be stopped here, before it is ever enqueued.
        let err = ClientCommand::from_request(request(
            "set",
            &["foo", "bar", "ex", "18446744073709551615"],
        ))
        .unwrap_err();
        assert_eq!(err, CommandError::TtlOutOfRange);
        assert_eq!(err.to_string(), "expiry out of range");

        // The bound itself is still accepted.
        let max = MAX_TTL_SECONDS.to_string();
        let cmd =
            ClientCommand::from_request(request("set", &["foo", "bar", "ex", &max])).unwrap();
        assert_eq!(
            cmd,
            ClientCommand::Set {
                key: "foo".into(),
                value: "bar".into(),
                ttl_seconds: Some(MAX_TTL_SECONDS),
            }
        );
    }

    #[test]
    fn test_set_wrong_arity() {
        let err = ClientCommand::from_request(request("set", &["foo"])).unwrap_err();
        assert_eq!(err, CommandError::WrongArity("set"));

        let err = ClientCommand::from_request(request("set", &["foo", "bar", "ex"])).unwrap_err();
        assert_eq!(err, CommandError::WrongArity("set"));
    }

    #[test]
    fn test_ping_and_echo() {
        assert_eq!(
            ClientCommand::from_request(request("ping", &[])).unwrap(),
            ClientCommand::Ping
        );
        assert_eq!(
            ClientCommand::from_request(request("echo", &["hello"])).unwrap(),
            ClientCommand::Echo {
                message: "hello".into()
            }
        );
    }

    #[test]
    fn test_command_ignores_args() {
        assert_eq!(
            ClientCommand::from_request(request("command", &["docs"])).unwrap(),
            ClientCommand::Command
        );
    }

    #[test]
    fn test_unknown_command() {
        let err = ClientCommand::from_request(request("del", &["foo"])).unwrap_err();
        assert_eq!(err, CommandError::Unknown("del".into()));
    }

    #[test]
    fn test_internal_check_is_not_a_wire_command() {
        // The expiry check rides the work queue as its own variant and must
        // never be reachable by a client-supplied name.
        let err = ClientCommand::from_request(request("check_expired", &["foo"])).unwrap_err();
        assert!(matches!(err, CommandError::Unknown(_)));
    }
}
