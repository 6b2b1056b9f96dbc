//! Wire Protocol Reply Types
//!
//! This module defines the reply types the server writes back to clients.
//! The wire format is the RESP framing Redis uses: each value starts with a
//! one-byte type prefix and is terminated with CRLF (`\r\n`).
//!
//! ## Reply Format
//!
//! - `+` Simple String: `+OK\r\n`
//! - `-` Error: `-expiry must be an integer\r\n`
//! - `$` Bulk String: `$5\r\nhello\r\n` (binary-safe, length-prefixed)
//! - `$-1\r\n` Protocol null (missing or expired key)
//! - `*` Array: `*0\r\n` (only the empty array is ever sent by this server)
//!
//! Requests are decoded by [`crate::protocol::decoder`]; this module only
//! covers the serialization direction.

use bytes::Bytes;

/// The CRLF terminator used throughout the wire protocol
pub const CRLF: &[u8] = b"\r\n";

/// Wire protocol type prefixes
pub mod prefix {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const BULK_STRING: u8 = b'$';
    pub const ARRAY: u8 = b'*';
}

/// A reply value, serializable to its wire representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Non-binary-safe string without CRLF characters.
    /// Format: `+<string>\r\n`
    SimpleString(String),

    /// Error condition reported to the client.
    /// Format: `-<error message>\r\n`
    Error(String),

    /// Binary-safe, length-prefixed string.
    /// Format: `$<length>\r\n<data>\r\n`
    BulkString(Bytes),

    /// Protocol null, sent for a missing or expired key.
    /// Format: `$-1\r\n`
    Null,

    /// Array of replies. Format: `*<count>\r\n<element>...`
    Array(Vec<Reply>),
}

impl Reply {
    /// Creates a simple string reply.
    pub fn simple_string(s: impl Into<String>) -> Self {
        Reply::SimpleString(s.into())
    }

    /// Creates an error reply.
    pub fn error(s: impl Into<String>) -> Self {
        Reply::Error(s.into())
    }

    /// Creates a bulk string reply.
    pub fn bulk_string(data: impl Into<Bytes>) -> Self {
        Reply::BulkString(data.into())
    }

    /// The `+OK\r\n` acknowledgement for a successful write.
    pub fn ok() -> Self {
        Reply::SimpleString("OK".to_string())
    }

    /// The `+PONG\r\n` reply to `ping`.
    pub fn pong() -> Self {
        Reply::SimpleString("PONG".to_string())
    }

    /// Serializes the reply to bytes for sending over the wire.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the reply into an existing buffer.
    ///
    /// More efficient than [`Reply::serialize`] when reusing a buffer.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            Reply::SimpleString(s) => {
                buf.push(prefix::SIMPLE_STRING);
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            Reply::Error(s) => {
                buf.push(prefix::ERROR);
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            Reply::BulkString(data) => {
                buf.push(prefix::BULK_STRING);
                buf.extend_from_slice(data.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                buf.extend_from_slice(data);
                buf.extend_from_slice(CRLF);
            }
            Reply::Null => {
                buf.push(prefix::BULK_STRING);
                buf.extend_from_slice(b"-1");
                buf.extend_from_slice(CRLF);
            }
            Reply::Array(values) => {
                buf.push(prefix::ARRAY);
                buf.extend_from_slice(values.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                for value in values {
                    value.serialize_into(buf);
                }
            }
        }
    }

    /// Returns true if this reply is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }
}
