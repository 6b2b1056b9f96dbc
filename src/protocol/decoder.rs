//! Incremental Request Decoder
//!
//! This module turns a connection's byte stream into discrete requests.
//! A request on the wire is an array of bulk strings: a `*<N>\r\n` header
//! announcing N elements, each framed as `$<len>\r\n<len bytes>\r\n`. The
//! first element is the command name, the rest are its arguments.
//!
//! ## How the Decoder Works
//!
//! The decoder reads from a buffer and returns either:
//! - `Ok(Some((request, consumed)))` - a complete request, `consumed` bytes were used
//! - `Ok(None)` - the request is incomplete, more data is needed
//! - `Err(DecodeError)` - the request is malformed
//!
//! The caller appends incoming network data to a buffer, calls [`decode`],
//! advances the buffer on success, waits for more data on `None`, and on an
//! error reports it to the client and discards the bad request. A decode
//! error never terminates the connection by itself.
//!
//! ## Case Normalization
//!
//! The command name and every argument are lowercased on ingestion. Note
//! that this applies to argument *values* as well: `set Foo BAR` stores
//! `bar` under `foo`. This is an explicit policy of the protocol, not an
//! accident, and it is pinned by tests.

use crate::protocol::types::{prefix, CRLF};
use thiserror::Error;

/// Maximum size for a single bulk string element (512 MB, same as Redis).
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum number of elements a request may declare in its array header.
///
/// The connection read buffer keeps any real request far below this; a
/// header declaring more is malformed input, and the declared count is
/// never trusted for allocation.
pub const MAX_REQUEST_ELEMENTS: i64 = 16 * 1024;

/// A decoded request: a command name plus its ordered arguments,
/// all lowercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// The command name (first array element)
    pub command: String,
    /// The remaining array elements, in order
    pub args: Vec<String>,
}

/// Errors for malformed requests.
///
/// Each variant maps to a distinct `-<message>\r\n` error reply and
/// terminates only the current request, never the connection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The request does not start with the array type tag
    #[error("unexpected input: request does not begin with *")]
    NotAnArray(u8),

    /// The array length field is not a parsable integer
    #[error("unexpected input: request length is not a parsable integer")]
    InvalidArrayLength(String),

    /// The array declares zero or negative elements
    #[error("unexpected input: empty request")]
    EmptyRequest(i64),

    /// The array declares more elements than any request can carry
    #[error("unexpected input: request length out of range")]
    RequestTooLong(i64),

    /// An element does not carry the bulk string type tag
    #[error("unable to parse command: expected a bulk string element")]
    NotABulkString(u8),

    /// A bulk string length field is not a parsable integer
    #[error("unable to parse command: element length is not a parsable integer")]
    InvalidBulkLength(String),

    /// A bulk string payload is not terminated by CRLF
    #[error("unable to parse command: element payload missing CRLF delimiter")]
    MissingDelimiter,

    /// An element is not valid UTF-8
    #[error("unable to parse command: element is not valid UTF-8")]
    InvalidUtf8,

    /// A bulk string exceeds the maximum allowed size
    #[error("element too large: {size} bytes (max {max})")]
    ElementTooLarge { size: usize, max: usize },
}

/// Result type for decoding operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Attempts to decode one request from the front of `buf`.
///
/// # Returns
///
/// - `Ok(Some((request, consumed)))` - a complete request was decoded
/// - `Ok(None)` - incomplete data, need more bytes
/// - `Err(e)` - the request is malformed
pub fn decode(buf: &[u8]) -> DecodeResult<Option<(Request, usize)>> {
    if buf.is_empty() {
        return Ok(None);
    }

    if buf[0] != prefix::ARRAY {
        return Err(DecodeError::NotAnArray(buf[0]));
    }

    let (line, mut pos) = match read_line(buf, 1) {
        Some(found) => found,
        None => return Ok(None),
    };

    let count = parse_length(line).map_err(DecodeError::InvalidArrayLength)?;
    if count <= 0 {
        return Err(DecodeError::EmptyRequest(count));
    }
    if count > MAX_REQUEST_ELEMENTS {
        return Err(DecodeError::RequestTooLong(count));
    }

    let mut elements = Vec::with_capacity(count as usize);
    for _ in 0..count {
        match decode_bulk_string(buf, pos)? {
            Some((element, next)) => {
                elements.push(element);
                pos = next;
            }
            None => return Ok(None),
        }
    }

    let mut elements = elements.into_iter();
    let command = elements.next().unwrap_or_default();
    Ok(Some((
        Request {
            command,
            args: elements.collect(),
        },
        pos,
    )))
}

/// Decodes one `$<len>\r\n<payload>\r\n` element starting at `pos`,
/// returning the lowercased payload and the position just past it.
fn decode_bulk_string(buf: &[u8], pos: usize) -> DecodeResult<Option<(String, usize)>> {
    if pos >= buf.len() {
        return Ok(None);
    }

    if buf[pos] != prefix::BULK_STRING {
        return Err(DecodeError::NotABulkString(buf[pos]));
    }

    let (line, data_start) = match read_line(buf, pos + 1) {
        Some(found) => found,
        None => return Ok(None),
    };

    let length = parse_length(line).map_err(DecodeError::InvalidBulkLength)?;
    if length < 0 {
        return Err(DecodeError::InvalidBulkLength(
            String::from_utf8_lossy(line).into_owned(),
        ));
    }

    let length = length as usize;
    if length > MAX_BULK_SIZE {
        return Err(DecodeError::ElementTooLarge {
            size: length,
            max: MAX_BULK_SIZE,
        });
    }

    let data_end = data_start + length;
    if buf.len() < data_end + CRLF.len() {
        return Ok(None);
    }

    if &buf[data_end..data_end + CRLF.len()] != CRLF {
        return Err(DecodeError::MissingDelimiter);
    }

    let payload =
        std::str::from_utf8(&buf[data_start..data_end]).map_err(|_| DecodeError::InvalidUtf8)?;

    Ok(Some((payload.to_lowercase(), data_end + CRLF.len())))
}

/// Finds the line starting at `start` and ending at the next CRLF.
///
/// Returns the line contents (without the terminator) and the position
/// just past the terminator, or `None` if no CRLF is present yet.
fn read_line(buf: &[u8], start: usize) -> Option<(&[u8], usize)> {
    let mut i = start;
    while i + 1 < buf.len() {
        if buf[i] == b'\r' && buf[i + 1] == b'\n' {
            return Some((&buf[start..i], i + 2));
        }
        i += 1;
    }
    None
}

/// Parses a length field, returning the raw text on failure so the error
/// can carry it.
fn parse_length(line: &[u8]) -> Result<i64, String> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| String::from_utf8_lossy(line).into_owned())
}
