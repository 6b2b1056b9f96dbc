//! Wire Protocol Implementation
//!
//! This module implements the request/response wire protocol: a compact,
//! length-prefixed, text-based framing (the request subset of RESP).
//!
//! ## Modules
//!
//! - `types`: the [`Reply`] enum and its wire serialization
//! - `decoder`: incremental decoding of incoming requests
//!
//! ## Example
//!
//! ```
//! use relaykv::protocol::{decode, Reply};
//! use bytes::Bytes;
//!
//! // Decoding an incoming request
//! let data = b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n";
//! let (request, consumed) = decode(data).unwrap().unwrap();
//! assert_eq!(request.command, "get");
//!
//! // Building a reply
//! let reply = Reply::bulk_string(Bytes::from("value"));
//! assert_eq!(reply.serialize(), b"$5\r\nvalue\r\n");
//! ```

pub mod decoder;
pub mod types;

// Re-export commonly used types for convenience
pub use decoder::{decode, DecodeError, DecodeResult, Request};
pub use types::Reply;
