//! Protocol Module
//!
//! Defines the wire protocol spoken between content servers, clients and the
//! aggregation server: a small subset of HTTP/1.x.
//!
//! ## Message Format
//!
//! ```text
//! PUT /data/<source-uuid> HTTP/1.1\r\n
//! Content-Type: application/json\r\n
//! Content-Length: 87\r\n
//! Lamport-Clock: 12\r\n
//! \r\n
//! {"id": "IDS60901", ...}
//! ```
//!
//! ### Framing Rules
//! - Start line is exactly three space-separated tokens
//! - Header names compare case-insensitively
//! - The body is exactly `Content-Length` bytes (required on PUT/POST and on
//!   every response)
//! - HTTP/1.1 keeps the connection open unless `Connection: close`;
//!   HTTP/1.0 closes unless `Connection: keep-alive`

mod codec;
pub mod headers;
mod request;
mod response;

pub use codec::{
    decode_request, decode_response, encode_message, encode_request, encode_response,
    parse_header_line, parse_start_line, read_message, validate_header, write_request,
    write_response, FrameReader, StartLine, MAX_BODY_SIZE, MAX_HEADER_COUNT, MAX_LINE_LENGTH,
};
pub use headers::{ConnectionDirective, Headers, Version};
pub use request::{Method, Request};
pub use response::{canonical_reason, status, Response};

/// Either side of an exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Request(Request),
    Response(Response),
}

impl Message {
    pub fn headers(&self) -> &Headers {
        match self {
            Message::Request(request) => &request.headers,
            Message::Response(response) => &response.headers,
        }
    }

    pub fn body(&self) -> &[u8] {
        match self {
            Message::Request(request) => &request.body,
            Message::Response(response) => &response.body,
        }
    }

    /// Whether the connection stays open after this message
    pub fn keep_alive(&self) -> bool {
        match self {
            Message::Request(request) => request.keep_alive(),
            Message::Response(response) => response.keep_alive(),
        }
    }
}
