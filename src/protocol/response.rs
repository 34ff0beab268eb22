//! Response definitions
//!
//! Represents responses to content servers and clients.

use bytes::Bytes;

use super::headers::{self, Headers, Version};

/// Status codes the aggregation server emits
pub mod status {
    pub const OK: u16 = 200;
    pub const CREATED: u16 = 201;
    pub const NO_CONTENT: u16 = 204;
    pub const BAD_REQUEST: u16 = 400;
    pub const NOT_FOUND: u16 = 404;
    pub const METHOD_NOT_ALLOWED: u16 = 405;
    pub const INTERNAL_SERVER_ERROR: u16 = 500;
}

/// Standard reason phrase for a status code
pub fn canonical_reason(code: u16) -> &'static str {
    match code {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// A framed response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub version: Version,

    /// Status code (100..=599)
    pub status: u16,

    /// Reason phrase; may contain spaces
    pub reason: String,

    pub headers: Headers,

    pub body: Bytes,
}

impl Response {
    /// Create an HTTP/1.1 response with an empty, declared body
    pub fn new(status: u16) -> Self {
        let mut header_map = Headers::new();
        header_map.set(headers::CONTENT_LENGTH, "0");
        Self {
            version: Version::Http11,
            status,
            reason: canonical_reason(status).to_string(),
            headers: header_map,
            body: Bytes::new(),
        }
    }

    /// Create a response carrying an observation payload
    pub fn json(status: u16, body: impl Into<Bytes>) -> Self {
        Self::new(status).with_body(body, headers::APPLICATION_JSON)
    }

    /// Create a response carrying a plain-text message
    pub fn text(status: u16, message: impl Into<String>) -> Self {
        Self::new(status).with_body(message.into(), headers::TEXT_PLAIN)
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Attach a body and the headers that describe it
    pub fn with_body(mut self, body: impl Into<Bytes>, content_type: &str) -> Self {
        self.body = body.into();
        self.headers
            .set(headers::CONTENT_LENGTH, self.body.len().to_string());
        self.headers.set(headers::CONTENT_TYPE, content_type);
        self
    }

    /// Sender's logical time, if stamped
    pub fn clock(&self) -> Option<u64> {
        self.headers.clock()
    }

    pub fn keep_alive(&self) -> bool {
        self.headers.keep_alive(self.version)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text (lossy)
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
