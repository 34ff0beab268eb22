//! Request definitions
//!
//! Represents requests from content servers and clients.

use std::fmt;

use bytes::Bytes;

use super::headers::{self, Headers, Version};

/// Request verbs understood by the framer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "GET" => Some(Method::Get),
            "PUT" => Some(Method::Put),
            "POST" => Some(Method::Post),
            "DELETE" => Some(Method::Delete),
            _ => None,
        }
    }

    /// Verbs that carry a body must declare its length
    pub fn requires_content_length(&self) -> bool {
        matches!(self, Method::Put | Method::Post)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A framed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,

    /// Request target, always starting with `/`
    pub target: String,

    pub version: Version,

    pub headers: Headers,

    pub body: Bytes,
}

impl Request {
    /// Create an HTTP/1.1 request with no headers and an empty body
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            version: Version::Http11,
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::Get, target)
    }

    pub fn put(target: impl Into<String>) -> Self {
        Self::new(Method::Put, target)
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

    /// Declare an empty body (required for PUT/POST without payload)
    pub fn with_empty_body(mut self) -> Self {
        self.body = Bytes::new();
        self.headers.set(headers::CONTENT_LENGTH, "0");
        self
    }

    /// Stamp the sender's logical time
    pub fn with_clock(mut self, time: u64) -> Self {
        self.headers.set(headers::LAMPORT_CLOCK, time.to_string());
        self
    }

    /// Sender's logical time, if stamped
    pub fn clock(&self) -> Option<u64> {
        self.headers.clock()
    }

    pub fn keep_alive(&self) -> bool {
        self.headers.keep_alive(self.version)
    }

    /// Path without the query string
    pub fn path(&self) -> &str {
        self.target.split('?').next().unwrap_or(&self.target)
    }
}
