//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │ Start line                                      CRLF   │
//! │   request:  <VERB> <target> <version>                  │
//! │   response: <version> <status> <reason phrase>         │
//! ├────────────────────────────────────────────────────────┤
//! │ Name: Value                                     CRLF   │
//! │ ... (repeated, at most MAX_HEADER_COUNT)               │
//! ├────────────────────────────────────────────────────────┤
//! │                                                 CRLF   │
//! ├────────────────────────────────────────────────────────┤
//! │ Body: exactly Content-Length bytes                     │
//! └────────────────────────────────────────────────────────┘
//! ```

use std::io::{self, BufRead, Cursor, Read, Write};

use bytes::Bytes;

use super::headers::{self, ConnectionDirective, Headers, Version};
use super::{Message, Method, Request, Response};
use crate::error::{HubError, Result};

/// Longest start or header line accepted (excluding the line ending)
pub const MAX_LINE_LENGTH: usize = 8 * 1024;

/// Most header lines accepted in one message
pub const MAX_HEADER_COUNT: usize = 64;

/// Maximum body size (16 MB)
pub const MAX_BODY_SIZE: usize = 16 * 1024 * 1024;

const CRLF: &[u8] = b"\r\n";

/// Parsed first line of a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartLine {
    Request {
        method: Method,
        target: String,
        version: Version,
    },
    Response {
        version: Version,
        status: u16,
        reason: String,
    },
}

// =============================================================================
// FrameReader
// =============================================================================

/// Reads framed messages off a byte stream
///
/// `Ok(None)` means the peer ended the stream before a message started, or
/// sent an empty first line; both are an idle close, not a fault.
pub trait FrameReader {
    fn read_message(&mut self) -> Result<Option<Message>>;

    /// Read a message that must be a request
    fn read_request(&mut self) -> Result<Option<Request>> {
        match self.read_message()? {
            Some(Message::Request(request)) => Ok(Some(request)),
            Some(Message::Response(response)) => Err(HubError::MalformedStartLine(format!(
                "expected a request, got a {} response",
                response.status
            ))),
            None => Ok(None),
        }
    }

    /// Read a message that must be a response
    fn read_response(&mut self) -> Result<Option<Response>> {
        match self.read_message()? {
            Some(Message::Response(response)) => Ok(Some(response)),
            Some(Message::Request(request)) => Err(HubError::MalformedStartLine(format!(
                "expected a response, got a {} request",
                request.method
            ))),
            None => Ok(None),
        }
    }
}

impl<R: BufRead> FrameReader for R {
    fn read_message(&mut self) -> Result<Option<Message>> {
        read_message(self)
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Read one complete message from a buffered stream
///
/// Blocks until the message (including its body) is received or an error occurs
pub fn read_message<R: BufRead + ?Sized>(reader: &mut R) -> Result<Option<Message>> {
    let first = match read_line(reader)? {
        Some(line) if !line.is_empty() => line,
        _ => return Ok(None),
    };
    let start = parse_start_line(&first)?;

    let mut header_map = Headers::new();
    loop {
        let line = read_line(reader)?.ok_or_else(|| {
            HubError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream closed inside header block",
            ))
        })?;
        if line.is_empty() {
            break;
        }
        if header_map.len() >= MAX_HEADER_COUNT {
            return Err(HubError::FrameTooLarge(format!(
                "more than {} header lines",
                MAX_HEADER_COUNT
            )));
        }
        let (name, value) = parse_header_line(&line)?;
        header_map.set(name, value);
    }

    let body_required = match &start {
        StartLine::Request { method, .. } => method.requires_content_length(),
        StartLine::Response { .. } => true,
    };
    let body = read_body(reader, &header_map, body_required)?;

    let message = match start {
        StartLine::Request {
            method,
            target,
            version,
        } => Message::Request(Request {
            method,
            target,
            version,
            headers: header_map,
            body,
        }),
        StartLine::Response {
            version,
            status,
            reason,
        } => Message::Response(Response {
            version,
            status,
            reason,
            headers: header_map,
            body,
        }),
    };

    Ok(Some(message))
}

/// Parse a start line into request or response form
///
/// The line must split into exactly three space-separated tokens; for a
/// response the third token is the rest of the line (the reason phrase).
pub fn parse_start_line(line: &str) -> Result<StartLine> {
    let malformed = || HubError::MalformedStartLine(line.to_string());

    let parts: Vec<&str> = line.splitn(3, ' ').collect();
    if parts.len() != 3 || parts.iter().any(|part| part.is_empty()) {
        return Err(malformed());
    }

    if let Some(method) = Method::parse(parts[0]) {
        let version = Version::parse(parts[2]).ok_or_else(malformed)?;
        if !parts[1].starts_with('/') {
            return Err(malformed());
        }
        return Ok(StartLine::Request {
            method,
            target: parts[1].to_string(),
            version,
        });
    }

    if let Some(version) = Version::parse(parts[0]) {
        let status = parts[1]
            .parse::<u16>()
            .ok()
            .filter(|code| (100..=599).contains(code))
            .ok_or_else(malformed)?;
        return Ok(StartLine::Response {
            version,
            status,
            reason: parts[2].to_string(),
        });
    }

    Err(malformed())
}

/// Parse and validate a `Name: Value` header line
pub fn parse_header_line(line: &str) -> Result<(String, String)> {
    let (name, value) = line
        .split_once(':')
        .ok_or_else(|| HubError::MalformedHeader(line.to_string()))?;

    let name = name.trim();
    let value = value.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(HubError::MalformedHeader(line.to_string()));
    }

    validate_header(name, value)?;
    Ok((name.to_string(), value.to_string()))
}

/// Check a known header's value against its domain
///
/// Unrecognized names pass through unchecked.
pub fn validate_header(name: &str, value: &str) -> Result<()> {
    let valid = if name.eq_ignore_ascii_case(headers::CONNECTION) {
        ConnectionDirective::parse(value).is_some()
    } else if name.eq_ignore_ascii_case(headers::CONTENT_LENGTH) {
        matches!(value.parse::<usize>(), Ok(len) if len <= MAX_BODY_SIZE)
    } else if name.eq_ignore_ascii_case(headers::CONTENT_TYPE) {
        let media_type = value.split(';').next().unwrap_or_default().trim();
        media_type.eq_ignore_ascii_case(headers::APPLICATION_JSON)
            || media_type.eq_ignore_ascii_case(headers::TEXT_PLAIN)
    } else if name.eq_ignore_ascii_case(headers::LAMPORT_CLOCK) {
        value.parse::<u64>().is_ok()
    } else {
        true
    };

    if valid {
        Ok(())
    } else {
        Err(HubError::InvalidHeaderValue {
            name: name.to_string(),
            value: value.to_string(),
        })
    }
}

/// Read one line, stripping CRLF (or a bare LF)
///
/// Returns `None` at end of stream before any byte of the line.
fn read_line<R: BufRead + ?Sized>(reader: &mut R) -> Result<Option<String>> {
    let limit = MAX_LINE_LENGTH as u64 + 2;
    let mut buf = Vec::new();
    let read = (&mut *reader).take(limit).read_until(b'\n', &mut buf)?;

    if read == 0 {
        return Ok(None);
    }
    if buf.last() != Some(&b'\n') {
        if read as u64 >= limit {
            return Err(HubError::FrameTooLarge(format!(
                "line longer than {} bytes",
                MAX_LINE_LENGTH
            )));
        }
        return Err(HubError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "stream closed mid-line",
        )));
    }

    buf.pop();
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

/// Read exactly `Content-Length` bytes of body
fn read_body<R: BufRead + ?Sized>(
    reader: &mut R,
    header_map: &Headers,
    required: bool,
) -> Result<Bytes> {
    let expected = match header_map.content_length() {
        Some(len) => len,
        None if required => return Err(HubError::MissingContentLength),
        None => 0,
    };
    if expected == 0 {
        return Ok(Bytes::new());
    }

    let mut body = vec![0u8; expected];
    let mut received = 0;
    while received < expected {
        match reader.read(&mut body[received..]) {
            Ok(0) => return Err(HubError::TruncatedBody { expected, received }),
            Ok(n) => received += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) =>
            {
                return Err(HubError::TruncatedBody { expected, received })
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(Bytes::from(body))
}

/// Decode a request from bytes
pub fn decode_request(bytes: &[u8]) -> Result<Request> {
    Cursor::new(bytes)
        .read_request()?
        .ok_or_else(|| HubError::MalformedStartLine(String::new()))
}

/// Decode a response from bytes
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    Cursor::new(bytes)
        .read_response()?
        .ok_or_else(|| HubError::MalformedStartLine(String::new()))
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode a request to bytes
///
/// Headers are written exactly as set; nothing is added implicitly.
pub fn encode_request(request: &Request) -> Vec<u8> {
    let start = format!(
        "{} {} {}",
        request.method.as_str(),
        request.target,
        request.version.as_str()
    );
    encode_frame(&start, &request.headers, &request.body)
}

/// Encode a response to bytes
pub fn encode_response(response: &Response) -> Vec<u8> {
    let start = format!(
        "{} {} {}",
        response.version.as_str(),
        response.status,
        response.reason
    );
    encode_frame(&start, &response.headers, &response.body)
}

pub fn encode_message(message: &Message) -> Vec<u8> {
    match message {
        Message::Request(request) => encode_request(request),
        Message::Response(response) => encode_response(response),
    }
}

fn encode_frame(start: &str, header_map: &Headers, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(start.len() + 64 * header_map.len() + body.len() + 4);
    out.extend_from_slice(start.as_bytes());
    out.extend_from_slice(CRLF);
    for (name, value) in header_map.iter() {
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(CRLF);
    }
    out.extend_from_slice(CRLF);
    out.extend_from_slice(body);
    out
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Write a request to a stream
pub fn write_request<W: Write>(writer: &mut W, request: &Request) -> Result<()> {
    writer.write_all(&encode_request(request))?;
    writer.flush()?;
    Ok(())
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    writer.write_all(&encode_response(response))?;
    writer.flush()?;
    Ok(())
}
