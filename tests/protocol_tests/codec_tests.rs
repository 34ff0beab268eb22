//! Codec Tests
//!
//! Tests for message framing: start lines, headers, bodies and keep-alive.

use std::io::{BufReader, Cursor, Read};

use weatherhub::error::HubError;
use weatherhub::protocol::{
    decode_request, decode_response, encode_request, encode_response, headers, parse_start_line,
    read_message, write_request, write_response, FrameReader, Message, Method, Request, Response,
    StartLine, Version, MAX_HEADER_COUNT, MAX_LINE_LENGTH,
};

// =============================================================================
// Helper Functions
// =============================================================================

fn reader(bytes: &[u8]) -> Cursor<Vec<u8>> {
    Cursor::new(bytes.to_vec())
}

/// Reader that yields its bytes in one-byte reads
struct Trickle {
    data: Vec<u8>,
    pos: usize,
}

impl Read for Trickle {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.pos >= self.data.len() || buf.is_empty() {
            return Ok(0);
        }
        buf[0] = self.data[self.pos];
        self.pos += 1;
        Ok(1)
    }
}

// =============================================================================
// Start Line Tests
// =============================================================================

#[test]
fn test_parse_request_start_line() {
    let start = parse_start_line("GET /weather/IDS60901 HTTP/1.1").unwrap();
    assert_eq!(
        start,
        StartLine::Request {
            method: Method::Get,
            target: "/weather/IDS60901".to_string(),
            version: Version::Http11,
        }
    );
}

#[test]
fn test_parse_response_reason_with_spaces() {
    let start = parse_start_line("HTTP/1.0 500 Internal Server Error").unwrap();
    assert_eq!(
        start,
        StartLine::Response {
            version: Version::Http10,
            status: 500,
            reason: "Internal Server Error".to_string(),
        }
    );
}

#[test]
fn test_start_line_wrong_token_count() {
    assert!(matches!(
        parse_start_line("GET /weather"),
        Err(HubError::MalformedStartLine(_))
    ));
    assert!(matches!(
        parse_start_line("GET /weather HTTP/1.1 extra"),
        Err(HubError::MalformedStartLine(_))
    ));
}

#[test]
fn test_start_line_unknown_verb_and_version() {
    assert!(parse_start_line("PATCH /data HTTP/1.1").is_err());
    assert!(parse_start_line("GET /data HTTP/2").is_err());
    assert!(parse_start_line("HTTP/1.1 abc OK").is_err());
    assert!(parse_start_line("HTTP/1.1 99 Low").is_err());
}

#[test]
fn test_start_line_target_must_be_absolute() {
    assert!(parse_start_line("GET weather HTTP/1.1").is_err());
}

// =============================================================================
// Header Tests
// =============================================================================

#[test]
fn test_header_names_case_insensitive() {
    let raw = b"PUT /data/x HTTP/1.1\r\ncontent-length: 2\r\nLAMPORT-CLOCK: 7\r\n\r\nok";
    let request = reader(raw).read_request().unwrap().unwrap();

    assert_eq!(request.headers.content_length(), Some(2));
    assert_eq!(request.clock(), Some(7));
    assert_eq!(request.headers.get("Content-Length"), Some("2"));
}

#[test]
fn test_header_without_colon_rejected() {
    let raw = b"GET / HTTP/1.1\r\nNoColonHere\r\n\r\n";
    assert!(matches!(
        reader(raw).read_request(),
        Err(HubError::MalformedHeader(_))
    ));
}

#[test]
fn test_invalid_known_header_values() {
    let cases: [&[u8]; 4] = [
        b"GET / HTTP/1.1\r\nConnection: maybe\r\n\r\n",
        b"GET / HTTP/1.1\r\nContent-Length: -4\r\n\r\n",
        b"GET / HTTP/1.1\r\nContent-Type: image/png\r\n\r\n",
        b"GET / HTTP/1.1\r\nLamport-Clock: soon\r\n\r\n",
    ];
    for raw in cases {
        assert!(
            matches!(
                reader(raw).read_request(),
                Err(HubError::InvalidHeaderValue { .. })
            ),
            "accepted {:?}",
            String::from_utf8_lossy(raw)
        );
    }
}

#[test]
fn test_content_type_parameters_allowed() {
    let raw = b"GET / HTTP/1.1\r\nContent-Type: application/json; charset=utf-8\r\n\r\n";
    assert!(reader(raw).read_request().unwrap().is_some());
}

#[test]
fn test_unknown_headers_carried_through() {
    let raw = b"GET / HTTP/1.1\r\nX-Station-Group: coastal\r\n\r\n";
    let request = reader(raw).read_request().unwrap().unwrap();
    assert_eq!(request.headers.get("x-station-group"), Some("coastal"));

    let encoded = encode_request(&request);
    assert!(String::from_utf8_lossy(&encoded).contains("X-Station-Group: coastal\r\n"));
}

#[test]
fn test_too_many_headers() {
    let mut raw = b"GET / HTTP/1.1\r\n".to_vec();
    for i in 0..=MAX_HEADER_COUNT {
        raw.extend_from_slice(format!("X-H{}: v\r\n", i).as_bytes());
    }
    raw.extend_from_slice(b"\r\n");

    assert!(matches!(
        reader(&raw).read_request(),
        Err(HubError::FrameTooLarge(_))
    ));
}

#[test]
fn test_line_too_long() {
    let mut raw = b"GET /".to_vec();
    raw.extend(std::iter::repeat(b'a').take(MAX_LINE_LENGTH + 10));
    raw.extend_from_slice(b" HTTP/1.1\r\n\r\n");

    assert!(matches!(
        reader(&raw).read_request(),
        Err(HubError::FrameTooLarge(_))
    ));
}

// =============================================================================
// Body Tests
// =============================================================================

#[test]
fn test_body_exact_length() {
    let raw = b"PUT /data/x HTTP/1.1\r\nContent-Length: 5\r\n\r\nhelloEXTRA";
    let mut stream = reader(raw);
    let request = stream.read_request().unwrap().unwrap();

    assert_eq!(&request.body[..], b"hello");
    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).unwrap();
    assert_eq!(rest, b"EXTRA");
}

#[test]
fn test_truncated_body() {
    let raw = b"PUT /data/x HTTP/1.1\r\nContent-Length: 10\r\n\r\nhello";
    match reader(raw).read_request() {
        Err(HubError::TruncatedBody { expected, received }) => {
            assert_eq!(expected, 10);
            assert_eq!(received, 5);
        }
        other => panic!("expected TruncatedBody, got {:?}", other),
    }
}

#[test]
fn test_put_requires_content_length() {
    let raw = b"PUT /data/x HTTP/1.1\r\n\r\n";
    assert!(matches!(
        reader(raw).read_request(),
        Err(HubError::MissingContentLength)
    ));
}

#[test]
fn test_response_requires_content_length() {
    let raw = b"HTTP/1.1 200 OK\r\n\r\n";
    assert!(matches!(
        reader(raw).read_response(),
        Err(HubError::MissingContentLength)
    ));
}

#[test]
fn test_get_without_length_has_empty_body() {
    let raw = b"GET /weather HTTP/1.1\r\n\r\n";
    let request = reader(raw).read_request().unwrap().unwrap();
    assert!(request.body.is_empty());
}

#[test]
fn test_body_read_across_small_reads() {
    let raw = b"PUT /data/x HTTP/1.1\r\nContent-Length: 11\r\n\r\nhello world".to_vec();
    let mut stream = BufReader::with_capacity(
        4,
        Trickle {
            data: raw,
            pos: 0,
        },
    );
    let request = stream.read_request().unwrap().unwrap();
    assert_eq!(&request.body[..], b"hello world");
}

// =============================================================================
// End-of-Stream Tests
// =============================================================================

#[test]
fn test_empty_stream_is_no_message() {
    assert!(reader(b"").read_message().unwrap().is_none());
}

#[test]
fn test_empty_first_line_is_no_message() {
    assert!(reader(b"\r\n").read_message().unwrap().is_none());
}

#[test]
fn test_eof_inside_headers_is_disconnect() {
    let err = reader(b"GET / HTTP/1.1\r\nHost: x\r\n").read_request().unwrap_err();
    assert!(err.is_disconnect());
}

#[test]
fn test_bare_lf_tolerated() {
    let raw = b"GET /weather HTTP/1.1\nConnection: close\n\n";
    let request = reader(raw).read_request().unwrap().unwrap();
    assert_eq!(request.path(), "/weather");
    assert!(!request.keep_alive());
}

// =============================================================================
// Keep-Alive Tests
// =============================================================================

#[test]
fn test_keep_alive_defaults() {
    let http11 = decode_request(b"GET / HTTP/1.1\r\n\r\n").unwrap();
    let http10 = decode_request(b"GET / HTTP/1.0\r\n\r\n").unwrap();
    assert!(http11.keep_alive());
    assert!(!http10.keep_alive());
}

#[test]
fn test_keep_alive_overrides() {
    let http11 = decode_request(b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n").unwrap();
    let http10 = decode_request(b"GET / HTTP/1.0\r\nConnection: Keep-Alive\r\n\r\n").unwrap();
    assert!(!http11.keep_alive());
    assert!(http10.keep_alive());
}

// =============================================================================
// Serialization Tests
// =============================================================================

#[test]
fn test_request_serialize_then_parse() {
    let request = Request::put("/data/5b0f6c2e-8d1e-4a51-9f5a-3c0a2b7d9e11")
        .with_body(r#"{"id": "IDS60901"}"#, headers::APPLICATION_JSON)
        .with_clock(42);

    let parsed = decode_request(&encode_request(&request)).unwrap();
    assert_eq!(parsed, request);
}

#[test]
fn test_response_serialize_then_parse() {
    let response = Response::json(201, "{}").with_header(headers::LAMPORT_CLOCK, "9");
    let parsed = decode_response(&encode_response(&response)).unwrap();

    assert_eq!(parsed.status, 201);
    assert_eq!(parsed.reason, "Created");
    assert_eq!(parsed.clock(), Some(9));
    assert_eq!(parsed, response);
}

#[test]
fn test_no_implicit_headers_or_trailing_newline() {
    let request = Request::get("/weather");
    assert_eq!(encode_request(&request), b"GET /weather HTTP/1.1\r\n\r\n");

    let response = Response::text(200, "ok");
    let encoded = encode_response(&response);
    assert!(encoded.ends_with(b"\r\n\r\nok"));
}

#[test]
fn test_stream_multiple_messages() {
    let mut buf = Vec::new();
    write_request(&mut buf, &Request::get("/weather/A")).unwrap();
    write_request(
        &mut buf,
        &Request::put("/heartbeat/x").with_empty_body().with_clock(3),
    )
    .unwrap();
    write_response(&mut buf, &Response::text(404, "missing")).unwrap();

    let mut stream = Cursor::new(buf);
    let first = stream.read_request().unwrap().unwrap();
    let second = stream.read_request().unwrap().unwrap();
    let third = stream.read_response().unwrap().unwrap();

    assert_eq!(first.target, "/weather/A");
    assert_eq!(second.method, Method::Put);
    assert_eq!(second.clock(), Some(3));
    assert_eq!(third.status, 404);
    assert_eq!(third.body_text(), "missing");
    assert!(stream.read_message().unwrap().is_none());
}

#[test]
fn test_read_message_distinguishes_direction() {
    let mut stream = reader(b"HTTP/1.1 204 No Content\r\nContent-Length: 0\r\n\r\n");
    match read_message(&mut stream).unwrap() {
        Some(Message::Response(response)) => assert_eq!(response.status, 204),
        other => panic!("expected response, got {:?}", other),
    }

    let mut stream = reader(b"HTTP/1.1 204 No Content\r\nContent-Length: 0\r\n\r\n");
    assert!(stream.read_request().is_err());
}

// =============================================================================
// Wire Format Tests
// =============================================================================

#[test]
fn test_wire_format_response() {
    let response = Response::text(200, "hi").with_header(headers::CONNECTION, "close");
    let encoded = String::from_utf8(encode_response(&response)).unwrap();

    assert_eq!(
        encoded,
        "HTTP/1.1 200 OK\r\nContent-Length: 2\r\nContent-Type: text/plain\r\nConnection: close\r\n\r\nhi"
    );
}
