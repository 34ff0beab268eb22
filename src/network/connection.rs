//! Connection Handler
//!
//! Handles individual client connections.
//!
//! ## Lifecycle
//! ```text
//! AWAIT_REQUEST ──► ROUTE ──► RESPOND ──► (keep-alive) ──► AWAIT_REQUEST
//!       │                        │
//!       │ EOF/reset/timeout      └──► (close) ──► CLOSED
//!       │ framing error ──► 500 + close
//!       └──► CLOSED
//! ```

use std::io::{BufReader, BufWriter};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::protocol::{headers, write_response, ConnectionDirective, FrameReader, Response};

use super::RequestHandler;

/// Handles a single client connection
pub struct Connection {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Routes requests to the engine
    handler: Arc<dyn RequestHandler>,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Create a new connection handler
    ///
    /// Sets up buffered I/O; call `set_timeouts` before `handle`
    pub fn new(stream: TcpStream, handler: Arc<dyn RequestHandler>) -> Result<Self> {
        // Get peer address for logging before we split the stream
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(write_stream),
            handler,
            peer_addr,
        })
    }

    /// Configure connection timeouts (0 disables)
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        let read_stream = self.reader.get_ref();
        let write_stream = self.writer.get_ref();

        if read_ms > 0 {
            read_stream.set_read_timeout(Some(Duration::from_millis(read_ms)))?;
        }
        if write_ms > 0 {
            write_stream.set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }

        Ok(())
    }

    /// Serve requests until the peer closes or asks to close
    ///
    /// Disconnects and timeouts end the loop with `Ok`; a framing error is
    /// answered with a 500 and then ends it with `Ok` as well.
    pub fn handle(&mut self) -> Result<()> {
        debug!(peer = %self.peer_addr, "Connection established");

        loop {
            let request = match self.reader.read_request() {
                Ok(Some(request)) => request,
                Ok(None) => {
                    debug!(peer = %self.peer_addr, "Client closed connection");
                    return Ok(());
                }
                Err(e) if e.is_disconnect() => {
                    debug!(peer = %self.peer_addr, error = %e, "Client disconnected");
                    return Ok(());
                }
                Err(e) if e.is_framing() => {
                    let response = self
                        .handler
                        .framing_error(&e)
                        .with_header(headers::CONNECTION, ConnectionDirective::Close.as_str());
                    let result = self.send_response(&response);
                    return self.finish(result);
                }
                Err(e) => {
                    warn!(peer = %self.peer_addr, error = %e, "Error reading request");
                    return Err(e);
                }
            };

            trace!(
                peer = %self.peer_addr,
                method = %request.method,
                target = %request.target,
                "Received request"
            );

            let keep_alive = request.keep_alive();
            let response = self
                .handler
                .handle(&request)
                .with_version(request.version)
                .with_header(
                    headers::CONNECTION,
                    ConnectionDirective::from_keep_alive(keep_alive).as_str(),
                );

            let result = self.send_response(&response);
            if result.is_err() {
                return self.finish(result);
            }

            if !keep_alive {
                debug!(peer = %self.peer_addr, "Closing connection on request");
                return Ok(());
            }
        }
    }

    /// Map a final write result, treating a vanished peer as a clean close
    fn finish(&self, result: Result<()>) -> Result<()> {
        match result {
            Err(e) if e.is_disconnect() => {
                debug!(
                    peer = %self.peer_addr,
                    error = %e,
                    "Client disconnected before response could be sent"
                );
                Ok(())
            }
            Err(e) => {
                warn!(peer = %self.peer_addr, error = %e, "Error writing response");
                Err(e)
            }
            Ok(()) => Ok(()),
        }
    }

    /// Send a response to the client
    fn send_response(&mut self, response: &Response) -> Result<()> {
        write_response(&mut self.writer, response)
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}
