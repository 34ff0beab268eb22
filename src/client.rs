//! Client
//!
//! Clock-stamping client used by content servers and the GET client.
//!
//! Every request ticks the client's own Lamport clock and carries the result
//! in `Lamport-Clock`; every response's stamp is merged back. The connection
//! is kept open across requests and re-established when the server closed it.

use std::io::{self, BufReader, BufWriter};
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::clock::LogicalClock;
use crate::error::{HubError, Result};
use crate::protocol::{headers, write_request, FrameReader, Request, Response};
use crate::store::SourceId;

/// Default number of retries after a transport failure
pub const DEFAULT_RETRIES: u32 = 2;

/// Default pause between retries
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

struct Stream {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

/// Client for the aggregation server
pub struct Client {
    addr: String,
    stream: Option<Stream>,
    clock: LogicalClock,
    retries: u32,
    retry_delay: Duration,
    timeout: Option<Duration>,
    user_agent: String,
}

impl Client {
    /// Create a client; the connection is opened on first use
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            stream: None,
            clock: LogicalClock::new(),
            retries: DEFAULT_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            timeout: Some(Duration::from_secs(30)),
            user_agent: format!("weatherhub-client/{}", crate::VERSION),
        }
    }

    /// Create a client and open the connection now
    pub fn connect(addr: impl Into<String>) -> Result<Self> {
        let mut client = Self::new(addr);
        client.ensure_connected()?;
        Ok(client)
    }

    /// Set how many times a transport failure is retried, and the pause between
    pub fn with_retries(mut self, retries: u32, delay: Duration) -> Self {
        self.retries = retries;
        self.retry_delay = delay;
        self
    }

    /// Set the socket read/write timeout (None blocks indefinitely)
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The client's logical clock
    pub fn clock(&self) -> &LogicalClock {
        &self.clock
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Send a request, retrying transport failures
    pub fn send(&mut self, request: Request) -> Result<Response> {
        let mut attempt = 0;
        loop {
            match self.send_once(request.clone()) {
                Ok(response) => return Ok(response),
                Err(e) if attempt < self.retries && is_transport(&e) => {
                    attempt += 1;
                    warn!(
                        addr = %self.addr,
                        error = %e,
                        attempt,
                        "Request failed, retrying"
                    );
                    self.stream = None;
                    thread::sleep(self.retry_delay);
                }
                Err(e) => {
                    self.stream = None;
                    return Err(e);
                }
            }
        }
    }

    /// Submit one observation for a source
    pub fn put_observation(
        &mut self,
        source_id: SourceId,
        body: impl Into<Bytes>,
        content_type: &str,
    ) -> Result<Response> {
        let request = Request::put(format!("/data/{}", source_id)).with_body(body, content_type);
        self.send(request)
    }

    /// Tell the server the source is still alive
    pub fn heartbeat(&mut self, source_id: SourceId) -> Result<Response> {
        self.send(Request::put(format!("/heartbeat/{}", source_id)).with_empty_body())
    }

    /// Ask the server to drop the source now
    pub fn shutdown(&mut self, source_id: SourceId) -> Result<Response> {
        self.send(Request::put(format!("/shutdown/{}", source_id)).with_empty_body())
    }

    /// Latest observation for a station, or overall when `None`
    pub fn get_latest(&mut self, station_id: Option<&str>) -> Result<Response> {
        let target = match station_id {
            Some(station) => format!("/weather/{}", station),
            None => "/weather/recent".to_string(),
        };
        self.send(Request::get(target))
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn send_once(&mut self, request: Request) -> Result<Response> {
        let stamp = self.clock.tick();
        let request = request
            .with_clock(stamp)
            .with_header(headers::USER_AGENT, self.user_agent.as_str());

        self.ensure_connected()?;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| HubError::Network("not connected".to_string()))?;

        write_request(&mut stream.writer, &request)?;
        let response = stream.reader.read_response()?.ok_or_else(|| {
            HubError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "server closed connection before responding",
            ))
        })?;

        if let Some(server_time) = response.clock() {
            self.clock.merge(server_time);
        }
        if !response.keep_alive() {
            debug!(addr = %self.addr, "Server closed connection");
            self.stream = None;
        }

        Ok(response)
    }

    fn ensure_connected(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let stream = TcpStream::connect(&self.addr)
            .map_err(|e| HubError::Network(format!("failed to connect to {}: {}", self.addr, e)))?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(self.timeout)?;
        stream.set_write_timeout(self.timeout)?;

        let read_stream = stream.try_clone()?;
        self.stream = Some(Stream {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
        });
        debug!(addr = %self.addr, "Connected");
        Ok(())
    }
}

/// Failures worth retrying on a fresh connection
fn is_transport(error: &HubError) -> bool {
    matches!(error, HubError::Io(_) | HubError::Network(_))
}
