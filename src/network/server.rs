//! TCP Server
//!
//! Accepts connections and dispatches them to the worker pool.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{HubError, Result};

use super::{Connection, RequestHandler, WorkerPool};

/// How long the acceptor sleeps when no connection is pending
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Cloneable handle that stops a running server
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// TCP server for the aggregation service
pub struct Server {
    config: Config,
    handler: Arc<dyn RequestHandler>,
    listener: Option<TcpListener>,
    shutdown: Arc<AtomicBool>,
}

impl Server {
    /// Create a new server with the given config and request handler
    pub fn new(config: Config, handler: Arc<dyn RequestHandler>) -> Self {
        Self {
            config,
            handler,
            listener: None,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Bind the listen address, returning the bound address
    ///
    /// Port 0 binds an ephemeral port.
    pub fn bind(&mut self) -> Result<SocketAddr> {
        let listener = TcpListener::bind(&self.config.listen_addr).map_err(|e| {
            HubError::Network(format!("failed to bind {}: {}", self.config.listen_addr, e))
        })?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;
        self.listener = Some(listener);
        Ok(addr)
    }

    /// Address the server is bound to, if bound
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            flag: Arc::clone(&self.shutdown),
        }
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Accept connections until shut down (blocking)
    ///
    /// Binds first if `bind` was not called. On shutdown the pool is drained:
    /// connections already accepted are served to completion.
    pub fn run(&mut self) -> Result<()> {
        if self.listener.is_none() {
            self.bind()?;
        }
        let listener = self
            .listener
            .take()
            .ok_or_else(|| HubError::Network("listener not bound".to_string()))?;

        let mut pool = WorkerPool::new(self.config.max_connections)?;
        info!(
            addr = %listener.local_addr()?,
            workers = pool.size(),
            "Server listening"
        );

        while !self.shutdown.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, peer)) => {
                    debug!(%peer, "Accepted connection");
                    if let Err(e) = self.dispatch(&pool, stream) {
                        error!(%peer, error = %e, "Failed to dispatch connection");
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    error!(error = %e, "Accept failed");
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        info!("Server stopping, draining workers");
        pool.shutdown();
        info!("Server stopped");
        Ok(())
    }

    /// Hand one accepted stream to the pool
    fn dispatch(&self, pool: &WorkerPool, stream: TcpStream) -> Result<()> {
        stream.set_nonblocking(false)?;
        let handler = Arc::clone(&self.handler);
        let read_ms = self.config.read_timeout_ms;
        let write_ms = self.config.write_timeout_ms;

        pool.execute(move || {
            let mut connection = match Connection::new(stream, handler) {
                Ok(connection) => connection,
                Err(e) => {
                    warn!(error = %e, "Failed to set up connection");
                    return;
                }
            };
            if let Err(e) = connection.set_timeouts(read_ms, write_ms) {
                warn!(peer = connection.peer_addr(), error = %e, "Failed to set timeouts");
                return;
            }
            if let Err(e) = connection.handle() {
                warn!(peer = connection.peer_addr(), error = %e, "Connection ended with error");
            }
        })
    }
}
