//! Network Module
//!
//! TCP server and connection handling.
//!
//! ## Architecture
//! - Single acceptor thread polling a shutdown flag
//! - Fixed worker pool; one job per accepted connection, excess queued
//! - Requests routed through a `RequestHandler` (the engine-backed
//!   `AggregationHandler` in production)

mod connection;
mod handler;
mod pool;
mod server;

pub use connection::Connection;
pub use handler::{AggregationHandler, RequestHandler, Route};
pub use pool::WorkerPool;
pub use server::{Server, ShutdownHandle};
