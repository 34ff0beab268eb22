//! # weatherhub
//!
//! A weather observation aggregation server with:
//! - Lamport-clock ordering of updates from independent content servers
//! - Bounded per-source history and a per-station "latest" projection
//! - Staleness-based eviction of sources that go silent
//! - Crash-consistent persistence (whole-record overwrite, atomic rename)
//! - A hand-rolled HTTP/1.x transport with keep-alive
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              TCP Server (acceptor + worker pool)            │
//! │          content servers (PUT) / GET clients (GET)          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ framed requests
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                 AggregationHandler (routes)                 │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                          Engine                             │
//! └──────┬──────────────────────┬────────────────────────┬──────┘
//!        │                      │                        │
//!        ▼                      ▼                        ▼
//!  ┌─────────────┐     ┌──────────────────┐     ┌────────────────┐
//!  │ LogicalClock│     │ AggregationStore │     │ Persistence    │
//!  │  (Mutex)    │     │     (Mutex)      │     │ Manager        │
//!  └─────────────┘     └────────▲─────────┘     └────────────────┘
//!                               │
//!                      ┌────────┴─────────┐
//!                      │ RetentionSweeper │
//!                      └──────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod client;
pub mod clock;
pub mod engine;
pub mod network;
pub mod persist;
pub mod protocol;
pub mod store;
pub mod sweeper;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use client::Client;
pub use clock::{ClockOrdering, LogicalClock};
pub use config::{Config, SyncStrategy};
pub use engine::{Engine, SubmitReceipt, SweepReport};
pub use error::{HubError, Result};
pub use store::{ApplyOutcome, Observation, SourceId};
pub use sweeper::RetentionSweeper;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of weatherhub
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
