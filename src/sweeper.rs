//! Retention Sweeper
//!
//! Background thread that periodically evicts sources that went silent.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Sender};
use crossbeam::select;
use tracing::{debug, error, info};

use crate::engine::Engine;
use crate::error::Result;

/// Handle to a running sweeper; stopping or dropping it joins the thread
pub struct RetentionSweeper {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl RetentionSweeper {
    /// Start sweeping `engine` every `period`
    pub fn spawn(engine: Arc<Engine>, period: Duration) -> Result<Self> {
        let (stop_tx, stop_rx) = channel::bounded::<()>(1);
        let ticker = channel::tick(period);

        let handle = thread::Builder::new()
            .name("weatherhub-sweeper".to_string())
            .spawn(move || {
                debug!(?period, "Retention sweeper started");
                loop {
                    select! {
                        recv(ticker) -> _ => {
                            let report = engine.sweep();
                            if !report.evicted.is_empty() {
                                info!(
                                    evicted = report.evicted.len(),
                                    failed = report.failed.len(),
                                    projection_removed = report.projection_removed,
                                    "Retention sweep finished"
                                );
                            }
                        }
                        recv(stop_rx) -> _ => break,
                    }
                }
                debug!("Retention sweeper stopped");
            })?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Stop the sweeper and wait for it to exit
    pub fn stop(&mut self) {
        // Dropping the sender disconnects the channel, which also wakes select!
        self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Retention sweeper panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for RetentionSweeper {
    fn drop(&mut self) {
        self.stop();
    }
}
