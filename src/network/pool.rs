//! Worker pool
//!
//! Fixed set of named threads draining an unbounded job queue. Jobs beyond
//! the pool size wait in the queue; nothing is dropped.

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use tracing::{debug, error};

use crate::error::{HubError, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Bounded-concurrency thread pool
pub struct WorkerPool {
    /// Job queue; `None` once the pool is shutting down
    sender: Option<Sender<Job>>,

    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` workers
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(HubError::Config("worker pool needs at least one thread".to_string()));
        }

        let (sender, receiver) = channel::unbounded::<Job>();
        let mut workers = Vec::with_capacity(size);

        for id in 0..size {
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("weatherhub-worker-{}", id))
                .spawn(move || worker_loop(id, receiver))?;
            workers.push(handle);
        }

        Ok(Self {
            sender: Some(sender),
            workers,
        })
    }

    /// Queue a job
    pub fn execute<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| HubError::Network("worker pool is shut down".to_string()))?;
        sender
            .send(Box::new(job))
            .map_err(|_| HubError::Network("worker pool is shut down".to_string()))
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Stop accepting jobs, let queued ones finish, and join every worker
    pub fn shutdown(&mut self) {
        self.sender.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("Worker thread panicked outside a job");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(id: usize, receiver: Receiver<Job>) {
    debug!(worker = id, "Worker started");
    for job in receiver.iter() {
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            error!(worker = id, "Job panicked");
        }
    }
    debug!(worker = id, "Worker stopped");
}
