//! Poll scheduling with cooperative cancellation.
//!
//! The index is kept current by one loop that sweeps every transcript file at
//! a fixed interval. [`Scheduler::run`] invokes its callback once right away,
//! then once per interval until the paired [`ShutdownTrigger`] fires or is
//! dropped. The wait between ticks is the only suspension point; a sweep in
//! progress always runs to completion.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// Sending half of a shutdown channel. Safe to move into a signal handler.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: Sender<()>,
}

impl ShutdownTrigger {
    /// Request shutdown. Returns `false` if the loop already stopped.
    pub fn trigger(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

/// Receiving half observed by the poll loop.
#[derive(Debug)]
pub struct ShutdownSignal {
    rx: Receiver<()>,
}

impl ShutdownSignal {
    /// Block for up to `timeout`; `true` means shutdown was requested.
    pub fn wait(&self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
        }
    }

    /// Non-blocking check.
    pub fn is_triggered(&self) -> bool {
        self.wait(Duration::ZERO)
    }
}

/// Create a linked trigger/signal pair.
pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = mpsc::channel();
    (ShutdownTrigger { tx }, ShutdownSignal { rx })
}

/// Fixed-interval scheduler.
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    interval: Duration,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run `tick` now and then every interval until `shutdown` fires.
    ///
    /// Returns the number of ticks executed.
    pub fn run<F>(&self, shutdown: &ShutdownSignal, mut tick: F) -> u64
    where
        F: FnMut(u64),
    {
        let mut iteration = 0u64;
        loop {
            iteration += 1;
            tick(iteration);
            if shutdown.wait(self.interval) {
                tracing::info!(iterations = iteration, "Poll loop stopped");
                return iteration;
            }
        }
    }
}
