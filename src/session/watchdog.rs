//! Inactivity watchdog, composed over a [`ChunkReader`] as a decorator.

use std::future::Future;
use std::time::Duration;

use chat_transport::{CancelReason, CancelSignal, ChunkReader, TransportError};
use tokio::time::{sleep_until, Instant};
use tracing::warn;

/// Default inactivity interval before a stream is considered stalled.
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_millis(15_000);

/// Cancels its [`CancelSignal`] with [`CancelReason::Stall`] when a guarded
/// future does not finish before the armed deadline.
#[derive(Debug)]
pub struct Watchdog {
    interval: Duration,
    deadline: Option<Instant>,
    cancel: CancelSignal,
}

impl Watchdog {
    pub fn new(interval: Duration, cancel: CancelSignal) -> Self {
        Self {
            interval,
            deadline: None,
            cancel,
        }
    }

    /// Starts (or restarts) the inactivity timer from now.
    pub fn arm(&mut self) {
        self.deadline = Some(Instant::now() + self.interval);
    }

    pub fn reset(&mut self) {
        self.arm();
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Drives `future` until it finishes, the signal is cancelled, or the
    /// deadline passes. An unarmed watchdog never fires.
    pub async fn guard<F>(&self, future: F) -> Result<F::Output, TransportError>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            reason = self.cancel.cancelled() => Err(TransportError::Cancelled(reason)),
            output = future => Ok(output),
            () = expire(self.deadline) => {
                warn!(
                    timeout_ms = self.interval.as_millis() as u64,
                    "no data received within the inactivity interval"
                );
                self.cancel.cancel(CancelReason::Stall);
                // Another reason may have been recorded first.
                let reason = self.cancel.reason().unwrap_or(CancelReason::Stall);
                Err(TransportError::Cancelled(reason))
            }
        }
    }
}

async fn expire(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// [`ChunkReader`] decorator that resets the watchdog before every pull.
#[derive(Debug)]
pub struct WatchdogReader<'a, R> {
    inner: &'a mut R,
    watchdog: &'a mut Watchdog,
}

impl<'a, R: ChunkReader> WatchdogReader<'a, R> {
    pub fn new(inner: &'a mut R, watchdog: &'a mut Watchdog) -> Self {
        Self { inner, watchdog }
    }
}

impl<R: ChunkReader> ChunkReader for WatchdogReader<'_, R> {
    async fn pull(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        self.watchdog.reset();
        self.watchdog.guard(self.inner.pull()).await?
    }

    fn release(&mut self) {
        self.inner.release();
    }
}
