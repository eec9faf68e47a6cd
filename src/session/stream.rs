use std::time::Duration;

use chat_transport::{CancelSignal, ChunkReader, OpenedStream};
use tracing::debug;

use super::handle::SessionHandle;
use super::watchdog::{Watchdog, WatchdogReader};

/// State of one logical request: the current attempt's cancellation and
/// watchdog, its reader, and the resume token captured from the backend.
///
/// Dropping the session disarms the watchdog and releases the reader; each
/// reader is released exactly once.
pub struct StreamSession<R: ChunkReader> {
    id: u64,
    handle: SessionHandle,
    stall_timeout: Duration,
    watchdog: Watchdog,
    reader: Option<R>,
    resume_token: Option<String>,
}

impl<R: ChunkReader> StreamSession<R> {
    pub(super) fn new(id: u64, handle: SessionHandle, stall_timeout: Duration) -> Self {
        let cancel = CancelSignal::new();
        handle.set_active_cancel(Some(cancel.clone()));
        Self {
            id,
            handle,
            stall_timeout,
            watchdog: Watchdog::new(stall_timeout, cancel),
            reader: None,
            resume_token: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn resume_token(&self) -> Option<&str> {
        self.resume_token.as_deref()
    }

    pub(super) fn watchdog_mut(&mut self) -> &mut Watchdog {
        &mut self.watchdog
    }

    /// Retires the current attempt and installs a fresh cancel signal and watchdog.
    pub(super) fn begin_attempt(&mut self) {
        self.watchdog.disarm();
        self.release_reader();
        let cancel = CancelSignal::new();
        self.handle.set_active_cancel(Some(cancel.clone()));
        self.watchdog = Watchdog::new(self.stall_timeout, cancel);
    }

    /// Takes ownership of an opened stream and returns its watchdog-guarded reader.
    ///
    /// A stream without a token keeps the token captured earlier.
    pub(super) fn attach(&mut self, opened: OpenedStream<R>) -> WatchdogReader<'_, R> {
        if let Some(token) = opened.resume_token {
            self.resume_token = Some(token);
        }
        self.release_reader();
        let reader = self.reader.insert(opened.reader);
        WatchdogReader::new(reader, &mut self.watchdog)
    }

    fn release_reader(&mut self) {
        if let Some(mut reader) = self.reader.take() {
            reader.release();
            debug!(session = self.id, "released stream reader");
        }
    }
}

impl<R: ChunkReader> Drop for StreamSession<R> {
    fn drop(&mut self) {
        self.watchdog.disarm();
        self.release_reader();
        self.handle.set_active_cancel(None);
    }
}
