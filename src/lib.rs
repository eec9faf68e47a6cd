//! Terminal chat client for a streaming AI backend.
//!
//! - [`session`]: one turn at a time over a [`chat_transport::ChatTransport`], with an
//!   inactivity watchdog and a single resume attempt after a stall.
//! - [`lines`]: the bounded transcript, fed through a queue of pending edits that is
//!   applied once per frame.
//! - [`render`], [`status`], [`input`], [`app`]: the line-mode front-end, with a
//!   prompt editor and input recall on a terminal.
//! - [`history`]: persistence of the transcript through `transcript_store`.

use std::sync::{Mutex, MutexGuard};

pub mod app;
pub mod config;
pub mod history;
pub mod input;
pub mod lines;
pub mod logging;
pub mod render;
pub mod session;
pub mod status;

pub use lines::{DisplayLine, LineBuffer, LineSink, Origin, PendingEdit, Segment};
pub use session::{SendError, SessionController, SessionHandle, SessionOutcome, SessionState};

pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
