//! One chat turn at a time: open, watch, read, recover once, report.

mod controller;
mod handle;
mod read_loop;
mod stream;
mod watchdog;

use std::fmt;

use chat_api::SignalKind;

pub use controller::{
    SessionController, CANCELLED_NOTICE, CONNECTION_ERROR_NOTICE, RECOVERY_FAILED_NOTICE,
    RECOVERY_NOTICE,
};
pub use handle::{SessionHandle, SessionState};
pub use read_loop::{read_stream, ReadOutcome};
pub use stream::StreamSession;
pub use watchdog::{Watchdog, WatchdogReader, DEFAULT_STALL_TIMEOUT};

/// Terminal outcome of a send. Exactly one per accepted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed { recovered: bool },
    /// The backend ended the turn with a control signal.
    Signalled(SignalKind),
    Cancelled,
    RecoveryFailed,
    /// The request failed with no way to resume; carries the shown message.
    ConnectionFailed(String),
}

impl SessionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed { recovered: false } => "completed",
            Self::Completed { recovered: true } => "recovered",
            Self::Signalled(_) => "signalled",
            Self::Cancelled => "cancelled",
            Self::RecoveryFailed => "recovery_failed",
            Self::ConnectionFailed(_) => "connection_failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// Another turn is in progress; sends are rejected, never queued.
    Busy,
    EmptyMessage,
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => f.write_str("a message is already being answered"),
            Self::EmptyMessage => f.write_str("message is empty"),
        }
    }
}

impl std::error::Error for SendError {}
