//! Transport-neutral contract for one streamed chat turn.
//!
//! This crate defines only the pull capability over a response body, the
//! open/resume contract a backend transport implements, and the shared
//! cancellation primitive. It contains no HTTP or wire-protocol code.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

/// Why an in-flight attempt was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancelReason {
    /// The user aborted the turn.
    User,
    /// The inactivity watchdog saw no data within its interval.
    Stall,
}

impl CancelReason {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Stall => "stall",
        }
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cancellation primitive shared by user and watchdog aborts.
///
/// The first reason recorded wins; later calls to [`CancelSignal::cancel`] are
/// ignored so a consumer can branch on why the attempt actually ended.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    reason: Arc<watch::Sender<Option<CancelReason>>>,
}

impl CancelSignal {
    #[must_use]
    pub fn new() -> Self {
        let (reason, _) = watch::channel(None);
        Self {
            reason: Arc::new(reason),
        }
    }

    /// Records `reason` unless the signal was already cancelled.
    ///
    /// Returns true when this call performed the cancellation.
    pub fn cancel(&self, reason: CancelReason) -> bool {
        self.reason.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        })
    }

    #[must_use]
    pub fn reason(&self) -> Option<CancelReason> {
        *self.reason.borrow()
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }

    /// Resolves once the signal is cancelled, yielding the recorded reason.
    pub async fn cancelled(&self) -> CancelReason {
        let mut receiver = self.reason.subscribe();
        // The sender lives as long as `self`, so `wait_for` cannot observe a closed channel.
        let reason = match receiver.wait_for(Option::is_some).await {
            Ok(reason) => *reason,
            Err(_) => None,
        };
        reason.unwrap_or(CancelReason::User)
    }

    /// Drives `future` to completion unless the signal fires first.
    pub async fn run<F>(&self, future: F) -> Result<F::Output, TransportError>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            reason = self.cancelled() => Err(TransportError::Cancelled(reason)),
            output = future => Ok(output),
        }
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Error surfaced by a transport while opening or reading a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request could not be sent or the connection failed.
    Connect(String),
    /// The backend answered with a non-success status.
    Status { status: u16, message: String },
    /// The body stream failed after the response was accepted.
    Read(String),
    /// The attempt was aborted through its [`CancelSignal`].
    Cancelled(CancelReason),
}

impl TransportError {
    /// Returns the cancellation reason when this error is a cancellation.
    #[must_use]
    pub fn cancel_reason(&self) -> Option<CancelReason> {
        match self {
            Self::Cancelled(reason) => Some(*reason),
            _ => None,
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(message) | Self::Read(message) => f.write_str(message),
            Self::Status { status, message } if message.is_empty() => {
                write!(f, "Server error: {status}")
            }
            Self::Status { status, message } => write!(f, "Server error: {status} {message}"),
            Self::Cancelled(reason) => write!(f, "request was cancelled ({reason})"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Input for opening the primary stream of a chat turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub content: String,
    pub thread_id: Option<String>,
}

impl ChatRequest {
    #[must_use]
    pub fn new(content: impl Into<String>, thread_id: Option<String>) -> Self {
        Self {
            content: content.into(),
            thread_id,
        }
    }
}

/// Minimal pull capability over a response body.
pub trait ChunkReader: Send {
    /// Pulls the next body chunk. `Ok(None)` marks a clean end of the body.
    fn pull(&mut self)
        -> impl Future<Output = Result<Option<Vec<u8>>, TransportError>> + Send;

    /// Releases the underlying connection. Later pulls report end of body.
    fn release(&mut self) {}
}

/// A successfully opened stream and the resume token issued for it.
#[derive(Debug)]
pub struct OpenedStream<R> {
    pub resume_token: Option<String>,
    pub reader: R,
}

impl<R> OpenedStream<R> {
    #[must_use]
    pub fn new(resume_token: Option<String>, reader: R) -> Self {
        Self {
            resume_token,
            reader,
        }
    }
}

/// Backend transport able to open a chat stream and reattach to a stalled one.
pub trait ChatTransport: Send + Sync + 'static {
    type Reader: ChunkReader + 'static;

    /// Opens the primary stream for `request`.
    fn open_chat(
        &self,
        request: &ChatRequest,
    ) -> impl Future<Output = Result<OpenedStream<Self::Reader>, TransportError>> + Send;

    /// Reopens a stream previously identified by `resume_token`.
    fn open_resume(
        &self,
        resume_token: &str,
    ) -> impl Future<Output = Result<OpenedStream<Self::Reader>, TransportError>> + Send;
}
