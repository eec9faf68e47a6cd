use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chat_api::SignalKind;
use chat_transport::{ChatRequest, ChatTransport, TransportError};
use tracing::{info, warn};

use super::handle::{BusyGuard, SessionHandle, SessionState};
use super::read_loop::{interrupted, read_stream, ReadOutcome};
use super::stream::StreamSession;
use super::watchdog::DEFAULT_STALL_TIMEOUT;
use super::{SendError, SessionOutcome};
use crate::lines::{LineSink, Origin};

/// System notice printed when a stalled stream is being resumed.
pub const RECOVERY_NOTICE: &str = "\n... ";
pub const RECOVERY_FAILED_NOTICE: &str = "[recovery failed.]";
pub const CANCELLED_NOTICE: &str = "^C";
/// Shown when a stream fails without a message of its own.
pub const CONNECTION_ERROR_NOTICE: &str = "[error connecting to the ai service]";

/// Orchestrates one chat turn at a time against a [`ChatTransport`].
///
/// A turn opens the primary stream, reads it through the inactivity watchdog,
/// and on a stall with a known resume token makes exactly one recovery
/// attempt. Every outcome is written to the [`LineSink`] and the controller
/// returns to [`SessionState::Idle`] on every exit path.
pub struct SessionController<T: ChatTransport> {
    transport: T,
    sink: LineSink,
    thread_id: Option<String>,
    stall_timeout: Duration,
    handle: SessionHandle,
    next_session_id: AtomicU64,
}

impl<T: ChatTransport> SessionController<T> {
    pub fn new(transport: T, sink: LineSink) -> Self {
        Self {
            transport,
            sink,
            thread_id: None,
            stall_timeout: DEFAULT_STALL_TIMEOUT,
            handle: SessionHandle::new(),
            next_session_id: AtomicU64::new(1),
        }
    }

    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn with_stall_timeout(mut self, stall_timeout: Duration) -> Self {
        self.stall_timeout = stall_timeout;
        self
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn sink(&self) -> &LineSink {
        &self.sink
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    /// Sends `message` and drives the turn to a terminal outcome.
    ///
    /// Rejected without side effects while another turn is active.
    pub async fn send(&self, message: &str) -> Result<SessionOutcome, SendError> {
        if message.trim().is_empty() {
            return Err(SendError::EmptyMessage);
        }
        if !self.handle.try_begin() {
            warn!("send rejected: a turn is already in progress");
            return Err(SendError::Busy);
        }
        let _busy = BusyGuard::new(self.handle.clone());

        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        info!(session = id, chars = message.chars().count(), "sending message");

        self.sink.force_break(Origin::User);
        self.sink.append(Origin::User, format!("> {message}"));
        self.sink.force_break(Origin::Ai);

        let mut session = StreamSession::new(id, self.handle.clone(), self.stall_timeout);
        let outcome = self.run(&mut session, message).await;
        drop(session);

        info!(session = id, outcome = outcome.as_str(), "turn finished");
        Ok(outcome)
    }

    async fn run(&self, session: &mut StreamSession<T::Reader>, message: &str) -> SessionOutcome {
        let request = ChatRequest::new(message, self.thread_id.clone());
        match self.primary_attempt(session, &request).await {
            Ok(ReadOutcome::Completed) => {
                self.sink.force_break(Origin::Ai);
                SessionOutcome::Completed { recovered: false }
            }
            Ok(ReadOutcome::Signalled(kind)) => self.signalled(session.id(), kind),
            Ok(ReadOutcome::Cancelled) => self.user_cancelled(),
            Ok(ReadOutcome::Stalled) => self.recover(session).await,
            Err(error) => self.connection_failed(&error),
        }
    }

    async fn primary_attempt(
        &self,
        session: &mut StreamSession<T::Reader>,
        request: &ChatRequest,
    ) -> Result<ReadOutcome, TransportError> {
        // The open itself is covered by the watchdog.
        session.watchdog_mut().arm();
        let opened = match session
            .watchdog_mut()
            .guard(self.transport.open_chat(request))
            .await
            .and_then(|opened| opened)
        {
            Ok(opened) => opened,
            Err(error) => return interrupted(error),
        };
        match opened.resume_token.as_deref() {
            Some(token) => info!(session = session.id(), resume_token = token, "stream accepted"),
            None => info!(session = session.id(), "stream accepted without resume token"),
        }

        let handle = self.handle.clone();
        let mut reader = session.attach(opened);
        read_stream(&mut reader, &self.sink, false, move || {
            handle.set_state(SessionState::Streaming);
        })
        .await
    }

    async fn recover(&self, session: &mut StreamSession<T::Reader>) -> SessionOutcome {
        let Some(token) = session.resume_token().map(ToOwned::to_owned) else {
            warn!(session = session.id(), "stream stalled before a resume token was issued");
            return self.connection_failed_with(CONNECTION_ERROR_NOTICE.to_string());
        };

        self.handle.set_state(SessionState::Stalled);
        warn!(session = session.id(), resume_token = %token, "stream stalled; resuming");
        self.handle.set_state(SessionState::Recovering);
        self.sink.append(Origin::System, RECOVERY_NOTICE);

        session.begin_attempt();
        match self.recovery_attempt(session, &token).await {
            Ok(ReadOutcome::Completed) => {
                self.sink.force_break(Origin::Ai);
                info!(session = session.id(), "stream recovered");
                SessionOutcome::Completed { recovered: true }
            }
            Ok(ReadOutcome::Signalled(kind)) => self.signalled(session.id(), kind),
            Ok(ReadOutcome::Cancelled) => self.user_cancelled(),
            Ok(ReadOutcome::Stalled) => self.recovery_failed(session.id(), "stalled again"),
            Err(error) => self.recovery_failed(session.id(), &error.to_string()),
        }
    }

    async fn recovery_attempt(
        &self,
        session: &mut StreamSession<T::Reader>,
        token: &str,
    ) -> Result<ReadOutcome, TransportError> {
        session.watchdog_mut().arm();
        let opened = match session
            .watchdog_mut()
            .guard(self.transport.open_resume(token))
            .await
            .and_then(|opened| opened)
        {
            Ok(opened) => opened,
            Err(error) => return interrupted(error),
        };

        let mut reader = session.attach(opened);
        read_stream(&mut reader, &self.sink, true, || {}).await
    }

    // The signal text already ended on a system break; the turn still closes
    // on an ai row like a completed one.
    fn signalled(&self, id: u64, kind: SignalKind) -> SessionOutcome {
        warn!(session = id, signal = kind.as_str(), "backend ended the turn");
        self.sink.force_break(Origin::Ai);
        SessionOutcome::Signalled(kind)
    }

    fn user_cancelled(&self) -> SessionOutcome {
        self.sink.append(Origin::System, CANCELLED_NOTICE);
        self.sink.force_break(Origin::System);
        SessionOutcome::Cancelled
    }

    fn recovery_failed(&self, id: u64, reason: &str) -> SessionOutcome {
        warn!(session = id, reason, "stream recovery failed");
        self.sink.append(Origin::System, RECOVERY_FAILED_NOTICE);
        self.sink.force_break(Origin::System);
        SessionOutcome::RecoveryFailed
    }

    fn connection_failed(&self, error: &TransportError) -> SessionOutcome {
        let message = error.to_string();
        if message.trim().is_empty() {
            self.connection_failed_with(CONNECTION_ERROR_NOTICE.to_string())
        } else {
            warn!(%error, "chat request failed");
            self.connection_failed_with(message)
        }
    }

    fn connection_failed_with(&self, message: String) -> SessionOutcome {
        self.sink.force_break(Origin::System);
        self.sink.append(Origin::System, message.clone());
        self.sink.force_break(Origin::System);
        SessionOutcome::ConnectionFailed(message)
    }
}
