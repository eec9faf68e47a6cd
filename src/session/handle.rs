use std::sync::{Arc, Mutex};

use chat_transport::{CancelReason, CancelSignal};
use tokio::sync::watch;

use crate::lock_unpoisoned;

/// Observable state of the session controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    /// Request sent, no body byte yet.
    Sending,
    Streaming,
    Stalled,
    Recovering,
}

impl SessionState {
    pub fn is_busy(&self) -> bool {
        !matches!(self, Self::Idle)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Sending => "sending",
            Self::Streaming => "streaming",
            Self::Stalled => "stalled",
            Self::Recovering => "recovering",
        }
    }
}

#[derive(Debug)]
struct Shared {
    state: watch::Sender<SessionState>,
    active_cancel: Mutex<Option<CancelSignal>>,
}

/// Cloneable view of the controller used by the surrounding application.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    shared: Arc<Shared>,
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHandle {
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            shared: Arc::new(Shared {
                state,
                active_cancel: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.shared.state.borrow()
    }

    pub fn is_busy(&self) -> bool {
        self.state().is_busy()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    /// Cancels the active attempt on behalf of the user.
    ///
    /// Returns false when nothing was in flight or it was already cancelled.
    pub fn cancel(&self) -> bool {
        lock_unpoisoned(&self.shared.active_cancel)
            .as_ref()
            .is_some_and(|signal| signal.cancel(CancelReason::User))
    }

    /// Moves `Idle -> Sending`; false if a session is already active.
    pub(crate) fn try_begin(&self) -> bool {
        self.shared.state.send_if_modified(|state| {
            if *state != SessionState::Idle {
                return false;
            }
            *state = SessionState::Sending;
            true
        })
    }

    pub(crate) fn set_state(&self, state: SessionState) {
        self.shared.state.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
    }

    pub(crate) fn set_active_cancel(&self, cancel: Option<CancelSignal>) {
        *lock_unpoisoned(&self.shared.active_cancel) = cancel;
    }
}

/// Returns the handle to `Idle` when dropped, on every exit path of a send.
pub(crate) struct BusyGuard {
    handle: SessionHandle,
}

impl BusyGuard {
    pub(crate) fn new(handle: SessionHandle) -> Self {
        Self { handle }
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.handle.set_active_cancel(None);
        self.handle.set_state(SessionState::Idle);
    }
}
