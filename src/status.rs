//! Busy indicator: spinner frames plus rotating status texts.
//!
//! Frames are derived from elapsed time, so the ticker holds no timer of its
//! own and nothing outlives the busy period.

use std::time::{Duration, Instant};

use crate::session::SessionState;

pub const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
pub const LOADING_TEXTS: [&str; 4] = [
    "Thinking...",
    "Retrieving info...",
    "Processing...",
    "Evaluating...",
];
pub const SPINNER_INTERVAL: Duration = Duration::from_millis(80);
pub const STATUS_TEXT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
pub struct StatusTicker {
    busy_since: Option<Instant>,
    texts_since: Option<Instant>,
}

impl StatusTicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks `state` and returns the status line to show, if any.
    ///
    /// The spinner runs while busy; status texts rotate only until the first
    /// streamed byte (`Sending`).
    pub fn observe(&mut self, state: SessionState, now: Instant) -> Option<String> {
        if !state.is_busy() {
            self.busy_since = None;
            self.texts_since = None;
            return None;
        }

        let busy_since = *self.busy_since.get_or_insert(now);
        let frame = spinner_frame(now.saturating_duration_since(busy_since));

        if state != SessionState::Sending {
            self.texts_since = None;
            return Some(frame.to_string());
        }
        let texts_since = *self.texts_since.get_or_insert(now);
        let text = status_text(now.saturating_duration_since(texts_since));
        Some(format!("{frame} {text}"))
    }

    pub fn is_running(&self) -> bool {
        self.busy_since.is_some()
    }
}

pub fn spinner_frame(elapsed: Duration) -> &'static str {
    let index = (elapsed.as_millis() / SPINNER_INTERVAL.as_millis()) as usize;
    SPINNER_FRAMES[index % SPINNER_FRAMES.len()]
}

pub fn status_text(elapsed: Duration) -> &'static str {
    let index = (elapsed.as_millis() / STATUS_TEXT_INTERVAL.as_millis()) as usize;
    LOADING_TEXTS[index % LOADING_TEXTS.len()]
}
