use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::Origin;
use crate::lock_unpoisoned;

/// A queued mutation of the line buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingEdit {
    Text { origin: Origin, text: String },
    Break { origin: Origin },
    Marker,
}

/// Producer side of the line buffer: a FIFO of pending edits.
///
/// Cloning shares the queue. Edits become visible only when the owner of the
/// [`LineBuffer`](super::LineBuffer) applies them.
#[derive(Debug, Clone, Default)]
pub struct LineSink {
    pending: Arc<Mutex<VecDeque<PendingEdit>>>,
}

impl LineSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `text` under `origin`, continuing the tail line when origins match.
    pub fn append(&self, origin: Origin, text: impl Into<String>) {
        self.push(PendingEdit::Text {
            origin,
            text: text.into(),
        });
    }

    /// Starts a fresh empty line; the next append never continues the old tail.
    pub fn force_break(&self, origin: Origin) {
        self.push(PendingEdit::Break { origin });
    }

    /// Starts a new AI line whose first segment is the structural marker.
    pub fn mark_structural(&self) {
        self.push(PendingEdit::Marker);
    }

    /// Atomically takes every queued edit in arrival order.
    pub fn take_pending(&self) -> VecDeque<PendingEdit> {
        std::mem::take(&mut *lock_unpoisoned(&self.pending))
    }

    pub fn pending_len(&self) -> usize {
        lock_unpoisoned(&self.pending).len()
    }

    fn push(&self, edit: PendingEdit) {
        lock_unpoisoned(&self.pending).push_back(edit);
    }
}
