use std::collections::VecDeque;
use std::sync::Arc;

use super::edit::{LineSink, PendingEdit};
use super::{DisplayLine, Origin, Segment};

/// Default cap on buffered literal characters (512 KiB of text).
pub const BUFFER_CAP: usize = 512 * 1024;

/// Ordered display lines with a running literal-character total.
///
/// Invariant: `total_chars` equals the sum of [`DisplayLine::char_count`] over
/// all lines, and after every batch either `total_chars <= cap` or a single
/// line remains.
#[derive(Debug, Clone)]
pub struct LineBuffer {
    lines: VecDeque<Arc<DisplayLine>>,
    total_chars: usize,
    cap: usize,
    evicted: u64,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::with_cap(BUFFER_CAP)
    }
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cap(cap: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            total_chars: 0,
            cap,
            evicted: 0,
        }
    }

    /// Restores a buffer from previously persisted lines, enforcing `cap`.
    pub fn from_lines(lines: impl IntoIterator<Item = DisplayLine>, cap: usize) -> Self {
        let mut buffer = Self::with_cap(cap);
        for line in lines {
            buffer.total_chars += line.char_count();
            buffer.lines.push_back(Arc::new(line));
        }
        buffer.evict();
        buffer
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn total_chars(&self) -> usize {
        self.total_chars
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Lines removed from the head so far. The line at index `i` has absolute
    /// index `evicted() + i`.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn get(&self, index: usize) -> Option<&DisplayLine> {
        self.lines.get(index).map(Arc::as_ref)
    }

    pub fn lines(&self) -> impl Iterator<Item = &DisplayLine> {
        self.lines.iter().map(Arc::as_ref)
    }

    /// Shares the current lines. Later batches never mutate what this returns.
    pub fn snapshot(&self) -> Vec<Arc<DisplayLine>> {
        self.lines.iter().cloned().collect()
    }

    pub fn to_lines(&self) -> Vec<DisplayLine> {
        self.lines().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.evicted += self.lines.len() as u64;
        self.lines.clear();
        self.total_chars = 0;
    }

    /// Drains `sink` and applies its edits as one batch.
    ///
    /// Returns false when nothing was pending.
    pub fn apply_pending(&mut self, sink: &LineSink) -> bool {
        let pending = sink.take_pending();
        if pending.is_empty() {
            return false;
        }
        self.apply_edits(pending);
        true
    }

    /// Applies `edits` in order, then evicts from the head down to the cap.
    pub fn apply_edits(&mut self, edits: impl IntoIterator<Item = PendingEdit>) {
        for edit in edits {
            match edit {
                PendingEdit::Text { origin, text } => self.append_text(origin, &text),
                PendingEdit::Break { origin } => self.push_line(DisplayLine::new(origin)),
                PendingEdit::Marker => {
                    self.push_line(DisplayLine::from_segments(Origin::Ai, [Segment::Marker]));
                }
            }
        }
        self.evict();
    }

    fn append_text(&mut self, origin: Origin, text: &str) {
        let mut pieces = text.split('\n');
        let first = pieces.next().unwrap_or_default();

        if self.lines.back().map(|line| line.origin()) != Some(origin) {
            self.push_line(DisplayLine::new(origin));
        }
        self.push_to_tail(first);

        for piece in pieces {
            self.push_line(DisplayLine::new(origin));
            self.push_to_tail(piece);
        }
    }

    fn push_to_tail(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(tail) = self.lines.back_mut() {
            // Copy-on-write: a tail shared with a snapshot is cloned first.
            Arc::make_mut(tail).push_text(text);
            self.total_chars += text.chars().count();
        }
    }

    fn push_line(&mut self, line: DisplayLine) {
        self.total_chars += line.char_count();
        self.lines.push_back(Arc::new(line));
    }

    fn evict(&mut self) {
        while self.total_chars > self.cap && self.lines.len() > 1 {
            if let Some(removed) = self.lines.pop_front() {
                self.total_chars -= removed.char_count();
                self.evicted += 1;
            }
        }
    }
}
