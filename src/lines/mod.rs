//! Bounded, render-ready transcript lines.
//!
//! Producers push [`PendingEdit`]s through a cloneable [`LineSink`]; the
//! render loop drains the queue once per frame with
//! [`LineBuffer::apply_pending`]. Only the tail line is ever mutated, and only
//! through copy-on-write, so a snapshot taken before a batch never changes.

mod buffer;
mod edit;

pub use buffer::{LineBuffer, BUFFER_CAP};
pub use edit::{LineSink, PendingEdit};

/// Who produced a line. Fixed when the line is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    User,
    Ai,
    System,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Ai => "ai",
            Self::System => "system",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    /// Structural prefix indicator shown before an AI reply.
    Marker,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayLine {
    origin: Origin,
    segments: Vec<Segment>,
}

impl DisplayLine {
    pub fn new(origin: Origin) -> Self {
        Self {
            origin,
            segments: Vec::new(),
        }
    }

    /// Builds a line from stored segments. Empty text segments are dropped.
    pub fn from_segments(origin: Origin, segments: impl IntoIterator<Item = Segment>) -> Self {
        let mut line = Self::new(origin);
        for segment in segments {
            match segment {
                Segment::Text(text) => line.push_text(&text),
                Segment::Marker => line.push_marker(),
            }
        }
        line
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Literal text of the line, markers excluded.
    pub fn text(&self) -> String {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Text(text) => Some(text.as_str()),
                Segment::Marker => None,
            })
            .collect()
    }

    /// Number of literal characters (Unicode scalar values).
    pub fn char_count(&self) -> usize {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Text(text) => text.chars().count(),
                Segment::Marker => 0,
            })
            .sum()
    }

    pub fn has_marker(&self) -> bool {
        self.segments.contains(&Segment::Marker)
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    // Adjacent text merges into one segment.
    pub(crate) fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.segments.last_mut() {
            Some(Segment::Text(last)) => last.push_str(text),
            _ => self.segments.push(Segment::Text(text.to_string())),
        }
    }

    pub(crate) fn push_marker(&mut self) {
        self.segments.push(Segment::Marker);
    }
}
