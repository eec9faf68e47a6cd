//! Conversion between display lines and their persisted form.

use transcript_store::{
    KeyValueStore, StoredLine, StoredSegment, StoredSource, TranscriptStore, TranscriptStoreError,
};

use crate::lines::{DisplayLine, LineBuffer, Origin, Segment};

pub fn to_stored(line: &DisplayLine) -> StoredLine {
    let source = match line.origin() {
        Origin::User => StoredSource::User,
        Origin::Ai => StoredSource::Ai,
        Origin::System => StoredSource::System,
    };
    let segments = line
        .segments()
        .iter()
        .map(|segment| match segment {
            Segment::Text(text) => StoredSegment::text(text.clone()),
            Segment::Marker => StoredSegment::prefix(),
        })
        .collect();
    StoredLine::new(source, segments)
}

pub fn from_stored(line: StoredLine) -> DisplayLine {
    let origin = match line.source {
        StoredSource::User => Origin::User,
        StoredSource::Ai => Origin::Ai,
        StoredSource::System => Origin::System,
    };
    let segments = line.segments.into_iter().map(|segment| match segment {
        StoredSegment::Text(text) => Segment::Text(text),
        StoredSegment::Structural(_) => Segment::Marker,
    });
    DisplayLine::from_segments(origin, segments)
}

/// Restores the persisted history into a buffer capped at `cap`.
pub fn load_buffer<S: KeyValueStore>(
    store: &mut TranscriptStore<S>,
    cap: usize,
) -> Result<LineBuffer, TranscriptStoreError> {
    let lines = store.load_history()?;
    Ok(LineBuffer::from_lines(lines.into_iter().map(from_stored), cap))
}

/// Persists what is currently in memory. Evicted lines are not kept.
pub fn save_buffer<S: KeyValueStore>(
    store: &mut TranscriptStore<S>,
    buffer: &LineBuffer,
) -> Result<(), TranscriptStoreError> {
    let lines: Vec<StoredLine> = buffer.lines().map(to_stored).collect();
    store.save_history(&lines)
}
