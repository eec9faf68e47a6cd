use chat_api::{RecordDecoder, SignalKind, StreamRecord};
use chat_transport::{CancelReason, ChunkReader, TransportError};
use tracing::debug;

use crate::lines::{LineSink, Origin};

/// How one read loop ended. Protocol-level endings are values, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// End-of-stream sentinel or a clean end of body.
    Completed,
    /// The backend sent a control signal; its text is already in the transcript.
    Signalled(SignalKind),
    /// The watchdog cancelled the attempt.
    Stalled,
    /// The user cancelled the attempt.
    Cancelled,
}

/// Maps a cancellation error to its outcome; any other error is passed through.
pub fn interrupted(error: TransportError) -> Result<ReadOutcome, TransportError> {
    match error {
        TransportError::Cancelled(CancelReason::Stall) => Ok(ReadOutcome::Stalled),
        TransportError::Cancelled(CancelReason::User) => Ok(ReadOutcome::Cancelled),
        other => Err(other),
    }
}

/// Pulls `reader` to completion, feeding decoded records into `sink`.
///
/// `on_first_byte` runs once, before the first non-empty chunk is decoded.
/// Unless this is a recovery attempt, the structural marker is emitted then.
pub async fn read_stream<R, F>(
    reader: &mut R,
    sink: &LineSink,
    recovery: bool,
    on_first_byte: F,
) -> Result<ReadOutcome, TransportError>
where
    R: ChunkReader,
    F: FnOnce() + Send,
{
    let mut decoder = RecordDecoder::default();
    let mut on_first_byte = Some(on_first_byte);

    loop {
        let chunk = match reader.pull().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(error) => return interrupted(error),
        };
        if chunk.is_empty() {
            continue;
        }

        if let Some(first_byte) = on_first_byte.take() {
            first_byte();
            if !recovery {
                sink.mark_structural();
            }
        }

        for record in decoder.feed(&chunk) {
            if let Some(outcome) = apply_record(sink, record) {
                return Ok(outcome);
            }
        }
    }

    // Clean end of body: whatever is still buffered is final content.
    for record in decoder.finish() {
        if let Some(outcome) = apply_record(sink, record) {
            return Ok(outcome);
        }
    }
    debug!("stream body ended without end-of-stream sentinel");
    Ok(ReadOutcome::Completed)
}

fn apply_record(sink: &LineSink, record: StreamRecord) -> Option<ReadOutcome> {
    match record {
        StreamRecord::Content(text) => {
            sink.append(Origin::Ai, text);
            None
        }
        StreamRecord::Signal { kind, message } => {
            debug!(signal = kind.as_str(), "backend signalled end of turn");
            sink.append(Origin::System, message);
            sink.force_break(Origin::System);
            Some(ReadOutcome::Signalled(kind))
        }
        StreamRecord::EndOfStream => Some(ReadOutcome::Completed),
    }
}
