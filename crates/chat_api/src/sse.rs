use tracing::debug;

use crate::events::StreamRecord;

const DATA_MARKER: &str = "data:";

/// Incremental decoder for the newline-delimited `data:` record stream.
///
/// Bytes may be split anywhere, including inside a multi-byte character: the
/// undecoded tail is carried to the next [`RecordDecoder::feed`] and is only
/// flushed (lossily) by [`RecordDecoder::finish`].
#[derive(Debug, Default)]
pub struct RecordDecoder {
    undecoded: Vec<u8>,
    text: String,
}

impl RecordDecoder {
    /// Feed arbitrary bytes and drain every complete record.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<StreamRecord> {
        self.decode_utf8(bytes);
        self.drain_complete_records()
    }

    /// Flush the decoder at clean end of body.
    ///
    /// Any undecoded bytes are decoded with replacement characters, and a final
    /// record that lacks its terminating newline is still classified.
    pub fn finish(&mut self) -> Vec<StreamRecord> {
        let mut records = self.drain_complete_records();
        if !self.undecoded.is_empty() {
            let tail = String::from_utf8_lossy(&self.undecoded).into_owned();
            self.undecoded.clear();
            self.text.push_str(&tail);
        }

        let last = std::mem::take(&mut self.text);
        records.extend(parse_record(&last));
        records
    }

    /// Parse a complete payload string in one shot.
    pub fn parse_all(input: &str) -> Vec<StreamRecord> {
        let mut decoder = Self::default();
        let mut records = decoder.feed(input.as_bytes());
        records.extend(decoder.finish());
        records
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.undecoded.is_empty() && self.text.trim().is_empty()
    }

    fn decode_utf8(&mut self, bytes: &[u8]) {
        self.undecoded.extend_from_slice(bytes);

        let mut consumed = 0;
        loop {
            match std::str::from_utf8(&self.undecoded[consumed..]) {
                Ok(valid) => {
                    self.text.push_str(valid);
                    consumed = self.undecoded.len();
                    break;
                }
                Err(error) => {
                    let valid_end = consumed + error.valid_up_to();
                    self.text
                        .push_str(&String::from_utf8_lossy(&self.undecoded[consumed..valid_end]));
                    match error.error_len() {
                        Some(invalid_len) => {
                            self.text.push(char::REPLACEMENT_CHARACTER);
                            consumed = valid_end + invalid_len;
                        }
                        // Incomplete sequence at the end: wait for the next chunk.
                        None => {
                            consumed = valid_end;
                            break;
                        }
                    }
                }
            }
        }

        self.undecoded.drain(..consumed);
    }

    fn drain_complete_records(&mut self) -> Vec<StreamRecord> {
        let mut records = Vec::new();
        while let Some(newline) = self.text.find('\n') {
            let line: String = self.text.drain(..=newline).collect();
            records.extend(parse_record(&line));
        }
        records
    }
}

fn parse_record(line: &str) -> Option<StreamRecord> {
    let line = line.trim_end_matches(['\n', '\r']);
    if line.trim().is_empty() {
        return None;
    }

    let Some(payload) = line.trim_start().strip_prefix(DATA_MARKER) else {
        debug!(record = line, "skipping non-data record");
        return None;
    };
    let payload = payload.strip_prefix(' ').unwrap_or(payload);
    if payload.is_empty() {
        return None;
    }

    Some(StreamRecord::classify(payload))
}

#[cfg(test)]
mod tests {
    use super::RecordDecoder;
    use crate::events::StreamRecord;

    #[test]
    fn parse_records_incrementally() {
        let mut decoder = RecordDecoder::default();
        let mut records = Vec::new();

        records.extend(decoder.feed(b"data: Hello\n\n"));
        assert_eq!(records, vec![StreamRecord::Content("Hello".to_string())]);

        records.extend(decoder.feed(b"data: [END_OF_STREAM]\n\n"));
        assert_eq!(records.len(), 2);
        assert_eq!(records[1], StreamRecord::EndOfStream);
        assert!(decoder.is_empty_buffer());
    }

    #[test]
    fn carriage_returns_are_not_part_of_payload() {
        let records = RecordDecoder::parse_all("data: one\r\n\r\ndata: two\r\n");
        assert_eq!(
            records,
            vec![
                StreamRecord::Content("one".to_string()),
                StreamRecord::Content("two".to_string()),
            ]
        );
    }
}
