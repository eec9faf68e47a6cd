//! Line-mode transcript output.
//!
//! Invariant: everything reaches the terminal through [`Screen::render`] or
//! [`Screen::finish`], so the footer and transcript never interleave.

use std::io::{self, Write};

use crossterm::cursor::MoveToColumn;
use crossterm::queue;
use unicode_width::UnicodeWidthStr;

use crate::lines::{DisplayLine, LineBuffer, Segment};

/// Glyph printed for the structural marker.
pub const MARKER_GLYPH: &str = "◆ ";

pub fn render_line(line: &DisplayLine) -> String {
    line.segments()
        .iter()
        .map(|segment| match segment {
            Segment::Text(text) => text.as_str(),
            Segment::Marker => MARKER_GLYPH,
        })
        .collect()
}

/// Prints only what changed since the previous frame.
///
/// Every line but the tail is complete and is printed with its newline; the
/// tail stays open and grows in place.
#[derive(Debug, Default)]
pub struct TranscriptPrinter {
    line: u64,
    printed: usize,
}

impl TranscriptPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the cursor sits at the start of an empty row.
    pub fn at_line_start(&self) -> bool {
        self.printed == 0
    }

    pub fn pending_output(&mut self, buffer: &LineBuffer) -> String {
        let mut out = String::new();
        let first = buffer.evicted();
        if self.line < first {
            // Lines evicted before they were printed are skipped.
            self.line = first;
            self.printed = 0;
        }

        let mut index = (self.line - first) as usize;
        while let Some(line) = buffer.get(index) {
            let rendered = render_line(line);
            out.extend(rendered.chars().skip(self.printed));
            self.printed = rendered.chars().count();

            if index + 1 >= buffer.len() {
                break;
            }
            out.push('\n');
            self.line += 1;
            self.printed = 0;
            index += 1;
        }
        out
    }
}

/// Transient last row: the busy status, or the prompt being edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Footer {
    text: String,
    cursor: Option<usize>,
}

impl Footer {
    pub fn status(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            cursor: None,
        }
    }

    /// A prompt with the terminal cursor parked at display column `cursor`.
    pub fn prompt(text: impl Into<String>, cursor: usize) -> Self {
        Self {
            text: text.into(),
            cursor: Some(cursor),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    fn parked_column(&self) -> Option<u16> {
        self.cursor
            .filter(|column| *column < self.text.width())
            .and_then(|column| u16::try_from(column).ok())
    }
}

/// Transcript plus a transient footer drawn on the open empty row.
#[derive(Debug)]
pub struct Screen<W: Write> {
    out: W,
    printer: TranscriptPrinter,
    footer: Option<Footer>,
    newline: &'static str,
}

impl<W: Write> Screen<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            printer: TranscriptPrinter::new(),
            footer: None,
            newline: "\n",
        }
    }

    /// Screen for a terminal in raw mode, where a line feed does not return
    /// the carriage.
    pub fn raw(out: W) -> Self {
        Self {
            newline: "\r\n",
            ..Self::new(out)
        }
    }

    pub fn render(&mut self, buffer: &LineBuffer, footer: Option<&Footer>) -> io::Result<()> {
        let transcript = self.printer.pending_output(buffer);
        let footer = footer.filter(|_| self.printer.at_line_start());
        if transcript.is_empty() && footer == self.footer.as_ref() {
            return Ok(());
        }

        let mut frame = String::new();
        self.clear_footer(&mut frame);
        frame.push_str(&transcript.replace('\n', self.newline));
        if let Some(footer) = footer {
            frame.push_str(footer.text());
            self.footer = Some(footer.clone());
        }

        self.out.write_all(frame.as_bytes())?;
        if let Some(column) = self.footer.as_ref().and_then(Footer::parked_column) {
            queue!(self.out, MoveToColumn(column))?;
        }
        self.out.flush()
    }

    /// Clears the footer and terminates an open tail row.
    pub fn finish(&mut self) -> io::Result<()> {
        let mut frame = String::new();
        self.clear_footer(&mut frame);
        if !self.printer.at_line_start() {
            frame.push_str(self.newline);
        }
        self.out.write_all(frame.as_bytes())?;
        self.out.flush()
    }

    fn clear_footer(&mut self, frame: &mut String) {
        if let Some(footer) = self.footer.take() {
            frame.push('\r');
            frame.push_str(&" ".repeat(footer.text().width()));
            frame.push('\r');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lines::{LineSink, Origin};

    fn output(screen: &mut Screen<Vec<u8>>) -> String {
        let bytes = std::mem::take(&mut screen.out);
        String::from_utf8(bytes).expect("utf-8 output")
    }

    #[test]
    fn prints_only_new_text_and_keeps_tail_open() {
        let sink = LineSink::new();
        let mut buffer = LineBuffer::new();
        let mut screen = Screen::new(Vec::new());

        sink.append(Origin::User, "> hi");
        sink.mark_structural();
        sink.append(Origin::Ai, "Hello");
        buffer.apply_pending(&sink);
        screen.render(&buffer, None).expect("render");
        assert_eq!(output(&mut screen), "> hi\n◆ Hello");

        sink.append(Origin::Ai, " world");
        buffer.apply_pending(&sink);
        screen.render(&buffer, None).expect("render");
        assert_eq!(output(&mut screen), " world");

        sink.force_break(Origin::Ai);
        buffer.apply_pending(&sink);
        screen.render(&buffer, None).expect("render");
        assert_eq!(output(&mut screen), "\n");
    }

    #[test]
    fn status_is_drawn_on_empty_row_and_cleared_before_text() {
        let sink = LineSink::new();
        let mut buffer = LineBuffer::new();
        let mut screen = Screen::new(Vec::new());

        sink.force_break(Origin::Ai);
        buffer.apply_pending(&sink);
        let thinking = Footer::status("⠋ Thinking...");
        screen.render(&buffer, Some(&thinking)).expect("render");
        assert_eq!(output(&mut screen), "⠋ Thinking...");

        screen.render(&buffer, Some(&thinking)).expect("render");
        assert_eq!(output(&mut screen), "", "unchanged frame writes nothing");

        sink.append(Origin::Ai, "x");
        buffer.apply_pending(&sink);
        screen
            .render(&buffer, Some(&Footer::status("⠙")))
            .expect("render");
        assert_eq!(output(&mut screen), format!("\r{}\rx", " ".repeat(13)));

        screen.finish().expect("finish");
        assert_eq!(output(&mut screen), "\n");
    }

    #[test]
    fn evicted_unprinted_lines_are_skipped() {
        let sink = LineSink::new();
        let mut buffer = LineBuffer::with_cap(4);
        let mut screen = Screen::new(Vec::new());

        sink.append(Origin::Ai, "aaaa\nbbbb\ncc");
        buffer.apply_pending(&sink);
        screen.render(&buffer, None).expect("render");
        assert_eq!(output(&mut screen), "cc");
    }

    #[test]
    fn prompt_parks_cursor_inside_the_edited_text() {
        let mut buffer = LineBuffer::new();
        let mut screen = Screen::new(Vec::new());
        buffer.apply_edits([crate::lines::PendingEdit::Break {
            origin: Origin::System,
        }]);

        screen
            .render(&buffer, Some(&Footer::prompt("> hello", 4)))
            .expect("render");
        assert_eq!(output(&mut screen), "> hello\u{1b}[5G");

        screen
            .render(&buffer, Some(&Footer::prompt("> hello", 7)))
            .expect("render");
        assert_eq!(
            output(&mut screen),
            format!("\r{}\r> hello", " ".repeat(7)),
            "a cursor at the end of the text needs no move"
        );
    }

    #[test]
    fn raw_screen_returns_the_carriage_on_every_line() {
        let sink = LineSink::new();
        let mut buffer = LineBuffer::new();
        let mut screen = Screen::raw(Vec::new());

        sink.append(Origin::User, "> hi");
        sink.force_break(Origin::Ai);
        sink.append(Origin::Ai, "ok");
        buffer.apply_pending(&sink);
        screen.render(&buffer, None).expect("render");
        assert_eq!(output(&mut screen), "> hi\r\nok");

        screen.finish().expect("finish");
        assert_eq!(output(&mut screen), "\r\n");
    }
}
