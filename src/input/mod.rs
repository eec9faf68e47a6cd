//! Terminal input.
//!
//! On a terminal, stdin is switched to raw mode and key presses drive a
//! [`PromptEditor`] with input recall. Piped input is read line by line.

use std::io::{self, BufRead, IsTerminal};
use std::thread;

use crossterm::event::{Event, EventStream, KeyEvent, KeyEventKind};
use crossterm::terminal;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub mod editor;
pub mod history;

pub use editor::{EditorAction, PromptEditor, PROMPT};
pub use history::InputHistory;

#[derive(Debug)]
pub enum InputEvent {
    /// A complete line from piped stdin.
    Line(String),
    /// A key press from a raw-mode terminal.
    Key(KeyEvent),
}

/// Source of [`InputEvent`]s. `next` is cancel safe.
pub enum InputReader {
    Lines(mpsc::UnboundedReceiver<String>),
    Keys(EventStream),
}

impl InputReader {
    /// Reads keys when stdin is a terminal, lines otherwise.
    pub fn for_stdin() -> Self {
        if io::stdin().is_terminal() {
            Self::Keys(EventStream::new())
        } else {
            Self::Lines(spawn_line_reader())
        }
    }

    pub fn is_interactive(&self) -> bool {
        matches!(self, Self::Keys(_))
    }

    /// Returns `None` once input is exhausted.
    pub async fn next(&mut self) -> Option<InputEvent> {
        match self {
            Self::Lines(lines) => lines.recv().await.map(InputEvent::Line),
            Self::Keys(events) => loop {
                match events.next().await? {
                    Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                        return Some(InputEvent::Key(key));
                    }
                    Ok(_) => {}
                    Err(error) => {
                        warn!(%error, "failed to read terminal events");
                        return None;
                    }
                }
            },
        }
    }
}

/// Raw mode for as long as the guard lives.
pub struct RawModeGuard(());

impl RawModeGuard {
    pub fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        debug!("terminal raw mode enabled");
        Ok(Self(()))
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(error) = terminal::disable_raw_mode() {
            warn!(%error, "failed to restore terminal mode");
        }
    }
}

// A plain thread: a blocking stdin read must not hold up runtime shutdown.
fn spawn_line_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(error) => {
                    warn!(%error, "failed to read stdin");
                    break;
                }
            }
        }
    });
    rx
}
