use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use unicode_width::UnicodeWidthStr;

use super::history::InputHistory;
use crate::render::Footer;

/// Printed before the text being edited.
pub const PROMPT: &str = "> ";

/// What a key press asks the application to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorAction {
    /// The text or cursor changed.
    Edited,
    Ignored,
    /// A non-blank prompt was submitted; the editor is already cleared.
    Submit(String),
    /// Ctrl-C.
    Interrupt,
    /// Ctrl-D on an empty prompt.
    Eof,
}

/// Single-line prompt editor with input recall.
#[derive(Debug, Default)]
pub struct PromptEditor {
    text: String,
    /// Cursor position in chars.
    cursor: usize,
    history: InputHistory,
}

impl PromptEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn history(&self) -> &InputHistory {
        &self.history
    }

    /// Applies one key press. While `busy` only Ctrl-C is honoured and the
    /// prompt is left untouched.
    pub fn handle_key(&mut self, key: KeyEvent, busy: bool) -> EditorAction {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl && key.code == KeyCode::Char('c') {
            return EditorAction::Interrupt;
        }
        if busy {
            return EditorAction::Ignored;
        }

        match key.code {
            KeyCode::Char('d') if ctrl => {
                if self.text.is_empty() {
                    EditorAction::Eof
                } else {
                    self.delete_at_cursor()
                }
            }
            KeyCode::Char('u') if ctrl => self.replace(String::new()),
            KeyCode::Char('a') if ctrl => self.move_to(0),
            KeyCode::Char('e') if ctrl => self.move_to(self.char_len()),
            KeyCode::Char(_) if ctrl || key.modifiers.contains(KeyModifiers::ALT) => {
                EditorAction::Ignored
            }
            KeyCode::Char(ch) => self.insert(ch),
            KeyCode::Enter => self.submit(),
            KeyCode::Backspace => {
                if self.cursor == 0 {
                    return EditorAction::Ignored;
                }
                self.cursor -= 1;
                self.delete_at_cursor()
            }
            KeyCode::Delete => self.delete_at_cursor(),
            KeyCode::Left => self.move_to(self.cursor.saturating_sub(1)),
            KeyCode::Right => self.move_to((self.cursor + 1).min(self.char_len())),
            KeyCode::Home => self.move_to(0),
            KeyCode::End => self.move_to(self.char_len()),
            KeyCode::Up => match self.history.previous(&self.text) {
                Some(text) => self.recall(text),
                None => EditorAction::Ignored,
            },
            KeyCode::Down => match self.history.next() {
                Some(text) => self.recall(text),
                None => EditorAction::Ignored,
            },
            _ => EditorAction::Ignored,
        }
    }

    /// The prompt row, with the cursor at its display column.
    pub fn footer(&self) -> Footer {
        let before_cursor: String = self.text.chars().take(self.cursor).collect();
        Footer::prompt(
            format!("{PROMPT}{}", self.text),
            PROMPT.width() + before_cursor.width(),
        )
    }

    fn submit(&mut self) -> EditorAction {
        if self.text.trim().is_empty() {
            return EditorAction::Ignored;
        }
        let text = std::mem::take(&mut self.text);
        self.cursor = 0;
        self.history.push(text.clone());
        EditorAction::Submit(text)
    }

    fn insert(&mut self, ch: char) -> EditorAction {
        let at = self.byte_offset(self.cursor);
        self.text.insert(at, ch);
        self.cursor += 1;
        self.history.reset_navigation();
        EditorAction::Edited
    }

    fn delete_at_cursor(&mut self) -> EditorAction {
        if self.cursor >= self.char_len() {
            return EditorAction::Ignored;
        }
        let at = self.byte_offset(self.cursor);
        self.text.remove(at);
        self.history.reset_navigation();
        EditorAction::Edited
    }

    fn replace(&mut self, text: String) -> EditorAction {
        self.text = text;
        self.cursor = self.char_len();
        self.history.reset_navigation();
        EditorAction::Edited
    }

    // Unlike `replace`, keeps the recall position.
    fn recall(&mut self, text: String) -> EditorAction {
        self.text = text;
        self.cursor = self.char_len();
        EditorAction::Edited
    }

    fn move_to(&mut self, cursor: usize) -> EditorAction {
        if cursor == self.cursor {
            return EditorAction::Ignored;
        }
        self.cursor = cursor;
        EditorAction::Edited
    }

    fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    fn byte_offset(&self, cursor: usize) -> usize {
        self.text
            .char_indices()
            .nth(cursor)
            .map_or(self.text.len(), |(offset, _)| offset)
    }
}
