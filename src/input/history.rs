/// Submitted prompts with up/down recall.
///
/// Recall starts from the most recent entry. The text being edited when
/// recall begins is kept as a draft and comes back when navigation moves past
/// the newest entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputHistory {
    entries: Vec<String>,
    cursor: Option<usize>,
    draft: Option<String>,
}

impl InputHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in submission order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Index into [`InputHistory::entries`] while recall is active.
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Records a submitted prompt and ends any active recall.
    pub fn push(&mut self, text: impl Into<String>) {
        self.entries.push(text.into());
        self.reset_navigation();
    }

    pub fn reset_navigation(&mut self) {
        self.cursor = None;
        self.draft = None;
    }

    /// Steps one entry back in time. Stays on the oldest entry once reached.
    ///
    /// Returns `None` when there is nothing to recall.
    pub fn previous(&mut self, current_input: &str) -> Option<String> {
        if self.entries.is_empty() {
            return None;
        }
        if self.cursor.is_none() {
            self.draft = Some(current_input.to_string());
        }

        let index = match self.cursor {
            Some(index) => index.saturating_sub(1),
            None => self.entries.len() - 1,
        };
        self.cursor = Some(index);
        Some(self.entries[index].clone())
    }

    /// Steps one entry forward. Moving past the newest entry ends recall and
    /// returns the saved draft.
    ///
    /// Returns `None` when recall is not active.
    pub fn next(&mut self) -> Option<String> {
        let index = self.cursor?;
        if index + 1 >= self.entries.len() {
            self.cursor = None;
            return Some(self.draft.take().unwrap_or_default());
        }
        self.cursor = Some(index + 1);
        Some(self.entries[index + 1].clone())
    }
}
