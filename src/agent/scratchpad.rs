//! Session transcript of reasoning cycles.

use serde::Serialize;

use crate::util::truncate_chars;

/// One completed reasoning cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScratchpadEntry {
    pub thought: String,
    pub action: String,
    pub action_input: String,
    pub observation: String,
}

impl ScratchpadEntry {
    /// Render the four fields in protocol order.
    pub fn render(&self) -> String {
        format!(
            "Thought: {}\nAction: {}\nAction Input: {}\nObservation: {}\n",
            self.thought, self.action, self.action_input, self.observation
        )
    }
}

/// Append-only, chronologically ordered list of entries.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Scratchpad {
    entries: Vec<ScratchpadEntry>,
}

impl Scratchpad {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only the controller appends; entries are never edited afterwards.
    pub(crate) fn push(&mut self, entry: ScratchpadEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ScratchpadEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&ScratchpadEntry> {
        self.entries.last()
    }

    /// Render every entry in order.
    pub fn render(&self) -> String {
        self.entries.iter().map(ScratchpadEntry::render).collect()
    }

    /// Bounded excerpt of the most recent entry, for failure details.
    pub fn last_excerpt(&self, max_chars: usize) -> String {
        self.last()
            .map(|e| truncate_chars(e.render().trim_end(), max_chars))
            .unwrap_or_else(|| "(empty scratchpad)".to_string())
    }
}
