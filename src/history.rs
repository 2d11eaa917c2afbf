use std::time::{SystemTime, UNIX_EPOCH};

use crate::codec::SourceImage;

pub const ANALYSIS_LOG_CAPACITY: usize = 10;

/// Linear undo/redo history of generated results for one editing session.
///
/// Pushing while the cursor is not at the tail discards every entry after
/// the cursor. The source image itself is never an entry.
#[derive(Debug, Clone)]
pub struct EditHistory<T> {
    entries: Vec<T>,
    cursor: Option<usize>,
}

impl<T> Default for EditHistory<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EditHistory<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            cursor: None,
        }
    }

    pub fn push(&mut self, entry: T) {
        let keep = self.cursor.map_or(0, |cursor| cursor + 1);
        self.entries.truncate(keep);
        self.entries.push(entry);
        self.cursor = Some(self.entries.len() - 1);
    }

    pub fn undo(&mut self) -> Option<&T> {
        if !self.can_undo() {
            return None;
        }
        let cursor = self.cursor? - 1;
        self.cursor = Some(cursor);
        self.entries.get(cursor)
    }

    pub fn redo(&mut self) -> Option<&T> {
        if !self.can_redo() {
            return None;
        }
        let cursor = self.cursor.map_or(0, |cursor| cursor + 1);
        self.cursor = Some(cursor);
        self.entries.get(cursor)
    }

    pub fn can_undo(&self) -> bool {
        matches!(self.cursor, Some(cursor) if cursor > 0)
    }

    pub fn can_redo(&self) -> bool {
        match self.cursor {
            Some(cursor) => cursor + 1 < self.entries.len(),
            None => false,
        }
    }

    pub fn reset(&mut self) {
        self.entries.clear();
        self.cursor = None;
    }

    pub fn current(&self) -> Option<&T> {
        self.cursor.and_then(|cursor| self.entries.get(cursor))
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisEntry {
    pub id: u64,
    pub image: SourceImage,
    pub prompt: String,
    pub analysis: String,
}

/// Most-recent-first log of completed analyses, capped at
/// [`ANALYSIS_LOG_CAPACITY`].
#[derive(Debug, Clone, Default)]
pub struct AnalysisLog {
    entries: Vec<AnalysisEntry>,
    last_id: u64,
}

impl AnalysisLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        image: SourceImage,
        prompt: impl Into<String>,
        analysis: impl Into<String>,
    ) -> &AnalysisEntry {
        let id = self.next_id();
        self.entries.insert(
            0,
            AnalysisEntry {
                id,
                image,
                prompt: prompt.into(),
                analysis: analysis.into(),
            },
        );
        self.entries.truncate(ANALYSIS_LOG_CAPACITY);
        &self.entries[0]
    }

    pub fn get(&self, id: u64) -> Option<&AnalysisEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn entries(&self) -> &[AnalysisEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    // Clock millis, bumped past the previous id when the clock has not advanced.
    fn next_id(&mut self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        let id = now.max(self.last_id.saturating_add(1));
        self.last_id = id;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history_of(items: &[&'static str]) -> EditHistory<&'static str> {
        let mut history = EditHistory::new();
        for item in items {
            history.push(*item);
        }
        history
    }

    fn sample_image(name: &str) -> SourceImage {
        SourceImage::from_bytes(name, "image/png", vec![1, 2, 3])
    }

    #[test]
    fn push_after_undo_discards_future_entries() {
        let mut history = history_of(&["A", "B", "C"]);
        assert_eq!(history.undo(), Some(&"B"));
        assert_eq!(history.cursor(), Some(1));

        history.push("D");
        assert_eq!(history.entries, vec!["A", "B", "D"]);
        assert_eq!(history.cursor(), Some(2));
        assert_eq!(history.current(), Some(&"D"));
        assert!(!history.can_redo());
    }

    #[test]
    fn push_from_head_discards_everything_after_it() {
        let mut history = history_of(&["A", "B", "C"]);
        history.undo();
        history.undo();
        history.push("E");
        assert_eq!(history.entries, vec!["A", "E"]);
        assert_eq!(history.cursor(), Some(1));
    }

    #[test]
    fn undo_on_empty_history_is_noop() {
        let mut history = EditHistory::<&str>::new();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert_eq!(history.undo(), None);
        assert_eq!(history.redo(), None);
        assert_eq!(history.cursor(), None);
        assert_eq!(history.current(), None);
    }

    #[test]
    fn undo_on_single_entry_is_noop() {
        let mut history = history_of(&["A"]);
        assert!(!history.can_undo());
        assert_eq!(history.undo(), None);
        assert_eq!(history.cursor(), Some(0));
        assert_eq!(history.current(), Some(&"A"));
    }

    #[test]
    fn undo_and_redo_walk_the_stack() {
        let mut history = history_of(&["A", "B", "C"]);
        assert!(history.can_undo());
        assert!(!history.can_redo());

        assert_eq!(history.undo(), Some(&"B"));
        assert_eq!(history.undo(), Some(&"A"));
        assert_eq!(history.undo(), None);
        assert_eq!(history.cursor(), Some(0));
        assert!(history.can_redo());

        assert_eq!(history.redo(), Some(&"B"));
        assert_eq!(history.redo(), Some(&"C"));
        assert_eq!(history.redo(), None);
        assert_eq!(history.cursor(), Some(2));
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn reset_clears_entries_and_cursor() {
        let mut history = history_of(&["A", "B"]);
        history.reset();
        assert!(history.is_empty());
        assert_eq!(history.cursor(), None);
        assert!(!history.can_undo());

        history.push("Z");
        assert_eq!(history.cursor(), Some(0));
        assert_eq!(history.current(), Some(&"Z"));
    }

    #[test]
    fn first_edit_result_cannot_be_undone_back_to_original() {
        // The uploaded original never enters the history, only generated edits.
        let mut history = EditHistory::new();
        history.push("data:image/png;base64,sepia-result");
        assert_eq!(history.undo(), None);
        assert_eq!(
            history.current(),
            Some(&"data:image/png;base64,sepia-result")
        );
    }

    #[test]
    fn analysis_log_is_newest_first() {
        let mut log = AnalysisLog::new();
        log.record(sample_image("a.png"), "first", "one");
        log.record(sample_image("b.png"), "second", "two");
        assert_eq!(log.len(), 2);
        assert_eq!(log.entries()[0].prompt, "second");
        assert_eq!(log.entries()[1].prompt, "first");
        assert!(log.entries()[0].id > log.entries()[1].id);
    }

    #[test]
    fn analysis_log_evicts_oldest_past_capacity() {
        let mut log = AnalysisLog::new();
        for index in 0..ANALYSIS_LOG_CAPACITY + 1 {
            log.record(sample_image("x.png"), format!("prompt {index}"), "text");
            assert!(log.len() <= ANALYSIS_LOG_CAPACITY);
        }
        assert_eq!(log.len(), ANALYSIS_LOG_CAPACITY);
        assert_eq!(log.entries()[0].prompt, "prompt 10");
        assert!(log
            .entries()
            .iter()
            .all(|entry| entry.prompt != "prompt 0"));
    }

    #[test]
    fn analysis_log_ids_are_unique_and_lookup_works() {
        let mut log = AnalysisLog::new();
        let first = log.record(sample_image("a.png"), "p", "r").id;
        let second = log.record(sample_image("a.png"), "p", "r").id;
        assert_ne!(first, second);
        assert_eq!(log.get(first).map(|entry| entry.id), Some(first));
        assert!(log.get(first.wrapping_add(1_000_000)).is_none());
    }

    #[test]
    fn analysis_log_clear_empties_everything() {
        let mut log = AnalysisLog::new();
        log.record(sample_image("a.png"), "p", "r");
        log.clear();
        assert!(log.is_empty());
    }
}
