use std::collections::VecDeque;

use tracing::debug;

use crate::app_state::AppState;

pub const DEFAULT_MAX_HISTORY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    Duplicate,
    Suppressed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryPosition {
    Empty,
    AtEarliest,
    AtMiddle,
    AtLatest,
}

/// Bounded undo/redo stack of session snapshots.
///
/// Invariants: `cursor` is `None` only when `entries` is empty, otherwise it indexes a valid
/// entry; `entries.len() <= max_history`.
#[derive(Debug, Clone)]
pub struct HistorySession {
    entries: VecDeque<AppState>,
    cursor: Option<usize>,
    max_history: usize,
    suppress_depth: usize,
}

impl Default for HistorySession {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl HistorySession {
    /// # Panics
    /// Panics if `max_history` is zero.
    #[must_use]
    pub fn new(max_history: usize) -> Self {
        assert!(max_history > 0, "history capacity must be positive");
        Self {
            entries: VecDeque::with_capacity(max_history.min(DEFAULT_MAX_HISTORY)),
            cursor: None,
            max_history,
            suppress_depth: 0,
        }
    }

    pub fn record(&mut self, state: AppState) -> RecordOutcome {
        if self.is_replaying() {
            return RecordOutcome::Suppressed;
        }
        if self.current() == Some(&state) {
            return RecordOutcome::Duplicate;
        }

        if let Some(cursor) = self.cursor {
            let dropped = self.entries.len() - (cursor + 1);
            if dropped > 0 {
                debug!(dropped, "discarding forward history");
            }
            self.entries.truncate(cursor + 1);
        }

        self.entries.push_back(state);
        if self.entries.len() > self.max_history {
            self.entries.pop_front();
        }
        self.cursor = Some(self.entries.len() - 1);
        RecordOutcome::Recorded
    }

    pub fn back(&mut self) -> Option<&AppState> {
        let cursor = self.cursor.filter(|cursor| *cursor > 0)? - 1;
        self.cursor = Some(cursor);
        self.entries.get(cursor)
    }

    pub fn forward(&mut self) -> Option<&AppState> {
        let cursor = self
            .cursor
            .filter(|cursor| cursor + 1 < self.entries.len())?
            + 1;
        self.cursor = Some(cursor);
        self.entries.get(cursor)
    }

    #[must_use]
    pub fn can_go_back(&self) -> bool {
        self.cursor.is_some_and(|cursor| cursor > 0)
    }

    #[must_use]
    pub fn can_go_forward(&self) -> bool {
        self.cursor
            .is_some_and(|cursor| cursor + 1 < self.entries.len())
    }

    pub fn suppress_recording(&mut self) {
        self.suppress_depth += 1;
    }

    pub fn resume_recording(&mut self) {
        self.suppress_depth = self.suppress_depth.saturating_sub(1);
    }

    #[must_use]
    pub fn is_replaying(&self) -> bool {
        self.suppress_depth > 0
    }

    #[must_use]
    pub fn current(&self) -> Option<&AppState> {
        self.cursor.and_then(|cursor| self.entries.get(cursor))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    #[must_use]
    pub fn max_history(&self) -> usize {
        self.max_history
    }

    #[must_use]
    pub fn position(&self) -> HistoryPosition {
        match self.cursor {
            None => HistoryPosition::Empty,
            Some(cursor) if cursor + 1 == self.entries.len() => HistoryPosition::AtLatest,
            Some(0) => HistoryPosition::AtEarliest,
            Some(_) => HistoryPosition::AtMiddle,
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &AppState> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::{HistoryPosition, HistorySession, RecordOutcome};
    use crate::app_state::AppState;

    fn state(table: &str) -> AppState {
        AppState::capture(
            Some("public".to_string()),
            Some(table.to_string()),
            Vec::new(),
            Vec::new(),
            50,
            false,
            String::new(),
        )
    }

    fn tables(history: &HistorySession) -> Vec<String> {
        history
            .entries()
            .filter_map(|entry| entry.table.clone())
            .collect()
    }

    #[test]
    fn empty_history_has_no_cursor_and_no_navigation() {
        let mut history = HistorySession::default();
        assert_eq!(history.cursor(), None);
        assert_eq!(history.position(), HistoryPosition::Empty);
        assert!(!history.can_go_back());
        assert!(!history.can_go_forward());
        assert!(history.back().is_none());
        assert!(history.forward().is_none());
    }

    #[test]
    fn duplicate_record_is_ignored() {
        let mut history = HistorySession::default();
        assert_eq!(history.record(state("a")), RecordOutcome::Recorded);
        assert_eq!(history.record(state("a")), RecordOutcome::Duplicate);

        assert_eq!(history.len(), 1);
        assert_eq!(history.cursor(), Some(0));
        assert_eq!(history.position(), HistoryPosition::AtLatest);
    }

    #[test]
    fn recording_after_back_truncates_forward_branch() {
        let mut history = HistorySession::default();
        history.record(state("a"));
        history.record(state("b"));
        history.record(state("c"));

        assert_eq!(
            history.back().and_then(|entry| entry.table.clone()).as_deref(),
            Some("b")
        );
        assert_eq!(
            history.back().and_then(|entry| entry.table.clone()).as_deref(),
            Some("a")
        );
        assert_eq!(history.position(), HistoryPosition::AtEarliest);
        assert!(history.can_go_forward());

        history.record(state("d"));
        assert_eq!(tables(&history), vec!["a", "d"]);
        assert_eq!(history.cursor(), Some(1));
        assert!(!history.can_go_forward());
    }

    #[test]
    fn capacity_overflow_drops_oldest_entry() {
        let mut history = HistorySession::new(2);
        history.record(state("a"));
        history.record(state("b"));
        history.record(state("c"));

        assert_eq!(tables(&history), vec!["b", "c"]);
        assert_eq!(history.cursor(), Some(1));
        assert_eq!(
            history.current().and_then(|entry| entry.table.as_deref()),
            Some("c")
        );
    }

    #[test]
    fn navigation_stops_at_bounds() {
        let mut history = HistorySession::default();
        history.record(state("a"));
        history.record(state("b"));

        assert!(history.forward().is_none());
        assert!(history.back().is_some());
        assert!(history.back().is_none());
        assert_eq!(history.cursor(), Some(0));
        assert!(history.forward().is_some());
        assert_eq!(history.cursor(), Some(1));
    }

    #[test]
    fn suppression_nests_and_blocks_recording() {
        let mut history = HistorySession::default();
        history.suppress_recording();
        history.suppress_recording();
        assert_eq!(history.record(state("a")), RecordOutcome::Suppressed);

        history.resume_recording();
        assert!(history.is_replaying());
        assert_eq!(history.record(state("a")), RecordOutcome::Suppressed);

        history.resume_recording();
        history.resume_recording();
        assert!(!history.is_replaying());
        assert_eq!(history.record(state("a")), RecordOutcome::Recorded);
        assert!(!history.is_empty());
    }

    #[test]
    fn duplicate_check_compares_against_cursor_entry() {
        let mut history = HistorySession::default();
        history.record(state("a"));
        history.record(state("b"));
        history.back();

        assert_eq!(history.record(state("a")), RecordOutcome::Duplicate);
        assert_eq!(history.len(), 2);
        assert_eq!(history.record(state("b")), RecordOutcome::Recorded);
        assert_eq!(tables(&history), vec!["a", "b"]);
    }
}
