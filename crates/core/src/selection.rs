//! Next-word selection mode
//!
//! The user picks a match to edit, selects a range of page text, and either
//! commits it as that match's next word or cancels.

use crate::annotation::AnnotationStore;
use crate::search::MatchId;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SelectionMode {
    #[default]
    Idle,
    /// Editing `id`, nothing selected yet
    AwaitingSelection { id: MatchId },
    HasSelection { id: MatchId, text: String },
}

impl SelectionMode {
    pub fn is_idle(&self) -> bool {
        matches!(self, SelectionMode::Idle)
    }

    /// Match being edited, if any
    pub fn target(&self) -> Option<&MatchId> {
        match self {
            SelectionMode::Idle => None,
            SelectionMode::AwaitingSelection { id } | SelectionMode::HasSelection { id, .. } => {
                Some(id)
            }
        }
    }

    /// Start editing the next word of `id`, dropping any selection in progress
    pub fn begin(&mut self, id: MatchId) {
        *self = SelectionMode::AwaitingSelection { id };
    }

    /// Record the selected text
    ///
    /// Text is trimmed; an empty selection is ignored. Replaces an earlier
    /// selection for the same match. Returns whether the selection was taken.
    pub fn capture(&mut self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }

        let id = match self {
            SelectionMode::Idle => return false,
            SelectionMode::AwaitingSelection { id } | SelectionMode::HasSelection { id, .. } => {
                id.clone()
            }
        };

        *self = SelectionMode::HasSelection { id, text: text.to_owned() };
        true
    }

    /// Write the selection into `store` and go back to idle
    ///
    /// Only a state holding a selection commits. Returns the updated id.
    pub fn commit(&mut self, store: &mut AnnotationStore) -> Option<MatchId> {
        match std::mem::take(self) {
            SelectionMode::HasSelection { id, text } => {
                store.set_next_word(&id, text);
                Some(id)
            }
            other => {
                *self = other;
                None
            }
        }
    }

    pub fn cancel(&mut self) {
        self.reset();
    }

    pub fn reset(&mut self) {
        *self = SelectionMode::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::search::search;

    fn store() -> AnnotationStore {
        let document = Document::new(0, "a.pdf", vec!["Total: 10 EUR".to_owned()]);
        AnnotationStore::new(search(&[document], &["total"]))
    }

    #[test]
    fn test_begin_capture_commit() {
        let mut store = store();
        let id = store.records()[0].id.clone();
        let mut mode = SelectionMode::default();

        mode.begin(id.clone());
        assert_eq!(mode.target(), Some(&id));

        assert!(mode.capture("  10 EUR \n"));
        assert_eq!(mode, SelectionMode::HasSelection { id: id.clone(), text: "10 EUR".to_owned() });

        assert_eq!(mode.commit(&mut store), Some(id.clone()));
        assert!(mode.is_idle());
        assert_eq!(store.get(&id).expect("record exists").next_word(), "10 EUR");
    }

    #[test]
    fn test_empty_capture_is_ignored() {
        let mut mode = SelectionMode::default();
        mode.begin(MatchId::from("0-1-0"));

        assert!(!mode.capture("   "));
        assert!(matches!(mode, SelectionMode::AwaitingSelection { .. }));
    }

    #[test]
    fn test_capture_while_idle_is_ignored() {
        let mut mode = SelectionMode::default();

        assert!(!mode.capture("word"));
        assert!(mode.is_idle());
    }

    #[test]
    fn test_commit_without_selection_keeps_state() {
        let mut store = store();
        let id = store.records()[0].id.clone();
        let mut mode = SelectionMode::default();
        mode.begin(id.clone());

        assert_eq!(mode.commit(&mut store), None);
        assert_eq!(mode, SelectionMode::AwaitingSelection { id: id.clone() });
        assert_eq!(store.get(&id).expect("record exists").next_word(), "10");
    }

    #[test]
    fn test_cancel_discards_selection() {
        let mut store = store();
        let id = store.records()[0].id.clone();
        let mut mode = SelectionMode::default();
        mode.begin(id.clone());
        mode.capture("EUR");

        mode.cancel();
        assert!(mode.is_idle());
        assert_eq!(mode.commit(&mut store), None);
        assert_eq!(store.get(&id).expect("record exists").next_word(), "10");
    }
}
