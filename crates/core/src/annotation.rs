//! Annotation store for search results
//!
//! Match records are immutable; the per-match highlight flag and next-word
//! override live in a separate table keyed by the same id. Reads join both
//! tables into a [`MatchView`]. One store is authoritative per result batch,
//! and both the viewer and the result list read from it.

use crate::search::{MatchId, MatchRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Mutable overlay state of a single match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    is_highlighted: bool,
    next_word: String,
}

impl Annotation {
    /// Initial state for a freshly produced record: highlighted, with the
    /// derived next word as the override
    pub fn for_record(record: &MatchRecord) -> Self {
        Self { is_highlighted: true, next_word: record.derived_next_word.clone() }
    }

    pub fn is_highlighted(&self) -> bool {
        self.is_highlighted
    }

    pub fn next_word(&self) -> &str {
        &self.next_word
    }
}

/// A match record joined with its annotation
#[derive(Debug, Clone, Copy)]
pub struct MatchView<'a> {
    pub record: &'a MatchRecord,
    pub annotation: &'a Annotation,
}

impl<'a> MatchView<'a> {
    pub fn id(&self) -> &'a MatchId {
        &self.record.id
    }

    pub fn is_highlighted(&self) -> bool {
        self.annotation.is_highlighted
    }

    pub fn next_word(&self) -> &'a str {
        &self.annotation.next_word
    }

    pub fn key(&self) -> MatchKey<'a> {
        MatchKey {
            file_index: self.record.file_index,
            page_number: self.record.page_number,
            term: &self.record.term,
        }
    }
}

/// The fields a filter predicate may look at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchKey<'a> {
    pub file_index: usize,
    pub page_number: usize,
    pub term: &'a str,
}

/// Common filter shapes: everything, one file, one page, one term
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchScope {
    pub file_index: Option<usize>,
    pub page_number: Option<usize>,
    pub term: Option<String>,
}

impl MatchScope {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn file(file_index: usize) -> Self {
        Self { file_index: Some(file_index), ..Self::default() }
    }

    pub fn page(file_index: usize, page_number: usize) -> Self {
        Self { file_index: Some(file_index), page_number: Some(page_number), term: None }
    }

    pub fn with_term(mut self, term: impl Into<String>) -> Self {
        self.term = Some(term.into());
        self
    }

    pub fn matches(&self, key: &MatchKey<'_>) -> bool {
        self.file_index.map_or(true, |file_index| file_index == key.file_index)
            && self.page_number.map_or(true, |page_number| page_number == key.page_number)
            && self.term.as_deref().map_or(true, |term| term == key.term)
    }
}

/// Single source of truth for a search result batch
#[derive(Debug, Clone, Default)]
pub struct AnnotationStore {
    /// Immutable match table, in generation order
    records: Vec<MatchRecord>,
    /// Record position by id
    index: HashMap<MatchId, usize>,
    /// Mutable annotation table
    annotations: HashMap<MatchId, Annotation>,
}

impl AnnotationStore {
    /// Wrap a fresh batch, annotating every record with its defaults
    ///
    /// Ids are unique within a batch produced by the match engine; should a
    /// duplicate slip in, only its first record is kept so the store holds
    /// exactly one entry per id.
    pub fn new(records: Vec<MatchRecord>) -> Self {
        let mut store = Self::default();

        for record in records {
            if store.index.contains_key(&record.id) {
                log::warn!("dropping duplicate match id {}", record.id);
                continue;
            }

            store.index.insert(record.id.clone(), store.records.len());
            store.annotations.insert(record.id.clone(), Annotation::for_record(&record));
            store.records.push(record);
        }

        store
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[MatchRecord] {
        &self.records
    }

    pub fn get(&self, id: &MatchId) -> Option<MatchView<'_>> {
        let record = &self.records[*self.index.get(id)?];
        let annotation = self.annotations.get(id)?;
        Some(MatchView { record, annotation })
    }

    /// Every match in generation order
    pub fn views(&self) -> Vec<MatchView<'_>> {
        self.filter(|_| true)
    }

    /// Read-only projection of the matches whose key satisfies `predicate`
    pub fn filter<F>(&self, predicate: F) -> Vec<MatchView<'_>>
    where
        F: Fn(&MatchKey<'_>) -> bool,
    {
        self.records
            .iter()
            .filter_map(|record| {
                let annotation = self.annotations.get(&record.id)?;
                let view = MatchView { record, annotation };
                predicate(&view.key()).then_some(view)
            })
            .collect()
    }

    pub fn scoped(&self, scope: &MatchScope) -> Vec<MatchView<'_>> {
        self.filter(|key| scope.matches(key))
    }

    /// Highlighted matches on one page, as consumed by the viewer
    pub fn active_for_page(&self, file_index: usize, page_number: usize) -> Vec<MatchView<'_>> {
        self.scoped(&MatchScope::page(file_index, page_number))
            .into_iter()
            .filter(|view| view.is_highlighted())
            .collect()
    }

    pub fn highlighted_count(&self) -> usize {
        self.annotations.values().filter(|annotation| annotation.is_highlighted).count()
    }

    /// Flip the highlight flag; unknown ids are ignored
    ///
    /// Returns whether a record was touched.
    pub fn toggle_highlight(&mut self, id: &MatchId) -> bool {
        match self.annotations.get_mut(id) {
            Some(annotation) => {
                annotation.is_highlighted = !annotation.is_highlighted;
                true
            }
            None => false,
        }
    }

    /// Replace the next-word override; an empty word clears it
    ///
    /// Unknown ids are ignored. Returns whether a record was touched.
    pub fn set_next_word(&mut self, id: &MatchId, word: impl Into<String>) -> bool {
        match self.annotations.get_mut(id) {
            Some(annotation) => {
                annotation.next_word = word.into();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::search::search;

    fn sample_store() -> AnnotationStore {
        let documents = vec![
            Document::new(0, "a.pdf", vec!["Total: 10 total: 20".to_owned(), "Tax: 5".to_owned()]),
            Document::new(1, "b.pdf", vec!["Total: 99".to_owned()]),
        ];

        AnnotationStore::new(search(&documents, &["total", "tax"]))
    }

    #[test]
    fn test_new_store_defaults() {
        let store = sample_store();

        assert_eq!(store.len(), 4);
        assert_eq!(store.highlighted_count(), 4);

        for view in store.views() {
            assert!(view.is_highlighted());
            assert_eq!(view.next_word(), view.record.derived_next_word);
        }
    }

    #[test]
    fn test_toggle_highlight() {
        let mut store = sample_store();
        let id = store.records()[0].id.clone();

        assert!(store.toggle_highlight(&id));
        assert!(!store.get(&id).expect("record exists").is_highlighted());
        assert_eq!(store.highlighted_count(), 3);

        assert!(store.toggle_highlight(&id));
        assert!(store.get(&id).expect("record exists").is_highlighted());
    }

    #[test]
    fn test_toggle_unknown_id_is_noop() {
        let mut store = sample_store();
        let before: Vec<(MatchRecord, Annotation)> = store
            .views()
            .into_iter()
            .map(|view| (view.record.clone(), view.annotation.clone()))
            .collect();

        assert!(!store.toggle_highlight(&MatchId::from("9-9-9")));
        assert!(!store.set_next_word(&MatchId::from("9-9-9"), "ignored"));

        let after: Vec<(MatchRecord, Annotation)> = store
            .views()
            .into_iter()
            .map(|view| (view.record.clone(), view.annotation.clone()))
            .collect();
        assert_eq!(store.len(), 4);
        assert_eq!(before, after);
    }

    #[test]
    fn test_set_next_word_and_clear() {
        let mut store = sample_store();
        let id = store.records()[1].id.clone();

        assert!(store.set_next_word(&id, "EUR"));
        assert_eq!(store.get(&id).expect("record exists").next_word(), "EUR");
        assert_eq!(store.get(&id).expect("record exists").record.derived_next_word, "20");

        assert!(store.set_next_word(&id, ""));
        assert_eq!(store.get(&id).expect("record exists").next_word(), "");
    }

    #[test]
    fn test_filter_by_scope() {
        let store = sample_store();

        assert_eq!(store.scoped(&MatchScope::all()).len(), 4);
        assert_eq!(store.scoped(&MatchScope::file(0)).len(), 3);
        assert_eq!(store.scoped(&MatchScope::page(0, 1)).len(), 2);
        assert_eq!(store.scoped(&MatchScope::file(0).with_term("tax")).len(), 1);
        assert_eq!(store.scoped(&MatchScope::all().with_term("total")).len(), 3);
        assert!(store.scoped(&MatchScope::page(1, 2)).is_empty());
    }

    #[test]
    fn test_filter_with_closure_does_not_mutate() {
        let store = sample_store();

        let pages: Vec<usize> =
            store.filter(|key| key.page_number > 1).iter().map(|v| v.record.page_number).collect();
        assert_eq!(pages, vec![2]);
        assert_eq!(store.len(), 4);
        assert_eq!(store.highlighted_count(), 4);
    }

    #[test]
    fn test_active_for_page_skips_unhighlighted() {
        let mut store = sample_store();
        let first = store.records()[0].id.clone();

        store.toggle_highlight(&first);
        let active = store.active_for_page(0, 1);

        assert_eq!(active.len(), 1);
        assert_ne!(active[0].id(), &first);
    }

    #[test]
    fn test_duplicate_ids_keep_first_record() {
        let store = sample_store();
        let mut records = store.records().to_vec();
        let mut duplicate = records[0].clone();
        duplicate.matched_text = "other".to_owned();
        records.push(duplicate);

        let rebuilt = AnnotationStore::new(records);
        assert_eq!(rebuilt.len(), 4);
        let id = rebuilt.records()[0].id.clone();
        assert_eq!(rebuilt.get(&id).expect("record exists").record.matched_text, "Total");
    }
}
