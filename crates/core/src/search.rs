//! Multi-term literal search over extracted page text
//!
//! Produces immutable [`MatchRecord`]s with context windows and the word that
//! follows each match. Matching is case-insensitive and never crosses page
//! boundaries.

use crate::document::Document;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Characters of context kept on each side of a match.
pub const DEFAULT_CONTEXT_WINDOW: usize = 50;

/// Identifier of a match, unique within one search result batch
///
/// Built from the file index, the 1-based page number and the ordinal of the
/// record in the batch, e.g. `"0-3-17"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(String);

impl MatchId {
    pub fn new(file_index: usize, page_number: usize, ordinal: usize) -> Self {
        Self(format!("{file_index}-{page_number}-{ordinal}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MatchId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for MatchId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One occurrence of one term on one page of one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: MatchId,
    pub file_index: usize,
    pub file_name: String,
    /// 1-based page number within the document
    pub page_number: usize,
    /// The term as typed by the user
    pub term: String,
    /// The matched slice of the page, in its original case
    pub matched_text: String,
    /// Byte offset of the match start within the page text
    pub match_start: usize,
    /// Byte offset one past the match end within the page text
    pub match_end: usize,
    pub before_context: String,
    pub after_context: String,
    /// Untrimmed `before + match + after` slice
    pub full_context: String,
    pub derived_next_word: String,
}

/// Search engine with a configurable context window
#[derive(Debug, Clone, Copy)]
pub struct MatchEngine {
    context_window: usize,
}

impl Default for MatchEngine {
    fn default() -> Self {
        Self { context_window: DEFAULT_CONTEXT_WINDOW }
    }
}

impl MatchEngine {
    pub fn new(context_window: usize) -> Self {
        Self { context_window }
    }

    pub fn context_window(&self) -> usize {
        self.context_window
    }

    /// Search every page of every document for every term
    ///
    /// Results are ordered by file, page, term order and then left to right.
    /// Empty terms are ignored; an empty term list yields no records.
    pub fn search<S: AsRef<str>>(&self, documents: &[Document], terms: &[S]) -> Vec<MatchRecord> {
        let needles: Vec<(&str, Vec<char>)> = terms
            .iter()
            .map(|term| term.as_ref())
            .filter(|term| !term.is_empty())
            .map(|term| (term, term.chars().map(fold_char).collect()))
            .collect();

        let mut records = Vec::new();
        if needles.is_empty() {
            return records;
        }

        for document in documents {
            for (page_index, page) in document.pages().iter().enumerate() {
                let page_number = page_index + 1;
                let chars = FoldedText::new(page);

                for (term, needle) in &needles {
                    let mut cursor = 0;

                    while let Some(start) = chars.find(needle, cursor) {
                        let end = start + needle.len();
                        let ordinal = records.len();
                        records.push(self.build_record(
                            document,
                            page_number,
                            term,
                            &chars,
                            start,
                            end,
                            ordinal,
                        ));
                        cursor = end;
                    }
                }
            }
        }

        log::debug!("search over {} documents produced {} matches", documents.len(), records.len());
        records
    }

    #[allow(clippy::too_many_arguments)]
    fn build_record(
        &self,
        document: &Document,
        page_number: usize,
        term: &str,
        chars: &FoldedText<'_>,
        start: usize,
        end: usize,
        ordinal: usize,
    ) -> MatchRecord {
        let context_start = start.saturating_sub(self.context_window);
        let context_end = (end + self.context_window).min(chars.len());

        let match_start = chars.byte_offset(start);
        let match_end = chars.byte_offset(end);

        MatchRecord {
            id: MatchId::new(document.file_index(), page_number, ordinal),
            file_index: document.file_index(),
            file_name: document.file_name().to_owned(),
            page_number,
            term: term.to_owned(),
            matched_text: chars.slice(start, end).to_owned(),
            match_start,
            match_end,
            before_context: chars.slice(context_start, start).trim().to_owned(),
            after_context: chars.slice(end, context_end).trim().to_owned(),
            full_context: chars.slice(context_start, context_end).to_owned(),
            derived_next_word: derive_next_word(chars.text, match_end),
        }
    }
}

/// Search with the default 50-character context window
pub fn search<S: AsRef<str>>(documents: &[Document], terms: &[S]) -> Vec<MatchRecord> {
    MatchEngine::default().search(documents, terms)
}

/// The first whitespace-delimited token after `match_end`
///
/// Whitespace and `:` directly after the match are skipped before the token
/// starts; punctuation inside the token is kept. Returns an empty string when
/// the page ends first. `match_end` is a byte offset into `page_text`.
pub fn derive_next_word(page_text: &str, match_end: usize) -> String {
    let rest = page_text.get(match_end..).unwrap_or("");
    let rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ':');

    rest.split(char::is_whitespace).next().unwrap_or("").to_owned()
}

/// Trim raw terms, drop empty ones and remove duplicates, keeping first occurrences
pub fn normalize_terms<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut terms: Vec<String> = Vec::new();

    for term in raw {
        let term = term.as_ref().trim();
        if !term.is_empty() && !terms.iter().any(|existing| existing == term) {
            terms.push(term.to_owned());
        }
    }

    terms
}

/// Lowercase a single character, keeping it unchanged when its lowercase
/// form expands to several characters so that positions stay aligned.
pub(crate) fn fold_char(c: char) -> char {
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(folded), None) => folded,
        _ => c,
    }
}

/// Page text indexed by character with a case-folded copy for matching
pub(crate) struct FoldedText<'a> {
    text: &'a str,
    /// Byte offset of every character, plus `text.len()` as a sentinel
    offsets: Vec<usize>,
    folded: Vec<char>,
}

impl<'a> FoldedText<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        let mut offsets = Vec::with_capacity(text.len() + 1);
        let mut folded = Vec::with_capacity(text.len());

        for (offset, c) in text.char_indices() {
            offsets.push(offset);
            folded.push(fold_char(c));
        }
        offsets.push(text.len());

        Self { text, offsets, folded }
    }

    pub(crate) fn len(&self) -> usize {
        self.folded.len()
    }

    fn byte_offset(&self, char_index: usize) -> usize {
        self.offsets[char_index]
    }

    fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.text[self.offsets[start]..self.offsets[end]]
    }

    /// Character index of the first occurrence of `needle` at or after `from`
    pub(crate) fn find(&self, needle: &[char], from: usize) -> Option<usize> {
        if needle.is_empty() || needle.len() > self.folded.len() {
            return None;
        }

        (from..=self.folded.len() - needle.len())
            .find(|&start| self.folded[start..start + needle.len()] == *needle)
    }
}
