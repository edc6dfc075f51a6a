//! Positioned text layer of a rendered page and highlight overlays
//!
//! The rendering side hands over a page as an ordered set of text fragments
//! with geometry. Fragments do not line up with match boundaries, so the
//! [`HighlightLayer`] scans every fragment on its own and maps each hit back
//! to a sub-fragment rectangle. A match split across two fragments is not
//! found; overlays are decoration only and never touch the fragments.

use crate::annotation::MatchView;
use crate::search::{fold_char, FoldedText, MatchId};
use pdf_engine::{PageSize, TextRun};
use serde::{Deserialize, Serialize};

/// RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// Axis-aligned rectangle, top-left origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FragmentRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl FragmentRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// The part of this rectangle covering characters `start..end` out of
    /// `char_count`, assuming every character has the same advance
    pub fn char_range(&self, start: usize, end: usize, char_count: usize) -> Self {
        if char_count == 0 {
            return Self::new(self.x, self.y, 0.0, self.height);
        }

        let advance = self.width / char_count as f32;
        Self::new(
            self.x + start as f32 * advance,
            self.y,
            (end.saturating_sub(start)) as f32 * advance,
            self.height,
        )
    }

    /// Scale from page points to pixels
    pub fn scaled(&self, scale: f32) -> Self {
        Self::new(self.x * scale, self.y * scale, self.width * scale, self.height * scale)
    }
}

/// A positioned run of text as laid out by the renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
    /// Geometry in page points
    pub rect: FragmentRect,
}

impl TextFragment {
    pub fn new(text: impl Into<String>, rect: FragmentRect) -> Self {
        Self { text: text.into(), rect }
    }
}

impl From<TextRun> for TextFragment {
    fn from(run: TextRun) -> Self {
        Self { text: run.text, rect: FragmentRect::new(run.x, run.y, run.width, run.height) }
    }
}

/// Identifies one page of one loaded document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageTarget {
    pub file_index: usize,
    pub page_number: usize,
}

impl PageTarget {
    pub fn new(file_index: usize, page_number: usize) -> Self {
        Self { file_index, page_number }
    }
}

/// Text layer for a single rendered page
///
/// A layer starts out not ready while the renderer is still laying it out;
/// highlighting waits until it is marked ready.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedTextLayer {
    pub file_index: usize,
    /// 1-based page number
    pub page_number: usize,
    pub page_width: f32,
    pub page_height: f32,
    /// Fragments in reading order
    pub fragments: Vec<TextFragment>,
    ready: bool,
}

impl RenderedTextLayer {
    /// Create an empty layer that is still loading
    pub fn new(file_index: usize, page_number: usize, page_width: f32, page_height: f32) -> Self {
        Self { file_index, page_number, page_width, page_height, fragments: Vec::new(), ready: false }
    }

    /// Build a fully laid out layer from engine text runs
    pub fn from_runs(
        file_index: usize,
        page_number: usize,
        size: PageSize,
        runs: Vec<TextRun>,
    ) -> Self {
        let mut layer = Self::new(file_index, page_number, size.width_pt, size.height_pt);
        layer.fragments = runs.into_iter().map(TextFragment::from).collect();
        layer.ready = true;
        layer
    }

    pub fn target(&self) -> PageTarget {
        PageTarget::new(self.file_index, self.page_number)
    }

    pub fn push_fragment(&mut self, fragment: TextFragment) {
        self.fragments.push(fragment);
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn mark_ready(&mut self) {
        self.ready = true;
    }

    pub fn mark_not_ready(&mut self) {
        self.ready = false;
    }

    /// Fragment texts joined with single spaces
    pub fn text(&self) -> String {
        self.fragments.iter().map(|fragment| fragment.text.as_str()).collect::<Vec<_>>().join(" ")
    }
}

/// Visual treatment of an overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayStyle {
    /// The matched term
    Match,
    /// The word recorded as following the match
    NextWord,
}

impl OverlayStyle {
    pub fn color(&self) -> Color {
        match self {
            OverlayStyle::Match => Color::new(139, 92, 246, 128),
            OverlayStyle::NextWord => Color::new(245, 158, 11, 128),
        }
    }

    pub fn underline(&self) -> bool {
        matches!(self, OverlayStyle::NextWord)
    }
}

/// A highlight rectangle over part of one fragment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightOverlay {
    /// Every match that produced this exact overlay
    pub match_ids: Vec<MatchId>,
    pub fragment_index: usize,
    /// Character range within the fragment
    pub char_start: usize,
    pub char_end: usize,
    /// Pixels at the applied scale, relative to the page origin
    pub rect: FragmentRect,
    pub style: OverlayStyle,
}

/// Overlay set for the page currently shown
#[derive(Debug, Clone, Default)]
pub struct HighlightLayer {
    target: Option<PageTarget>,
    scale: f32,
    overlays: Vec<HighlightOverlay>,
}

impl HighlightLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn overlays(&self) -> &[HighlightOverlay] {
        &self.overlays
    }

    pub fn target(&self) -> Option<PageTarget> {
        self.target
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }

    pub fn clear(&mut self) {
        self.overlays.clear();
        self.target = None;
    }

    /// Recompute every overlay for `layer` from the given matches
    ///
    /// Previous overlays are dropped first, so repeated calls with the same
    /// inputs give the same result. Matches that are switched off or belong
    /// to another page are ignored. A layer that is still loading or has no
    /// fragments leaves the overlay set empty.
    pub fn apply(
        &mut self,
        layer: &RenderedTextLayer,
        views: &[MatchView<'_>],
        scale: f32,
    ) -> &[HighlightOverlay] {
        self.clear();
        self.scale = scale;

        if !layer.is_ready() || layer.fragments.is_empty() {
            return &self.overlays;
        }
        self.target = Some(layer.target());

        let fragments: Vec<FoldedText<'_>> =
            layer.fragments.iter().map(|fragment| FoldedText::new(&fragment.text)).collect();

        for view in views {
            let record = view.record;
            if !view.is_highlighted()
                || record.file_index != layer.file_index
                || record.page_number != layer.page_number
            {
                continue;
            }

            let needle = fold(&record.matched_text);
            self.mark_hits(layer, &fragments, &needle, view.id(), OverlayStyle::Match, scale);

            let next_word = fold(view.next_word());
            if !next_word.is_empty() && next_word != fold(&record.term) {
                self.mark_hits(layer, &fragments, &next_word, view.id(), OverlayStyle::NextWord, scale);
            }
        }

        log::debug!(
            "page {} of file {}: {} overlays",
            layer.page_number,
            layer.file_index,
            self.overlays.len()
        );
        &self.overlays
    }

    fn mark_hits(
        &mut self,
        layer: &RenderedTextLayer,
        fragments: &[FoldedText<'_>],
        needle: &[char],
        id: &MatchId,
        style: OverlayStyle,
        scale: f32,
    ) {
        for (fragment_index, folded) in fragments.iter().enumerate() {
            let mut cursor = 0;

            while let Some(start) = folded.find(needle, cursor) {
                let end = start + needle.len();
                let rect = layer.fragments[fragment_index]
                    .rect
                    .char_range(start, end, folded.len())
                    .scaled(scale);

                self.insert(id, fragment_index, start, end, rect, style);
                cursor = start + 1;
            }
        }
    }

    fn insert(
        &mut self,
        id: &MatchId,
        fragment_index: usize,
        char_start: usize,
        char_end: usize,
        rect: FragmentRect,
        style: OverlayStyle,
    ) {
        let existing = self.overlays.iter_mut().find(|overlay| {
            overlay.fragment_index == fragment_index
                && overlay.char_start == char_start
                && overlay.char_end == char_end
                && overlay.style == style
        });

        match existing {
            Some(overlay) => {
                if !overlay.match_ids.contains(id) {
                    overlay.match_ids.push(id.clone());
                }
            }
            None => self.overlays.push(HighlightOverlay {
                match_ids: vec![id.clone()],
                fragment_index,
                char_start,
                char_end,
                rect,
                style,
            }),
        }
    }
}

fn fold(text: &str) -> Vec<char> {
    text.chars().map(fold_char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::AnnotationStore;
    use crate::document::Document;
    use crate::search::search;

    /// 6pt per character, like 12pt Courier
    fn fragment(text: &str, x: f32, y: f32) -> TextFragment {
        TextFragment::new(text, FragmentRect::new(x, y, 6.0 * text.chars().count() as f32, 12.0))
    }

    fn ready_layer(page_number: usize, fragments: Vec<TextFragment>) -> RenderedTextLayer {
        let mut layer = RenderedTextLayer::new(0, page_number, 595.0, 842.0);
        for fragment in fragments {
            layer.push_fragment(fragment);
        }
        layer.mark_ready();
        layer
    }

    fn store_for(pages: &[&str], terms: &[&str]) -> AnnotationStore {
        let document =
            Document::new(0, "a.pdf", pages.iter().map(|page| (*page).to_owned()).collect());
        AnnotationStore::new(search(&[document], terms))
    }

    #[test]
    fn test_char_range_uses_uniform_advance() {
        let rect = FragmentRect::new(10.0, 20.0, 40.0, 12.0);

        let sub = rect.char_range(2, 5, 10);
        assert_eq!(sub, FragmentRect::new(18.0, 20.0, 12.0, 12.0));

        let empty = rect.char_range(0, 0, 0);
        assert_eq!(empty.width, 0.0);
    }

    #[test]
    fn test_match_and_next_word_overlays() {
        let store = store_for(&["Total: 250 EUR"], &["total"]);
        let layer = ready_layer(1, vec![fragment("Total: 250 EUR", 72.0, 60.0)]);
        let mut highlights = HighlightLayer::new();

        let overlays = highlights.apply(&layer, &store.active_for_page(0, 1), 2.0);
        assert_eq!(overlays.len(), 2);

        let matched = &overlays[0];
        assert_eq!(matched.style, OverlayStyle::Match);
        assert_eq!((matched.char_start, matched.char_end), (0, 5));
        assert_eq!(matched.rect, FragmentRect::new(144.0, 120.0, 60.0, 24.0));

        let next = &overlays[1];
        assert_eq!(next.style, OverlayStyle::NextWord);
        assert_eq!((next.char_start, next.char_end), (7, 10));
        assert_eq!(next.rect.x, (72.0 + 42.0) * 2.0);
        assert!(next.style.underline());
        assert_ne!(next.style.color(), matched.style.color());
    }

    #[test]
    fn test_apply_is_idempotent() {
        let store = store_for(&["Total: 10 and total: 20"], &["total"]);
        let layer = ready_layer(
            1,
            vec![fragment("Total: 10 and", 72.0, 60.0), fragment("total: 20", 160.0, 60.0)],
        );
        let views = store.active_for_page(0, 1);
        let mut highlights = HighlightLayer::new();

        let first = highlights.apply(&layer, &views, 1.5).to_vec();
        let second = highlights.apply(&layer, &views, 1.5).to_vec();

        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn test_identical_overlays_are_merged() {
        let store = store_for(&["Total Total"], &["total"]);
        let layer = ready_layer(1, vec![fragment("Total Total", 72.0, 60.0)]);
        let mut highlights = HighlightLayer::new();

        let overlays = highlights.apply(&layer, &store.active_for_page(0, 1), 1.0);
        let matches: Vec<_> =
            overlays.iter().filter(|overlay| overlay.style == OverlayStyle::Match).collect();

        assert_eq!(matches.len(), 2);
        for overlay in matches {
            assert_eq!(overlay.match_ids.len(), 2);
        }
    }

    #[test]
    fn test_hits_within_fragment_may_overlap() {
        let store = store_for(&["aaa"], &["aa"]);
        let layer = ready_layer(1, vec![fragment("aaa", 0.0, 0.0)]);
        let mut highlights = HighlightLayer::new();

        let overlays = highlights.apply(&layer, &store.active_for_page(0, 1), 1.0);
        let starts: Vec<usize> = overlays
            .iter()
            .filter(|overlay| overlay.style == OverlayStyle::Match)
            .map(|overlay| overlay.char_start)
            .collect();
        assert_eq!(starts, vec![0, 1]);
    }

    #[test]
    fn test_match_split_across_fragments_is_not_found() {
        let store = store_for(&["Total: 250"], &["total"]);
        let layer = ready_layer(1, vec![fragment("Tot", 72.0, 60.0), fragment("al: 250", 90.0, 60.0)]);
        let mut highlights = HighlightLayer::new();

        let overlays = highlights.apply(&layer, &store.active_for_page(0, 1), 1.0);
        assert!(overlays.iter().all(|overlay| overlay.style == OverlayStyle::NextWord));
        assert_eq!(overlays.len(), 1);
        assert_eq!(overlays[0].fragment_index, 1);
    }

    #[test]
    fn test_unhighlighted_and_other_page_matches_are_ignored() {
        let mut store = store_for(&["Total: 1", "Total: 2"], &["total"]);
        let layer = ready_layer(1, vec![fragment("Total: 1", 72.0, 60.0)]);
        let mut highlights = HighlightLayer::new();

        // Page 2 matches are passed in but do not belong to this layer.
        assert_eq!(highlights.apply(&layer, &[store.views()[1]], 1.0).len(), 0);

        let id = store.records()[0].id.clone();
        store.toggle_highlight(&id);
        assert!(highlights.apply(&layer, &store.views(), 1.0).is_empty());
    }

    #[test]
    fn test_next_word_equal_to_term_is_skipped() {
        let mut store = store_for(&["Total TOTAL"], &["total"]);
        let id = store.records()[0].id.clone();
        store.set_next_word(&id, "TOTAL");
        let layer = ready_layer(1, vec![fragment("Total TOTAL", 0.0, 0.0)]);
        let mut highlights = HighlightLayer::new();

        let overlays = highlights.apply(&layer, &store.active_for_page(0, 1), 1.0);
        assert!(overlays.iter().all(|overlay| overlay.style == OverlayStyle::Match));
    }

    #[test]
    fn test_loading_or_empty_layer_is_noop() {
        let store = store_for(&["Total: 1"], &["total"]);
        let views = store.active_for_page(0, 1);
        let mut highlights = HighlightLayer::new();

        let mut loading = RenderedTextLayer::new(0, 1, 595.0, 842.0);
        loading.push_fragment(fragment("Total: 1", 0.0, 0.0));
        assert!(highlights.apply(&loading, &views, 1.0).is_empty());
        assert_eq!(highlights.target(), None);

        let empty = ready_layer(1, Vec::new());
        assert!(highlights.apply(&empty, &views, 1.0).is_empty());

        let layer = ready_layer(1, vec![fragment("Total: 1", 0.0, 0.0)]);
        assert!(highlights.apply(&layer, &[], 1.0).is_empty());
        assert_eq!(highlights.target(), Some(PageTarget::new(0, 1)));
    }

    #[test]
    fn test_fragments_are_left_untouched() {
        let store = store_for(&["Total: 1"], &["total"]);
        let layer = ready_layer(1, vec![fragment("Total: 1", 0.0, 0.0)]);
        let before = layer.clone();

        HighlightLayer::new().apply(&layer, &store.views(), 3.0);
        assert_eq!(layer, before);
    }

    #[test]
    fn test_from_runs_builds_ready_layer() {
        let runs = vec![TextRun { text: "Hi".to_owned(), x: 1.0, y: 2.0, width: 12.0, height: 12.0 }];
        let size = PageSize { width_pt: 100.0, height_pt: 200.0 };

        let layer = RenderedTextLayer::from_runs(2, 4, size, runs);
        assert!(layer.is_ready());
        assert_eq!(layer.target(), PageTarget::new(2, 4));
        assert_eq!(layer.fragments[0].rect, FragmentRect::new(1.0, 2.0, 12.0, 12.0));
        assert_eq!(layer.text(), "Hi");
    }
}
