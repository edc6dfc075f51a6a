//! In-document viewer state
//!
//! Owns what belongs to the currently displayed document: page, zoom,
//! selection mode, the text layer of the shown page and its highlight
//! overlays. Nothing here survives a document switch.

use crate::annotation::AnnotationStore;
use crate::deferred::HighlightScheduler;
use crate::navigation::{Navigation, ZoomLimits};
use crate::selection::SelectionMode;
use crate::settings::Settings;
use crate::text_layer::{HighlightLayer, HighlightOverlay, PageTarget, RenderedTextLayer};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct Viewer {
    active_file: Option<usize>,
    navigation: Navigation,
    selection: SelectionMode,
    text_layer: Option<RenderedTextLayer>,
    highlights: HighlightLayer,
    scheduler: HighlightScheduler,
}

impl Default for Viewer {
    fn default() -> Self {
        Self::new(&Settings::default())
    }
}

impl Viewer {
    pub fn new(settings: &Settings) -> Self {
        Self {
            active_file: None,
            navigation: Navigation::new(0, ZoomLimits::from(settings)),
            selection: SelectionMode::Idle,
            text_layer: None,
            highlights: HighlightLayer::new(),
            scheduler: HighlightScheduler::new(settings.highlight_delay()),
        }
    }

    pub fn active_file(&self) -> Option<usize> {
        self.active_file
    }

    pub fn navigation(&self) -> &Navigation {
        &self.navigation
    }

    pub fn selection(&self) -> &SelectionMode {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut SelectionMode {
        &mut self.selection
    }

    pub fn text_layer(&self) -> Option<&RenderedTextLayer> {
        self.text_layer.as_ref()
    }

    pub fn overlays(&self) -> &[HighlightOverlay] {
        self.highlights.overlays()
    }

    pub fn has_pending_highlight(&self) -> bool {
        self.scheduler.is_pending()
    }

    /// The page currently shown
    pub fn current_target(&self) -> Option<PageTarget> {
        self.active_file.map(|file_index| PageTarget::new(file_index, self.navigation.current_page()))
    }

    /// Show another document from its first page at the default zoom
    pub fn open_document(&mut self, file_index: usize, page_count: usize, now: Instant) {
        self.active_file = Some(file_index);
        self.navigation.reset(page_count);
        self.page_changed(now);
    }

    /// Stop showing any document
    pub fn close(&mut self) {
        self.active_file = None;
        self.navigation.reset(0);
        self.selection.reset();
        self.text_layer = None;
        self.highlights.clear();
        self.scheduler.cancel();
    }

    pub fn next_page(&mut self, now: Instant) -> bool {
        let changed = self.navigation.next_page();
        if changed {
            self.page_changed(now);
        }
        changed
    }

    pub fn prev_page(&mut self, now: Instant) -> bool {
        let changed = self.navigation.prev_page();
        if changed {
            self.page_changed(now);
        }
        changed
    }

    pub fn set_page(&mut self, page: usize, now: Instant) -> bool {
        let changed = self.navigation.set_page(page);
        if changed {
            self.page_changed(now);
        }
        changed
    }

    pub fn zoom_in(&mut self, now: Instant) -> bool {
        let changed = self.navigation.zoom_in();
        if changed {
            self.request_highlight(now);
        }
        changed
    }

    pub fn zoom_out(&mut self, now: Instant) -> bool {
        let changed = self.navigation.zoom_out();
        if changed {
            self.request_highlight(now);
        }
        changed
    }

    /// A highlight flag or next word changed somewhere
    pub fn annotations_changed(&mut self, now: Instant) {
        self.request_highlight(now);
    }

    /// Accept the text layer the renderer produced
    ///
    /// A layer for any page other than the one shown is stale and dropped.
    /// Returns whether the layer was kept.
    pub fn attach_text_layer(&mut self, layer: RenderedTextLayer) -> bool {
        if self.current_target() != Some(layer.target()) {
            log::debug!(
                "dropping stale text layer for page {} of file {}",
                layer.page_number,
                layer.file_index
            );
            return false;
        }

        self.text_layer = Some(layer);
        true
    }

    /// Run the pending highlight pass once it is due
    ///
    /// Returns the fresh overlays when a pass ran.
    pub fn tick(&mut self, now: Instant, store: &AnnotationStore) -> Option<&[HighlightOverlay]> {
        let pass = self.scheduler.poll(now, self.text_layer.as_ref())?;
        let layer = self.text_layer.as_ref()?;

        let views = store.active_for_page(pass.target.file_index, pass.target.page_number);
        Some(self.highlights.apply(layer, &views, self.navigation.zoom()))
    }

    fn page_changed(&mut self, now: Instant) {
        self.selection.reset();
        if let Some(layer) = self.text_layer.as_mut() {
            layer.mark_not_ready();
        }
        self.highlights.clear();
        self.request_highlight(now);
    }

    fn request_highlight(&mut self, now: Instant) {
        if let Some(target) = self.current_target() {
            self.scheduler.request(target, now);
        }
    }
}
