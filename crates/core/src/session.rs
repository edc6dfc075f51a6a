//! Session orchestration
//!
//! A [`Session`] owns the loaded documents, the current result batch and the
//! viewer. Every user action goes through it and reports back through a
//! [`Notifier`]. Failed actions leave the previous state in place.

use crate::annotation::AnnotationStore;
use crate::csv_export::{self, export_file_name, ExportError, ExportOptions, ExportResult};
use crate::document::{Document, ExtractionResult, SourceFile, TextExtractor};
use crate::notify::{LogNotifier, Notice, Notifier};
use crate::search::{normalize_terms, MatchEngine, MatchId};
use crate::settings::Settings;
use crate::text_layer::HighlightOverlay;
use crate::viewer::Viewer;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    #[error("no documents loaded")]
    NoDocuments,

    #[error("no matches found")]
    NoMatches,
}

/// A serialized export ready to be written or downloaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

pub struct Session<N: Notifier = LogNotifier> {
    settings: Settings,
    extractor: TextExtractor,
    engine: MatchEngine,
    notifier: N,
    /// Source bytes of each loaded document, by file index
    sources: Vec<SourceFile>,
    documents: Vec<Document>,
    terms: Vec<String>,
    store: AnnotationStore,
    viewer: Viewer,
}

impl Session<LogNotifier> {
    pub fn new(settings: Settings) -> Self {
        Self::with_notifier(settings, LogNotifier)
    }
}

impl<N: Notifier> Session<N> {
    pub fn with_notifier(settings: Settings, notifier: N) -> Self {
        Self {
            engine: settings.match_engine(),
            viewer: Viewer::new(&settings),
            extractor: TextExtractor::new(),
            notifier,
            sources: Vec::new(),
            documents: Vec::new(),
            terms: Vec::new(),
            store: AnnotationStore::default(),
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Terms of the current result batch
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    pub fn viewer_mut(&mut self) -> &mut Viewer {
        &mut self.viewer
    }

    /// Replace the loaded documents with those extracted from `files`
    ///
    /// Files that fail to extract are skipped. When none load, the previous
    /// documents and results stay. Returns the number of documents loaded.
    pub fn upload(&mut self, files: Vec<SourceFile>, now: Instant) -> usize {
        let loaded = self.extractor.load_all(&files);
        let skipped = files.len() - loaded.len();

        if loaded.is_empty() {
            self.notifier.notify(Notice::error(
                "Error uploading PDFs",
                "Failed to parse the PDF files.",
            ));
            return 0;
        }

        let (documents, sources): (Vec<Document>, Vec<SourceFile>) =
            loaded.into_iter().map(|(document, file)| (document, file.clone())).unzip();
        let count = documents.len();

        self.documents = documents;
        self.sources = sources;
        self.terms.clear();
        self.store = AnnotationStore::default();
        self.viewer.open_document(0, self.documents[0].page_count(), now);

        let description = if skipped == 0 {
            format!("{count} file(s) ready to be searched.")
        } else {
            format!("{count} file(s) ready to be searched, {skipped} could not be read.")
        };
        self.notifier.notify(Notice::success("PDFs uploaded successfully", description));
        count
    }

    /// Search the loaded documents, replacing the current result batch
    ///
    /// A search that finds nothing still replaces the batch, with an empty one.
    pub fn search<S: AsRef<str>>(&mut self, terms: &[S], now: Instant) -> Result<usize, SearchError> {
        if self.documents.is_empty() {
            self.notifier
                .notify(Notice::validation("No PDFs loaded", "Please upload PDF files first."));
            return Err(SearchError::NoDocuments);
        }

        let terms = normalize_terms(terms);
        let records = self.engine.search(&self.documents, &terms);
        let count = records.len();

        self.terms = terms;
        self.store = AnnotationStore::new(records);
        self.viewer.selection_mut().reset();
        self.viewer.annotations_changed(now);

        if count == 0 {
            self.notifier.notify(Notice::validation(
                "No matches found",
                "Try different search terms or upload other PDFs.",
            ));
            return Err(SearchError::NoMatches);
        }

        self.notifier.notify(Notice::success("Search completed", format!("Found {count} matches.")));
        Ok(count)
    }

    /// Serialize the current results to CSV in memory
    pub fn export(&mut self, options: &ExportOptions) -> ExportResult<ExportedFile> {
        let result = csv_export::export(&self.store.views(), options);

        match result {
            Ok(bytes) => {
                let file_name = export_file_name(&self.documents, &self.settings.export_file_name);
                self.notifier.notify(Notice::success(
                    "Export successful",
                    format!("Results exported as {file_name}"),
                ));
                Ok(ExportedFile { file_name, bytes })
            }
            Err(ExportError::NoResults) => {
                self.notifier
                    .notify(Notice::validation("Nothing to export", "Run a search with results first."));
                Err(ExportError::NoResults)
            }
            Err(err) => {
                self.notifier
                    .notify(Notice::error("Export failed", "An error occurred while exporting to CSV."));
                Err(err)
            }
        }
    }

    pub fn toggle_highlight(&mut self, id: &MatchId, now: Instant) -> bool {
        let touched = self.store.toggle_highlight(id);
        if touched {
            self.viewer.annotations_changed(now);
        }
        touched
    }

    pub fn set_next_word(&mut self, id: &MatchId, word: impl Into<String>, now: Instant) -> bool {
        let touched = self.store.set_next_word(id, word);
        if touched {
            self.viewer.annotations_changed(now);
        }
        touched
    }

    /// Commit the viewer's text selection as the next word of its match
    pub fn commit_selection(&mut self, now: Instant) -> Option<MatchId> {
        let id = self.viewer.selection_mut().commit(&mut self.store)?;
        self.viewer.annotations_changed(now);
        Some(id)
    }

    /// Show another loaded document; unknown indices are ignored
    pub fn open_document(&mut self, file_index: usize, now: Instant) -> bool {
        let Some(document) = self.documents.get(file_index) else {
            return false;
        };

        self.viewer.open_document(file_index, document.page_count(), now);
        true
    }

    /// Lay out the text layer of the page currently shown
    ///
    /// Returns `Ok(false)` when no document is shown.
    pub fn load_text_layer(&mut self) -> ExtractionResult<bool> {
        let Some(target) = self.viewer.current_target() else {
            return Ok(false);
        };
        let Some(source) = self.sources.get(target.file_index) else {
            return Ok(false);
        };

        let layer =
            self.extractor.text_layer(&source.bytes, target.file_index, target.page_number)?;
        Ok(self.viewer.attach_text_layer(layer))
    }

    /// Run a due highlight pass
    pub fn tick(&mut self, now: Instant) -> Option<&[HighlightOverlay]> {
        self.viewer.tick(now, &self.store)
    }
}
