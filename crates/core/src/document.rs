//! Loaded documents and per-page text extraction
//!
//! A [`TextExtractor`] is the client object for the PDF engine. Creating one
//! is the single engine initialisation step; it then turns PDF bytes into
//! ordered page texts and serves positioned text layers for the viewer.

use crate::text_layer::RenderedTextLayer;
use pdf_engine::{DocumentHandle, LopdfEngine, OpenSource, PdfEngine, PdfEngineError};
use std::path::Path;

/// A PDF's extracted text, immutable once created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    file_index: usize,
    file_name: String,
    pages: Vec<String>,
}

impl Document {
    pub fn new(file_index: usize, file_name: impl Into<String>, pages: Vec<String>) -> Self {
        Self { file_index, file_name: file_name.into(), pages }
    }

    /// 0-based index within the current upload batch
    pub fn file_index(&self) -> usize {
        self.file_index
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn pages(&self) -> &[String] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Text of a 1-based page number
    pub fn page(&self, page_number: usize) -> Option<&str> {
        page_number.checked_sub(1).and_then(|index| self.pages.get(index)).map(String::as_str)
    }
}

/// A user-supplied file awaiting extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), bytes }
    }

    /// Read a file from disk, naming it after its final path component
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("document.pdf")
            .to_owned();

        Ok(Self { name, bytes })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("failed to parse PDF: {0}")]
    Engine(#[from] PdfEngineError),

    #[error("PDF contains no extractable text")]
    NoText,

    #[error("page {page_number} out of range (page_count={page_count})")]
    PageOutOfRange { page_number: usize, page_count: usize },
}

pub type ExtractionResult<T> = Result<T, ExtractionError>;

/// Text extraction client over a [`PdfEngine`]
#[derive(Debug)]
pub struct TextExtractor<E: PdfEngine = LopdfEngine> {
    engine: E,
}

impl TextExtractor<LopdfEngine> {
    pub fn new() -> Self {
        Self { engine: pdf_engine::default_engine() }
    }
}

impl Default for TextExtractor<LopdfEngine> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: PdfEngine> TextExtractor<E> {
    pub fn with_engine(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Extract ordered page texts from PDF bytes
    ///
    /// Text runs on a page are joined with single spaces. Fails when the bytes
    /// do not parse or when no page carries any text (image-only scans).
    pub fn extract(&mut self, bytes: &[u8]) -> ExtractionResult<Vec<String>> {
        let pages = self.with_document(bytes, |engine, handle| {
            let page_count = engine.page_count(handle)?;
            let mut pages = Vec::with_capacity(page_count as usize);

            for page_index in 0..page_count {
                let runs = engine.text_runs(handle, page_index)?;
                let text = runs.iter().map(|run| run.text.as_str()).collect::<Vec<_>>().join(" ");
                log::debug!("page {} yielded {} runs", page_index + 1, runs.len());
                pages.push(text);
            }

            Ok(pages)
        })?;

        if pages.iter().all(|page| page.trim().is_empty()) {
            return Err(ExtractionError::NoText);
        }

        Ok(pages)
    }

    /// Extract a batch of files in order, skipping any that fail
    ///
    /// A failing file never aborts its siblings. Surviving documents receive
    /// consecutive file indices in upload order.
    pub fn extract_all(&mut self, files: &[SourceFile]) -> Vec<Document> {
        self.load_all(files).into_iter().map(|(document, _)| document).collect()
    }

    /// Like [`extract_all`](Self::extract_all), pairing each document with
    /// the file it came from
    pub fn load_all<'f>(&mut self, files: &'f [SourceFile]) -> Vec<(Document, &'f SourceFile)> {
        let mut loaded = Vec::with_capacity(files.len());

        for file in files {
            match self.extract(&file.bytes) {
                Ok(pages) => {
                    let document = Document::new(loaded.len(), file.name.clone(), pages);
                    loaded.push((document, file));
                }
                Err(err) => log::warn!("skipping {}: {err}", file.name),
            }
        }

        log::info!("extracted {} of {} files", loaded.len(), files.len());
        loaded
    }

    /// Positioned text layer for a 1-based page of the given PDF bytes
    pub fn text_layer(
        &mut self,
        bytes: &[u8],
        file_index: usize,
        page_number: usize,
    ) -> ExtractionResult<RenderedTextLayer> {
        self.with_document(bytes, |engine, handle| {
            let page_count = engine.page_count(handle)? as usize;
            if page_number == 0 || page_number > page_count {
                return Err(ExtractionError::PageOutOfRange { page_number, page_count });
            }

            let page_index = (page_number - 1) as u32;
            let size = engine.page_size(handle, page_index)?;
            let runs = engine.text_runs(handle, page_index)?;

            Ok(RenderedTextLayer::from_runs(file_index, page_number, size, runs))
        })
    }

    /// Open `bytes`, run `f`, and close the handle whatever `f` returned
    fn with_document<T>(
        &mut self,
        bytes: &[u8],
        f: impl FnOnce(&E, DocumentHandle) -> ExtractionResult<T>,
    ) -> ExtractionResult<T> {
        let handle = self.engine.open(OpenSource::Bytes(bytes.to_vec()))?;
        let result = f(&self.engine, handle);
        let closed = self.engine.close(handle);

        let value = result?;
        closed?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdf_engine::fixtures::{text_pdf, FixturePage};

    fn invoice_pdf() -> Vec<u8> {
        text_pdf(&[
            FixturePage::lines(&["Invoice number: 1001", "Total: 250 EUR"]),
            FixturePage::runs(&["Payment", "due", "in 30 days"]),
        ])
    }

    #[test]
    fn test_extract_pages_in_order() {
        let mut extractor = TextExtractor::new();
        let pages = extractor.extract(&invoice_pdf()).expect("extraction should succeed");

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0], "Invoice number: 1001 Total: 250 EUR");
        assert_eq!(pages[1], "Payment due in 30 days");
    }

    #[test]
    fn test_extracted_symbols_are_searchable() {
        let mut extractor = TextExtractor::new();
        let files = vec![SourceFile::new(
            "prices.pdf",
            text_pdf(&[FixturePage::lines(&["Total 250 €", "Straße 5"])]),
        )];

        let documents = extractor.extract_all(&files);
        assert_eq!(documents[0].page(1), Some("Total 250 € Straße 5"));

        let records = crate::search::search(&documents, &["€", "STRASSE", "straße"]);
        let matched: Vec<&str> = records.iter().map(|record| record.matched_text.as_str()).collect();
        assert_eq!(matched, vec!["€", "Straße"]);
        assert_eq!(records[0].derived_next_word, "Straße");
    }

    #[test]
    fn test_extract_rejects_garbage() {
        let mut extractor = TextExtractor::new();
        let err = extractor.extract(b"not a pdf").expect_err("garbage should fail");

        assert!(matches!(err, ExtractionError::Engine(_)));
    }

    #[test]
    fn test_extract_rejects_pdf_without_text() {
        let mut extractor = TextExtractor::new();
        let bytes = text_pdf(&[FixturePage::blank(), FixturePage::blank()]);

        let err = extractor.extract(&bytes).expect_err("image-only PDFs have no text");
        assert!(matches!(err, ExtractionError::NoText));
    }

    #[test]
    fn test_blank_pages_keep_their_position() {
        let mut extractor = TextExtractor::new();
        let bytes = text_pdf(&[FixturePage::blank(), FixturePage::lines(&["late text"])]);

        let pages = extractor.extract(&bytes).expect("extraction should succeed");
        assert_eq!(pages, vec![String::new(), "late text".to_owned()]);
    }

    #[test]
    fn test_extract_all_skips_corrupt_file() {
        let mut extractor = TextExtractor::new();
        let files = vec![
            SourceFile::new("a.pdf", text_pdf(&[FixturePage::lines(&["first"])])),
            SourceFile::new("b.pdf", b"%PDF-1.4 corrupt".to_vec()),
            SourceFile::new("c.pdf", text_pdf(&[FixturePage::lines(&["third"])])),
        ];

        let documents = extractor.extract_all(&files);
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].file_name(), "a.pdf");
        assert_eq!(documents[0].file_index(), 0);
        assert_eq!(documents[1].file_name(), "c.pdf");
        assert_eq!(documents[1].file_index(), 1);
        assert_eq!(documents[1].page(1), Some("third"));
    }

    #[test]
    fn test_text_layer_for_page() {
        let mut extractor = TextExtractor::new();
        let layer = extractor.text_layer(&invoice_pdf(), 3, 2).expect("layer should load");

        assert_eq!(layer.file_index, 3);
        assert_eq!(layer.page_number, 2);
        assert_eq!(layer.fragments.len(), 3);
        assert_eq!(layer.fragments[0].text, "Payment");
        assert!(layer.is_ready());
    }

    #[test]
    fn test_text_layer_page_out_of_range() {
        let mut extractor = TextExtractor::new();
        let err = extractor.text_layer(&invoice_pdf(), 0, 9).expect_err("page 9 is missing");

        assert!(matches!(err, ExtractionError::PageOutOfRange { page_number: 9, page_count: 2 }));
    }

    #[test]
    fn test_document_page_lookup_is_one_based() {
        let document = Document::new(0, "x.pdf", vec!["one".to_owned(), "two".to_owned()]);

        assert_eq!(document.page(0), None);
        assert_eq!(document.page(1), Some("one"));
        assert_eq!(document.page(2), Some("two"));
        assert_eq!(document.page(3), None);
    }
}
