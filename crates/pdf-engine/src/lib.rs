//! PDF backend for text extraction and text-layer geometry.
//!
//! The engine opens documents from paths or bytes and exposes, per page, the
//! page size and the positioned text runs found in the page content stream.
//! Everything above this crate talks to PDFs only through [`PdfEngine`].

mod content;
mod fonts;
#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;

use lopdf::{Document, ObjectId};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub use content::GLYPH_ADVANCE_EM;

/// Fallback page size (US Letter) when no MediaBox can be resolved.
const DEFAULT_PAGE_SIZE: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };

/// Limit on `/Parent` hops when resolving inherited page attributes.
const MAX_INHERITANCE_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

/// A run of text drawn by a single text-showing operator.
///
/// Geometry is in page points with the origin at the top-left corner of the
/// page and y growing downward, the convention of on-screen text layers.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported")]
    EncryptedUnsupported,
    #[error("document has no pages")]
    NoPages,
}

/// Rendering collaborator boundary.
///
/// Page indices are 0-based at this level.
pub trait PdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError>;
    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError>;
    fn text_runs(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<Vec<TextRun>, PdfEngineError>;
    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError>;
}

#[derive(Debug)]
struct DocumentRecord {
    document: Document,
    page_ids: Vec<ObjectId>,
    page_sizes: Vec<PageSize>,
}

#[derive(Debug, Default)]
pub struct LopdfEngine {
    next_handle: u64,
    docs: HashMap<DocumentHandle, DocumentRecord>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse(bytes: &[u8]) -> Result<DocumentRecord, PdfEngineError> {
        if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(PdfEngineError::EncryptedUnsupported);
        }

        let document = Document::load_mem(bytes)?;
        let page_ids: Vec<ObjectId> = document.get_pages().into_values().collect();

        if page_ids.is_empty() {
            return Err(PdfEngineError::NoPages);
        }

        let page_sizes = page_ids
            .iter()
            .map(|page_id| media_box(&document, *page_id).unwrap_or(DEFAULT_PAGE_SIZE))
            .collect();

        Ok(DocumentRecord { document, page_ids, page_sizes })
    }

    fn record(&self, handle: DocumentHandle) -> Result<&DocumentRecord, PdfEngineError> {
        self.docs.get(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

impl PdfEngine for LopdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        let bytes = match source {
            OpenSource::Path(path) => fs::read(path)?,
            OpenSource::Bytes(bytes) => bytes,
        };

        let record = Self::parse(&bytes)?;

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        log::debug!("opened document {} with {} pages", handle.raw(), record.page_ids.len());
        self.docs.insert(handle, record);

        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(self.record(handle)?.page_ids.len() as u32)
    }

    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError> {
        let record = self.record(handle)?;
        record.page_sizes.get(page_index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: record.page_sizes.len() as u32,
        })
    }

    fn text_runs(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<Vec<TextRun>, PdfEngineError> {
        let record = self.record(handle)?;
        let page_size = self.page_size(handle, page_index)?;
        let page_id = record.page_ids[page_index as usize];

        let data = record.document.get_page_content(page_id)?;
        let operations = lopdf::content::Content::decode(&data)?.operations;
        let fonts = fonts::page_fonts(&record.document, page_id);

        Ok(content::collect_runs(&operations, &fonts, page_size.height_pt))
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

/// Resolve the page MediaBox, following `/Parent` for inherited values.
fn media_box(document: &Document, page_id: ObjectId) -> Option<PageSize> {
    let mut dict = document.get_dictionary(page_id).ok()?;

    for _ in 0..MAX_INHERITANCE_DEPTH {
        if let Some(size) = dict
            .get(b"MediaBox")
            .ok()
            .and_then(|obj| obj.as_array().ok())
            .and_then(|array| {
                if array.len() != 4 {
                    return None;
                }
                let x0 = array[0].as_float().ok()?;
                let y0 = array[1].as_float().ok()?;
                let x1 = array[2].as_float().ok()?;
                let y1 = array[3].as_float().ok()?;
                Some(PageSize { width_pt: (x1 - x0).abs(), height_pt: (y1 - y0).abs() })
            })
        {
            return Some(size);
        }

        let parent = dict.get(b"Parent").ok()?.as_reference().ok()?;
        dict = document.get_dictionary(parent).ok()?;
    }

    None
}

pub fn default_engine() -> LopdfEngine {
    LopdfEngine::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{text_pdf, FixturePage};

    fn sample_pdf_bytes() -> Vec<u8> {
        text_pdf(&[
            FixturePage::lines(&["Quarterly revenue grew", "Total: 42"]),
            FixturePage::lines(&["Second page"]),
        ])
    }

    #[test]
    fn opens_pdf_and_reads_page_count() {
        let mut engine = LopdfEngine::new();
        let handle =
            engine.open(OpenSource::Bytes(sample_pdf_bytes())).expect("open should succeed");

        assert_eq!(engine.page_count(handle).expect("count should succeed"), 2);
    }

    #[test]
    fn reads_page_size_from_media_box() {
        let mut engine = LopdfEngine::new();
        let handle =
            engine.open(OpenSource::Bytes(sample_pdf_bytes())).expect("open should succeed");

        let size = engine.page_size(handle, 0).expect("size should resolve");
        assert_eq!(size, PageSize { width_pt: 595.0, height_pt: 842.0 });
    }

    #[test]
    fn text_runs_follow_content_order() {
        let mut engine = LopdfEngine::new();
        let handle =
            engine.open(OpenSource::Bytes(sample_pdf_bytes())).expect("open should succeed");

        let runs = engine.text_runs(handle, 0).expect("runs should extract");
        let texts: Vec<&str> = runs.iter().map(|run| run.text.as_str()).collect();
        assert_eq!(texts, vec!["Quarterly revenue grew", "Total: 42"]);

        // The second line sits below the first in top-left page space.
        assert!(runs[1].y > runs[0].y);
        assert!(runs.iter().all(|run| run.width > 0.0 && run.height > 0.0));
    }

    #[test]
    fn text_runs_decode_font_encoding() {
        let bytes = text_pdf(&[FixturePage::lines(&["Total 250 €", "Straße – „Zitat“"])]);

        let mut engine = LopdfEngine::new();
        let handle = engine.open(OpenSource::Bytes(bytes)).expect("open should succeed");

        let runs = engine.text_runs(handle, 0).expect("runs should extract");
        let texts: Vec<&str> = runs.iter().map(|run| run.text.as_str()).collect();
        assert_eq!(texts, vec!["Total 250 €", "Straße – „Zitat“"]);
    }

    #[test]
    fn page_out_of_range_is_reported() {
        let mut engine = LopdfEngine::new();
        let handle =
            engine.open(OpenSource::Bytes(sample_pdf_bytes())).expect("open should succeed");

        let err = engine.text_runs(handle, 5).expect_err("page 5 does not exist");
        assert!(matches!(err, PdfEngineError::PageOutOfRange { page: 5, page_count: 2 }));
    }

    #[test]
    fn garbage_bytes_fail_to_open() {
        let mut engine = LopdfEngine::new();
        let err = engine
            .open(OpenSource::Bytes(b"definitely not a pdf".to_vec()))
            .expect_err("garbage should not parse");

        assert!(matches!(err, PdfEngineError::Parse(_)));
    }

    #[test]
    fn encrypted_marker_is_rejected() {
        let mut bytes = sample_pdf_bytes();
        bytes.extend_from_slice(b"\n% /Encrypt\n");

        let mut engine = LopdfEngine::new();
        let err = engine.open(OpenSource::Bytes(bytes)).expect_err("encrypted should fail");
        assert!(matches!(err, PdfEngineError::EncryptedUnsupported));
    }

    #[test]
    fn invalid_handle_returns_error() {
        let engine = LopdfEngine::new();
        let err =
            engine.page_count(DocumentHandle(999)).expect_err("should fail for unknown handle");

        assert!(matches!(err, PdfEngineError::InvalidHandle(999)));
    }

    #[test]
    fn close_releases_handle() {
        let mut engine = LopdfEngine::new();
        let handle =
            engine.open(OpenSource::Bytes(sample_pdf_bytes())).expect("open should succeed");

        engine.close(handle).expect("close should succeed");
        assert!(matches!(engine.close(handle), Err(PdfEngineError::InvalidHandle(_))));
    }
}
