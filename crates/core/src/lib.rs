//! PDFlyzer core library
//!
//! Text extraction, multi-term search with context, per-match annotations,
//! highlight mapping onto rendered text layers, and CSV export.

pub mod annotation;
pub mod csv_export;
pub mod deferred;
pub mod document;
pub mod navigation;
pub mod notify;
pub mod results;
pub mod search;
pub mod selection;
pub mod session;
pub mod settings;
pub mod text_layer;
pub mod viewer;

pub use annotation::{Annotation, AnnotationStore, MatchKey, MatchScope, MatchView};
pub use csv_export::{
    export_file_name, serialize, to_table, ExportColumns, ExportError, ExportOptions, ExportResult,
    ExportRow,
};
pub use deferred::{HighlightPass, HighlightScheduler, DEFAULT_HIGHLIGHT_DELAY};
pub use document::{Document, ExtractionError, ExtractionResult, SourceFile, TextExtractor};
pub use navigation::{Navigation, ZoomLimits};
pub use notify::{LogNotifier, Notice, NoticeKind, Notifier, RecordingNotifier};
pub use results::{group_by_file, group_by_term, FileGroup, TermGroup};
pub use search::{
    derive_next_word, normalize_terms, search, MatchEngine, MatchId, MatchRecord,
    DEFAULT_CONTEXT_WINDOW,
};
pub use selection::SelectionMode;
pub use session::{ExportedFile, SearchError, Session};
pub use settings::{Settings, DEFAULT_EXPORT_FILE_NAME};
pub use text_layer::{
    Color, FragmentRect, HighlightLayer, HighlightOverlay, OverlayStyle, PageTarget,
    RenderedTextLayer, TextFragment,
};
pub use viewer::Viewer;
