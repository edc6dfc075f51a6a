//! CSV export of search results
//!
//! The whole file is built in memory before anything is handed to the caller,
//! so a failure never leaves a partially written export behind.

use crate::annotation::MatchView;
use crate::document::Document;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("no search results to export")]
    NoResults,

    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ExportResult<T> = Result<T, ExportError>;

/// Which columns an export carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportColumns {
    /// File, Page, Before Match, Match, Next Word, After Match, Full Context
    #[default]
    MultiFile,
    /// Drops File and Next Word
    SingleFile,
}

impl ExportColumns {
    pub fn headers(&self) -> &'static [&'static str] {
        match self {
            ExportColumns::MultiFile => &[
                "File",
                "Page",
                "Before Match",
                "Match",
                "Next Word",
                "After Match",
                "Full Context",
            ],
            ExportColumns::SingleFile => {
                &["Page", "Before Match", "Match", "After Match", "Full Context"]
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExportOptions {
    pub columns: ExportColumns,
    /// Leave out matches whose highlight is switched off
    pub only_highlighted: bool,
}

/// One exported match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRow {
    pub file: String,
    pub page: usize,
    pub before: String,
    pub matched: String,
    /// The annotation's next word, not the derived one
    pub next_word: String,
    pub after: String,
    pub full_context: String,
}

impl ExportRow {
    fn record(&self, columns: ExportColumns) -> Vec<String> {
        let page = self.page.to_string();

        match columns {
            ExportColumns::MultiFile => vec![
                quoted(&self.file),
                page,
                quoted(&self.before),
                quoted(&self.matched),
                quoted(&self.next_word),
                quoted(&self.after),
                quoted(&self.full_context),
            ],
            ExportColumns::SingleFile => vec![
                page,
                quoted(&self.before),
                quoted(&self.matched),
                quoted(&self.after),
                quoted(&self.full_context),
            ],
        }
    }
}

/// Wrap a text field in quotes, doubling embedded ones
fn quoted(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Flatten matches into export rows, in input order
pub fn to_table(views: &[MatchView<'_>]) -> Vec<ExportRow> {
    views
        .iter()
        .map(|view| {
            let record = view.record;
            ExportRow {
                file: record.file_name.clone(),
                page: record.page_number,
                before: record.before_context.clone(),
                matched: record.matched_text.clone(),
                next_word: view.next_word().to_owned(),
                after: record.after_context.clone(),
                full_context: record.full_context.clone(),
            }
        })
        .collect()
}

/// Serialize rows to CSV bytes, header first
///
/// Quoting follows the column rather than the content: every text field is
/// quoted with embedded quotes doubled, the page number and the header row
/// are written bare. Fields are pre-quoted, so the writer never adds quotes.
pub fn serialize(rows: &[ExportRow], columns: ExportColumns) -> ExportResult<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Never)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(columns.headers())?;
    for row in rows {
        writer.write_record(row.record(columns))?;
    }

    writer.flush()?;
    writer.into_inner().map_err(|err| {
        let source = err.error();
        ExportError::Io(std::io::Error::new(source.kind(), source.to_string()))
    })
}

/// Apply `options` and serialize
pub fn export(views: &[MatchView<'_>], options: &ExportOptions) -> ExportResult<Vec<u8>> {
    let selected: Vec<MatchView<'_>> = views
        .iter()
        .copied()
        .filter(|view| !options.only_highlighted || view.is_highlighted())
        .collect();

    if selected.is_empty() {
        return Err(ExportError::NoResults);
    }

    let bytes = serialize(&to_table(&selected), options.columns)?;
    log::info!("exported {} rows ({} bytes)", selected.len(), bytes.len());
    Ok(bytes)
}

/// `"{stem}_search_results.csv"` for a single document, `default` otherwise
pub fn export_file_name(documents: &[Document], default: &str) -> String {
    match documents {
        [document] => {
            let stem = Path::new(document.file_name())
                .file_stem()
                .and_then(|stem| stem.to_str())
                .filter(|stem| !stem.is_empty())
                .unwrap_or("pdf");
            format!("{stem}_search_results.csv")
        }
        _ => default.to_owned(),
    }
}
