//! In-memory PDF builder for tests.
//!
//! Enabled for this crate's own tests and, through the `test-fixtures`
//! feature, for dev-dependencies of the other workspace crates.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};

const ENCODING: &str = "WinAnsiEncoding";

const FONT_SIZE: i64 = 12;
const LINE_HEIGHT: i64 = 16;
const LEFT_MARGIN: i64 = 72;
const TOP_BASELINE: i64 = 770;

/// One page of a fixture document.
#[derive(Debug, Clone, Default)]
pub struct FixturePage {
    /// Each inner vector is one line; each string on a line is its own run.
    pub lines: Vec<Vec<String>>,
}

impl FixturePage {
    /// A page with one run per line.
    pub fn lines(lines: &[&str]) -> Self {
        Self { lines: lines.iter().map(|line| vec![(*line).to_owned()]).collect() }
    }

    /// A single line split into several runs, as a renderer might emit it.
    pub fn runs(runs: &[&str]) -> Self {
        Self { lines: vec![runs.iter().map(|run| (*run).to_owned()).collect()] }
    }

    /// A page with no text at all.
    pub fn blank() -> Self {
        Self::default()
    }
}

/// Build a PDF with the given pages, using the base-14 Courier font.
///
/// Text is written in WinAnsi; characters outside it are dropped.
pub fn text_pdf(pages: &[FixturePage]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => ENCODING,
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for page in pages {
        let mut operations = Vec::new();

        for (line_index, runs) in page.lines.iter().enumerate() {
            let baseline = TOP_BASELINE - LINE_HEIGHT * line_index as i64;
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), FONT_SIZE.into()]));
            operations.push(Operation::new("Td", vec![LEFT_MARGIN.into(), baseline.into()]));
            for run in runs {
                let encoded = Document::encode_text(Some(ENCODING), run);
                let text = Object::String(encoded, StringFormat::Literal);
                operations.push(Operation::new("Tj", vec![text]));
            }
            operations.push(Operation::new("ET", vec![]));
        }

        let content = Content { operations };
        let encoded = content.encode().expect("fixture content should encode");
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("fixture document should serialize");
    bytes
}
