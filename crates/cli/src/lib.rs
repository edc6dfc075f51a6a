use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pdflyzer_core::{
    group_by_term, ExportColumns, ExportOptions, HighlightLayer, HighlightOverlay, MatchId,
    MatchRecord, MatchView, Notice, NoticeKind, Notifier, SearchError, Session, Settings,
    SourceFile, TextExtractor,
};
use pdflyzer_storage::{load_settings_file, Storage};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Debug, Parser)]
#[command(name = "pdflyzer")]
#[command(about = "Search PDFs for terms and export the matches")]
pub struct Cli {
    /// Settings file to use instead of the one in the data directory.
    #[arg(long, global = true, value_name = "PATH")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the extracted text of every page as JSON.
    Extract {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Search one or more PDFs for terms.
    Search {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
        #[arg(long = "term", short = 't', value_name = "TERM", required = true)]
        terms: Vec<String>,
        /// Write the results as CSV to this file or directory.
        #[arg(long, value_name = "PATH")]
        export: Option<PathBuf>,
        /// Print matches as JSON instead of text.
        #[arg(long)]
        json: bool,
        /// Leave matches with their highlight switched off out of the export.
        #[arg(long)]
        only_highlighted: bool,
        #[command(flatten)]
        annotations: AnnotationArgs,
    },
    /// Print the highlight overlays of one page as JSON.
    Highlights {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// 1-based page number.
        #[arg(long)]
        page: usize,
        #[arg(long = "term", short = 't', value_name = "TERM", required = true)]
        terms: Vec<String>,
        /// Pixels per PDF point.
        #[arg(long, default_value_t = 1.0)]
        scale: f32,
        #[command(flatten)]
        annotations: AnnotationArgs,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Args)]
struct AnnotationArgs {
    /// Switch the highlight of a match off (or back on).
    #[arg(long = "toggle", value_name = "ID")]
    toggles: Vec<String>,
    /// Replace the next word recorded for a match.
    #[arg(long = "next-word", value_name = "ID=WORD", value_parser = parse_next_word)]
    next_words: Vec<(String, String)>,
}

#[derive(Debug, Serialize)]
struct ExtractOutput<'a> {
    file_name: &'a str,
    page_count: usize,
    pages: &'a [String],
}

#[derive(Debug, Serialize)]
struct MatchOutput<'a> {
    #[serde(flatten)]
    record: &'a MatchRecord,
    is_highlighted: bool,
    next_word: &'a str,
}

impl<'a> From<&MatchView<'a>> for MatchOutput<'a> {
    fn from(view: &MatchView<'a>) -> Self {
        Self { record: view.record, is_highlighted: view.is_highlighted(), next_word: view.next_word() }
    }
}

#[derive(Debug, Serialize)]
struct HighlightsOutput<'a> {
    file_name: &'a str,
    page_number: usize,
    scale: f32,
    page_width_px: f32,
    page_height_px: f32,
    overlays: &'a [HighlightOverlay],
}

/// Prints notices to stderr
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&mut self, notice: Notice) {
        let label = match notice.kind {
            NoticeKind::Success => "ok",
            NoticeKind::Validation => "note",
            NoticeKind::Error => "error",
        };
        eprintln!("{label}: {notice}");
    }
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::Extract { file } => run_extract(&file),
        Commands::Search { files, terms, export, json, only_highlighted, annotations } => {
            let settings = load_settings(cli.settings.as_deref())?;
            let options = ExportOptions {
                columns: if files.len() == 1 {
                    ExportColumns::SingleFile
                } else {
                    ExportColumns::MultiFile
                },
                only_highlighted,
            };
            run_search(settings, &files, &terms, &annotations, export.as_deref(), json, &options)
        }
        Commands::Highlights { file, page, terms, scale, annotations } => {
            let settings = load_settings(cli.settings.as_deref())?;
            run_highlights(settings, &file, page, &terms, scale, &annotations)
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn run_extract(file: &Path) -> Result<()> {
    let source = read_source(file)?;

    let mut extractor = TextExtractor::new();
    let pages = extractor.extract(&source.bytes).context("failed to extract text")?;

    let payload = ExtractOutput { file_name: &source.name, page_count: pages.len(), pages: &pages };
    println!("{}", serde_json::to_string_pretty(&payload)?);

    Ok(())
}

fn run_search(
    settings: Settings,
    files: &[PathBuf],
    terms: &[String],
    annotations: &AnnotationArgs,
    export: Option<&Path>,
    json: bool,
    options: &ExportOptions,
) -> Result<()> {
    let sources = files.iter().map(|file| read_source(file)).collect::<Result<Vec<_>>>()?;
    let mut session = load_session(settings, sources)?;
    let now = Instant::now();

    match session.search(terms, now) {
        Ok(_) | Err(SearchError::NoMatches) => {}
        Err(err) => return Err(err.into()),
    }
    apply_annotations(&mut session, annotations, now);

    let views = session.store().views();
    if json {
        let matches: Vec<MatchOutput<'_>> = views.iter().map(MatchOutput::from).collect();
        println!("{}", serde_json::to_string_pretty(&matches)?);
    } else {
        print_groups(&views);
    }

    if let Some(path) = export {
        let exported = session.export(options).context("failed to export results")?;
        let target = if path.is_dir() { path.join(&exported.file_name) } else { path.to_path_buf() };

        fs::write(&target, &exported.bytes)
            .with_context(|| format!("failed to write CSV to {}", target.display()))?;
        log::info!("wrote {}", target.display());
    }

    Ok(())
}

fn run_highlights(
    settings: Settings,
    file: &Path,
    page: usize,
    terms: &[String],
    scale: f32,
    annotations: &AnnotationArgs,
) -> Result<()> {
    if page == 0 {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }

    let source = read_source(file)?;
    let mut extractor = TextExtractor::new();
    let layer = extractor.text_layer(&source.bytes, 0, page).context("failed to lay out page")?;

    let mut session = load_session(settings, vec![source.clone()])?;
    let now = Instant::now();
    match session.search(terms, now) {
        Ok(_) | Err(SearchError::NoMatches) => {}
        Err(err) => return Err(err.into()),
    }
    apply_annotations(&mut session, annotations, now);

    let mut highlights = HighlightLayer::new();
    let views = session.store().active_for_page(0, page);
    highlights.apply(&layer, &views, scale);

    let payload = HighlightsOutput {
        file_name: &source.name,
        page_number: page,
        scale,
        page_width_px: layer.page_width * scale,
        page_height_px: layer.page_height * scale,
        overlays: highlights.overlays(),
    };
    println!("{}", serde_json::to_string_pretty(&payload)?);

    Ok(())
}

fn load_session(settings: Settings, sources: Vec<SourceFile>) -> Result<Session<StderrNotifier>> {
    let mut session = Session::with_notifier(settings, StderrNotifier);

    if session.upload(sources, Instant::now()) == 0 {
        anyhow::bail!("none of the given files could be read as a PDF with text");
    }

    Ok(session)
}

fn apply_annotations(
    session: &mut Session<StderrNotifier>,
    annotations: &AnnotationArgs,
    now: Instant,
) {
    for id in &annotations.toggles {
        if !session.toggle_highlight(&MatchId::from(id.as_str()), now) {
            log::warn!("unknown match id {id}");
        }
    }

    for (id, word) in &annotations.next_words {
        if !session.set_next_word(&MatchId::from(id.as_str()), word.as_str(), now) {
            log::warn!("unknown match id {id}");
        }
    }
}

fn print_groups(views: &[MatchView<'_>]) {
    for group in group_by_term(views) {
        println!("{} ({})", group.term, group.matches.len());

        for view in &group.matches {
            let record = view.record;
            let marker = if view.is_highlighted() { '*' } else { ' ' };
            println!(
                "{marker} [{}] {} p.{}: {} [{}] {}  -> {}",
                record.id,
                record.file_name,
                record.page_number,
                record.before_context,
                record.matched_text,
                record.after_context,
                view.next_word()
            );
        }
    }
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    if let Some(path) = path {
        return load_settings_file(path)
            .with_context(|| format!("failed to load settings from {}", path.display()));
    }

    match Storage::from_default_project().and_then(|storage| storage.load_settings()) {
        Ok(settings) => Ok(settings),
        Err(err) => {
            log::warn!("using default settings: {err}");
            Ok(Settings::default())
        }
    }
}

fn read_source(path: &Path) -> Result<SourceFile> {
    ensure_pdf_exists(path)?;
    SourceFile::from_path(path).with_context(|| format!("failed to read {}", path.display()))
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn parse_next_word(value: &str) -> std::result::Result<(String, String), String> {
    let (id, word) =
        value.split_once('=').ok_or_else(|| format!("expected ID=WORD, got `{value}`"))?;

    if id.is_empty() {
        return Err(format!("missing match id in `{value}`"));
    }

    Ok((id.to_owned(), word.to_owned()))
}
