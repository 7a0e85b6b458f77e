use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use doc_model::{palette_color, AnnotationId, AnnotationPatch, Color, DocPoint, Theme, PALETTE};
use editor_core::{
    Command, EditorSession, ExportOptions, ExportOutcome, ExportProgress, ExportReport,
    LoadedDocument,
};
use pdf_engine::{default_engine, OpenSource, PdfEngine, ThumbnailSize};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use storage::{FileStore, SessionStore};

#[derive(Debug, Parser)]
#[command(name = "pdf-annotate")]
#[command(about = "Place text annotations on PDFs and export them")]
pub struct Cli {
    /// Directory holding sessions, preferences and the recent list.
    #[arg(long, global = true, env = "PDF_ANNOTATE_DATA_DIR", value_name = "DIR")]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable PDF metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Add a text annotation and print its id.
    Add {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, allow_negative_numbers = true)]
        x: f32,
        #[arg(long, allow_negative_numbers = true)]
        y: f32,
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        font_size: Option<f32>,
        #[arg(long)]
        color: Option<String>,
    },
    /// Change fields of an existing annotation.
    Edit {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(value_name = "ID")]
        id: AnnotationId,
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        font_size: Option<f32>,
        #[arg(long, allow_negative_numbers = true)]
        x: Option<f32>,
        #[arg(long, allow_negative_numbers = true)]
        y: Option<f32>,
    },
    /// Remove an annotation.
    Remove {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(value_name = "ID")]
        id: AnnotationId,
    },
    /// Print annotations as JSON.
    List {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        page: Option<u32>,
    },
    /// Run editor commands in order, e.g. `zoom-in next-page undo save`.
    Run {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(value_name = "COMMAND", required = true)]
        commands: Vec<Command>,
    },
    /// Write a copy of the PDF with annotations burned in.
    Export {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
        /// Export even when the document has no annotations.
        #[arg(long)]
        allow_empty: bool,
    },
    /// Print recently edited documents as JSON.
    Recent,
    /// Show the display theme, or store a new one.
    Theme {
        #[arg(value_enum)]
        theme: Option<ThemeArg>,
    },
    /// Render a thumbnail PNG for a page.
    RenderThumb {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 320)]
        width: u32,
        #[arg(long, default_value_t = 320)]
        height: u32,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    first_page_size_pt: Option<PageSizeOutput>,
    annotation_count: usize,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f32,
    height: f32,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ThemeArg {
    Light,
    Dark,
    System,
}

impl From<ThemeArg> for Theme {
    fn from(value: ThemeArg) -> Self {
        match value {
            ThemeArg::Light => Theme::Light,
            ThemeArg::Dark => Theme::Dark,
            ThemeArg::System => Theme::System,
        }
    }
}

type CliSession = EditorSession<FileStore>;

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    let data_dir = cli.data_dir.as_deref();

    match cli.command {
        Commands::Info { file } => run_info(&file, data_dir),
        Commands::Add { file, page, x, y, text, font_size, color } => {
            let mut session = open_session(&file, data_dir)?;
            run_add(&mut session, page, DocPoint::new(x, y), text, font_size, color)
        }
        Commands::Edit { file, id, text, color, font_size, x, y } => {
            let patch = AnnotationPatch { x, y, text, page: None, font_size, color };
            run_edit(&mut open_session(&file, data_dir)?, id, patch)
        }
        Commands::Remove { file, id } => run_remove(&mut open_session(&file, data_dir)?, id),
        Commands::List { file, page } => run_list(&open_session(&file, data_dir)?, page),
        Commands::Run { file, commands } => {
            run_commands(&mut open_session(&file, data_dir)?, &file, &commands)
        }
        Commands::Export { file, output, allow_empty } => {
            run_export(&open_session(&file, data_dir)?, &file, output.as_deref(), allow_empty)
        }
        Commands::Recent => run_recent(data_dir),
        Commands::Theme { theme } => run_theme(data_dir, theme.map(Theme::from)),
        Commands::RenderThumb { file, page, width, height, output } => {
            run_render_thumb(&file, page, width, height, output.as_deref())
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn file_store(data_dir: Option<&Path>) -> Result<FileStore> {
    match data_dir {
        Some(dir) => Ok(FileStore::with_root(dir)),
        None => FileStore::from_default_project().context("failed to locate data directory"),
    }
}

fn document_name(file: &Path) -> String {
    file.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default()
}

fn open_session(file: &Path, data_dir: Option<&Path>) -> Result<CliSession> {
    ensure_pdf_exists(file)?;

    let bytes = fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let document = LoadedDocument::from_bytes(document_name(file), bytes)?;
    let persistence = SessionStore::new(file_store(data_dir)?);

    let session = EditorSession::open(document, &mut default_engine(), persistence)
        .context("failed to open PDF")?;
    if let Some(notice) = session.restore_notice() {
        log::info!("{notice}");
    }

    Ok(session)
}

fn run_info(file: &Path, data_dir: Option<&Path>) -> Result<()> {
    ensure_pdf_exists(file)?;

    let mut engine = default_engine();
    let handle = engine.open(OpenSource::from(file)).context("failed to open PDF")?;

    let page_count = engine.page_count(handle)?;
    let first_page_size_pt = if page_count > 0 {
        let size = engine.page_size(handle, 0)?;
        Some(PageSizeOutput { width: size.width_pt, height: size.height_pt })
    } else {
        None
    };

    let sessions = SessionStore::new(file_store(data_dir)?);
    let annotation_count =
        sessions.load(&document_name(file)).map_or(0, |snapshot| snapshot.annotations.len());

    let payload = InfoOutput {
        path: file.display().to_string(),
        page_count,
        first_page_size_pt,
        annotation_count,
    };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    engine.close(handle)?;

    Ok(())
}

fn run_add(
    session: &mut CliSession,
    page: u32,
    position: DocPoint,
    text: Option<String>,
    font_size: Option<f32>,
    color: Option<String>,
) -> Result<()> {
    if page == 0 || page > session.page_count() {
        anyhow::bail!("--page must be between 1 and {}", session.page_count());
    }

    let mut draft = session.preferences().draft(page, position);
    if let Some(text) = text {
        draft = draft.with_text(text);
    }
    if let Some(font_size) = font_size {
        draft = draft.with_font_size(validate_font_size(font_size)?);
    }
    if let Some(color) = color {
        draft = draft.with_color(validate_color(&color)?);
    }

    let annotation = session.create_annotation(draft);
    println!("{}", annotation.id);
    Ok(())
}

fn run_edit(session: &mut CliSession, id: AnnotationId, mut patch: AnnotationPatch) -> Result<()> {
    if patch.is_empty() {
        anyhow::bail!("nothing to change; pass --text, --color, --font-size, --x or --y");
    }
    if let Some(color) = patch.color.take() {
        patch.color = Some(validate_color(&color)?);
    }
    if let Some(font_size) = patch.font_size {
        validate_font_size(font_size)?;
    }

    if session.update_annotation(id, patch) {
        println!("updated {id}");
    } else {
        println!("no annotation with id {id}");
    }
    Ok(())
}

fn run_remove(session: &mut CliSession, id: AnnotationId) -> Result<()> {
    match session.delete_annotation(id) {
        Some(_) => println!("Annotation deleted"),
        None => println!("no annotation with id {id}"),
    }
    Ok(())
}

fn run_list(session: &CliSession, page: Option<u32>) -> Result<()> {
    let annotations: Vec<_> = match page {
        Some(page) => session.annotations_on_page(page),
        None => session.annotations().iter().collect(),
    };

    println!("{}", serde_json::to_string_pretty(&annotations)?);
    Ok(())
}

fn run_commands(session: &mut CliSession, file: &Path, commands: &[Command]) -> Result<()> {
    for command in commands {
        let outcome = session.dispatch(*command);
        for notice in &outcome.notices {
            println!("{command}: {notice}");
        }
        if let Some(report) = outcome.export {
            let path = file.with_file_name(&report.filename);
            write_report(&report, &path)?;
        }
    }

    println!("{}", serde_json::to_string_pretty(&session.view())?);
    Ok(())
}

fn run_export(
    session: &CliSession,
    file: &Path,
    output: Option<&Path>,
    allow_empty: bool,
) -> Result<()> {
    let progress = |event: ExportProgress| match event {
        ExportProgress::Drawing { completed, total, percent } => {
            log::info!("Processing annotation {completed} of {total} ({percent}% complete)");
        }
        ExportProgress::Finalizing => log::info!("Finalizing PDF"),
        ExportProgress::Complete => {}
    };

    let outcome = session
        .export(ExportOptions { allow_unannotated: allow_empty }, progress)
        .context("failed to save PDF")?;

    let report = match outcome {
        ExportOutcome::Exported(report) => report,
        ExportOutcome::NeedsConfirmation => {
            anyhow::bail!("no annotations found; pass --allow-empty to export the original PDF")
        }
    };

    let path =
        output.map(ToOwned::to_owned).unwrap_or_else(|| file.with_file_name(&report.filename));
    write_report(&report, &path)?;

    println!("{} annotations added", report.drawn);
    for skipped in &report.skipped {
        println!("skipped {} (page {}): {}", skipped.id, skipped.page, skipped.reason);
    }
    Ok(())
}

fn write_report(report: &ExportReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, &report.bytes)
        .with_context(|| format!("failed to write PDF to {}", path.display()))?;

    println!("{}", path.display());
    Ok(())
}

fn run_recent(data_dir: Option<&Path>) -> Result<()> {
    let sessions = SessionStore::new(file_store(data_dir)?);
    let recent = sessions.recent_documents();

    println!("{}", serde_json::to_string_pretty(recent.entries())?);
    Ok(())
}

fn run_theme(data_dir: Option<&Path>, theme: Option<Theme>) -> Result<()> {
    let mut sessions = SessionStore::new(file_store(data_dir)?);
    if let Some(theme) = theme {
        sessions.set_theme(theme).context("failed to save theme")?;
    }

    println!("{}", sessions.theme().name());
    Ok(())
}

fn run_render_thumb(
    file: &Path,
    page: u32,
    width: u32,
    height: u32,
    output: Option<&Path>,
) -> Result<()> {
    ensure_pdf_exists(file)?;

    if page == 0 {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }

    let mut engine = default_engine();
    let handle = engine.open(OpenSource::from(file)).context("failed to open PDF")?;

    let page_index = page - 1;
    let image = engine
        .render_thumbnail(handle, page_index, ThumbnailSize { width_px: width, height_px: height })
        .context("failed to render thumbnail")?;

    let output =
        output.map(ToOwned::to_owned).unwrap_or_else(|| default_thumbnail_output(file, page));

    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    image
        .save(&output)
        .with_context(|| format!("failed to write image to {}", output.display()))?;

    println!("{}", output.display());

    engine.close(handle)?;

    Ok(())
}

/// Accepts `#RRGGBB` or a palette name such as `teal`.
fn validate_color(value: &str) -> Result<String> {
    if Color::parse_hex(value).is_some() {
        return Ok(value.to_owned());
    }
    if let Some(hex) = palette_color(value) {
        return Ok(hex.to_owned());
    }

    let names: Vec<String> = PALETTE.iter().map(|(name, _)| name.to_lowercase()).collect();
    anyhow::bail!("invalid color {value:?}; expected #RRGGBB or one of {}", names.join(", "))
}

fn validate_font_size(value: f32) -> Result<f32> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        anyhow::bail!("--font-size must be a positive number")
    }
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

fn default_thumbnail_output(file: &Path, page: u32) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("thumbnail");

    file.with_file_name(format!("{stem}-page-{page}.png"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_command_sequences() {
        let cli = Cli::try_parse_from(["pdf-annotate", "run", "a.pdf", "zoom-in", "next-page"])
            .expect("arguments should parse");

        match cli.command {
            Commands::Run { commands, .. } => {
                assert_eq!(commands, vec![Command::ZoomIn, Command::NextPage]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_command_names() {
        assert!(Cli::try_parse_from(["pdf-annotate", "run", "a.pdf", "explode"]).is_err());
    }

    #[test]
    fn color_validation_requires_hex_marker() {
        assert_eq!(validate_color("#10b981").expect("valid"), "#10b981");
        assert!(validate_color("10b981").is_err());
        assert!(validate_color("#12345").is_err());
    }

    #[test]
    fn palette_names_are_accepted_as_colors() {
        assert_eq!(validate_color("Emerald").expect("palette name"), "#10b981");
        let err = validate_color("purple").expect_err("not in the palette");
        assert!(err.to_string().contains("ruby, emerald"));
    }

    #[test]
    fn thumbnail_defaults_next_to_source() {
        assert_eq!(
            default_thumbnail_output(Path::new("/tmp/report.pdf"), 2),
            PathBuf::from("/tmp/report-page-2.png")
        );
    }
}
