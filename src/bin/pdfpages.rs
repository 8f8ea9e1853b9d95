//! CLI binary for pdfpages.
//!
//! A thin shim over the library crate that maps subcommands and flags onto
//! the converter, reorderer, combiner and session objects.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use pdfpages::{
    convert_stream, render_gallery, Combiner, ConversionConfig, ConversionProgressCallback,
    Converter, PageReorderer, PdfiumEngine, ProgressCallback, Quality,
    RasterEngine, Section, Session, Shortcut, ShortcutOutcome, Theme, ThemeStore, UploadedFile,
    GALLERY_FILENAME,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
/// Highlight colour for the active theme: blue on light, cyan on dark.
fn accent(theme: Theme, s: &str) -> String {
    match theme {
        Theme::Light => format!("\x1b[34m{s}\x1b[0m"),
        Theme::Dark => format!("\x1b[96m{s}\x1b[0m"),
    }
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Renders the converter's percentage on a progress bar and logs each page
/// as it lands.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Loading");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

const TICKS: [&str; 11] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        // Switch from spinner to a percentage bar once pages are known.
        let bar_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&TICKS);
        self.bar.set_length(100);
        self.bar.set_style(bar_style);
        self.bar.set_prefix(format!("{} pages", total_pages));
    }

    fn on_progress(&self, percent: f32, message: &str) {
        self.bar.set_position(percent.round() as u64);
        self.bar.set_message(message.to_string());
    }

    fn on_page_complete(&self, page_num: usize, total: usize, byte_size: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{:>8} bytes", byte_size)),
        ));
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg)
        ));
    }

    fn on_conversion_complete(&self, total_pages: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if failed > 0 {
            eprintln!("{} {} of {} pages failed", red("✗"), failed, total_pages);
        } else {
            eprintln!(
                "{} {} pages converted",
                green("✔"),
                bold(&total_pages.to_string())
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Every page as a 150 DPI PNG into ./pages
  pdfpages convert report.pdf -o pages

  # Print quality, with an HTML thumbnail gallery
  pdfpages convert --quality print --gallery scan.pdf -o out

  # Move page 4 to the front of a four-page document
  pdfpages reorder slides.pdf --order 4,1,2,3

  # Merge PDFs and photos in the given order
  pdfpages combine cover.jpg body.pdf appendix.pdf -o merged

  # Page count only
  pdfpages inspect report.pdf

  # Keyboard-driven session (Escape, Ctrl+O, Ctrl+Shift+T)
  pdfpages interactive

QUALITY:
  screen    72 DPI   thumbnails, quick previews
  standard  150 DPI  on-screen reading (default)
  high      300 DPI  printing, OCR
  print     600 DPI  archival scans

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         Path to libpdfium (otherwise: next to the binary,
                          the current directory, then the system library)
  PDFPAGES_CONFIG_DIR     Directory holding preferences.json (theme)
  RUST_LOG                Log filter, e.g. pdfpages=debug
"#;

/// Convert PDF pages to PNG images, reorder pages, and combine PDFs and images.
#[derive(Parser, Debug)]
#[command(
    name = "pdfpages",
    version,
    about = "Convert PDF pages to PNG images, reorder pages, combine PDFs and images",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDFPAGES_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDFPAGES_QUIET")]
    quiet: bool,

    /// Disable the progress bar.
    #[arg(long, global = true, env = "PDFPAGES_NO_PROGRESS")]
    no_progress: bool,

    /// Largest accepted input file, in MB.
    #[arg(long, global = true, env = "PDFPAGES_MAX_FILE_MB", default_value_t = 50)]
    max_file_mb: u64,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render every page of a PDF to page-NN.png.
    Convert {
        /// PDF file to convert.
        input: PathBuf,

        /// Directory for the page images.
        #[arg(short, long, env = "PDFPAGES_OUTPUT", default_value = ".")]
        output: PathBuf,

        /// Render quality.
        #[arg(long, env = "PDFPAGES_QUALITY", value_enum, default_value = "standard")]
        quality: QualityArg,

        /// Pages rendered concurrently per batch.
        #[arg(long, env = "PDFPAGES_BATCH_SIZE", default_value_t = 3)]
        batch_size: usize,

        /// PDF user password for encrypted documents.
        #[arg(long, env = "PDFPAGES_PASSWORD")]
        password: Option<String>,

        /// Seconds to wait for the document to load.
        #[arg(long, env = "PDFPAGES_LOAD_TIMEOUT", default_value_t = 30)]
        load_timeout: u64,

        /// Milliseconds to pause between written files.
        #[arg(long, env = "PDFPAGES_SAVE_DELAY_MS", default_value_t = 100)]
        save_delay_ms: u64,

        /// Also write gallery.html with inline thumbnails.
        #[arg(long)]
        gallery: bool,

        /// Write pages as they finish instead of all at the end.
        #[arg(long, conflicts_with = "gallery")]
        stream: bool,

        /// Print a JSON summary instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Print the page count of a PDF.
    #[command(alias = "info")]
    Inspect {
        input: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// Write rearranged-pdf.pdf with pages in a new order.
    Reorder {
        input: PathBuf,

        /// New order as 1-based page numbers, e.g. 3,1,2.
        #[arg(long, value_delimiter = ',', conflicts_with = "moves")]
        order: Vec<usize>,

        /// Move a page: FROM:TO, 1-based positions. Repeatable.
        #[arg(long = "move", value_name = "FROM:TO")]
        moves: Vec<String>,

        #[arg(short, long, env = "PDFPAGES_OUTPUT", default_value = ".")]
        output: PathBuf,
    },

    /// Write combined-pdf.pdf from PDFs and images, in argument order.
    Combine {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[arg(short, long, env = "PDFPAGES_OUTPUT", default_value = ".")]
        output: PathBuf,
    },

    /// Show or change the stored colour theme.
    Theme {
        #[arg(value_enum, default_value = "show")]
        action: ThemeAction,
    },

    /// Line-driven session: type a PDF path or a shortcut like ctrl+shift+t.
    Interactive {
        #[arg(short, long, env = "PDFPAGES_OUTPUT", default_value = ".")]
        output: PathBuf,

        #[arg(long, env = "PDFPAGES_QUALITY", value_enum, default_value = "standard")]
        quality: QualityArg,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum QualityArg {
    Screen,
    Standard,
    High,
    Print,
}

impl From<QualityArg> for Quality {
    fn from(v: QualityArg) -> Self {
        match v {
            QualityArg::Screen => Quality::Screen,
            QualityArg::Standard => Quality::Standard,
            QualityArg::High => Quality::High,
            QualityArg::Print => Quality::Print,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ThemeAction {
    Show,
    Toggle,
    Light,
    Dark,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless --verbose asks for them.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let theme_store = ThemeStore::default_location();
    let theme = theme_store.as_ref().map(ThemeStore::load).unwrap_or_default();
    let max_file_size = cli.max_file_mb.saturating_mul(1024 * 1024);

    match cli.command {
        Commands::Convert {
            ref input,
            ref output,
            quality,
            batch_size,
            ref password,
            load_timeout,
            save_delay_ms,
            gallery,
            stream,
            json,
        } => {
            let mut builder = ConversionConfig::builder()
                .quality(quality.into())
                .batch_size(batch_size)
                .max_file_size(max_file_size)
                .load_timeout_secs(load_timeout)
                .save_delay_ms(save_delay_ms);
            if let Some(pwd) = password {
                builder = builder.password(pwd.clone());
            }
            if show_progress && !json {
                builder = builder.progress_callback(CliProgressCallback::new() as ProgressCallback);
            }
            let config = builder.build().context("Invalid configuration")?;
            let file = upload(input)?;

            if stream {
                cmd_convert_stream(&file, output, config, cli.quiet).await
            } else {
                cmd_convert(&file, output, config, gallery, json, cli.quiet, theme).await
            }
        }
        Commands::Inspect { ref input, json } => {
            let config = ConversionConfig::builder()
                .max_file_size(max_file_size)
                .build()
                .context("Invalid configuration")?;
            let converter = Converter::new(engine()?, config);
            let info = converter
                .inspect(&upload(input)?)
                .await
                .context("Failed to inspect PDF")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("File:   {}", info.name);
                println!("Pages:  {}", info.page_count);
                println!("Size:   {} bytes", info.file_size);
            }
            Ok(())
        }
        Commands::Reorder {
            ref input,
            ref order,
            ref moves,
            ref output,
        } => cmd_reorder(input, order, moves, output, max_file_size, cli.quiet, theme).await,
        Commands::Combine {
            ref inputs,
            ref output,
        } => cmd_combine(inputs, output, max_file_size, cli.quiet, theme).await,
        Commands::Theme { action } => cmd_theme(action, theme_store),
        Commands::Interactive {
            ref output,
            quality,
        } => {
            let config = ConversionConfig::builder()
                .quality(quality.into())
                .max_file_size(max_file_size)
                .build()
                .context("Invalid configuration")?;
            let converter = Converter::new(engine()?, config);
            cmd_interactive(Session::new(converter, theme_store), output).await
        }
    }
}

fn engine() -> Result<Arc<dyn RasterEngine>> {
    let engine = PdfiumEngine::new().context("PDF engine unavailable")?;
    Ok(Arc::new(engine))
}

fn upload(path: &Path) -> Result<UploadedFile> {
    UploadedFile::from_path(path).with_context(|| format!("Cannot open {}", path.display()))
}

async fn cmd_convert(
    file: &UploadedFile,
    output: &Path,
    config: ConversionConfig,
    gallery: bool,
    json: bool,
    quiet: bool,
    theme: Theme,
) -> Result<()> {
    let converter = Converter::new(engine()?, config);
    let result = converter
        .convert_file(file)
        .await
        .context("Conversion failed")?;

    let written = converter
        .save_all(output)
        .await
        .context("Failed to write page images")?;

    if gallery {
        let html = render_gallery(&file.name, &result.pages, converter.previews(), theme);
        let path = output.join(GALLERY_FILENAME);
        tokio::fs::write(&path, html)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if !quiet && !json {
            eprintln!("   gallery → {}", accent(theme, &path.display().to_string()));
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if !quiet {
        eprintln!(
            "{}  {} pages at {}  {}ms  →  {}",
            green("✔"),
            result.stats.total_pages,
            Quality::from_dpi(result.stats.dpi).unwrap_or_default(),
            result.stats.total_duration_ms,
            bold(&output.display().to_string()),
        );
        eprintln!(
            "   {} files, {}",
            written.len(),
            dim(&format!("{} bytes", result.stats.total_bytes))
        );
    }

    converter.reset();
    Ok(())
}

async fn cmd_convert_stream(
    file: &UploadedFile,
    output: &Path,
    config: ConversionConfig,
    quiet: bool,
) -> Result<()> {
    tokio::fs::create_dir_all(output)
        .await
        .with_context(|| format!("Failed to create {}", output.display()))?;

    let mut pages = convert_stream(engine()?, file, &config)
        .await
        .context("Conversion failed")?;
    let mut count = 0usize;
    while let Some(page) = pages.next().await {
        let page = page.context("Conversion failed")?;
        let path = output.join(&page.filename);
        tokio::fs::write(&path, &page.png)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        count += 1;
        if !quiet {
            eprintln!(
                "  {} {}/{}  {}",
                green("✓"),
                page.page_number,
                page.total_pages,
                dim(&path.display().to_string())
            );
        }
    }
    if !quiet {
        eprintln!("{} {} pages written", green("✔"), bold(&count.to_string()));
    }
    Ok(())
}

async fn cmd_reorder(
    input: &Path,
    order: &[usize],
    moves: &[String],
    output: &Path,
    max_file_size: u64,
    quiet: bool,
    theme: Theme,
) -> Result<()> {
    let reorderer = PageReorderer::with_max_file_size(max_file_size);
    let info = reorderer
        .load(&upload(input)?)
        .await
        .context("Failed to load PDF")?;

    if !order.is_empty() {
        let target = parse_order(order, info.page_count)?;
        for (position, &page) in target.iter().enumerate() {
            let current = reorderer
                .order()
                .iter()
                .position(|&p| p == page)
                .context("page vanished from order")?;
            reorderer.move_page(current, position);
        }
    }
    for arg in moves {
        let (from, to) = parse_move(arg)?;
        if !reorderer.move_page(from, to) {
            bail!(
                "Move '{}' is out of range (document has {} pages)",
                arg,
                info.page_count
            );
        }
    }

    let pdf = reorderer.export().await.context("Export failed")?;
    let path = pdf.save(output).await.context("Failed to save PDF")?;
    if !quiet {
        let order: Vec<String> = reorderer.order().iter().map(|p| (p + 1).to_string()).collect();
        eprintln!(
            "{}  {} pages [{}]  →  {}",
            green("✔"),
            pdf.page_count,
            order.join(","),
            accent(theme, &path.display().to_string())
        );
    }
    Ok(())
}

/// Validate a 1-based permutation and convert it to 0-based indices.
fn parse_order(order: &[usize], page_count: usize) -> Result<Vec<usize>> {
    if order.len() != page_count {
        bail!(
            "--order lists {} pages but the document has {}",
            order.len(),
            page_count
        );
    }
    let mut seen = vec![false; page_count];
    let mut target = Vec::with_capacity(page_count);
    for &page in order {
        if page == 0 || page > page_count {
            bail!("Page {} is out of range (1-{})", page, page_count);
        }
        if std::mem::replace(&mut seen[page - 1], true) {
            bail!("Page {} is listed twice", page);
        }
        target.push(page - 1);
    }
    Ok(target)
}

/// `"3:1"` → `(2, 0)`.
fn parse_move(arg: &str) -> Result<(usize, usize)> {
    let (from, to) = arg
        .split_once(':')
        .with_context(|| format!("Invalid move '{}': expected FROM:TO", arg))?;
    let from: usize = from.trim().parse().context("Invalid FROM position")?;
    let to: usize = to.trim().parse().context("Invalid TO position")?;
    if from == 0 || to == 0 {
        bail!("Positions are 1-indexed (got '{}')", arg);
    }
    Ok((from - 1, to - 1))
}

async fn cmd_combine(
    inputs: &[PathBuf],
    output: &Path,
    max_file_size: u64,
    quiet: bool,
    theme: Theme,
) -> Result<()> {
    let combiner = Combiner::with_max_file_size(max_file_size);
    for path in inputs {
        combiner
            .add_file(upload(path)?)
            .with_context(|| format!("Cannot add {}", path.display()))?;
    }

    let report = combiner.export().await.context("Export failed")?;
    for name in &report.skipped {
        eprintln!("  {} skipped {} (only PNG and JPEG images can be embedded)", red("!"), name);
    }
    let path = report.pdf.save(output).await.context("Failed to save PDF")?;
    if !quiet {
        eprintln!(
            "{}  {} files, {} pages  →  {}",
            green("✔"),
            inputs.len() - report.skipped.len(),
            report.pdf.page_count,
            accent(theme, &path.display().to_string())
        );
    }
    Ok(())
}

fn cmd_theme(action: ThemeAction, store: Option<ThemeStore>) -> Result<()> {
    let store = store.context("No config directory; set PDFPAGES_CONFIG_DIR")?;
    let current = store.load();
    let next = match action {
        ThemeAction::Show => {
            println!("{}", accent(current, &current.to_string()));
            return Ok(());
        }
        ThemeAction::Toggle => current.toggled(),
        ThemeAction::Light => Theme::Light,
        ThemeAction::Dark => Theme::Dark,
    };
    store.save(next).context("Failed to save theme")?;
    println!("{}", accent(next, &next.to_string()));
    Ok(())
}

async fn cmd_interactive(mut session: Session, output: &Path) -> Result<()> {
    eprintln!(
        "{}",
        bold("Type a PDF path, a shortcut (escape, ctrl+o, ctrl+shift+t), or: save, gallery, quality <q>, reset, quit")
    );
    print_section(&session);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut awaiting_path = false;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if awaiting_path {
            awaiting_path = false;
            open_in_session(&session, Path::new(line)).await;
            print_section(&session);
            continue;
        }

        match line {
            "quit" | "exit" => break,
            "reset" => session.reset(),
            "save" => match session.converter().save_all(output).await {
                Ok(paths) => eprintln!("{} saved {} files", green("✔"), paths.len()),
                Err(e) => eprintln!("{} {}", red("✗"), e),
            },
            "gallery" => {
                let converter = session.converter();
                let title = converter.document().map(|d| d.name).unwrap_or_default();
                let html =
                    render_gallery(&title, &converter.results(), converter.previews(), session.theme());
                let path = output.join(GALLERY_FILENAME);
                match tokio::fs::write(&path, html).await {
                    Ok(()) => eprintln!("{} {}", green("✔"), path.display()),
                    Err(e) => eprintln!("{} {}", red("✗"), e),
                }
            }
            cmd if cmd.starts_with("quality ") => {
                let value = cmd.trim_start_matches("quality ").trim();
                match QualityArg::from_str(value, true) {
                    Ok(q) => {
                        if let Err(e) = session.converter().set_quality(q.into()).await {
                            if e.is_user_visible() {
                                eprintln!("{} {}", red("✗"), e);
                            }
                        }
                    }
                    Err(_) => eprintln!("{} unknown quality '{}'", red("✗"), value),
                }
            }
            other => match other.parse::<Shortcut>() {
                Ok(shortcut) => match session.handle_shortcut(&shortcut) {
                    ShortcutOutcome::OpenFileRequested => {
                        eprintln!("Path to PDF:");
                        awaiting_path = true;
                    }
                    ShortcutOutcome::ThemeChanged(theme) => {
                        eprintln!("Theme: {}", accent(theme, &theme.to_string()));
                    }
                    ShortcutOutcome::ErrorDismissed => {}
                    ShortcutOutcome::Ignored => eprintln!("{}", dim("(nothing to do)")),
                },
                Err(_) => open_in_session(&session, Path::new(other)).await,
            },
        }
        print_section(&session);
    }

    session.reset();
    Ok(())
}

async fn open_in_session(session: &Session, path: &Path) {
    let file = match UploadedFile::from_path(path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("{} {}", red("✗"), e);
            return;
        }
    };
    if let Err(e) = session.open(&file).await {
        tracing::debug!("Conversion ended: {}", e);
        if let Some(notice) = session.failure_notice(&e) {
            eprintln!("{} {}", red("✗"), notice);
        }
    }
}

fn print_section(session: &Session) {
    let theme = session.theme();
    match session.section() {
        Section::Upload => eprintln!("{}", accent(theme, "[upload] choose a PDF")),
        Section::Progress => eprintln!("{}", accent(theme, "[progress] converting…")),
        Section::Results => {
            let results = session.converter().results();
            eprintln!(
                "{}",
                accent(theme, &format!("[results] {} pages ready", results.len()))
            );
            for page in results {
                eprintln!("  {}  {}", page.filename, dim(&page.preview.url()));
            }
        }
        Section::Error => eprintln!(
            "{} {}",
            red("[error]"),
            session.error_message().unwrap_or_default()
        ),
    }
}
