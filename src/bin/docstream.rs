//! CLI binary for docstream.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `IngestConfig`, runs one of the two paths and prints or writes results.

use anyhow::{Context, Result};
use clap::Parser;
use docstream::{
    dispatch, ingest, inspect, render_section, scan_pages, section_buffers, write_json,
    DispatchOptions, Heuristics, IngestConfig, IngestProgressCallback, PageContent,
    PageSelection, ProgressCallback, TocIndex, UnitKind, PREAMBLE_SECTION,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar over pages, with one log line per
/// page error.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_ingest_start` reports the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: u32) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(u64::from(total));
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Reading");
        self.bar.reset_eta();
    }
}

impl IngestProgressCallback for CliProgressCallback {
    fn on_ingest_start(&self, total_pages: u32) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Reading {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page: u32, _total_pages: u32) {
        self.bar.set_message(format!("page {page}"));
    }

    fn on_page_complete(&self, _page: u32, _total_pages: u32, _units: usize) {
        self.bar.inc(1);
    }

    fn on_page_error(&self, page: u32, total_pages: u32, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            page,
            total_pages,
            red(&msg),
        ));
    }

    fn on_ingest_complete(&self, total_pages: u32, total_units: usize) {
        self.bar.finish_and_clear();
        let errors = self.errors.load(Ordering::SeqCst);
        if errors == 0 {
            eprintln!(
                "{} {} pages read, {} units",
                green("✔"),
                bold(&total_pages.to_string()),
                total_units
            );
        } else {
            eprintln!(
                "{} {} pages read, {} units  ({} errors)",
                cyan("⚠"),
                bold(&total_pages.to_string()),
                total_units,
                red(&errors.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Section summary
  docstream manual.pdf --toc toc.json

  # Full stream + section map as JSON
  docstream manual.pdf --toc toc.json --json -o out/sections.json

  # One section, by id or title
  docstream manual.pdf --toc toc.json --section 2.2.2
  docstream manual.pdf --toc toc.json --section "Compiling BHy2CLI"

  # Per-section Markdown files
  docstream manual.pdf --toc toc.json --out-dir out/md

  # Page-granular decisions (text vs. vision) for pages 10-20
  docstream manual.pdf --toc toc.json --mode pages --pages 10-20

  # Inspect PDF metadata
  docstream --inspect-only manual.pdf

TOC FORMAT:
  [{"title": "2 Getting started", "page": 5, "level": 1, "children": [
     {"title": "2.1 Requirements", "page": 5, "level": 2}]}]
  A top-level {"toc_tree": [...]} wrapper is also accepted.

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH   Path to libpdfium (file or directory)
  RUST_LOG          Override the log filter
"#;

/// Rebuild reading order from a technical PDF and split it by its TOC.
#[derive(Parser, Debug)]
#[command(
    name = "docstream",
    version,
    about = "Rebuild reading order from a technical PDF and split it into TOC sections",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF file path.
    input: PathBuf,

    /// TOC JSON file.
    #[arg(long, env = "DOCSTREAM_TOC", required_unless_present = "inspect_only")]
    toc: Option<PathBuf>,

    /// sections: fine-grained stream + section map; pages: per-page decisions.
    #[arg(long, env = "DOCSTREAM_MODE", value_enum, default_value = "sections")]
    mode: Mode,

    /// Only report this section (id, full title or title without numeral).
    #[arg(long, env = "DOCSTREAM_SECTION")]
    section: Option<String>,

    /// Page selection for --mode pages: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "DOCSTREAM_PAGES", default_value = "all")]
    pages: String,

    /// JSON file overriding layout heuristics.
    #[arg(long, env = "DOCSTREAM_HEURISTICS")]
    heuristics: Option<PathBuf>,

    /// Output structured JSON instead of a summary.
    #[arg(long, env = "DOCSTREAM_JSON")]
    json: bool,

    /// Write JSON to this file instead of stdout (implies --json).
    #[arg(short, long, env = "DOCSTREAM_OUTPUT")]
    output: Option<PathBuf>,

    /// Write one Markdown file per section into this directory.
    #[arg(long, env = "DOCSTREAM_OUT_DIR")]
    out_dir: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "DOCSTREAM_PASSWORD")]
    password: Option<String>,

    /// Maximum concurrent output tasks.
    #[arg(short, long, env = "DOCSTREAM_CONCURRENCY", default_value_t = 10)]
    concurrency: usize,

    /// Print PDF metadata only.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCSTREAM_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCSTREAM_QUIET")]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOCSTREAM_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Sections,
    Pages,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let json = cli.json || cli.output.is_some();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar gives the user feedback; keep library INFO logs out
    // of its way unless --verbose.
    let show_progress = !cli.quiet && !cli.no_progress && !json && !cli.inspect_only;
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

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let meta = inspect(&cli.input).await.context("Failed to inspect PDF")?;
        if json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
            );
        } else {
            println!("File:         {}", cli.input.display());
            if let Some(ref t) = meta.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = meta.author {
                println!("Author:       {}", a);
            }
            if let Some(ref s) = meta.subject {
                println!("Subject:      {}", s);
            }
            println!("Pages:        {}", meta.page_count);
            println!("PDF Version:  {}", meta.pdf_version);
            if let Some(ref p) = meta.producer {
                println!("Producer:     {}", p);
            }
            if let Some(ref c) = meta.creator {
                println!("Creator:      {}", c);
            }
        }
        return Ok(());
    }

    let toc_path = cli.toc.clone().context("--toc is required")?;

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn IngestProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // Resolve --section up front so a typo fails before the PDF is read.
    let section = match cli.section.as_deref() {
        Some(PREAMBLE_SECTION) => Some(PREAMBLE_SECTION.to_string()),
        Some(query) => {
            let toc = TocIndex::load(&toc_path).context("Failed to load TOC")?;
            let id = toc
                .resolve(query)
                .with_context(|| format!("Section '{query}' is not in the TOC"))?
                .to_string();
            Some(id)
        }
        None => None,
    };

    match cli.mode {
        Mode::Sections => run_sections(&cli, &toc_path, &config, section.as_deref(), json).await,
        Mode::Pages => run_pages(&cli, &toc_path, &config, section.as_deref(), json).await,
    }
}

/// Fine-grained path: stream, section map, optional Markdown per section.
async fn run_sections(
    cli: &Cli,
    toc_path: &Path,
    config: &IngestConfig,
    only: Option<&str>,
    json: bool,
) -> Result<()> {
    let output = ingest(&cli.input, toc_path, config)
        .await
        .context("Ingest failed")?;
    let toc = TocIndex::load(toc_path).context("Failed to load TOC")?;

    if let Some(id) = only {
        if !output.sections.contains(id) {
            anyhow::bail!("Section '{id}' is in the TOC but no header for it was found");
        }
    }

    if let Some(ref dir) = cli.out_dir {
        let items: Vec<(String, String)> = output
            .sections
            .iter()
            .filter(|s| wants_markdown(&s.id, only))
            .map(|s| (s.id.clone(), render_section(&s.units, &HashMap::new())))
            .collect();
        write_markdown(dir, items, config.concurrency, cli.quiet).await?;
    }

    if json {
        match only {
            Some(id) => {
                let units = output.sections.get(id).unwrap_or_default();
                emit_json(cli, units).await?;
            }
            None => emit_json(cli, &output).await?,
        }
    } else {
        println!(
            "{:<12} {:>6} {:>6} {:>6}  {}",
            "SECTION",
            "TEXT",
            "IMAGES",
            "PAGES",
            "TITLE"
        );
        for s in output
            .sections
            .iter()
            .filter(|s| only.map_or(true, |id| s.id == id))
        {
            let text = s.units.iter().filter(|u| u.kind() != UnitKind::Image).count();
            let images = s.units.len() - text;
            let first = s.units.first().map_or(0, |u| u.unit.page());
            let last = s.units.last().map_or(0, |u| u.unit.page());
            println!(
                "{:<12} {:>6} {:>6} {:>6}  {}",
                s.id,
                text,
                images,
                format!("{first}-{last}"),
                dim(toc.title_of(&s.id).unwrap_or("")),
            );
        }
    }

    if !cli.quiet && !json {
        let stats = &output.stats;
        eprintln!(
            "{}  {} pages  {} sections  {} headers  {} recovered figures  {}ms",
            if stats.errors.is_empty() {
                green("✔")
            } else {
                cyan("⚠")
            },
            stats.total_pages,
            stats.sections,
            stats.headers,
            stats.recovered_images,
            stats.total_duration_ms,
        );
        if !stats.errors.is_empty() {
            eprintln!("   {} non-fatal errors", red(&stats.errors.len().to_string()));
        }
    }
    Ok(())
}

/// Coarse path: per-page decisions, optional section buffers.
async fn run_pages(
    cli: &Cli,
    toc_path: &Path,
    config: &IngestConfig,
    only: Option<&str>,
    json: bool,
) -> Result<()> {
    let mut output = scan_pages(&cli.input, toc_path, config)
        .await
        .context("Page scan failed")?;
    if let Some(id) = only {
        output.pages.retain(|p| p.section_id.as_deref() == Some(id));
    }

    if let Some(ref dir) = cli.out_dir {
        let items: Vec<(String, String)> =
            section_buffers(&output.pages, &HashMap::new(), &config.heuristics)
                .into_iter()
                .map(|b| (b.section_id, b.text))
                .collect();
        write_markdown(dir, items, config.concurrency, cli.quiet).await?;
    }

    if json {
        emit_json(cli, &output).await?;
    } else {
        for p in &output.pages {
            let (kind, chars) = match &p.content {
                PageContent::Text { text } => (dim("text  "), text.chars().count()),
                PageContent::Vision(_) => (cyan("vision"), p.raw_text.chars().count()),
            };
            println!(
                "P{:<4} {:<12} {}  {:>6} chars",
                p.page,
                p.section_id.as_deref().unwrap_or("-"),
                kind,
                chars
            );
        }
    }

    if !cli.quiet && !json {
        let vision = output.vision_pages().count();
        eprintln!(
            "{}  {} pages  {} need vision  {} errors",
            if output.errors.is_empty() {
                green("✔")
            } else {
                cyan("⚠")
            },
            output.pages.len(),
            vision,
            output.errors.len()
        );
    }
    Ok(())
}

/// Print JSON to stdout, or write it atomically to `--output`.
async fn emit_json<T: serde::Serialize + ?Sized>(cli: &Cli, value: &T) -> Result<()> {
    match cli.output {
        Some(ref path) => {
            write_json(path, value)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !cli.quiet {
                eprintln!("{}  →  {}", green("✔"), bold(&path.display().to_string()));
            }
        }
        None => println!(
            "{}",
            serde_json::to_string_pretty(value).context("Failed to serialise output")?
        ),
    }
    Ok(())
}

/// Write `(section_id, markdown)` pairs as `<dir>/<id>.md` on a bounded pool.
async fn write_markdown(
    dir: &Path,
    items: Vec<(String, String)>,
    concurrency: usize,
    quiet: bool,
) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let dir = dir.to_path_buf();
    let report = dispatch(items, &DispatchOptions::new(concurrency), |id, markdown| {
        let path = dir.join(format!("{}.md", file_stem(&id)));
        async move { tokio::fs::write(&path, markdown).await.map(|_| path) }
    })
    .await;

    if !quiet {
        eprintln!(
            "{}  {} section files  →  {}",
            if report.failed.is_empty() {
                green("✔")
            } else {
                cyan("⚠")
            },
            report.completed.len(),
            bold(&dir.display().to_string())
        );
        for (id, err) in &report.failed {
            eprintln!("   {} {}: {}", red("✗"), id, err);
        }
    }
    Ok(())
}

/// Whether section `id` gets a Markdown file. The preamble only when asked for.
fn wants_markdown(id: &str, only: Option<&str>) -> bool {
    match only {
        Some(wanted) => id == wanted,
        None => id != PREAMBLE_SECTION,
    }
}

/// Section id as a file name: path separators and spaces become `_`.
fn file_stem(id: &str) -> String {
    id.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | ' ' => '_',
            c => c,
        })
        .collect()
}

/// Map CLI args to `IngestConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<IngestConfig> {
    let heuristics = match cli.heuristics {
        Some(ref path) => Heuristics::from_json_file(path)
            .with_context(|| format!("Failed to load heuristics from {}", path.display()))?,
        None => Heuristics::default(),
    };

    let mut builder = IngestConfig::builder()
        .heuristics(heuristics)
        .concurrency(cli.concurrency)
        .pages(parse_pages(&cli.pages)?);
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}

/// Parse `--pages` string into `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(PageSelection::All);
    }

    // Range: "3-15"
    if let Some((start, end)) = s.split_once('-') {
        let start: usize = start
            .trim()
            .parse()
            .context("Invalid start page in range")?;
        let end: usize = end.trim().parse().context("Invalid end page in range")?;
        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!("Invalid page range '{}-{}': start must be <= end", start, end);
        }
        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let pages: Vec<usize> = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .with_context(|| format!("Invalid page number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;
        if pages.contains(&0) {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got 0)");
        }
        return Ok(PageSelection::Set(pages));
    }

    // Single page: "5"
    let page: usize = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }
    Ok(PageSelection::Single(page))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preamble_markdown_only_on_request() {
        assert!(!wants_markdown(PREAMBLE_SECTION, None));
        assert!(wants_markdown("2.1", None));
        assert!(wants_markdown(PREAMBLE_SECTION, Some(PREAMBLE_SECTION)));
        assert!(!wants_markdown("2.1", Some("2.2")));
    }

    #[test]
    fn file_stem_replaces_separators() {
        assert_eq!(file_stem("2.2.2"), "2.2.2");
        assert_eq!(file_stem("Annex A: Pins/IO"), "Annex_A__Pins_IO");
    }

    #[test]
    fn parse_pages_forms() {
        assert_eq!(parse_pages("all").unwrap(), PageSelection::All);
        assert_eq!(parse_pages("5").unwrap(), PageSelection::Single(5));
        assert_eq!(parse_pages("3-15").unwrap(), PageSelection::Range(3, 15));
        assert_eq!(parse_pages("1,3,5").unwrap(), PageSelection::Set(vec![1, 3, 5]));
        assert!(parse_pages("0").is_err());
        assert!(parse_pages("9-2").is_err());
    }
}
