//! CLI binary for pagesmith.
//!
//! One subcommand per tool. Each maps its flags onto edits and a
//! `ProcessingConfig`, runs the tool, and writes the outputs atomically.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use futures::future::try_join_all;
use indicatif::{ProgressBar, ProgressStyle};
use pagesmith::pipeline::input::resolve_input;
use pagesmith::{
    inspect_bytes, process_files, write_outputs, EditAction, InputFile, MetadataPatch,
    PageRange, PageRef, PageSelection, ProcessingConfig, ProcessingProgressCallback,
    ProgressCallback, SplitMode, ToolKind,
};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner while inputs load, then a bar over the outputs being written.
struct CliProgressCallback {
    bar: ProgressBar,
    loaded_pages: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            loaded_pages: AtomicUsize::new(0),
        })
    }
}

impl ProcessingProgressCallback for CliProgressCallback {
    fn on_load_start(&self, total_files: usize) {
        self.bar.set_prefix("Loading");
        self.bar.set_message(format!("{total_files} file(s)…"));
    }

    fn on_document_loaded(&self, index: usize, name: &str, page_count: usize) {
        self.loaded_pages.fetch_add(page_count, Ordering::Relaxed);
        let detail = if page_count > 0 {
            format!("{page_count} pages")
        } else {
            "image".to_string()
        };
        self.bar.println(format!(
            "  {} {:>2}. {}  {}",
            green("✓"),
            index,
            name,
            dim(&detail)
        ));
    }

    fn on_process_start(&self, tool: &str, total_outputs: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} files  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_length(total_outputs as u64);
        self.bar.set_style(style);
        self.bar.set_prefix(tool.to_string());
    }

    fn on_output_ready(&self, _index: usize, _total: usize, name: &str, bytes: usize) {
        self.bar.println(format!(
            "  {} {}  {}",
            green("✓"),
            name,
            dim(&format_bytes(bytes))
        ));
        self.bar.inc(1);
    }

    fn on_process_error(&self, tool: &str, error: &str) {
        self.bar.finish_and_clear();
        eprintln!("{} {} failed: {}", red("✘"), tool, red(error));
    }

    fn on_process_complete(&self, _tool: &str, total_outputs: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} file(s) produced from {} page(s)",
            green("✔"),
            bold(&total_outputs.to_string()),
            self.loaded_pages.load(Ordering::Relaxed)
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Merge two documents into ./merged-document.pdf
  pagesmith merge a.pdf b.pdf

  # Split every 10 pages, or by explicit ranges
  pagesmith split book.pdf --every 10 -o parts/
  pagesmith split book.pdf --ranges 1-3,4-9,10

  # Rotate pages 2 and 4 clockwise
  pagesmith rotate scan.pdf --pages 2,4 --degrees 90

  # Remove pages, or keep only some
  pagesmith delete report.pdf --pages 5-7
  pagesmith extract report.pdf --pages 1,3

  # Reorder (pages not listed are dropped)
  pagesmith organize deck.pdf --order 3,1,2

  # Apply a JSON edit list
  pagesmith organize deck.pdf --edits edits.json

  # Metadata
  pagesmith inspect paper.pdf --json
  pagesmith metadata paper.pdf --title "Final" --author ""

  # Images to PDF (inputs may be URLs)
  pagesmith images https://example.com/photo.jpg scan.png

EDIT FILE FORMAT:
  [{"type": "reorder", "from": 0, "to": 2},
   {"type": "rotate", "page": 1, "degrees": 90},
   {"type": "delete", "page": 3}]
  Reorder indices are 0-based; `page` is a 1-based position or a page id.

ENVIRONMENT VARIABLES:
  PAGESMITH_OUT_DIR        Default output directory
  PAGESMITH_NO_COMPRESS    Write uncompressed streams
  PAGESMITH_VERBOSE        Enable debug logging
  PDFIUM_LIB_PATH          pdfium library for `render` (render builds only)
"#;

/// Merge, split, rotate, reorder and edit PDF documents.
#[derive(Parser, Debug)]
#[command(
    name = "pagesmith",
    version,
    about = "Merge, split, rotate, reorder and edit PDF documents",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Directory for output files.
    #[arg(short, long, global = true, env = "PAGESMITH_OUT_DIR", default_value = ".")]
    out_dir: PathBuf,

    /// Write uncompressed content streams.
    #[arg(long, global = true, env = "PAGESMITH_NO_COMPRESS")]
    no_compress: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "PAGESMITH_NO_PROGRESS")]
    no_progress: bool,

    /// Apply the mobile upload ceiling (25 MB instead of 50 MB).
    #[arg(long, global = true, env = "PAGESMITH_MOBILE")]
    mobile: bool,

    /// HTTP download timeout in seconds for URL inputs.
    #[arg(long, global = true, env = "PAGESMITH_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PAGESMITH_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PAGESMITH_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print document metadata without modifying anything.
    Inspect {
        input: String,
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Combine several PDFs into one, in argument order.
    Merge {
        #[arg(required = true, num_args = 2..)]
        inputs: Vec<String>,
    },
    /// Break a PDF into several documents.
    Split {
        input: String,
        /// Chunks of N pages.
        #[arg(long, conflicts_with = "ranges")]
        every: Option<usize>,
        /// Comma-separated ranges, e.g. 1-3,4-9,10.
        #[arg(long)]
        ranges: Option<String>,
    },
    /// Rotate pages clockwise.
    Rotate {
        input: String,
        /// Multiple of 90; negative values rotate counter-clockwise.
        #[arg(long, default_value_t = 90, allow_hyphen_values = true)]
        degrees: i32,
        /// Page selection: all, 5, 3-15, or 1,3,5,7.
        #[arg(long, default_value = "all")]
        pages: String,
    },
    /// Remove pages.
    Delete {
        input: String,
        #[arg(long)]
        pages: String,
    },
    /// Keep only the selected pages.
    Extract {
        input: String,
        #[arg(long)]
        pages: String,
    },
    /// Reorder pages, or apply a JSON edit list.
    Organize {
        input: String,
        /// New order as 1-based page numbers; unlisted pages are dropped.
        #[arg(long, conflicts_with = "edits", required_unless_present = "edits")]
        order: Option<String>,
        /// Path to a JSON array of edit actions.
        #[arg(long)]
        edits: Option<PathBuf>,
    },
    /// Set or clear document information fields. An empty value clears.
    Metadata {
        input: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        keywords: Option<String>,
        #[arg(long)]
        creator: Option<String>,
    },
    /// Turn PNG and JPEG images into a PDF, one image per page.
    Images {
        #[arg(required = true)]
        inputs: Vec<String>,
    },
    /// Render pages to PNG.
    #[cfg(feature = "render")]
    Render {
        input: String,
        #[arg(long, default_value = "all")]
        pages: String,
        /// Rendering DPI (36–600).
        #[arg(long, default_value_t = 150,
              value_parser = clap::value_parser!(u32).range(36..=600))]
        dpi: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let global = &cli.global;

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar provides the feedback; library INFO logs would
    // interleave with it.
    let show_progress = !global.quiet && !global.no_progress;
    let filter = if global.verbose {
        "debug"
    } else if global.quiet || show_progress {
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

    if let Command::Inspect { input, json } = &cli.command {
        return run_inspect(input, *json, global.download_timeout).await;
    }

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ProcessingProgressCallback>)
    } else {
        None
    };

    let started = Instant::now();
    let (kind, files, edits, config) = plan(&cli.command, global, progress_cb).await?;
    let output = process_files(kind.spec(), files, &edits, &config)
        .await
        .with_context(|| format!("{} failed", kind))?;
    let written = write_outputs(&output, &global.out_dir)
        .await
        .context("Failed to write output")?;

    if !global.quiet {
        for path in &written {
            eprintln!("   {}", bold(&path.display().to_string()));
        }
        eprintln!(
            "{}  {}  {}",
            green("✔"),
            format_bytes(output.total_bytes()),
            dim(&format!("{}ms", started.elapsed().as_millis()))
        );
    }
    Ok(())
}

async fn run_inspect(input: &str, json: bool, timeout: u64) -> Result<()> {
    let file = resolve_input(input, timeout)
        .await
        .context("Failed to read input")?;
    let meta = inspect_bytes(&file.bytes, &file.name).context("Failed to inspect PDF")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
        );
        return Ok(());
    }

    println!("File:         {}", input);
    println!("Size:         {}", format_bytes(file.len()));
    let fields = [
        ("Title", &meta.title),
        ("Author", &meta.author),
        ("Subject", &meta.subject),
        ("Keywords", &meta.keywords),
        ("Creator", &meta.creator),
        ("Producer", &meta.producer),
        ("Created", &meta.creation_date),
        ("Modified", &meta.modification_date),
    ];
    for (label, value) in fields {
        if let Some(v) = value {
            println!("{:<13} {}", format!("{label}:"), v);
        }
    }
    println!("Pages:        {}", meta.page_count);
    println!("PDF Version:  {}", meta.pdf_version);
    println!(
        "Encrypted:    {}",
        if meta.is_encrypted { red("yes") } else { "no".to_string() }
    );
    Ok(())
}

type Plan = (ToolKind, Vec<InputFile>, Vec<EditAction>, ProcessingConfig);

/// Resolve inputs and map a subcommand onto a tool, edits and config.
async fn plan(
    command: &Command,
    global: &GlobalArgs,
    progress: Option<ProgressCallback>,
) -> Result<Plan> {
    let mut builder = ProcessingConfig::builder()
        .compress_streams(!global.no_compress)
        .mobile_client(global.mobile)
        .download_timeout_secs(global.download_timeout);
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    let single = |input: &String| vec![input.clone()];
    let (kind, inputs, edits) = match command {
        Command::Inspect { .. } => bail!("inspect does not produce output files"),
        Command::Merge { inputs } => (ToolKind::Merge, inputs.clone(), Vec::new()),
        Command::Split {
            input,
            every,
            ranges,
        } => {
            let mode = match (every, ranges) {
                (Some(n), _) => SplitMode::Every(*n),
                (None, Some(r)) => SplitMode::Ranges(parse_ranges(r)?),
                (None, None) => SplitMode::EachPage,
            };
            builder = builder.split_mode(mode);
            (ToolKind::Split, single(input), Vec::new())
        }
        Command::Rotate { input, .. }
        | Command::Delete { input, .. }
        | Command::Extract { input, .. } => {
            // Page selections need the page count before edits can be built.
            let kind = match command {
                Command::Rotate { .. } => ToolKind::Rotate,
                Command::Delete { .. } => ToolKind::DeletePages,
                _ => ToolKind::ExtractPages,
            };
            (kind, single(input), Vec::new())
        }
        Command::Organize { input, edits, .. } => {
            let edits = match edits {
                Some(path) => read_edits(path).await?,
                None => Vec::new(),
            };
            (ToolKind::Organize, single(input), edits)
        }
        Command::Metadata {
            input,
            title,
            author,
            subject,
            keywords,
            creator,
        } => {
            let patch = MetadataPatch {
                title: title.clone(),
                author: author.clone(),
                subject: subject.clone(),
                keywords: keywords.clone(),
                creator: creator.clone(),
            };
            if patch.is_empty() {
                bail!("Nothing to change: pass at least one of --title, --author, --subject, --keywords, --creator");
            }
            builder = builder.metadata(patch);
            (ToolKind::EditMetadata, single(input), Vec::new())
        }
        Command::Images { inputs } => (ToolKind::ImagesToPdf, inputs.clone(), Vec::new()),
        #[cfg(feature = "render")]
        Command::Render { input, dpi, .. } => {
            builder = builder.render(pagesmith::RenderOptions {
                dpi: *dpi,
                ..Default::default()
            });
            (ToolKind::PdfToImages, single(input), Vec::new())
        }
    };

    let timeout = global.download_timeout;
    let files = try_join_all(inputs.iter().map(|i| resolve_input(i, timeout)))
        .await
        .context("Failed to read input")?;

    let edits = match command {
        Command::Rotate { degrees, pages, .. } => {
            let total = page_count(&files)?;
            selected(pages, total)?
                .into_iter()
                .map(|i| EditAction::Rotate {
                    page: PageRef::Position(i + 1),
                    degrees: *degrees,
                })
                .collect()
        }
        Command::Delete { pages, .. } => {
            let total = page_count(&files)?;
            selected(pages, total)?
                .into_iter()
                .map(|i| EditAction::Delete {
                    page: PageRef::Position(i + 1),
                })
                .collect()
        }
        Command::Extract { pages, .. } => {
            let total = page_count(&files)?;
            let keep = selected(pages, total)?;
            (0..total)
                .filter(|i| !keep.contains(i))
                .map(|i| EditAction::Delete {
                    page: PageRef::Position(i + 1),
                })
                .collect()
        }
        Command::Organize {
            order: Some(order), ..
        } => {
            let total = page_count(&files)?;
            order_to_edits(&parse_order(order)?, total)?
        }
        #[cfg(feature = "render")]
        Command::Render { pages, .. } => {
            let total = page_count(&files)?;
            let keep = selected(pages, total)?;
            (0..total)
                .filter(|i| !keep.contains(i))
                .map(|i| EditAction::Delete {
                    page: PageRef::Position(i + 1),
                })
                .collect()
        }
        _ => edits,
    };

    let config = builder.build().context("Invalid configuration")?;
    Ok((kind, files, edits, config))
}

fn page_count(files: &[InputFile]) -> Result<usize> {
    let file = files.first().context("No input given")?;
    Ok(inspect_bytes(&file.bytes, &file.name)
        .with_context(|| format!("Failed to open '{}'", file.name))?
        .page_count)
}

/// Expand a `--pages` string into 0-based indices, rejecting empty results.
fn selected(pages: &str, total: usize) -> Result<Vec<usize>> {
    let indices = parse_pages(pages)?.to_indices(total);
    if indices.is_empty() {
        bail!("--pages '{}' selects nothing in a {}-page document", pages, total);
    }
    Ok(indices)
}

async fn read_edits(path: &PathBuf) -> Result<Vec<EditAction>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read edits from {:?}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid edit list in {:?}", path))
}

/// Turn a target order of 1-based page numbers into reorder and delete
/// edits against an untouched page-set of `total` pages.
fn order_to_edits(order: &[usize], total: usize) -> Result<Vec<EditAction>> {
    let mut seen = vec![false; total];
    for &p in order {
        if p < 1 || p > total {
            bail!("Page {} is out of range (document has {} pages)", p, total);
        }
        if std::mem::replace(&mut seen[p - 1], true) {
            bail!("Page {} is listed twice", p);
        }
    }

    let mut current: Vec<usize> = (1..=total).collect();
    let mut edits = Vec::new();
    for (to, &page) in order.iter().enumerate() {
        let from = current
            .iter()
            .position(|&p| p == page)
            .context("page vanished while reordering")?;
        if from != to {
            let moved = current.remove(from);
            current.insert(to, moved);
            edits.push(EditAction::Reorder { from, to });
        }
    }
    edits.extend((order.len() + 1..=total).map(|pos| EditAction::Delete {
        page: PageRef::Position(pos),
    }));
    Ok(edits)
}

fn parse_order(s: &str) -> Result<Vec<usize>> {
    s.split(',')
        .map(|p| {
            p.trim()
                .parse::<usize>()
                .with_context(|| format!("Invalid page number: '{}'", p.trim()))
        })
        .collect()
}

/// Parse `--ranges` ("1-3,4-9,10") into page ranges.
fn parse_ranges(s: &str) -> Result<Vec<PageRange>> {
    s.split(',')
        .map(|part| {
            let part = part.trim();
            let (start, end) = match part.split_once('-') {
                Some((a, b)) => (a.trim(), b.trim()),
                None => (part, part),
            };
            let start: usize = start
                .parse()
                .with_context(|| format!("Invalid start page in range '{part}'"))?;
            let end: usize = end
                .parse()
                .with_context(|| format!("Invalid end page in range '{part}'"))?;
            if start < 1 || start > end {
                bail!("Invalid page range '{}': pages are 1-indexed and start must be <= end", part);
            }
            Ok(PageRange::new(start, end))
        })
        .collect()
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
            bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            bail!(
                "Invalid page range '{}-{}': start must be <= end",
                start,
                end
            );
        }

        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let pages = parse_order(&s)?;
        if let Some(&p) = pages.iter().find(|&&p| p < 1) {
            bail!("Pages are 1-indexed, minimum is 1 (got {})", p);
        }
        return Ok(PageSelection::Set(pages));
    }

    // Single page: "5"
    let page: usize = s.parse().context("Invalid page number")?;
    if page < 1 {
        bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }

    Ok(PageSelection::Single(page))
}

fn format_bytes(n: usize) -> String {
    const KB: f64 = 1024.0;
    let n = n as f64;
    if n < KB {
        format!("{n} B")
    } else if n < KB * KB {
        format!("{:.1} KB", n / KB)
    } else {
        format!("{:.1} MB", n / (KB * KB))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_forms() {
        assert_eq!(parse_pages("all").unwrap(), PageSelection::All);
        assert_eq!(parse_pages("5").unwrap(), PageSelection::Single(5));
        assert_eq!(parse_pages("3-15").unwrap(), PageSelection::Range(3, 15));
        assert_eq!(
            parse_pages("1, 3,5").unwrap(),
            PageSelection::Set(vec![1, 3, 5])
        );
        assert!(parse_pages("0").is_err());
        assert!(parse_pages("5-3").is_err());
        assert!(parse_pages("x").is_err());
    }

    #[test]
    fn ranges() {
        assert_eq!(
            parse_ranges("1-3, 4-9,10").unwrap(),
            vec![
                PageRange::new(1, 3),
                PageRange::new(4, 9),
                PageRange::new(10, 10)
            ]
        );
        assert!(parse_ranges("3-1").is_err());
        assert!(parse_ranges("0-2").is_err());
    }

    #[test]
    fn order_becomes_moves_then_deletes() {
        let edits = order_to_edits(&[3, 1], 4).unwrap();
        assert_eq!(
            edits,
            vec![
                EditAction::Reorder { from: 2, to: 0 },
                EditAction::Delete {
                    page: PageRef::Position(3)
                },
                EditAction::Delete {
                    page: PageRef::Position(4)
                },
            ]
        );
    }

    #[test]
    fn order_rejects_duplicates_and_out_of_range() {
        assert!(order_to_edits(&[1, 1], 3).is_err());
        assert!(order_to_edits(&[4], 3).is_err());
    }

    #[test]
    fn identity_order_is_empty() {
        assert!(order_to_edits(&[1, 2, 3], 3).unwrap().is_empty());
    }

    #[test]
    fn byte_formatting() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
    }

    #[test]
    fn cli_parses() {
        let cli = Cli::try_parse_from(["pagesmith", "rotate", "a.pdf", "--degrees", "-90"]).unwrap();
        assert!(matches!(cli.command, Command::Rotate { degrees: -90, .. }));
        assert!(Cli::try_parse_from(["pagesmith", "merge", "a.pdf"]).is_err());
    }
}
