//! CLI binary for rubric-review.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ReviewConfig`, runs the review and exports the results.

use anyhow::{Context, Result};
use clap::Parser;
use futures::{Stream, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use rubric_review::{
    export_csv, read_csv_file, review_table, CancellationToken, ColumnMapping, ProgressCallback,
    ProgressState, ReviewConfig, ReviewProgressCallback, RowLimit, RunOutcome, RunStatus,
    DEFAULT_EXPORT_FILE,
};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per row.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start of the row in flight; rows never overlap.
    row_started: Mutex<Option<Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} rows  \
                 ⏱ {elapsed_precise}  ETA {eta_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Reviewing");

        Arc::new(Self {
            bar,
            row_started: Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    fn row_elapsed(&self) -> String {
        let secs = self
            .row_started
            .lock()
            .ok()
            .and_then(|mut t| t.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        dim(&format!("{secs:.1}s"))
    }
}

impl ReviewProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_rows: usize) {
        self.bar.set_length(total_rows as u64);
        self.bar.enable_steady_tick(Duration::from_millis(80));
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Reviewing {total_rows} rows… (Ctrl-C to stop)"))
        ));
    }

    fn on_row_start(&self, row_num: usize, _total_rows: usize) {
        if let Ok(mut t) = self.row_started.lock() {
            *t = Some(Instant::now());
        }
        self.bar.set_message(format!("row {row_num}"));
    }

    fn on_row_complete(&self, progress: ProgressState, total_score: Option<u32>) {
        let score = total_score
            .map(|s| format!("total {s:>2}"))
            .unwrap_or_else(|| "no scores".to_string());
        self.bar.println(format!(
            "  {} Row {:>3}/{:<3}  {:<10}  {}",
            green("✓"),
            progress.done,
            progress.total,
            score,
            self.row_elapsed(),
        ));
        self.bar.set_position(progress.done as u64);
    }

    fn on_row_error(&self, progress: ProgressState, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Row {:>3}/{:<3}  {}  {}",
            red("✗"),
            progress.done,
            progress.total,
            red(&msg),
            self.row_elapsed(),
        ));
        self.bar.set_position(progress.done as u64);
    }

    fn on_run_complete(&self, progress: ProgressState, status: RunStatus) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        let head = match status {
            RunStatus::Cancelled => cyan("■ Stopped:"),
            RunStatus::Completed if failed == 0 => green("✔"),
            RunStatus::Completed => cyan("⚠"),
        };
        eprintln!(
            "{} {}/{} rows reviewed  ({} failed)",
            head,
            bold(&progress.done.to_string()),
            progress.total,
            if failed > 0 {
                red(&failed.to_string())
            } else {
                failed.to_string()
            },
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Review every row, write graphics-review-results.csv
  rubric-review submissions.csv

  # First 10 rows, custom columns, custom output
  rubric-review --limit 10 --image-column artwork --brief-column objective \
      submissions.csv -o scored.csv

  # Show the columns of a sheet (no API key needed)
  rubric-review --list-columns submissions.csv

  # Machine-readable outcome on stdout
  rubric-review --json --no-progress submissions.csv > outcome.json

INPUT:
  A CSV with a header line. The image column holds an image URL, a data URL
  or a PDF (URL or local path); PDFs are reviewed by their first page. The
  optional brief column adds design context to the prompt.

OUTPUT COLUMNS (appended after the input columns):
  Review                       "<Category>: <notes>" joined with " | "
  <Category> Score / Notes     for each of the 9 rubric categories
  Total Score, Average Score   only when at least one category was scored
  error                        why the row could not be scored

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY               Bearer credential for the scoring service
  OPENAI_CHAT_COMPLETIONS_URL  Any OpenAI-compatible chat-completion endpoint
  RUBRIC_REVIEW_MODEL          Model ID (default gpt-4o-mini)
  RUBRIC_REVIEW_LIMIT          Rows to review: all or a count
  PDFIUM_LIB_PATH              Directory holding libpdfium
  RUST_LOG                     Log filter, e.g. rubric_review=debug

Press Ctrl-C to stop after the current row; rows reviewed so far are exported.
Press it again to quit at once (exit code 130) without exporting.
"#;

/// Score design images listed in a CSV against a 9-category rubric.
#[derive(Parser, Debug)]
#[command(
    name = "rubric-review",
    version,
    about = "Score design images listed in a CSV against a 9-category rubric using a Vision LLM",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input CSV file with a header line.
    input: PathBuf,

    /// Write results to this CSV file.
    #[arg(short, long, env = "RUBRIC_REVIEW_OUTPUT", default_value = DEFAULT_EXPORT_FILE)]
    output: PathBuf,

    /// Bearer credential for the scoring service.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Vision model ID.
    #[arg(long, env = "RUBRIC_REVIEW_MODEL", default_value = rubric_review::config::DEFAULT_MODEL)]
    model: String,

    /// Chat-completion endpoint URL.
    #[arg(long, env = "OPENAI_CHAT_COMPLETIONS_URL", default_value = rubric_review::config::DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Column holding the image reference.
    #[arg(long, env = "RUBRIC_REVIEW_IMAGE_COLUMN", default_value = rubric_review::config::DEFAULT_IMAGE_COLUMN)]
    image_column: String,

    /// Column holding the optional design brief.
    #[arg(long, env = "RUBRIC_REVIEW_BRIEF_COLUMN", default_value = rubric_review::config::DEFAULT_BRIEF_COLUMN)]
    brief_column: String,

    /// Rows to review: all, or the first N.
    #[arg(long, env = "RUBRIC_REVIEW_LIMIT", default_value = "all", value_parser = parse_limit)]
    limit: RowLimit,

    /// Magnification for rendering the first page of PDFs.
    #[arg(long, env = "RUBRIC_REVIEW_PDF_SCALE", default_value_t = 1.5)]
    pdf_scale: f32,

    /// Directory holding the pdfium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,

    /// Timeout in seconds for downloading remote PDFs.
    #[arg(long, env = "RUBRIC_REVIEW_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Timeout in seconds for each scoring request (none by default).
    #[arg(long, env = "RUBRIC_REVIEW_API_TIMEOUT")]
    api_timeout: Option<u64>,

    /// Print the run outcome as JSON on stdout.
    #[arg(long, env = "RUBRIC_REVIEW_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "RUBRIC_REVIEW_NO_PROGRESS")]
    no_progress: bool,

    /// Print the input's column names and exit.
    #[arg(long)]
    list_columns: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "RUBRIC_REVIEW_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "RUBRIC_REVIEW_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs would fight with the progress bar; keep them quiet
    // unless asked for.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    let table = read_csv_file(&cli.input).context("Failed to load input")?;

    // ── Column listing ───────────────────────────────────────────────────
    if cli.list_columns {
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&table.fields).context("Failed to serialise columns")?
            );
        } else {
            for field in &table.fields {
                println!("{field}");
            }
            if !cli.quiet {
                eprintln!("{}", dim(&format!("{} data rows", table.rows.len())));
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ReviewProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Ctrl-C stops after the row in flight, a second one quits ─────────
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    let quiet = cli.quiet;
    tokio::spawn(async move {
        let signals = futures::stream::unfold((), |()| async {
            tokio::signal::ctrl_c().await.ok().map(|()| ((), ()))
        });
        if await_forced_exit(Box::pin(signals), &on_signal, quiet).await {
            eprintln!("{}", red("Interrupted again; exiting without export"));
            std::process::exit(130);
        }
    });

    // ── Run review ───────────────────────────────────────────────────────
    let outcome = match review_table(table, &config, cancel).await {
        Ok(outcome) => outcome,
        Err(e) if e.is_validation() => {
            eprintln!("{}", red(&e.to_string()));
            std::process::exit(2);
        }
        Err(e) => return Err(e).context("Review failed"),
    };

    let rows = outcome.output_rows();
    let written = export_csv(&cli.output, &rows).context("Export failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&outcome).context("Failed to serialise outcome")?;
        println!("{json}");
    }

    if !cli.quiet {
        print_summary(&cli, &outcome, written, show_progress);
    }

    Ok(())
}

/// Map CLI args to `ReviewConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ReviewConfig> {
    let mut builder = ReviewConfig::builder()
        .model(&cli.model)
        .endpoint(&cli.endpoint)
        .limit(cli.limit)
        .columns(ColumnMapping::new(&cli.image_column).with_brief(&cli.brief_column))
        .pdf_scale(cli.pdf_scale)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key);
    }
    if let Some(ref dir) = cli.pdfium_lib_path {
        builder = builder.pdfium_lib_path(dir);
    }
    if let Some(secs) = cli.api_timeout {
        builder = builder.api_timeout_secs(secs);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--limit`: `all` or a row count.
fn parse_limit(s: &str) -> Result<RowLimit, String> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("all") {
        return Ok(RowLimit::All);
    }
    s.parse::<usize>()
        .map(RowLimit::First)
        .map_err(|_| format!("expected 'all' or a row count, got '{s}'"))
}

/// Cancels `cancel` on the first interrupt. Returns `true` on the second,
/// `false` if the signal source ends first.
async fn await_forced_exit<S>(mut signals: S, cancel: &CancellationToken, quiet: bool) -> bool
where
    S: Stream<Item = ()> + Unpin,
{
    if signals.next().await.is_none() {
        return false;
    }
    if !quiet {
        eprintln!("{}", cyan("Stopping after the current row… (Ctrl-C again to quit)"));
    }
    cancel.cancel();
    signals.next().await.is_some()
}

fn print_summary(cli: &Cli, outcome: &RunOutcome, written: bool, show_progress: bool) {
    // The progress callback has already logged every row.
    if !show_progress && !cli.json {
        for r in &outcome.rows {
            match &r.error {
                None => eprintln!(
                    "  Row {:>3}  total {}",
                    r.index + 1,
                    r.total_score
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "-".into())
                ),
                Some(e) => eprintln!("  Row {:>3}  error: {}", r.index + 1, e),
            }
        }
        eprintln!(
            "{} {}/{} rows, {} failed, {}ms",
            if outcome.was_cancelled() {
                "Stopped:"
            } else {
                "Reviewed"
            },
            outcome.progress.done,
            outcome.progress.total,
            outcome.stats.failed_rows,
            outcome.stats.total_duration_ms,
        );
    }

    if written {
        eprintln!("   →  {}", bold(&cli.output.display().to_string()));
    }
}
