//! CLI binary for paper-renamer.
//!
//! A thin shim over the library crate: load `config.yaml`, apply CLI
//! overrides, and watch until Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use paper_renamer::progress::{STATUS_FAILED, STATUS_RENAMED};
use paper_renamer::{
    watch, LogNotifier, ProgressNotifier, ProgressUpdate, Renamer, RenamerConfig, SharedNotifier,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
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

// ── CLI progress notifier using indicatif ────────────────────────────────────

/// Terminal notifier: a spinner that shows the file being analysed, and one
/// log line per finished file.
struct CliProgressNotifier {
    bar: ProgressBar,
}

impl CliProgressNotifier {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Starting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn idle(&self) {
        self.bar.set_prefix("Watching");
        self.bar.set_message(dim("waiting for new PDFs…"));
    }
}

impl ProgressNotifier for CliProgressNotifier {
    fn on_watch_start(&self, folder: &Path, existing_files: usize) {
        self.bar.println(format!(
            "{} {}  {}",
            green("◆"),
            bold(&format!("Watching {}", folder.display())),
            dim(&format!("({existing_files} existing entries left untouched)")),
        ));
        self.idle();
    }

    fn on_progress(&self, update: &ProgressUpdate) {
        if update.value < 1.0 {
            self.bar.set_prefix(update.step_label.clone());
            self.bar
                .set_message(format!("{}  {}", update.title, dim(&update.status)));
            return;
        }

        let mark = match update.status.as_str() {
            STATUS_RENAMED => green("✓"),
            STATUS_FAILED => red("✗"),
            _ => dim("·"),
        };
        self.bar.println(format!(
            "  {}  {}  {}",
            mark,
            update.title,
            dim(&update.status)
        ));
        self.idle();
    }
}

impl Drop for CliProgressNotifier {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Watch the folder named in ./config.yaml
  paper-renamer

  # Override the folder and model
  paper-renamer --watch-folder ~/Downloads --model gpt-4o

  # Use a non-OpenAI vision provider
  paper-renamer --provider anthropic --model claude-sonnet-4-20250514

CONFIG FILE (YAML):
  watch_folder: /home/me/Downloads      # required
  api_key: sk-...                       # or OPENAI_API_KEY
  model: gpt-4o-mini
  api_timeout_secs: 60
  pdfium_lib_path: /opt/pdfium/lib      # optional

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key (when api_key is not in the file)
  ANTHROPIC_API_KEY       Anthropic API key (provider: anthropic)
  GEMINI_API_KEY          Google Gemini API key (provider: gemini)
  RUST_LOG                Overrides the log filter
"#;

/// Watch a folder and rename academic papers by title.
#[derive(Parser, Debug)]
#[command(
    name = "paper-renamer",
    version,
    about = "Watch a folder and rename academic PDFs by their title",
    long_about = "Watch a download folder for new PDF files. The first page of each new PDF is \
sent to a Vision Language Model; papers are renamed to \"{title}({original name}).pdf\" and \
everything else is left alone.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// YAML configuration file.
    #[arg(short, long, env = "PAPER_RENAMER_CONFIG", default_value = "config.yaml")]
    config: PathBuf,

    /// Folder to watch (overrides `watch_folder`).
    #[arg(long, env = "PAPER_RENAMER_WATCH_FOLDER")]
    watch_folder: Option<PathBuf>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "PAPER_RENAMER_PROVIDER")]
    provider: Option<String>,

    /// Vision model ID (e.g. gpt-4o-mini, gpt-4o, claude-sonnet-4-20250514).
    #[arg(long, env = "PAPER_RENAMER_MODEL")]
    model: Option<String>,

    /// Classification call timeout in seconds.
    #[arg(long, env = "PAPER_RENAMER_API_TIMEOUT")]
    api_timeout: Option<u64>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PAPER_RENAMER_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PAPER_RENAMER_QUIET")]
    quiet: bool,

    /// Disable the progress spinner and log progress instead.
    #[arg(long, env = "PAPER_RENAMER_NO_PROGRESS")]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // With the spinner active only warnings reach the terminal; the
    // spinner's own lines carry the per-file feedback.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else if show_progress {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let config = build_config(&cli)?;
    info!("Configuration: {:?}", config);

    // ── Assemble the renamer ─────────────────────────────────────────────
    let notifier: SharedNotifier = if show_progress {
        CliProgressNotifier::new() as SharedNotifier
    } else {
        Arc::new(LogNotifier)
    };

    let mut renamer = Renamer::from_config(config)
        .context("Failed to initialise the renamer")?
        .with_notifier(notifier);

    // ── Watch until Ctrl-C ───────────────────────────────────────────────
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    let summary = watch(&mut renamer, shutdown)
        .await
        .context("Failed to watch folder")?;
    // clears the spinner
    drop(renamer);

    if !cli.quiet {
        eprintln!(
            "{}  {} renamed  /  {} skipped  /  {} failed",
            green("✔"),
            bold(&summary.renamed.to_string()),
            summary.skipped,
            if summary.failed == 0 {
                summary.failed.to_string()
            } else {
                red(&summary.failed.to_string())
            },
        );
    }

    Ok(())
}

/// Load the YAML file (if present) and apply CLI overrides.
fn build_config(cli: &Cli) -> Result<RenamerConfig> {
    let base = if cli.config.exists() {
        RenamerConfig::from_yaml_file(&cli.config)
            .with_context(|| format!("Failed to load config from {:?}", cli.config))?
    } else {
        info!(
            "No config file at {}, using defaults",
            cli.config.display()
        );
        RenamerConfig::default()
    };

    let mut builder = base.into_builder();
    if let Some(ref dir) = cli.watch_folder {
        builder = builder.watch_folder(dir);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider(provider);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(secs) = cli.api_timeout {
        builder = builder.api_timeout_secs(secs);
    }

    builder.build().context("Invalid configuration")
}
