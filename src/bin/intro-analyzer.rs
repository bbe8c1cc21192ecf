//! CLI binary for paper-intro-analyzer.
//!
//! A thin shim over the library crate that maps flags to
//! `AnalysisConfig` / `WorkspacePaths` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use paper_intro_analyzer::{
    scaffold, AnalysisConfig, AnalysisProgressCallback, Analyzer, MatchMode, PdfiumTextSource,
    ProgressCallback, RunSummary, ScaffoldReport, WorkspacePaths,
};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
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
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar for the batch plus a log line per
/// paper printed above it.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} papers  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        bar.set_style(style);
        bar.set_prefix("Analysing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .map(|mut m| m.remove(&index))
            .ok()
            .flatten()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_papers: usize) {
        self.bar.set_length(total_papers as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Analysing {total_papers} annotated papers…"))
        ));
    }

    fn on_paper_start(&self, index: usize, _total: usize, file: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(index, Instant::now());
        }
        self.bar.set_message(file.to_string());
    }

    fn on_paper_analyzed(&self, index: usize, total: usize, file: &str, mode: MatchMode) {
        let secs = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} {:>3}/{:<3} {}  {}  {}",
            green("✓"),
            index,
            total,
            file,
            dim(mode.as_str()),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_paper_skipped(&self, index: usize, total: usize, file: &str, reason: &str) {
        let _ = self.elapsed_secs(index);
        let msg: String = if reason.chars().count() > 80 {
            reason.chars().take(79).chain(std::iter::once('…')).collect()
        } else {
            reason.to_string()
        };
        self.bar.println(format!(
            "  {} {:>3}/{:<3} {}  {}",
            red("✗"),
            index,
            total,
            file,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, _analyzed: usize, _skipped: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"WORKFLOW:
  1. Put PDFs in papers_to_read/
  2. intro-analyzer scaffold
  3. Edit papers_annotation.json: set "type" (theoretical | empirical),
     "start_of_intro" and "end_of_intro" for each paper
  4. intro-analyzer analyze

EXAMPLES:
  # Write the default config.json, then tweak it
  intro-analyzer config init

  # Show the configuration that will be used
  intro-analyzer config show

  # Use a specific provider and model for one run
  intro-analyzer analyze --provider anthropic --model claude-sonnet-4-20250514

  # Machine-readable run summary
  intro-analyzer analyze --json > summary.json

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Provider when config.json names none
  EDGEQUAKE_MODEL         Model for EDGEQUAKE_LLM_PROVIDER (default: llm_settings.model)
  PDFIUM_LIB_PATH         Directory containing the pdfium shared library

  A .env file in the working directory is loaded on start.
"#;

/// Extract paper introductions with human markers and analyse them with an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "intro-analyzer",
    version,
    about = "Extract paper introductions with human markers and analyse them with an LLM",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    locations: Locations,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "INTRO_ANALYZER_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "INTRO_ANALYZER_QUIET")]
    quiet: bool,
}

#[derive(Args, Debug)]
struct Locations {
    /// Configuration file.
    #[arg(long, global = true, env = "INTRO_ANALYZER_CONFIG", default_value = "config.json")]
    config: PathBuf,

    /// Directory holding the source PDFs.
    #[arg(long, global = true, env = "INTRO_ANALYZER_PAPERS_DIR", default_value = "papers_to_read")]
    papers_dir: PathBuf,

    /// Annotation registry file.
    #[arg(long, global = true, env = "INTRO_ANALYZER_REGISTRY", default_value = "papers_annotation.json")]
    registry: PathBuf,

    /// Directory for raw introduction text files.
    #[arg(long, global = true, env = "INTRO_ANALYZER_RAW_DIR", default_value = "raw_intros")]
    raw_intro_dir: PathBuf,

    /// Directory for analysis files.
    #[arg(long, global = true, env = "INTRO_ANALYZER_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,
}

impl Locations {
    fn workspace(&self) -> WorkspacePaths {
        WorkspacePaths {
            papers_dir: self.papers_dir.clone(),
            registry_path: self.registry.clone(),
            raw_intro_dir: self.raw_intro_dir.clone(),
            output_dir: self.output_dir.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add a blank annotation record for every new PDF.
    Scaffold,

    /// Extract and analyse every annotated paper.
    Analyze(AnalyzeArgs),

    /// Inspect or create the configuration file.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// LLM model ID; overrides llm_settings.model.
    #[arg(long)]
    model: Option<String>,

    /// LLM provider (openai, anthropic, gemini, ollama, azure); overrides
    /// llm_settings.provider.
    #[arg(long)]
    provider: Option<String>,

    /// Print the run summary as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "INTRO_ANALYZER_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print the effective configuration as JSON.
    Show,
    /// Write the default configuration.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs while the progress bar is drawn.
    let show_progress = match &cli.command {
        Command::Analyze(a) => !cli.quiet && !a.no_progress && !a.json,
        _ => false,
    };
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

    match &cli.command {
        Command::Scaffold => run_scaffold(&cli).await,
        Command::Analyze(args) => run_analyze(&cli, args, show_progress).await,
        Command::Config(ConfigCommand::Show) => {
            let config = AnalysisConfig::load(&cli.locations.config)
                .context("Failed to load configuration")?;
            print!("{}", config.to_pretty_json()?);
            Ok(())
        }
        Command::Config(ConfigCommand::Init { force }) => {
            let path = &cli.locations.config;
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists; pass --force to overwrite it",
                    path.display()
                );
            }
            AnalysisConfig::default()
                .save(path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !cli.quiet {
                eprintln!("{} wrote {}", green("✔"), bold(&path.display().to_string()));
            }
            Ok(())
        }
    }
}

async fn run_scaffold(cli: &Cli) -> Result<()> {
    let paths = cli.locations.workspace();
    let report = scaffold(&paths, &PdfiumTextSource::new())
        .await
        .context("Scaffold failed")?;
    if !cli.quiet {
        print_scaffold_report(&report);
    }
    Ok(())
}

fn print_scaffold_report(report: &ScaffoldReport) {
    for key in &report.added {
        eprintln!("  {} {}", green("+"), key);
    }
    for (key, err) in &report.failures {
        eprintln!("  {} {}  {}", red("✗"), key, red(&err.to_string()));
    }
    eprintln!(
        "{} {} added, {} already annotated, {} unreadable  →  {}",
        if report.failures.is_empty() {
            green("✔")
        } else {
            yellow("⚠")
        },
        bold(&report.added.len().to_string()),
        report.already_present.len(),
        report.failures.len(),
        bold(&report.registry_path.display().to_string()),
    );
    if !report.added.is_empty() {
        eprintln!(
            "{}",
            dim("Fill in \"type\", \"start_of_intro\" and \"end_of_intro\", then run `intro-analyzer analyze`.")
        );
    }
}

async fn run_analyze(cli: &Cli, args: &AnalyzeArgs, show_progress: bool) -> Result<()> {
    let mut config =
        AnalysisConfig::load(&cli.locations.config).context("Failed to load configuration")?;
    if let Some(model) = &args.model {
        config.llm_settings.model = model.clone();
    }
    if let Some(provider) = &args.provider {
        config.llm_settings.provider = Some(provider.clone());
    }

    let mut builder = Analyzer::builder(config).paths(cli.locations.workspace());
    if show_progress {
        let cb: ProgressCallback = CliProgressCallback::new();
        builder = builder.progress_callback(cb);
    }
    let analyzer = builder.build().context("Failed to set up analysis")?;
    let summary = analyzer.run().await.context("Analysis failed")?;

    if args.json {
        let json = serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&summary);
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    eprintln!(
        "{} {} analysed, {} skipped  {}ms",
        if summary.skipped == 0 {
            green("✔")
        } else if summary.analyzed == 0 {
            red("✘")
        } else {
            yellow("⚠")
        },
        bold(&summary.analyzed.to_string()),
        summary.skipped,
        summary.duration_ms,
    );
    for (file, reason) in summary.skips() {
        eprintln!("   {} {}  {}", dim("-"), file, reason);
    }
    eprintln!(
        "   {} tokens in  /  {} tokens out  ({})",
        dim(&summary.total_input_tokens.to_string()),
        dim(&summary.total_output_tokens.to_string()),
        summary.model,
    );
}
