//! # paper-intro-analyzer
//!
//! Pull the introduction out of research-paper PDFs using markers a human
//! copied from each paper, then have an LLM summarise it under a fixed set of
//! headings chosen by paper type.
//!
//! ## Why human markers?
//!
//! Automatic section detection is unreliable across journals, working-paper
//! series and conference templates. A person can find "1. Introduction" and
//! "2. Related Literature" in seconds. The tool then only has to *find those
//! strings again* in pdfium's text, which is hard enough on its own: line
//! breaks, ligatures and dropped section numbers all get in the way. That
//! search is [`pipeline::extract`].
//!
//! ## Two stages
//!
//! ```text
//! papers_to_read/*.pdf
//!  │
//!  ├─ 1. scaffold   blank record per new PDF ──▶ papers_annotation.json
//!  │                            (a person fills in type + markers)
//!  └─ 2. analyze    for each ready record:
//!        ├─ text      pdfium page text (spawn_blocking)
//!        ├─ extract   exact → fuzzy → flexible → fallback
//!        ├─ raw       raw_intros/<stem>_intro.txt
//!        ├─ LLM       one call, then rate_limit_delay
//!        └─ output    output/<stem>_analysis.md
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use paper_intro_analyzer::{AnalysisConfig, Analyzer, WorkspacePaths};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AnalysisConfig::load("config.json")?;
//!     let analyzer = Analyzer::builder(config)
//!         .paths(WorkspacePaths::default())
//!         .build()?;
//!     let summary = analyzer.run().await?;
//!     eprintln!("{} analysed, {} skipped", summary.analyzed, summary.skipped);
//!     for (file, reason) in summary.skips() {
//!         eprintln!("  {file}: {reason}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `intro-analyzer` binary (clap, anyhow, tracing-subscriber, indicatif, dotenvy) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod registry;
pub mod scaffold;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{analyze_all, Analyzer, AnalyzerBuilder};
pub use config::{
    AnalysisConfig, ExtractionSettings, LlmSettings, OutputSettings, PromptTemplate,
    PromptTemplates, WorkspacePaths,
};
pub use error::{AnalyzerError, PaperError};
pub use output::{AnalyzedPaper, PaperOutcome, RunSummary, SkipReason, SkippedPaper};
pub use pipeline::extract::{extract_span, Extraction, ExtractionFailure, MatchMode};
pub use pipeline::llm::{AnalysisRequest, AnalysisResponse, CompletionClient, ProviderClient};
pub use pipeline::text::{DocumentText, PdfiumTextSource, TextSource};
pub use progress::{AnalysisProgressCallback, NoopProgressCallback, ProgressCallback};
pub use registry::{AnnotationRecord, PaperType, Registry};
pub use scaffold::{scaffold, ScaffoldReport};
pub use stream::{analyze_stream, OutcomeStream};
