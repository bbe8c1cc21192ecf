//! Progress-callback trait for per-paper batch events.
//!
//! Inject an [`Arc<dyn AnalysisProgressCallback>`] via
//! [`crate::analyze::AnalyzerBuilder::progress_callback`] to receive events
//! as the batch moves through the registry.
//!
//! # Why callbacks instead of channels?
//!
//! The library does not care whether events end up in a terminal progress
//! bar, a log file or a test counter. A `Send + Sync` trait with no-op
//! defaults lets each caller override only what it needs.
//!
//! # Example
//!
//! ```rust
//! use paper_intro_analyzer::AnalysisProgressCallback;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct CountSkips(AtomicUsize);
//!
//! impl AnalysisProgressCallback for CountSkips {
//!     fn on_paper_skipped(&self, _index: usize, _total: usize, file: &str, reason: &str) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("skipped {file}: {reason}");
//!     }
//! }
//! ```

use crate::pipeline::extract::MatchMode;
use std::sync::Arc;

/// Called by the analysis batch as it processes each registry entry.
///
/// All methods have default no-op implementations. Indices are 1-based.
pub trait AnalysisProgressCallback: Send + Sync {
    /// Called once before the first paper.
    fn on_batch_start(&self, total_papers: usize) {
        let _ = total_papers;
    }

    /// Called before a paper is read.
    fn on_paper_start(&self, index: usize, total: usize, file: &str) {
        let _ = (index, total, file);
    }

    /// Called after a paper's analysis file has been written.
    fn on_paper_analyzed(&self, index: usize, total: usize, file: &str, mode: MatchMode) {
        let _ = (index, total, file, mode);
    }

    /// Called when a paper is skipped.
    ///
    /// `reason` is the `Display` form of the [`crate::PaperError`].
    fn on_paper_skipped(&self, index: usize, total: usize, file: &str, reason: &str) {
        let _ = (index, total, file, reason);
    }

    /// Called once after every paper has been attempted.
    fn on_batch_complete(&self, analyzed: usize, skipped: usize) {
        let _ = (analyzed, skipped);
    }
}

/// A no-op implementation, used when no callback is configured.
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}

/// Convenience alias for the type held by [`crate::analyze::Analyzer`].
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;
