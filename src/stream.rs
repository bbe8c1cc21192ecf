//! Streaming analysis API: emit one outcome per paper as it completes.
//!
//! ## Why stream?
//!
//! A batch of forty papers takes minutes of LLM time. [`Analyzer::run`]
//! returns only at the end; [`analyze_stream`] yields each [`PaperOutcome`]
//! as soon as that paper is written, so callers can show results live or stop
//! early by dropping the stream. Papers are still processed one at a time,
//! in file-name order.

use crate::analyze::Analyzer;
use crate::error::AnalyzerError;
use crate::output::PaperOutcome;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-paper outcomes.
pub type OutcomeStream = Pin<Box<dyn Stream<Item = PaperOutcome> + Send>>;

/// Start a run and stream its outcomes.
///
/// # Returns
/// - `Ok(OutcomeStream)`: one item per registry entry
/// - `Err(AnalyzerError)`: the papers directory or registry is unusable
///
/// Batch-level progress events (`on_batch_start`, `on_batch_complete`) are
/// not emitted; per-paper events are.
pub fn analyze_stream(analyzer: Analyzer) -> Result<OutcomeStream, AnalyzerError> {
    let registry = analyzer.load_registry()?;
    let total = registry.len();
    info!("Streaming analysis of {} paper(s)", total);

    let entries: Vec<_> = registry
        .iter()
        .map(|(k, r)| (k.to_string(), r))
        .collect();

    let s = stream::iter(entries.into_iter().enumerate()).then(move |(i, (key, record))| {
        let analyzer = analyzer.clone();
        async move { analyzer.process_entry(i + 1, total, &key, record).await }
    });
    Ok(Box::pin(s))
}
