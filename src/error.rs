//! Error types for the paper-intro-analyzer library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`AnalyzerError`]: **Fatal.** The run cannot start or cannot record
//!   its results (malformed config, unreadable registry, no LLM provider).
//!   Returned as `Err(AnalyzerError)` from [`crate::scaffold::scaffold`] and
//!   [`crate::analyze::analyze_all`] before any per-paper side effect.
//!
//! * [`PaperError`]: **Non-fatal.** A single paper could not be processed
//!   (bad PDF, blank annotation, markers not found, API failure). Stored in
//!   [`crate::output::PaperOutcome`] so the batch carries on and the final
//!   summary can list every skip with its reason.

use crate::pipeline::extract::ExtractionFailure;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the library.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// The configuration file exists but is not valid JSON for the schema.
    #[error("Malformed configuration file '{path}': {detail}")]
    MalformedConfig { path: PathBuf, detail: String },

    /// The configuration parsed but holds out-of-range values.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Input errors ──────────────────────────────────────────────────────
    /// The directory holding the source PDFs does not exist.
    #[error("Papers directory not found: '{path}'\nCreate it and put the PDFs to annotate inside.")]
    PapersDirNotFound { path: PathBuf },

    /// The annotation registry is missing when a run needs it.
    #[error("Annotation file not found: '{path}'\nRun `intro-analyzer scaffold` first and fill in the markers.")]
    RegistryNotFound { path: PathBuf },

    /// The annotation registry exists but cannot be parsed.
    #[error("Annotation file '{path}' is not a valid registry: {detail}")]
    MalformedRegistry { path: PathBuf, detail: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// No LLM provider could be created (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Reading or writing a run-level file failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected internal error (e.g. a blocking task panicked).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AnalyzerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AnalyzerError::Io {
            path: path.into(),
            source,
        }
    }
}

/// A non-fatal error for a single paper.
///
/// The variant name is what the run summary shows as the skip reason.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum PaperError {
    /// PDF missing, unreadable, corrupt or password-protected.
    #[error("PdfReadError: {detail}")]
    PdfRead { detail: String },

    /// `type` missing/invalid or a marker left blank.
    #[error("InvalidAnnotationError: {detail}")]
    InvalidAnnotation { detail: String },

    /// The span extractor could not produce an introduction.
    #[error("MarkerNotFoundError: {reason}")]
    MarkerNotFound { reason: ExtractionFailure },

    /// The LLM call failed. Not retried.
    #[error("ApiError: {detail}")]
    Api { detail: String },

    /// An output file could not be written.
    #[error("OutputWriteError: '{path}': {detail}")]
    OutputWrite { path: PathBuf, detail: String },
}

impl PaperError {
    /// Short, stable name of the error kind for summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            PaperError::PdfRead { .. } => "PdfReadError",
            PaperError::InvalidAnnotation { .. } => "InvalidAnnotationError",
            PaperError::MarkerNotFound { .. } => "MarkerNotFoundError",
            PaperError::Api { .. } => "ApiError",
            PaperError::OutputWrite { .. } => "OutputWriteError",
        }
    }
}

impl From<ExtractionFailure> for PaperError {
    fn from(reason: ExtractionFailure) -> Self {
        PaperError::MarkerNotFound { reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paper_error_display_leads_with_kind() {
        let e = PaperError::InvalidAnnotation {
            detail: "type is empty".into(),
        };
        assert!(e.to_string().starts_with("InvalidAnnotationError"));
        assert_eq!(e.kind(), "InvalidAnnotationError");
    }

    #[test]
    fn marker_not_found_display_uses_reason_code() {
        let e: PaperError = ExtractionFailure::StartMarkerNotFound.into();
        assert_eq!(e.to_string(), "MarkerNotFoundError: start_marker_not_found");
        assert_eq!(e.kind(), "MarkerNotFoundError");
    }

    #[test]
    fn registry_not_found_display_has_hint() {
        let e = AnalyzerError::RegistryNotFound {
            path: PathBuf::from("papers_annotation.json"),
        };
        let msg = e.to_string();
        assert!(msg.contains("papers_annotation.json"), "got: {msg}");
        assert!(msg.contains("scaffold"), "got: {msg}");
    }
}
