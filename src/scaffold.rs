//! Stage one: create a blank annotation record for every new PDF.
//!
//! Re-running is always safe. Existing records are never touched, so the
//! scaffolder can be run again after adding papers without losing any markers
//! that were already filled in. A PDF that cannot be read is reported and
//! left out of the registry; it will be retried on the next run.

use crate::config::WorkspacePaths;
use crate::error::{AnalyzerError, PaperError};
use crate::pipeline::input::{file_key, file_stem, list_pdfs};
use crate::pipeline::text::{DocumentText, TextSource};
use crate::registry::{AnnotationRecord, Registry};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

/// How many non-empty lines at the top of the document are considered for
/// the title.
const TITLE_SCAN_LINES: usize = 15;
const TITLE_MIN_CHARS: usize = 10;
const TITLE_MAX_CHARS: usize = 200;

/// What a scaffold run did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScaffoldReport {
    pub registry_path: PathBuf,
    /// Keys of records created by this run.
    pub added: Vec<String>,
    /// Keys of PDFs that already had a record.
    pub already_present: Vec<String>,
    /// PDFs that could not be read, with the reason.
    pub failures: Vec<(String, PaperError)>,
    /// Whether the registry file was (re)written.
    pub registry_written: bool,
}

/// Scan `paths.papers_dir`, add a blank record for each unseen PDF and save
/// the registry.
///
/// The registry is only rewritten when a record was added or the file did not
/// exist yet, so an idle re-run leaves it byte-for-byte untouched.
pub async fn scaffold(
    paths: &WorkspacePaths,
    source: &dyn TextSource,
) -> Result<ScaffoldReport, AnalyzerError> {
    let pdfs = list_pdfs(&paths.papers_dir)?;
    let registry_existed = paths.registry_path.exists();
    let mut registry = Registry::load_or_default(&paths.registry_path)?;
    info!(
        "Found {} PDF file(s); registry holds {} record(s)",
        pdfs.len(),
        registry.len()
    );

    let mut report = ScaffoldReport {
        registry_path: paths.registry_path.clone(),
        ..Default::default()
    };

    for pdf in &pdfs {
        let key = file_key(pdf);
        if registry.contains(&key) {
            report.already_present.push(key);
            continue;
        }

        match source.read(pdf).await {
            Ok(doc) => {
                let title = choose_title(&doc, file_stem(&key));
                info!("{key}: new record, title \"{title}\"");
                registry.insert_if_absent(key.clone(), AnnotationRecord::blank(title));
                report.added.push(key);
            }
            Err(e) => {
                warn!("{key}: skipped, {e}");
                report.failures.push((key, e));
            }
        }
    }

    if !report.added.is_empty() || !registry_existed {
        registry.save(&paths.registry_path)?;
        report.registry_written = true;
    }
    Ok(report)
}

/// The PDF's own Title metadata when it looks like a real title, otherwise
/// the text heuristic of [`guess_title`].
pub fn choose_title(doc: &DocumentText, stem: &str) -> String {
    match doc.metadata_title.as_deref() {
        Some(t) if is_plausible_metadata_title(t) => t.trim().to_string(),
        _ => guess_title(&doc.text, stem),
    }
}

static RE_TOOL_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(microsoft (word|powerpoint) - |untitled\b)|\.(docx?|tex|dvi|pdf|ps)$")
        .expect("static regex")
});

/// Authoring tools often stamp the source file name as Title.
fn is_plausible_metadata_title(title: &str) -> bool {
    let t = title.trim();
    t.chars().count() >= 3 && t.chars().any(char::is_alphabetic) && !RE_TOOL_TITLE.is_match(t)
}

static RE_HEADER_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)arxiv:|\bdoi\b|https?://|www\.|^page\s+\d+|^\d+\s*(of|/)\s*\d+$")
        .expect("static regex")
});

/// First plausible title line among the top of the text, else `stem`.
///
/// A line qualifies when, trimmed, it is 10–200 characters long, contains a
/// letter and is not a journal, arXiv, DOI, URL or page-number header.
pub fn guess_title(text: &str, stem: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(TITLE_SCAN_LINES)
        .find(|l| {
            let n = l.chars().count();
            (TITLE_MIN_CHARS..=TITLE_MAX_CHARS).contains(&n)
                && l.chars().any(char::is_alphabetic)
                && !RE_HEADER_LINE.is_match(l)
        })
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_else(|| stem.to_string())
}
