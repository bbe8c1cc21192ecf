//! Output types and file writing for an analysis run.
//!
//! [`RunSummary`] is what the batch returns: one [`PaperOutcome`] per
//! registry entry plus totals. It is plain data and serialises to JSON so a
//! caller can archive it next to the analysis files.
//!
//! The rest of the module renders one analysis document and writes it, along
//! with the raw introduction, using a temp file and a rename so a crash never
//! leaves a truncated output file.

use crate::config::OutputSettings;
use crate::error::PaperError;
use crate::pipeline::extract::MatchMode;
use crate::pipeline::input::file_stem;
use crate::registry::PaperType;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Why a paper was skipped.
pub type SkipReason = PaperError;

/// A paper whose analysis was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedPaper {
    pub file: String,
    pub title: String,
    pub paper_type: PaperType,
    pub match_mode: MatchMode,
    /// The introduction hit `max_intro_length` and was cut.
    pub truncated: bool,
    /// Introduction length in characters.
    pub intro_chars: usize,
    /// `None` when `save_raw_intros` is off.
    pub raw_intro_path: Option<PathBuf>,
    pub analysis_path: PathBuf,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
}

/// A paper that was not analysed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedPaper {
    pub file: String,
    pub reason: SkipReason,
}

/// The result for one registry entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PaperOutcome {
    Analyzed(AnalyzedPaper),
    Skipped(SkippedPaper),
}

impl PaperOutcome {
    pub fn file(&self) -> &str {
        match self {
            PaperOutcome::Analyzed(a) => &a.file,
            PaperOutcome::Skipped(s) => &s.file,
        }
    }

    pub fn is_analyzed(&self) -> bool {
        matches!(self, PaperOutcome::Analyzed(_))
    }

    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match self {
            PaperOutcome::Analyzed(_) => None,
            PaperOutcome::Skipped(s) => Some(&s.reason),
        }
    }
}

/// Totals and per-paper outcomes of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub analyzed: usize,
    pub skipped: usize,
    pub outcomes: Vec<PaperOutcome>,
    pub total_input_tokens: usize,
    pub total_output_tokens: usize,
    pub duration_ms: u64,
    pub model: String,
}

impl RunSummary {
    pub fn from_outcomes(outcomes: Vec<PaperOutcome>, model: String, duration_ms: u64) -> Self {
        let mut analyzed = 0;
        let mut total_input_tokens = 0;
        let mut total_output_tokens = 0;
        for outcome in &outcomes {
            if let PaperOutcome::Analyzed(a) = outcome {
                analyzed += 1;
                total_input_tokens += a.input_tokens;
                total_output_tokens += a.output_tokens;
            }
        }
        Self {
            analyzed,
            skipped: outcomes.len() - analyzed,
            outcomes,
            total_input_tokens,
            total_output_tokens,
            duration_ms,
            model,
        }
    }

    /// `(file, reason)` for every skipped paper, in processing order.
    pub fn skips(&self) -> impl Iterator<Item = (&str, &SkipReason)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.skip_reason().map(|r| (o.file(), r)))
    }
}

// ── Rendering ────────────────────────────────────────────────────────────

/// Everything the metadata header shows about a paper.
#[derive(Debug, Clone)]
pub struct AnalysisHeader<'a> {
    pub title: &'a str,
    pub file: &'a str,
    pub paper_type: PaperType,
    pub match_mode: MatchMode,
    pub truncated: bool,
    pub model: &'a str,
    pub analyzed_at: DateTime<Local>,
}

/// Render the analysis document.
///
/// With `markdown_format` the metadata block is markdown with a `---` rule
/// and a closing footer; without it the same fields are emitted as plain
/// `Key: value` lines and no footer. `include_metadata = false` leaves only
/// the analysis text.
pub fn render_analysis(header: &AnalysisHeader<'_>, analysis: &str, settings: &OutputSettings) -> String {
    let analysis = analysis.trim_end();
    let date = header.analyzed_at.format("%Y-%m-%d %H:%M:%S");
    let mode = if header.truncated {
        format!("{} (truncated)", header.match_mode)
    } else {
        header.match_mode.to_string()
    };

    if !settings.include_metadata {
        return format!("{analysis}\n");
    }

    if settings.markdown_format {
        format!(
            "# {title}\n\n\
**Source:** {file}\n\n\
**Paper Type:** {ptype}\n\n\
**Match Mode:** {mode}\n\n\
**Model:** {model}\n\n\
**Analysis Date:** {date}\n\n\
---\n\n\
{analysis}\n\n\
---\n\n\
*This analysis was generated automatically using {model}.*\n",
            title = header.title,
            file = header.file,
            ptype = header.paper_type.label(),
            model = header.model,
        )
    } else {
        format!(
            "Title: {title}\n\
Source: {file}\n\
Paper Type: {ptype}\n\
Match Mode: {mode}\n\
Model: {model}\n\
Analysis Date: {date}\n\n\
{analysis}\n",
            title = header.title,
            file = header.file,
            ptype = header.paper_type.label(),
            model = header.model,
        )
    }
}

// ── Paths ────────────────────────────────────────────────────────────────

/// `<dir>/<stem>_intro.txt`
pub fn raw_intro_path(dir: &Path, file_key: &str) -> PathBuf {
    dir.join(format!("{}_intro.txt", file_stem(file_key)))
}

/// `<dir>/<stem>_analysis.md`, or `.txt` without `markdown_format`.
pub fn analysis_path(dir: &Path, file_key: &str, settings: &OutputSettings) -> PathBuf {
    let ext = if settings.markdown_format { "md" } else { "txt" };
    dir.join(format!("{}_analysis.{ext}", file_stem(file_key)))
}

// ── Writing ──────────────────────────────────────────────────────────────

/// Write `contents` to `path` through a sibling temp file and a rename,
/// creating the parent directory if needed.
pub async fn write_atomic(path: &Path, contents: &str) -> Result<(), PaperError> {
    let fail = |e: std::io::Error| PaperError::OutputWrite {
        path: path.to_path_buf(),
        detail: e.to_string(),
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, contents).await.map_err(fail)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(fail)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn header() -> AnalysisHeader<'static> {
        AnalysisHeader {
            title: "Trade and Wages",
            file: "trade.pdf",
            paper_type: PaperType::Empirical,
            match_mode: MatchMode::Fuzzy,
            truncated: false,
            model: "gpt-4.1-mini",
            analyzed_at: Local.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn markdown_with_metadata() {
        let out = render_analysis(&header(), "## Data\nCensus.\n", &OutputSettings::default());
        assert!(out.starts_with("# Trade and Wages\n\n**Source:** trade.pdf\n\n"));
        assert!(out.contains("**Paper Type:** Empirical"));
        assert!(out.contains("**Match Mode:** fuzzy"));
        assert!(out.contains("**Analysis Date:** 2024-03-01 09:30:00"));
        assert!(out.contains("---\n\n## Data\nCensus.\n\n---\n\n"));
        assert!(out.ends_with("*This analysis was generated automatically using gpt-4.1-mini.*\n"));
    }

    #[test]
    fn plain_text_has_no_markdown_markup() {
        let settings = OutputSettings {
            markdown_format: false,
            ..Default::default()
        };
        let mut h = header();
        h.truncated = true;
        let out = render_analysis(&h, "Body", &settings);
        assert!(out.starts_with("Title: Trade and Wages\nSource: trade.pdf\n"));
        assert!(out.contains("Match Mode: fuzzy (truncated)\n"));
        assert!(!out.contains("**"));
        assert!(!out.contains("---"));
        assert!(out.ends_with("\n\nBody\n"));
    }

    #[test]
    fn metadata_off_leaves_only_analysis() {
        let settings = OutputSettings {
            include_metadata: false,
            ..Default::default()
        };
        assert_eq!(render_analysis(&header(), "Body\n\n", &settings), "Body\n");
    }

    #[test]
    fn output_paths_follow_file_stem() {
        let dir = Path::new("out");
        assert_eq!(raw_intro_path(dir, "smith.pdf"), dir.join("smith_intro.txt"));
        let plain = OutputSettings {
            markdown_format: false,
            ..Default::default()
        };
        assert_eq!(
            analysis_path(dir, "smith.pdf", &OutputSettings::default()),
            dir.join("smith_analysis.md")
        );
        assert_eq!(analysis_path(dir, "smith.pdf", &plain), dir.join("smith_analysis.txt"));
    }

    #[test]
    fn summary_counts_and_skips() {
        let outcomes = vec![
            PaperOutcome::Skipped(SkippedPaper {
                file: "a.pdf".into(),
                reason: PaperError::InvalidAnnotation {
                    detail: "paper type not specified".into(),
                },
            }),
            PaperOutcome::Analyzed(AnalyzedPaper {
                file: "b.pdf".into(),
                title: "B".into(),
                paper_type: PaperType::Theoretical,
                match_mode: MatchMode::ExactCaseInsensitive,
                truncated: false,
                intro_chars: 10,
                raw_intro_path: None,
                analysis_path: PathBuf::from("output/b_analysis.md"),
                input_tokens: 100,
                output_tokens: 40,
                duration_ms: 5,
            }),
        ];
        let s = RunSummary::from_outcomes(outcomes, "m".into(), 12);
        assert_eq!((s.analyzed, s.skipped), (1, 1));
        assert_eq!((s.total_input_tokens, s.total_output_tokens), (100, 40));
        let skips: Vec<_> = s.skips().map(|(f, r)| (f, r.kind())).collect();
        assert_eq!(skips, vec![("a.pdf", "InvalidAnnotationError")]);

        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["outcomes"][0]["status"], "skipped");
        assert_eq!(json["outcomes"][1]["match_mode"], "exact_case_insensitive");
    }

    #[tokio::test]
    async fn atomic_write_creates_dirs_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("x_analysis.md");
        write_atomic(&path, "hello\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\n");
        assert_eq!(std::fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }
}
