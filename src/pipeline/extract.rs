//! Marker-based span extraction: the heart of the crate.
//!
//! Given the full text of a paper and the two marker strings a human copied
//! out of it, find the introduction that lies between them.
//!
//! ## Why a cascade?
//!
//! Markers are copied by hand from a PDF viewer, while the document text comes
//! from pdfium. The two rarely agree byte for byte: line breaks become spaces,
//! ligatures and dashes differ, section numbers get dropped. Each strategy
//! below tolerates one more class of noise than the previous one, and the
//! first strategy that yields a usable `(start, end)` pair wins, so a clean
//! marker is always matched by the strictest rule.
//!
//! ```text
//! exact ──▶ fuzzy (whitespace ─▶ punctuation ─▶ line similarity)
//!       ──▶ flexible (marker variants through the same passes)
//!       ──▶ length fallback
//! ```
//!
//! All offsets in the result point into the *original* text. Normalised views
//! keep a per-byte table back to the source characters, so a match found in
//! a collapsed, lower-cased view still yields exact original slices.

use crate::config::ExtractionSettings;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use tracing::debug;

// ── Result types ─────────────────────────────────────────────────────────

/// Which strategy produced an [`Extraction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    ExactCaseSensitive,
    ExactCaseInsensitive,
    Fuzzy,
    Flexible,
    FallbackLength,
}

impl MatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMode::ExactCaseSensitive => "exact_case_sensitive",
            MatchMode::ExactCaseInsensitive => "exact_case_insensitive",
            MatchMode::Fuzzy => "fuzzy",
            MatchMode::Flexible => "flexible",
            MatchMode::FallbackLength => "fallback_length",
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why no introduction could be extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionFailure {
    /// No strategy located the start marker and no fallback applies.
    StartMarkerNotFound,
    /// The start marker was found, no end marker followed it, and the length
    /// fallback is disabled.
    EndMarkerNotFound,
    /// A span was found but holds only whitespace.
    EmptyExtraction,
}

impl fmt::Display for ExtractionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExtractionFailure::StartMarkerNotFound => "start_marker_not_found",
            ExtractionFailure::EndMarkerNotFound => "end_marker_not_found",
            ExtractionFailure::EmptyExtraction => "empty_extraction",
        })
    }
}

/// A successfully extracted introduction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// The introduction text, after the length clamp.
    pub text: String,
    pub mode: MatchMode,
    /// Byte offset of the first character of `text` in the document.
    pub start: usize,
    /// Byte offset one past the last character of `text` in the document.
    pub end: usize,
    /// `text` was cut to `max_intro_length` characters.
    pub truncated: bool,
}

// ── Entry point ──────────────────────────────────────────────────────────

/// Extract the text strictly between `start_marker` and `end_marker`.
///
/// Markers that are empty or whitespace-only count as not provided. A missing
/// end marker means "to the end of the document". A missing start marker can
/// only be served by the length fallback.
///
/// Lengths (`max_intro_length`, `fallback_intro_length`) are counted in
/// characters and never split one.
pub fn extract_span(
    text: &str,
    start_marker: &str,
    end_marker: &str,
    settings: &ExtractionSettings,
) -> Result<Extraction, ExtractionFailure> {
    let start_marker = Some(start_marker).filter(|m| !m.trim().is_empty());
    let end_marker = Some(end_marker).filter(|m| !m.trim().is_empty());

    let doc = Document::new(text, settings);
    // Content start of the first strategy that located the start marker.
    let mut first_start: Option<usize> = None;

    if let Some(start_marker) = start_marker {
        for (mode, strategy) in strategies(settings) {
            let Some(b) = strategy(&doc, start_marker, end_marker) else {
                continue;
            };
            first_start.get_or_insert(b.content_start);
            if let Some(content_end) = b.content_end {
                debug!(
                    mode = %mode,
                    start = b.content_start,
                    end = content_end,
                    "Markers located"
                );
                return finish(text, b.content_start, content_end, mode, settings);
            }
        }
    }

    let Some(fallback) = settings.fallback_len() else {
        return Err(match (start_marker, first_start) {
            (Some(_), Some(_)) => ExtractionFailure::EndMarkerNotFound,
            _ => ExtractionFailure::StartMarkerNotFound,
        });
    };

    let from = first_start.unwrap_or(0);
    let end = from + byte_len_of_chars(&text[from..], fallback);
    debug!(
        from,
        end,
        start_found = first_start.is_some(),
        "Falling back to fixed-length window"
    );
    finish(text, from, end, MatchMode::FallbackLength, settings)
}

/// Slice, reject blank spans, then apply the `max_intro_length` clamp.
fn finish(
    text: &str,
    start: usize,
    end: usize,
    mode: MatchMode,
    settings: &ExtractionSettings,
) -> Result<Extraction, ExtractionFailure> {
    let span = &text[start..end];
    if span.trim().is_empty() {
        return Err(ExtractionFailure::EmptyExtraction);
    }
    let kept = byte_len_of_chars(span, settings.max_intro_length);
    Ok(Extraction {
        text: span[..kept].to_string(),
        mode,
        start,
        end: start + kept,
        truncated: kept < span.len(),
    })
}

/// Byte length of the first `n` characters of `s` (all of `s` if shorter).
fn byte_len_of_chars(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map_or(s.len(), |(i, _)| i)
}

// ── Strategy chain ───────────────────────────────────────────────────────

/// Located boundaries in original byte offsets.
///
/// `content_end` is `None` when the start marker was found but no end marker
/// follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Boundaries {
    content_start: usize,
    content_end: Option<usize>,
}

type Strategy = fn(&Document<'_>, &str, Option<&str>) -> Option<Boundaries>;

fn strategies(settings: &ExtractionSettings) -> Vec<(MatchMode, Strategy)> {
    let exact_mode = if settings.case_sensitive {
        MatchMode::ExactCaseSensitive
    } else {
        MatchMode::ExactCaseInsensitive
    };
    let mut chain: Vec<(MatchMode, Strategy)> = vec![(exact_mode, exact as Strategy)];
    if settings.fuzzy_matching {
        chain.push((MatchMode::Fuzzy, fuzzy as Strategy));
    }
    if settings.search_flexibility {
        chain.push((MatchMode::Flexible, flexible as Strategy));
    }
    chain
}

fn exact(doc: &Document<'_>, start: &str, end: Option<&str>) -> Option<Boundaries> {
    doc.bounds(Pass::Exact, &Needle::Text(start.into()), end)
}

fn fuzzy(doc: &Document<'_>, start: &str, end: Option<&str>) -> Option<Boundaries> {
    run_passes(doc, FUZZY_PASSES, &Needle::Text(start.into()), end)
}

fn flexible(doc: &Document<'_>, start: &str, end: Option<&str>) -> Option<Boundaries> {
    let settings = doc.settings;
    let passes: &[Pass] = if settings.fuzzy_matching {
        ALL_PASSES
    } else {
        &[Pass::Exact]
    };

    let mut starts: Vec<Needle<'_>> = vec![Needle::Text(start.into())];
    starts.extend(
        marker_variants(start, settings.flexible_prefix_words)
            .into_iter()
            .map(|v| Needle::Text(v.into())),
    );
    if start.to_lowercase().contains("introduction") {
        starts.push(Needle::IntroHeading);
    }

    let mut ends: Vec<Option<String>> = vec![end.map(str::to_string)];
    if let Some(end) = end {
        ends.extend(
            marker_variants(end, settings.flexible_prefix_words)
                .into_iter()
                .map(Some),
        );
    }

    let mut first: Option<Boundaries> = None;
    for (si, s) in starts.iter().enumerate() {
        for (ei, e) in ends.iter().enumerate() {
            // The unmodified pair already went through exact and fuzzy.
            if si == 0 && ei == 0 {
                continue;
            }
            if let Some(b) = run_passes(doc, passes, s, e.as_deref()) {
                if b.content_end.is_some() {
                    return Some(b);
                }
                first.get_or_insert(b);
            }
        }
    }
    first
}

/// Try `passes` in order; the first complete pair wins, otherwise the first
/// start-only hit is returned.
fn run_passes(
    doc: &Document<'_>,
    passes: &[Pass],
    start: &Needle<'_>,
    end: Option<&str>,
) -> Option<Boundaries> {
    let mut first: Option<Boundaries> = None;
    for &pass in passes {
        if let Some(b) = doc.bounds(pass, start, end) {
            if b.content_end.is_some() {
                return Some(b);
            }
            first.get_or_insert(b);
        }
    }
    first
}

// ── Passes ───────────────────────────────────────────────────────────────

/// One way of locating a single marker in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    /// Literal substring, case-folded unless `case_sensitive`.
    Exact,
    /// Whitespace runs collapsed, case-folded.
    Whitespace,
    /// Punctuation treated as whitespace, case-folded.
    Punctuation,
    /// Whitespace pass, then the most similar document line.
    Similarity,
}

const FUZZY_PASSES: &[Pass] = &[Pass::Whitespace, Pass::Punctuation, Pass::Similarity];
const ALL_PASSES: &[Pass] = &[
    Pass::Exact,
    Pass::Whitespace,
    Pass::Punctuation,
    Pass::Similarity,
];

/// What to look for as the start boundary.
#[derive(Debug, Clone)]
enum Needle<'a> {
    Text(Cow<'a, str>),
    /// A generic introduction heading line, found by pattern.
    IntroHeading,
}

static RE_INTRO_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?mi)^[ \t]*(?:(?:\d+|[ivx]+)\.?[ \t]+)?introduction[ \t]*\r?$")
        .expect("static regex")
});

static RE_SECTION_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:(?i:section|chapter)\s+)?(?:\d+(?:\.\d+)*\.?|(?i:x{1,3}(?:ix|iv|v?i{0,3})|ix|iv|vi{0,3}|i{1,3})[.)]|[A-Z][.)])\s+",
    )
        .expect("static regex")
});

/// The document text plus its normalised views.
struct Document<'a> {
    text: &'a str,
    settings: &'a ExtractionSettings,
    folded: Normalized,
    whitespace: Normalized,
    punctuation: Normalized,
}

impl<'a> Document<'a> {
    fn new(text: &'a str, settings: &'a ExtractionSettings) -> Self {
        Self {
            text,
            settings,
            folded: Normalized::new(text, Fold::Case),
            whitespace: Normalized::new(text, Fold::CaseAndWhitespace),
            punctuation: Normalized::new(text, Fold::CaseWhitespaceAndPunctuation),
        }
    }

    /// Locate `start`, then `end` after it, with a single pass.
    fn bounds(&self, pass: Pass, start: &Needle<'_>, end: Option<&str>) -> Option<Boundaries> {
        let (_, content_start) = match start {
            Needle::Text(marker) => self.locate(pass, marker, 0)?,
            Needle::IntroHeading if pass == Pass::Exact => {
                let m = RE_INTRO_HEADING.find(self.text)?;
                (m.start(), m.end())
            }
            Needle::IntroHeading => return None,
        };

        let content_end = match end {
            None => Some(self.text.len()),
            Some(end) => self
                .locate(pass, end, content_start)
                .map(|(s, _)| s)
                .filter(|&s| s > content_start),
        };
        Some(Boundaries {
            content_start,
            content_end,
        })
    }

    /// Byte range of the first match of `marker` starting at or after `from`.
    fn locate(&self, pass: Pass, marker: &str, from: usize) -> Option<(usize, usize)> {
        match pass {
            Pass::Exact if self.settings.case_sensitive => self.text[from..]
                .find(marker)
                .map(|i| (from + i, from + i + marker.len())),
            Pass::Exact => self.folded.find(&Normalized::new(marker, Fold::Case).text, from),
            Pass::Whitespace => self.find_collapsed(marker, from),
            Pass::Punctuation => {
                let needle = Normalized::new(marker, Fold::CaseWhitespaceAndPunctuation);
                self.punctuation.find(&needle.text, from)
            }
            Pass::Similarity => self
                .find_collapsed(marker, from)
                .or_else(|| self.most_similar_line(marker, from)),
        }
    }

    fn find_collapsed(&self, marker: &str, from: usize) -> Option<(usize, usize)> {
        let needle = Normalized::new(marker, Fold::CaseAndWhitespace);
        self.whitespace.find(&needle.text, from)
    }

    /// The document line starting at or after `from` that is most similar to
    /// `marker`, if its similarity reaches `fuzzy_threshold`.
    fn most_similar_line(&self, marker: &str, from: usize) -> Option<(usize, usize)> {
        let target = collapse_lower(marker);
        if target.is_empty() {
            return None;
        }
        let threshold = self.settings.fuzzy_threshold;
        let target_len = target.chars().count();

        let mut best: Option<(f64, usize, usize)> = None;
        for (line_start, line) in lines_with_offsets(self.text) {
            if line_start < from {
                continue;
            }
            let candidate = collapse_lower(line);
            if candidate.is_empty() {
                continue;
            }
            // Levenshtein distance is at least the length difference.
            let len = candidate.chars().count();
            let longest = len.max(target_len) as f64;
            if 1.0 - (len.abs_diff(target_len) as f64) / longest < threshold {
                continue;
            }
            let score = strsim::normalized_levenshtein(&candidate, &target);
            if score >= threshold && best.map_or(true, |(b, _, _)| score > b) {
                best = Some((score, line_start, line_start + line.len()));
            }
        }
        best.map(|(_, s, e)| (s, e))
    }
}

/// Lines of `text` with their byte offsets, without `\n` or a trailing `\r`.
fn lines_with_offsets(text: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut offset = 0;
    text.split('\n').map(move |line| {
        let start = offset;
        offset += line.len() + 1;
        (start, line.strip_suffix('\r').unwrap_or(line))
    })
}

fn collapse_lower(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

// ── Marker variants ──────────────────────────────────────────────────────

/// Loosened forms of a marker, most specific first: section number removed,
/// cut to the first `prefix_words` words, and both. Never contains the
/// marker itself or an empty string.
fn marker_variants(marker: &str, prefix_words: usize) -> Vec<String> {
    let original = marker.trim();
    let stripped = strip_section_prefix(original);
    let candidates = [
        stripped.to_string(),
        first_words(original, prefix_words),
        first_words(stripped, prefix_words),
    ];

    let mut out: Vec<String> = Vec::new();
    for c in candidates {
        if !c.is_empty() && c != original && !out.contains(&c) {
            out.push(c);
        }
    }
    out
}

/// `"1. Introduction"` → `"Introduction"`, `"IV. Results"` → `"Results"`.
/// Returns the input unchanged when nothing would be left.
fn strip_section_prefix(marker: &str) -> &str {
    match RE_SECTION_PREFIX.find(marker) {
        Some(m) if m.end() < marker.len() => marker[m.end()..].trim(),
        _ => marker,
    }
}

fn first_words(s: &str, n: usize) -> String {
    s.split_whitespace().take(n).collect::<Vec<_>>().join(" ")
}

// ── Normalised views ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fold {
    Case,
    CaseAndWhitespace,
    CaseWhitespaceAndPunctuation,
}

/// A transformed copy of a text with a byte-level map back to the source.
///
/// `spans[i]` is the byte range of the source character that produced byte
/// `i` of `text`. Every byte of one output character shares the same span,
/// so `spans` is non-decreasing and char boundaries line up.
#[derive(Debug, Clone)]
struct Normalized {
    text: String,
    spans: Vec<(usize, usize)>,
}

impl Normalized {
    fn new(src: &str, fold: Fold) -> Self {
        let collapse = fold != Fold::Case;
        let mut text = String::with_capacity(src.len());
        let mut spans = Vec::with_capacity(src.len());
        let mut pending_gap: Option<(usize, usize)> = None;

        let mut push = |text: &mut String, c: char, span: (usize, usize)| {
            let before = text.len();
            text.push(c);
            spans.extend(std::iter::repeat(span).take(text.len() - before));
        };

        for (i, ch) in src.char_indices() {
            let span = (i, i + ch.len_utf8());
            let is_gap = match fold {
                Fold::Case => false,
                Fold::CaseAndWhitespace => ch.is_whitespace(),
                Fold::CaseWhitespaceAndPunctuation => !ch.is_alphanumeric(),
            };
            if collapse && is_gap {
                match pending_gap.as_mut() {
                    Some(gap) => gap.1 = span.1,
                    None => pending_gap = Some(span),
                }
                continue;
            }
            // Leading and trailing gaps are dropped.
            if let Some(gap) = pending_gap.take() {
                if !text.is_empty() {
                    push(&mut text, ' ', gap);
                }
            }
            for lower in ch.to_lowercase() {
                push(&mut text, lower, span);
            }
        }
        Self { text, spans }
    }

    /// Original byte range of the first occurrence of `needle` whose source
    /// starts at or after original offset `from`.
    fn find(&self, needle: &str, from: usize) -> Option<(usize, usize)> {
        if needle.is_empty() {
            return None;
        }
        let n_from = self.spans.partition_point(|&(s, _)| s < from);
        let i = self.text[n_from..].find(needle)? + n_from;
        let j = i + needle.len();
        Some((self.spans[i].0, self.spans[j - 1].1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ExtractionSettings {
        ExtractionSettings::default()
    }

    fn strict() -> ExtractionSettings {
        ExtractionSettings {
            fuzzy_matching: false,
            search_flexibility: false,
            fallback_intro_length: None,
            ..ExtractionSettings::default()
        }
    }

    #[test]
    fn text_strictly_between_markers() {
        let doc = "Title\nAbstract. 1. Introduction\nPaper studies X. 2. The Model more";
        let r = extract_span(doc, "1. Introduction", "2. The Model", &settings()).unwrap();
        assert_eq!(r.text, "\nPaper studies X. ");
        assert_eq!(r.mode, MatchMode::ExactCaseInsensitive);
        assert_eq!(&doc[r.start..r.end], r.text);
        assert!(!r.truncated);
    }

    #[test]
    fn case_sensitive_exact_is_tagged() {
        let s = ExtractionSettings {
            case_sensitive: true,
            ..strict()
        };
        let r = extract_span("A Intro body B end", "Intro", "B end", &s).unwrap();
        assert_eq!(r.text, " body ");
        assert_eq!(r.mode, MatchMode::ExactCaseSensitive);
    }

    #[test]
    fn case_sensitive_rejects_case_mismatch() {
        let s = ExtractionSettings {
            case_sensitive: true,
            ..strict()
        };
        let err = extract_span("INTRODUCTION body", "Introduction", "x", &s).unwrap_err();
        assert_eq!(err, ExtractionFailure::StartMarkerNotFound);
    }

    #[test]
    fn case_insensitive_matches_differing_case() {
        let r = extract_span(
            "1. INTRODUCTION We study. 2. THE MODEL",
            "1. Introduction",
            "2. The Model",
            &strict(),
        )
        .unwrap();
        assert_eq!(r.text, " We study. ");
    }

    #[test]
    fn end_marker_before_start_is_ignored() {
        let doc = "2. Model (overview)\n1. Introduction body text 2. Model rest";
        let r = extract_span(doc, "1. Introduction", "2. Model", &strict()).unwrap();
        assert_eq!(r.text, " body text ");
    }

    #[test]
    fn first_start_then_first_end_after_it() {
        let doc = "S a E b S c E d";
        let r = extract_span(doc, "S", "E", &strict()).unwrap();
        assert_eq!(r.text, " a ");
    }

    #[test]
    fn whitespace_noise_matches_fuzzily() {
        let doc = "Abstract\n1. Introduction\nWe study X.\n2. The Model\n";
        let r = extract_span(doc, "1.  Introduction", "2.\nThe   Model", &settings()).unwrap();
        assert_eq!(r.mode, MatchMode::Fuzzy);
        assert_eq!(r.text, "\nWe study X.\n");
    }

    #[test]
    fn punctuation_noise_matches_fuzzily() {
        let doc = "1 Introduction: we study trade. 2 Model";
        let r = extract_span(doc, "1. Introduction", "2. Model", &settings()).unwrap();
        assert_eq!(r.mode, MatchMode::Fuzzy);
        assert!(r.text.contains("we study trade"), "got {:?}", r.text);
    }

    #[test]
    fn similar_line_matches_fuzzily() {
        let doc = "Header\nIntroductoin to the Problem\nbody of intro\nRelated Work\n";
        let r = extract_span(
            doc,
            "Introduction to the Problem",
            "Related Work",
            &settings(),
        )
        .unwrap();
        assert_eq!(r.mode, MatchMode::Fuzzy);
        assert_eq!(r.text, "\nbody of intro\n");
    }

    #[test]
    fn flexible_drops_section_number() {
        let doc = "1. Introduction\nPaper studies X.\nThe Model\nLet there be agents.";
        let r = extract_span(doc, "1. Introduction", "2. The Model", &settings()).unwrap();
        assert_eq!(r.mode, MatchMode::Flexible);
        assert_eq!(r.text, "\nPaper studies X.\n");
    }

    #[test]
    fn flexible_uses_first_words() {
        let doc = "Intro We begin here and argue. Next Section Starts";
        let s = ExtractionSettings {
            fuzzy_matching: false,
            fallback_intro_length: None,
            flexible_prefix_words: 2,
            ..ExtractionSettings::default()
        };
        let r = extract_span(doc, "Intro We begin there", "Next Section Begins", &s).unwrap();
        assert_eq!(r.mode, MatchMode::Flexible);
        assert_eq!(r.text, " begin here and argue. ");
    }

    #[test]
    fn flexible_finds_generic_intro_heading() {
        let doc = "Abstract\nI. INTRODUCTION\nText of intro.\nII. DATA\n";
        let s = ExtractionSettings {
            fallback_intro_length: None,
            ..ExtractionSettings::default()
        };
        let r = extract_span(doc, "Section One: Introduction Overview", "II. DATA", &s).unwrap();
        assert_eq!(r.mode, MatchMode::Flexible);
        assert_eq!(r.text, "\nText of intro.\n");
    }

    #[test]
    fn fallback_window_from_document_start() {
        let doc = "x".repeat(500);
        let s = ExtractionSettings {
            fallback_intro_length: Some(100),
            ..ExtractionSettings::default()
        };
        let r = extract_span(&doc, "nowhere marker", "nor here", &s).unwrap();
        assert_eq!(r.mode, MatchMode::FallbackLength);
        assert_eq!(r.start, 0);
        assert!(r.text.chars().count() <= 100);
    }

    #[test]
    fn fallback_window_from_found_start() {
        let doc = format!("preamble START {}", "y".repeat(300));
        let s = ExtractionSettings {
            fallback_intro_length: Some(10),
            ..ExtractionSettings::default()
        };
        let r = extract_span(&doc, "START", "no such end marker", &s).unwrap();
        assert_eq!(r.mode, MatchMode::FallbackLength);
        assert_eq!(r.text, " yyyyyyyyy");
    }

    #[test]
    fn no_fallback_and_no_end_reports_end_missing() {
        let err = extract_span("START body", "START", "finish", &strict()).unwrap_err();
        assert_eq!(err, ExtractionFailure::EndMarkerNotFound);
    }

    #[test]
    fn no_fallback_and_no_start_reports_start_missing() {
        let err = extract_span("body only", "START", "finish", &strict()).unwrap_err();
        assert_eq!(err, ExtractionFailure::StartMarkerNotFound);
    }

    #[test]
    fn empty_end_marker_reads_to_end_with_clamp() {
        let doc = format!("Intro {}", "z".repeat(50));
        let s = ExtractionSettings {
            max_intro_length: 20,
            ..strict()
        };
        let r = extract_span(&doc, "Intro", "  ", &s).unwrap();
        assert_eq!(r.mode, MatchMode::ExactCaseInsensitive);
        assert_eq!(r.text.chars().count(), 20);
        assert!(r.truncated);
    }

    #[test]
    fn whitespace_only_span_is_empty_extraction() {
        let err = extract_span("A \n\t B", "A", "B", &strict()).unwrap_err();
        assert_eq!(err, ExtractionFailure::EmptyExtraction);
    }

    #[test]
    fn empty_start_marker_without_fallback_fails() {
        let err = extract_span("text", "", "end", &strict()).unwrap_err();
        assert_eq!(err, ExtractionFailure::StartMarkerNotFound);
    }

    #[test]
    fn clamp_never_splits_a_character() {
        let doc = "Start ééééé End";
        let s = ExtractionSettings {
            max_intro_length: 3,
            ..strict()
        };
        let r = extract_span(doc, "Start", "End", &s).unwrap();
        assert_eq!(r.text, " éé");
        assert!(r.truncated);
    }

    #[test]
    fn offsets_map_back_through_case_folding() {
        // 'İ' lower-cases to two chars; offsets must still land on the source.
        let doc = "İstanbul INTRO body END";
        let r = extract_span(doc, "intro", "end", &strict()).unwrap();
        assert_eq!(r.text, " body ");
        assert_eq!(&doc[r.start..r.end], " body ");
    }

    #[test]
    fn section_prefix_stripping() {
        assert_eq!(strip_section_prefix("1. Introduction"), "Introduction");
        assert_eq!(strip_section_prefix("IV. Results"), "Results");
        assert_eq!(strip_section_prefix("2.1 Data Sources"), "Data Sources");
        assert_eq!(strip_section_prefix("Mix of policies"), "Mix of policies");
        assert_eq!(strip_section_prefix("3."), "3.");
        assert_eq!(strip_section_prefix("XIV) Robustness"), "Robustness");
    }

    #[test]
    fn words_made_of_numeral_letters_are_not_section_numbers() {
        assert_eq!(strip_section_prefix("Did. we find it"), "Did. we find it");
        assert_eq!(strip_section_prefix("mix. of policies"), "mix. of policies");
        assert_eq!(strip_section_prefix("Civ. procedure"), "Civ. procedure");
    }

    #[test]
    fn variants_exclude_original_and_duplicates() {
        assert_eq!(marker_variants("2. The Model", 4), vec!["The Model"]);
        assert_eq!(
            marker_variants("3.2 Main Results of the Paper", 2),
            vec!["Main Results of the Paper", "3.2 Main", "Main Results"]
        );
    }

    #[test]
    fn normalized_collapses_and_maps_back() {
        let n = Normalized::new("  A \n\t B.", Fold::CaseAndWhitespace);
        assert_eq!(n.text, "a b.");
        assert_eq!(n.find("b.", 0), Some((7, 9)));
    }
}
