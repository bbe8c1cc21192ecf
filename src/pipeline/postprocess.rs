//! Post-processing: deterministic cleanup of the model's analysis text.
//!
//! Even with a clear prompt, models wrap replies in ```` ```markdown ````
//! fences, emit `\r\n`, trail spaces and sprinkle zero-width characters
//! copied from the source PDF. These rules fix that without touching content.
//!
//! ## Rule Order
//!
//! Fences are stripped before line endings are normalised so the fence regex
//! sees the raw reply; blank-line collapsing runs after trailing whitespace
//! is gone so whitespace-only lines count as blank.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to a raw model reply.
///
/// 1. Strip an outer markdown fence
/// 2. Normalise line endings (CRLF → LF)
/// 3. Trim trailing whitespace per line
/// 4. Collapse runs of blank lines to one
/// 5. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 6. End with exactly one newline
pub fn clean_response(input: &str) -> String {
    let s = strip_markdown_fences(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    ensure_final_newline(&s)
}

/// Clean raw PDF text before it is saved or sent: line endings and invisible
/// characters only, since layout whitespace may matter to a human reader.
pub fn clean_intro_text(input: &str) -> String {
    remove_invisible_chars(&normalise_line_endings(input))
}

// ── Rule 1: Strip outer markdown fences ──────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```(?:markdown|md)?\r?\n(.*?)\r?\n```\s*$").expect("static regex")
});

fn strip_markdown_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse blank-line runs ─────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("static regex"));

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").into_owned()
}

// ── Rule 5: Remove invisible Unicode characters ──────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        ['\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}'],
        "",
    )
}

// ── Rule 6: Single final newline ─────────────────────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{trimmed}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_outer_fence() {
        let raw = "```markdown\n## Research Problem\nWhy firms export.\n```\n";
        assert_eq!(
            clean_response(raw),
            "## Research Problem\nWhy firms export.\n"
        );
    }

    #[test]
    fn inner_code_blocks_survive() {
        let raw = "## Model\n```\ny = f(x)\n```\nMore text";
        assert_eq!(clean_response(raw), "## Model\n```\ny = f(x)\n```\nMore text\n");
    }

    #[test]
    fn crlf_trailing_space_and_blank_runs() {
        let raw = "## A  \r\n\r\n\r\n\r\nbody\u{200B} \r\n";
        assert_eq!(clean_response(raw), "## A\n\nbody\n");
    }

    #[test]
    fn empty_reply_becomes_single_newline() {
        assert_eq!(clean_response("  \n\n"), "\n");
    }

    #[test]
    fn intro_text_keeps_layout() {
        assert_eq!(clean_intro_text("a  \r\n\r\n\r\nb\u{FEFF}"), "a  \n\n\nb");
    }
}
