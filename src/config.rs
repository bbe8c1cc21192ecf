//! Configuration types for extraction and analysis runs.
//!
//! All behaviour of a run is controlled through [`AnalysisConfig`], which
//! mirrors the four groups of `config.json`: `llm_settings`,
//! `extraction_settings`, `output_settings` and `prompt_template`. The file is
//! read once at start-up by [`AnalysisConfig::load`] and the resulting value
//! is never mutated afterwards; every stage borrows it.
//!
//! Every group is `#[serde(default)]`, so a config file only needs the keys it
//! wants to change. A *missing* file falls back to defaults; a *malformed*
//! one is fatal, because every downstream decision depends on it.
//!
//! Where files live on disk is a separate concern, kept in [`WorkspacePaths`].

use crate::error::AnalyzerError;
use crate::registry::PaperType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Complete, immutable configuration for a run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub llm_settings: LlmSettings,
    pub extraction_settings: ExtractionSettings,
    pub output_settings: OutputSettings,
    pub prompt_template: PromptTemplates,
}

impl AnalysisConfig {
    /// Load and validate the configuration at `path`.
    ///
    /// A missing file is not an error: defaults are used and a warning is
    /// logged. A file that exists but fails to parse or validate returns
    /// [`AnalyzerError::MalformedConfig`] / [`AnalyzerError::InvalidConfig`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AnalyzerError> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(
                "Config file {} not found, using default settings",
                path.display()
            );
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|e| AnalyzerError::io(path, e))?;
        let config = Self::from_json(&raw).map_err(|e| match e {
            AnalyzerError::MalformedConfig { detail, .. } => AnalyzerError::MalformedConfig {
                path: path.to_path_buf(),
                detail,
            },
            other => other,
        })?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate a configuration from a JSON string.
    pub fn from_json(raw: &str) -> Result<Self, AnalyzerError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| AnalyzerError::MalformedConfig {
                path: PathBuf::from("<inline>"),
                detail: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Write this configuration as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), AnalyzerError> {
        let path = path.as_ref();
        let json = self.to_pretty_json()?;
        std::fs::write(path, json).map_err(|e| AnalyzerError::io(path, e))
    }

    /// Pretty JSON rendering, as written by [`AnalysisConfig::save`].
    pub fn to_pretty_json(&self) -> Result<String, AnalyzerError> {
        let mut json = serde_json::to_string_pretty(self)
            .map_err(|e| AnalyzerError::Internal(format!("config serialisation: {e}")))?;
        json.push('\n');
        Ok(json)
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), AnalyzerError> {
        let llm = &self.llm_settings;
        if llm.model.trim().is_empty() {
            return Err(AnalyzerError::InvalidConfig(
                "llm_settings.model must not be empty".into(),
            ));
        }
        if !(0.0..=2.0).contains(&llm.temperature) {
            return Err(AnalyzerError::InvalidConfig(format!(
                "llm_settings.temperature must be 0–2, got {}",
                llm.temperature
            )));
        }
        if !(0.0..=1.0).contains(&llm.top_p) {
            return Err(AnalyzerError::InvalidConfig(format!(
                "llm_settings.top_p must be 0–1, got {}",
                llm.top_p
            )));
        }
        if llm.max_tokens == 0 {
            return Err(AnalyzerError::InvalidConfig(
                "llm_settings.max_tokens must be ≥ 1".into(),
            ));
        }

        let ex = &self.extraction_settings;
        if ex.max_intro_length == 0 {
            return Err(AnalyzerError::InvalidConfig(
                "extraction_settings.max_intro_length must be ≥ 1".into(),
            ));
        }
        if !(ex.fuzzy_threshold > 0.0 && ex.fuzzy_threshold <= 1.0) {
            return Err(AnalyzerError::InvalidConfig(format!(
                "extraction_settings.fuzzy_threshold must be in (0, 1], got {}",
                ex.fuzzy_threshold
            )));
        }
        if ex.flexible_prefix_words == 0 {
            return Err(AnalyzerError::InvalidConfig(
                "extraction_settings.flexible_prefix_words must be ≥ 1".into(),
            ));
        }

        let delay = self.output_settings.rate_limit_delay;
        if !delay.is_finite() || delay < 0.0 {
            return Err(AnalyzerError::InvalidConfig(format!(
                "output_settings.rate_limit_delay must be ≥ 0, got {delay}"
            )));
        }

        for paper_type in PaperType::ALL {
            if self.prompt_template.get(paper_type).analysis_sections.is_empty() {
                return Err(AnalyzerError::InvalidConfig(format!(
                    "prompt_template.{paper_type} needs at least one analysis section"
                )));
            }
        }
        Ok(())
    }
}

// ── llm_settings ─────────────────────────────────────────────────────────

/// Parameters forwarded to the LLM completion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Provider name understood by `edgequake_llm::ProviderFactory`
    /// (e.g. "openai", "anthropic", "ollama"). `None` auto-detects from the
    /// environment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Model identifier. Default: "gpt-4.1-mini".
    pub model: String,

    /// Sampling temperature. Default: 0.0 so summaries are reproducible.
    pub temperature: f32,

    /// Maximum tokens the model may generate per paper. Default: 16000.
    pub max_tokens: usize,

    /// Nucleus sampling. Default: 0.8.
    pub top_p: f32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: None,
            model: "gpt-4.1-mini".to_string(),
            temperature: 0.0,
            max_tokens: 16000,
            top_p: 0.8,
        }
    }
}

// ── extraction_settings ──────────────────────────────────────────────────

/// Flags controlling the marker-matching cascade in
/// [`crate::pipeline::extract`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    /// Exact-match step compares case-sensitively. Default: false.
    pub case_sensitive: bool,

    /// Enable whitespace/punctuation-normalised and similarity matching.
    /// Default: true.
    pub fuzzy_matching: bool,

    /// Hard cap on the extracted span, in characters. Default: 32000.
    pub max_intro_length: usize,

    /// Length of the degraded window returned when no end boundary is found,
    /// in characters. `null` or `0` disables the fallback. Default: 20000.
    pub fallback_intro_length: Option<usize>,

    /// Retry with section-number-free and shortened markers. Default: true.
    pub search_flexibility: bool,

    /// Minimum normalised Levenshtein similarity for a document line to count
    /// as a marker match. Default: 0.85.
    pub fuzzy_threshold: f64,

    /// Words kept when a marker is shortened during flexible search.
    /// Default: 4.
    pub flexible_prefix_words: usize,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            fuzzy_matching: true,
            max_intro_length: 32000,
            fallback_intro_length: Some(20000),
            search_flexibility: true,
            fuzzy_threshold: 0.85,
            flexible_prefix_words: 4,
        }
    }
}

impl ExtractionSettings {
    /// The fallback length, treating `0` as disabled.
    pub fn fallback_len(&self) -> Option<usize> {
        self.fallback_intro_length.filter(|&n| n > 0)
    }
}

// ── output_settings ──────────────────────────────────────────────────────

/// What gets written after each paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Write the extracted introduction to `raw_intros/`. Default: true.
    pub save_raw_intros: bool,

    /// Write `.md` with a markdown header/footer; otherwise plain `.txt`.
    /// Default: true.
    pub markdown_format: bool,

    /// Prefix the analysis with title, type, source and match mode.
    /// Default: true.
    pub include_metadata: bool,

    /// Seconds to wait after each LLM call. Default: 0.2.
    pub rate_limit_delay: f64,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            save_raw_intros: true,
            markdown_format: true,
            include_metadata: true,
            rate_limit_delay: 0.2,
        }
    }
}

impl OutputSettings {
    /// Post-call pause as a [`Duration`].
    pub fn rate_limit(&self) -> Duration {
        Duration::from_secs_f64(self.rate_limit_delay.max(0.0))
    }
}

// ── prompt_template ──────────────────────────────────────────────────────

/// System instruction plus the ordered analysis sections for one paper type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PromptTemplate {
    pub system_instruction: String,
    pub analysis_sections: Vec<String>,
}

impl PromptTemplate {
    fn new(system_instruction: &str, sections: &[&str]) -> Self {
        Self {
            system_instruction: system_instruction.to_string(),
            analysis_sections: sections.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn default_theoretical() -> Self {
        Self::new(
            crate::prompts::DEFAULT_SYSTEM_INSTRUCTION,
            &[
                "Research Problem",
                "Significance & Motivation",
                "Main Findings & Intuition",
                "Model Setup & Assumptions",
                "Methodological Contributions",
                "Policy Implications",
                "Key Insights",
            ],
        )
    }

    pub fn default_empirical() -> Self {
        Self::new(
            crate::prompts::DEFAULT_SYSTEM_INSTRUCTION,
            &[
                "Research Question",
                "Significance & Motivation",
                "Main Findings",
                "Data",
                "Identification Strategy",
                "Robustness & Limitations",
                "Policy Implications",
            ],
        )
    }
}

/// One [`PromptTemplate`] per [`PaperType`].
///
/// Older config files carry a single flat template
/// (`{"system_instruction": …, "analysis_sections": […]}`); it is accepted
/// and applied to both paper types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "PromptTemplatesFile")]
pub struct PromptTemplates {
    pub theoretical: PromptTemplate,
    pub empirical: PromptTemplate,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            theoretical: PromptTemplate::default_theoretical(),
            empirical: PromptTemplate::default_empirical(),
        }
    }
}

impl PromptTemplates {
    pub fn get(&self, paper_type: PaperType) -> &PromptTemplate {
        match paper_type {
            PaperType::Theoretical => &self.theoretical,
            PaperType::Empirical => &self.empirical,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PromptTemplatesFile {
    Shared(PromptTemplate),
    PerType(PerTypeTemplates),
}

#[derive(Deserialize)]
#[serde(default)]
struct PerTypeTemplates {
    theoretical: PromptTemplate,
    empirical: PromptTemplate,
}

impl Default for PerTypeTemplates {
    fn default() -> Self {
        let d = PromptTemplates::default();
        Self {
            theoretical: d.theoretical,
            empirical: d.empirical,
        }
    }
}

impl From<PromptTemplatesFile> for PromptTemplates {
    fn from(file: PromptTemplatesFile) -> Self {
        match file {
            PromptTemplatesFile::Shared(t) => Self {
                theoretical: t.clone(),
                empirical: t,
            },
            PromptTemplatesFile::PerType(p) => Self {
                theoretical: p.theoretical,
                empirical: p.empirical,
            },
        }
    }
}

// ── Workspace paths ──────────────────────────────────────────────────────

/// On-disk locations used by both stages.
///
/// Defaults match the fixed directory layout the tool has always used, so
/// running from the project directory needs no flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePaths {
    /// Directory holding the source PDFs. Default: `papers_to_read`.
    pub papers_dir: PathBuf,
    /// Annotation registry. Default: `papers_annotation.json`.
    pub registry_path: PathBuf,
    /// Raw introduction text files. Default: `raw_intros`.
    pub raw_intro_dir: PathBuf,
    /// Analysis files. Default: `output`.
    pub output_dir: PathBuf,
}

impl Default for WorkspacePaths {
    fn default() -> Self {
        Self {
            papers_dir: PathBuf::from("papers_to_read"),
            registry_path: PathBuf::from("papers_annotation.json"),
            raw_intro_dir: PathBuf::from("raw_intros"),
            output_dir: PathBuf::from("output"),
        }
    }
}

impl WorkspacePaths {
    /// All default locations re-rooted under `root`.
    pub fn rooted_at(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let d = Self::default();
        Self {
            papers_dir: root.join(d.papers_dir),
            registry_path: root.join(d.registry_path),
            raw_intro_dir: root.join(d.raw_intro_dir),
            output_dir: root.join(d.output_dir),
        }
    }
}
