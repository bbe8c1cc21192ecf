//! Stage two: extract each annotated introduction and analyse it.
//!
//! ## Pipeline per paper
//!
//! ```text
//! record ──▶ ready? ──▶ text ──▶ extract_span ──▶ raw_intros/ ──▶ LLM ──▶ output/
//!           (type,     (pdfium)   (marker        (optional)     (one    (md/txt)
//!            markers)              cascade)                      call)
//! ```
//!
//! Every step that can fail for a single paper returns a [`PaperError`]; the
//! batch loop turns that into a [`PaperOutcome::Skipped`] and carries on.
//! Only problems that make the whole run meaningless (bad config, missing
//! registry or papers directory, no provider) surface as [`AnalyzerError`].
//!
//! ## Provider resolution
//!
//! From most to least specific:
//!
//! 1. a [`CompletionClient`] passed to the builder (tests, custom middleware);
//! 2. a pre-built `edgequake_llm` provider passed to the builder;
//! 3. `llm_settings.provider` from the config file, with `llm_settings.model`;
//! 4. `EDGEQUAKE_LLM_PROVIDER` in the environment, with `EDGEQUAKE_MODEL`
//!    when that is set too and `llm_settings.model` otherwise;
//! 5. `OPENAI_API_KEY` present → OpenAI with `llm_settings.model`;
//! 6. `ProviderFactory::from_env` auto-detection, with whatever model the
//!    detected provider defaults to.

use crate::config::{AnalysisConfig, WorkspacePaths};
use crate::error::{AnalyzerError, PaperError};
use crate::output::{
    analysis_path, raw_intro_path, render_analysis, write_atomic, AnalysisHeader, AnalyzedPaper,
    PaperOutcome, RunSummary, SkippedPaper,
};
use crate::pipeline::extract::extract_span;
use crate::pipeline::input::file_stem;
use crate::pipeline::llm::{CompletionClient, ProviderClient};
use crate::pipeline::postprocess::{clean_intro_text, clean_response};
use crate::pipeline::text::{PdfiumTextSource, TextSource};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::prompts::build_request;
use crate::registry::{AnnotationRecord, Registry};
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A configured analysis run.
///
/// Cheap to clone: every field is shared.
#[derive(Clone)]
pub struct Analyzer {
    config: Arc<AnalysisConfig>,
    paths: WorkspacePaths,
    text_source: Arc<dyn TextSource>,
    client: Arc<dyn CompletionClient>,
    progress: ProgressCallback,
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("config", &self.config)
            .field("paths", &self.paths)
            .field("model", &self.client.model_name())
            .finish()
    }
}

impl Analyzer {
    /// Start building a run from an already-loaded configuration.
    pub fn builder(config: AnalysisConfig) -> AnalyzerBuilder {
        AnalyzerBuilder {
            config,
            paths: WorkspacePaths::default(),
            text_source: None,
            client: None,
            provider: None,
            progress: None,
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn paths(&self) -> &WorkspacePaths {
        &self.paths
    }

    pub fn model_name(&self) -> String {
        self.client.model_name()
    }

    /// Check the papers directory and read the registry.
    pub fn load_registry(&self) -> Result<Registry, AnalyzerError> {
        if !self.paths.papers_dir.is_dir() {
            return Err(AnalyzerError::PapersDirNotFound {
                path: self.paths.papers_dir.clone(),
            });
        }
        Registry::load(&self.paths.registry_path)
    }

    /// Process every registry entry in file-name order.
    pub async fn run(&self) -> Result<RunSummary, AnalyzerError> {
        let started = Instant::now();
        let registry = self.load_registry()?;
        let total = registry.len();
        info!(
            "Analysing {} paper(s) with model {}",
            total,
            self.client.model_name()
        );
        self.progress.on_batch_start(total);

        let mut outcomes = Vec::with_capacity(total);
        for (i, (key, record)) in registry.iter().enumerate() {
            outcomes.push(self.process_entry(i + 1, total, key, record).await);
        }

        let summary = RunSummary::from_outcomes(
            outcomes,
            self.client.model_name(),
            started.elapsed().as_millis() as u64,
        );
        info!(
            "Analysis complete: {} analysed, {} skipped, {} input / {} output tokens",
            summary.analyzed, summary.skipped, summary.total_input_tokens, summary.total_output_tokens
        );
        self.progress.on_batch_complete(summary.analyzed, summary.skipped);
        Ok(summary)
    }

    /// Process one entry, reporting progress. Never fails: errors, including
    /// a record that could not be read from the registry, become a skipped
    /// outcome.
    pub async fn process_entry(
        &self,
        index: usize,
        total: usize,
        key: &str,
        record: Result<AnnotationRecord, PaperError>,
    ) -> PaperOutcome {
        self.progress.on_paper_start(index, total, key);
        let result = match record {
            Ok(record) => self.analyze_paper(key, &record).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(paper) => {
                info!(
                    "{key}: analysed ({}, {} chars{})",
                    paper.match_mode,
                    paper.intro_chars,
                    if paper.truncated { ", truncated" } else { "" }
                );
                self.progress.on_paper_analyzed(index, total, key, paper.match_mode);
                PaperOutcome::Analyzed(paper)
            }
            Err(reason) => {
                warn!("{key}: skipped, {reason}");
                self.progress
                    .on_paper_skipped(index, total, key, &reason.to_string());
                PaperOutcome::Skipped(SkippedPaper {
                    file: key.to_string(),
                    reason,
                })
            }
        }
    }

    /// Extract, analyse and write one paper.
    pub async fn analyze_paper(
        &self,
        key: &str,
        record: &AnnotationRecord,
    ) -> Result<AnalyzedPaper, PaperError> {
        let started = Instant::now();
        let cfg = &*self.config;
        let ready = record.ready()?;

        let pdf_path = self.paths.papers_dir.join(key);
        let doc = self.text_source.read(&pdf_path).await?;

        let extraction = extract_span(
            &doc.text,
            ready.start_marker,
            ready.end_marker,
            &cfg.extraction_settings,
        )?;
        let intro = clean_intro_text(&extraction.text);
        let intro_chars = intro.chars().count();
        debug!(
            "{key}: introduction at bytes {}..{} via {}",
            extraction.start, extraction.end, extraction.mode
        );

        let raw_intro_path = if cfg.output_settings.save_raw_intros {
            let path = raw_intro_path(&self.paths.raw_intro_dir, key);
            write_atomic(&path, &intro).await?;
            Some(path)
        } else {
            None
        };

        let title = match record.title.trim() {
            "" => file_stem(key),
            t => t,
        };
        let request = build_request(cfg.prompt_template.get(ready.paper_type), title, &intro);
        let reply = self.client.complete(&request, &cfg.llm_settings).await;

        let delay = cfg.output_settings.rate_limit();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let reply = reply?;

        let model = self.client.model_name();
        let header = AnalysisHeader {
            title,
            file: key,
            paper_type: ready.paper_type,
            match_mode: extraction.mode,
            truncated: extraction.truncated,
            model: &model,
            analyzed_at: chrono::Local::now(),
        };
        let document = render_analysis(&header, &clean_response(&reply.content), &cfg.output_settings);
        let analysis_path = analysis_path(&self.paths.output_dir, key, &cfg.output_settings);
        write_atomic(&analysis_path, &document).await?;

        Ok(AnalyzedPaper {
            file: key.to_string(),
            title: title.to_string(),
            paper_type: ready.paper_type,
            match_mode: extraction.mode,
            truncated: extraction.truncated,
            intro_chars,
            raw_intro_path,
            analysis_path,
            input_tokens: reply.input_tokens,
            output_tokens: reply.output_tokens,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }
}

/// Builder for [`Analyzer`].
pub struct AnalyzerBuilder {
    config: AnalysisConfig,
    paths: WorkspacePaths,
    text_source: Option<Arc<dyn TextSource>>,
    client: Option<Arc<dyn CompletionClient>>,
    provider: Option<Arc<dyn LLMProvider>>,
    progress: Option<ProgressCallback>,
}

impl AnalyzerBuilder {
    pub fn paths(mut self, paths: WorkspacePaths) -> Self {
        self.paths = paths;
        self
    }

    /// Replace pdfium with another text source.
    pub fn text_source(mut self, source: Arc<dyn TextSource>) -> Self {
        self.text_source = Some(source);
        self
    }

    /// Use this client for every analysis call.
    pub fn client(mut self, client: Arc<dyn CompletionClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Use a pre-built `edgequake_llm` provider.
    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.progress = Some(cb);
        self
    }

    /// Validate the configuration and resolve the LLM client.
    pub fn build(self) -> Result<Analyzer, AnalyzerError> {
        self.config.validate()?;
        let model = self.config.llm_settings.model.clone();

        let client: Arc<dyn CompletionClient> = match (self.client, self.provider) {
            (Some(client), _) => client,
            (None, Some(provider)) => Arc::new(ProviderClient::new(provider, model)),
            (None, None) => resolve_client(self.config.llm_settings.provider.as_deref(), &model)?,
        };

        Ok(Analyzer {
            config: Arc::new(self.config),
            paths: self.paths,
            text_source: self
                .text_source
                .unwrap_or_else(|| Arc::new(PdfiumTextSource::new())),
            client,
            progress: self
                .progress
                .unwrap_or_else(|| Arc::new(NoopProgressCallback)),
        })
    }
}

/// Build an [`Analyzer`] with pdfium and an environment-resolved provider,
/// then run it.
pub async fn analyze_all(
    config: AnalysisConfig,
    paths: WorkspacePaths,
) -> Result<RunSummary, AnalyzerError> {
    Analyzer::builder(config).paths(paths).build()?.run().await
}

// ── Provider resolution ──────────────────────────────────────────────────

fn create_client(provider: &str, model: &str) -> Result<Arc<dyn CompletionClient>, AnalyzerError> {
    let llm = ProviderFactory::create_llm_provider(provider, model).map_err(|e| {
        AnalyzerError::ProviderNotConfigured {
            provider: provider.to_string(),
            hint: format!("{e}"),
        }
    })?;
    debug!("Using LLM provider {provider} with model {model}");
    Ok(Arc::new(ProviderClient::new(llm, model)))
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Which provider and model a run will use when the builder was given
/// neither a client nor a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ProviderChoice {
    Named { provider: String, model: String },
    AutoDetect,
}

/// `env` returns a variable's value when it is set and non-blank.
fn choose_provider(
    configured: Option<&str>,
    model: &str,
    env: impl Fn(&str) -> Option<String>,
) -> ProviderChoice {
    if let Some(name) = configured.map(str::trim).filter(|n| !n.is_empty()) {
        return ProviderChoice::Named {
            provider: name.to_string(),
            model: model.to_string(),
        };
    }
    if let Some(provider) = env("EDGEQUAKE_LLM_PROVIDER") {
        return ProviderChoice::Named {
            provider,
            model: env("EDGEQUAKE_MODEL").unwrap_or_else(|| model.to_string()),
        };
    }
    if env("OPENAI_API_KEY").is_some() {
        return ProviderChoice::Named {
            provider: "openai".to_string(),
            model: model.to_string(),
        };
    }
    ProviderChoice::AutoDetect
}

fn resolve_client(
    configured: Option<&str>,
    model: &str,
) -> Result<Arc<dyn CompletionClient>, AnalyzerError> {
    match choose_provider(configured, model, non_empty_env) {
        ProviderChoice::Named { provider, model } => create_client(&provider, &model),
        ProviderChoice::AutoDetect => {
            let (llm, _embedding) =
                ProviderFactory::from_env().map_err(|e| AnalyzerError::ProviderNotConfigured {
                    provider: "auto".to_string(),
                    hint: format!(
                        "No LLM provider could be auto-detected from environment.\n\
                        Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or llm_settings.provider in config.json.\n\
                        Error: {e}"
                    ),
                })?;
            let detected = llm.model().to_string();
            debug!("Auto-detected LLM provider {} with model {detected}", llm.name());
            Ok(Arc::new(ProviderClient::new(llm, detected)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn named(provider: &str, model: &str) -> ProviderChoice {
        ProviderChoice::Named {
            provider: provider.into(),
            model: model.into(),
        }
    }

    #[test]
    fn configured_provider_keeps_configured_model() {
        let env = env_of(&[
            ("EDGEQUAKE_LLM_PROVIDER", "gemini"),
            ("EDGEQUAKE_MODEL", "gemini-2.5-flash"),
            ("OPENAI_API_KEY", "sk-test"),
        ]);
        assert_eq!(
            choose_provider(Some("anthropic"), "claude-sonnet-4-20250514", env),
            named("anthropic", "claude-sonnet-4-20250514")
        );
    }

    #[test]
    fn env_model_applies_only_with_env_provider() {
        let env = env_of(&[
            ("EDGEQUAKE_LLM_PROVIDER", "gemini"),
            ("EDGEQUAKE_MODEL", "gemini-2.5-flash"),
        ]);
        assert_eq!(
            choose_provider(None, "gpt-4.1-mini", env),
            named("gemini", "gemini-2.5-flash")
        );

        let env = env_of(&[("EDGEQUAKE_LLM_PROVIDER", "ollama")]);
        assert_eq!(
            choose_provider(None, "gpt-4.1-mini", env),
            named("ollama", "gpt-4.1-mini")
        );

        let env = env_of(&[("EDGEQUAKE_MODEL", "gemini-2.5-flash"), ("OPENAI_API_KEY", "sk")]);
        assert_eq!(
            choose_provider(None, "gpt-4.1-mini", env),
            named("openai", "gpt-4.1-mini")
        );
    }

    #[test]
    fn blank_configured_provider_falls_through_to_auto_detection() {
        assert_eq!(
            choose_provider(Some("  "), "gpt-4.1-mini", env_of(&[])),
            ProviderChoice::AutoDetect
        );
    }
}
