//! Prompt text for the introduction analysis.
//!
//! Centralising every prompt here means a wording change touches exactly one
//! file, and unit tests can inspect the rendered prompt without a model.
//!
//! The per-type templates in `config.json` choose *which* sections the model
//! must fill in. This module decides *how* each section is explained to the
//! model: known section names get their guidance questions from
//! [`section_guidance`], anything else gets a generic instruction.

use crate::config::PromptTemplate;
use crate::pipeline::llm::AnalysisRequest;

/// System instruction used by the built-in templates.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are an expert economist analyzing research papers. Focus on economic insights and contributions rather than technical details.";

/// Line shown under a section heading that has no built-in guidance.
pub const GENERIC_SECTION_GUIDANCE: &str = "[Analyze this aspect of the paper]";

/// Guidance questions for a known analysis section.
pub fn section_guidance(section: &str) -> Option<&'static [&'static str]> {
    let questions: &'static [&'static str] = match section {
        "Research Problem" => &["What specific question does this paper address?"],
        "Significance & Motivation" => &[
            "Why is this problem important or interesting?",
            "How is it connected to existing work?",
            "How does it differ from existing work?",
        ],
        "Main Findings & Intuition" => &[
            "What is the paper's answer to the research question?",
            "What's the key intuition or mechanism?",
        ],
        "Model Setup & Assumptions" => &[
            "What is the basic model structure?",
            "What are the key assumptions?",
            "How do these assumptions relate to the research question?",
        ],
        "Methodological Contributions" => &[
            "Does this paper have any methodological contributions?",
            "If yes, what are the key methodological innovations?",
        ],
        "Policy Implications" => &["What are the policy recommendations or implications?"],
        "Key Insights" => &["Additional important takeaways"],
        "Research Question" => &[
            "What empirical question does this paper investigate?",
            "What is the main hypothesis being tested?",
        ],
        "Main Findings" => &["What are the main empirical results?"],
        "Data" => &[
            "What data sources are used?",
            "What is the sample period and coverage?",
            "What are the key variables?",
        ],
        "Identification Strategy" => &[
            "How does the paper establish causal identification?",
            "What is the source of exogenous variation?",
            "What are potential threats to identification?",
        ],
        "Robustness & Limitations" => &[
            "What robustness checks are mentioned?",
            "What are the main limitations of the approach?",
        ],
        _ => return None,
    };
    Some(questions)
}

/// Render the ordered `### <Section>` blocks the model must fill in.
pub fn render_sections(sections: &[String]) -> String {
    let mut out = String::new();
    for section in sections {
        out.push_str("### ");
        out.push_str(section);
        out.push('\n');
        match section_guidance(section) {
            Some(questions) => {
                for q in questions {
                    out.push_str("- ");
                    out.push_str(q);
                    out.push('\n');
                }
            }
            None => {
                out.push_str(GENERIC_SECTION_GUIDANCE);
                out.push('\n');
            }
        }
        out.push('\n');
    }
    out
}

/// Build the request for one paper.
pub fn build_request(template: &PromptTemplate, title: &str, introduction: &str) -> AnalysisRequest {
    let user = format!(
        "Please analyze the following introduction section from an economic research paper \
and extract key information in a structured format.\n\n\
Paper Title: {title}\n\n\
Introduction Text:\n{introduction}\n\n\
Please provide a structured analysis in the following format:\n\n\
{sections}\
Focus on economic intuitions, insights and contributions rather than technical details. \
Please be concise, clear and accurate.",
        introduction = introduction.trim(),
        sections = render_sections(&template.analysis_sections),
    );
    AnalysisRequest {
        system: template.system_instruction.clone(),
        user,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_sections_render_their_questions_in_order() {
        let out = render_sections(&["Data".to_string(), "Research Problem".to_string()]);
        let data = out.find("### Data").unwrap();
        let problem = out.find("### Research Problem").unwrap();
        assert!(data < problem);
        assert!(out.contains("- What data sources are used?\n"));
        assert!(out.contains("- What specific question does this paper address?\n"));
    }

    #[test]
    fn unknown_section_gets_generic_guidance() {
        let out = render_sections(&["Welfare Analysis".to_string()]);
        assert_eq!(out, format!("### Welfare Analysis\n{GENERIC_SECTION_GUIDANCE}\n\n"));
    }

    #[test]
    fn every_default_section_has_guidance() {
        for t in [
            PromptTemplate::default_theoretical(),
            PromptTemplate::default_empirical(),
        ] {
            for s in &t.analysis_sections {
                assert!(section_guidance(s).is_some(), "no guidance for {s}");
            }
        }
    }

    #[test]
    fn request_carries_system_title_and_text() {
        let t = PromptTemplate::default_empirical();
        let req = build_request(&t, "Trade and Wages", "  We study trade.\n");
        assert_eq!(req.system, DEFAULT_SYSTEM_INSTRUCTION);
        assert!(req.user.contains("Paper Title: Trade and Wages"));
        assert!(req.user.contains("Introduction Text:\nWe study trade.\n\n"));
        assert!(req.user.contains("### Identification Strategy"));
    }
}
