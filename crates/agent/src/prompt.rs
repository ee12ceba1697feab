//! System prompt rendering.
//!
//! The prompt is re-rendered before every LLM call so it always reflects the
//! sources gathered so far and the summary of pruned searches.

use chrono::Utc;
use sgr_research_core::research::ResearchContext;
use sgr_research_tools::CapabilityKind;

pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are an expert researcher with adaptive planning and schema-guided reasoning capabilities.

Current date: {current_date}

USER REQUEST:
{user_request}

CORE PRINCIPLES:
- Detect the language of the user request and write all answers and the report in that language.
- Ground every statement in the sources you found. Cite them inline as [1], [2] using the source numbers below.
- Ask for clarification only when the request is truly ambiguous; otherwise state your assumptions and proceed.
- Search with specific, targeted queries. Adapt your plan when new data contradicts it.
- Create the report only after collecting enough data, then complete the task.

AVAILABLE TOOLS:
{available_tools}

PREVIOUS SEARCHES:
{previous_searches}

AVAILABLE SOURCES:
{sources_formatted}
";

/// A system prompt template with `{placeholder}` slots.
#[derive(Debug, Clone)]
pub struct SystemPrompt {
    template: String,
}

impl SystemPrompt {
    /// Use `template` when given, otherwise [`DEFAULT_SYSTEM_PROMPT`].
    pub fn new(template: Option<&str>) -> Self {
        Self {
            template: template.unwrap_or(DEFAULT_SYSTEM_PROMPT).to_string(),
        }
    }

    pub fn render(&self, user_request: &str, ctx: &ResearchContext, tools: &[CapabilityKind]) -> String {
        let available_tools = tools
            .iter()
            .enumerate()
            .map(|(i, kind)| format!("{}. {}: {}", i + 1, kind.name(), kind.description()))
            .collect::<Vec<_>>()
            .join("\n");

        let sources = ctx.sources_by_number();
        let sources_formatted = if sources.is_empty() {
            "No sources yet.".to_string()
        } else {
            sources.iter().map(|s| s.to_string()).collect::<Vec<_>>().join("\n")
        };

        let previous_searches = if ctx.previous_searches_summary.trim().is_empty() {
            "None.".to_string()
        } else {
            ctx.previous_searches_summary.trim().to_string()
        };

        let current_date = Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        fill(&self.template, |slot| match slot {
            "current_date" => Some(current_date.as_str()),
            "available_tools" => Some(available_tools.as_str()),
            "previous_searches" => Some(previous_searches.as_str()),
            "sources_formatted" => Some(sources_formatted.as_str()),
            "user_request" => Some(user_request),
            _ => None,
        })
    }
}

/// Substitute `{slot}`s in one pass over `template`. Inserted values are
/// never rescanned; unknown slots stay verbatim.
fn fill<'a>(template: &str, value: impl Fn(&str) -> Option<&'a str>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}').and_then(|close| value(&after[..close]).map(|v| (close, v))) {
            Some((close, v)) => {
                out.push_str(v);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

impl Default for SystemPrompt {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sgr_research_core::research::SourceData;

    #[test]
    fn default_prompt_fills_every_placeholder() {
        let mut ctx = ResearchContext::new();
        ctx.ingest_sources(vec![SourceData::new(
            "https://bmw.example/x6",
            Some("BMW X6".into()),
            "price",
        )]);
        ctx.previous_searches_summary = "Query: 'bmw x6 2024'".into();

        let prompt = SystemPrompt::default().render(
            "Find the BMW X6 price",
            &ctx,
            &[CapabilityKind::WebSearch, CapabilityKind::CompleteTask],
        );
        assert!(prompt.contains("Find the BMW X6 price"));
        assert!(prompt.contains("[1] BMW X6 - https://bmw.example/x6"));
        assert!(prompt.contains("1. web_search:"));
        assert!(prompt.contains("2. complete_task:"));
        assert!(prompt.contains("Query: 'bmw x6 2024'"));
        assert!(!prompt.contains('{'), "unfilled placeholder in:\n{prompt}");
    }

    #[test]
    fn empty_context_placeholders() {
        let prompt = SystemPrompt::default().render("task", &ResearchContext::new(), &[]);
        assert!(prompt.contains("No sources yet."));
        assert!(prompt.contains("PREVIOUS SEARCHES:\nNone."));
    }

    #[test]
    fn slot_names_inside_values_stay_literal() {
        let mut ctx = ResearchContext::new();
        ctx.ingest_sources(vec![SourceData::new("https://a.example", Some("A".into()), "")]);
        ctx.previous_searches_summary = "Query: 'what is {sources_formatted}'".into();

        let prompt = SystemPrompt::new(Some("{previous_searches}|{sources_formatted}|{user_request}"))
            .render("explain {current_date}", &ctx, &[]);
        assert_eq!(
            prompt,
            "Query: 'what is {sources_formatted}'|[1] A - https://a.example|explain {current_date}"
        );
    }

    #[test]
    fn override_template() {
        let prompt = SystemPrompt::new(Some("Task: {user_request} | {unknown}"))
            .render("compare GPUs", &ResearchContext::new(), &[]);
        assert_eq!(prompt, "Task: compare GPUs | {unknown}");
    }
}
