//! Web search tool: queries the search backend and records the results.
//!
//! Every successful search is appended to the context, its sources are
//! numbered, the context is pruned, and only then is `searches_used`
//! incremented.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sgr_research_core::error::ToolError;
use sgr_research_core::research::{SearchResult, SharedContext, SourceData};
use sgr_research_core::tool::{Tool, ToolEnv};
use tracing::{info, warn};

pub const DESCRIPTION: &str = "Gather information from the web. Use SPECIFIC terms and context \
in queries, add context to acronyms, quote exact phrases and write queries in the SAME LANGUAGE \
as the user request. Set scrape_content=true to fetch full page content for deeper analysis.";

/// Hard upper bound on results per search
const MAX_RESULTS_CAP: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSearch {
    #[serde(default)]
    pub reasoning: String,

    pub query: String,

    /// Defaults to the configured `search.max_results`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<usize>,

    /// Fetch full page content with the results
    #[serde(default)]
    pub scrape_content: bool,
}

impl WebSearch {
    pub fn parameters_schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "reasoning": { "type": "string", "description": "Why this search is needed and what to expect" },
                "query": { "type": "string", "description": "Search query in same language as user request" },
                "max_results": {
                    "type": "integer", "minimum": 1, "maximum": MAX_RESULTS_CAP,
                    "description": "Maximum results (configured default when omitted)"
                },
                "scrape_content": {
                    "type": "boolean", "default": false,
                    "description": "Fetch full page content for deeper analysis"
                }
            },
            "required": ["reasoning", "query"]
        })
    }
}

#[async_trait]
impl Tool for WebSearch {
    fn name(&self) -> &str {
        "web_search"
    }

    async fn execute(&self, ctx: &SharedContext, env: &ToolEnv) -> Result<String, ToolError> {
        let max_results = self
            .max_results
            .unwrap_or(env.default_max_results)
            .clamp(1, MAX_RESULTS_CAP);
        info!(query = %self.query, max_results, scrape = self.scrape_content, "Running web search");

        let mut sources = env
            .search
            .search(&self.query, max_results, self.scrape_content)
            .await?;

        if !self.scrape_content {
            enrich_wikipedia(&mut sources, env).await;
        }

        // No network calls past this point: the lock is held to the end
        let numbered = {
            let mut guard = ctx.write().await;
            let numbered = guard.ingest_sources(sources);
            guard
                .searches
                .push(SearchResult::new(self.query.clone(), numbered.clone()));
            guard.prune_searches(env.max_searches_to_keep);
            guard.searches_used += 1;
            numbered
        };

        Ok(format_results(&numbered, env.content_limit))
    }
}

/// Fetch full text for Wikipedia hits that came back without it.
async fn enrich_wikipedia(sources: &mut [SourceData], env: &ToolEnv) {
    let urls: Vec<String> = sources
        .iter()
        .filter(|s| s.url.contains("wikipedia.org") && s.full_content.is_empty())
        .map(|s| s.url.clone())
        .collect();
    if urls.is_empty() {
        return;
    }

    info!(count = urls.len(), "Auto-extracting Wikipedia content");
    match env.search.extract(&urls).await {
        Ok(extracted) => {
            for page in extracted {
                if let Some(source) = sources.iter_mut().find(|s| s.url == page.url) {
                    source.set_full_content(page.full_content);
                }
            }
        }
        Err(e) => warn!(error = %e, "Wikipedia auto-extraction failed, continuing with basic results"),
    }
}

fn format_results(sources: &[SourceData], content_limit: usize) -> String {
    let mut out = String::from("Search Results:\n\n");
    for source in sources {
        out.push_str(&format!("[{}] {}\n", source.number, source.title));
        out.push_str(&format!("URL: {}\n", source.url));
        out.push_str(&format!("Snippet: {}\n", source.snippet));
        if !source.full_content.is_empty() {
            out.push_str(&format!(
                "\n**Full Content (Markdown):**\n{}\n",
                truncate_chars(&source.full_content, content_limit)
            ));
        }
        out.push('\n');
    }
    out
}

/// Prefix of `s` holding at most `limit` characters.
pub(crate) fn truncate_chars(s: &str, limit: usize) -> &str {
    match s.char_indices().nth(limit) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
