//! Content extraction: fetches full page text for specific URLs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sgr_research_core::error::ToolError;
use sgr_research_core::research::SharedContext;
use sgr_research_core::tool::{Tool, ToolEnv};
use tracing::{debug, info};

use crate::web_search::truncate_chars;

pub const DESCRIPTION: &str = "Extract full content from specific URLs. Use it to deep dive into \
particular sources found in search results.";

pub const MAX_URLS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractContent {
    #[serde(default)]
    pub reasoning: String,

    /// 1-5 URLs
    pub urls: Vec<String>,
}

impl ExtractContent {
    pub fn parameters_schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "reasoning": { "type": "string", "description": "Why content extraction is needed from these URLs" },
                "urls": {
                    "type": "array", "items": { "type": "string" },
                    "minItems": 1, "maxItems": MAX_URLS,
                    "description": "List of URLs to extract content from"
                }
            },
            "required": ["reasoning", "urls"]
        })
    }

    pub fn validate(&self) -> Result<(), ToolError> {
        if self.urls.is_empty() || self.urls.len() > MAX_URLS {
            return Err(ToolError::InvalidArguments(format!(
                "extract_content takes 1-{MAX_URLS} urls, got {}",
                self.urls.len()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Tool for ExtractContent {
    fn name(&self) -> &str {
        "extract_content"
    }

    async fn execute(&self, ctx: &SharedContext, env: &ToolEnv) -> Result<String, ToolError> {
        info!(count = self.urls.len(), limit = env.extraction_limit, "Extracting page content");

        let pages = env.search.extract(&self.urls).await?;
        let numbered = ctx.write().await.ingest_sources(pages);

        let mut out = String::from("Extracted Content:\n\n");
        for source in &numbered {
            out.push_str(&format!("[{}] {}\n", source.number, source.title));
            out.push_str(&format!("URL: {}\n", source.url));
            let body = if source.full_content.is_empty() {
                source.snippet.as_str()
            } else {
                truncate_chars(&source.full_content, env.extraction_limit)
            };
            out.push_str(&format!("Content: {body}\n\n"));
        }

        debug!(pages = numbered.len(), "Extraction finished");
        Ok(out)
    }
}
