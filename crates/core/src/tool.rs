//! Tool trait: the abstraction over agent capabilities.
//!
//! A tool is a decoded, typed invocation: the LLM picked it and filled its
//! arguments, and executing it mutates the research context and returns the
//! text that goes back into the transcript.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ToolError;
use crate::research::SharedContext;
use crate::search::SearchProvider;

/// Everything a tool needs besides the research context.
#[derive(Clone)]
pub struct ToolEnv {
    /// Web search / extraction backend
    pub search: Arc<dyn SearchProvider>,

    /// Result count used when a search does not ask for one
    pub default_max_results: usize,

    /// Characters of each source shown in a search result
    pub content_limit: usize,

    /// Characters of each page shown in an extraction result
    pub extraction_limit: usize,

    /// Directory report artifacts are written to
    pub reports_dir: PathBuf,

    /// Searches kept verbatim after pruning
    pub max_searches_to_keep: usize,
}

impl ToolEnv {
    pub fn new(search: Arc<dyn SearchProvider>) -> Self {
        Self {
            search,
            default_max_results: 10,
            content_limit: 1500,
            extraction_limit: 5000,
            reports_dir: PathBuf::from("reports"),
            max_searches_to_keep: crate::pruning::DEFAULT_SEARCHES_TO_KEEP,
        }
    }

    pub fn with_reports_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.reports_dir = dir.into();
        self
    }
}

impl std::fmt::Debug for ToolEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolEnv")
            .field("search", &self.search.name())
            .field("default_max_results", &self.default_max_results)
            .field("content_limit", &self.content_limit)
            .field("extraction_limit", &self.extraction_limit)
            .field("reports_dir", &self.reports_dir)
            .field("max_searches_to_keep", &self.max_searches_to_keep)
            .finish()
    }
}

/// The core Tool trait.
///
/// Implemented by every capability the agent can select. Tools must not
/// hold the context lock across network calls.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "web_search").
    fn name(&self) -> &str;

    /// Execute against the shared research context.
    async fn execute(&self, ctx: &SharedContext, env: &ToolEnv) -> std::result::Result<String, ToolError>;
}
