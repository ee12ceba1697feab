//! Research capabilities for the SGR research agent.
//!
//! Capabilities give the agent its actions: reason, plan, ask for
//! clarification, search the web, extract pages, write the report and
//! finish. The [`registry`] decides which of them are legal at each step.

pub mod capability;
pub mod clarification;
pub mod completion;
pub mod extract_content;
pub mod planning;
pub mod reasoning;
pub mod registry;
pub mod report;
pub mod tavily;
pub mod web_search;

#[cfg(test)]
mod testing;

pub use capability::{Capability, CapabilityKind};
pub use reasoning::ReasoningStep;
pub use registry::{ActionPolicy, ToolRegistry, default_toolkit};
pub use tavily::TavilySearch;

use std::sync::Arc;

use sgr_research_core::search::{DisabledSearch, SearchProvider};

/// Build the search backend from an optional API key.
///
/// Without a key every search fails with a "not configured" error, which
/// the agent sees as a tool result rather than a crash.
pub fn build_search(api_key: Option<&str>, base_url: &str) -> Arc<dyn SearchProvider> {
    match api_key.map(|key| TavilySearch::new(key, base_url)) {
        Some(Ok(tavily)) => Arc::new(tavily),
        Some(Err(e)) => {
            tracing::warn!(error = %e, "Search backend unavailable");
            Arc::new(DisabledSearch)
        }
        None => {
            tracing::warn!("No search API key configured, web search is disabled");
            Arc::new(DisabledSearch)
        }
    }
}
