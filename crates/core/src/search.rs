//! Search provider trait: the abstraction over web search backends.

use async_trait::async_trait;

use crate::error::SearchError;
use crate::research::SourceData;

/// A web search and page extraction backend.
///
/// Returned sources are unnumbered; citation numbers are assigned when the
/// research context ingests them.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// A human-readable name for this backend (e.g., "tavily").
    fn name(&self) -> &str;

    /// Run a search query. With `include_raw_content` the backend also
    /// returns the full page text of each hit.
    async fn search(
        &self,
        query: &str,
        max_results: usize,
        include_raw_content: bool,
    ) -> std::result::Result<Vec<SourceData>, SearchError>;

    /// Fetch the full content of the given URLs.
    async fn extract(&self, urls: &[String]) -> std::result::Result<Vec<SourceData>, SearchError>;
}

/// Backend used when no search API key is configured.
pub struct DisabledSearch;

#[async_trait]
impl SearchProvider for DisabledSearch {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn search(
        &self,
        _query: &str,
        _max_results: usize,
        _include_raw_content: bool,
    ) -> std::result::Result<Vec<SourceData>, SearchError> {
        Err(SearchError::NotConfigured("no search API key set".into()))
    }

    async fn extract(&self, _urls: &[String]) -> std::result::Result<Vec<SourceData>, SearchError> {
        Err(SearchError::NotConfigured("no search API key set".into()))
    }
}
