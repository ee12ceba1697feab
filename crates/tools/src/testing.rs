//! Test doubles shared by the capability tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sgr_research_core::error::SearchError;
use sgr_research_core::research::SourceData;
use sgr_research_core::search::SearchProvider;
use sgr_research_core::tool::ToolEnv;

enum Mode {
    Fixed(Vec<String>),
    PerQuery,
    Failing,
}

/// Scripted search backend.
pub struct MockSearch {
    mode: Mode,
    max_results: Mutex<Option<usize>>,
    extracts: AtomicUsize,
}

impl MockSearch {
    fn new(mode: Mode) -> Self {
        Self {
            mode,
            max_results: Mutex::new(None),
            extracts: AtomicUsize::new(0),
        }
    }

    /// Every search returns these URLs.
    pub fn with_urls(urls: &[&str]) -> Self {
        Self::new(Mode::Fixed(urls.iter().map(|u| u.to_string()).collect()))
    }

    /// Every search returns one URL derived from the query.
    pub fn per_query() -> Self {
        Self::new(Mode::PerQuery)
    }

    pub fn failing() -> Self {
        Self::new(Mode::Failing)
    }

    pub fn last_max_results(&self) -> Option<usize> {
        *self.max_results.lock().unwrap()
    }

    pub fn extract_calls(&self) -> usize {
        self.extracts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchProvider for MockSearch {
    fn name(&self) -> &str {
        "mock"
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
        _include_raw_content: bool,
    ) -> Result<Vec<SourceData>, SearchError> {
        *self.max_results.lock().unwrap() = Some(max_results);
        let urls = match &self.mode {
            Mode::Fixed(urls) => urls.clone(),
            Mode::PerQuery => vec![format!("https://example.com/{}", query.replace(' ', "-"))],
            Mode::Failing => return Err(SearchError::Network("connection refused".into())),
        };
        Ok(urls
            .into_iter()
            .map(|u| {
                let title = format!("Title {u}");
                let snippet = format!("Snippet for {u}");
                SourceData::new(u, Some(title), snippet)
            })
            .collect())
    }

    async fn extract(&self, urls: &[String]) -> Result<Vec<SourceData>, SearchError> {
        self.extracts.fetch_add(1, Ordering::SeqCst);
        if matches!(self.mode, Mode::Failing) {
            return Err(SearchError::Network("connection refused".into()));
        }
        Ok(urls
            .iter()
            .map(|u| SourceData::new(u.clone(), None, "").with_full_content(format!("Page content of {u}")))
            .collect())
    }
}

pub fn env_with(search: Arc<MockSearch>) -> ToolEnv {
    ToolEnv::new(search)
}

pub fn env() -> ToolEnv {
    env_with(Arc::new(MockSearch::with_urls(&[])))
}
