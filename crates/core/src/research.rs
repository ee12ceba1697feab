//! Research context: the single mutable state record of one agent.
//!
//! The execution loop and every executed capability mutate the same
//! [`ResearchContext`]. It is shared as [`SharedContext`] so that a status
//! caller can read it while the loop is suspended on the LLM or on a
//! clarification.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Notify, RwLock};

/// A research context shared between the loop, the tools and status readers.
pub type SharedContext = Arc<RwLock<ResearchContext>>;

/// Lifecycle state of a research agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchState {
    #[default]
    Inited,
    Researching,
    WaitingForClarification,
    Completed,
    Failed,
    Error,
}

impl ResearchState {
    /// COMPLETED, FAILED and ERROR end the loop.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inited => "inited",
            Self::Researching => "researching",
            Self::WaitingForClarification => "waiting_for_clarification",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ResearchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A research source (search hit or extracted page).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceData {
    /// Citation number, assigned by the context on ingestion
    pub number: u32,

    /// Page title
    #[serde(default = "untitled")]
    pub title: String,

    /// Source URL (identity key)
    pub url: String,

    /// Search snippet or summary
    #[serde(default)]
    pub snippet: String,

    /// Full scraped content
    #[serde(default)]
    pub full_content: String,

    /// Character count of `full_content`
    #[serde(default)]
    pub char_count: usize,
}

fn untitled() -> String {
    "Untitled".into()
}

impl SourceData {
    /// Create an unnumbered source.
    pub fn new(url: impl Into<String>, title: Option<String>, snippet: impl Into<String>) -> Self {
        Self {
            number: 0,
            title: title.filter(|t| !t.trim().is_empty()).unwrap_or_else(untitled),
            url: url.into(),
            snippet: snippet.into(),
            full_content: String::new(),
            char_count: 0,
        }
    }

    /// Attach full page content, keeping `char_count` in sync.
    pub fn with_full_content(mut self, content: impl Into<String>) -> Self {
        self.set_full_content(content);
        self
    }

    pub fn set_full_content(&mut self, content: impl Into<String>) {
        self.full_content = content.into();
        self.char_count = self.full_content.chars().count();
    }
}

impl fmt::Display for SourceData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} - {}", self.number, self.title, self.url)
    }
}

/// One executed search with its citations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub query: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,

    #[serde(default)]
    pub citations: Vec<SourceData>,

    pub timestamp: DateTime<Utc>,
}

impl SearchResult {
    pub fn new(query: impl Into<String>, citations: Vec<SourceData>) -> Self {
        Self {
            query: query.into(),
            answer: None,
            citations,
            timestamp: Utc::now(),
        }
    }
}

impl fmt::Display for SearchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Search: '{}' ({} sources)", self.query, self.citations.len())
    }
}

/// Binary suspend/resume signal used while waiting for a clarification.
///
/// Clones share the same flag, so the loop can wait on a clone without
/// holding the context lock.
#[derive(Clone, Default)]
pub struct ResumeSignal {
    inner: Arc<SignalInner>,
}

#[derive(Default)]
struct SignalInner {
    flag: AtomicBool,
    notify: Notify,
}

impl ResumeSignal {
    pub fn clear(&self) {
        self.inner.flag.store(false, Ordering::SeqCst);
    }

    pub fn set(&self) {
        self.inner.flag.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_set(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// Wait until [`set`](Self::set) is called (returns at once if already set).
    pub async fn wait(&self) {
        loop {
            // Register interest before checking the flag so a concurrent
            // `set` cannot be missed.
            let notified = self.inner.notify.notified();
            if self.is_set() {
                return;
            }
            notified.await;
        }
    }
}

impl fmt::Debug for ResumeSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResumeSignal")
            .field("set", &self.is_set())
            .finish()
    }
}

/// The shared, mutable research state of one agent.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ResearchContext {
    /// Current lifecycle state
    pub state: ResearchState,

    /// Loop pass counter, incremented once per iteration
    pub iteration: u32,

    /// Performed searches, in execution order
    #[serde(default)]
    pub searches: Vec<SearchResult>,

    /// Known sources keyed by URL
    #[serde(default)]
    pub sources: HashMap<String, SourceData>,

    /// Synopsis of searches evicted by pruning
    #[serde(default)]
    pub previous_searches_summary: String,

    pub searches_used: u32,

    pub clarifications_used: u32,

    /// One-way latch: once set only completion is legal
    pub report_created: bool,

    /// Where the report artifact was written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_path: Option<String>,

    /// Most recent reasoning decision
    #[serde(default)]
    pub current_state_reasoning: Option<serde_json::Value>,

    #[serde(skip)]
    pub clarification_received: ResumeSignal,
}

impl ResearchContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a fresh context for sharing.
    pub fn shared() -> SharedContext {
        Arc::new(RwLock::new(Self::new()))
    }

    /// The number the next new source will receive.
    ///
    /// Starts at `len(sources) + 1`, raised past any number still held so
    /// citations stay unique after pruning has shrunk the map.
    pub fn next_citation_number(&self) -> u32 {
        let by_len = self.sources.len() as u32 + 1;
        let by_max = self.sources.values().map(|s| s.number).max().unwrap_or(0) + 1;
        by_len.max(by_max)
    }

    /// Number and store sources returned by a search or extraction.
    ///
    /// A URL already known keeps its citation number; its content is
    /// refreshed when the new copy carries full text. Returns the sources
    /// in provider order with their final numbers.
    pub fn ingest_sources(&mut self, sources: Vec<SourceData>) -> Vec<SourceData> {
        let mut next = self.next_citation_number();
        let mut numbered = Vec::with_capacity(sources.len());

        for mut source in sources {
            match self.sources.get_mut(&source.url) {
                Some(existing) => {
                    source.number = existing.number;
                    if source.title == untitled() {
                        source.title = existing.title.clone();
                    }
                    if !source.full_content.is_empty() {
                        existing.set_full_content(source.full_content.clone());
                    } else if !existing.full_content.is_empty() {
                        source.set_full_content(existing.full_content.clone());
                    }
                }
                None => {
                    source.number = next;
                    next += 1;
                    self.sources.insert(source.url.clone(), source.clone());
                }
            }
            numbered.push(source);
        }

        numbered
    }

    /// Known sources ordered by citation number.
    pub fn sources_by_number(&self) -> Vec<&SourceData> {
        let mut sources: Vec<&SourceData> = self.sources.values().collect();
        sources.sort_by_key(|s| s.number);
        sources
    }

    /// Serializable view excluding raw search payloads and the resume signal.
    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            state: self.state,
            iteration: self.iteration,
            searches_used: self.searches_used,
            clarifications_used: self.clarifications_used,
            report_created: self.report_created,
            report_path: self.report_path.clone(),
            previous_searches_summary: self.previous_searches_summary.clone(),
            current_state_reasoning: self.current_state_reasoning.clone(),
            sources_count: self.sources.len(),
        }
    }
}

/// The persisted/status view of a [`ResearchContext`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub state: ResearchState,
    pub iteration: u32,
    pub searches_used: u32,
    pub clarifications_used: u32,
    pub report_created: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_path: Option<String>,
    #[serde(default)]
    pub previous_searches_summary: String,
    #[serde(default)]
    pub current_state_reasoning: Option<serde_json::Value>,
    #[serde(default)]
    pub sources_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn source(url: &str) -> SourceData {
        SourceData::new(url, Some(format!("Title {url}")), "snippet")
    }

    #[test]
    fn terminal_states() {
        assert!(ResearchState::Completed.is_terminal());
        assert!(ResearchState::Failed.is_terminal());
        assert!(ResearchState::Error.is_terminal());
        assert!(!ResearchState::WaitingForClarification.is_terminal());
        assert!(!ResearchState::Inited.is_terminal());
    }

    #[test]
    fn state_serializes_snake_case() {
        let json = serde_json::to_string(&ResearchState::WaitingForClarification).unwrap();
        assert_eq!(json, r#""waiting_for_clarification""#);
    }

    #[test]
    fn source_display_and_defaults() {
        let s = SourceData::new("https://a.example", None, "");
        assert_eq!(s.title, "Untitled");
        let s = SourceData { number: 3, ..s };
        assert_eq!(s.to_string(), "[3] Untitled - https://a.example");
    }

    #[test]
    fn full_content_updates_char_count() {
        let s = source("https://a").with_full_content("héllo");
        assert_eq!(s.char_count, 5);
    }

    #[test]
    fn ingest_numbers_from_len_plus_one() {
        let mut ctx = ResearchContext::new();
        let first = ctx.ingest_sources(vec![source("https://a"), source("https://b")]);
        assert_eq!(first.iter().map(|s| s.number).collect::<Vec<_>>(), vec![1, 2]);

        let second = ctx.ingest_sources(vec![source("https://c")]);
        assert_eq!(second[0].number, 3);
        assert_eq!(ctx.sources.len(), 3);
    }

    #[test]
    fn ingest_keeps_number_of_known_url() {
        let mut ctx = ResearchContext::new();
        ctx.ingest_sources(vec![source("https://a"), source("https://b")]);
        let again = ctx.ingest_sources(vec![
            source("https://b").with_full_content("body"),
            source("https://c"),
        ]);
        assert_eq!(again[0].number, 2);
        assert_eq!(again[1].number, 3);
        assert_eq!(ctx.sources["https://b"].full_content, "body");
        assert_eq!(ctx.sources.len(), 3);
    }

    #[test]
    fn numbers_stay_unique_after_eviction() {
        let mut ctx = ResearchContext::new();
        ctx.ingest_sources(vec![source("https://a"), source("https://b"), source("https://c")]);
        ctx.sources.remove("https://a");
        ctx.sources.remove("https://b");
        // len + 1 would be 2, but 3 is still held by https://c
        assert_eq!(ctx.next_citation_number(), 4);
    }

    #[test]
    fn snapshot_excludes_payloads() {
        let mut ctx = ResearchContext::new();
        ctx.ingest_sources(vec![source("https://a")]);
        ctx.searches.push(SearchResult::new("q", vec![]));
        let json = serde_json::to_value(ctx.snapshot()).unwrap();
        assert!(json.get("searches").is_none());
        assert!(json.get("sources").is_none());
        assert!(json.get("clarification_received").is_none());
        assert_eq!(json["sources_count"], 1);
    }

    #[tokio::test]
    async fn resume_signal_wakes_waiter() {
        let signal = ResumeSignal::default();
        signal.clear();
        let waiter = signal.clone();
        let handle = tokio::spawn(async move { waiter.wait().await });
        tokio::task::yield_now().await;
        signal.set();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("waiter should wake")
            .unwrap();
        assert!(signal.is_set());
    }

    #[tokio::test]
    async fn resume_signal_already_set_returns() {
        let signal = ResumeSignal::default();
        signal.set();
        tokio::time::timeout(Duration::from_millis(100), signal.wait())
            .await
            .expect("set signal must not block");
    }
}
