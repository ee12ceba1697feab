//! Context pruning: bounds the research context after every search.
//!
//! Only the most recent searches are kept verbatim. Older ones are folded
//! into `previous_searches_summary` and the sources they alone cited are
//! dropped.

use std::collections::HashSet;

use crate::research::{ResearchContext, SearchResult};

/// Default number of searches kept verbatim.
pub const DEFAULT_SEARCHES_TO_KEEP: usize = 1;

const ANSWER_PREVIEW_CHARS: usize = 200;
const SUMMARY_SOURCES: usize = 2;
const SUMMARY_SEPARATOR: &str = "\n\n--- Previous searches ---\n";

impl ResearchContext {
    /// Keep the last `keep` searches, summarize and evict the rest.
    ///
    /// Afterwards `sources` only holds URLs cited by the retained searches
    /// and the summary is never shorter than before.
    pub fn prune_searches(&mut self, keep: usize) {
        if self.searches.len() <= keep {
            return;
        }

        let evicted: Vec<SearchResult> = self.searches.drain(..self.searches.len() - keep).collect();
        let synopsis = evicted
            .iter()
            .map(summarize_search)
            .collect::<Vec<_>>()
            .join("\n");

        if self.previous_searches_summary.is_empty() {
            self.previous_searches_summary = synopsis;
        } else {
            self.previous_searches_summary.push_str(SUMMARY_SEPARATOR);
            self.previous_searches_summary.push_str(&synopsis);
        }

        let retained: HashSet<&str> = self
            .searches
            .iter()
            .flat_map(|s| s.citations.iter().map(|c| c.url.as_str()))
            .collect();
        self.sources.retain(|url, _| retained.contains(url.as_str()));

        tracing::debug!(
            evicted = evicted.len(),
            kept = self.searches.len(),
            sources = self.sources.len(),
            "Pruned old searches"
        );
    }
}

fn summarize_search(search: &SearchResult) -> String {
    let mut line = format!("Query: '{}'", search.query);
    if let Some(answer) = &search.answer {
        let preview: String = answer.chars().take(ANSWER_PREVIEW_CHARS).collect();
        line.push_str(&format!(" - Answer: {preview}..."));
    }
    if !search.citations.is_empty() {
        let key_sources = search
            .citations
            .iter()
            .take(SUMMARY_SOURCES)
            .map(|c| format!("{} ({})", c.title, c.url))
            .collect::<Vec<_>>()
            .join(", ");
        line.push_str(&format!(" - Sources: {key_sources}"));
    }
    line
}
