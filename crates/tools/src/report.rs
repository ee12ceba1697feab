//! Report creation: writes the final Markdown artifact and latches the
//! context so that only completion remains legal.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sgr_research_core::error::ToolError;
use sgr_research_core::research::SharedContext;
use sgr_research_core::tool::{Tool, ToolEnv};
use tracing::info;

pub const DESCRIPTION: &str = "Create a comprehensive detailed report with citations as the \
final step of research.";

pub const VALIDATION_FAILED: &str = "ERROR: Report validation failed. Title, direct_answer, and \
content cannot be empty. Please provide a complete report with actual research findings.";

const MAX_TITLE_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateReport {
    #[serde(default)]
    pub reasoning: String,

    pub title: String,

    /// Short, specific answer to the original question
    pub direct_answer: String,

    /// Copy of the user request, to keep the report in its language
    #[serde(default)]
    pub user_request_language_reference: String,

    /// Step-by-step math, when the answer needs it
    #[serde(default)]
    pub calculations: String,

    /// Markdown body with inline citations
    pub content: String,

    pub confidence: Confidence,
}

impl CreateReport {
    pub fn parameters_schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "reasoning": { "type": "string", "description": "Why ready to create report now" },
                "title": { "type": "string", "description": "Report title" },
                "direct_answer": {
                    "type": "string",
                    "description": "Concise, direct answer to the original question (1-3 words or a simple phrase)"
                },
                "user_request_language_reference": {
                    "type": "string",
                    "description": "Copy of original user request to ensure language consistency"
                },
                "calculations": {
                    "type": "string",
                    "description": "Step-by-step mathematical work if the answer involves numbers, dates or ages"
                },
                "content": {
                    "type": "string",
                    "description": "Comprehensive research report with inline [n] citations, in the SAME LANGUAGE as the request"
                },
                "confidence": { "type": "string", "enum": ["high", "medium", "low"] }
            },
            "required": [
                "reasoning", "title", "direct_answer", "user_request_language_reference",
                "content", "confidence"
            ]
        })
    }

    fn is_complete(&self) -> bool {
        !self.title.trim().is_empty()
            && !self.direct_answer.trim().is_empty()
            && !self.content.trim().is_empty()
    }

    fn render(&self, created: &str, sources: &[String]) -> String {
        let mut md = format!("# {}\n\n*Created: {created}*\n\n", self.title);
        if !self.calculations.trim().is_empty() {
            md.push_str(&format!("## Calculations\n\n{}\n\n", self.calculations));
        }
        md.push_str(&format!("## Direct Answer\n\n**{}**\n\n", self.direct_answer));
        md.push_str(&format!("## Detailed Report\n\n{}\n\n", self.content));
        md.push_str("## Sources\n\n");
        md.push_str(&sources.join("\n"));
        md.push('\n');
        md
    }
}

/// File-name-safe prefix of a report title.
fn safe_title(title: &str) -> String {
    let safe: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .take(MAX_TITLE_CHARS)
        .collect();
    let safe = safe.trim();
    if safe.is_empty() {
        "report".into()
    } else {
        safe.into()
    }
}

#[async_trait]
impl Tool for CreateReport {
    fn name(&self) -> &str {
        "create_report"
    }

    async fn execute(&self, ctx: &SharedContext, env: &ToolEnv) -> Result<String, ToolError> {
        if !self.is_complete() {
            return Ok(VALIDATION_FAILED.into());
        }

        let (sources, sources_count) = {
            let guard = ctx.read().await;
            let lines: Vec<String> = guard
                .sources_by_number()
                .into_iter()
                .map(|s| format!("- {s}"))
                .collect();
            (lines, guard.sources.len())
        };

        let now = Local::now();
        let markdown = self.render(&now.format("%Y-%m-%d %H:%M:%S").to_string(), &sources);
        let filename = format!("{}_{}.md", now.format("%Y%m%d_%H%M%S"), safe_title(&self.title));
        let path: PathBuf = env.reports_dir.join(filename);

        let write_failed = |e: std::io::Error| ToolError::ExecutionFailed {
            tool_name: "create_report".into(),
            reason: format!("failed to write report to {}: {e}", path.display()),
        };
        tokio::fs::create_dir_all(&env.reports_dir)
            .await
            .map_err(write_failed)?;
        tokio::fs::write(&path, markdown).await.map_err(write_failed)?;

        {
            let mut guard = ctx.write().await;
            guard.report_created = true;
            guard.report_path = Some(path.display().to_string());
        }

        let word_count = self.content.split_whitespace().count();
        info!(
            title = %self.title,
            confidence = ?self.confidence,
            words = word_count,
            sources = sources_count,
            path = %path.display(),
            "Report written"
        );

        let summary = json!({
            "title": self.title,
            "direct_answer": self.direct_answer,
            "content": self.content,
            "confidence": self.confidence,
            "sources_count": sources_count,
            "word_count": word_count,
            "filepath": path.display().to_string(),
            "timestamp": now.to_rfc3339(),
        });
        serde_json::to_string_pretty(&summary).map_err(|e| ToolError::ExecutionFailed {
            tool_name: "create_report".into(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::env;
    use sgr_research_core::research::{ResearchContext, SourceData};

    fn report() -> CreateReport {
        CreateReport {
            reasoning: "enough data".into(),
            title: "BMW X6 Prices: 2025 / Overview".into(),
            direct_answer: "From $74,000".into(),
            user_request_language_reference: "bmw x6 price".into(),
            calculations: String::new(),
            content: "Prices start at $74,000 [1].".into(),
            confidence: Confidence::High,
        }
    }

    #[tokio::test]
    async fn writes_markdown_and_latches() {
        let dir = tempfile::tempdir().unwrap();
        let env = env().with_reports_dir(dir.path());
        let ctx = ResearchContext::shared();
        ctx.write().await.ingest_sources(vec![
            SourceData::new("https://b.example", Some("B".into()), ""),
            SourceData::new("https://a.example", Some("A".into()), ""),
        ]);

        let out = report().execute(&ctx, &env).await.unwrap();
        let summary: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(summary["sources_count"], 2);
        assert_eq!(summary["confidence"], "high");

        let guard = ctx.read().await;
        assert!(guard.report_created);
        let path = guard.report_path.clone().unwrap();
        let md = std::fs::read_to_string(&path).unwrap();

        let title = md.find("# BMW X6").unwrap();
        let answer = md.find("## Direct Answer").unwrap();
        let detail = md.find("## Detailed Report").unwrap();
        let sources = md.find("## Sources").unwrap();
        assert!(title < answer && answer < detail && detail < sources);
        assert!(!md.contains("## Calculations"));
        assert!(md.contains("- [1] B - https://b.example\n- [2] A - https://a.example"));
        assert!(path.ends_with("_BMW X6 Prices 2025  Overview.md"));
    }

    #[tokio::test]
    async fn calculations_come_before_answer() {
        let dir = tempfile::tempdir().unwrap();
        let env = env().with_reports_dir(dir.path());
        let ctx = ResearchContext::shared();
        let mut r = report();
        r.calculations = "2025 - 1943 = 82".into();
        r.execute(&ctx, &env).await.unwrap();

        let path = ctx.read().await.report_path.clone().unwrap();
        let md = std::fs::read_to_string(path).unwrap();
        assert!(md.find("## Calculations").unwrap() < md.find("## Direct Answer").unwrap());
    }

    #[tokio::test]
    async fn empty_fields_fail_without_latching() {
        let dir = tempfile::tempdir().unwrap();
        let env = env().with_reports_dir(dir.path());
        let ctx = ResearchContext::shared();
        let mut r = report();
        r.content = "   ".into();
        let out = r.execute(&ctx, &env).await.unwrap();
        assert_eq!(out, VALIDATION_FAILED);
        assert!(!ctx.read().await.report_created);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn write_failure_does_not_latch() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();
        let env = env().with_reports_dir(&blocker);
        let ctx = ResearchContext::shared();
        let err = report().execute(&ctx, &env).await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
        assert!(!ctx.read().await.report_created);
    }

    #[test]
    fn safe_title_filters_and_truncates() {
        assert_eq!(safe_title("a/b:c"), "abc");
        assert_eq!(safe_title("???"), "report");
        assert_eq!(safe_title(&"x".repeat(80)).len(), 50);
    }
}
