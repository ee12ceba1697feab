//! Execution log: the append-only step record of one agent run.
//!
//! Every reasoning decision, capability execution and outbound LLM request
//! is appended as a [`LogEntry`]. When the run ends the entries are written
//! with a context snapshot as one [`AgentLogDocument`] JSON file.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use sgr_research_config::LlmConfig;
use sgr_research_core::error::{Error, Result};
use sgr_research_core::research::ContextSnapshot;
use tracing::debug;

/// LLM settings recorded with every request and with the final document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub proxy: Option<String>,
}

impl ModelInfo {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            model: config.model.clone(),
            base_url: config.base_url.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            proxy: config
                .proxy
                .as_ref()
                .filter(|p| !p.trim().is_empty())
                .cloned(),
        }
    }
}

/// One step record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// The context iteration at logging time
    pub step_number: u32,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: LogEntryKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step_type", rename_all = "snake_case")]
pub enum LogEntryKind {
    Reasoning {
        agent_reasoning: serde_json::Value,
    },
    ToolExecution {
        tool_name: String,
        agent_tool_context: serde_json::Value,
        agent_tool_execution_result: String,
    },
    #[serde(rename = "openai_request")]
    LlmRequest {
        model_info: ModelInfo,
        raw_request: serde_json::Value,
        #[serde(default)]
        response_info: Option<serde_json::Value>,
    },
}

impl LogEntryKind {
    pub fn step_type(&self) -> &'static str {
        match self {
            Self::Reasoning { .. } => "reasoning",
            Self::ToolExecution { .. } => "tool_execution",
            Self::LlmRequest { .. } => "openai_request",
        }
    }
}

/// Append-only list of [`LogEntry`] values.
#[derive(Debug, Clone, Default)]
pub struct ExecutionLog {
    entries: Vec<LogEntry>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, step_number: u32, kind: LogEntryKind) -> usize {
        self.entries.push(LogEntry {
            step_number,
            timestamp: Utc::now(),
            kind,
        });
        self.entries.len() - 1
    }

    pub fn record_reasoning(&mut self, step_number: u32, reasoning: serde_json::Value) {
        self.push(step_number, LogEntryKind::Reasoning { agent_reasoning: reasoning });
    }

    pub fn record_tool(
        &mut self,
        step_number: u32,
        tool_name: &str,
        arguments: serde_json::Value,
        result: &str,
    ) {
        self.push(
            step_number,
            LogEntryKind::ToolExecution {
                tool_name: tool_name.to_string(),
                agent_tool_context: arguments,
                agent_tool_execution_result: result.to_string(),
            },
        );
    }

    /// Record an outbound request; returns its index for [`attach_response`](Self::attach_response).
    pub fn record_request(
        &mut self,
        step_number: u32,
        model_info: ModelInfo,
        raw_request: serde_json::Value,
    ) -> usize {
        self.push(
            step_number,
            LogEntryKind::LlmRequest {
                model_info,
                raw_request,
                response_info: None,
            },
        )
    }

    pub fn attach_response(&mut self, index: usize, info: serde_json::Value) {
        if let Some(LogEntry {
            kind: LogEntryKind::LlmRequest { response_info, .. },
            ..
        }) = self.entries.get_mut(index)
        {
            *response_info = Some(info);
        }
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<LogEntry> {
        self.entries
    }
}

/// The JSON document persisted when a run ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentLogDocument {
    pub id: String,
    pub task: String,
    pub model_info: ModelInfo,
    pub context: ContextSnapshot,
    pub log: Vec<LogEntry>,
}

impl AgentLogDocument {
    /// `<YYYYmmdd-HHMMSS>-<agent id>-log.json`
    pub fn file_name(&self) -> String {
        format!("{}-{}-log.json", Local::now().format("%Y%m%d-%H%M%S"), self.id)
    }

    /// Write the document into `dir`, creating it if needed.
    pub async fn persist(&self, dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| Error::Persistence(format!("cannot create {}: {e}", dir.display())))?;
        let path = dir.join(self.file_name());
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| Error::Persistence(format!("cannot write {}: {e}", path.display())))?;
        debug!(path = %path.display(), entries = self.log.len(), "Agent log written");
        Ok(path)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Persistence(format!("cannot read {}: {e}", path.display())))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Number of entries per step type, in first-seen order.
    pub fn step_counts(&self) -> Vec<(&'static str, usize)> {
        let mut counts: Vec<(&'static str, usize)> = Vec::new();
        for entry in &self.log {
            let step_type = entry.kind.step_type();
            match counts.iter_mut().find(|(t, _)| *t == step_type) {
                Some((_, n)) => *n += 1,
                None => counts.push((step_type, 1)),
            }
        }
        counts
    }
}
