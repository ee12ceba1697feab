//! Agent-level streaming events.
//!
//! `AgentStreamEvent` wraps provider-level stream chunks and loop milestones
//! into events a front end (the CLI, or any other consumer of the channel)
//! can render while the agent works.

use serde::{Deserialize, Serialize};
use sgr_research_core::research::ResearchState;
use tokio::sync::mpsc;

/// Events emitted by the agent during execution.
///
/// - `chunk`: partial text token from the LLM
/// - `tool_call`: the agent decided on a capability
/// - `tool_result`: capability execution completed
/// - `thought`: summary of the reasoning step
/// - `clarification`: the agent is paused and waiting for answers
/// - `done`: the run has finished
/// - `error`: the run failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentStreamEvent {
    /// Partial text token from the LLM.
    Chunk { content: String },

    /// The agent is calling a capability.
    ToolCall {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    /// Capability execution completed.
    ToolResult {
        id: String,
        name: String,
        output: String,
    },

    /// Reasoning summary of the current iteration.
    Thought { content: String },

    /// Questions the caller must answer before research continues.
    Clarification { questions: String },

    /// The run is over.
    Done {
        agent_id: String,
        state: ResearchState,
        iterations: u32,
    },

    /// An error ended the run.
    Error { message: String },
}

impl AgentStreamEvent {
    /// Event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Chunk { .. } => "chunk",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Thought { .. } => "thought",
            Self::Clarification { .. } => "clarification",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }
}

/// Where the agent writes its events. A sink without a receiver drops them.
#[derive(Debug, Default)]
pub struct StreamSink {
    tx: Option<mpsc::UnboundedSender<AgentStreamEvent>>,
}

impl StreamSink {
    pub fn new(tx: mpsc::UnboundedSender<AgentStreamEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A sink that discards everything.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn send(&self, event: AgentStreamEvent) {
        if let Some(tx) = &self.tx {
            // A dropped receiver only means nobody is listening any more
            let _ = tx.send(event);
        }
    }

    pub fn chunk(&self, content: impl Into<String>) {
        let content = content.into();
        if !content.is_empty() {
            self.send(AgentStreamEvent::Chunk { content });
        }
    }

    /// Send the final event and close the channel.
    pub fn finish(&mut self, last: AgentStreamEvent) {
        self.send(last);
        self.tx = None;
    }

    pub fn is_finished(&self) -> bool {
        self.tx.is_none()
    }
}
