//! The research agent loop: the heart of SGR Research.
//!
//! The agent follows a **Reason → Select → Act** cycle:
//!
//! 1. **Reason** about the current situation (structured decision)
//! 2. **Select** one capability from the set legal at this step
//! 3. **Act**: execute it against the research context and append the
//!    result to the transcript
//!
//! The loop continues until a capability finishes the task, the iteration
//! cap is reached, a decode error fails the run, or the caller cancels.

pub mod agent;
pub mod dispatcher;
pub mod execution_log;
pub mod prompt;
pub mod stream_event;

#[cfg(test)]
mod testing;

pub use agent::{AgentHandle, AgentOutcome, AgentVariant, ResearchAgent, SharedConversation};
pub use dispatcher::{Decision, Dispatcher, LlmSettings, SchemaGuided, ToolCalling};
pub use execution_log::{AgentLogDocument, ExecutionLog, LogEntry, LogEntryKind, ModelInfo};
pub use prompt::{DEFAULT_SYSTEM_PROMPT, SystemPrompt};
pub use stream_event::{AgentStreamEvent, StreamSink};
