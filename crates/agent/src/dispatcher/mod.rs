//! Reasoning/action dispatchers.
//!
//! A dispatcher turns one iteration's transcript into a reasoning decision
//! and then into one validated [`Capability`]. Two strategies exist:
//! [`SchemaGuided`] asks for a single structured response, [`ToolCalling`]
//! uses native function calling with a forced reasoning call first.

mod schema_guided;
mod tool_calling;

pub use schema_guided::SchemaGuided;
pub use tool_calling::ToolCalling;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use sgr_research_core::error::{Error, Result};
use sgr_research_core::message::{Message, MessageToolCall};
use sgr_research_core::provider::{
    Provider, ProviderRequest, ResponseFormat, ToolChoice, ToolDefinition, Usage,
};
use sgr_research_core::research::{ResearchState, SharedContext};
use sgr_research_core::tool::ToolEnv;
use sgr_research_tools::{Capability, CapabilityKind, ReasoningStep, ToolRegistry};
use tracing::{debug, error};

use crate::agent::SharedConversation;
use crate::execution_log::{ExecutionLog, ModelInfo};
use crate::stream_event::{AgentStreamEvent, StreamSink};

/// The LLM endpoint and sampling settings used for every call.
#[derive(Clone)]
pub struct LlmSettings {
    pub provider: Arc<dyn Provider>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub model_info: ModelInfo,
}

/// The result of the reasoning phase.
#[derive(Debug, Clone)]
pub struct Decision {
    pub reasoning: ReasoningStep,
    /// Filled when the strategy decodes the action in the same response
    pub action: Option<Capability>,
}

/// Everything one iteration needs to talk to the LLM.
pub struct Step<'a> {
    pub iteration: u32,
    pub legal: Vec<CapabilityKind>,
    pub system_prompt: String,
    pub llm: &'a LlmSettings,
    pub registry: &'a ToolRegistry,
    pub context: &'a SharedContext,
    pub env: &'a ToolEnv,
    pub conversation: &'a SharedConversation,
    pub log: &'a mut ExecutionLog,
    pub sink: &'a StreamSink,
}

/// Text and tool calls gathered from one streamed response.
#[derive(Debug, Clone, Default)]
pub struct LlmReply {
    pub content: String,
    pub tool_calls: Vec<MessageToolCall>,
    pub usage: Option<Usage>,
}

#[async_trait]
pub trait Dispatcher: Send + Sync {
    fn name(&self) -> &'static str;

    async fn reasoning_phase(&self, step: &mut Step<'_>) -> Result<Decision>;

    async fn select_action_phase(&self, step: &mut Step<'_>, decision: &Decision) -> Result<Capability>;
}

impl Step<'_> {
    /// Call id of this iteration's action turn.
    pub fn action_id(&self) -> String {
        format!("{}-action", self.iteration)
    }

    pub async fn push(&self, message: Message) {
        self.conversation.write().await.push(message);
    }

    async fn messages(&self) -> Vec<Message> {
        let conversation = self.conversation.read().await;
        let mut messages = Vec::with_capacity(conversation.messages.len() + 1);
        messages.push(Message::system(&self.system_prompt));
        messages.extend(conversation.messages.iter().cloned());
        messages
    }

    /// Mark the run FAILED and hand the error back for propagation.
    pub async fn fail(&self, err: Error) -> Error {
        error!(iteration = self.iteration, error = %err, "Dispatch failed");
        self.context.write().await.state = ResearchState::Failed;
        err
    }

    /// Stream one request, forwarding text to the sink and logging both
    /// the request and a summary of the response.
    pub async fn call_llm(
        &mut self,
        tools: Vec<ToolDefinition>,
        tool_choice: Option<ToolChoice>,
        response_format: Option<ResponseFormat>,
    ) -> Result<LlmReply> {
        match self.stream_reply(tools, tool_choice, response_format).await {
            Ok(reply) => Ok(reply),
            Err(e) => Err(self.fail(e).await),
        }
    }

    async fn stream_reply(
        &mut self,
        tools: Vec<ToolDefinition>,
        tool_choice: Option<ToolChoice>,
        response_format: Option<ResponseFormat>,
    ) -> Result<LlmReply> {
        let request = ProviderRequest {
            model: self.llm.model.clone(),
            messages: self.messages().await,
            temperature: self.llm.temperature,
            max_tokens: Some(self.llm.max_tokens),
            tools,
            tool_choice,
            response_format,
            stream: true,
        };
        debug!(
            provider = self.llm.provider.name(),
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "LLM request"
        );
        let raw_request = serde_json::to_value(&request)?;
        let entry = self
            .log
            .record_request(self.iteration, self.llm.model_info.clone(), raw_request);

        let mut rx = self.llm.provider.stream(request).await?;
        let mut reply = LlmReply::default();
        while let Some(chunk) = rx.recv().await {
            let chunk = chunk?;
            if let Some(text) = chunk.content {
                self.sink.chunk(text.as_str());
                reply.content.push_str(&text);
            }
            reply.tool_calls.extend(chunk.tool_calls);
            if chunk.usage.is_some() {
                reply.usage = chunk.usage;
            }
            if chunk.done {
                break;
            }
        }

        self.log.attach_response(
            entry,
            json!({
                "content_length": reply.content.chars().count(),
                "tool_calls": reply
                    .tool_calls
                    .iter()
                    .map(|c| json!({"id": c.id, "name": c.name}))
                    .collect::<Vec<_>>(),
                "total_tokens": reply.usage.as_ref().map(|u| u.total_tokens),
            }),
        );
        Ok(reply)
    }

    /// Append the decided action to the transcript and the stream.
    pub async fn record_action(&self, reasoning: &ReasoningStep, capability: &Capability) {
        let id = self.action_id();
        let arguments = capability.arguments_json();
        self.push(Message::assistant_tool_call(
            reasoning.next_step_label(),
            MessageToolCall {
                id: id.clone(),
                name: capability.kind().name().to_string(),
                arguments,
            },
        ))
        .await;
        self.sink.send(AgentStreamEvent::ToolCall {
            id,
            name: capability.kind().name().to_string(),
            input: capability.arguments(),
        });
    }
}

/// Parse a tool call's argument string; an empty string is an empty object.
pub(crate) fn parse_arguments(tool: &str, raw: &str) -> Result<serde_json::Value> {
    if raw.trim().is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(raw)
        .map_err(|e| Error::Decode(format!("arguments of '{tool}' are not valid JSON: {e}")))
}
