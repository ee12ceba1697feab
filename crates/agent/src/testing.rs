//! Scripted provider, static search and fixtures for agent tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use sgr_research_config::LlmConfig;
use sgr_research_core::error::{ProviderError, SearchError};
use sgr_research_core::message::{Conversation, Message, MessageToolCall};
use sgr_research_core::provider::{Provider, ProviderRequest, ProviderResponse};
use sgr_research_core::research::{ResearchContext, SharedContext, SourceData};
use sgr_research_core::search::SearchProvider;
use sgr_research_core::tool::ToolEnv;
use sgr_research_tools::{ActionPolicy, ToolRegistry};
use tokio::sync::{RwLock, mpsc};

use crate::agent::SharedConversation;
use crate::dispatcher::{LlmSettings, Step};
use crate::execution_log::{ExecutionLog, ModelInfo};
use crate::stream_event::{AgentStreamEvent, StreamSink};

/// One scripted provider response.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Call { name: String, args: serde_json::Value },
}

/// Returns scripted replies in order; fails once the script runs out.
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let call_number = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        let reply = self.replies.lock().unwrap().pop_front();
        let message = match reply {
            Some(Reply::Text(text)) => Message::assistant(text),
            Some(Reply::Call { name, args }) => Message::assistant_tool_call(
                "",
                MessageToolCall {
                    id: format!("call_{call_number}"),
                    name,
                    arguments: args.to_string(),
                },
            ),
            None => {
                return Err(ProviderError::ApiError {
                    status_code: 500,
                    message: "script exhausted".into(),
                });
            }
        };
        Ok(ProviderResponse {
            message,
            usage: None,
            model: "scripted-model".into(),
        })
    }
}

fn reasoning_fields(remaining: &[&str]) -> serde_json::Value {
    json!({
        "reasoning_steps": ["Look at what is known", "Pick the next action"],
        "current_situation": "Research in progress",
        "plan_status": "On track",
        "enough_data": remaining.is_empty(),
        "remaining_steps": remaining,
        "task_completed": false,
    })
}

/// A schema-guided response selecting `tool` with `args`.
pub fn next_step(tool: &str, args: serde_json::Value) -> Reply {
    let mut envelope = reasoning_fields(&["Continue research"]);
    let mut function = json!({ "tool": tool, "reasoning": "scripted" });
    if let (Some(f), Some(a)) = (function.as_object_mut(), args.as_object()) {
        f.extend(a.clone());
    }
    envelope["function"] = function;
    Reply::Text(envelope.to_string())
}

/// A native call of the reasoning function.
pub fn reasoning_call(remaining: &[&str]) -> Reply {
    Reply::Call {
        name: "reasoning".into(),
        args: reasoning_fields(remaining),
    }
}

/// Search backend returning one source per query.
#[derive(Default)]
pub struct StaticSearch;

#[async_trait]
impl SearchProvider for StaticSearch {
    fn name(&self) -> &str {
        "static"
    }

    async fn search(
        &self,
        query: &str,
        _max_results: usize,
        _include_raw_content: bool,
    ) -> Result<Vec<SourceData>, SearchError> {
        let url = format!("https://example.com/{}", query.replace(' ', "-"));
        Ok(vec![SourceData::new(url, Some(format!("About {query}")), "snippet")])
    }

    async fn extract(&self, urls: &[String]) -> Result<Vec<SourceData>, SearchError> {
        Ok(urls
            .iter()
            .map(|u| SourceData::new(u.clone(), None, "").with_full_content("page"))
            .collect())
    }
}

/// Owned pieces a [`Step`] borrows from.
pub struct Fixture {
    pub provider: Arc<ScriptedProvider>,
    pub llm: LlmSettings,
    pub registry: ToolRegistry,
    pub context: SharedContext,
    pub env: ToolEnv,
    pub conversation: SharedConversation,
}

impl Fixture {
    pub fn new(replies: Vec<Reply>) -> Self {
        let provider = Arc::new(ScriptedProvider::new(replies));
        let config = LlmConfig::default();
        let llm = LlmSettings {
            provider: provider.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            model_info: ModelInfo::from_config(&config),
        };
        let mut conversation = Conversation::new();
        conversation.push(Message::user("ORIGINAL USER REQUEST: 'test task'"));
        Self {
            provider,
            llm,
            registry: ToolRegistry::default(),
            context: ResearchContext::shared(),
            env: ToolEnv::new(Arc::new(StaticSearch)),
            conversation: Arc::new(RwLock::new(conversation)),
        }
    }

    pub fn sink() -> (StreamSink, mpsc::UnboundedReceiver<AgentStreamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (StreamSink::new(tx), rx)
    }

    /// A first-iteration step over a fresh context.
    pub fn step<'a>(&'a self, log: &'a mut ExecutionLog, sink: &'a StreamSink) -> Step<'a> {
        let legal = self
            .registry
            .legal_actions(&ResearchContext::new(), &ActionPolicy::default())
            .unwrap();
        Step {
            iteration: 1,
            legal,
            system_prompt: "You are a test researcher.".into(),
            llm: &self.llm,
            registry: &self.registry,
            context: &self.context,
            env: &self.env,
            conversation: &self.conversation,
            log,
            sink,
        }
    }
}
