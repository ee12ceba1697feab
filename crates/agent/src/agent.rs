//! The research agent: the iteration state machine.
//!
//! Each iteration: increment and check the iteration cap, compute the legal
//! action set, run the dispatcher's reasoning and action-selection phases,
//! execute the chosen capability and feed its text back into the transcript.
//! A clarification pauses the loop until [`AgentHandle::provide_clarification`]
//! resumes it.
//!
//! ```text
//! INITED → RESEARCHING ⇄ WAITING_FOR_CLARIFICATION
//!               │
//!               ├─ complete_task / iteration cap → COMPLETED
//!               ├─ complete_task(failed) / dispatch error → FAILED
//!               └─ cancellation / clarification timeout → ERROR
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sgr_research_config::AppConfig;
use sgr_research_core::error::{Error, Result};
use sgr_research_core::message::{Conversation, Message};
use sgr_research_core::provider::Provider;
use sgr_research_core::research::{ContextSnapshot, ResearchContext, ResearchState, SharedContext};
use sgr_research_core::search::SearchProvider;
use sgr_research_core::tool::ToolEnv;
use sgr_research_tools::{ActionPolicy, CapabilityKind, ReasoningStep, ToolRegistry, default_toolkit};
use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::dispatcher::{Dispatcher, LlmSettings, SchemaGuided, Step, ToolCalling};
use crate::execution_log::{AgentLogDocument, ExecutionLog, ModelInfo};
use crate::prompt::SystemPrompt;
use crate::stream_event::{AgentStreamEvent, StreamSink};

/// A transcript shared between the loop and the agent handle.
pub type SharedConversation = Arc<RwLock<Conversation>>;

/// Which dispatch strategy the agent uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AgentVariant {
    /// One structured response per iteration
    #[default]
    SchemaGuided,
    /// Native function calling, a tool call is required
    ToolCalling,
    /// Native function calling, the model may skip the tool call
    AutoToolCalling,
}

impl AgentVariant {
    pub const ALL: [AgentVariant; 3] = [Self::SchemaGuided, Self::ToolCalling, Self::AutoToolCalling];

    pub fn name(self) -> &'static str {
        match self {
            Self::SchemaGuided => "sgr",
            Self::ToolCalling => "tool-calling",
            Self::AutoToolCalling => "auto-tool-calling",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.name() == name)
    }

    /// Prefix of the agent id, followed by a UUID.
    pub fn id_prefix(self) -> &'static str {
        match self {
            Self::SchemaGuided => "sgr_agent",
            Self::ToolCalling => "sgr_tool_calling_agent",
            Self::AutoToolCalling => "sgr_auto_tool_calling_agent",
        }
    }

    fn dispatcher(self) -> Box<dyn Dispatcher> {
        match self {
            Self::SchemaGuided => Box::new(SchemaGuided),
            Self::ToolCalling => Box::new(ToolCalling::required()),
            Self::AutoToolCalling => Box::new(ToolCalling::auto()),
        }
    }
}

impl std::fmt::Display for AgentVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What [`ResearchAgent::execute`] reports when the run is over.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentOutcome {
    pub id: String,
    pub state: ResearchState,
    pub iterations: u32,
    /// `None` when the log could not be written
    pub log_path: Option<PathBuf>,
    pub report_path: Option<String>,
}

/// A research agent bound to one task.
pub struct ResearchAgent {
    id: String,
    task: String,
    variant: AgentVariant,
    dispatcher: Box<dyn Dispatcher>,
    llm: LlmSettings,
    registry: ToolRegistry,
    policy: ActionPolicy,
    env: ToolEnv,
    prompt: SystemPrompt,
    logs_dir: PathBuf,
    clarification_timeout: Option<Duration>,
    context: SharedContext,
    conversation: SharedConversation,
    log: ExecutionLog,
    sink: StreamSink,
    cancel: CancellationToken,
}

impl ResearchAgent {
    /// Create an agent from validated configuration.
    pub fn new(
        task: impl Into<String>,
        variant: AgentVariant,
        provider: Arc<dyn Provider>,
        search: Arc<dyn SearchProvider>,
        config: &AppConfig,
    ) -> Result<Self> {
        config.validate().map_err(|e| Error::config(e.to_string()))?;
        let task = task.into();
        if task.trim().is_empty() {
            return Err(Error::config("research task is empty"));
        }

        let exec = &config.execution;
        let mut env = ToolEnv::new(search).with_reports_dir(&exec.reports_dir);
        env.default_max_results = config.search.max_results;
        env.content_limit = config.scraping.content_limit;
        env.extraction_limit = config.scraping.extraction_limit;
        env.max_searches_to_keep = exec.max_searches_to_keep;

        let llm = LlmSettings {
            provider,
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
            model_info: ModelInfo::from_config(&config.llm),
        };

        Ok(Self {
            id: format!("{}_{}", variant.id_prefix(), Uuid::new_v4()),
            task,
            variant,
            dispatcher: variant.dispatcher(),
            llm,
            registry: ToolRegistry::new(default_toolkit()),
            policy: ActionPolicy {
                max_iterations: exec.max_iterations,
                max_searches: exec.max_searches,
                max_clarifications: exec.max_clarifications,
                allow_clarification: exec.allow_clarification,
            },
            env,
            prompt: SystemPrompt::new(config.prompts.system_prompt_override.as_deref()),
            logs_dir: exec.logs_dir.clone(),
            clarification_timeout: exec.clarification_timeout_secs.map(Duration::from_secs),
            context: ResearchContext::shared(),
            conversation: Arc::new(RwLock::new(Conversation::new())),
            log: ExecutionLog::new(),
            sink: StreamSink::disabled(),
            cancel: CancellationToken::new(),
        })
    }

    /// Replace the toolkit the legal set is computed from.
    pub fn with_toolkit(mut self, toolkit: impl IntoIterator<Item = CapabilityKind>) -> Self {
        self.registry = ToolRegistry::new(toolkit);
        self
    }

    pub fn with_policy(mut self, policy: ActionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Deliver [`AgentStreamEvent`]s to `tx`.
    pub fn with_stream(mut self, tx: mpsc::UnboundedSender<AgentStreamEvent>) -> Self {
        self.sink = StreamSink::new(tx);
        self
    }

    /// Share a cancellation token with the caller (e.g. a Ctrl+C handler).
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_logs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.logs_dir = dir.into();
        self
    }

    pub fn with_reports_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.env.reports_dir = dir.into();
        self
    }

    pub fn with_clarification_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.clarification_timeout = timeout;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn variant(&self) -> AgentVariant {
        self.variant
    }

    /// A handle for status reads, clarifications and cancellation that
    /// stays usable while [`execute`](Self::execute) runs.
    pub fn handle(&self) -> AgentHandle {
        AgentHandle {
            id: self.id.clone(),
            context: self.context.clone(),
            conversation: self.conversation.clone(),
            cancel: self.cancel.clone(),
        }
    }

    /// Run the loop to a terminal state. Never fails: errors end the run as
    /// FAILED and the log is persisted in every case.
    pub async fn execute(mut self) -> AgentOutcome {
        info!(
            agent_id = %self.id,
            variant = %self.variant,
            dispatcher = self.dispatcher.name(),
            task = %self.task,
            "Starting research agent"
        );
        {
            let mut ctx = self.context.write().await;
            if ctx.state == ResearchState::Inited {
                ctx.state = ResearchState::Researching;
            }
        }
        self.conversation
            .write()
            .await
            .push(Message::user(format!("\nORIGINAL USER REQUEST: '{}'\n", self.task)));

        if let Err(e) = self.run().await {
            error!(agent_id = %self.id, error = %e, "Agent execution error");
            let mut ctx = self.context.write().await;
            if !ctx.state.is_terminal() {
                ctx.state = ResearchState::Failed;
            }
            self.sink.send(AgentStreamEvent::Error {
                message: e.to_string(),
            });
        }

        self.finish().await
    }

    async fn run(&mut self) -> Result<()> {
        loop {
            let (iteration, legal, system_prompt) = {
                let mut ctx = self.context.write().await;
                if ctx.state.is_terminal() {
                    return Ok(());
                }
                if self.cancel.is_cancelled() {
                    warn!(agent_id = %self.id, "Research cancelled");
                    ctx.state = ResearchState::Error;
                    return Ok(());
                }
                ctx.iteration += 1;
                info!(agent_id = %self.id, step = ctx.iteration, "Step started");

                if ctx.iteration > self.policy.max_iterations {
                    warn!(
                        agent_id = %self.id,
                        max_iterations = self.policy.max_iterations,
                        "Reached max iterations, forcing completion"
                    );
                    ctx.state = ResearchState::Completed;
                    return Ok(());
                }

                let legal = self.registry.legal_actions(&ctx, &self.policy)?;
                let prompt = self.prompt.render(&self.task, &ctx, &legal);
                (ctx.iteration, legal, prompt)
            };

            let mut step = Step {
                iteration,
                legal,
                system_prompt,
                llm: &self.llm,
                registry: &self.registry,
                context: &self.context,
                env: &self.env,
                conversation: &self.conversation,
                log: &mut self.log,
                sink: &self.sink,
            };

            let decision = self.dispatcher.reasoning_phase(&mut step).await?;
            let reasoning = serde_json::to_value(&decision.reasoning)?;
            let searches_used = {
                let mut ctx = self.context.write().await;
                ctx.current_state_reasoning = Some(reasoning.clone());
                ctx.searches_used
            };
            step.log.record_reasoning(iteration, reasoning);
            log_reasoning(&self.id, iteration, searches_used, &decision.reasoning);
            step.sink.send(AgentStreamEvent::Thought {
                content: decision.reasoning.current_situation.clone(),
            });

            let capability = self.dispatcher.select_action_phase(&mut step, &decision).await?;
            let action_id = step.action_id();

            let result = capability.execute_to_text(&self.context, &self.env).await;
            let tool_name = capability.kind().name();
            self.conversation
                .write()
                .await
                .push(Message::tool_result(&action_id, &result));
            self.sink.send(AgentStreamEvent::ToolResult {
                id: action_id,
                name: tool_name.to_string(),
                output: result.clone(),
            });
            self.log
                .record_tool(iteration, tool_name, capability.arguments(), &result);
            info!(
                agent_id = %self.id,
                step = iteration,
                tool = tool_name,
                result_chars = result.chars().count(),
                "Tool executed"
            );

            if capability.kind() == CapabilityKind::Clarification && !self.await_clarification(result).await {
                return Ok(());
            }
        }
    }

    /// Pause until a clarification arrives. Returns `false` when the wait
    /// ended by cancellation or timeout; the state is ERROR then.
    async fn await_clarification(&mut self, questions: String) -> bool {
        let signal = {
            let mut ctx = self.context.write().await;
            ctx.state = ResearchState::WaitingForClarification;
            ctx.clarification_received.clear();
            ctx.clarification_received.clone()
        };
        info!(agent_id = %self.id, "Research paused, waiting for clarification");
        self.sink.send(AgentStreamEvent::Clarification { questions });

        enum Wake {
            Resumed,
            Cancelled,
            TimedOut,
        }

        let timeout = self.clarification_timeout;
        let wait = async {
            match timeout {
                Some(limit) => match tokio::time::timeout(limit, signal.wait()).await {
                    Ok(()) => Wake::Resumed,
                    Err(_) => Wake::TimedOut,
                },
                None => {
                    signal.wait().await;
                    Wake::Resumed
                }
            }
        };
        let wake = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Wake::Cancelled,
            wake = wait => wake,
        };

        match wake {
            Wake::Resumed => {
                info!(agent_id = %self.id, "Clarification received, resuming research");
                true
            }
            Wake::Cancelled => {
                warn!(agent_id = %self.id, "Cancelled while waiting for clarification");
                self.set_state(ResearchState::Error).await;
                false
            }
            Wake::TimedOut => {
                warn!(agent_id = %self.id, timeout = ?timeout, "Clarification wait timed out");
                self.set_state(ResearchState::Error).await;
                false
            }
        }
    }

    async fn set_state(&self, state: ResearchState) {
        self.context.write().await.state = state;
    }

    /// Close the stream and persist the log document.
    async fn finish(mut self) -> AgentOutcome {
        let snapshot = self.context.read().await.snapshot();
        self.sink.finish(AgentStreamEvent::Done {
            agent_id: self.id.clone(),
            state: snapshot.state,
            iterations: snapshot.iteration,
        });

        let document = AgentLogDocument {
            id: self.id.clone(),
            task: self.task.clone(),
            model_info: self.llm.model_info.clone(),
            context: snapshot.clone(),
            log: self.log.into_entries(),
        };
        let log_path = match document.persist(&self.logs_dir).await {
            Ok(path) => Some(path),
            Err(e) => {
                error!(agent_id = %self.id, error = %e, "Failed to save agent log");
                None
            }
        };

        info!(
            agent_id = %self.id,
            state = %snapshot.state,
            iterations = snapshot.iteration,
            searches = snapshot.searches_used,
            "Research agent finished"
        );
        AgentOutcome {
            id: self.id,
            state: snapshot.state,
            iterations: snapshot.iteration,
            log_path,
            report_path: snapshot.report_path,
        }
    }
}

fn log_reasoning(agent_id: &str, step: u32, searches_used: u32, reasoning: &ReasoningStep) {
    info!(
        agent_id,
        step,
        searches_used,
        enough_data = reasoning.enough_data,
        task_completed = reasoning.task_completed,
        remaining_steps = ?reasoning.remaining_steps,
        next_step = reasoning.next_step_label(),
        "Reasoning decided"
    );
}

/// Caller-side access to a running agent.
#[derive(Clone)]
pub struct AgentHandle {
    id: String,
    context: SharedContext,
    conversation: SharedConversation,
    cancel: CancellationToken,
}

impl AgentHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Answer the agent's questions and resume the loop.
    ///
    /// Only legal while the agent waits for a clarification; otherwise an
    /// [`Error::InvalidState`] is returned and nothing changes.
    pub async fn provide_clarification(&self, text: &str) -> Result<()> {
        let signal = {
            let mut ctx = self.context.write().await;
            if ctx.state != ResearchState::WaitingForClarification {
                return Err(Error::InvalidState(format!(
                    "agent {} is {}, not waiting for clarification",
                    self.id, ctx.state
                )));
            }
            self.conversation
                .write()
                .await
                .push(Message::user(format!("CLARIFICATIONS: {text}")));
            ctx.clarifications_used += 1;
            ctx.state = ResearchState::Researching;
            ctx.clarification_received.clone()
        };
        info!(agent_id = %self.id, chars = text.chars().count(), "Clarification provided");
        signal.set();
        Ok(())
    }

    pub async fn state(&self) -> ResearchState {
        self.context.read().await.state
    }

    pub async fn snapshot(&self) -> ContextSnapshot {
        self.context.read().await.snapshot()
    }

    /// A copy of the transcript so far.
    pub async fn conversation(&self) -> Vec<Message> {
        self.conversation.read().await.messages.clone()
    }

    /// Stop the run at the next iteration boundary or clarification wait.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl std::fmt::Debug for AgentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentHandle").field("id", &self.id).finish()
    }
}
