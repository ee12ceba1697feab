//! End-to-end integration tests for the SGR research agent.
//!
//! These tests drive full agent runs against a scripted LLM and an in-memory
//! search backend: budgets, the report latch, clarification resume, pruning
//! and the persisted log.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use sgr_research_agent::{AgentLogDocument, AgentVariant, ResearchAgent};
use sgr_research_config::AppConfig;
use sgr_research_core::error::{Error, ProviderError, SearchError};
use sgr_research_core::message::{Message, MessageToolCall, Role};
use sgr_research_core::provider::{Provider, ProviderRequest, ProviderResponse};
use sgr_research_core::research::{ResearchState, SourceData};
use sgr_research_core::search::SearchProvider;
use tempfile::TempDir;

// ── Mock Provider ────────────────────────────────────────────────────────

enum Scripted {
    Text(String),
    Call(&'static str, Value),
}

/// A mock provider that returns scripted responses in sequence.
struct ScriptedProvider {
    responses: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<Scripted>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Tool names offered by the schema-guided request `index`.
    fn offered_schema_tools(&self, index: usize) -> Vec<String> {
        let requests = self.requests();
        let schema = &requests[index].response_format.as_ref().unwrap().schema;
        schema["properties"]["function"]["anyOf"]
            .as_array()
            .unwrap()
            .iter()
            .map(|alt| alt["properties"]["tool"]["const"].as_str().unwrap().to_string())
            .collect()
    }

    /// Tool names offered by the native request `index`.
    fn offered_functions(&self, index: usize) -> Vec<String> {
        self.requests()[index].tools.iter().map(|t| t.name.clone()).collect()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let message = match self.responses.lock().unwrap().pop_front() {
            Some(Scripted::Text(text)) => Message::assistant(text),
            Some(Scripted::Call(name, args)) => Message::assistant_tool_call(
                "",
                MessageToolCall {
                    id: format!("call_{name}"),
                    name: name.into(),
                    arguments: args.to_string(),
                },
            ),
            None => {
                return Err(ProviderError::ApiError {
                    status_code: 500,
                    message: "no more scripted responses".into(),
                });
            }
        };
        Ok(ProviderResponse {
            message,
            usage: None,
            model: "mock-model".into(),
        })
    }
}

fn reasoning(remaining: &[&str]) -> Value {
    json!({
        "reasoning_steps": ["Review the findings", "Choose the next action"],
        "current_situation": "Gathering data",
        "plan_status": "On track",
        "enough_data": false,
        "remaining_steps": remaining,
        "task_completed": false,
    })
}

/// Schema-guided response choosing `tool`.
fn step(tool: &str, args: Value) -> Scripted {
    let mut envelope = reasoning(&["Next step"]);
    let mut function = args;
    function["tool"] = json!(tool);
    envelope["function"] = function;
    Scripted::Text(envelope.to_string())
}

fn report() -> Value {
    json!({
        "title": "GPU prices",
        "direct_answer": "Around $1,999",
        "user_request_language_reference": "What does an RTX 5090 cost?",
        "content": "Launch price was $1,999 [1].",
        "confidence": "high"
    })
}

// ── Mock Search ──────────────────────────────────────────────────────────

/// Returns one source per query; URL derived from the query text.
struct QuerySearch {
    fail: bool,
}

#[async_trait::async_trait]
impl SearchProvider for QuerySearch {
    fn name(&self) -> &str {
        "e2e_search"
    }

    async fn search(
        &self,
        query: &str,
        _max_results: usize,
        _include_raw_content: bool,
    ) -> Result<Vec<SourceData>, SearchError> {
        if self.fail {
            return Err(SearchError::Network("connection refused".into()));
        }
        Ok(vec![SourceData::new(
            format!("https://news.example/{}", query.replace(' ', "-")),
            Some(format!("News about {query}")),
            format!("Snippet about {query}"),
        )])
    }

    async fn extract(&self, urls: &[String]) -> Result<Vec<SourceData>, SearchError> {
        Ok(urls
            .iter()
            .map(|u| SourceData::new(u.clone(), None, "").with_full_content("Full page"))
            .collect())
    }
}

// ── Harness ──────────────────────────────────────────────────────────────

struct Run {
    dir: TempDir,
    config: AppConfig,
    provider: Arc<ScriptedProvider>,
    search: Arc<QuerySearch>,
}

impl Run {
    fn new(responses: Vec<Scripted>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.execution.reports_dir = dir.path().join("reports");
        config.execution.logs_dir = dir.path().join("logs");
        Self {
            dir,
            config,
            provider: Arc::new(ScriptedProvider::new(responses)),
            search: Arc::new(QuerySearch { fail: false }),
        }
    }

    fn agent(&self, variant: AgentVariant) -> ResearchAgent {
        ResearchAgent::new(
            "What does an RTX 5090 cost?",
            variant,
            self.provider.clone(),
            self.search.clone(),
            &self.config,
        )
        .unwrap()
    }
}

// ── Budgets ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_search_budget_removes_search() {
    let mut run = Run::new(vec![
        step("web_search", json!({"query": "X"})),
        step("complete_task", json!({"completed_steps": ["searched X"]})),
    ]);
    run.config.execution.max_searches = 1;
    let agent = run.agent(AgentVariant::SchemaGuided);
    let handle = agent.handle();
    let outcome = agent.execute().await;

    assert_eq!(outcome.state, ResearchState::Completed);
    assert_eq!(handle.snapshot().await.searches_used, 1);
    assert!(run.provider.offered_schema_tools(0).contains(&"web_search".to_string()));
    let second = run.provider.offered_schema_tools(1);
    assert!(!second.contains(&"web_search".to_string()));
    assert!(second.contains(&"create_report".to_string()));
}

#[tokio::test]
async fn e2e_single_iteration_completes_without_report() {
    let mut run = Run::new(vec![step("complete_task", json!({"completed_steps": []}))]);
    run.config.execution.max_iterations = 1;
    let outcome = run.agent(AgentVariant::SchemaGuided).execute().await;

    assert_eq!(outcome.state, ResearchState::Completed);
    assert!(outcome.iterations <= 2);
    assert!(outcome.report_path.is_none());
    assert!(!run.config.execution.reports_dir.exists());
    assert_eq!(run.provider.offered_schema_tools(0), vec!["complete_task".to_string()]);
}

#[tokio::test]
async fn e2e_iteration_never_exceeds_cap_plus_one() {
    let mut run = Run::new(vec![
        step("generate_plan", json!({"research_goal": "price", "planned_steps": ["a", "b", "c"]})),
        step("web_search", json!({"query": "rtx 5090 price"})),
        step("create_report", report()),
    ]);
    run.config.execution.max_iterations = 3;
    let outcome = run.agent(AgentVariant::SchemaGuided).execute().await;

    assert_eq!(outcome.state, ResearchState::Completed);
    assert_eq!(outcome.iterations, 4);
    assert!(outcome.report_path.is_some());
}

// ── Report latch ─────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_report_latch_allows_only_completion() {
    let run = Run::new(vec![
        step("web_search", json!({"query": "rtx 5090"})),
        step("create_report", report()),
        step("web_search", json!({"query": "one more"})),
    ]);
    let agent = run.agent(AgentVariant::SchemaGuided);
    let handle = agent.handle();
    let outcome = agent.execute().await;

    // The third decision picked a capability outside {complete_task}
    assert_eq!(outcome.state, ResearchState::Failed);
    assert_eq!(run.provider.offered_schema_tools(2), vec!["complete_task".to_string()]);

    let snapshot = handle.snapshot().await;
    assert!(snapshot.report_created);
    assert_eq!(snapshot.searches_used, 1);
    let report = std::fs::read_to_string(outcome.report_path.unwrap()).unwrap();
    assert!(report.starts_with("# GPU prices"));
    assert!(report.contains("## Sources"));
    assert!(report.contains("[1] News about rtx 5090 - https://news.example/rtx-5090"));
}

// ── Clarification ────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_clarification_pause_and_resume() {
    let run = Run::new(vec![
        step(
            "clarification",
            json!({"unclear_terms": ["cost"], "assumptions": ["MSRP"], "questions": ["Which region?"]}),
        ),
        step("complete_task", json!({"completed_steps": ["clarified"]})),
    ]);
    let agent = run.agent(AgentVariant::SchemaGuided);
    let handle = agent.handle();
    let task = tokio::spawn(agent.execute());

    while handle.state().await != ResearchState::WaitingForClarification {
        tokio::task::yield_now().await;
    }
    handle.provide_clarification("answer").await.unwrap();

    let snapshot = handle.snapshot().await;
    assert_eq!(snapshot.state, ResearchState::Researching);
    assert_eq!(snapshot.clarifications_used, 1);
    assert!(
        handle
            .conversation()
            .await
            .iter()
            .any(|m| m.role == Role::User && m.content.contains("answer"))
    );

    let outcome = task.await.unwrap();
    assert_eq!(outcome.state, ResearchState::Completed);

    // A second clarification after the run is over is rejected
    let err = handle.provide_clarification("late").await.unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));
    assert_eq!(handle.snapshot().await.clarifications_used, 1);
}

#[tokio::test]
async fn e2e_clarification_disabled_by_config() {
    let mut run = Run::new(vec![step("complete_task", json!({"completed_steps": []}))]);
    run.config.execution.allow_clarification = false;
    run.agent(AgentVariant::SchemaGuided).execute().await;
    assert!(!run.provider.offered_schema_tools(0).contains(&"clarification".to_string()));
}

// ── Pruning ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_old_searches_are_summarized() {
    let run = Run::new(vec![
        step("web_search", json!({"query": "rtx 5090 msrp"})),
        step("web_search", json!({"query": "rtx 5090 street price"})),
        step("complete_task", json!({"completed_steps": []})),
    ]);
    let agent = run.agent(AgentVariant::SchemaGuided);
    let handle = agent.handle();
    agent.execute().await;

    let snapshot = handle.snapshot().await;
    assert_eq!(snapshot.searches_used, 2);
    assert_eq!(snapshot.sources_count, 1);
    assert!(snapshot.previous_searches_summary.contains("Query: 'rtx 5090 msrp'"));
    assert!(!snapshot.previous_searches_summary.contains("street price"));

    // The summary reaches the system prompt of the next call
    let requests = run.provider.requests();
    let system = &requests[2].messages[0];
    assert_eq!(system.role, Role::System);
    assert!(system.content.contains("Query: 'rtx 5090 msrp'"));
    assert!(system.content.contains("[2] News about rtx 5090 street price"));
}

// ── Failures ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_search_failure_is_fed_back() {
    let mut run = Run::new(vec![
        step("web_search", json!({"query": "rtx 5090"})),
        step("complete_task", json!({"completed_steps": [], "status": "failed"})),
    ]);
    run.search = Arc::new(QuerySearch { fail: true });
    let agent = run.agent(AgentVariant::SchemaGuided);
    let handle = agent.handle();
    let outcome = agent.execute().await;

    assert_eq!(outcome.state, ResearchState::Failed);
    assert_eq!(handle.snapshot().await.searches_used, 0);
    let messages = handle.conversation().await;
    let tool_result = messages.iter().find(|m| m.role == Role::Tool).unwrap();
    assert!(tool_result.content.starts_with("Error: "));
}

#[tokio::test]
async fn e2e_provider_exhaustion_fails_run() {
    let run = Run::new(vec![]);
    let outcome = run.agent(AgentVariant::ToolCalling).execute().await;
    assert_eq!(outcome.state, ResearchState::Failed);
    assert!(outcome.log_path.is_some());
}

// ── Native tool calling ──────────────────────────────────────────────────

#[tokio::test]
async fn e2e_auto_tool_calling_flow() {
    let mut run = Run::new(vec![
        Scripted::Call("reasoning", reasoning(&["Search prices"])),
        Scripted::Call("web_search", json!({"query": "rtx 5090 price"})),
        Scripted::Call("reasoning", reasoning(&["Write report"])),
        Scripted::Call("create_report", report()),
        Scripted::Call("reasoning", reasoning(&[])),
        Scripted::Call("complete_task", json!({"completed_steps": ["done"]})),
    ]);
    run.config.execution.max_searches = 1;
    let agent = run.agent(AgentVariant::AutoToolCalling);
    assert!(agent.id().starts_with("sgr_auto_tool_calling_agent_"));
    let handle = agent.handle();
    let outcome = agent.execute().await;

    assert_eq!(outcome.state, ResearchState::Completed);
    assert_eq!(outcome.iterations, 3);
    assert!(outcome.report_path.is_some());

    assert!(run.provider.offered_functions(1).contains(&"web_search".to_string()));
    assert!(!run.provider.offered_functions(3).contains(&"web_search".to_string()));
    assert_eq!(run.provider.offered_functions(5), vec!["complete_task".to_string()]);
    assert_eq!(run.provider.offered_functions(4), vec!["reasoning".to_string(), "complete_task".to_string()]);

    let messages = handle.conversation().await;
    let last_action = messages.iter().rev().find(|m| !m.tool_calls.is_empty()).unwrap();
    assert_eq!(last_action.tool_calls[0].id, "3-action");
    assert_eq!(last_action.content, "Completing");
}

// ── Persistence ──────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_log_round_trip() {
    let run = Run::new(vec![
        step("web_search", json!({"query": "rtx 5090"})),
        step("complete_task", json!({"completed_steps": ["searched"]})),
    ]);
    let outcome = run.agent(AgentVariant::SchemaGuided).execute().await;
    let path = outcome.log_path.unwrap();
    let file_name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(file_name.ends_with(&format!("-{}-log.json", outcome.id)));

    let document = AgentLogDocument::load(&path).await.unwrap();
    assert_eq!(document.id, outcome.id);
    assert_eq!(document.task, "What does an RTX 5090 cost?");
    assert_eq!(document.context.state, ResearchState::Completed);
    assert_eq!(document.model_info.model, run.config.llm.model);

    let step_types: Vec<&str> = document.log.iter().map(|e| e.kind.step_type()).collect();
    assert_eq!(
        step_types,
        vec![
            "openai_request",
            "reasoning",
            "tool_execution",
            "openai_request",
            "reasoning",
            "tool_execution"
        ]
    );
    assert!(document.log.iter().all(|e| e.step_number >= 1 && e.step_number <= 2));

    // Re-persist and reload: identical id, task and log
    let copy = document.persist(&run.dir.path().join("copy")).await.unwrap();
    let reloaded = AgentLogDocument::load(&copy).await.unwrap();
    assert_eq!(reloaded.id, document.id);
    assert_eq!(reloaded.task, document.task);
    assert_eq!(reloaded.log, document.log);
}
