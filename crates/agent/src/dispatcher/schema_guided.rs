//! Schema-guided dispatch: one structured response per iteration.
//!
//! The response schema combines the reasoning fields with a `function`
//! object discriminated by its `tool` field, so the reasoning and the
//! action arrive together and action selection needs no second call.

use async_trait::async_trait;
use serde_json::Value;
use sgr_research_core::error::{Error, Result};
use sgr_research_core::provider::ResponseFormat;
use sgr_research_tools::{Capability, CapabilityKind, ReasoningStep, ToolRegistry};

use super::{Decision, Dispatcher, Step};

pub const RESPONSE_SCHEMA_NAME: &str = "NextStep";

#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaGuided;

#[async_trait]
impl Dispatcher for SchemaGuided {
    fn name(&self) -> &'static str {
        "schema_guided"
    }

    async fn reasoning_phase(&self, step: &mut Step<'_>) -> Result<Decision> {
        let format = ResponseFormat {
            name: RESPONSE_SCHEMA_NAME.into(),
            schema: ToolRegistry::next_step_schema(&step.legal),
        };
        let reply = step.call_llm(Vec::new(), None, Some(format)).await?;
        match parse_next_step(&reply.content, step.registry, &step.legal) {
            Ok(decision) => Ok(decision),
            Err(e) => Err(step.fail(e).await),
        }
    }

    async fn select_action_phase(&self, step: &mut Step<'_>, decision: &Decision) -> Result<Capability> {
        let Some(capability) = decision.action.clone() else {
            return Err(step
                .fail(Error::Decode("reasoning carried no selected function".into()))
                .await);
        };
        step.record_action(&decision.reasoning, &capability).await;
        Ok(capability)
    }
}

/// Models sometimes wrap structured output in a Markdown code fence.
pub(crate) fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn parse_next_step(text: &str, registry: &ToolRegistry, legal: &[CapabilityKind]) -> Result<Decision> {
    let value: Value = serde_json::from_str(strip_code_fences(text))
        .map_err(|e| Error::Decode(format!("response is not valid JSON: {e}")))?;
    let Value::Object(mut envelope) = value else {
        return Err(Error::Decode("response is not a JSON object".into()));
    };

    let function = envelope
        .remove("function")
        .ok_or_else(|| Error::Decode("response has no 'function' field".into()))?;
    let reasoning: ReasoningStep = serde_json::from_value(Value::Object(envelope))
        .map_err(|e| Error::Decode(format!("invalid reasoning fields: {e}")))?;

    let Value::Object(mut arguments) = function else {
        return Err(Error::Decode("'function' is not an object".into()));
    };
    let tool = match arguments.remove("tool") {
        Some(Value::String(name)) => name,
        _ => return Err(Error::Decode("'function' has no 'tool' discriminator".into())),
    };
    let action = registry.decode(&tool, Value::Object(arguments), legal)?;

    Ok(Decision {
        reasoning,
        action: Some(action),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution_log::ExecutionLog;
    use crate::stream_event::StreamSink;
    use crate::testing::{Fixture, Reply, next_step};
    use serde_json::json;
    use sgr_research_core::error::ToolError;
    use sgr_research_core::research::ResearchState;

    #[test]
    fn code_fences_are_stripped() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{}\n```  "), "{}");
        assert_eq!(strip_code_fences("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn parse_envelope() {
        let registry = ToolRegistry::default();
        let text = json!({
            "reasoning_steps": ["a", "b"],
            "current_situation": "nothing yet",
            "plan_status": "starting",
            "enough_data": false,
            "remaining_steps": ["Search prices"],
            "task_completed": false,
            "function": {"tool": "web_search", "reasoning": "need data", "query": "bmw x6 price"}
        })
        .to_string();
        let decision =
            parse_next_step(&text, &registry, &[CapabilityKind::WebSearch]).unwrap();
        assert_eq!(decision.reasoning.next_step_label(), "Search prices");
        let action = decision.action.unwrap();
        assert_eq!(action.kind(), CapabilityKind::WebSearch);
        assert_eq!(action.arguments()["query"], "bmw x6 price");
    }

    #[test]
    fn parse_rejects_missing_discriminator() {
        let registry = ToolRegistry::default();
        let text = r#"{"current_situation":"s","plan_status":"p","function":{"query":"x"}}"#;
        let err = parse_next_step(text, &registry, &[CapabilityKind::WebSearch]).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[tokio::test]
    async fn one_call_decides_reasoning_and_action() {
        let fixture = Fixture::new(vec![next_step("web_search", json!({"query": "bmw x6"}))]);
        let mut log = ExecutionLog::new();
        let sink = StreamSink::disabled();
        let mut step = fixture.step(&mut log, &sink);

        let decision = SchemaGuided.reasoning_phase(&mut step).await.unwrap();
        let action = SchemaGuided.select_action_phase(&mut step, &decision).await.unwrap();
        assert_eq!(action.kind(), CapabilityKind::WebSearch);
        drop(step);

        let requests = fixture.provider.requests();
        assert_eq!(requests.len(), 1);
        let format = requests[0].response_format.as_ref().unwrap();
        assert_eq!(format.name, RESPONSE_SCHEMA_NAME);
        assert!(requests[0].tools.is_empty());
        assert_eq!(
            fixture.conversation.read().await.messages.last().unwrap().tool_calls[0].name,
            "web_search"
        );
    }

    #[tokio::test]
    async fn illegal_choice_fails_the_run() {
        let fixture = Fixture::new(vec![next_step(
            "create_report",
            json!({"title": "t", "direct_answer": "a", "content": "c", "confidence": "high"}),
        )]);
        let mut log = ExecutionLog::new();
        let sink = StreamSink::disabled();
        let mut step = fixture.step(&mut log, &sink);

        let err = SchemaGuided.reasoning_phase(&mut step).await.unwrap_err();
        assert!(matches!(err, Error::Tool(ToolError::NotAllowed(_))));
        assert_eq!(fixture.context.read().await.state, ResearchState::Failed);
    }

    #[tokio::test]
    async fn garbage_response_fails_without_retry() {
        let fixture = Fixture::new(vec![
            Reply::Text("I think we should search".into()),
            Reply::Text("unused".into()),
        ]);
        let mut log = ExecutionLog::new();
        let sink = StreamSink::disabled();
        let mut step = fixture.step(&mut log, &sink);

        let err = SchemaGuided.reasoning_phase(&mut step).await.unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
        assert_eq!(fixture.provider.requests().len(), 1);
    }
}
