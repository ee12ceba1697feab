//! Native function-calling dispatch.
//!
//! Each iteration makes two calls. The first forces the `reasoning`
//! function; its call and result join the transcript. The second offers the
//! legal capabilities with `tool_choice` set to `required` or `auto` and
//! decodes the first returned call.

use async_trait::async_trait;
use sgr_research_core::error::{Error, Result};
use sgr_research_core::message::{Message, MessageToolCall};
use sgr_research_core::provider::ToolChoice;
use sgr_research_core::tool::Tool;
use sgr_research_tools::{Capability, CapabilityKind, ReasoningStep, ToolRegistry};

use super::{Decision, Dispatcher, Step, parse_arguments};

#[derive(Debug, Clone)]
pub struct ToolCalling {
    mode: ToolChoice,
}

impl ToolCalling {
    /// The model must call one of the offered tools.
    pub fn required() -> Self {
        Self {
            mode: ToolChoice::Required,
        }
    }

    /// The model decides whether to call a tool.
    pub fn auto() -> Self {
        Self {
            mode: ToolChoice::Auto,
        }
    }

    pub fn mode(&self) -> &ToolChoice {
        &self.mode
    }

    async fn decode_reasoning(step: &mut Step<'_>) -> Result<ReasoningStep> {
        let reasoning_name = CapabilityKind::Reasoning.name();
        let mut tools = vec![CapabilityKind::Reasoning.definition()];
        tools.extend(ToolRegistry::definitions(&step.legal));

        let reply = step
            .call_llm(tools, Some(ToolChoice::Function(reasoning_name.into())), None)
            .await?;
        let call = reply
            .tool_calls
            .into_iter()
            .find(|c| c.name == reasoning_name)
            .ok_or_else(|| Error::Decode("model did not call the reasoning function".into()))?;
        let args = parse_arguments(reasoning_name, &call.arguments)?;
        serde_json::from_value(args)
            .map_err(|e| Error::Decode(format!("invalid reasoning arguments: {e}")))
    }

    /// Offers the legal set only; `reasoning` is never an action, even during
    /// wind-down, so a reasoning call here fails to decode.
    async fn decode_action(&self, step: &mut Step<'_>) -> Result<Capability> {
        let tools = ToolRegistry::definitions(&step.legal);
        let reply = step.call_llm(tools, Some(self.mode.clone()), None).await?;
        let call = reply
            .tool_calls
            .into_iter()
            .next()
            .ok_or_else(|| Error::Decode("model answered without calling a tool".into()))?;
        let args = parse_arguments(&call.name, &call.arguments)?;
        step.registry.decode(&call.name, args, &step.legal)
    }
}

#[async_trait]
impl Dispatcher for ToolCalling {
    fn name(&self) -> &'static str {
        match self.mode {
            ToolChoice::Auto => "auto_tool_calling",
            _ => "tool_calling",
        }
    }

    async fn reasoning_phase(&self, step: &mut Step<'_>) -> Result<Decision> {
        let reasoning = match Self::decode_reasoning(step).await {
            Ok(reasoning) => reasoning,
            Err(e) => return Err(step.fail(e).await),
        };

        let call_id = format!("{}-reasoning", step.iteration);
        let arguments = serde_json::to_string(&reasoning)?;
        step.push(Message::assistant_tool_call(
            "",
            MessageToolCall {
                id: call_id.clone(),
                name: reasoning.name().to_string(),
                arguments,
            },
        ))
        .await;
        let result = reasoning.execute(step.context, step.env).await?;
        step.push(Message::tool_result(call_id, result)).await;

        Ok(Decision {
            reasoning,
            action: None,
        })
    }

    async fn select_action_phase(&self, step: &mut Step<'_>, decision: &Decision) -> Result<Capability> {
        let capability = match self.decode_action(step).await {
            Ok(capability) => capability,
            Err(e) => return Err(step.fail(e).await),
        };
        step.record_action(&decision.reasoning, &capability).await;
        Ok(capability)
    }
}
