//! Capabilities: the closed set of actions the agent can take.
//!
//! [`CapabilityKind`] names an action and carries its static metadata
//! (description, parameter schema). [`Capability`] is a decoded instance
//! with typed arguments, ready to execute.

use async_trait::async_trait;
use serde::Serialize;
use sgr_research_core::error::ToolError;
use sgr_research_core::provider::ToolDefinition;
use sgr_research_core::research::SharedContext;
use sgr_research_core::tool::{Tool, ToolEnv};
use tracing::warn;

use crate::clarification::{self, Clarification};
use crate::completion::{self, CompleteTask};
use crate::extract_content::{self, ExtractContent};
use crate::planning::{self, AdaptPlan, GeneratePlan};
use crate::reasoning::{self, ReasoningStep};
use crate::report::{self, CreateReport};
use crate::web_search::{self, WebSearch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    Reasoning,
    Clarification,
    GeneratePlan,
    AdaptPlan,
    WebSearch,
    ExtractContent,
    CreateReport,
    CompleteTask,
}

impl CapabilityKind {
    pub const ALL: [CapabilityKind; 8] = [
        Self::Reasoning,
        Self::Clarification,
        Self::GeneratePlan,
        Self::AdaptPlan,
        Self::WebSearch,
        Self::ExtractContent,
        Self::CreateReport,
        Self::CompleteTask,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Reasoning => "reasoning",
            Self::Clarification => "clarification",
            Self::GeneratePlan => "generate_plan",
            Self::AdaptPlan => "adapt_plan",
            Self::WebSearch => "web_search",
            Self::ExtractContent => "extract_content",
            Self::CreateReport => "create_report",
            Self::CompleteTask => "complete_task",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Reasoning => reasoning::DESCRIPTION,
            Self::Clarification => clarification::DESCRIPTION,
            Self::GeneratePlan => planning::GENERATE_PLAN_DESCRIPTION,
            Self::AdaptPlan => planning::ADAPT_PLAN_DESCRIPTION,
            Self::WebSearch => web_search::DESCRIPTION,
            Self::ExtractContent => extract_content::DESCRIPTION,
            Self::CreateReport => report::DESCRIPTION,
            Self::CompleteTask => completion::DESCRIPTION,
        }
    }

    pub fn parameters_schema(self) -> serde_json::Value {
        match self {
            Self::Reasoning => ReasoningStep::parameters_schema(),
            Self::Clarification => Clarification::parameters_schema(),
            Self::GeneratePlan => GeneratePlan::parameters_schema(),
            Self::AdaptPlan => AdaptPlan::parameters_schema(),
            Self::WebSearch => WebSearch::parameters_schema(),
            Self::ExtractContent => ExtractContent::parameters_schema(),
            Self::CreateReport => CreateReport::parameters_schema(),
            Self::CompleteTask => CompleteTask::parameters_schema(),
        }
    }

    /// Function definition sent to the LLM in native tool-calling mode.
    pub fn definition(self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

impl std::fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded capability invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Capability {
    Reasoning(ReasoningStep),
    Clarification(Clarification),
    GeneratePlan(GeneratePlan),
    AdaptPlan(AdaptPlan),
    WebSearch(WebSearch),
    ExtractContent(ExtractContent),
    CreateReport(CreateReport),
    CompleteTask(CompleteTask),
}

impl Capability {
    /// Decode typed arguments for `kind` from a JSON object.
    pub fn from_arguments(kind: CapabilityKind, args: serde_json::Value) -> Result<Self, ToolError> {
        let invalid = |e: serde_json::Error| {
            ToolError::InvalidArguments(format!("{}: {e}", kind.name()))
        };
        let capability = match kind {
            CapabilityKind::Reasoning => Self::Reasoning(serde_json::from_value(args).map_err(invalid)?),
            CapabilityKind::Clarification => {
                Self::Clarification(serde_json::from_value(args).map_err(invalid)?)
            }
            CapabilityKind::GeneratePlan => {
                Self::GeneratePlan(serde_json::from_value(args).map_err(invalid)?)
            }
            CapabilityKind::AdaptPlan => Self::AdaptPlan(serde_json::from_value(args).map_err(invalid)?),
            CapabilityKind::WebSearch => Self::WebSearch(serde_json::from_value(args).map_err(invalid)?),
            CapabilityKind::ExtractContent => {
                let extract: ExtractContent = serde_json::from_value(args).map_err(invalid)?;
                extract.validate()?;
                Self::ExtractContent(extract)
            }
            CapabilityKind::CreateReport => {
                Self::CreateReport(serde_json::from_value(args).map_err(invalid)?)
            }
            CapabilityKind::CompleteTask => {
                Self::CompleteTask(serde_json::from_value(args).map_err(invalid)?)
            }
        };
        Ok(capability)
    }

    pub fn kind(&self) -> CapabilityKind {
        match self {
            Self::Reasoning(_) => CapabilityKind::Reasoning,
            Self::Clarification(_) => CapabilityKind::Clarification,
            Self::GeneratePlan(_) => CapabilityKind::GeneratePlan,
            Self::AdaptPlan(_) => CapabilityKind::AdaptPlan,
            Self::WebSearch(_) => CapabilityKind::WebSearch,
            Self::ExtractContent(_) => CapabilityKind::ExtractContent,
            Self::CreateReport(_) => CapabilityKind::CreateReport,
            Self::CompleteTask(_) => CapabilityKind::CompleteTask,
        }
    }

    fn as_tool(&self) -> &dyn Tool {
        match self {
            Self::Reasoning(t) => t,
            Self::Clarification(t) => t,
            Self::GeneratePlan(t) => t,
            Self::AdaptPlan(t) => t,
            Self::WebSearch(t) => t,
            Self::ExtractContent(t) => t,
            Self::CreateReport(t) => t,
            Self::CompleteTask(t) => t,
        }
    }

    /// Typed arguments as a JSON value (for logs and stream events).
    pub fn arguments(&self) -> serde_json::Value {
        let value = match self {
            Self::Reasoning(t) => serde_json::to_value(t),
            Self::Clarification(t) => serde_json::to_value(t),
            Self::GeneratePlan(t) => serde_json::to_value(t),
            Self::AdaptPlan(t) => serde_json::to_value(t),
            Self::WebSearch(t) => serde_json::to_value(t),
            Self::ExtractContent(t) => serde_json::to_value(t),
            Self::CreateReport(t) => serde_json::to_value(t),
            Self::CompleteTask(t) => serde_json::to_value(t),
        };
        value.unwrap_or(serde_json::Value::Null)
    }

    /// Arguments serialized for an assistant tool-call turn.
    pub fn arguments_json(&self) -> String {
        self.arguments().to_string()
    }

    /// Execute and render the outcome as text. Failures become the text
    /// result so the model can react to them.
    pub async fn execute_to_text(&self, ctx: &SharedContext, env: &ToolEnv) -> String {
        match self.execute(ctx, env).await {
            Ok(text) => text,
            Err(e) => {
                warn!(tool = self.kind().name(), error = %e, "Capability execution failed");
                format!("Error: {e}")
            }
        }
    }
}

#[async_trait]
impl Tool for Capability {
    fn name(&self) -> &str {
        self.kind().name()
    }

    async fn execute(&self, ctx: &SharedContext, env: &ToolEnv) -> Result<String, ToolError> {
        self.as_tool().execute(ctx, env).await
    }
}

/// Pretty JSON of a capability's arguments without its `reasoning` field.
pub(crate) fn dump_without_reasoning<T: Serialize>(tool_name: &str, value: &T) -> Result<String, ToolError> {
    let failed = |e: serde_json::Error| ToolError::ExecutionFailed {
        tool_name: tool_name.to_string(),
        reason: e.to_string(),
    };
    let mut json = serde_json::to_value(value).map_err(failed)?;
    if let Some(obj) = json.as_object_mut() {
        obj.remove("reasoning");
    }
    serde_json::to_string_pretty(&json).map_err(failed)
}
