//! Reasoning step: the structured "what next" decision of each iteration.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sgr_research_core::error::ToolError;
use sgr_research_core::research::SharedContext;
use sgr_research_core::tool::{Tool, ToolEnv};

pub const DESCRIPTION: &str = "Agent core logic: determines the next reasoning step with adaptive \
planning. Analyze the current situation, evaluate whether enough data was gathered and decide \
the remaining steps.";

/// Label used in the transcript when no steps remain.
pub const COMPLETING: &str = "Completing";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningStep {
    /// Step-by-step reasoning (2-3 steps)
    #[serde(default)]
    pub reasoning_steps: Vec<String>,

    /// Current research situation
    pub current_situation: String,

    /// Status of the current plan
    pub plan_status: String,

    /// Whether enough data was gathered to answer
    #[serde(default)]
    pub enough_data: bool,

    /// Remaining steps (1-3)
    #[serde(default)]
    pub remaining_steps: Vec<String>,

    #[serde(default)]
    pub task_completed: bool,
}

impl ReasoningStep {
    /// First remaining step, or "Completing".
    pub fn next_step_label(&self) -> &str {
        self.remaining_steps
            .first()
            .map(String::as_str)
            .unwrap_or(COMPLETING)
    }

    /// JSON schema properties shared by the reasoning tool and the
    /// schema-guided envelope.
    pub fn schema_properties() -> serde_json::Map<String, serde_json::Value> {
        let props = json!({
            "reasoning_steps": {
                "type": "array",
                "items": { "type": "string" },
                "minItems": 2,
                "maxItems": 3,
                "description": "Step-by-step reasoning (brief, 1 sentence each)"
            },
            "current_situation": {
                "type": "string",
                "description": "Current research situation (2-3 sentences MAX)"
            },
            "plan_status": {
                "type": "string",
                "description": "Status of current plan (1 sentence)"
            },
            "enough_data": {
                "type": "boolean",
                "description": "Sufficient data collected for comprehensive report?"
            },
            "remaining_steps": {
                "type": "array",
                "items": { "type": "string" },
                "minItems": 1,
                "maxItems": 3,
                "description": "1-3 remaining steps (brief, action-oriented)"
            },
            "task_completed": {
                "type": "boolean",
                "description": "Is the research task finished?"
            }
        });
        match props {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        }
    }

    pub fn required_fields() -> Vec<&'static str> {
        vec![
            "reasoning_steps",
            "current_situation",
            "plan_status",
            "enough_data",
            "remaining_steps",
            "task_completed",
        ]
    }

    pub fn parameters_schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": Self::schema_properties(),
            "required": Self::required_fields(),
        })
    }
}

#[async_trait]
impl Tool for ReasoningStep {
    fn name(&self) -> &str {
        "reasoning"
    }

    async fn execute(&self, _ctx: &SharedContext, _env: &ToolEnv) -> Result<String, ToolError> {
        serde_json::to_string_pretty(self).map_err(|e| ToolError::ExecutionFailed {
            tool_name: "reasoning".into(),
            reason: e.to_string(),
        })
    }
}
