//! Task completion: the only capability that ends research deliberately.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sgr_research_core::error::ToolError;
use sgr_research_core::research::{ResearchState, SharedContext};
use sgr_research_core::tool::{Tool, ToolEnv};
use tracing::info;

pub const DESCRIPTION: &str = "Finalize the research task and complete agent execution after \
all steps are done.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteTask {
    #[serde(default)]
    pub reasoning: String,

    /// Summary of completed steps
    #[serde(default)]
    pub completed_steps: Vec<String>,

    #[serde(default)]
    pub status: TaskStatus,
}

impl CompleteTask {
    pub fn parameters_schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "reasoning": { "type": "string", "description": "Why task is now complete" },
                "completed_steps": {
                    "type": "array", "items": { "type": "string" },
                    "minItems": 1, "maxItems": 5,
                    "description": "Summary of completed steps including key discoveries"
                },
                "status": { "type": "string", "enum": ["completed", "failed"] }
            },
            "required": ["reasoning", "completed_steps", "status"]
        })
    }
}

#[async_trait]
impl Tool for CompleteTask {
    fn name(&self) -> &str {
        "complete_task"
    }

    async fn execute(&self, ctx: &SharedContext, _env: &ToolEnv) -> Result<String, ToolError> {
        let state = match self.status {
            TaskStatus::Completed => ResearchState::Completed,
            TaskStatus::Failed => ResearchState::Failed,
        };
        ctx.write().await.state = state;
        info!(status = %state, steps = self.completed_steps.len(), "Task finished");

        serde_json::to_string_pretty(self).map_err(|e| ToolError::ExecutionFailed {
            tool_name: "complete_task".into(),
            reason: e.to_string(),
        })
    }
}
