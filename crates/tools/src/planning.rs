//! Research planning capabilities: generate a plan, adapt it to new findings.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sgr_research_core::error::ToolError;
use sgr_research_core::research::SharedContext;
use sgr_research_core::tool::{Tool, ToolEnv};

use crate::capability::dump_without_reasoning;

pub const GENERATE_PLAN_DESCRIPTION: &str =
    "Generate a research plan. Useful to split a complex request into manageable steps.";

pub const ADAPT_PLAN_DESCRIPTION: &str =
    "Adapt the research plan based on new findings.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratePlan {
    #[serde(default)]
    pub reasoning: String,

    pub research_goal: String,

    /// 3-4 planned steps
    #[serde(default)]
    pub planned_steps: Vec<String>,

    /// 2-3 search strategies
    #[serde(default)]
    pub search_strategies: Vec<String>,
}

impl GeneratePlan {
    pub fn parameters_schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "reasoning": { "type": "string", "description": "Justification for research approach" },
                "research_goal": { "type": "string", "description": "Primary research objective" },
                "planned_steps": {
                    "type": "array", "items": { "type": "string" },
                    "minItems": 3, "maxItems": 4,
                    "description": "List of 3-4 planned steps"
                },
                "search_strategies": {
                    "type": "array", "items": { "type": "string" },
                    "minItems": 2, "maxItems": 3,
                    "description": "Information search strategies"
                }
            },
            "required": ["reasoning", "research_goal", "planned_steps", "search_strategies"]
        })
    }
}

#[async_trait]
impl Tool for GeneratePlan {
    fn name(&self) -> &str {
        "generate_plan"
    }

    async fn execute(&self, _ctx: &SharedContext, _env: &ToolEnv) -> Result<String, ToolError> {
        dump_without_reasoning(self.name(), self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptPlan {
    #[serde(default)]
    pub reasoning: String,

    pub original_goal: String,

    pub new_goal: String,

    /// 1-3 specific changes
    #[serde(default)]
    pub plan_changes: Vec<String>,

    /// 2-4 updated remaining steps
    #[serde(default)]
    pub next_steps: Vec<String>,
}

impl AdaptPlan {
    pub fn parameters_schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "reasoning": { "type": "string", "description": "Why plan needs adaptation based on new data" },
                "original_goal": { "type": "string", "description": "Original research goal" },
                "new_goal": { "type": "string", "description": "Updated research goal" },
                "plan_changes": {
                    "type": "array", "items": { "type": "string" },
                    "minItems": 1, "maxItems": 3,
                    "description": "Specific changes made to plan"
                },
                "next_steps": {
                    "type": "array", "items": { "type": "string" },
                    "minItems": 2, "maxItems": 4,
                    "description": "Updated remaining steps"
                }
            },
            "required": ["reasoning", "original_goal", "new_goal", "plan_changes", "next_steps"]
        })
    }
}

#[async_trait]
impl Tool for AdaptPlan {
    fn name(&self) -> &str {
        "adapt_plan"
    }

    async fn execute(&self, _ctx: &SharedContext, _env: &ToolEnv) -> Result<String, ToolError> {
        dump_without_reasoning(self.name(), self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::env;
    use sgr_research_core::research::ResearchContext;

    #[tokio::test]
    async fn plan_output_omits_reasoning() {
        let plan = GeneratePlan {
            reasoning: "internal".into(),
            research_goal: "Find BMW X6 prices".into(),
            planned_steps: vec!["a".into(), "b".into(), "c".into()],
            search_strategies: vec!["x".into(), "y".into()],
        };
        let out = plan.execute(&ResearchContext::shared(), &env()).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert!(value.get("reasoning").is_none());
        assert_eq!(value["research_goal"], "Find BMW X6 prices");
        assert_eq!(value["planned_steps"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn adapt_plan_echoes_changes() {
        let plan = AdaptPlan {
            reasoning: String::new(),
            original_goal: "old".into(),
            new_goal: "new".into(),
            plan_changes: vec!["narrow to 2024".into()],
            next_steps: vec!["search".into(), "report".into()],
        };
        let out = plan.execute(&ResearchContext::shared(), &env()).await.unwrap();
        assert!(out.contains("narrow to 2024"));
        assert!(!out.contains("reasoning"));
    }
}
