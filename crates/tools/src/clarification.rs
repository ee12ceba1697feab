//! Clarification: asks the caller to resolve ambiguity before researching.
//!
//! Executing it only renders the questions. The execution loop is what
//! suspends the agent until `provide_clarification` resumes it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sgr_research_core::error::ToolError;
use sgr_research_core::research::SharedContext;
use sgr_research_core::tool::{Tool, ToolEnv};

pub const DESCRIPTION: &str = "Ask clarifying questions when the request is ambiguous. Use it \
before researching if terms, scope or intent are unclear.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clarification {
    #[serde(default)]
    pub reasoning: String,

    /// Ambiguous terms (1-3)
    #[serde(default)]
    pub unclear_terms: Vec<String>,

    /// Possible interpretations (2-3)
    #[serde(default)]
    pub assumptions: Vec<String>,

    /// Specific questions (1-3)
    pub questions: Vec<String>,
}

impl Clarification {
    pub fn parameters_schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "reasoning": { "type": "string", "description": "Why clarification is needed" },
                "unclear_terms": {
                    "type": "array", "items": { "type": "string" },
                    "minItems": 1, "maxItems": 3,
                    "description": "List of unclear terms or concepts"
                },
                "assumptions": {
                    "type": "array", "items": { "type": "string" },
                    "minItems": 2, "maxItems": 3,
                    "description": "Possible interpretations to verify"
                },
                "questions": {
                    "type": "array", "items": { "type": "string" },
                    "minItems": 1, "maxItems": 3,
                    "description": "Specific clarifying questions"
                }
            },
            "required": ["reasoning", "unclear_terms", "assumptions", "questions"]
        })
    }
}

#[async_trait]
impl Tool for Clarification {
    fn name(&self) -> &str {
        "clarification"
    }

    async fn execute(&self, _ctx: &SharedContext, _env: &ToolEnv) -> Result<String, ToolError> {
        Ok(self.questions.join("\n"))
    }
}
