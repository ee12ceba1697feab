//! Tool registry and dynamic schema builder.
//!
//! The registry owns the agent's toolkit and computes, from the current
//! research context, which capabilities are legal at the next step. The
//! legal set is materialized either as one JSON schema (schema-guided
//! decoding) or as a list of function definitions (native tool calling).

use std::collections::HashMap;

use serde_json::json;
use sgr_research_core::error::{Error, ToolError};
use sgr_research_core::provider::ToolDefinition;
use sgr_research_core::research::ResearchContext;

use crate::capability::{Capability, CapabilityKind};
use crate::reasoning::ReasoningStep;

/// Budgets and switches that shape the legal action set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionPolicy {
    pub max_iterations: u32,
    pub max_searches: u32,
    pub max_clarifications: u32,
    pub allow_clarification: bool,
}

impl Default for ActionPolicy {
    fn default() -> Self {
        Self {
            max_iterations: 6,
            max_searches: 4,
            max_clarifications: 3,
            allow_clarification: true,
        }
    }
}

/// The toolkit every agent variant starts from.
pub fn default_toolkit() -> Vec<CapabilityKind> {
    vec![
        CapabilityKind::Clarification,
        CapabilityKind::GeneratePlan,
        CapabilityKind::AdaptPlan,
        CapabilityKind::WebSearch,
        CapabilityKind::ExtractContent,
        CapabilityKind::CreateReport,
        CapabilityKind::CompleteTask,
    ]
}

/// The agent's toolkit plus its name → kind lookup, built once.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    toolkit: Vec<CapabilityKind>,
    by_name: HashMap<&'static str, CapabilityKind>,
}

impl ToolRegistry {
    /// Build a registry. Duplicates are dropped, first occurrence wins.
    pub fn new(toolkit: impl IntoIterator<Item = CapabilityKind>) -> Self {
        let mut ordered = Vec::new();
        for kind in toolkit {
            if !ordered.contains(&kind) {
                ordered.push(kind);
            }
        }
        let by_name = ordered.iter().map(|k| (k.name(), *k)).collect();
        Self {
            toolkit: ordered,
            by_name,
        }
    }

    pub fn toolkit(&self) -> &[CapabilityKind] {
        &self.toolkit
    }

    pub fn get(&self, name: &str) -> Option<CapabilityKind> {
        self.by_name.get(name).copied()
    }

    pub fn contains(&self, kind: CapabilityKind) -> bool {
        self.toolkit.contains(&kind)
    }

    /// Capabilities legal at the next step, in toolkit order.
    ///
    /// Pure: the same context and policy always give the same set.
    /// Reasoning is never part of the set.
    pub fn legal_actions(
        &self,
        ctx: &ResearchContext,
        policy: &ActionPolicy,
    ) -> Result<Vec<CapabilityKind>, Error> {
        let base: &[CapabilityKind] = if ctx.report_created {
            &[CapabilityKind::CompleteTask]
        } else if ctx.iteration >= policy.max_iterations {
            &[CapabilityKind::CreateReport, CapabilityKind::CompleteTask]
        } else {
            &self.toolkit
        };

        let legal: Vec<CapabilityKind> = self
            .toolkit
            .iter()
            .copied()
            .filter(|kind| base.contains(kind))
            .filter(|kind| match kind {
                CapabilityKind::Reasoning => false,
                CapabilityKind::CreateReport => ctx.searches_used > 0,
                CapabilityKind::WebSearch => ctx.searches_used < policy.max_searches,
                CapabilityKind::Clarification => {
                    policy.allow_clarification && ctx.clarifications_used < policy.max_clarifications
                }
                _ => true,
            })
            .collect();

        if legal.is_empty() {
            return Err(Error::config(format!(
                "no legal action at iteration {} (toolkit: {})",
                ctx.iteration,
                self.toolkit
                    .iter()
                    .map(|k| k.name())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }
        Ok(legal)
    }

    /// Decode a named invocation, rejecting anything outside `legal`.
    pub fn decode(
        &self,
        name: &str,
        args: serde_json::Value,
        legal: &[CapabilityKind],
    ) -> Result<Capability, Error> {
        let kind = self
            .get(name)
            .ok_or_else(|| Error::Decode(format!("unknown tool '{name}'")))?;
        if !legal.contains(&kind) {
            return Err(ToolError::NotAllowed(name.to_string()).into());
        }
        Ok(Capability::from_arguments(kind, args)?)
    }

    /// Function definitions for native tool calling.
    pub fn definitions(kinds: &[CapabilityKind]) -> Vec<ToolDefinition> {
        kinds.iter().map(|k| k.definition()).collect()
    }

    /// The schema-guided response schema: reasoning fields plus a
    /// `function` object discriminated by its `tool` field.
    pub fn next_step_schema(kinds: &[CapabilityKind]) -> serde_json::Value {
        let alternatives: Vec<serde_json::Value> = kinds
            .iter()
            .map(|kind| {
                let params = kind.parameters_schema();
                let mut properties = serde_json::Map::new();
                properties.insert("tool".into(), json!({ "const": kind.name() }));
                if let Some(props) = params["properties"].as_object() {
                    properties.extend(props.clone());
                }
                let mut required = vec![json!("tool")];
                if let Some(req) = params["required"].as_array() {
                    required.extend(req.iter().cloned());
                }
                json!({
                    "type": "object",
                    "description": kind.description(),
                    "properties": properties,
                    "required": required,
                })
            })
            .collect();

        let mut properties = ReasoningStep::schema_properties();
        properties.insert(
            "function".into(),
            json!({
                "description": "Select the appropriate tool for the next step",
                "anyOf": alternatives,
            }),
        );
        let mut required: Vec<&str> = ReasoningStep::required_fields();
        required.push("function");

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new(default_toolkit())
    }
}
