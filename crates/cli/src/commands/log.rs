//! `sgr-research log`: Summarize a persisted agent log.

use std::fmt::Write;
use std::path::Path;

use sgr_research_agent::{AgentLogDocument, LogEntryKind};

use super::preview;

pub async fn run(path: &Path, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let document = AgentLogDocument::load(path).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&document)?);
    } else {
        print!("{}", summarize(&document));
    }
    Ok(())
}

pub fn summarize(doc: &AgentLogDocument) -> String {
    let ctx = &doc.context;
    let mut out = String::new();
    let _ = writeln!(out, "  Agent:           {}", doc.id);
    let _ = writeln!(out, "  Task:            {}", doc.task);
    let _ = writeln!(out, "  Model:           {} ({})", doc.model_info.model, doc.model_info.base_url);
    let _ = writeln!(out, "  State:           {}", ctx.state);
    let _ = writeln!(out, "  Iterations:      {}", ctx.iteration);
    let _ = writeln!(out, "  Searches:        {}", ctx.searches_used);
    let _ = writeln!(out, "  Clarifications:  {}", ctx.clarifications_used);
    if let Some(report) = &ctx.report_path {
        let _ = writeln!(out, "  Report:          {report}");
    }

    let counts = doc
        .step_counts()
        .iter()
        .map(|(step_type, n)| format!("{step_type}={n}"))
        .collect::<Vec<_>>()
        .join(", ");
    let _ = writeln!(out, "  Entries:         {} ({counts})", doc.log.len());
    let _ = writeln!(out);

    for entry in &doc.log {
        if let LogEntryKind::ToolExecution {
            tool_name,
            agent_tool_execution_result,
            ..
        } = &entry.kind
        {
            let first_line = agent_tool_execution_result.lines().next().unwrap_or_default();
            let _ = writeln!(
                out,
                "  [{:>2}] {tool_name:<16} {}",
                entry.step_number,
                preview(first_line, 80)
            );
        }
    }
    out
}
