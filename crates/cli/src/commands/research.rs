//! `sgr-research research`: Run one research task.

use std::io::Write;
use std::path::Path;

use sgr_research_agent::{AgentHandle, AgentStreamEvent, AgentVariant, ResearchAgent};
use sgr_research_config::AppConfig;
use sgr_research_core::research::ResearchState;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{load_config, preview};

pub struct ResearchOptions {
    pub agent: String,
    pub max_iterations: Option<u32>,
    pub no_clarify: bool,
    pub show_tokens: bool,
}

pub async fn run(
    config_path: Option<&Path>,
    task: String,
    options: ResearchOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let variant = AgentVariant::from_name(&options.agent).ok_or_else(|| {
        let known: Vec<&str> = AgentVariant::ALL.iter().map(|v| v.name()).collect();
        format!("Unknown agent '{}' (expected one of: {})", options.agent, known.join(", "))
    })?;

    let mut config = load_config(config_path)?;
    apply_options(&mut config, &options);
    config.validate()?;

    if !config.has_api_key() && config.llm.base_url.contains("api.openai.com") {
        eprintln!();
        eprintln!("  ERROR: No LLM API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    SGR_RESEARCH_API_KEY = 'sk-...'");
        eprintln!("    OPENAI_API_KEY       = 'sk-...'");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let provider = sgr_research_providers::build_from_config(&config.llm)?;
    let search =
        sgr_research_tools::build_search(config.search.api_key.as_deref(), &config.search.base_url);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let agent = ResearchAgent::new(task, variant, provider, search, &config)?
        .with_stream(tx)
        .with_cancellation(cancel.clone());
    let handle = agent.handle();

    println!();
    println!("  Agent:     {}", agent.id());
    println!("  Strategy:  {variant}");
    println!("  Model:     {}", config.llm.model);
    println!("  Task:      {}", agent.task());
    println!("  Budget:    {} iterations, {} searches", config.execution.max_iterations, config.execution.max_searches);
    println!();

    let run = tokio::spawn(agent.execute());

    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n  Cancelling research...");
            ctrl_c.cancel();
        }
    });

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    while let Some(event) = rx.recv().await {
        render(&event, options.show_tokens);
        if matches!(event, AgentStreamEvent::Clarification { .. }) {
            answer_clarification(&handle, &mut stdin, &cancel).await?;
        }
    }

    let outcome = run.await?;
    println!();
    println!("  State:       {}", outcome.state);
    println!("  Iterations:  {}", outcome.iterations);
    if let Some(report) = &outcome.report_path {
        println!("  Report:      {report}");
    }
    if let Some(log) = &outcome.log_path {
        println!("  Log:         {}", log.display());
    }
    println!();

    if outcome.state != ResearchState::Completed {
        return Err(format!("Research ended in state '{}'", outcome.state).into());
    }
    Ok(())
}

fn apply_options(config: &mut AppConfig, options: &ResearchOptions) {
    if let Some(max) = options.max_iterations {
        config.execution.max_iterations = max;
    }
    if options.no_clarify {
        config.execution.allow_clarification = false;
    }
}

async fn answer_clarification<R>(
    handle: &AgentHandle,
    stdin: &mut tokio::io::Lines<R>,
    cancel: &CancellationToken,
) -> Result<(), Box<dyn std::error::Error>>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    print!("  Your answer > ");
    std::io::stdout().flush()?;

    tokio::select! {
        line = stdin.next_line() => match line? {
            Some(text) if !text.trim().is_empty() => handle.provide_clarification(text.trim()).await?,
            // EOF or an empty answer ends the run
            _ => handle.cancel(),
        },
        _ = cancel.cancelled() => {}
    }
    Ok(())
}

fn render(event: &AgentStreamEvent, show_tokens: bool) {
    match event {
        AgentStreamEvent::Chunk { content } => {
            if show_tokens {
                print!("{content}");
                let _ = std::io::stdout().flush();
            }
        }
        AgentStreamEvent::Thought { content } => {
            if show_tokens {
                println!();
            }
            println!("  💭 {}", preview(content, 300));
        }
        AgentStreamEvent::ToolCall { name, input, .. } => {
            println!("  🔧 {name} {}", preview(&input.to_string(), 200));
        }
        AgentStreamEvent::ToolResult { output, .. } => {
            for line in preview(output, 600).lines() {
                println!("     {line}");
            }
            println!();
        }
        AgentStreamEvent::Clarification { questions } => {
            println!("  ⏸️  Research paused, please answer:");
            for line in questions.lines() {
                println!("     • {line}");
            }
        }
        AgentStreamEvent::Done { .. } => {}
        AgentStreamEvent::Error { message } => {
            eprintln!("  [Error] {message}");
        }
    }
}
