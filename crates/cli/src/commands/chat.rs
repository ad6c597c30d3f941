//! `stepwise chat`: Interactive, single-message, or piped chat.
//!
//! Model output is streamed as it arrives: deltas in green, tool results in
//! blue, and `=== end ===` once a run is over. Input piped on stdin is
//! folded into the prompt.

use crossterm::style::Stylize;
use futures::StreamExt;
use std::io::{IsTerminal, Read, Write};
use std::sync::Arc;
use stepwise_agent::{AgentEvent, AgentOutcome, ReactAgent};
use stepwise_config::AppConfig;
use stepwise_core::ChatMemory;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

/// Combine piped stdin with the user's message.
fn fold_stdin(piped: &str, message: &str) -> String {
    format!("stdin:\n{}\n\ncurrent user input: {message}", piped.trim_end())
}

/// Terminal rendering of a streamed event.
fn render(event: &AgentEvent) -> Option<String> {
    match event {
        AgentEvent::Stream { delta } => Some(delta.as_str().green().to_string()),
        AgentEvent::ToolResultMessage { output } => {
            Some(format!("\n{}\n", output.content.as_str().blue()))
        }
        AgentEvent::Stop => Some("\n=== end ===\n".to_string()),
        _ => None,
    }
}

fn build_agent(config: &AppConfig) -> Result<ReactAgent, Box<dyn std::error::Error>> {
    let router = stepwise_providers::build_from_config(config);
    let Some(provider) = router.default() else {
        eprintln!();
        eprintln!("  ERROR: provider '{}' is not configured.", config.default_provider);
        eprintln!();
        eprintln!("  Set STEPWISE_API_KEY (or OPENAI_API_KEY), or add a key to:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No provider available. See above for setup instructions.".into());
    };
    let tools = Arc::new(super::terminal_tools(&config.tools));
    Ok(stepwise_gateway::agent_from_config(config, provider, tools))
}

/// Run one turn, printing events as they arrive. Returns the memory to
/// continue from; Ctrl+C cancels the run.
async fn turn(
    agent: &ReactAgent,
    input: String,
    memory: ChatMemory,
) -> Result<Option<ChatMemory>, Box<dyn std::error::Error>> {
    let mut handle = agent.run_with_memory(input, memory)?;
    let mut events = handle.stream_events()?;
    let mut stdout = std::io::stdout();

    loop {
        tokio::select! {
            event = events.next() => {
                let Some(event) = event else { break };
                if let Some(text) = render(&event) {
                    write!(stdout, "{text}")?;
                    stdout.flush()?;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                debug!(run_id = handle.run_id(), "Interrupted, cancelling run");
                handle.cancel();
            }
        }
    }

    match handle.await {
        Ok(AgentOutcome::Done(output)) => Ok(Some(output.memory)),
        Ok(AgentOutcome::Cancelled) => {
            eprintln!("{}", "run cancelled".red());
            Ok(None)
        }
        Ok(AgentOutcome::TimedOut { budget, elapsed }) => {
            let message = format!(
                "run timed out: {budget} budget exhausted after {:.1}s",
                elapsed.as_secs_f64()
            );
            eprintln!("{}", message.red());
            Ok(None)
        }
        Err(e) => {
            eprintln!("{}", format!("error: {e}").red());
            Ok(None)
        }
    }
}

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let agent = build_agent(&config)?;

    let piped = if std::io::stdin().is_terminal() {
        None
    } else {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        Some(buf)
    };

    let single = match (piped, message) {
        (Some(piped), Some(message)) => Some(fold_stdin(&piped, &message)),
        (Some(piped), None) => Some(piped),
        (None, message) => message,
    };

    if let Some(input) = single {
        turn(&agent, input, ChatMemory::new()).await?;
        return Ok(());
    }

    println!();
    println!("  Stepwise interactive chat");
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", config.default_model);
    println!("  Tools:     {}", agent.tools().names().join(", "));
    println!();
    println!("  Type your message and press Enter. Type 'exit' to quit.");
    println!("  Ctrl+C cancels a running answer.");
    println!();

    let mut memory = ChatMemory::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else { break };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input, "exit" | "quit") {
            break;
        }

        if let Some(next) = turn(&agent, input.to_string(), memory.clone()).await? {
            memory = next;
        }
    }

    println!();
    Ok(())
}
