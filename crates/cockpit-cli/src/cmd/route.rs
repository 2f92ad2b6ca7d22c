use anyhow::Result;
use cockpit_core::router;
use cockpit_core::types::ParsedCommand;

use crate::output::print_json;

/// Route `text` offline. Quick actions need the content repo, so slash
/// commands other than the built-ins fall through as they do when the
/// catalog is unreachable.
pub fn run(text: &str, json: bool) -> Result<()> {
    let command = router::route(text, None)?;

    if json {
        return print_json(&command);
    }

    match command {
        ParsedCommand::Special { command } => println!("special: {}", command.as_str()),
        ParsedCommand::QuickAction { name, input, help } => {
            println!("quick action: {name} (help: {help})");
            println!("input: {input}");
        }
        ParsedCommand::Collaboration {
            agent_a,
            agent_b,
            task,
        } => {
            println!("collaboration: {agent_a} + {agent_b}");
            println!("task: {task}");
        }
        ParsedCommand::AgentQuery { agent, query } => {
            println!("agent: {}", agent.as_deref().unwrap_or("(last active)"));
            if query.is_empty() {
                println!("query: (greeting)");
            } else {
                println!("query: {query}");
            }
        }
        ParsedCommand::Admin { subcommand } => println!("admin: {subcommand}"),
    }
    Ok(())
}
