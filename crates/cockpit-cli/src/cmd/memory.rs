use std::path::Path;

use anyhow::Result;
use claude_agent::Role;
use clap::Subcommand;
use cockpit_core::memory::MemoryStore;
use cockpit_core::types::Agent;

use super::open_store;
use crate::output::print_json;

#[derive(Subcommand)]
pub enum MemorySubcommand {
    /// Print the stored conversation between a user and an agent
    Show {
        /// Sender phone number
        #[arg(long)]
        user: String,
        /// Agent name (publicist, growth, strategist, content, credit)
        #[arg(long)]
        agent: String,
    },

    /// Forget every conversation for a user
    Clear {
        /// Sender phone number
        #[arg(long)]
        user: String,
    },
}

pub fn run(root: &Path, subcmd: MemorySubcommand, json: bool) -> Result<()> {
    let (config, kv) = open_store(root)?;
    let memory = MemoryStore::new(kv, config.memory.max_entries);

    match subcmd {
        MemorySubcommand::Show { user, agent } => {
            let agent: Agent = agent.parse()?;
            let history = memory.get(&user, agent)?;
            let last_active = memory.last_active(&user)?;
            if json {
                return print_json(&serde_json::json!({
                    "user": user,
                    "agent": agent,
                    "last_active": last_active,
                    "history": history,
                }));
            }
            if history.is_empty() {
                println!("No conversation with {agent} for {user}.");
                return Ok(());
            }
            for turn in &history {
                let speaker = match turn.role {
                    Role::User => user.as_str(),
                    Role::Assistant => agent.as_str(),
                };
                println!("[{speaker}] {}", turn.content);
            }
            if let Some(last) = last_active {
                println!("\nlast active agent: {last}");
            }
        }
        MemorySubcommand::Clear { user } => {
            memory.clear(&user)?;
            if json {
                return print_json(&serde_json::json!({ "user": user, "cleared": true }));
            }
            println!("Cleared conversation memory for {user}.");
        }
    }
    Ok(())
}
