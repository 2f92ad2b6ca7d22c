//! `help`, `agents`, `clear`, `reset` and `status`.

use crate::error::Result;
use crate::memory::MemoryStore;
use crate::types::{Agent, SpecialCommand};

pub const ROSTER_TEXT: &str = "🤖 **The Cockpit - Available Agents**

Send a message with an agent trigger to get started:

📣 **@publicist** - PR & announcements
Help with product launches, milestones, content creation

📈 **@growth** - Growth & virality tactics
Algorithm optimization, platform growth strategies

🧠 **@strategist** - Strategic decisions
Big business decisions, pivots, ROI analysis

🎬 **@content** - Content creation
Video scripts, sponsorships, monetization

💳 **@credit** - Financial advice
Credit scores, debt management, financial planning

**Example:** \"@publicist PropIQ hit 100 users!\"

**Special commands:**
• help - Show this message
• clear - Clear conversation memory
• status - Show current agent
• /actions - Show quick actions";

pub const CLEARED_TEXT: &str = "🔄 **Conversation cleared**

Your conversation history has been reset.
Which agent would you like to talk to?

Try: @publicist, @growth, @strategist, @content, or @credit";

fn status_text(active: Option<Agent>) -> String {
    let names: Vec<&str> = Agent::all().iter().map(|a| a.as_str()).collect();
    let active = match active {
        Some(agent) => format!("@{agent}"),
        None => "None yet. Ready to chat!".to_string(),
    };
    format!(
        "📊 **Status**\n\n**Active:** {active}\n**Available agents:** {} ({})\n\nSend @[agent] to start a conversation.",
        names.len(),
        names.join(", ")
    )
}

/// Reply text for a special command. `clear`/`reset` wipe `user`'s memory.
pub fn handle(command: SpecialCommand, user: &str, memory: &MemoryStore) -> Result<String> {
    match command {
        SpecialCommand::Help | SpecialCommand::Agents => Ok(ROSTER_TEXT.to_string()),
        SpecialCommand::Clear | SpecialCommand::Reset => {
            memory.clear(user)?;
            Ok(CLEARED_TEXT.to_string())
        }
        SpecialCommand::Status => Ok(status_text(memory.last_active(user)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::KvStore;
    use tempfile::TempDir;

    fn memory() -> (TempDir, MemoryStore) {
        let dir = TempDir::new().unwrap();
        let kv = KvStore::open(&dir.path().join("s.redb")).unwrap();
        (dir, MemoryStore::new(kv, 10))
    }

    #[test]
    fn help_and_agents_show_roster() {
        let (_dir, memory) = memory();
        for cmd in [SpecialCommand::Help, SpecialCommand::Agents] {
            let text = handle(cmd, "1555", &memory).unwrap();
            assert!(text.starts_with("🤖 **The Cockpit - Available Agents**"));
            assert!(text.contains("**@credit**"));
        }
    }

    #[test]
    fn clear_wipes_every_agent_and_pointer() {
        let (_dir, memory) = memory();
        memory.append("1555", Agent::Growth, "q", "a").unwrap();
        memory.append("1555", Agent::Credit, "q", "a").unwrap();
        memory.set_last_active("1555", Agent::Credit).unwrap();

        let text = handle(SpecialCommand::Reset, "1555", &memory).unwrap();
        assert_eq!(text, CLEARED_TEXT);
        for agent in Agent::all() {
            assert!(memory.get("1555", *agent).unwrap().is_empty());
        }
        assert_eq!(memory.last_active("1555").unwrap(), None);
    }

    #[test]
    fn status_reports_last_active_agent() {
        let (_dir, memory) = memory();
        let text = handle(SpecialCommand::Status, "1555", &memory).unwrap();
        assert!(text.contains("**Active:** None yet"));

        memory.set_last_active("1555", Agent::Strategist).unwrap();
        let text = handle(SpecialCommand::Status, "1555", &memory).unwrap();
        assert!(text.contains("**Active:** @strategist"));
        assert!(text.contains("**Available agents:** 5 (publicist, growth, strategist, content, credit)"));
    }
}
