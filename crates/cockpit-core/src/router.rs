//! Command router: raw message text in, exactly one [`ParsedCommand`] out.
//!
//! Matching order:
//!
//! 1. `/admin ...`
//! 2. `/name [input]` quick actions (only while the catalog is reachable)
//! 3. `@collab a b task` / `@collaborate a b task`
//! 4. a lone special keyword (`help`, `agents`, `clear`, `reset`, `status`)
//! 5. `@agent [query]`
//! 6. anything else goes to the user's last active agent

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{CockpitError, Result};
use crate::quick_action::QuickActionCatalog;
use crate::types::{Agent, ParsedCommand, SpecialCommand};

/// Quick-action names that show the catalog instead of running an action.
const QUICK_ACTION_HELP: &[&str] = &["actions", "help"];

static ADMIN_RE: OnceLock<Regex> = OnceLock::new();
static QUICK_ACTION_RE: OnceLock<Regex> = OnceLock::new();
static COLLAB_RE: OnceLock<Regex> = OnceLock::new();
static AGENT_RE: OnceLock<Regex> = OnceLock::new();

fn admin_re() -> &'static Regex {
    ADMIN_RE.get_or_init(|| Regex::new(r"(?is)^/admin(?:\s+(\S+))?(?:\s.*)?$").unwrap())
}

fn quick_action_re() -> &'static Regex {
    QUICK_ACTION_RE.get_or_init(|| Regex::new(r"(?s)^/(\w[\w-]*)(\s+.*)?$").unwrap())
}

fn collab_re() -> &'static Regex {
    COLLAB_RE.get_or_init(|| {
        Regex::new(r"(?is)^@(collaborate|collab)\s+@?(\w+)\s+@?(\w+)\s+(.+)$").unwrap()
    })
}

fn agent_re() -> &'static Regex {
    AGENT_RE.get_or_init(|| Regex::new(r"(?s)^@(\w+)\s*(.*)$").unwrap())
}

/// Route one message.
///
/// `catalog` is `None` when quick actions could not be loaded; slash
/// commands then fall through to an ordinary agent query.
pub fn route(text: &str, catalog: Option<&QuickActionCatalog>) -> Result<ParsedCommand> {
    let text = text.trim();
    if text.is_empty() {
        return Err(CockpitError::EmptyOrUnsupportedMessage(
            "empty message".to_string(),
        ));
    }

    if let Some(caps) = admin_re().captures(text) {
        let subcommand = caps
            .get(1)
            .map(|m| m.as_str().to_lowercase())
            .unwrap_or_else(|| "help".to_string());
        return Ok(ParsedCommand::Admin { subcommand });
    }

    if let Some(catalog) = catalog {
        if let Some(caps) = quick_action_re().captures(text) {
            let name = caps[1].to_lowercase();
            let input = caps
                .get(2)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default();
            if QUICK_ACTION_HELP.contains(&name.as_str()) {
                return Ok(ParsedCommand::QuickAction {
                    name,
                    input,
                    help: true,
                });
            }
            if !catalog.contains(&name) {
                return Err(catalog.not_found(&name));
            }
            return Ok(ParsedCommand::QuickAction {
                name,
                input,
                help: false,
            });
        }
    }

    if let Some(caps) = collab_re().captures(text) {
        let agent_a = parse_collaborator(&caps[2])?;
        let agent_b = parse_collaborator(&caps[3])?;
        return Ok(ParsedCommand::Collaboration {
            agent_a,
            agent_b,
            task: caps[4].trim().to_string(),
        });
    }

    if let Some(command) = SpecialCommand::parse(&text.to_lowercase()) {
        return Ok(ParsedCommand::Special { command });
    }

    if let Some(caps) = agent_re().captures(text) {
        return Ok(ParsedCommand::AgentQuery {
            agent: Some(caps[1].to_lowercase()),
            query: caps[2].trim().to_string(),
        });
    }

    Ok(ParsedCommand::AgentQuery {
        agent: None,
        query: text.to_string(),
    })
}

fn parse_collaborator(name: &str) -> Result<Agent> {
    name.parse()
        .map_err(|_| CockpitError::CollaborationAgentInvalid(name.to_lowercase()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
