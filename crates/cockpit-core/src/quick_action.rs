//! Slash-command macros (`/weekly-review`, `/content-blast`, ...) defined in
//! `config/quick-actions.json`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::content::ContentStore;
use crate::error::{CockpitError, Result};
use crate::paths;
use crate::types::Agent;

/// Action value of `agent` that chains two agents instead of one.
pub const COLLABORATE: &str = "collaborate";

const HELP_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "Strategy & Planning",
        &["weekly-review", "monthly-goals", "pricing-analysis", "launch-plan"],
    ),
    (
        "Content Creation",
        &["content-blast", "content-repurpose", "announcement"],
    ),
    (
        "Growth & Marketing",
        &["growth-audit", "viral-breakdown", "competitor-analysis"],
    ),
];

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickAction {
    pub name: String,
    #[serde(default)]
    pub emoji: String,
    #[serde(default)]
    pub description: String,
    /// An agent name, or `"collaborate"`.
    pub agent: String,
    pub prompt: String,
    #[serde(default)]
    pub requires_input: bool,
    #[serde(default)]
    pub collaborate_agents: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickActionCatalog {
    #[serde(default)]
    pub quick_actions: BTreeMap<String, QuickAction>,
}

impl QuickActionCatalog {
    /// Fetch the catalog. Any failure means "quick actions unavailable".
    pub async fn load(content: &ContentStore) -> Option<Self> {
        match content.fetch_json::<Self>(paths::QUICK_ACTIONS_JSON).await {
            Ok(Some(catalog)) => Some(catalog),
            Ok(None) => {
                tracing::info!("quick actions catalog not found");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "quick actions catalog unavailable");
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&QuickAction> {
        self.quick_actions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.quick_actions.contains_key(name)
    }

    /// The error for an unknown `/name`, listing every key in the catalog.
    pub fn not_found(&self, name: &str) -> CockpitError {
        CockpitError::QuickActionNotFound {
            name: name.to_string(),
            available: self.quick_actions.keys().cloned().collect(),
        }
    }

    /// The `/actions` listing, grouped by category.
    pub fn help_text(&self) -> String {
        let mut message =
            String::from("⚡ **Quick Actions**\n\nTrigger powerful workflows with a single command:\n\n");

        let mut listed = Vec::new();
        for (category, keys) in HELP_CATEGORIES {
            message.push_str(&format!("**{category}:**\n"));
            for key in *keys {
                if let Some(action) = self.get(key) {
                    message.push_str(&format!("{} `/{key}` - {}\n", action.emoji, action.description));
                    listed.push(*key);
                }
            }
            message.push('\n');
        }

        let others: Vec<_> = self
            .quick_actions
            .iter()
            .filter(|(key, _)| !listed.contains(&key.as_str()))
            .collect();
        if !others.is_empty() {
            message.push_str("**More:**\n");
            for (key, action) in others {
                message.push_str(&format!("{} `/{key}` - {}\n", action.emoji, action.description));
            }
            message.push('\n');
        }

        message.push_str("**Usage:**\n");
        message.push_str("• Type `/action-name` to trigger\n");
        message.push_str("• Some actions require input (they'll prompt you)\n");
        message.push_str("• Type `/actions` to see this list again\n\n");
        message.push_str("**Example:**\n`/weekly-review` → Strategist guides you through a weekly review");
        message
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// What a routed quick action turns into.
#[derive(Debug, Clone, PartialEq)]
pub enum QuickActionPlan {
    Help(String),
    /// The action needs input the user did not give; reply with its prompt.
    NeedsInput(String),
    Agent {
        agent: Agent,
        prompt: String,
    },
    Collaboration {
        agent_a: Agent,
        agent_b: Agent,
        task: String,
    },
}

pub fn resolve(
    catalog: &QuickActionCatalog,
    name: &str,
    input: &str,
    help: bool,
) -> Result<QuickActionPlan> {
    if help {
        return Ok(QuickActionPlan::Help(catalog.help_text()));
    }

    let action = catalog
        .get(name)
        .ok_or_else(|| catalog.not_found(name))?;
    let input = input.trim();

    if action.requires_input && input.is_empty() {
        return Ok(QuickActionPlan::NeedsInput(format!(
            "{} **{}**\n\n{}",
            action.emoji, action.name, action.prompt
        )));
    }

    let mut prompt = action.prompt.clone();
    if action.requires_input {
        prompt.push_str("\n\n");
        prompt.push_str(input);
    }

    if action.agent.eq_ignore_ascii_case(COLLABORATE) {
        let [a, b] = action.collaborate_agents.as_slice() else {
            return Err(CockpitError::QuickActionInvalid {
                name: name.to_string(),
                reason: format!(
                    "collaborateAgents must name exactly two agents, found {}",
                    action.collaborate_agents.len()
                ),
            });
        };
        let agent_a: Agent = a
            .parse()
            .map_err(|_| CockpitError::CollaborationAgentInvalid(a.clone()))?;
        let agent_b: Agent = b
            .parse()
            .map_err(|_| CockpitError::CollaborationAgentInvalid(b.clone()))?;
        return Ok(QuickActionPlan::Collaboration {
            agent_a,
            agent_b,
            task: prompt,
        });
    }

    let agent: Agent = action.agent.parse()?;
    Ok(QuickActionPlan::Agent { agent, prompt })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
