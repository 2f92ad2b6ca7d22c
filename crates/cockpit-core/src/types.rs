use chrono::{DateTime, Utc};
use claude_agent::TokenUsage;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CockpitError;

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// The fixed set of personas a user can address.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Agent {
    #[default]
    Publicist,
    Growth,
    Strategist,
    Content,
    Credit,
}

impl Agent {
    pub fn all() -> &'static [Agent] {
        &[
            Agent::Publicist,
            Agent::Growth,
            Agent::Strategist,
            Agent::Content,
            Agent::Credit,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Agent::Publicist => "publicist",
            Agent::Growth => "growth",
            Agent::Strategist => "strategist",
            Agent::Content => "content",
            Agent::Credit => "credit",
        }
    }

    /// Stem of the instruction file under `agents/` in the content repo.
    pub fn file_stem(self) -> &'static str {
        match self {
            Agent::Publicist => "publicist",
            Agent::Growth => "growth-hacker",
            Agent::Strategist => "strategist",
            Agent::Content => "content-strategist",
            Agent::Credit => "credit-advisor",
        }
    }

    /// `@publicist, @growth, @strategist, @content, @credit`
    pub fn roster() -> String {
        Agent::all()
            .iter()
            .map(|a| format!("@{a}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Agent {
    type Err = CockpitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "publicist" => Ok(Agent::Publicist),
            "growth" => Ok(Agent::Growth),
            "strategist" => Ok(Agent::Strategist),
            "content" => Ok(Agent::Content),
            "credit" => Ok(Agent::Credit),
            _ => Err(CockpitError::AgentNotFound(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// IncomingMessage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageKind {
    Text { body: String },
    Audio { media_id: String },
    Unsupported { message_type: String },
}

/// One inbound WhatsApp message, immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Sender phone number as reported by WhatsApp (digits, no `+`).
    pub from: String,
    pub id: String,
    /// Unix seconds as a string, straight from the payload.
    pub timestamp: String,
    pub kind: MessageKind,
    pub received_at: DateTime<Utc>,
}

impl IncomingMessage {
    pub fn text(from: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            id: format!("local-{}", uuid::Uuid::new_v4()),
            timestamp: Utc::now().timestamp().to_string(),
            kind: MessageKind::Text { body: body.into() },
            received_at: Utc::now(),
        }
    }

    pub fn message_type(&self) -> &str {
        match &self.kind {
            MessageKind::Text { .. } => "text",
            MessageKind::Audio { .. } => "audio",
            MessageKind::Unsupported { message_type } => message_type,
        }
    }
}

// ---------------------------------------------------------------------------
// ParsedCommand
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialCommand {
    Help,
    Agents,
    Clear,
    Reset,
    Status,
}

impl SpecialCommand {
    pub fn parse(keyword: &str) -> Option<SpecialCommand> {
        match keyword {
            "help" => Some(SpecialCommand::Help),
            "agents" => Some(SpecialCommand::Agents),
            "clear" => Some(SpecialCommand::Clear),
            "reset" => Some(SpecialCommand::Reset),
            "status" => Some(SpecialCommand::Status),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SpecialCommand::Help => "help",
            SpecialCommand::Agents => "agents",
            SpecialCommand::Clear => "clear",
            SpecialCommand::Reset => "reset",
            SpecialCommand::Status => "status",
        }
    }
}

/// Result of routing one message. Exactly one variant per message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParsedCommand {
    Special {
        command: SpecialCommand,
    },
    QuickAction {
        name: String,
        input: String,
        help: bool,
    },
    Collaboration {
        agent_a: Agent,
        agent_b: Agent,
        task: String,
    },
    /// `agent: None` means "whoever the user spoke to last".
    AgentQuery {
        agent: Option<String>,
        query: String,
    },
    Admin {
        subcommand: String,
    },
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// Dropped without a reply (empty, unsupported, failed transcription).
    Ignored,
    Denied,
    Special,
    Admin,
    QuickActionHelp,
    QuickActionPrompt,
    Greeting,
    AgentReply,
    Collaboration,
    /// A validation error answered with a friendly reply.
    Rejected,
    /// Upstream or configuration failure answered with an apology.
    Failed,
}

/// What the pipeline did with one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub kind: OutcomeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<Agent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    pub delivered: bool,
    pub usage: TokenUsage,
}

impl Outcome {
    pub fn ignored() -> Self {
        Self {
            kind: OutcomeKind::Ignored,
            agent: None,
            reply: None,
            delivered: false,
            usage: TokenUsage::default(),
        }
    }

    pub fn reply(kind: OutcomeKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            agent: None,
            reply: Some(text.into()),
            delivered: false,
            usage: TokenUsage::default(),
        }
    }

    pub fn with_agent(mut self, agent: Agent) -> Self {
        self.agent = Some(agent);
        self
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
