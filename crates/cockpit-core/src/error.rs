use thiserror::Error;

use crate::auth::Denial;
use crate::types::Agent;

#[derive(Debug, Error)]
pub enum CockpitError {
    #[error("{setting} not configured: set {env}")]
    ConfigurationMissing {
        setting: &'static str,
        env: &'static str,
    },

    #[error("{service} unavailable: {detail}")]
    UpstreamUnavailable {
        service: &'static str,
        status: Option<u16>,
        detail: String,
    },

    #[error("agent not found: {0}")]
    AgentNotFound(String),

    #[error("agent '{name}' has invalid instructions: {reason}")]
    AgentInvalid { name: String, reason: String },

    #[error("quick action not found: /{name}")]
    QuickActionNotFound {
        name: String,
        /// Catalog keys the user could have meant; empty when the catalog is unavailable.
        available: Vec<String>,
    },

    #[error("quick action '/{name}' is misconfigured: {reason}")]
    QuickActionInvalid { name: String, reason: String },

    #[error("invalid collaboration agent: {0}")]
    CollaborationAgentInvalid(String),

    #[error("unauthorized: {0}")]
    Unauthorized(Denial),

    #[error("empty or unsupported message: {0}")]
    EmptyOrUnsupportedMessage(String),

    #[error(transparent)]
    Claude(#[from] claude_agent::ClaudeAgentError),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("store error: {0}")]
    Store(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CockpitError>;

pub const GENERIC_APOLOGY: &str = "⚠️ I'm having trouble thinking right now. Please try again in a moment.\n\nIf this persists, type \"help\" for assistance.";

impl CockpitError {
    /// Text sent back to the user for this failure.
    ///
    /// `None` means the message is dropped without a reply.
    pub fn user_reply(&self) -> Option<String> {
        match self {
            CockpitError::ConfigurationMissing { setting, .. } => Some(format!(
                "⚠️ Configuration error: {setting} not set. Please contact the administrator."
            )),
            CockpitError::AgentNotFound(name) => Some(format!(
                "Agent \"{name}\" not found. Available agents: {}",
                Agent::roster()
            )),
            CockpitError::AgentInvalid { .. } => Some(
                "⚠️ Sorry, I couldn't load the agent configuration. Please try again or type \"help\" for available agents."
                    .to_string(),
            ),
            CockpitError::QuickActionNotFound { name, available } if available.is_empty() => {
                Some(format!(
                    "Quick action \"/{name}\" not found.\n\nType /actions to see all available quick actions."
                ))
            }
            CockpitError::QuickActionNotFound { name, available } => {
                let listed = available
                    .iter()
                    .map(|a| format!("/{a}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                Some(format!(
                    "Quick action \"/{name}\" not found.\n\nAvailable quick actions: {listed}\n\nType /actions for descriptions."
                ))
            }
            CockpitError::QuickActionInvalid { name, .. } => Some(format!(
                "⚠️ Quick action \"/{name}\" is not set up correctly. Please contact the administrator."
            )),
            CockpitError::CollaborationAgentInvalid(name) => Some(format!(
                "Agent \"{name}\" not found. Available: {}",
                Agent::roster()
            )),
            CockpitError::Unauthorized(denial) => Some(denial.message()),
            CockpitError::EmptyOrUnsupportedMessage(_) => None,
            CockpitError::UpstreamUnavailable { .. }
            | CockpitError::Claude(_)
            | CockpitError::Http(_)
            | CockpitError::Store(_)
            | CockpitError::Io(_)
            | CockpitError::Yaml(_)
            | CockpitError::Json(_) => Some(GENERIC_APOLOGY.to_string()),
        }
    }

    /// Validation failures are answered in-band; everything else aborts the
    /// remaining pipeline steps.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CockpitError::AgentNotFound(_)
                | CockpitError::QuickActionNotFound { .. }
                | CockpitError::QuickActionInvalid { .. }
                | CockpitError::CollaborationAgentInvalid(_)
                | CockpitError::EmptyOrUnsupportedMessage(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_names_the_setting() {
        let err = CockpitError::ConfigurationMissing {
            setting: "Claude API key",
            env: "CLAUDE_API_KEY",
        };
        assert_eq!(
            err.user_reply().unwrap(),
            "⚠️ Configuration error: Claude API key not set. Please contact the administrator."
        );
        assert!(err.to_string().contains("CLAUDE_API_KEY"));
    }

    #[test]
    fn unknown_agent_reply_lists_roster() {
        let reply = CockpitError::AgentNotFound("wizard".into())
            .user_reply()
            .unwrap();
        assert!(reply.contains("\"wizard\""));
        assert!(reply.contains("@publicist, @growth, @strategist, @content, @credit"));
    }

    #[test]
    fn unknown_quick_action_reply_lists_valid_actions() {
        let reply = CockpitError::QuickActionNotFound {
            name: "foo".into(),
            available: vec!["content-blast".into(), "weekly-review".into()],
        }
        .user_reply()
        .unwrap();
        assert!(reply.contains("\"/foo\" not found"));
        assert!(reply.contains("Available quick actions: /content-blast, /weekly-review"));
    }

    #[test]
    fn unknown_quick_action_without_catalog_points_to_actions() {
        let reply = CockpitError::QuickActionNotFound {
            name: "foo".into(),
            available: Vec::new(),
        }
        .user_reply()
        .unwrap();
        assert!(reply.contains("Type /actions"));
        assert!(!reply.contains("Available quick actions"));
    }

    #[test]
    fn misconfigured_quick_action_names_the_action() {
        let err = CockpitError::QuickActionInvalid {
            name: "launch-plan".into(),
            reason: "collaborateAgents must name exactly two agents".into(),
        };
        let reply = err.user_reply().unwrap();
        assert!(reply.contains("\"/launch-plan\" is not set up correctly"));
        assert!(!reply.contains("Agent"));
        assert!(err.is_validation());
    }

    #[test]
    fn empty_message_is_silently_dropped() {
        let err = CockpitError::EmptyOrUnsupportedMessage("image".into());
        assert!(err.user_reply().is_none());
        assert!(err.is_validation());
    }

    #[test]
    fn store_failure_gets_generic_apology() {
        let err = CockpitError::Store("disk full".into());
        assert_eq!(err.user_reply().as_deref(), Some(GENERIC_APOLOGY));
        assert!(!err.is_validation());
    }
}
