//! Business-state context appended to agent instructions.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::content::ContentStore;
use crate::paths;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub metrics: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub goals: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Positioning {
    #[serde(default)]
    pub unique_features: Vec<String>,
}

/// Contents of `config/business-state.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessState {
    #[serde(default)]
    pub last_updated: String,
    #[serde(default)]
    pub products: BTreeMap<String, Product>,
    #[serde(default)]
    pub current_priorities: Vec<String>,
    #[serde(default)]
    pub recent_wins: Vec<String>,
    #[serde(default)]
    pub upcoming_milestones: Vec<String>,
    #[serde(default)]
    pub competitive_positioning: BTreeMap<String, Positioning>,
}

/// Render a JSON scalar without the quotes `Value::to_string` adds.
fn plain(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl BusinessState {
    pub async fn load(content: &ContentStore) -> Option<Self> {
        match content.fetch_json::<Self>(paths::BUSINESS_STATE_JSON).await {
            Ok(Some(state)) => Some(state),
            Ok(None) => {
                tracing::info!("business context not found, skipping injection");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "business context unavailable, skipping injection");
                None
            }
        }
    }

    /// The `## CURRENT BUSINESS CONTEXT` markdown block.
    pub fn render(&self, today: NaiveDate) -> String {
        let mut out = format!(
            "\n---\n\n## CURRENT BUSINESS CONTEXT (Last Updated: {})\n\n",
            self.last_updated
        );

        out.push_str("### Products:\n\n");
        for product in self.products.values() {
            out.push_str(&format!("**{}:**\n", product.name));
            out.push_str(&format!("- Status: {}\n", product.status));
            if !product.metrics.is_empty() {
                out.push_str("- Current Metrics:\n");
                for (metric, value) in &product.metrics {
                    out.push_str(&format!("  - {metric}: {}\n", plain(value)));
                }
            }
            if !product.goals.is_empty() {
                let goals: Vec<String> = product.goals.values().map(plain).collect();
                out.push_str(&format!("- Goals: {}\n", goals.join(", ")));
            }
            out.push('\n');
        }

        if !self.current_priorities.is_empty() {
            out.push_str("### Current Priorities:\n");
            for (i, priority) in self.current_priorities.iter().enumerate() {
                out.push_str(&format!("{}. {priority}\n", i + 1));
            }
            out.push('\n');
        }

        if !self.recent_wins.is_empty() {
            out.push_str("### Recent Wins:\n");
            for win in &self.recent_wins {
                out.push_str(&format!("- {win}\n"));
            }
            out.push('\n');
        }

        if !self.upcoming_milestones.is_empty() {
            out.push_str("### Upcoming Milestones:\n");
            for milestone in &self.upcoming_milestones {
                out.push_str(&format!("- {milestone}\n"));
            }
            out.push('\n');
        }

        if !self.competitive_positioning.is_empty() {
            out.push_str("### Competitive Positioning:\n");
            for (product, positioning) in &self.competitive_positioning {
                if positioning.unique_features.is_empty() {
                    continue;
                }
                out.push_str(&format!("\n**{product} unique features:**\n"));
                for feature in &positioning.unique_features {
                    out.push_str(&format!("- {feature}\n"));
                }
            }
            out.push('\n');
        }

        out.push_str(&format!(
            "**IMPORTANT:** Use this current context when responding. Reference actual metrics, recent wins, and current priorities. Keep responses relevant to today ({}).\n",
            today.format("%Y-%m-%d")
        ));
        out.push_str("\n---\n");
        out
    }
}

/// Instructions with the business context appended, or unchanged when no
/// state is available.
pub fn inject(instructions: &str, state: Option<&BusinessState>, today: NaiveDate) -> String {
    match state {
        Some(state) => format!("{instructions}\n\n{}", state.render(today)),
        None => instructions.to_string(),
    }
}
