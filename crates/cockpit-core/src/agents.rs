//! Agent instruction loading and authoring checks.

use std::path::Path;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::content::ContentStore;
use crate::error::{CockpitError, Result};
use crate::paths;
use crate::types::Agent;

/// Instruction files shorter than this are treated as broken.
pub const MIN_INSTRUCTION_CHARS: usize = 100;

// ---------------------------------------------------------------------------
// AgentProfile / AgentLoader
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub agent: Agent,
    /// Path within the content repository, e.g. `agents/growth-hacker.md`.
    pub file: String,
    pub instructions: String,
    /// When the instructions were fetched from the content store.
    pub loaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AgentLoader {
    content: ContentStore,
}

impl AgentLoader {
    pub fn new(content: ContentStore) -> Self {
        Self { content }
    }

    pub async fn load(&self, agent: Agent) -> Result<AgentProfile> {
        let file = paths::agent_file(agent.file_stem());
        let doc = self
            .content
            .fetch_text_cached(&file)
            .await?
            .ok_or_else(|| CockpitError::AgentNotFound(agent.to_string()))?;

        let chars = doc.body.trim().chars().count();
        if chars < MIN_INSTRUCTION_CHARS {
            return Err(CockpitError::AgentInvalid {
                name: agent.to_string(),
                reason: format!("instructions are {chars} characters (minimum {MIN_INSTRUCTION_CHARS})"),
            });
        }

        tracing::debug!(%agent, %file, chars, "agent instructions loaded");
        Ok(AgentProfile {
            agent,
            file,
            instructions: doc.body,
            loaded_at: doc.fetched_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Lint
// ---------------------------------------------------------------------------

pub const REQUIRED_SECTIONS: &[&str] = &["## Role", "## Personality", "## Core Responsibilities"];

pub const RECOMMENDED_SECTIONS: &[&str] = &[
    "## Knowledge Base",
    "## Output Format",
    "## Constraints",
    "## Example",
];

const PLACEHOLDERS: &[&str] = &[
    "your-business-name",
    "TODO",
    "PLACEHOLDER",
    "[Insert",
    "example.com",
];

const MIN_LINT_CHARS: usize = 1000;
const MIN_HEADINGS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LintReport {
    pub file: String,
    pub score: i32,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub passed: bool,
}

/// Score an agent markdown file out of 100. Errors fail the file;
/// warnings only cost points.
pub fn lint_agent_markdown(file: &str, content: &str) -> LintReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut score: i32 = 100;

    let len = content.chars().count();
    if len < MIN_LINT_CHARS {
        errors.push(format!(
            "File too short ({len} chars). Expected >{MIN_LINT_CHARS} chars."
        ));
        score -= 20;
    }

    for section in REQUIRED_SECTIONS {
        if !content.contains(section) {
            errors.push(format!("Missing required section: {section}"));
            score -= 20;
        }
    }

    for section in RECOMMENDED_SECTIONS {
        if !content.contains(section) {
            warnings.push(format!("Missing recommended section: {section}"));
            score -= 5;
        }
    }

    for placeholder in PLACEHOLDERS {
        if content.contains(placeholder) {
            warnings.push(format!(
                "Found placeholder text: \"{placeholder}\" - should be updated"
            ));
            score -= 2;
        }
    }

    let headings = heading_count(content);
    if headings < MIN_HEADINGS {
        warnings.push(format!(
            "Only {headings} headings found. Consider better structure."
        ));
        score -= 5;
    }

    if !content.to_lowercase().contains("example") {
        warnings.push("No examples found. Consider adding example interactions.".to_string());
        score -= 5;
    }

    LintReport {
        file: file.to_string(),
        score,
        passed: errors.is_empty(),
        errors,
        warnings,
    }
}

static HEADING_RE: OnceLock<Regex> = OnceLock::new();

fn heading_count(content: &str) -> usize {
    HEADING_RE
        .get_or_init(|| Regex::new(r"(?m)^#{1,3}\s").unwrap())
        .find_iter(content)
        .count()
}

/// Lint every `*.md` in `dir` except `_template.md`, sorted by file name.
pub fn lint_dir(dir: &Path) -> Result<Vec<LintReport>> {
    let mut files: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension().is_some_and(|ext| ext == "md")
                && p.file_name().is_some_and(|n| n != "_template.md")
        })
        .collect();
    files.sort();

    let mut reports = Vec::with_capacity(files.len());
    for path in files {
        let content = std::fs::read_to_string(&path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        reports.push(lint_agent_markdown(&name, &content));
    }
    Ok(reports)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContentConfig;

    fn good_agent() -> String {
        let mut s = String::from("# Publicist\n\n## Role\nYou announce launches.\n\n");
        s.push_str("## Personality\nUpbeat and concise.\n\n");
        s.push_str("## Core Responsibilities\n- Press releases\n- Social posts\n\n");
        s.push_str("## Knowledge Base\nPropIQ and friends.\n\n");
        s.push_str("## Output Format\nShort paragraphs.\n\n");
        s.push_str("## Constraints\nNo hype without data.\n\n");
        s.push_str("## Example\nUser: we hit 100 users. You: celebrate it.\n\n");
        while s.len() < 1200 {
            s.push_str("Keep every announcement grounded in a real metric.\n");
        }
        s
    }

    fn loader_for(server: &mockito::ServerGuard) -> AgentLoader {
        let cfg = ContentConfig {
            base_url: Some(server.url()),
            agent_cache_ttl_secs: 0,
            ..ContentConfig::default()
        };
        AgentLoader::new(ContentStore::new(&cfg).unwrap())
    }

    #[tokio::test]
    async fn load_maps_agent_to_file() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/agents/growth-hacker.md")
            .with_status(200)
            .with_body(good_agent())
            .create_async()
            .await;

        let profile = loader_for(&server).load(Agent::Growth).await.unwrap();
        mock.assert_async().await;
        assert_eq!(profile.agent, Agent::Growth);
        assert_eq!(profile.file, "agents/growth-hacker.md");
        assert!(profile.instructions.contains("## Role"));
    }

    #[tokio::test]
    async fn missing_file_is_agent_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/agents/credit-advisor.md")
            .with_status(404)
            .create_async()
            .await;

        let err = loader_for(&server).load(Agent::Credit).await.unwrap_err();
        assert!(matches!(err, CockpitError::AgentNotFound(ref n) if n == "credit"));
    }

    #[tokio::test]
    async fn short_file_is_agent_invalid() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/agents/publicist.md")
            .with_status(200)
            .with_body("# stub")
            .create_async()
            .await;

        let err = loader_for(&server)
            .load(Agent::Publicist)
            .await
            .unwrap_err();
        assert!(matches!(err, CockpitError::AgentInvalid { .. }));
    }

    #[test]
    fn complete_agent_scores_full_marks() {
        let report = lint_agent_markdown("publicist.md", &good_agent());
        assert!(report.passed, "{report:?}");
        assert!(report.warnings.is_empty(), "{report:?}");
        assert_eq!(report.score, 100);
    }

    #[test]
    fn missing_required_section_fails() {
        let content = good_agent().replace("## Personality", "## Vibe");
        let report = lint_agent_markdown("publicist.md", &content);
        assert!(!report.passed);
        assert_eq!(report.score, 80);
        assert!(report.errors[0].contains("## Personality"));
    }

    #[test]
    fn placeholders_and_short_file_cost_points() {
        let content = "## Role\n## Personality\n## Core Responsibilities\nTODO: fill in\n";
        let report = lint_agent_markdown("stub.md", content);
        assert!(!report.passed);
        // -20 short, -20 recommended (4 x 5), -2 TODO, -5 headings, -5 example
        assert_eq!(report.score, 48);
    }

    #[test]
    fn lint_dir_skips_template_and_non_markdown() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("publicist.md"), good_agent()).unwrap();
        std::fs::write(dir.path().join("_template.md"), "# template").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

        let reports = lint_dir(dir.path()).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].file, "publicist.md");
    }
}
