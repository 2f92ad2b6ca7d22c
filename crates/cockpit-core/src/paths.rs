use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "cockpit.yaml";
pub const DEFAULT_DB_FILE: &str = "cockpit.redb";

// Remote content repository layout
pub const AGENTS_DIR: &str = "agents";
pub const TEAM_ACCESS_JSON: &str = "config/team-access.json";
pub const QUICK_ACTIONS_JSON: &str = "config/quick-actions.json";
pub const BUSINESS_STATE_JSON: &str = "config/business-state.json";

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Resolve the database path; relative paths are anchored at `root`.
pub fn db_path(root: &Path, configured: &Path) -> PathBuf {
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        root.join(configured)
    }
}

pub fn agent_file(file_stem: &str) -> String {
    format!("{AGENTS_DIR}/{file_stem}.md")
}
