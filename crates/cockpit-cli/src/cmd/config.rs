use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;
use cockpit_core::config::{Config, Credentials, WarnLevel};

use crate::output::print_json;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Validate cockpit.yaml and the environment for common mistakes
    Check,
}

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> Result<()> {
    match subcmd {
        ConfigSubcommand::Check => check(root, json),
    }
}

fn check(root: &Path, json: bool) -> Result<()> {
    let mut config = Config::load(root).context("failed to load config")?;
    config.apply_env();
    let credentials = Credentials::from_env();

    let mut warnings = config.validate();
    warnings.extend(credentials.validate(config.transcription.enabled));

    if json {
        print_json(&serde_json::json!({
            "model": config.claude.model,
            "content_base_url": config.content.raw_base_url(),
            "warnings": warnings,
        }))?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config check found errors");
    }
    Ok(())
}
