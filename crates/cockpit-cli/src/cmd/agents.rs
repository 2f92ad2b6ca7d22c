use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use cockpit_core::agents::lint_dir;

use crate::output::{print_json, print_table};

#[derive(Subcommand)]
pub enum AgentsSubcommand {
    /// Check agent instruction files for required sections and placeholders
    Lint {
        /// Directory of agent markdown files
        dir: PathBuf,
    },
}

pub fn run(subcmd: AgentsSubcommand, json: bool) -> Result<()> {
    match subcmd {
        AgentsSubcommand::Lint { dir } => lint(&dir, json),
    }
}

fn lint(dir: &std::path::Path, json: bool) -> Result<()> {
    let reports =
        lint_dir(dir).with_context(|| format!("failed to read agent files in {}", dir.display()))?;
    if reports.is_empty() {
        anyhow::bail!("no .md files in {}", dir.display());
    }

    if json {
        print_json(&reports)?;
    } else {
        let rows = reports
            .iter()
            .map(|r| {
                vec![
                    r.file.clone(),
                    r.score.to_string(),
                    if r.passed { "pass" } else { "FAIL" }.to_string(),
                ]
            })
            .collect();
        print_table(&["FILE", "SCORE", "RESULT"], rows);

        for report in &reports {
            for e in &report.errors {
                println!("[error] {}: {e}", report.file);
            }
            for w in &report.warnings {
                println!("[warning] {}: {w}", report.file);
            }
        }
    }

    let failed = reports.iter().filter(|r| !r.passed).count();
    if failed > 0 {
        anyhow::bail!("{failed} agent file(s) failed lint");
    }
    Ok(())
}
