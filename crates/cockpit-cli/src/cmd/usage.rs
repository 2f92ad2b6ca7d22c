use std::path::Path;

use anyhow::Result;
use chrono::Utc;
use cockpit_core::usage::{month_of, MetricsLogger};

use super::open_store;
use crate::output::{print_json, print_table};

pub fn run(root: &Path, user: &str, month: Option<String>, json: bool) -> Result<()> {
    let month = month.unwrap_or_else(|| month_of(Utc::now()));
    if chrono::NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d").is_err() {
        anyhow::bail!("invalid month '{month}': expected YYYY-MM");
    }

    let (config, kv) = open_store(root)?;
    let metrics = MetricsLogger::new(kv, config.pricing);
    let usage = metrics.user_usage(user, &month)?;
    let team = metrics.team_usage(&month)?;

    if json {
        return print_json(&serde_json::json!({
            "user": user,
            "month": month,
            "usage": usage,
            "team": team,
        }));
    }

    println!("Usage for {user} in {month}");
    print_table(
        &["SCOPE", "MESSAGES", "TOKENS", "COST"],
        vec![
            vec![
                "user".to_string(),
                usage.messages.to_string(),
                usage.tokens.to_string(),
                format!("${:.4}", usage.cost),
            ],
            vec![
                "team".to_string(),
                team.messages.to_string(),
                team.tokens.to_string(),
                format!("${:.4}", team.cost),
            ],
        ],
    );
    Ok(())
}
