//! `/admin` subcommands for team owners and admins.

use crate::auth::{TeamAccess, TeamMember};
use crate::error::Result;
use crate::usage::MetricsLogger;

pub const NOT_ADMIN_TEXT: &str = "🚫 You do not have admin permissions.";

pub const HELP_TEXT: &str = "⚙️ **Admin Commands**

`/admin users` - List all team members
`/admin stats` - View usage statistics
`/admin plan` - View current plan details
`/admin help` - Show this message

**Note:** To invite users or manage billing, update the team-access.json file in your repository.";

/// Reply text for `/admin <subcommand>`.
///
/// `access` is `None` when the team file could not be loaded (fail-open
/// mode); only `help` is answerable then.
pub fn handle(
    subcommand: &str,
    member: &TeamMember,
    access: Option<&TeamAccess>,
    metrics: &MetricsLogger,
    month: &str,
) -> Result<String> {
    if !member.is_admin() {
        tracing::info!(user = %member.phone_number, role = %member.role, "admin command refused");
        return Ok(NOT_ADMIN_TEXT.to_string());
    }

    let Some(access) = access else {
        return Ok(HELP_TEXT.to_string());
    };

    tracing::info!(user = %member.phone_number, subcommand, "admin command");
    match subcommand {
        "users" => Ok(users_text(access)),
        "stats" => stats_text(access, metrics, month),
        "plan" => Ok(plan_text(access)),
        _ => Ok(HELP_TEXT.to_string()),
    }
}

fn limit_label(limit: Option<u64>) -> String {
    match limit.filter(|&n| n > 0) {
        Some(n) => n.to_string(),
        None => "unlimited".to_string(),
    }
}

/// `1234567` → `1,234,567`.
fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn users_text(access: &TeamAccess) -> String {
    let mut message = format!("👥 **Team Users** ({})\n\n", access.team.name);
    for user in access.users.values() {
        let status = if user.is_active { "✅" } else { "❌" };
        message.push_str(&format!("{status} **{}**\n", user.name));
        message.push_str(&format!("   Role: {}\n", user.role));
        message.push_str(&format!("   Phone: {}\n", user.phone_number));
        message.push_str(&format!(
            "   Limit: {} messages/month\n\n",
            limit_label(user.message_limit)
        ));
    }
    message
}

fn stats_text(access: &TeamAccess, metrics: &MetricsLogger, month: &str) -> Result<String> {
    let team = metrics.team_usage(month)?;
    let monthly = metrics.monthly(month)?;
    let limit = access.usage.messages_limit.filter(|&n| n > 0);

    let mut message = String::from("📊 **Usage Statistics**\n\n");
    message.push_str(&format!("**Plan:** {}\n", access.team.plan));
    message.push_str(&format!("**Period:** {month}\n\n"));

    message.push_str("**Messages:**\n");
    message.push_str(&format!("   Used: {}\n", team.messages));
    message.push_str(&format!("   Limit: {}\n", limit_label(limit)));
    let remaining = match limit {
        Some(limit) => limit.saturating_sub(team.messages).to_string(),
        None => "∞".to_string(),
    };
    message.push_str(&format!("   Remaining: {remaining}\n\n"));

    message.push_str("**Costs:**\n");
    message.push_str(&format!("   Tokens: {}\n", thousands(monthly.tokens)));
    message.push_str(&format!("   Estimated: ${:.2}\n\n", monthly.cost));

    let percent = match limit {
        Some(limit) => team.messages as f64 / limit as f64 * 100.0,
        None => 0.0,
    };
    message.push_str(&format!("**Progress:** {percent:.1}% of monthly limit used"));
    Ok(message)
}

fn plan_text(access: &TeamAccess) -> String {
    let Some(plan) = access.current_plan() else {
        return format!(
            "💳 **Current Plan**\n\nPlan \"{}\" is not defined in team-access.json.",
            access.team.plan
        );
    };

    let mut message = format!("💳 **Current Plan**\n\n**{}**\n", plan.name);
    match plan.price.filter(|&p| p > 0.0) {
        Some(price) => message.push_str(&format!("Price: ${price}/month\n")),
        None => message.push_str("Price: Free\n"),
    }
    message.push_str(&format!("Max Users: {}\n", limit_label(plan.max_users)));
    message.push_str(&format!(
        "Messages/Month: {}\n\n",
        limit_label(plan.max_messages_per_month)
    ));
    message.push_str("**Features:**\n");
    for feature in &plan.features {
        message.push_str(&format!("✅ {}\n", feature.replace('_', " ")));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PricingConfig;
    use crate::store::KvStore;
    use crate::usage::{team_usage_key, UsageCounters};
    use tempfile::TempDir;

    fn access() -> TeamAccess {
        serde_json::from_str(
            r#"{
              "team": {"name": "Dusape Labs", "plan": "pro"},
              "users": {
                "brian": {"name": "Brian", "phoneNumber": "15551234567", "role": "owner", "isActive": true},
                "sam": {"name": "Sam", "phoneNumber": "15550000001", "role": "member", "isActive": false, "messageLimit": 50}
              },
              "usage": {"messagesLimit": 200},
              "plans": {
                "pro": {"name": "Pro", "price": 99, "maxUsers": 10, "maxMessagesPerMonth": 2000, "features": ["quick_actions", "voice_messages"]}
              }
            }"#,
        )
        .unwrap()
    }

    fn metrics() -> (TempDir, KvStore, MetricsLogger) {
        let dir = TempDir::new().unwrap();
        let kv = KvStore::open(&dir.path().join("a.redb")).unwrap();
        let logger = MetricsLogger::new(kv.clone(), PricingConfig::default());
        (dir, kv, logger)
    }

    fn member(access: &TeamAccess, key: &str) -> TeamMember {
        access.users[key].clone()
    }

    #[test]
    fn members_are_refused() {
        let (_dir, _kv, metrics) = metrics();
        let access = access();
        let text = handle("users", &member(&access, "sam"), Some(&access), &metrics, "2026-10").unwrap();
        assert_eq!(text, NOT_ADMIN_TEXT);
    }

    #[test]
    fn users_lists_status_role_and_limit() {
        let (_dir, _kv, metrics) = metrics();
        let access = access();
        let text = handle("users", &member(&access, "brian"), Some(&access), &metrics, "2026-10").unwrap();
        assert!(text.starts_with("👥 **Team Users** (Dusape Labs)"));
        assert!(text.contains("✅ **Brian**\n   Role: owner\n"));
        assert!(text.contains("Limit: unlimited messages/month"));
        assert!(text.contains("❌ **Sam**"));
        assert!(text.contains("Limit: 50 messages/month"));
    }

    #[test]
    fn stats_compares_usage_with_team_limit() {
        let (_dir, kv, metrics) = metrics();
        kv.set(
            &team_usage_key("2026-10"),
            &UsageCounters {
                messages: 50,
                tokens: 0,
                cost: 0.0,
            },
        )
        .unwrap();
        let access = access();
        let text = handle("stats", &member(&access, "brian"), Some(&access), &metrics, "2026-10").unwrap();
        assert!(text.contains("**Period:** 2026-10"));
        assert!(text.contains("Used: 50\n   Limit: 200\n   Remaining: 150"));
        assert!(text.contains("Estimated: $0.00"));
        assert!(text.ends_with("**Progress:** 25.0% of monthly limit used"));
    }

    #[test]
    fn plan_shows_features() {
        let (_dir, _kv, metrics) = metrics();
        let access = access();
        let text = handle("plan", &member(&access, "brian"), Some(&access), &metrics, "2026-10").unwrap();
        assert!(text.contains("**Pro**\nPrice: $99/month\nMax Users: 10\nMessages/Month: 2000"));
        assert!(text.contains("✅ voice messages\n"));
    }

    #[test]
    fn unknown_subcommand_shows_help() {
        let (_dir, _kv, metrics) = metrics();
        let access = access();
        let text = handle("invite", &member(&access, "brian"), Some(&access), &metrics, "2026-10").unwrap();
        assert_eq!(text, HELP_TEXT);
    }

    #[test]
    fn thousands_separators() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1_234_567), "1,234,567");
    }
}
