//! Allow-list and monthly quota enforcement.
//!
//! The allow-list lives in `config/team-access.json`. Counters live in the
//! KV store and are checked and incremented in one write transaction, so
//! concurrent messages from the same user cannot both slip under a limit.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::content::ContentStore;
use crate::error::Result;
use crate::paths;
use crate::store::KvStore;
use crate::usage::{team_usage_key, user_usage_key, UsageCounters};

pub const DEFAULT_ROLE: &str = "default";

// ---------------------------------------------------------------------------
// team-access.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub name: String,
    pub phone_number: String,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Personal monthly message cap; absent or 0 means unlimited.
    #[serde(default)]
    pub message_limit: Option<u64>,
}

fn default_role() -> String {
    "member".to_string()
}

fn default_active() -> bool {
    true
}

impl TeamMember {
    pub fn is_admin(&self) -> bool {
        matches!(self.role.as_str(), "owner" | "admin")
    }

    fn fallback(phone: &str) -> Self {
        Self {
            name: phone.to_string(),
            phone_number: phone.to_string(),
            role: DEFAULT_ROLE.to_string(),
            is_active: true,
            message_limit: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub name: String,
    #[serde(default)]
    pub plan: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamUsage {
    /// Team-wide monthly message cap; absent or 0 means unlimited.
    #[serde(default)]
    pub messages_limit: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub name: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub max_users: Option<u64>,
    #[serde(default)]
    pub max_messages_per_month: Option<u64>,
    #[serde(default)]
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamAccess {
    #[serde(default)]
    pub team: Team,
    #[serde(default)]
    pub users: BTreeMap<String, TeamMember>,
    #[serde(default)]
    pub usage: TeamUsage,
    #[serde(default)]
    pub plans: BTreeMap<String, Plan>,
}

/// Compare phone numbers on digits only: `+1 555-123-4567` matches the
/// `15551234567` WhatsApp reports.
fn digits(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn limit(value: Option<u64>) -> Option<u64> {
    value.filter(|&n| n > 0)
}

impl TeamAccess {
    /// `Ok(None)` when the file does not exist.
    pub async fn load(content: &ContentStore) -> Result<Option<Self>> {
        content.fetch_json(paths::TEAM_ACCESS_JSON).await
    }

    pub fn find_member(&self, phone: &str) -> Option<&TeamMember> {
        let wanted = digits(phone);
        if wanted.is_empty() {
            return None;
        }
        self.users
            .values()
            .find(|member| digits(&member.phone_number) == wanted)
    }

    pub fn current_plan(&self) -> Option<&Plan> {
        self.plans.get(&self.team.plan)
    }
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    NotAuthorized,
    Inactive,
    TeamLimitReached { used: u64, limit: u64 },
    PersonalLimitReached { used: u64, limit: u64 },
    /// Team access could not be loaded and the policy is fail-closed.
    Unavailable,
}

impl Denial {
    /// Fixed text sent to the denied sender.
    pub fn message(&self) -> String {
        match self {
            Denial::NotAuthorized => "🚫 Access Denied\n\nYou are not authorized to use The Cockpit.\n\nIf you believe this is an error, please contact the team administrator.".to_string(),
            Denial::Inactive => "🚫 Account Inactive\n\nYour access has been deactivated.\n\nPlease contact the team administrator.".to_string(),
            Denial::TeamLimitReached { used, limit } => format!(
                "⚠️ Monthly Limit Reached\n\nYour team has used {used}/{limit} messages this month.\n\nUpgrade your plan or wait until next month to continue."
            ),
            Denial::PersonalLimitReached { used, limit } => format!(
                "⚠️ Personal Limit Reached\n\nYou've used {used}/{limit} messages this month.\n\nContact your team admin for more access."
            ),
            Denial::Unavailable => "🛠️ The Cockpit is under maintenance\n\nWe couldn't verify your access right now. Please try again in a few minutes.".to_string(),
        }
    }
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Denial::NotAuthorized => f.write_str("sender not on the team allow-list"),
            Denial::Inactive => f.write_str("sender is inactive"),
            Denial::TeamLimitReached { used, limit } => {
                write!(f, "team monthly limit reached ({used}/{limit})")
            }
            Denial::PersonalLimitReached { used, limit } => {
                write!(f, "personal monthly limit reached ({used}/{limit})")
            }
            Denial::Unavailable => f.write_str("team access unavailable"),
        }
    }
}

/// An admitted sender and their counts after this message.
#[derive(Debug, Clone, PartialEq)]
pub struct Authorization {
    pub user: TeamMember,
    pub team: Option<String>,
    pub user_messages: u64,
    pub team_messages: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthDecision {
    Allowed(Authorization),
    Denied(Denial),
}

// ---------------------------------------------------------------------------
// Authorizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Authorizer {
    kv: KvStore,
    fail_open: bool,
}

impl Authorizer {
    pub fn new(kv: KvStore, fail_open: bool) -> Self {
        Self { kv, fail_open }
    }

    /// Decide whether `sender` may send a message in `month`.
    ///
    /// `access` is `None` when the allow-list could not be loaded. A
    /// rejection leaves every counter untouched.
    pub fn check(
        &self,
        sender: &str,
        access: Option<&TeamAccess>,
        month: &str,
    ) -> Result<AuthDecision> {
        let Some(access) = access else {
            if self.fail_open {
                tracing::warn!(sender, "team access unavailable, failing open");
                return Ok(AuthDecision::Allowed(Authorization {
                    user: TeamMember::fallback(sender),
                    team: None,
                    user_messages: 0,
                    team_messages: 0,
                }));
            }
            tracing::warn!(sender, "team access unavailable, failing closed");
            return Ok(AuthDecision::Denied(Denial::Unavailable));
        };

        let Some(member) = access.find_member(sender) else {
            tracing::info!(sender, "sender not authorized");
            return Ok(AuthDecision::Denied(Denial::NotAuthorized));
        };
        if !member.is_active {
            tracing::info!(sender, "sender inactive");
            return Ok(AuthDecision::Denied(Denial::Inactive));
        }

        let team_limit = limit(access.usage.messages_limit);
        let personal_limit = limit(member.message_limit);
        let user_key = user_usage_key(sender, month);
        let team_key = team_usage_key(month);

        let decision = self.kv.transact(|txn| {
            let mut team: UsageCounters = txn.get(&team_key)?.unwrap_or_default();
            if let Some(limit) = team_limit {
                if team.messages >= limit {
                    return Ok(AuthDecision::Denied(Denial::TeamLimitReached {
                        used: team.messages,
                        limit,
                    }));
                }
            }

            let mut user: UsageCounters = txn.get(&user_key)?.unwrap_or_default();
            if let Some(limit) = personal_limit {
                if user.messages >= limit {
                    return Ok(AuthDecision::Denied(Denial::PersonalLimitReached {
                        used: user.messages,
                        limit,
                    }));
                }
            }

            user.messages += 1;
            team.messages += 1;
            txn.set(&user_key, &user)?;
            txn.set(&team_key, &team)?;

            Ok(AuthDecision::Allowed(Authorization {
                user: member.clone(),
                team: Some(access.team.name.clone()).filter(|n| !n.is_empty()),
                user_messages: user.messages,
                team_messages: team.messages,
            }))
        })?;

        match &decision {
            AuthDecision::Allowed(auth) => tracing::info!(
                sender,
                name = %auth.user.name,
                role = %auth.user.role,
                user_messages = auth.user_messages,
                team_messages = auth.team_messages,
                "sender authorized"
            ),
            AuthDecision::Denied(denial) => tracing::info!(sender, %denial, "sender over quota"),
        }
        Ok(decision)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MONTH: &str = "2026-10";

    fn access() -> TeamAccess {
        serde_json::from_str(
            r#"{
              "team": {"name": "Dusape Labs", "plan": "starter"},
              "users": {
                "brian": {"name": "Brian", "phoneNumber": "+1 555 123 4567", "role": "owner", "isActive": true},
                "intern": {"name": "Ivy", "phoneNumber": "15550000001", "role": "member", "isActive": true, "messageLimit": 2},
                "alumni": {"name": "Al", "phoneNumber": "15550000002", "role": "member", "isActive": false}
              },
              "usage": {"messagesLimit": 5, "messagesUsed": 0},
              "plans": {
                "starter": {"name": "Starter", "price": 29, "maxUsers": 3, "maxMessagesPerMonth": 500, "features": ["quick_actions"]}
              }
            }"#,
        )
        .unwrap()
    }

    fn authorizer(fail_open: bool) -> (TempDir, Authorizer, KvStore) {
        let dir = TempDir::new().unwrap();
        let kv = KvStore::open(&dir.path().join("auth.redb")).unwrap();
        (dir, Authorizer::new(kv.clone(), fail_open), kv)
    }

    fn counters(kv: &KvStore, key: &str) -> UsageCounters {
        kv.get(key).unwrap().unwrap_or_default()
    }

    #[test]
    fn member_matches_on_digits() {
        let access = access();
        let m = access.find_member("15551234567").unwrap();
        assert_eq!(m.name, "Brian");
        assert!(m.is_admin());
        assert!(access.find_member("").is_none());
    }

    #[test]
    fn allowed_sender_increments_personal_and_team_counters() {
        let (_dir, auth, kv) = authorizer(false);
        let decision = auth.check("15551234567", Some(&access()), MONTH).unwrap();
        let AuthDecision::Allowed(a) = decision else {
            panic!("expected allowed, got {decision:?}");
        };
        assert_eq!(a.user_messages, 1);
        assert_eq!(a.team_messages, 1);
        assert_eq!(a.team.as_deref(), Some("Dusape Labs"));
        assert_eq!(counters(&kv, &user_usage_key("15551234567", MONTH)).messages, 1);
        assert_eq!(counters(&kv, &team_usage_key(MONTH)).messages, 1);
    }

    #[test]
    fn unknown_sender_is_denied() {
        let (_dir, auth, kv) = authorizer(false);
        let decision = auth.check("19999999999", Some(&access()), MONTH).unwrap();
        assert_eq!(decision, AuthDecision::Denied(Denial::NotAuthorized));
        assert_eq!(counters(&kv, &team_usage_key(MONTH)).messages, 0);
    }

    #[test]
    fn inactive_sender_is_denied() {
        let (_dir, auth, _kv) = authorizer(false);
        let decision = auth.check("15550000002", Some(&access()), MONTH).unwrap();
        assert_eq!(decision, AuthDecision::Denied(Denial::Inactive));
    }

    #[test]
    fn personal_limit_rejects_without_incrementing() {
        let (_dir, auth, kv) = authorizer(false);
        let access = access();
        for _ in 0..2 {
            assert!(matches!(
                auth.check("15550000001", Some(&access), MONTH).unwrap(),
                AuthDecision::Allowed(_)
            ));
        }
        let decision = auth.check("15550000001", Some(&access), MONTH).unwrap();
        assert_eq!(
            decision,
            AuthDecision::Denied(Denial::PersonalLimitReached { used: 2, limit: 2 })
        );
        assert_eq!(counters(&kv, &user_usage_key("15550000001", MONTH)).messages, 2);
        assert_eq!(counters(&kv, &team_usage_key(MONTH)).messages, 2);
    }

    #[test]
    fn team_limit_applies_to_everyone() {
        let (_dir, auth, kv) = authorizer(false);
        kv.set(
            &team_usage_key(MONTH),
            &UsageCounters {
                messages: 5,
                ..UsageCounters::default()
            },
        )
        .unwrap();
        let decision = auth.check("15551234567", Some(&access()), MONTH).unwrap();
        assert_eq!(
            decision,
            AuthDecision::Denied(Denial::TeamLimitReached { used: 5, limit: 5 })
        );
        assert_eq!(counters(&kv, &user_usage_key("15551234567", MONTH)).messages, 0);
    }

    #[test]
    fn counters_reset_with_the_month() {
        let (_dir, auth, _kv) = authorizer(false);
        let access = access();
        auth.check("15550000001", Some(&access), "2026-09").unwrap();
        auth.check("15550000001", Some(&access), "2026-09").unwrap();
        assert!(matches!(
            auth.check("15550000001", Some(&access), MONTH).unwrap(),
            AuthDecision::Allowed(_)
        ));
    }

    #[test]
    fn unavailable_access_fails_closed_by_default() {
        let (_dir, auth, _kv) = authorizer(false);
        let decision = auth.check("15551234567", None, MONTH).unwrap();
        assert_eq!(decision, AuthDecision::Denied(Denial::Unavailable));
    }

    #[test]
    fn unavailable_access_can_fail_open() {
        let (_dir, auth, _kv) = authorizer(true);
        let AuthDecision::Allowed(a) = auth.check("15551234567", None, MONTH).unwrap() else {
            panic!("expected allowed");
        };
        assert_eq!(a.user.role, DEFAULT_ROLE);
        assert!(!a.user.is_admin());
    }

    #[test]
    fn concurrent_checks_never_exceed_the_personal_limit() {
        let (_dir, auth, kv) = authorizer(false);
        let access = std::sync::Arc::new(access());
        let handles: Vec<_> = (0..6)
            .map(|_| {
                let auth = auth.clone();
                let access = access.clone();
                std::thread::spawn(move || auth.check("15550000001", Some(&access), MONTH).unwrap())
            })
            .collect();
        let allowed = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|d| matches!(d, AuthDecision::Allowed(_)))
            .count();
        assert_eq!(allowed, 2);
        assert_eq!(counters(&kv, &user_usage_key("15550000001", MONTH)).messages, 2);
    }

    #[test]
    fn denial_messages_are_fixed_text() {
        assert!(Denial::NotAuthorized.message().starts_with("🚫 Access Denied"));
        assert!(Denial::TeamLimitReached { used: 5, limit: 5 }
            .message()
            .contains("5/5 messages"));
    }

    #[test]
    fn current_plan_is_looked_up_by_team_plan() {
        assert_eq!(access().current_plan().unwrap().name, "Starter");
    }
}
