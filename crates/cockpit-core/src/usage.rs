//! Usage counters and the metrics logger.
//!
//! Key layout:
//!
//! ```text
//! usage:{user}:{YYYY-MM}      UsageCounters for one user-month
//! usage:team:{YYYY-MM}        UsageCounters for the whole team
//! stats:daily:{YYYY-MM-DD}    DailyStats (with per-agent breakdown)
//! stats:monthly:{YYYY-MM}     MonthlyStats
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use claude_agent::TokenUsage;
use serde::{Deserialize, Serialize};

use crate::config::PricingConfig;
use crate::error::Result;
use crate::store::KvStore;
use crate::types::Agent;

pub fn month_of(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m").to_string()
}

pub fn date_of(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d").to_string()
}

pub fn user_usage_key(user: &str, month: &str) -> String {
    format!("usage:{user}:{month}")
}

pub fn team_usage_key(month: &str) -> String {
    format!("usage:team:{month}")
}

pub fn daily_stats_key(date: &str) -> String {
    format!("stats:daily:{date}")
}

pub fn monthly_stats_key(month: &str) -> String {
    format!("stats:monthly:{month}")
}

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

/// Monotonic within one calendar month.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageCounters {
    #[serde(default)]
    pub messages: u64,
    #[serde(default)]
    pub tokens: u64,
    #[serde(default)]
    pub cost: f64,
}

impl UsageCounters {
    fn add_usage(&mut self, tokens: u64, cost: f64) {
        self.tokens += tokens;
        self.cost += cost;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyStats {
    pub date: String,
    #[serde(default)]
    pub messages: u64,
    #[serde(default)]
    pub tokens: u64,
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub agents: BTreeMap<String, UsageCounters>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyStats {
    pub month: String,
    #[serde(default)]
    pub messages: u64,
    #[serde(default)]
    pub tokens: u64,
    #[serde(default)]
    pub cost: f64,
}

/// One model-backed reply, as recorded by [`MetricsLogger::record`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsEvent {
    pub user: String,
    /// `None` for collaborations, which span two agents.
    pub agent: Option<Agent>,
    pub usage: TokenUsage,
    pub model: String,
    pub query_len: usize,
    pub reply_len: usize,
    pub conversation_depth: usize,
    pub delivered: bool,
    pub at: DateTime<Utc>,
}

/// Totals after recording an event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedMetrics {
    pub cost: f64,
    pub daily: DailyStats,
    pub monthly: MonthlyStats,
}

// ---------------------------------------------------------------------------
// MetricsLogger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MetricsLogger {
    kv: KvStore,
    pricing: PricingConfig,
}

impl MetricsLogger {
    pub fn new(kv: KvStore, pricing: PricingConfig) -> Self {
        Self { kv, pricing }
    }

    /// Add one reply's tokens and estimated cost to the daily, monthly,
    /// user-month and team-month records in a single transaction.
    ///
    /// Message counts on the usage counters are owned by the authorizer;
    /// only tokens and cost are added here.
    pub fn record(&self, event: &MetricsEvent) -> Result<RecordedMetrics> {
        let cost = self.pricing.cost(&event.usage);
        let tokens = event.usage.total();
        let date = date_of(event.at);
        let month = month_of(event.at);

        let recorded = self.kv.transact(|txn| {
            let daily_key = daily_stats_key(&date);
            let mut daily: DailyStats = txn.get(&daily_key)?.unwrap_or_else(|| DailyStats {
                date: date.clone(),
                ..DailyStats::default()
            });
            daily.messages += 1;
            daily.tokens += tokens;
            daily.cost += cost;
            if let Some(agent) = event.agent {
                let per_agent = daily.agents.entry(agent.to_string()).or_default();
                per_agent.messages += 1;
                per_agent.add_usage(tokens, cost);
            }
            txn.set(&daily_key, &daily)?;

            let monthly_key = monthly_stats_key(&month);
            let mut monthly: MonthlyStats =
                txn.get(&monthly_key)?.unwrap_or_else(|| MonthlyStats {
                    month: month.clone(),
                    ..MonthlyStats::default()
                });
            monthly.messages += 1;
            monthly.tokens += tokens;
            monthly.cost += cost;
            txn.set(&monthly_key, &monthly)?;

            for key in [user_usage_key(&event.user, &month), team_usage_key(&month)] {
                let mut counters: UsageCounters = txn.get(&key)?.unwrap_or_default();
                counters.add_usage(tokens, cost);
                txn.set(&key, &counters)?;
            }

            Ok(RecordedMetrics {
                cost,
                daily,
                monthly,
            })
        })?;

        tracing::info!(
            user = %event.user,
            agent = event.agent.map(|a| a.as_str()).unwrap_or("collaboration"),
            model = %event.model,
            tokens_in = event.usage.input_tokens,
            tokens_out = event.usage.output_tokens,
            cost_usd = cost,
            query_len = event.query_len,
            reply_len = event.reply_len,
            conversation_depth = event.conversation_depth,
            delivered = event.delivered,
            daily_messages = recorded.daily.messages,
            monthly_messages = recorded.monthly.messages,
            "metrics recorded"
        );
        Ok(recorded)
    }

    pub fn user_usage(&self, user: &str, month: &str) -> Result<UsageCounters> {
        Ok(self.kv.get(&user_usage_key(user, month))?.unwrap_or_default())
    }

    pub fn team_usage(&self, month: &str) -> Result<UsageCounters> {
        Ok(self.kv.get(&team_usage_key(month))?.unwrap_or_default())
    }

    pub fn monthly(&self, month: &str) -> Result<MonthlyStats> {
        Ok(self
            .kv
            .get(&monthly_stats_key(month))?
            .unwrap_or_else(|| MonthlyStats {
                month: month.to_string(),
                ..MonthlyStats::default()
            }))
    }

    /// Every recorded day of `month`, in date order.
    pub fn daily_for_month(&self, month: &str) -> Result<Vec<DailyStats>> {
        Ok(self
            .kv
            .scan_prefix::<DailyStats>(&daily_stats_key(month))?
            .into_iter()
            .map(|(_, stats)| stats)
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
