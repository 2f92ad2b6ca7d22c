use std::sync::OnceLock;

use axum::extract::{Path, State};
use axum::Json;
use regex::Regex;
use serde::Serialize;

use cockpit_core::usage::{DailyStats, MonthlyStats, UsageCounters};

use crate::error::AppError;
use crate::state::AppState;

static MONTH_RE: OnceLock<Regex> = OnceLock::new();

fn month_re() -> &'static Regex {
    MONTH_RE.get_or_init(|| Regex::new(r"^\d{4}-(0[1-9]|1[0-2])$").unwrap())
}

#[derive(Debug, Serialize)]
pub struct MonthReport {
    pub month: String,
    pub monthly: MonthlyStats,
    pub team: UsageCounters,
    pub daily: Vec<DailyStats>,
}

/// GET /api/stats/{month}: monthly totals, the team counter and per-day rows.
pub async fn month_stats(
    State(app): State<AppState>,
    Path(month): Path<String>,
) -> Result<Json<MonthReport>, AppError> {
    if !month_re().is_match(&month) {
        return Err(AppError::bad_request(format!(
            "invalid month '{month}': expected YYYY-MM"
        )));
    }

    let metrics = app.pipeline.metrics().clone();
    let report = tokio::task::spawn_blocking(move || -> cockpit_core::Result<MonthReport> {
        Ok(MonthReport {
            monthly: metrics.monthly(&month)?,
            team: metrics.team_usage(&month)?,
            daily: metrics.daily_for_month(&month)?,
            month,
        })
    })
    .await
    .map_err(AppError::join)??;
    Ok(Json(report))
}
