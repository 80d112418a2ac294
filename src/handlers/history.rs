use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;

use crate::error::AppResult;
use crate::identity::ClientIdentity;
use crate::state::AppState;
use crate::store::history::{self, HistoryEntry};
use crate::usage::{lookup_plan, Plan};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub plan: Plan,
    pub daily_limit: u32,
    pub used_today: u32,
    pub checks: Vec<HistoryEntry>,
}

/// GET /history
///
/// The caller's most recent checks, newest first, plus today's usage.
pub async fn get_history(
    State(state): State<AppState>,
    identity: ClientIdentity,
) -> AppResult<Json<HistoryResponse>> {
    let plan = lookup_plan(state.store.as_ref(), identity.as_str()).await?;
    let used_today = state
        .usage
        .used(identity.as_str(), Utc::now().date_naive())
        .await;
    let checks = history::load(state.store.as_ref(), identity.as_str()).await?;

    Ok(Json(HistoryResponse {
        plan,
        daily_limit: plan.daily_quota(),
        used_today,
        checks,
    }))
}
