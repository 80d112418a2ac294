use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};
use validator::Validate;

use crate::error::{AppError, AppResult, RATE_LIMIT_LIMIT, RATE_LIMIT_REMAINING};
use crate::identity::ClientIdentity;
use crate::models::CheckResult;
use crate::state::AppState;
use crate::store::history;
use crate::usage::lookup_plan;

// ── Request types ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct CheckRequest {
    #[validate(length(min = 1, max = 2048))]
    pub url: String,
}

type RateLimitHeaders = [(&'static str, String); 2];

// ── Handlers ───────────────────────────────────────────────────────────────

/// POST /check  `{ "url": "..." }`
pub async fn post_check(
    State(state): State<AppState>,
    identity: ClientIdentity,
    payload: Result<Json<CheckRequest>, JsonRejection>,
) -> AppResult<(RateLimitHeaders, Json<CheckResult>)> {
    let Json(req) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    run_check(&state, &identity, req).await
}

/// GET /check?url=<encoded-url>
pub async fn get_check(
    State(state): State<AppState>,
    identity: ClientIdentity,
    query: Result<Query<CheckRequest>, QueryRejection>,
) -> AppResult<(RateLimitHeaders, Json<CheckResult>)> {
    let Query(req) = query.map_err(|e| AppError::Validation(e.body_text()))?;
    run_check(&state, &identity, req).await
}

async fn run_check(
    state: &AppState,
    identity: &ClientIdentity,
    req: CheckRequest,
) -> AppResult<(RateLimitHeaders, Json<CheckResult>)> {
    req.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    // ── Quota ─────────────────────────────────────────────────────────────
    let plan = lookup_plan(state.store.as_ref(), identity.as_str()).await?;
    let decision = state
        .usage
        .try_acquire(identity.as_str(), plan.daily_quota(), Utc::now().date_naive())
        .await;

    if !decision.allowed {
        info!(identity = %identity, plan = %plan, "Daily check quota exhausted");
        return Err(AppError::RateLimited {
            limit: decision.limit,
            plan,
        });
    }

    // ── Check ─────────────────────────────────────────────────────────────
    let result = state.checker.check(&req.url).await;

    if let Err(e) = history::record(state.store.as_ref(), identity.as_str(), &req.url, &result).await
    {
        warn!(identity = %identity, error = ?e, "Failed to record check history");
    }

    let headers = [
        (RATE_LIMIT_LIMIT, decision.limit.to_string()),
        (RATE_LIMIT_REMAINING, decision.remaining.to_string()),
    ];
    Ok((headers, Json(result)))
}
