use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;
use crate::usage::Plan;

pub const RATE_LIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Daily limit of {limit} checks reached on the {plan} plan")]
    RateLimited { limit: u32, plan: Plan },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut exhausted_limit = None;
        let (status, message): (StatusCode, String) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::RateLimited { limit, plan } => {
                exhausted_limit = Some(limit);
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    format!("Daily limit of {limit} checks reached on the {plan} plan"),
                )
            }
            AppError::Store(e) => {
                tracing::error!(error = ?e, "Store error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Store error".into())
            }
        };

        let mut response = (status, Json(json!({ "error": message }))).into_response();
        if let Some(limit) = exhausted_limit {
            let headers = response.headers_mut();
            headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(limit));
            headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(0u32));
        }
        response
    }
}

pub type AppResult<T> = Result<T, AppError>;
