//! `POST /review/trigger` (§4.12). Pure plumbing from HTTP to
//! `review_core::orchestrator::run`; no review logic lives here, matching
//! the retrieved corpus's `trigger_mr_route.rs`.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use review_core::orchestrator::RunOutcome;

use crate::http::app_state::AppState;
use crate::http::response::ApiResponse;

#[derive(Debug, Deserialize)]
pub struct TriggerRequest {
    pub organization: String,
    pub project: String,
    pub repo: String,
    #[serde(rename = "prId")]
    pub pr_id: i64,
}

#[derive(Debug, Serialize)]
pub struct TriggerResponseBody {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vote: Option<i8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds_remaining: Option<u64>,
}

#[instrument(name = "trigger_review_route", skip(state, headers, body), fields(project = %body.project, pr_id = body.pr_id))]
pub async fn trigger_review(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<TriggerRequest>,
) -> Response {
    let provided_secret = headers
        .get("X-Trigger-Secret")
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();

    if state.config.trigger_secret.is_empty() {
        return ApiResponse::<()>::error("SERVER_CONFIG_ERROR", "trigger secret is not configured")
            .with_status(StatusCode::INTERNAL_SERVER_ERROR);
    }
    if provided_secret.is_empty() || provided_secret != state.config.trigger_secret {
        return ApiResponse::<()>::error("UNAUTHORIZED", "invalid or missing X-Trigger-Secret header")
            .with_status(StatusCode::UNAUTHORIZED);
    }

    info!("starting review trigger");

    let outcome = review_core::orchestrator::run(
        &state.config.orchestrator_config(),
        &state.rate_gate,
        state.store.as_ref(),
        state.provider.as_ref(),
        &body.organization,
        &body.project,
        &body.repo,
        body.pr_id,
    )
    .await;

    let (status, resp_body) = match outcome {
        RunOutcome::RateLimited { seconds_remaining } => (
            StatusCode::TOO_MANY_REQUESTS,
            TriggerResponseBody {
                status: "RateLimited",
                message: Some(format!(
                    "review for PR {} was reviewed too recently; retry in {seconds_remaining}s",
                    body.pr_id
                )),
                recommendation: None,
                vote: None,
                issue_count: None,
                error_count: None,
                warning_count: None,
                info_count: None,
                seconds_remaining: Some(seconds_remaining),
            },
        ),
        RunOutcome::Skipped { summary } => (
            StatusCode::OK,
            TriggerResponseBody {
                status: "Skipped",
                message: Some(summary),
                recommendation: None,
                vote: None,
                issue_count: None,
                error_count: None,
                warning_count: None,
                info_count: None,
                seconds_remaining: None,
            },
        ),
        RunOutcome::Reviewed(summary) => (
            StatusCode::OK,
            TriggerResponseBody {
                status: "Reviewed",
                message: Some(summary.summary),
                recommendation: Some(format!("{:?}", summary.recommendation)),
                vote: summary.vote,
                issue_count: Some(summary.issue_count),
                error_count: Some(summary.error_count),
                warning_count: Some(summary.warning_count),
                info_count: Some(summary.info_count),
                seconds_remaining: None,
            },
        ),
        RunOutcome::Error { message } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            TriggerResponseBody {
                status: "Error",
                message: Some(message),
                recommendation: None,
                vote: None,
                issue_count: None,
                error_count: None,
                warning_count: None,
                info_count: None,
                seconds_remaining: None,
            },
        ),
    };

    ApiResponse::success(resp_body).with_status(status)
}
