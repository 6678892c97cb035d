//! HTTP trigger surface (§4.12): one axum router, built in `main.rs` and
//! bound to `AppState`.

pub mod app_state;
pub mod response;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use self::app_state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(routes::health::health))
        .route("/review/trigger", post(routes::trigger::trigger_review))
        .with_state(state)
}
