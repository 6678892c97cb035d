//! Azure DevOps-backed binary: loads configuration, wires the Azure DevOps
//! adapter and the configured LLM provider(s) into `review_core`'s
//! orchestrator, and exposes a single HTTP trigger route.
//!
//! Mirrors the retrieved corpus's `mr-ai-backend/src/main.rs` +
//! `api::start()` split: a thin `main` loads `.env`, then hands off to this
//! binary's own `run()`.

mod azure_devops;
mod config;
mod http;
mod provider_registry;
mod telemetry;

use std::sync::Arc;

use review_core::rate_gate::RateGate;
use tracing::info;

use crate::azure_devops::AzureDevOpsStore;
use crate::config::AppConfig;
use crate::http::app_state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Fails only if a malformed `.env` is present; a missing file is fine,
    // since every required setting can also come from the real environment.
    let _ = dotenvy::dotenv();

    telemetry::init();

    let cfg = AppConfig::from_env()?;
    info!(
        mode = ?cfg.providers.mode,
        providers = cfg.providers.providers.len(),
        "configuration loaded"
    );

    let store = AzureDevOpsStore::new(
        cfg.azure_devops.organization.clone(),
        cfg.azure_devops.personal_access_token.clone(),
        cfg.azure_devops.api_version.clone(),
    )?;
    let provider = provider_registry::build(&cfg)?;

    let state = Arc::new(AppState {
        config: Arc::new(cfg.clone()),
        store: Arc::new(store),
        provider: Arc::new(provider),
        rate_gate: Arc::new(RateGate::new()),
    });

    let app = http::router(state);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    info!(addr = %cfg.bind_addr, "review-service listening");
    axum::serve(listener, app).await?;

    Ok(())
}
