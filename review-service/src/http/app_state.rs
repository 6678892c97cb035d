use std::sync::Arc;

use review_core::rate_gate::RateGate;

use crate::azure_devops::AzureDevOpsStore;
use crate::config::AppConfig;
use crate::provider_registry::Provider;

/// Shared, cloneable handle every route gets via axum's `State` extractor.
/// Holds one `RateGate` for the process lifetime (§9 "Global state") and
/// one constructed `Provider`/`AzureDevOpsStore` pair, assembled once at
/// startup from `AppConfig`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<AzureDevOpsStore>,
    pub provider: Arc<Provider>,
    pub rate_gate: Arc<RateGate>,
}
