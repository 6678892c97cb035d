//! Azure DevOps Services adapter (§4.10): the concrete `ReviewStateStore`.

mod client;
mod types;

pub use client::AzureDevOpsStore;
