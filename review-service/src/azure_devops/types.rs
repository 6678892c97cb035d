//! Wire shapes for the Azure DevOps Services REST API (7.1), scoped to
//! exactly the fields the adapter reads or writes. Deliberately not a
//! general-purpose Azure DevOps client: every struct here exists because
//! `client.rs` deserializes or serializes it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct AdoIdentityRef {
    pub id: String,
    #[serde(rename = "displayName", default)]
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
pub struct AdoReviewer {
    pub id: String,
    #[serde(rename = "displayName", default)]
    pub display_name: String,
    #[serde(default)]
    pub vote: i8,
}

#[derive(Debug, Deserialize)]
pub struct AdoPullRequest {
    #[serde(rename = "pullRequestId")]
    pub pull_request_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "sourceRefName")]
    pub source_ref_name: String,
    #[serde(rename = "targetRefName")]
    pub target_ref_name: String,
    #[serde(rename = "createdBy")]
    pub created_by: AdoIdentityRef,
    #[serde(rename = "creationDate")]
    pub creation_date: DateTime<Utc>,
    #[serde(rename = "isDraft", default)]
    pub is_draft: bool,
    #[serde(rename = "lastMergeSourceCommit")]
    pub last_merge_source_commit: AdoCommitRef,
    #[serde(rename = "lastMergeTargetCommit")]
    pub last_merge_target_commit: AdoCommitRef,
    #[serde(default)]
    pub reviewers: Vec<AdoReviewer>,
}

#[derive(Debug, Deserialize)]
pub struct AdoCommitRef {
    #[serde(rename = "commitId")]
    pub commit_id: String,
}

#[derive(Debug, Serialize)]
pub struct AdoDescriptionPatch {
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct AdoIterationsResponse {
    #[serde(default)]
    pub value: Vec<AdoIteration>,
}

#[derive(Debug, Deserialize)]
pub struct AdoIteration {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct AdoChangesResponse {
    #[serde(rename = "changeEntries", default)]
    pub change_entries: Vec<AdoChangeEntry>,
}

#[derive(Debug, Deserialize)]
pub struct AdoChangeEntry {
    #[serde(rename = "changeType")]
    pub change_type: String,
    pub item: AdoChangeItem,
    #[serde(rename = "originalPath", default)]
    pub original_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdoChangeItem {
    pub path: String,
    #[serde(rename = "isFolder", default)]
    pub is_folder: bool,
}

#[derive(Debug, Serialize)]
pub struct AdoVotePayload {
    pub vote: i8,
}

#[derive(Debug, Deserialize)]
pub struct AdoConnectionData {
    #[serde(rename = "authenticatedUser")]
    pub authenticated_user: AdoIdentityRef,
}

#[derive(Debug, Deserialize)]
pub struct AdoThreadsResponse {
    #[serde(default)]
    pub value: Vec<AdoThread>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdoThread {
    pub id: i64,
    #[serde(default)]
    pub status: String,
    #[serde(rename = "threadContext")]
    pub thread_context: Option<AdoThreadContext>,
    #[serde(default)]
    pub comments: Vec<AdoComment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdoThreadContext {
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "rightFileStart")]
    pub right_file_start: Option<AdoFilePosition>,
    #[serde(rename = "rightFileEnd")]
    pub right_file_end: Option<AdoFilePosition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdoFilePosition {
    pub line: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdoComment {
    #[serde(default)]
    pub content: String,
    #[serde(rename = "commentType", default)]
    pub comment_type: String,
}

#[derive(Debug, Serialize)]
pub struct AdoNewComment<'a> {
    pub content: &'a str,
}

#[derive(Debug, Serialize)]
pub struct AdoNewThread<'a> {
    pub comments: Vec<AdoNewComment<'a>>,
    pub status: &'a str,
    #[serde(rename = "threadContext", skip_serializing_if = "Option::is_none")]
    pub thread_context: Option<AdoThreadContext>,
}

#[derive(Debug, Serialize)]
pub struct AdoThreadStatusPatch<'a> {
    pub status: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct AdoPropertiesResponse {
    #[serde(default)]
    pub value: std::collections::HashMap<String, AdoPropertyValue>,
}

#[derive(Debug, Deserialize)]
pub struct AdoPropertyValue {
    #[serde(rename = "$value", alias = "value", default)]
    pub value: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct AdoPropertyPatchOp<'a> {
    pub op: &'a str,
    pub path: String,
    pub value: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct AdoLabelsResponse {
    #[serde(default)]
    pub value: Vec<AdoLabel>,
}

#[derive(Debug, Deserialize)]
pub struct AdoLabel {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct AdoNewLabel<'a> {
    pub name: &'a str,
}
