//! Azure DevOps Services adapter (§4.10): implements every operation in
//! `review_core::state_store::ReviewStateStore` against the REST API,
//! following the same request-shape/header conventions as the retrieved
//! corpus's `GitLabClient` (`mr-reviewer/src/git_providers/gitlab.rs`) and
//! `GitLabPublisher` (`mr-reviewer/src/publish/gitlab.rs`) — a thin,
//! struct-held `reqwest::Client`, per-call URL formatting, `?` propagation
//! through `anyhow::Result`.

use std::collections::HashMap;

use base64::Engine;
use chrono::Utc;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tokio::sync::OnceCell;

use review_core::diff_model;
use review_core::errors::StateStoreError;
use review_core::model::{
    ChangeType, ExistingCommentThread, FileChange, LineRange, PullRequestSnapshot, Reviewer,
    ReviewHistoryEntry, ReviewMetadata, ThreadStatus,
};
use review_core::state_store::{PostStatus, ReviewStateStore};

use super::types::*;

/// Keys of the `AiCodeReview.*` property namespace (§6).
mod prop_keys {
    pub const LAST_SOURCE_COMMIT: &str = "AiCodeReview.LastSourceCommit";
    pub const LAST_TARGET_COMMIT: &str = "AiCodeReview.LastTargetCommit";
    pub const LAST_ITERATION: &str = "AiCodeReview.LastIteration";
    pub const WAS_DRAFT: &str = "AiCodeReview.WasDraft";
    pub const REVIEWED_AT_UTC: &str = "AiCodeReview.ReviewedAtUtc";
    pub const VOTE_SUBMITTED: &str = "AiCodeReview.VoteSubmitted";
    pub const REVIEW_COUNT: &str = "AiCodeReview.ReviewCount";
    pub const REVIEW_HISTORY: &str = "AiCodeReview.ReviewHistory";
}

const REVIEW_TAG_LABEL: &str = "ai-reviewed";

pub struct AzureDevOpsStore {
    http: Client,
    organization: String,
    api_version: String,
    self_id: OnceCell<String>,
}

impl AzureDevOpsStore {
    pub fn new(organization: String, personal_access_token: String, api_version: String) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        let basic = base64::engine::general_purpose::STANDARD
            .encode(format!(":{personal_access_token}"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {basic}"))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            organization,
            api_version,
            self_id: OnceCell::new(),
        })
    }

    fn repo_base(&self, project: &str, repo: &str) -> String {
        format!(
            "https://dev.azure.com/{org}/{project}/_apis/git/repositories/{repo}",
            org = self.organization,
        )
    }

    fn pr_base(&self, project: &str, repo: &str, pr_id: i64) -> String {
        format!("{}/pullrequests/{pr_id}", self.repo_base(project, repo))
    }

    fn api_version_qs(&self) -> String {
        format!("api-version={}", self.api_version)
    }

    async fn check_response(&self, resp: reqwest::Response) -> anyhow::Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(StateStoreError::from_status(status.as_u16(), body).into())
    }

    async fn self_reviewer_id(&self) -> anyhow::Result<String> {
        self.self_id
            .get_or_try_init(|| async {
                let url = format!(
                    "https://dev.azure.com/{}/_apis/connectionData?{}",
                    self.organization,
                    self.api_version_qs()
                );
                let resp = self.http.get(url).send().await?;
                let resp = self.check_response(resp).await?;
                let data: AdoConnectionData = resp.json().await?;
                Ok::<_, anyhow::Error>(data.authenticated_user.id)
            })
            .await
            .cloned()
    }

    async fn get_item_content(
        &self,
        project: &str,
        repo: &str,
        path: &str,
        commit: &str,
    ) -> anyhow::Result<String> {
        let url = format!(
            "{}/items?path={}&version={}&versionType=commit&includeContent=true&{}",
            self.repo_base(project, repo),
            urlencoding::encode(path),
            urlencoding::encode(commit),
            self.api_version_qs()
        );
        let resp = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "text/plain")
            .send()
            .await?;
        let resp = self.check_response(resp).await?;
        Ok(resp.text().await?)
    }

    async fn latest_iteration_id(&self, project: &str, repo: &str, pr_id: i64) -> anyhow::Result<i64> {
        let url = format!(
            "{}/iterations?{}",
            self.pr_base(project, repo, pr_id),
            self.api_version_qs()
        );
        let resp = self.http.get(url).send().await?;
        let resp = self.check_response(resp).await?;
        let parsed: AdoIterationsResponse = resp.json().await?;
        Ok(parsed.value.last().map(|it| it.id).unwrap_or(1))
    }

    async fn get_properties(
        &self,
        project: &str,
        repo: &str,
        pr_id: i64,
    ) -> anyhow::Result<HashMap<String, serde_json::Value>> {
        let url = format!(
            "{}/properties?api-version=7.1-preview.1",
            self.pr_base(project, repo, pr_id)
        );
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if status.as_u16() == 404 {
            return Ok(HashMap::new());
        }
        let resp = self.check_response(resp).await?;
        let parsed: AdoPropertiesResponse = resp.json().await?;
        Ok(parsed
            .value
            .into_iter()
            .map(|(k, v)| (k, v.value))
            .collect())
    }

    async fn patch_properties(
        &self,
        project: &str,
        repo: &str,
        pr_id: i64,
        ops: Vec<AdoPropertyPatchOp<'_>>,
    ) -> anyhow::Result<()> {
        let url = format!(
            "{}/properties?api-version=7.1-preview.1",
            self.pr_base(project, repo, pr_id)
        );
        let resp = self
            .http
            .patch(url)
            .header(CONTENT_TYPE, "application/json-patch+json")
            .json(&ops)
            .send()
            .await?;
        self.check_response(resp).await?;
        Ok(())
    }

    fn to_thread_status_wire(status: ThreadStatus) -> &'static str {
        match status {
            ThreadStatus::Active => "active",
            ThreadStatus::Fixed => "fixed",
            ThreadStatus::WontFix => "wontFix",
            ThreadStatus::Closed => "closed",
            ThreadStatus::ByDesign => "byDesign",
            ThreadStatus::Pending => "pending",
        }
    }

    fn from_thread_status_wire(status: &str) -> ThreadStatus {
        ThreadStatus::from_name(status)
    }
}

fn map_change_type(wire: &str) -> ChangeType {
    let lower = wire.to_ascii_lowercase();
    if lower.contains("add") {
        ChangeType::Add
    } else if lower.contains("delete") {
        ChangeType::Delete
    } else if lower.contains("rename") {
        ChangeType::Rename
    } else {
        ChangeType::Edit
    }
}

impl ReviewStateStore for AzureDevOpsStore {
    async fn get_pr(&self, project: &str, repo: &str, pr_id: i64) -> anyhow::Result<PullRequestSnapshot> {
        let url = format!("{}?{}", self.pr_base(project, repo, pr_id), self.api_version_qs());
        let resp = self.http.get(url).send().await?;
        let resp = self.check_response(resp).await?;
        let raw: AdoPullRequest = resp.json().await?;

        let reviewers = raw
            .reviewers
            .into_iter()
            .map(|r| Reviewer {
                id: r.id,
                display_name: r.display_name,
                vote: r.vote,
            })
            .collect();

        Ok(PullRequestSnapshot {
            pr_id: raw.pull_request_id,
            title: raw.title,
            description: raw.description,
            source_branch: raw.source_ref_name,
            target_branch: raw.target_ref_name,
            author: raw.created_by.display_name,
            created_at: raw.creation_date,
            is_draft: raw.is_draft,
            source_commit: raw.last_merge_source_commit.commit_id,
            target_commit: raw.last_merge_target_commit.commit_id,
            reviewers,
        })
    }

    async fn get_iteration_count(&self, project: &str, repo: &str, pr_id: i64) -> anyhow::Result<i64> {
        let url = format!(
            "{}/iterations?{}",
            self.pr_base(project, repo, pr_id),
            self.api_version_qs()
        );
        let resp = self.http.get(url).send().await?;
        let resp = self.check_response(resp).await?;
        let parsed: AdoIterationsResponse = resp.json().await?;
        Ok(parsed.value.len() as i64)
    }

    async fn get_metadata(&self, project: &str, repo: &str, pr_id: i64) -> anyhow::Result<ReviewMetadata> {
        let props = self.get_properties(project, repo, pr_id).await?;

        let str_prop = |key: &str| -> String {
            props
                .get(key)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        let bool_prop = |key: &str| -> bool {
            props
                .get(key)
                .and_then(|v| v.as_str())
                .map(|s| s.eq_ignore_ascii_case("true"))
                .unwrap_or(false)
        };
        let int_prop = |key: &str| -> i64 {
            props
                .get(key)
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse::<i64>().ok())
                .unwrap_or(0)
        };

        let reviewed_at_utc = props
            .get(prop_keys::REVIEWED_AT_UTC)
            .and_then(|v| v.as_str())
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Ok(ReviewMetadata {
            last_reviewed_source_commit: str_prop(prop_keys::LAST_SOURCE_COMMIT),
            last_reviewed_target_commit: str_prop(prop_keys::LAST_TARGET_COMMIT),
            last_reviewed_iteration: int_prop(prop_keys::LAST_ITERATION),
            was_draft: bool_prop(prop_keys::WAS_DRAFT),
            reviewed_at_utc,
            vote_submitted: bool_prop(prop_keys::VOTE_SUBMITTED),
            review_count: int_prop(prop_keys::REVIEW_COUNT).max(0) as u64,
        })
    }

    async fn set_metadata(
        &self,
        project: &str,
        repo: &str,
        pr_id: i64,
        metadata: &ReviewMetadata,
    ) -> anyhow::Result<()> {
        let reviewed_at = metadata
            .reviewed_at_utc
            .unwrap_or_else(Utc::now)
            .to_rfc3339();

        let ops = vec![
            AdoPropertyPatchOp {
                op: "add",
                path: format!("/{}", prop_keys::LAST_SOURCE_COMMIT),
                value: metadata.last_reviewed_source_commit.clone().into(),
            },
            AdoPropertyPatchOp {
                op: "add",
                path: format!("/{}", prop_keys::LAST_TARGET_COMMIT),
                value: metadata.last_reviewed_target_commit.clone().into(),
            },
            AdoPropertyPatchOp {
                op: "add",
                path: format!("/{}", prop_keys::LAST_ITERATION),
                value: metadata.last_reviewed_iteration.to_string().into(),
            },
            AdoPropertyPatchOp {
                op: "add",
                path: format!("/{}", prop_keys::WAS_DRAFT),
                value: (if metadata.was_draft { "True" } else { "False" }).into(),
            },
            AdoPropertyPatchOp {
                op: "add",
                path: format!("/{}", prop_keys::REVIEWED_AT_UTC),
                value: reviewed_at.into(),
            },
            AdoPropertyPatchOp {
                op: "add",
                path: format!("/{}", prop_keys::VOTE_SUBMITTED),
                value: (if metadata.vote_submitted { "True" } else { "False" }).into(),
            },
            AdoPropertyPatchOp {
                op: "add",
                path: format!("/{}", prop_keys::REVIEW_COUNT),
                value: metadata.review_count.to_string().into(),
            },
        ];
        self.patch_properties(project, repo, pr_id, ops).await
    }

    async fn get_history(
        &self,
        project: &str,
        repo: &str,
        pr_id: i64,
    ) -> anyhow::Result<Vec<ReviewHistoryEntry>> {
        let props = self.get_properties(project, repo, pr_id).await?;
        match props.get(prop_keys::REVIEW_HISTORY).and_then(|v| v.as_str()) {
            Some(raw) if !raw.is_empty() => Ok(serde_json::from_str(raw)?),
            _ => Ok(Vec::new()),
        }
    }

    async fn append_history(
        &self,
        project: &str,
        repo: &str,
        pr_id: i64,
        entry: &ReviewHistoryEntry,
    ) -> anyhow::Result<()> {
        // Read-modify-write; not atomic at the HTTP layer (§5's reviewCount
        // race tolerance covers the resulting anomaly).
        let mut history = self.get_history(project, repo, pr_id).await?;
        history.push(entry.clone());
        let serialized = serde_json::to_string(&history)?;
        let ops = vec![AdoPropertyPatchOp {
            op: "add",
            path: format!("/{}", prop_keys::REVIEW_HISTORY),
            value: serialized.into(),
        }];
        self.patch_properties(project, repo, pr_id, ops).await
    }

    async fn get_existing_threads(
        &self,
        project: &str,
        repo: &str,
        pr_id: i64,
        attribution_tag: Option<&str>,
    ) -> anyhow::Result<Vec<ExistingCommentThread>> {
        let url = format!(
            "{}/threads?{}",
            self.pr_base(project, repo, pr_id),
            self.api_version_qs()
        );
        let resp = self.http.get(url).send().await?;
        let resp = self.check_response(resp).await?;
        let parsed: AdoThreadsResponse = resp.json().await?;

        let threads = parsed
            .value
            .into_iter()
            .filter_map(|t| {
                let content = t.comments.first().map(|c| c.content.clone()).unwrap_or_default();
                if let Some(tag) = attribution_tag {
                    if !tag.is_empty() && !content.contains(&format!("_[{tag}]_")) {
                        return None;
                    }
                }
                Some(ExistingCommentThread {
                    thread_id: t.id.to_string(),
                    path: t.thread_context.as_ref().map(|c| c.file_path.trim_start_matches('/').to_string()),
                    start_line: t.thread_context.as_ref().and_then(|c| c.right_file_start.as_ref()).map(|p| p.line),
                    end_line: t.thread_context.as_ref().and_then(|c| c.right_file_end.as_ref()).map(|p| p.line),
                    content,
                    status: Self::from_thread_status_wire(&t.status),
                })
            })
            .collect();
        Ok(threads)
    }

    async fn update_thread_status(
        &self,
        project: &str,
        repo: &str,
        pr_id: i64,
        thread_id: &str,
        status_name: &str,
    ) -> anyhow::Result<()> {
        let status = ThreadStatus::from_name(status_name);
        let url = format!(
            "{}/threads/{thread_id}?{}",
            self.pr_base(project, repo, pr_id),
            self.api_version_qs()
        );
        let body = AdoThreadStatusPatch {
            status: Self::to_thread_status_wire(status),
        };
        let resp = self.http.patch(url).json(&body).send().await?;
        self.check_response(resp).await?;
        Ok(())
    }

    async fn count_summary_comments(&self, project: &str, repo: &str, pr_id: i64) -> anyhow::Result<usize> {
        let url = format!(
            "{}/threads?{}",
            self.pr_base(project, repo, pr_id),
            self.api_version_qs()
        );
        let resp = self.http.get(url).send().await?;
        let resp = self.check_response(resp).await?;
        let parsed: AdoThreadsResponse = resp.json().await?;

        let count = parsed
            .value
            .iter()
            .filter(|t| t.thread_context.is_none())
            .filter(|t| {
                t.comments.first().is_some_and(|c| {
                    c.content.starts_with("## Code Review") || c.content.starts_with("## Re-Review")
                })
            })
            .count();
        Ok(count)
    }

    async fn get_file_changes(
        &self,
        project: &str,
        repo: &str,
        pr_id: i64,
        pr: &PullRequestSnapshot,
    ) -> anyhow::Result<Vec<FileChange>> {
        let iteration_id = self.latest_iteration_id(project, repo, pr_id).await?;
        let url = format!(
            "{}/iterations/{iteration_id}/changes?{}",
            self.pr_base(project, repo, pr_id),
            self.api_version_qs()
        );
        let resp = self.http.get(url).send().await?;
        let resp = self.check_response(resp).await?;
        let parsed: AdoChangesResponse = resp.json().await?;

        let mut out = Vec::with_capacity(parsed.change_entries.len());
        for entry in parsed.change_entries.into_iter().filter(|e| !e.item.is_folder) {
            let change_type = map_change_type(&entry.change_type);
            let path = entry.item.path.trim_start_matches('/').to_string();

            let file_change = match change_type {
                ChangeType::Add => {
                    let modified = self.get_item_content(project, repo, &path, &pr.source_commit).await?;
                    let total_lines = modified.lines().count();
                    let ranges = if total_lines > 0 {
                        vec![LineRange::new(1, total_lines)]
                    } else {
                        Vec::new()
                    };
                    FileChange {
                        path,
                        change_type,
                        original_content: None,
                        changed_line_ranges: ranges,
                        unified_diff: None,
                        modified_content: Some(modified),
                    }
                }
                ChangeType::Delete => {
                    let original_path = entry.original_path.unwrap_or_else(|| path.clone());
                    let original = self
                        .get_item_content(project, repo, &original_path, &pr.target_commit)
                        .await
                        .unwrap_or_default();
                    FileChange {
                        path,
                        change_type,
                        original_content: Some(original),
                        modified_content: None,
                        unified_diff: None,
                        changed_line_ranges: Vec::new(),
                    }
                }
                ChangeType::Edit | ChangeType::Rename => {
                    let original_path = entry.original_path.clone().unwrap_or_else(|| path.clone());
                    let original = self
                        .get_item_content(project, repo, &original_path, &pr.target_commit)
                        .await
                        .unwrap_or_default();
                    let modified = self.get_item_content(project, repo, &path, &pr.source_commit).await?;
                    let diff = diff_model::compute_unified_diff(&original, &modified, &path, 3);
                    let ranges = diff_model::parse_changed_line_ranges(&diff);
                    FileChange {
                        path,
                        change_type,
                        original_content: Some(original),
                        modified_content: Some(modified),
                        unified_diff: Some(diff),
                        changed_line_ranges: ranges,
                    }
                }
            };
            out.push(file_change);
        }
        Ok(out)
    }

    async fn post_comment_thread(
        &self,
        project: &str,
        repo: &str,
        pr_id: i64,
        content: &str,
        status: PostStatus,
    ) -> anyhow::Result<()> {
        let url = format!(
            "{}/threads?{}",
            self.pr_base(project, repo, pr_id),
            self.api_version_qs()
        );
        let status_str = match status {
            PostStatus::Active => "active",
            PostStatus::Closed => "closed",
        };
        let body = AdoNewThread {
            comments: vec![AdoNewComment { content }],
            status: status_str,
            thread_context: None,
        };
        let resp = self.http.post(url).json(&body).send().await?;
        self.check_response(resp).await?;
        Ok(())
    }

    async fn post_inline_comment_thread(
        &self,
        project: &str,
        repo: &str,
        pr_id: i64,
        path: &str,
        start_line: usize,
        end_line: usize,
        content: &str,
        status: PostStatus,
    ) -> anyhow::Result<()> {
        let url = format!(
            "{}/threads?{}",
            self.pr_base(project, repo, pr_id),
            self.api_version_qs()
        );
        let status_str = match status {
            PostStatus::Active => "active",
            PostStatus::Closed => "closed",
        };
        let thread_context = AdoThreadContext {
            file_path: format!("/{path}"),
            right_file_start: Some(AdoFilePosition { line: start_line }),
            right_file_end: Some(AdoFilePosition { line: end_line }),
        };
        let body = AdoNewThread {
            comments: vec![AdoNewComment { content }],
            status: status_str,
            thread_context: Some(thread_context),
        };
        let resp = self.http.post(url).json(&body).send().await?;
        self.check_response(resp).await?;
        Ok(())
    }

    async fn add_reviewer_vote(&self, project: &str, repo: &str, pr_id: i64, vote: i8) -> anyhow::Result<()> {
        let reviewer_id = self.self_reviewer_id().await?;
        let url = format!(
            "{}/reviewers/{reviewer_id}?{}",
            self.pr_base(project, repo, pr_id),
            self.api_version_qs()
        );
        let resp = self.http.put(url).json(&AdoVotePayload { vote }).send().await?;
        self.check_response(resp).await?;
        Ok(())
    }

    async fn update_pr_description(
        &self,
        project: &str,
        repo: &str,
        pr_id: i64,
        new_description: &str,
    ) -> anyhow::Result<()> {
        let url = format!("{}?{}", self.pr_base(project, repo, pr_id), self.api_version_qs());
        let body = AdoDescriptionPatch {
            description: new_description.to_string(),
        };
        let resp = self.http.patch(url).json(&body).send().await?;
        self.check_response(resp).await?;
        Ok(())
    }

    async fn has_review_tag(&self, project: &str, repo: &str, pr_id: i64) -> anyhow::Result<bool> {
        let url = format!(
            "{}/labels?api-version=7.1-preview.2",
            self.pr_base(project, repo, pr_id)
        );
        let resp = self.http.get(url).send().await?;
        let resp = self.check_response(resp).await?;
        let parsed: AdoLabelsResponse = resp.json().await?;
        Ok(parsed.value.iter().any(|l| l.name == REVIEW_TAG_LABEL))
    }

    async fn add_review_tag(&self, project: &str, repo: &str, pr_id: i64) -> anyhow::Result<()> {
        if self.has_review_tag(project, repo, pr_id).await? {
            return Ok(());
        }
        let url = format!(
            "{}/labels?api-version=7.1-preview.2",
            self.pr_base(project, repo, pr_id)
        );
        let resp = self
            .http
            .post(url)
            .json(&AdoNewLabel { name: REVIEW_TAG_LABEL })
            .send()
            .await?;
        self.check_response(resp).await?;
        Ok(())
    }
}
