//! Minimal structured prompt construction (§4.11: "file path, line-numbered
//! content, diff"). Prompt text itself is out of the core's scope (§1) —
//! this crate owns it.

use review_core::diff_model::add_line_numbers;
use review_core::model::{FileChange, PullRequestSnapshot};
use review_core::provider::ResolutionCandidate;

/// System/user split, following the teacher's own `Prompt` shape
/// (`mr-reviewer/src/review/prompt.rs`).
#[derive(Debug, Clone)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

const SYSTEM_REVIEW: &str = "You are an automated code reviewer. Respond with a single JSON object \
matching the requested schema exactly. Do not wrap the JSON in markdown code fences. \
Do not include any text outside the JSON object.";

pub fn review_one_prompt(
    pr: &PullRequestSnapshot,
    file: &FileChange,
    total_files_in_pr: usize,
    custom_instructions: Option<&str>,
) -> Prompt {
    let numbered = file
        .modified_content
        .as_deref()
        .map(add_line_numbers)
        .unwrap_or_default();
    let diff = file.unified_diff.as_deref().unwrap_or("(no diff available)");
    let extra = custom_instructions.map(|s| format!("\n\nAdditional reviewer instructions:\n{s}")).unwrap_or_default();

    let user = format!(
        "Pull request \"{title}\" ({author}): {source} -> {target}.\n\
         Reviewing file {idx_hint} of {total_files_in_pr}: {path}.\n\n\
         Unified diff:\n```diff\n{diff}\n```\n\n\
         Full file content (line-numbered):\n```\n{numbered}\n```\n\n\
         Return JSON: {{\"summary\": {{\"filesChanged\":1,\"editsCount\":int,\"addsCount\":int,\"deletesCount\":int,\
         \"description\":string,\"verdict\":\"APPROVED\"|\"APPROVED WITH SUGGESTIONS\"|\"NEEDS WORK\"|\"REJECTED\",\
         \"verdictJustification\":string}}, \"fileReviews\":[{{\"path\":string,\"verdict\":\"CLEAN\"|\"CONCERN\"|\"REJECTED\",\
         \"reviewText\":string}}], \"inlineComments\":[{{\"path\":string,\"startLine\":int,\"endLine\":int,\
         \"leadIn\":string,\"comment\":string,\"codeSnippet\":string|null}}], \"observations\":[string], \
         \"recommendedVote\":10|5|-5|-10}}.{extra}",
        title = pr.title,
        author = pr.author,
        source = pr.source_branch,
        target = pr.target_branch,
        idx_hint = "this",
        path = file.path,
    );

    Prompt {
        system: SYSTEM_REVIEW.to_string(),
        user,
    }
}

pub fn review_all_prompt(pr: &PullRequestSnapshot, files: &[FileChange], custom_instructions: Option<&str>) -> Prompt {
    let extra = custom_instructions.map(|s| format!("\n\nAdditional reviewer instructions:\n{s}")).unwrap_or_default();
    let file_list = files
        .iter()
        .map(|f| format!("- {} ({:?})", f.path, f.change_type))
        .collect::<Vec<_>>()
        .join("\n");

    let diffs = files
        .iter()
        .map(|f| format!("### {}\n```diff\n{}\n```", f.path, f.unified_diff.as_deref().unwrap_or("(no diff available)")))
        .collect::<Vec<_>>()
        .join("\n\n");

    let user = format!(
        "Pull request \"{title}\" ({author}): {source} -> {target}.\n\
         Files changed ({count}):\n{file_list}\n\n{diffs}\n\n\
         Return the same JSON schema used for single-file review, covering the whole PR.{extra}",
        title = pr.title,
        author = pr.author,
        source = pr.source_branch,
        target = pr.target_branch,
        count = files.len(),
    );

    Prompt {
        system: SYSTEM_REVIEW.to_string(),
        user,
    }
}

pub fn verify_resolutions_prompt(candidates: &[ResolutionCandidate]) -> Prompt {
    let items = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            format!(
                "{i}. threadId={tid}\npath: {path}\nprior comment: {comment}\ncurrent code:\n```\n{ctx}\n```",
                tid = c.thread_id,
                path = c.path,
                comment = c.comment,
                ctx = c.code_context,
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let user = format!(
        "For each candidate below, decide whether the concern described in the prior comment has been \
         fixed by the current code.\n\n{items}\n\n\
         Return JSON: [{{\"threadId\":string,\"isFixed\":bool,\"reasoning\":string}}] covering every candidate."
    );

    Prompt {
        system: "You are verifying whether previously flagged code-review concerns have been resolved. \
Respond with a single JSON array matching the requested schema exactly."
            .to_string(),
        user,
    }
}
