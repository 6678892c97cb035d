//! Tolerant parsing of provider output into `review_core` types: JSON first,
//! falling back to a labeled-line block format when a model ignores the
//! "JSON only" instruction (§4.11).

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use review_core::model::{
    FileReview, FileVerdict, InlineComment, LeadIn, RecommendedVote, ReviewMetrics, ReviewResult,
    ReviewSummary, Verdict,
};
use review_core::provider::ResolutionVerdict;

use crate::error::LlmError;
use crate::ollama::Usage;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSummary {
    #[serde(default)]
    files_changed: usize,
    #[serde(default)]
    edits_count: usize,
    #[serde(default)]
    adds_count: usize,
    #[serde(default)]
    deletes_count: usize,
    #[serde(default)]
    description: String,
    #[serde(default)]
    verdict: String,
    #[serde(default)]
    verdict_justification: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFileReview {
    path: String,
    #[serde(default)]
    verdict: String,
    #[serde(default)]
    review_text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInlineComment {
    path: String,
    #[serde(default = "default_line")]
    start_line: usize,
    #[serde(default = "default_line")]
    end_line: usize,
    #[serde(default)]
    lead_in: String,
    #[serde(default)]
    comment: String,
    #[serde(default)]
    code_snippet: Option<String>,
}

fn default_line() -> usize {
    1
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReviewResult {
    summary: RawSummary,
    #[serde(default)]
    file_reviews: Vec<RawFileReview>,
    #[serde(default)]
    inline_comments: Vec<RawInlineComment>,
    #[serde(default)]
    observations: Vec<String>,
    #[serde(default)]
    recommended_vote: i8,
}

/// Strips `<think>...</think>` blocks and code-fence wrappers a model may
/// add despite the system prompt forbidding them.
pub fn cleanup_model_output(raw: &str) -> String {
    static THINK_RE: OnceLock<Regex> = OnceLock::new();
    let think_re = THINK_RE.get_or_init(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());
    let stripped = think_re.replace_all(raw, "");

    let mut t = stripped.trim().to_string();
    if t.starts_with("```") {
        t = t
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .to_string();
        if let Some(pos) = t.rfind("```") {
            t.truncate(pos);
        }
    }
    t.trim().to_string()
}

pub fn parse_review_result(
    raw: &str,
    model_name: &str,
    ai_duration_ms: u64,
    usage: Usage,
) -> Result<ReviewResult, LlmError> {
    let cleaned = cleanup_model_output(raw);

    match serde_json::from_str::<RawReviewResult>(&cleaned) {
        Ok(parsed) => Ok(to_review_result(parsed, model_name, ai_duration_ms, usage)),
        Err(_) => parse_review_result_fallback(&cleaned, model_name, ai_duration_ms, usage)
            .ok_or_else(|| LlmError::Unparseable {
                detail: format!("neither JSON nor fallback block parsing succeeded: {cleaned:.200}"),
            }),
    }
}

fn to_review_result(raw: RawReviewResult, model_name: &str, ai_duration_ms: u64, usage: Usage) -> ReviewResult {
    ReviewResult {
        summary: ReviewSummary {
            files_changed: raw.summary.files_changed,
            edits_count: raw.summary.edits_count,
            adds_count: raw.summary.adds_count,
            deletes_count: raw.summary.deletes_count,
            description: raw.summary.description,
            verdict: Verdict::parse_lenient(&raw.summary.verdict),
            verdict_justification: raw.summary.verdict_justification,
        },
        file_reviews: raw
            .file_reviews
            .into_iter()
            .map(|fr| FileReview {
                path: fr.path,
                verdict: parse_file_verdict(&fr.verdict),
                review_text: fr.review_text,
            })
            .collect(),
        inline_comments: raw
            .inline_comments
            .into_iter()
            .map(|c| InlineComment {
                path: c.path,
                start_line: c.start_line.max(1),
                end_line: c.end_line.max(c.start_line.max(1)),
                lead_in: parse_lead_in(&c.lead_in),
                comment: c.comment,
                code_snippet: c.code_snippet,
                status: review_core::model::CommentStatus::Active,
            })
            .collect(),
        observations: raw.observations,
        recommended_vote: RecommendedVote::from_i8(raw.recommended_vote).unwrap_or(RecommendedVote::Approved),
        metrics: ReviewMetrics {
            model_name: model_name.to_string(),
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total(),
            ai_duration_ms,
        },
    }
}

fn parse_file_verdict(s: &str) -> FileVerdict {
    match s.trim().to_ascii_uppercase().as_str() {
        "REJECTED" => FileVerdict::Rejected,
        "CONCERN" => FileVerdict::Concern,
        _ => FileVerdict::Clean,
    }
}

fn parse_lead_in(s: &str) -> LeadIn {
    match s.trim().to_ascii_lowercase().as_str() {
        "lgtm" => LeadIn::Lgtm,
        "good catch" => LeadIn::GoodCatch,
        "important" => LeadIn::Important,
        "bug" => LeadIn::Bug,
        "security" => LeadIn::Security,
        "performance" => LeadIn::Performance,
        "suggestion" => LeadIn::Suggestion,
        _ => LeadIn::Concern,
    }
}

/// Fallback for models that ignore the JSON-only instruction: a labeled
/// block format, `FILE:`/`LINES:`/`LEADIN:`/`COMMENT:` per finding, with a
/// single trailing `VERDICT:`/`JUSTIFICATION:` pair for the summary.
fn parse_review_result_fallback(
    text: &str,
    model_name: &str,
    ai_duration_ms: u64,
    usage: Usage,
) -> Option<ReviewResult> {
    static FILE_RE: OnceLock<Regex> = OnceLock::new();
    let file_re = FILE_RE.get_or_init(|| {
        Regex::new(r"(?mi)^FILE:\s*(.+)\nLINES:\s*(\d+)\s*-\s*(\d+)\nLEADIN:\s*(.+)\nCOMMENT:\s*(.+)$").unwrap()
    });
    static VERDICT_RE: OnceLock<Regex> = OnceLock::new();
    let verdict_re = VERDICT_RE
        .get_or_init(|| Regex::new(r"(?mi)^VERDICT:\s*(.+)$").unwrap());
    static JUSTIFICATION_RE: OnceLock<Regex> = OnceLock::new();
    let justification_re =
        JUSTIFICATION_RE.get_or_init(|| Regex::new(r"(?mi)^JUSTIFICATION:\s*(.+)$").unwrap());

    let mut inline_comments = Vec::new();
    for caps in file_re.captures_iter(text) {
        let start: usize = caps[2].parse().ok()?;
        let end: usize = caps[3].parse().ok()?;
        inline_comments.push(InlineComment {
            path: caps[1].trim().to_string(),
            start_line: start.max(1),
            end_line: end.max(start.max(1)),
            lead_in: parse_lead_in(&caps[4]),
            comment: caps[5].trim().to_string(),
            code_snippet: None,
            status: review_core::model::CommentStatus::Active,
        });
    }

    if inline_comments.is_empty() && verdict_re.captures(text).is_none() {
        return None;
    }

    let verdict = verdict_re
        .captures(text)
        .map(|c| Verdict::parse_lenient(&c[1]))
        .unwrap_or(Verdict::Approved);
    let justification = justification_re
        .captures(text)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_default();

    Some(ReviewResult {
        summary: ReviewSummary {
            files_changed: 0,
            edits_count: 0,
            adds_count: 0,
            deletes_count: 0,
            description: String::new(),
            verdict,
            verdict_justification: justification,
        },
        file_reviews: Vec::new(),
        inline_comments,
        observations: Vec::new(),
        recommended_vote: match verdict {
            Verdict::Approved => RecommendedVote::Approved,
            Verdict::ApprovedWithSuggestions => RecommendedVote::ApprovedWithSuggestions,
            Verdict::NeedsWork => RecommendedVote::WaitingForAuthor,
            Verdict::Rejected => RecommendedVote::Rejected,
        },
        metrics: ReviewMetrics {
            model_name: model_name.to_string(),
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total(),
            ai_duration_ms,
        },
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVerdict {
    thread_id: String,
    #[serde(default)]
    is_fixed: bool,
    #[serde(default)]
    reasoning: String,
}

pub fn parse_verification(raw: &str) -> Vec<ResolutionVerdict> {
    let cleaned = cleanup_model_output(raw);
    match serde_json::from_str::<Vec<RawVerdict>>(&cleaned) {
        Ok(verdicts) => verdicts
            .into_iter()
            .map(|v| ResolutionVerdict {
                thread_id: v.thread_id,
                is_fixed: v.is_fixed,
                reasoning: v.reasoning,
            })
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_think_blocks_and_code_fences() {
        let raw = "<think>pondering</think>```json\n{\"a\":1}\n```";
        assert_eq!(cleanup_model_output(raw), "{\"a\":1}");
    }

    #[test]
    fn parses_well_formed_json() {
        let raw = r#"{
            "summary": {"filesChanged":1,"editsCount":1,"addsCount":0,"deletesCount":0,
              "description":"d","verdict":"NEEDS WORK","verdictJustification":"j"},
            "fileReviews": [],
            "inlineComments": [{"path":"a.rs","startLine":2,"endLine":3,"leadIn":"Bug","comment":"oops"}],
            "observations": [],
            "recommendedVote": -5
        }"#;
        let result = parse_review_result(raw, "test-model", 10, Usage::default()).unwrap();
        assert_eq!(result.summary.verdict, Verdict::NeedsWork);
        assert_eq!(result.inline_comments.len(), 1);
        assert_eq!(result.recommended_vote.as_i8(), -5);
    }

    #[test]
    fn falls_back_on_labeled_blocks() {
        let raw = "FILE: a.rs\nLINES: 2-3\nLEADIN: Bug\nCOMMENT: oops\n\nVERDICT: NEEDS WORK\nJUSTIFICATION: see above";
        let result = parse_review_result(raw, "test-model", 10, Usage::default()).unwrap();
        assert_eq!(result.inline_comments.len(), 1);
        assert_eq!(result.summary.verdict, Verdict::NeedsWork);
    }

    #[test]
    fn unparseable_output_is_an_error() {
        let raw = "I refuse to answer in JSON.";
        assert!(parse_review_result(raw, "test-model", 10, Usage::default()).is_err());
    }
}
