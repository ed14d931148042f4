use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use prscope_core::{ChangedFile, FileStatus, PrscopeConfig, PrscopeError, ProviderKind};
use prscope_review::llm::{ChatMessage, ChatProvider, ModelInfo};
use prscope_review::pipeline::{ReviewOutcome, ReviewPipeline};
use prscope_review::schema::{extract_json, parse_review_result, parse_review_text};
use serde_json::json;

struct CannedProvider {
    answer: String,
    prompts: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ChatProvider for CannedProvider {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, PrscopeError> {
        let user = messages.last().map(|m| m.content.clone()).unwrap_or_default();
        self.prompts.lock().unwrap().push(user);
        Ok(self.answer.clone())
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, PrscopeError> {
        Ok(Vec::new())
    }

    fn model(&self) -> &str {
        "canned"
    }
}

fn pipeline(answer: &str) -> (ReviewPipeline, Arc<Mutex<Vec<String>>>) {
    let prompts = Arc::new(Mutex::new(Vec::new()));
    let provider = CannedProvider {
        answer: answer.to_string(),
        prompts: Arc::clone(&prompts),
    };
    let config = PrscopeConfig::new(ProviderKind::Ollama, "llama3.1", "UNUSED");
    (ReviewPipeline::new(Box::new(provider), config), prompts)
}

fn changed(filename: &str, patch: &str) -> ChangedFile {
    ChangedFile {
        filename: filename.into(),
        status: FileStatus::Modified,
        patch: Some(patch.into()),
        additions: 2,
        deletions: 1,
        content_hash: String::new(),
    }
}

const MINIMAL: &str =
    r#"{"summary":"Small refactor.","overall_risk":"low","findings":[],"praise":[]}"#;

#[test]
fn minimal_result_accepted_and_bad_shapes_rejected() {
    let minimal: serde_json::Value = serde_json::from_str(MINIMAL).unwrap();
    assert!(parse_review_result(&minimal).is_ok());

    assert!(parse_review_result(&json!("just a string")).is_err());
    assert!(parse_review_result(&json!(42)).is_err());
    assert!(parse_review_result(&serde_json::Value::Null).is_err());

    let mut extreme = minimal.clone();
    extreme["overall_risk"] = json!("extreme");
    assert!(parse_review_result(&extreme).is_err());

    let finding = json!({
        "file": "src/a.ts",
        "line": 3,
        "severity": "high",
        "category": "bug",
        "title": "t",
        "message": "m",
        "suggestion": "",
        "confidence": 0.9
    });
    let mut critical = minimal.clone();
    critical["findings"] = json!([finding.clone()]);
    critical["findings"][0]["severity"] = json!("critical");
    assert!(parse_review_result(&critical).is_err());

    let mut overconfident = minimal;
    overconfident["findings"] = json!([finding]);
    overconfident["findings"][0]["confidence"] = json!(1.5);
    assert!(parse_review_result(&overconfident).is_err());
}

#[tokio::test]
async fn lockfile_is_excluded_from_prompt() {
    let (pipeline, prompts) = pipeline(MINIMAL);
    let files = vec![
        changed("src/index.ts", "+export const a = 1;"),
        changed("package-lock.json", "+\"lockfileVersion\": 3"),
        changed("README.md", "+# Title"),
    ];
    let report = pipeline.run(&files).await;

    assert_eq!(report.stats.files_selected, 2);
    let prompts = prompts.lock().unwrap();
    assert!(prompts[0].starts_with("Review the following pull request diff (2 files):"));
    assert!(!prompts[0].contains("package-lock.json"));
}

#[tokio::test]
async fn fenced_response_extracts_interior_and_validates() {
    let raw = format!("Here is the review.\n```json\n{MINIMAL}\n```\nDone.");
    assert_eq!(extract_json(&raw), MINIMAL);
    assert!(parse_review_text(&raw).is_ok());

    let (pipeline, _) = pipeline(&raw);
    let report = pipeline.run(&[changed("src/index.ts", "+x")]).await;
    let ReviewOutcome::Reviewed(result) = report.outcome else {
        panic!("expected a validated review");
    };
    assert_eq!(result.summary, "Small refactor.");
}

#[tokio::test]
async fn prose_response_yields_fallback_with_reason() {
    let (pipeline, _) = pipeline("The changes look reasonable overall, nice work.");
    let report = pipeline.run(&[changed("src/index.ts", "+x")]).await;

    let ReviewOutcome::Fallback { reason } = &report.outcome else {
        panic!("expected fallback");
    };
    assert!(reason.starts_with("Schema validation failed:"));
    let comment = report.comment();
    assert!(comment.contains(&format!("**Reason:** {reason}")));
    assert!(comment.contains("could not produce a structured review"));
}
