use prscope_core::ReviewProfile;
use prscope_difflens::budget::PreparedDiff;

use crate::llm::ChatMessage;

const REVIEWER_PERSONA: &str =
    "You are a senior code reviewer. You review pull request diffs and produce structured findings.";

const RESPONSE_SCHEMA: &str = r#"Respond ONLY with a valid JSON object matching this exact schema:

{
  "summary": "Brief overall assessment of the PR",
  "overall_risk": "low | medium | high",
  "findings": [
    {
      "file": "path/to/file",
      "line": 42,
      "severity": "low | medium | high",
      "category": "bug | security | performance | maintainability | dx",
      "title": "Short title",
      "message": "Detailed explanation",
      "suggestion": "How to fix it",
      "confidence": 0.92
    }
  ],
  "praise": ["Good things about this PR"]
}"#;

const RULES: &str = "\
Rules:
- Output ONLY the JSON object, no markdown fences, no commentary.
- Set confidence between 0 and 1. Only flag findings where confidence > 0.7.
- If the diff looks clean, return an empty findings array.
- Be specific about line numbers when possible.
- Do not hallucinate files or line numbers that are not in the diff.";

/// Focus instructions for a review profile.
///
/// # Examples
///
/// ```
/// use prscope_core::ReviewProfile;
/// use prscope_review::prompt::profile_instructions;
///
/// assert!(profile_instructions(ReviewProfile::Strict).starts_with("Maximum scrutiny"));
/// ```
pub fn profile_instructions(profile: ReviewProfile) -> &'static str {
    match profile {
        ReviewProfile::Balanced => {
            "Review for bugs, security issues, performance problems, and code quality. Be thorough but practical."
        }
        ReviewProfile::Security => {
            "Focus primarily on security vulnerabilities, injection risks, auth flaws, and data exposure. Be strict on security, lighter on style."
        }
        ReviewProfile::Performance => {
            "Focus primarily on performance regressions, memory leaks, unnecessary allocations, and algorithmic inefficiency."
        }
        ReviewProfile::Strict => {
            "Maximum scrutiny. Flag everything: bugs, security, performance, style, naming, documentation gaps. Miss nothing."
        }
    }
}

/// Build the system prompt: persona, profile focus, output schema, and rules.
///
/// # Examples
///
/// ```
/// use prscope_core::ReviewProfile;
/// use prscope_review::prompt::build_system_prompt;
///
/// let prompt = build_system_prompt(ReviewProfile::Security);
/// assert!(prompt.contains("Review focus: Focus primarily on security"));
/// assert!(prompt.contains("\"overall_risk\""));
/// ```
pub fn build_system_prompt(profile: ReviewProfile) -> String {
    [
        REVIEWER_PERSONA,
        "",
        &format!("Review focus: {}", profile_instructions(profile)),
        "",
        RESPONSE_SCHEMA,
        "",
        RULES,
    ]
    .join("\n")
}

/// Build the user prompt listing every prepared diff in order.
///
/// # Examples
///
/// ```
/// use prscope_core::FileStatus;
/// use prscope_difflens::budget::PreparedDiff;
/// use prscope_review::prompt::build_user_prompt;
///
/// let diff = PreparedDiff {
///     filename: "src/lib.rs".into(),
///     status: FileStatus::Modified,
///     additions: 1,
///     deletions: 0,
///     patch: "+pub fn hello() {}".into(),
///     truncated: false,
/// };
/// let prompt = build_user_prompt(&[diff]);
/// assert_eq!(
///     prompt,
///     "Review the following pull request diff (1 files):\n\n--- src/lib.rs (modified) ---\n+pub fn hello() {}"
/// );
/// ```
pub fn build_user_prompt(diffs: &[PreparedDiff]) -> String {
    let body = diffs
        .iter()
        .map(|d| format!("--- {} ({}) ---\n{}", d.filename, d.status, d.patch))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Review the following pull request diff ({} files):\n\n{body}",
        diffs.len()
    )
}

/// Compose the `[system, user]` conversation sent to the model.
///
/// Identical inputs produce byte-identical messages.
pub fn build_prompt(diffs: &[PreparedDiff], profile: ReviewProfile) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(build_system_prompt(profile)),
        ChatMessage::user(build_user_prompt(diffs)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;
    use prscope_core::FileStatus;

    fn diff(filename: &str, status: FileStatus, patch: &str) -> PreparedDiff {
        PreparedDiff {
            filename: filename.into(),
            status,
            additions: 1,
            deletions: 1,
            patch: patch.into(),
            truncated: false,
        }
    }

    #[test]
    fn every_profile_has_distinct_instructions() {
        let mut seen: Vec<&str> = ReviewProfile::ALL
            .iter()
            .map(|p| profile_instructions(*p))
            .collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), ReviewProfile::ALL.len());
    }

    #[test]
    fn system_prompt_layout() {
        let prompt = build_system_prompt(ReviewProfile::Balanced);
        let lines: Vec<&str> = prompt.lines().collect();
        assert_eq!(lines[0], REVIEWER_PERSONA);
        assert_eq!(lines[1], "");
        assert!(lines[2].starts_with("Review focus: Review for bugs"));
        assert_eq!(lines[4], "Respond ONLY with a valid JSON object matching this exact schema:");
        assert!(prompt.ends_with("that are not in the diff."));
        assert!(prompt.contains("Only flag findings where confidence > 0.7."));
    }

    #[test]
    fn user_prompt_joins_diffs_in_order() {
        let diffs = vec![
            diff("b.rs", FileStatus::Added, "+b"),
            diff("a.rs", FileStatus::Removed, "-a"),
        ];
        let prompt = build_user_prompt(&diffs);
        assert_eq!(
            prompt,
            "Review the following pull request diff (2 files):\n\n\
             --- b.rs (added) ---\n+b\n\n\
             --- a.rs (removed) ---\n-a"
        );
    }

    #[test]
    fn user_prompt_with_no_diffs() {
        assert_eq!(
            build_user_prompt(&[]),
            "Review the following pull request diff (0 files):\n\n"
        );
    }

    #[test]
    fn prompt_is_system_then_user() {
        let messages = build_prompt(&[diff("x.rs", FileStatus::Modified, "+x")], ReviewProfile::Strict);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("Maximum scrutiny"));
        assert_eq!(messages[1].role, Role::User);
        assert!(messages[1].content.contains("--- x.rs (modified) ---\n+x"));
    }

    #[test]
    fn prompt_is_deterministic() {
        let diffs = vec![diff("x.rs", FileStatus::Renamed, "+x\n-y")];
        assert_eq!(
            build_prompt(&diffs, ReviewProfile::Performance),
            build_prompt(&diffs, ReviewProfile::Performance)
        );
    }
}
