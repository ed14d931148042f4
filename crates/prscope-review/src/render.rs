use prscope_core::{Category, Finding, ReviewResult, RiskLevel, Severity, COMMENT_MARKER};

const FOOTER: &str =
    "<sub>Powered by <a href=\"https://github.com/KinanNasri/PRScope\">PRScope</a></sub>";

const FALLBACK_EXPLANATION: &str = "The model response did not match the expected schema. \
This can happen with very large diffs or provider-specific formatting quirks. \
The PR was still analyzed — try re-running the workflow.";

fn risk_label(risk: RiskLevel) -> &'static str {
    match risk {
        RiskLevel::Low => "Low Risk",
        RiskLevel::Medium => "Medium Risk",
        RiskLevel::High => "High Risk",
    }
}

fn risk_badge(risk: RiskLevel) -> &'static str {
    match risk {
        RiskLevel::Low => "`LOW`",
        RiskLevel::Medium => "`MEDIUM`",
        RiskLevel::High => "`HIGH`",
    }
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::High => "High",
        Severity::Medium => "Medium",
        Severity::Low => "Low",
    }
}

/// Display name for a finding category.
pub fn category_label(category: Category) -> &'static str {
    match category {
        Category::Bug => "Bug",
        Category::Security => "Security",
        Category::Performance => "Performance",
        Category::Maintainability => "Maintainability",
        Category::Dx => "Developer Experience",
    }
}

fn findings_table(findings: &[Finding]) -> String {
    if findings.is_empty() {
        return "*No issues found — this PR looks good.*\n".to_string();
    }

    let mut sorted: Vec<&Finding> = findings.iter().collect();
    sorted.sort_by_key(|f| f.severity.rank());

    let mut out = String::from(
        "| Severity | Category | Finding | Location |\n|----------|----------|---------|----------|\n",
    );
    for f in sorted {
        out.push_str(&format!(
            "| {} | {} | {} | `{}` |\n",
            severity_label(f.severity),
            category_label(f.category),
            f.title,
            f.location()
        ));
    }
    out
}

fn finding_details(findings: &[Finding]) -> String {
    if findings.is_empty() {
        return String::new();
    }

    let details: Vec<String> = findings
        .iter()
        .map(|f| {
            let mut lines = vec![
                format!("#### {}", f.title),
                format!(
                    "**Location:** `{}` — **Confidence:** {}%",
                    f.location(),
                    (f.confidence * 100.0).round()
                ),
                f.message.clone(),
            ];
            if !f.suggestion.is_empty() {
                lines.push(format!("> **Suggestion:** {}", f.suggestion));
            }
            lines.join("\n")
        })
        .collect();

    format!(
        "<details>\n<summary>Detailed findings</summary>\n\n{}\n\n</details>\n",
        details.join("\n")
    )
}

fn praise_section(praise: &[String]) -> String {
    if praise.is_empty() {
        return String::new();
    }
    let items: Vec<String> = praise.iter().map(|p| format!("- {p}")).collect();
    format!(
        "<details>\n<summary>What looks good</summary>\n\n{}\n\n</details>\n",
        items.join("\n")
    )
}

/// Render a validated review as the PR comment body.
///
/// The findings table lists the most severe findings first; the detailed
/// section keeps the reviewer's order.
///
/// # Examples
///
/// ```
/// use prscope_core::{ReviewResult, COMMENT_MARKER};
/// use prscope_review::render::render_comment;
///
/// let comment = render_comment(&ReviewResult::empty("Nothing to review."));
/// assert!(comment.starts_with(COMMENT_MARKER));
/// assert!(comment.contains("## PRScope Review — Low Risk `LOW`"));
/// assert!(comment.contains("No issues found"));
/// ```
pub fn render_comment(result: &ReviewResult) -> String {
    [
        COMMENT_MARKER,
        "",
        &format!(
            "## PRScope Review — {} {}",
            risk_label(result.overall_risk),
            risk_badge(result.overall_risk)
        ),
        "",
        &result.summary,
        "",
        "---",
        "",
        "### Findings",
        "",
        &findings_table(&result.findings),
        &finding_details(&result.findings),
        &praise_section(&result.praise),
        "---",
        "",
        FOOTER,
        "",
    ]
    .join("\n")
}

/// Render the comment posted when no structured review could be produced.
///
/// # Examples
///
/// ```
/// use prscope_review::render::render_fallback_comment;
///
/// let comment = render_fallback_comment("Schema validation failed: summary: required");
/// assert!(comment.contains("**Reason:** Schema validation failed: summary: required"));
/// ```
pub fn render_fallback_comment(reason: &str) -> String {
    [
        COMMENT_MARKER,
        "",
        "## PRScope Review",
        "",
        "PRScope could not produce a structured review for this PR.",
        "",
        &format!("**Reason:** {reason}"),
        "",
        FALLBACK_EXPLANATION,
        "",
        "---",
        "",
        FOOTER,
        "",
    ]
    .join("\n")
}

/// Body of a line comment for one finding.
pub fn render_inline_finding(finding: &Finding) -> String {
    let mut body = format!(
        "**{} · {}** — {}\n\n{}",
        severity_label(finding.severity),
        category_label(finding.category),
        finding.title,
        finding.message
    );
    if !finding.suggestion.is_empty() {
        body.push_str(&format!("\n\n> **Suggestion:** {}", finding.suggestion));
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(title: &str, severity: Severity, line: Option<i64>) -> Finding {
        Finding {
            file: "src/app.ts".into(),
            line,
            severity,
            category: Category::Bug,
            title: title.into(),
            message: format!("{title} explained"),
            suggestion: String::new(),
            confidence: 0.876,
        }
    }

    fn result(findings: Vec<Finding>, praise: Vec<&str>) -> ReviewResult {
        ReviewResult {
            summary: "A focused change.".into(),
            overall_risk: RiskLevel::High,
            findings,
            praise: praise.into_iter().map(String::from).collect(),
        }
    }

    #[test]
    fn header_and_footer() {
        let comment = render_comment(&result(vec![], vec![]));
        assert!(comment.starts_with("<!-- prscope:review -->\n\n## PRScope Review — High Risk `HIGH`"));
        assert!(comment.contains("A focused change."));
        assert!(comment.contains("https://github.com/KinanNasri/PRScope"));
        assert!(comment.ends_with("</sub>\n"));
    }

    #[test]
    fn clean_review_has_no_details_or_praise() {
        let comment = render_comment(&result(vec![], vec![]));
        assert!(comment.contains("*No issues found — this PR looks good.*"));
        assert!(!comment.contains("Detailed findings"));
        assert!(!comment.contains("What looks good"));
    }

    #[test]
    fn table_is_sorted_by_severity() {
        let comment = render_comment(&result(
            vec![
                finding("Low one", Severity::Low, Some(3)),
                finding("High one", Severity::High, Some(1)),
                finding("Medium one", Severity::Medium, None),
            ],
            vec![],
        ));
        let high = comment.find("| High | Bug | High one | `src/app.ts:1` |").unwrap();
        let medium = comment.find("| Medium | Bug | Medium one | `src/app.ts` |").unwrap();
        let low = comment.find("| Low | Bug | Low one | `src/app.ts:3` |").unwrap();
        assert!(high < medium && medium < low);
    }

    #[test]
    fn details_keep_reviewer_order() {
        let comment = render_comment(&result(
            vec![
                finding("Low one", Severity::Low, Some(3)),
                finding("High one", Severity::High, Some(1)),
            ],
            vec![],
        ));
        let low = comment.find("#### Low one").unwrap();
        let high = comment.find("#### High one").unwrap();
        assert!(low < high);
        assert!(comment.contains("**Location:** `src/app.ts:3` — **Confidence:** 88%"));
    }

    #[test]
    fn suggestion_only_when_present() {
        let mut with = finding("Leak", Severity::High, Some(9));
        with.suggestion = "Close the handle.".into();
        let comment = render_comment(&result(vec![with, finding("Other", Severity::Low, None)], vec![]));
        assert_eq!(comment.matches("> **Suggestion:**").count(), 1);
        assert!(comment.contains("> **Suggestion:** Close the handle."));
    }

    #[test]
    fn praise_is_listed() {
        let comment = render_comment(&result(vec![], vec!["Clear naming", "Good tests"]));
        assert!(comment.contains("<summary>What looks good</summary>\n\n- Clear naming\n- Good tests"));
    }

    #[test]
    fn dx_category_label() {
        assert_eq!(category_label(Category::Dx), "Developer Experience");
    }

    #[test]
    fn fallback_contains_reason_and_marker() {
        let comment = render_fallback_comment("Model call failed: timeout");
        assert!(comment.starts_with(COMMENT_MARKER));
        assert!(comment.contains("could not produce a structured review"));
        assert!(comment.contains("**Reason:** Model call failed: timeout"));
    }

    #[test]
    fn inline_body_mentions_severity_and_category() {
        let body = render_inline_finding(&finding("Null deref", Severity::High, Some(5)));
        assert!(body.starts_with("**High · Bug** — Null deref"));
        assert!(body.contains("Null deref explained"));
    }
}
