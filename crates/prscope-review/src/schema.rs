//! Extraction and validation of the model's review response.
//!
//! Models wrap JSON in prose or markdown fences often enough that the raw text
//! is first narrowed to its JSON payload, then checked field by field against
//! the review schema. The first violation is reported with its JSON path.

use std::str::FromStr;

use prscope_core::{Category, Finding, ReviewResult, RiskLevel, Severity};
use serde_json::{Map, Value};

const RISK_VALUES: &[&str] = &["low", "medium", "high"];
const SEVERITY_VALUES: &[&str] = &["low", "medium", "high"];
const CATEGORY_VALUES: &[&str] = &["bug", "security", "performance", "maintainability", "dx"];

/// The model response did not match the review schema.
///
/// `path` locates the offending value (`findings[2].confidence`); it is empty
/// when the problem is the document as a whole.
///
/// # Examples
///
/// ```
/// use prscope_review::schema::parse_review_text;
///
/// let err = parse_review_text(r#"{"summary": "", "overall_risk": "low", "findings": [], "praise": []}"#)
///     .unwrap_err();
/// assert_eq!(err.path, "summary");
/// assert_eq!(err.to_string(), "summary: must not be empty");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}{}", path_prefix(.path), .message)]
pub struct SchemaValidationError {
    pub path: String,
    pub message: String,
}

impl SchemaValidationError {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

fn path_prefix(path: &str) -> String {
    if path.is_empty() {
        String::new()
    } else {
        format!("{path}: ")
    }
}

type Validation<T> = Result<T, SchemaValidationError>;

/// Narrow raw model output to its JSON payload.
///
/// In order of preference: the trimmed interior of the first fenced code
/// block (optionally tagged `json`) when it is non-empty; the span from the
/// first `{` to the last `}` when the closing brace comes after the opening
/// one; otherwise the trimmed text. Never fails.
///
/// # Examples
///
/// ```
/// use prscope_review::schema::extract_json;
///
/// assert_eq!(extract_json("```json\n{\"a\":1}\n```"), "{\"a\":1}");
/// assert_eq!(extract_json("Here you go: {\"a\":1} thanks"), "{\"a\":1}");
/// assert_eq!(extract_json("  no json here  "), "no json here");
/// ```
pub fn extract_json(raw: &str) -> &str {
    if let Some(inner) = fenced_block(raw) {
        return inner;
    }
    if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) {
        if end > start {
            return &raw[start..=end];
        }
    }
    raw.trim()
}

fn fenced_block(raw: &str) -> Option<&str> {
    let open = raw.find("```")?;
    let rest = &raw[open + 3..];
    let rest = rest.strip_prefix("json").unwrap_or(rest).trim_start();
    let close = rest.find("```")?;
    let inner = rest[..close].trim();
    (!inner.is_empty()).then_some(inner)
}

/// Extract, parse, and validate raw model output.
///
/// A payload that is not JSON at all is reported as a validation error at
/// the document root carrying the parser's message.
///
/// # Examples
///
/// ```
/// use prscope_core::RiskLevel;
/// use prscope_review::schema::parse_review_text;
///
/// let raw = "```json\n{\"summary\":\"Looks fine\",\"overall_risk\":\"low\",\"findings\":[],\"praise\":[]}\n```";
/// let result = parse_review_text(raw).unwrap();
/// assert_eq!(result.overall_risk, RiskLevel::Low);
///
/// assert!(parse_review_text("not json").is_err());
/// ```
pub fn parse_review_text(raw: &str) -> Validation<ReviewResult> {
    let payload = extract_json(raw);
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| SchemaValidationError::new("", format!("response is not valid JSON: {e}")))?;
    parse_review_result(&value)
}

/// Validate a parsed JSON value against the review schema.
///
/// Unknown keys are ignored. `line` must be present and either `null` or an
/// integer; an integral float such as `12.0` counts as an integer, while a
/// fractional one such as `4.5` is rejected. `suggestion` may be omitted and
/// then defaults to `""`.
pub fn parse_review_result(value: &Value) -> Validation<ReviewResult> {
    let root = object(value, "")?;

    let summary = non_empty_string(required(root, "", "summary")?, "summary")?;
    let overall_risk: RiskLevel =
        enumeration(required(root, "", "overall_risk")?, "overall_risk", RISK_VALUES)?;

    let findings = array(required(root, "", "findings")?, "findings")?
        .iter()
        .enumerate()
        .map(|(i, item)| finding(item, &format!("findings[{i}]")))
        .collect::<Validation<Vec<_>>>()?;

    let praise = array(required(root, "", "praise")?, "praise")?
        .iter()
        .enumerate()
        .map(|(i, item)| string(item, &format!("praise[{i}]")).map(str::to_string))
        .collect::<Validation<Vec<_>>>()?;

    Ok(ReviewResult {
        summary: summary.to_string(),
        overall_risk,
        findings,
        praise,
    })
}

fn finding(value: &Value, path: &str) -> Validation<Finding> {
    let obj = object(value, path)?;
    let at = |key: &str| join(path, key);

    let file = string(required(obj, path, "file")?, &at("file"))?;
    let line = line_number(required(obj, path, "line")?, &at("line"))?;
    let severity: Severity = enumeration(required(obj, path, "severity")?, &at("severity"), SEVERITY_VALUES)?;
    let category: Category = enumeration(required(obj, path, "category")?, &at("category"), CATEGORY_VALUES)?;
    let title = non_empty_string(required(obj, path, "title")?, &at("title"))?;
    let message = non_empty_string(required(obj, path, "message")?, &at("message"))?;
    let suggestion = match obj.get("suggestion") {
        Some(v) => string(v, &at("suggestion"))?,
        None => "",
    };
    let confidence = number(required(obj, path, "confidence")?, &at("confidence"))?;
    if !(0.0..=1.0).contains(&confidence) {
        return Err(SchemaValidationError::new(
            at("confidence"),
            format!("must be between 0 and 1, received {confidence}"),
        ));
    }

    Ok(Finding {
        file: file.to_string(),
        line,
        severity,
        category,
        title: title.to_string(),
        message: message.to_string(),
        suggestion: suggestion.to_string(),
        confidence,
    })
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn mismatch(path: &str, expected: &str, value: &Value) -> SchemaValidationError {
    SchemaValidationError::new(path, format!("expected {expected}, received {}", kind(value)))
}

fn required<'a>(obj: &'a Map<String, Value>, path: &str, key: &str) -> Validation<&'a Value> {
    obj.get(key)
        .ok_or_else(|| SchemaValidationError::new(join(path, key), "required"))
}

fn object<'a>(value: &'a Value, path: &str) -> Validation<&'a Map<String, Value>> {
    value.as_object().ok_or_else(|| mismatch(path, "object", value))
}

fn array<'a>(value: &'a Value, path: &str) -> Validation<&'a Vec<Value>> {
    value.as_array().ok_or_else(|| mismatch(path, "array", value))
}

fn string<'a>(value: &'a Value, path: &str) -> Validation<&'a str> {
    value.as_str().ok_or_else(|| mismatch(path, "string", value))
}

fn non_empty_string<'a>(value: &'a Value, path: &str) -> Validation<&'a str> {
    let s = string(value, path)?;
    if s.is_empty() {
        return Err(SchemaValidationError::new(path, "must not be empty"));
    }
    Ok(s)
}

fn number(value: &Value, path: &str) -> Validation<f64> {
    value.as_f64().ok_or_else(|| mismatch(path, "number", value))
}

fn line_number(value: &Value, path: &str) -> Validation<Option<i64>> {
    if value.is_null() {
        return Ok(None);
    }
    if let Some(n) = value.as_i64() {
        return Ok(Some(n));
    }
    let n = number(value, path)?;
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        return Ok(Some(n as i64));
    }
    Err(SchemaValidationError::new(
        path,
        format!("expected integer or null, received {n}"),
    ))
}

fn enumeration<T: FromStr>(value: &Value, path: &str, allowed: &[&str]) -> Validation<T> {
    let s = string(value, path)?;
    s.parse().map_err(|_| {
        SchemaValidationError::new(
            path,
            format!("expected one of {}, received {value}", allowed.join(" | ")),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_finding() -> Value {
        json!({
            "file": "src/auth.ts",
            "line": 42,
            "severity": "high",
            "category": "security",
            "title": "Token logged",
            "message": "The bearer token is written to the log.",
            "suggestion": "Redact the token.",
            "confidence": 0.92
        })
    }

    fn valid_result() -> Value {
        json!({
            "summary": "Adds login flow.",
            "overall_risk": "medium",
            "findings": [valid_finding()],
            "praise": ["Good test coverage"]
        })
    }

    fn with_finding_field(key: &str, value: Value) -> Value {
        let mut result = valid_result();
        result["findings"][0][key] = value;
        result
    }

    fn without_finding_field(key: &str) -> Value {
        let mut result = valid_result();
        result["findings"][0].as_object_mut().unwrap().remove(key);
        result
    }

    // extract_json

    #[test]
    fn extract_prefers_fenced_block() {
        let raw = "Sure!\n```json\n  {\"summary\": \"x\"}  \n```\nAnything else?";
        assert_eq!(extract_json(raw), "{\"summary\": \"x\"}");
    }

    #[test]
    fn extract_untagged_fence() {
        assert_eq!(extract_json("```\n{\"a\": 2}\n```"), "{\"a\": 2}");
    }

    #[test]
    fn extract_uses_first_fence() {
        let raw = "```json\n{\"first\":1}\n```\n```json\n{\"second\":2}\n```";
        assert_eq!(extract_json(raw), "{\"first\":1}");
    }

    #[test]
    fn empty_fence_falls_back_to_braces() {
        let raw = "``` ``` then {\"a\":1}";
        assert_eq!(extract_json(raw), "{\"a\":1}");
    }

    #[test]
    fn extract_brace_span_is_first_to_last() {
        let raw = "prefix {\"a\": {\"b\": 1}} suffix }";
        assert_eq!(extract_json(raw), "{\"a\": {\"b\": 1}} suffix }");
    }

    #[test]
    fn extract_braces_in_wrong_order_falls_back_to_trim() {
        assert_eq!(extract_json("  } nothing {  "), "} nothing {");
    }

    #[test]
    fn extract_plain_json_is_unchanged() {
        let raw = "{\"a\":1}";
        assert_eq!(extract_json(raw), raw);
    }

    // parse_review_result

    #[test]
    fn valid_result_parses() {
        let result = parse_review_result(&valid_result()).unwrap();
        assert_eq!(result.summary, "Adds login flow.");
        assert_eq!(result.overall_risk, RiskLevel::Medium);
        assert_eq!(result.findings.len(), 1);
        let f = &result.findings[0];
        assert_eq!(f.line, Some(42));
        assert_eq!(f.severity, Severity::High);
        assert_eq!(f.category, Category::Security);
        assert_eq!(f.suggestion, "Redact the token.");
        assert_eq!(result.praise, vec!["Good test coverage".to_string()]);
    }

    #[test]
    fn findings_keep_model_order() {
        let mut result = valid_result();
        let mut low = valid_finding();
        low["severity"] = json!("low");
        low["title"] = json!("Minor");
        result["findings"] = json!([low, valid_finding()]);
        let parsed = parse_review_result(&result).unwrap();
        assert_eq!(parsed.findings[0].severity, Severity::Low);
        assert_eq!(parsed.findings[1].severity, Severity::High);
    }

    #[test]
    fn rejects_non_object() {
        let err = parse_review_result(&json!([1, 2])).unwrap_err();
        assert_eq!(err.path, "");
        assert_eq!(err.to_string(), "expected object, received array");
    }

    #[test]
    fn rejects_unknown_risk() {
        let mut result = valid_result();
        result["overall_risk"] = json!("critical");
        let err = parse_review_result(&result).unwrap_err();
        assert_eq!(err.path, "overall_risk");
        assert!(err.message.contains("low | medium | high"));
    }

    #[test]
    fn rejects_unknown_severity_with_path() {
        let err = parse_review_result(&with_finding_field("severity", json!("critical"))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "findings[0].severity: expected one of low | medium | high, received \"critical\""
        );
    }

    #[test]
    fn enumerations_are_case_sensitive() {
        assert!(parse_review_result(&with_finding_field("category", json!("Bug"))).is_err());
    }

    #[test]
    fn rejects_out_of_range_confidence() {
        for bad in [json!(1.5), json!(-0.1)] {
            let err = parse_review_result(&with_finding_field("confidence", bad)).unwrap_err();
            assert_eq!(err.path, "findings[0].confidence");
        }
        assert!(parse_review_result(&with_finding_field("confidence", json!(0))).is_ok());
        assert!(parse_review_result(&with_finding_field("confidence", json!(1))).is_ok());
    }

    #[test]
    fn rejects_string_confidence() {
        let err = parse_review_result(&with_finding_field("confidence", json!("0.9"))).unwrap_err();
        assert_eq!(err.message, "expected number, received string");
    }

    #[test]
    fn rejects_empty_title_and_message() {
        for key in ["title", "message"] {
            let err = parse_review_result(&with_finding_field(key, json!(""))).unwrap_err();
            assert_eq!(err.path, format!("findings[0].{key}"));
        }
    }

    #[test]
    fn empty_file_is_allowed() {
        let result = parse_review_result(&with_finding_field("file", json!(""))).unwrap();
        assert_eq!(result.findings[0].file, "");
    }

    #[test]
    fn null_line_is_allowed() {
        let result = parse_review_result(&with_finding_field("line", Value::Null)).unwrap();
        assert_eq!(result.findings[0].line, None);
    }

    #[test]
    fn integral_float_line_is_accepted() {
        let result = parse_review_result(&with_finding_field("line", json!(12.0))).unwrap();
        assert_eq!(result.findings[0].line, Some(12));
    }

    #[test]
    fn fractional_or_string_line_is_rejected() {
        assert!(parse_review_result(&with_finding_field("line", json!(1.5))).is_err());
        assert!(parse_review_result(&with_finding_field("line", json!("42"))).is_err());
    }

    #[test]
    fn missing_line_is_rejected() {
        let err = parse_review_result(&without_finding_field("line")).unwrap_err();
        assert_eq!(err.to_string(), "findings[0].line: required");
    }

    #[test]
    fn missing_suggestion_defaults_to_empty() {
        let result = parse_review_result(&without_finding_field("suggestion")).unwrap();
        assert_eq!(result.findings[0].suggestion, "");
    }

    #[test]
    fn null_suggestion_is_rejected() {
        assert!(parse_review_result(&with_finding_field("suggestion", Value::Null)).is_err());
    }

    #[test]
    fn missing_praise_is_rejected() {
        let mut result = valid_result();
        result.as_object_mut().unwrap().remove("praise");
        let err = parse_review_result(&result).unwrap_err();
        assert_eq!(err.path, "praise");
    }

    #[test]
    fn praise_items_must_be_strings() {
        let mut result = valid_result();
        result["praise"] = json!(["ok", 3]);
        let err = parse_review_result(&result).unwrap_err();
        assert_eq!(err.path, "praise[1]");
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let mut result = valid_result();
        result["model_notes"] = json!("ignored");
        result["findings"][0]["extra"] = json!(true);
        assert!(parse_review_result(&result).is_ok());
    }

    // parse_review_text

    #[test]
    fn parse_text_through_prose() {
        let raw = format!("Here is my review:\n{}\nLet me know!", valid_result());
        let result = parse_review_text(&raw).unwrap();
        assert_eq!(result.findings.len(), 1);
    }

    #[test]
    fn invalid_json_becomes_validation_error() {
        let err = parse_review_text("I could not review this PR.").unwrap_err();
        assert_eq!(err.path, "");
        assert!(err.message.starts_with("response is not valid JSON"));
    }

    #[test]
    fn empty_findings_is_valid() {
        let raw = r#"{"summary":"Clean.","overall_risk":"low","findings":[],"praise":[]}"#;
        let result = parse_review_text(raw).unwrap();
        assert!(result.findings.is_empty());
        assert!(result.praise.is_empty());
    }
}
