use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Hidden marker embedded in every rendered comment.
///
/// The comment sink uses it to find and update the previous PRScope comment
/// instead of posting a new one on every run.
pub const COMMENT_MARKER: &str = "<!-- prscope:review -->";

/// Config file names searched, in order, by [`crate::PrscopeConfig::discover`].
pub const CONFIG_FILENAMES: [&str; 3] = ["prscope.config.json", ".prscopeRC.json", ".prscope.toml"];

/// Default maximum number of files sent to the model.
pub const DEFAULT_MAX_FILES: usize = 30;

/// Default total diff byte budget across all files.
pub const DEFAULT_MAX_DIFF_BYTES: usize = 100_000;

/// Status of a file in a pull request, as reported by the code host.
///
/// # Examples
///
/// ```
/// use prscope_core::FileStatus;
///
/// let status: FileStatus = "renamed".parse().unwrap();
/// assert_eq!(status, FileStatus::Renamed);
/// assert_eq!(status.to_string(), "renamed");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Modified,
    Removed,
    Renamed,
    Copied,
    Changed,
    Unchanged,
}

impl FileStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FileStatus::Added => "added",
            FileStatus::Modified => "modified",
            FileStatus::Removed => "removed",
            FileStatus::Renamed => "renamed",
            FileStatus::Copied => "copied",
            FileStatus::Changed => "changed",
            FileStatus::Unchanged => "unchanged",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "added" => Ok(FileStatus::Added),
            "modified" => Ok(FileStatus::Modified),
            "removed" => Ok(FileStatus::Removed),
            "renamed" => Ok(FileStatus::Renamed),
            "copied" => Ok(FileStatus::Copied),
            "changed" => Ok(FileStatus::Changed),
            "unchanged" => Ok(FileStatus::Unchanged),
            other => Err(format!("unknown file status: {other}")),
        }
    }
}

/// One file entry from a pull request diff.
///
/// `patch` is `None` when the code host could not provide a diff (binary or
/// oversized files). The review pipeline only reads these values and derives
/// truncated copies; it never mutates them.
///
/// # Examples
///
/// ```
/// use prscope_core::{ChangedFile, FileStatus};
///
/// let file = ChangedFile {
///     filename: "src/lib.rs".into(),
///     status: FileStatus::Modified,
///     patch: Some("@@ -1 +1 @@\n-old\n+new".into()),
///     additions: 1,
///     deletions: 1,
///     content_hash: "abc123".into(),
/// };
/// assert!(file.patch.is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    /// Path relative to the repository root.
    pub filename: String,
    /// Change status reported by the code host.
    pub status: FileStatus,
    /// Unified diff hunks for this file, if available.
    #[serde(default)]
    pub patch: Option<String>,
    /// Number of added lines.
    #[serde(default)]
    pub additions: u32,
    /// Number of deleted lines.
    #[serde(default)]
    pub deletions: u32,
    /// Blob SHA of the new file content.
    #[serde(rename = "sha", default)]
    pub content_hash: String,
}

/// Review emphasis injected into the system prompt.
///
/// Exactly one profile is active per review. Unknown names are rejected when
/// the configuration is parsed.
///
/// # Examples
///
/// ```
/// use prscope_core::ReviewProfile;
///
/// let profile: ReviewProfile = "security".parse().unwrap();
/// assert_eq!(profile, ReviewProfile::Security);
/// assert!("paranoid".parse::<ReviewProfile>().is_err());
/// assert_eq!(ReviewProfile::default(), ReviewProfile::Balanced);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewProfile {
    /// Bugs, security, performance, and quality with practical weighting.
    #[default]
    Balanced,
    /// Security first, lighter on style.
    Security,
    /// Performance regressions and inefficiency first.
    Performance,
    /// Maximum scrutiny.
    Strict,
}

impl ReviewProfile {
    /// Every profile, in declaration order.
    pub const ALL: [ReviewProfile; 4] = [
        ReviewProfile::Balanced,
        ReviewProfile::Security,
        ReviewProfile::Performance,
        ReviewProfile::Strict,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReviewProfile::Balanced => "balanced",
            ReviewProfile::Security => "security",
            ReviewProfile::Performance => "performance",
            ReviewProfile::Strict => "strict",
        }
    }
}

impl fmt::Display for ReviewProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "balanced" => Ok(ReviewProfile::Balanced),
            "security" => Ok(ReviewProfile::Security),
            "performance" => Ok(ReviewProfile::Performance),
            "strict" => Ok(ReviewProfile::Strict),
            other => Err(format!(
                "unknown review profile: {other} (expected balanced, security, performance, or strict)"
            )),
        }
    }
}

/// Model provider backing the chat client.
///
/// # Examples
///
/// ```
/// use prscope_core::ProviderKind;
///
/// let kind: ProviderKind = "openai-compat".parse().unwrap();
/// assert_eq!(kind, ProviderKind::OpenAiCompat);
/// assert_eq!(serde_json::to_string(&kind).unwrap(), "\"openai-compat\"");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "openai-compat")]
    OpenAiCompat,
    #[serde(rename = "ollama")]
    Ollama,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::OpenAiCompat => "openai-compat",
            ProviderKind::Ollama => "ollama",
        }
    }

    /// Whether the provider refuses requests without an API key.
    pub fn requires_api_key(self) -> bool {
        matches!(self, ProviderKind::OpenAi | ProviderKind::Anthropic)
    }

    /// Conventional environment variable for the provider's credential.
    ///
    /// For Ollama this is the host variable, since it takes no key.
    pub fn default_api_key_env(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::OpenAiCompat => "LLM_API_KEY",
            ProviderKind::Ollama => "OLLAMA_HOST",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(ProviderKind::OpenAi),
            "anthropic" => Ok(ProviderKind::Anthropic),
            "openai-compat" => Ok(ProviderKind::OpenAiCompat),
            "ollama" => Ok(ProviderKind::Ollama),
            other => Err(format!(
                "unknown provider: {other} (expected openai, anthropic, openai-compat, or ollama)"
            )),
        }
    }
}

/// How review output is delivered to the pull request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommentMode {
    /// One summary comment.
    #[default]
    #[serde(rename = "summary-only")]
    SummaryOnly,
    /// Summary comment plus line comments for located findings.
    #[serde(rename = "inline+summary")]
    InlineAndSummary,
}

impl CommentMode {
    pub fn as_str(self) -> &'static str {
        match self {
            CommentMode::SummaryOnly => "summary-only",
            CommentMode::InlineAndSummary => "inline+summary",
        }
    }
}

impl fmt::Display for CommentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "summary-only" => Ok(CommentMode::SummaryOnly),
            "inline+summary" => Ok(CommentMode::InlineAndSummary),
            other => Err(format!(
                "unknown comment mode: {other} (expected summary-only or inline+summary)"
            )),
        }
    }
}

/// Severity of a single finding.
///
/// Parsing is exact: the model must emit one of the schema tokens.
///
/// # Examples
///
/// ```
/// use prscope_core::Severity;
///
/// assert_eq!("high".parse::<Severity>().unwrap(), Severity::High);
/// assert!("critical".parse::<Severity>().is_err());
/// assert!("High".parse::<Severity>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }

    /// Display rank, most severe first.
    ///
    /// # Examples
    ///
    /// ```
    /// use prscope_core::Severity;
    ///
    /// assert!(Severity::High.rank() < Severity::Low.rank());
    /// ```
    pub fn rank(self) -> u8 {
        match self {
            Severity::High => 0,
            Severity::Medium => 1,
            Severity::Low => 2,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// Overall risk of merging the pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            other => Err(format!("unknown risk level: {other}")),
        }
    }
}

/// Kind of problem a finding describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Bug,
    Security,
    Performance,
    Maintainability,
    Dx,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Bug => "bug",
            Category::Security => "security",
            Category::Performance => "performance",
            Category::Maintainability => "maintainability",
            Category::Dx => "dx",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bug" => Ok(Category::Bug),
            "security" => Ok(Category::Security),
            "performance" => Ok(Category::Performance),
            "maintainability" => Ok(Category::Maintainability),
            "dx" => Ok(Category::Dx),
            other => Err(format!("unknown category: {other}")),
        }
    }
}

/// A single issue reported by the reviewer.
///
/// Only produced by validating model output, except in tests.
///
/// # Examples
///
/// ```
/// use prscope_core::{Category, Finding, Severity};
///
/// let finding = Finding {
///     file: "src/auth.rs".into(),
///     line: Some(42),
///     severity: Severity::High,
///     category: Category::Security,
///     title: "Token logged in plaintext".into(),
///     message: "The bearer token is written to the debug log.".into(),
///     suggestion: String::new(),
///     confidence: 0.93,
/// };
/// assert_eq!(finding.location(), "src/auth.rs:42");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    /// Path of the file the finding refers to.
    pub file: String,
    /// Line in the new version of the file, when the reviewer gave one.
    pub line: Option<i64>,
    pub severity: Severity,
    pub category: Category,
    /// Short title.
    pub title: String,
    /// Detailed explanation.
    pub message: String,
    /// Suggested fix; empty when none was given.
    pub suggestion: String,
    /// Reviewer self-rated confidence in `[0, 1]`.
    pub confidence: f64,
}

impl Finding {
    /// `file:line`, or just `file` when no positive line is known.
    pub fn location(&self) -> String {
        match self.line {
            Some(line) if line > 0 => format!("{}:{line}", self.file),
            _ => self.file.clone(),
        }
    }
}

/// The structured review verdict rendered into the PR comment.
///
/// `findings` keep the reviewer's order; any severity sorting happens when
/// rendering.
///
/// # Examples
///
/// ```
/// use prscope_core::{ReviewResult, RiskLevel};
///
/// let result = ReviewResult::empty("Nothing to review.");
/// assert_eq!(result.overall_risk, RiskLevel::Low);
/// assert!(result.findings.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewResult {
    pub summary: String,
    pub overall_risk: RiskLevel,
    pub findings: Vec<Finding>,
    pub praise: Vec<String>,
}

impl ReviewResult {
    /// A low-risk result with no findings and no praise.
    pub fn empty(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            overall_risk: RiskLevel::Low,
            findings: Vec::new(),
            praise: Vec::new(),
        }
    }
}

/// Output format for CLI subcommands.
///
/// # Examples
///
/// ```
/// use prscope_core::OutputFormat;
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summary.
    #[default]
    Text,
    /// Machine-readable JSON.
    Json,
    /// The rendered PR comment.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
