//! Noise filtering by filename.
//!
//! Lockfiles, build output, vendored dependencies, minified bundles, source
//! maps, snapshots, generated code, and binary assets rarely benefit from a
//! review and burn the byte budget. Classification looks at the path only,
//! never at content, and is case-sensitive.

use std::fmt;

use prscope_core::{ChangedFile, PrscopeConfig};
use serde::Serialize;

/// Why a filename counts as noise.
///
/// # Examples
///
/// ```
/// use prscope_difflens::filter::{classify, NoiseKind};
///
/// assert_eq!(classify("yarn.lock"), Some(NoiseKind::LockFile));
/// assert_eq!(NoiseKind::LockFile.to_string(), "lock file");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NoiseKind {
    /// Package manager lock file.
    LockFile,
    /// Anything under `dist/` or `build/`.
    BuildOutput,
    /// Anything under `vendor/` or `node_modules/`.
    VendoredCode,
    /// Minified JS or CSS bundle.
    MinifiedFile,
    /// Source map.
    SourceMap,
    /// Test snapshot.
    Snapshot,
    /// Generated or protobuf output.
    GeneratedFile,
    /// Image or font.
    BinaryAsset,
}

impl fmt::Display for NoiseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoiseKind::LockFile => write!(f, "lock file"),
            NoiseKind::BuildOutput => write!(f, "build output"),
            NoiseKind::VendoredCode => write!(f, "vendored code"),
            NoiseKind::MinifiedFile => write!(f, "minified file"),
            NoiseKind::SourceMap => write!(f, "source map"),
            NoiseKind::Snapshot => write!(f, "snapshot"),
            NoiseKind::GeneratedFile => write!(f, "generated file"),
            NoiseKind::BinaryAsset => write!(f, "binary asset"),
        }
    }
}

const LOCK_FILE_SUFFIXES: &[&str] = &["package-lock.json", "pnpm-lock.yaml", "yarn.lock", ".lock"];

const BUILD_DIRS: &[&str] = &["dist/", "build/"];

const VENDOR_DIRS: &[&str] = &["vendor/", "node_modules/"];

const MINIFIED_SUFFIXES: &[&str] = &[".min.js", ".min.css"];

const GENERATED_MARKER: &str = ".generated.";

const GENERATED_SUFFIXES: &[&str] = &[".g.ts", ".g.dart", ".g.cs", ".pb.go", ".pb.ts", ".pb.js"];

const BINARY_SUFFIXES: &[&str] = &[
    ".svg", ".ico", ".woff", ".woff2", ".ttf", ".eot", ".png", ".jpg", ".jpeg", ".gif", ".webp",
    ".avif",
];

/// Classify a filename, returning why it is noise or `None` if it should be reviewed.
///
/// Directory markers match anywhere in the path, so `dist/app.js` and
/// `packages/web/dist/app.js` are both build output.
///
/// # Examples
///
/// ```
/// use prscope_difflens::filter::{classify, NoiseKind};
///
/// assert_eq!(classify("packages/web/dist/app.js"), Some(NoiseKind::BuildOutput));
/// assert_eq!(classify("src/index.ts"), None);
/// ```
pub fn classify(filename: &str) -> Option<NoiseKind> {
    let ends_with_any = |suffixes: &[&str]| suffixes.iter().any(|s| filename.ends_with(s));
    let contains_any = |needles: &[&str]| needles.iter().any(|n| filename.contains(n));

    if ends_with_any(LOCK_FILE_SUFFIXES) {
        return Some(NoiseKind::LockFile);
    }
    if contains_any(BUILD_DIRS) {
        return Some(NoiseKind::BuildOutput);
    }
    if contains_any(VENDOR_DIRS) {
        return Some(NoiseKind::VendoredCode);
    }
    if ends_with_any(MINIFIED_SUFFIXES) {
        return Some(NoiseKind::MinifiedFile);
    }
    if filename.ends_with(".map") {
        return Some(NoiseKind::SourceMap);
    }
    if filename.ends_with(".snap") {
        return Some(NoiseKind::Snapshot);
    }
    if filename.contains(GENERATED_MARKER) || ends_with_any(GENERATED_SUFFIXES) {
        return Some(NoiseKind::GeneratedFile);
    }
    if ends_with_any(BINARY_SUFFIXES) {
        return Some(NoiseKind::BinaryAsset);
    }
    None
}

/// Whether a changed file is not worth sending to the model.
///
/// # Examples
///
/// ```
/// use prscope_difflens::filter::is_noise;
///
/// assert!(is_noise("package-lock.json"));
/// assert!(is_noise("assets/logo.png"));
/// assert!(!is_noise("README.md"));
/// ```
pub fn is_noise(filename: &str) -> bool {
    classify(filename).is_some()
}

/// Built-in noise classification plus user-configured glob patterns.
///
/// # Examples
///
/// ```
/// use prscope_difflens::filter::DiffFilter;
///
/// let filter = DiffFilter::with_patterns(["fixtures/**"]);
/// assert!(filter.should_skip("fixtures/users.json"));
/// assert!(filter.should_skip("yarn.lock"));
/// assert!(!filter.should_skip("src/users.rs"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct DiffFilter {
    skip_patterns: Vec<glob::Pattern>,
}

impl DiffFilter {
    /// A filter that applies only the built-in noise rules.
    pub fn default_filter() -> Self {
        Self::default()
    }

    /// A filter with extra glob patterns. Invalid patterns are ignored.
    pub fn with_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let skip_patterns = patterns
            .into_iter()
            .filter_map(|p| glob::Pattern::new(p.as_ref()).ok())
            .collect();
        Self { skip_patterns }
    }

    /// Build a filter from the config's `skipPatterns`.
    pub fn from_config(config: &PrscopeConfig) -> Self {
        Self::with_patterns(&config.skip_patterns)
    }

    /// Why `filename` is skipped, or `None` if it should be reviewed.
    pub fn skip_reason(&self, filename: &str) -> Option<SkipReason> {
        if let Some(kind) = classify(filename) {
            return Some(SkipReason::Noise(kind));
        }
        self.skip_patterns
            .iter()
            .find(|p| p.matches(filename))
            .map(|p| SkipReason::PatternMatch(p.to_string()))
    }

    /// Whether `filename` is skipped.
    pub fn should_skip(&self, filename: &str) -> bool {
        self.skip_reason(filename).is_some()
    }

    /// Split files into reviewable ones (in original order) and skipped ones.
    pub fn partition<'a>(&self, files: &'a [ChangedFile]) -> FilterResult<'a> {
        let mut kept = Vec::new();
        let mut skipped = Vec::new();

        for file in files {
            match self.skip_reason(&file.filename) {
                Some(reason) => skipped.push(SkippedFile {
                    filename: file.filename.clone(),
                    reason,
                }),
                None => kept.push(file),
            }
        }

        FilterResult { kept, skipped }
    }

    /// The first `max_files` reviewable files, in original order.
    ///
    /// # Examples
    ///
    /// ```
    /// use prscope_core::{ChangedFile, FileStatus};
    /// use prscope_difflens::filter::DiffFilter;
    ///
    /// let file = |name: &str| ChangedFile {
    ///     filename: name.into(),
    ///     status: FileStatus::Modified,
    ///     patch: None,
    ///     additions: 0,
    ///     deletions: 0,
    ///     content_hash: String::new(),
    /// };
    /// let files = vec![file("yarn.lock"), file("a.rs"), file("b.rs"), file("c.rs")];
    /// let selected = DiffFilter::default_filter().select(&files, 2);
    /// let names: Vec<&str> = selected.iter().map(|f| f.filename.as_str()).collect();
    /// assert_eq!(names, ["a.rs", "b.rs"]);
    /// ```
    pub fn select<'a>(&self, files: &'a [ChangedFile], max_files: usize) -> Vec<&'a ChangedFile> {
        files
            .iter()
            .filter(|f| !self.should_skip(&f.filename))
            .take(max_files)
            .collect()
    }
}

/// Result of partitioning changed files.
#[derive(Debug)]
pub struct FilterResult<'a> {
    /// Files that passed the filter, in original order.
    pub kept: Vec<&'a ChangedFile>,
    /// Files that were skipped, with reasons.
    pub skipped: Vec<SkippedFile>,
}

/// A file dropped before budgeting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedFile {
    pub filename: String,
    pub reason: SkipReason,
}

/// Reason a file was skipped.
///
/// # Examples
///
/// ```
/// use prscope_difflens::filter::{NoiseKind, SkipReason};
///
/// assert_eq!(SkipReason::Noise(NoiseKind::SourceMap).to_string(), "source map");
/// assert_eq!(SkipReason::PatternMatch("*.gen.rs".into()).to_string(), "pattern: *.gen.rs");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    /// Matched a built-in noise rule.
    Noise(NoiseKind),
    /// Matched a configured skip pattern.
    PatternMatch(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Noise(kind) => write!(f, "{kind}"),
            SkipReason::PatternMatch(pat) => write!(f, "pattern: {pat}"),
        }
    }
}
