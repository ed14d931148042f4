//! File-count and byte budgeting for the review prompt.
//!
//! The budget is split evenly across the selected files rather than in
//! proportion to patch size. That keeps the allocation deterministic and
//! cheap; a huge file next to many tiny ones is truncated harder than a
//! size-aware split would.

use std::borrow::Cow;

use prscope_core::{ChangedFile, FileStatus};
use serde::Serialize;

use crate::filter::{DiffFilter, SkippedFile};

/// Appended to every truncated patch.
pub const TRUNCATION_MARKER: &str = "\n... [TRUNCATED by PRScope — diff too large] ...\n";

/// Stands in for files whose patch the code host did not provide.
pub const PATCH_UNAVAILABLE: &str = "[context unavailable — binary or oversized diff]";

/// One file's diff, ready for prompt composition.
///
/// Created fresh per review run and dropped once the prompt is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedDiff {
    pub filename: String,
    pub status: FileStatus,
    pub additions: u32,
    pub deletions: u32,
    /// Patch text after placeholder substitution and truncation.
    pub patch: String,
    /// Whether the patch was cut to fit the per-file budget.
    pub truncated: bool,
}

/// Output of [`prepare`]: the diffs to review plus bookkeeping.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedDiffs {
    /// Prepared diffs in original file order.
    pub diffs: Vec<PreparedDiff>,
    /// Sum of the UTF-8 byte lengths of every prepared patch.
    pub total_bytes: usize,
    /// Files dropped by the noise filter or a skip pattern.
    pub skipped: Vec<SkippedFile>,
    /// Reviewable files dropped because the file limit was reached.
    pub over_limit: usize,
}

impl PreparedDiffs {
    /// `true` when no file survived selection.
    pub fn is_empty(&self) -> bool {
        self.diffs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diffs.len()
    }

    /// Number of diffs that were cut to fit the budget.
    pub fn truncated_count(&self) -> usize {
        self.diffs.iter().filter(|d| d.truncated).count()
    }
}

/// Drop noise files and keep the first `max_files` of the rest, in order.
///
/// # Examples
///
/// ```
/// use prscope_core::{ChangedFile, FileStatus};
/// use prscope_difflens::budget::select;
///
/// let file = |name: &str| ChangedFile {
///     filename: name.into(),
///     status: FileStatus::Added,
///     patch: None,
///     additions: 0,
///     deletions: 0,
///     content_hash: String::new(),
/// };
/// let files = vec![file("src/a.ts"), file("package-lock.json"), file("src/b.ts")];
/// assert_eq!(select(&files, 10).len(), 2);
/// ```
pub fn select(files: &[ChangedFile], max_files: usize) -> Vec<&ChangedFile> {
    DiffFilter::default_filter().select(files, max_files)
}

/// Cut `patch` to at most `max_bytes` bytes on a line boundary.
///
/// Within budget the patch is returned untouched. Otherwise the longest
/// UTF-8-valid prefix that fits is backed up to its last newline (the newline
/// is dropped; without an earlier newline the raw prefix is kept) and
/// [`TRUNCATION_MARKER`] is appended. A patch that already ends with the
/// marker and whose body fits is left alone, so truncating twice with the
/// same budget changes nothing.
///
/// # Examples
///
/// ```
/// use std::borrow::Cow;
/// use prscope_difflens::budget::{truncate_patch, TRUNCATION_MARKER};
///
/// assert!(matches!(truncate_patch("short", 100), Cow::Borrowed("short")));
///
/// let cut = truncate_patch("line1\nline2\nline3", 14);
/// assert_eq!(cut, format!("line1\nline2{TRUNCATION_MARKER}"));
/// assert_eq!(truncate_patch(&cut, 14), cut);
/// ```
pub fn truncate_patch(patch: &str, max_bytes: usize) -> Cow<'_, str> {
    if patch.len() <= max_bytes {
        return Cow::Borrowed(patch);
    }
    if let Some(body) = patch.strip_suffix(TRUNCATION_MARKER) {
        if body.len() <= max_bytes {
            return Cow::Borrowed(patch);
        }
    }

    let mut cut = max_bytes;
    while !patch.is_char_boundary(cut) {
        cut -= 1;
    }
    let prefix = &patch[..cut];
    let clean = match prefix.rfind('\n') {
        Some(idx) if idx > 0 => &prefix[..idx],
        _ => prefix,
    };

    let mut out = String::with_capacity(clean.len() + TRUNCATION_MARKER.len());
    out.push_str(clean);
    out.push_str(TRUNCATION_MARKER);
    Cow::Owned(out)
}

/// Select files with the built-in noise filter and fit them into the budget.
///
/// See [`prepare_filtered`].
///
/// # Examples
///
/// ```
/// use prscope_difflens::budget::prepare;
///
/// let prepared = prepare(&[], 30, 100_000);
/// assert!(prepared.is_empty());
/// assert_eq!(prepared.total_bytes, 0);
/// ```
pub fn prepare(files: &[ChangedFile], max_files: usize, max_total_bytes: usize) -> PreparedDiffs {
    prepare_filtered(&DiffFilter::default_filter(), files, max_files, max_total_bytes)
}

/// Select files with `filter` and fit them into `max_total_bytes`.
///
/// Each selected file gets `max_total_bytes / max(1, selected)` bytes. Files
/// without a patch get [`PATCH_UNAVAILABLE`], which is truncated like any
/// other patch. Zero selected files yields an empty result and zero bytes;
/// callers treat that as "nothing to review", not as an error.
pub fn prepare_filtered(
    filter: &DiffFilter,
    files: &[ChangedFile],
    max_files: usize,
    max_total_bytes: usize,
) -> PreparedDiffs {
    let partition = filter.partition(files);
    let reviewable = partition.kept.len();
    let selected: Vec<&ChangedFile> = partition.kept.into_iter().take(max_files).collect();
    let per_file_budget = max_total_bytes / selected.len().max(1);

    let mut total_bytes = 0;
    let diffs: Vec<PreparedDiff> = selected
        .iter()
        .map(|file| {
            let source = file.patch.as_deref().unwrap_or(PATCH_UNAVAILABLE);
            let patch = truncate_patch(source, per_file_budget);
            let truncated = matches!(patch, Cow::Owned(_));
            total_bytes += patch.len();
            PreparedDiff {
                filename: file.filename.clone(),
                status: file.status,
                additions: file.additions,
                deletions: file.deletions,
                patch: patch.into_owned(),
                truncated,
            }
        })
        .collect();

    PreparedDiffs {
        over_limit: reviewable - diffs.len(),
        diffs,
        total_bytes,
        skipped: partition.skipped,
    }
}
