use std::collections::HashMap;

use prscope_core::{ChangedFile, FileStatus};

/// The hunk portion of one file in a multi-file unified diff.
///
/// # Examples
///
/// ```
/// use prscope_difflens::parser::split_unified_diff;
///
/// let diff = "diff --git a/hello.rs b/hello.rs\n\
///             --- a/hello.rs\n\
///             +++ b/hello.rs\n\
///             @@ -1,3 +1,4 @@\n\
///              fn main() {\n\
///             +    println!(\"hello\");\n\
///              }\n";
/// let files = split_unified_diff(diff);
/// assert_eq!(files.len(), 1);
/// assert_eq!(files[0].path, "hello.rs");
/// assert!(files[0].patch.starts_with("@@ -1,3 +1,4 @@"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePatch {
    /// Path in the new version, or the old path for deletions.
    pub path: String,
    /// Inferred from the extended headers and `/dev/null` sides.
    pub status: FileStatus,
    /// Everything from the first `@@` header on, without a trailing newline.
    pub patch: String,
    pub additions: u32,
    pub deletions: u32,
}

impl FilePatch {
    /// Shape this patch like a file from the pull request files API.
    pub fn into_changed_file(self) -> ChangedFile {
        ChangedFile {
            filename: self.path,
            status: self.status,
            patch: Some(self.patch),
            additions: self.additions,
            deletions: self.deletions,
            content_hash: String::new(),
        }
    }
}

/// Split a unified diff (as returned by `git diff` or the GitHub diff media
/// type) into per-file hunk text.
///
/// The patch text has the same shape as the `patch` field GitHub attaches to
/// each changed file: headers are dropped and the hunks are kept verbatim.
/// Sections with no hunks (binary files, pure renames, mode changes) are
/// omitted.
///
/// # Examples
///
/// ```
/// use prscope_difflens::parser::split_unified_diff;
///
/// assert!(split_unified_diff("").is_empty());
/// ```
pub fn split_unified_diff(input: &str) -> Vec<FilePatch> {
    let mut files = Vec::new();
    let mut current: Option<Section> = None;

    for line in input.lines() {
        if let Some(header) = line.strip_prefix("diff --git ") {
            if let Some(section) = current.take() {
                section.finish_into(&mut files);
            }
            current = Some(Section::new(path_from_header(header)));
            continue;
        }

        // A plain single-file patch has no `diff --git` line.
        if line.starts_with("--- ") && current.is_none() {
            current = Some(Section::new(None));
        }

        let Some(section) = current.as_mut() else {
            continue;
        };

        if section.in_hunks {
            if line.starts_with('+') {
                section.additions += 1;
            } else if line.starts_with('-') {
                section.deletions += 1;
            }
            section.lines.push(line);
            continue;
        }

        if line.starts_with("@@") {
            section.in_hunks = true;
            section.lines.push(line);
        } else if let Some(path) = line.strip_prefix("--- ") {
            section.old_path = parse_path(path);
            section.old_missing = section.old_path.is_none();
        } else if let Some(path) = line.strip_prefix("+++ ") {
            section.new_path = parse_path(path);
            section.new_missing = section.new_path.is_none();
        } else if line.starts_with("new file mode") {
            section.status = Some(FileStatus::Added);
        } else if line.starts_with("deleted file mode") {
            section.status = Some(FileStatus::Removed);
        } else if line.starts_with("rename from ") {
            section.status = Some(FileStatus::Renamed);
        }
    }

    if let Some(section) = current.take() {
        section.finish_into(&mut files);
    }
    files
}

/// [`split_unified_diff`] keyed by path. Later sections win on duplicates.
pub fn patches_by_path(input: &str) -> HashMap<String, String> {
    split_unified_diff(input)
        .into_iter()
        .map(|f| (f.path, f.patch))
        .collect()
}

#[derive(Debug)]
struct Section<'a> {
    header_path: Option<String>,
    old_path: Option<String>,
    new_path: Option<String>,
    old_missing: bool,
    new_missing: bool,
    status: Option<FileStatus>,
    in_hunks: bool,
    lines: Vec<&'a str>,
    additions: u32,
    deletions: u32,
}

impl<'a> Section<'a> {
    fn new(header_path: Option<String>) -> Self {
        Self {
            header_path,
            old_path: None,
            new_path: None,
            old_missing: false,
            new_missing: false,
            status: None,
            in_hunks: false,
            lines: Vec::new(),
            additions: 0,
            deletions: 0,
        }
    }

    fn finish_into(self, files: &mut Vec<FilePatch>) {
        if self.lines.is_empty() {
            return;
        }
        let status = self.status.unwrap_or(if self.old_missing {
            FileStatus::Added
        } else if self.new_missing {
            FileStatus::Removed
        } else {
            FileStatus::Modified
        });
        let Some(path) = self.new_path.or(self.old_path).or(self.header_path) else {
            return;
        };
        files.push(FilePatch {
            path,
            status,
            patch: self.lines.join("\n"),
            additions: self.additions,
            deletions: self.deletions,
        });
    }
}

/// `None` for `/dev/null`.
fn parse_path(raw: &str) -> Option<String> {
    // Git appends a tab and timestamp in some modes.
    let raw = raw.split('\t').next().unwrap_or(raw);
    let normalized = raw.trim_matches('"');
    if normalized == "/dev/null" {
        return None;
    }
    let stripped = normalized
        .strip_prefix("a/")
        .or_else(|| normalized.strip_prefix("b/"))
        .unwrap_or(normalized);
    Some(stripped.to_string())
}

/// Take the `b/` side of `a/<old> b/<new>`.
fn path_from_header(header: &str) -> Option<String> {
    let idx = header.rfind(" b/")?;
    Some(header[idx + 3..].trim_matches('"').to_string())
}
