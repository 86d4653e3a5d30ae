//! Unified diff parsing
//!
//! Reconstructs new-side line numbering from hunk headers. Only additions are
//! recorded as changed; deletions never advance the new-side counter.

use crate::error::{AnalysisError, AnalysisResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

static HUNK_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@")
        .unwrap_or_else(|e| panic!("hunk header regex: {e}"))
});

/// A single `@@` hunk
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Hunk {
    /// Old-side start line, as written in the header
    pub old_start: u32,
    /// Old-side line count
    pub old_len: u32,
    /// New-side start line, as written in the header
    pub new_start: u32,
    /// New-side line count
    pub new_len: u32,
    /// New-side numbers of `+` lines
    pub added_lines: Vec<u32>,
    /// Old-side numbers of `-` lines
    pub removed_lines: Vec<u32>,
}

/// Hunks belonging to one file
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileDiff {
    /// Path from the `---` header, prefix stripped
    pub old_path: Option<String>,
    /// Path from the `+++` header, prefix stripped
    pub new_path: Option<String>,
    /// Hunks in diff order
    pub hunks: Vec<Hunk>,
}

impl FileDiff {
    /// All added new-side lines across hunks
    #[must_use]
    pub fn added_lines(&self) -> BTreeSet<u32> {
        self.hunks
            .iter()
            .flat_map(|h| h.added_lines.iter().copied())
            .collect()
    }

    fn is_blank(&self) -> bool {
        self.old_path.is_none() && self.new_path.is_none() && self.hunks.is_empty()
    }
}

/// Parsed unified diff
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UnifiedDiff {
    /// Per-file sections
    pub files: Vec<FileDiff>,
}

impl UnifiedDiff {
    /// Parse unified diff text
    ///
    /// Text before the first hunk (commit headers, `index` lines) is ignored.
    /// A hunk ends when its declared counts are consumed, or early when the
    /// text ends or another header starts.
    ///
    /// # Errors
    /// - [`AnalysisError::MalformedHunkHeader`] for an unparseable `@@` line,
    ///   or one whose body runs past the largest line number
    /// - [`AnalysisError::HunkOverrun`] when a body exceeds its declared counts
    pub fn parse(text: &str) -> AnalysisResult<Self> {
        let lines: Vec<&str> = text.lines().collect();
        let mut files: Vec<FileDiff> = Vec::new();
        let mut current = FileDiff::default();
        let mut i = 0;

        while i < lines.len() {
            let line = lines[i];

            if line.starts_with("diff --git ") {
                if !current.is_blank() {
                    files.push(std::mem::take(&mut current));
                }
                i += 1;
            } else if let Some(path) = line.strip_prefix("--- ") {
                if !current.hunks.is_empty() || current.old_path.is_some() {
                    files.push(std::mem::take(&mut current));
                }
                current.old_path = Some(clean_header_path(path));
                i += 1;
            } else if let Some(path) = line.strip_prefix("+++ ") {
                current.new_path = Some(clean_header_path(path));
                i += 1;
            } else if line.starts_with("@@") {
                let (hunk, next) = parse_hunk(&lines, i)?;
                current.hunks.push(hunk);
                i = next;
            } else {
                i += 1;
            }
        }

        if !current.is_blank() {
            files.push(current);
        }

        Ok(Self { files })
    }

    /// Check if the diff holds no hunks at all
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.iter().all(|f| f.hunks.is_empty())
    }

    /// Added lines that apply to `path`
    ///
    /// Prefers the file section whose `+++` target matches `path`. A diff with
    /// a single section, or with no file headers at all, applies whole.
    #[must_use]
    pub fn added_lines_for(&self, path: &str) -> BTreeSet<u32> {
        let matching: Vec<&FileDiff> = self
            .files
            .iter()
            .filter(|f| f.new_path.as_deref().is_some_and(|p| paths_match(p, path)))
            .collect();

        if !matching.is_empty() {
            return matching.iter().flat_map(|f| f.added_lines()).collect();
        }

        let headerless = self.files.iter().all(|f| f.new_path.is_none());
        if self.files.len() == 1 || headerless {
            return self.files.iter().flat_map(FileDiff::added_lines).collect();
        }

        tracing::warn!(path, sections = self.files.len(), "no diff section matches file");
        BTreeSet::new()
    }
}

fn parse_hunk(lines: &[&str], header_idx: usize) -> AnalysisResult<(Hunk, usize)> {
    let header = lines[header_idx];
    let caps = HUNK_HEADER
        .captures(header)
        .ok_or_else(|| AnalysisError::malformed_header(header_idx + 1, header))?;

    let number = |idx: usize, default: u32| -> AnalysisResult<u32> {
        caps.get(idx).map_or(Ok(default), |m| {
            m.as_str()
                .parse::<u32>()
                .map_err(|_| AnalysisError::malformed_header(header_idx + 1, header))
        })
    };

    let mut hunk = Hunk {
        old_start: number(1, 0)?,
        old_len: number(2, 1)?,
        new_start: number(3, 0)?,
        new_len: number(4, 1)?,
        ..Hunk::default()
    };

    let mut old_line = hunk.old_start;
    let mut new_line = hunk.new_start;
    let mut old_remaining = hunk.old_len;
    let mut new_remaining = hunk.new_len;
    let mut i = header_idx + 1;

    while (old_remaining > 0 || new_remaining > 0) && i < lines.len() {
        let line = lines[i];
        if line.starts_with("@@") || line.starts_with("diff --git ") {
            tracing::debug!(header, "hunk ended before its declared counts");
            break;
        }

        let advance = |n: u32| {
            n.checked_add(1)
                .ok_or_else(|| AnalysisError::malformed_header(header_idx + 1, header))
        };
        if line.starts_with('+') {
            new_remaining = take(new_remaining, header_idx, "new")?;
            hunk.added_lines.push(new_line);
            new_line = advance(new_line)?;
        } else if line.starts_with('-') {
            old_remaining = take(old_remaining, header_idx, "old")?;
            hunk.removed_lines.push(old_line);
            old_line = advance(old_line)?;
        } else if line.starts_with('\\') {
            // "\ No newline at end of file"
        } else {
            old_remaining = take(old_remaining, header_idx, "old")?;
            new_remaining = take(new_remaining, header_idx, "new")?;
            old_line = advance(old_line)?;
            new_line = advance(new_line)?;
        }
        i += 1;
    }

    // Trailing marker after the last counted line
    if lines.get(i).is_some_and(|l| l.starts_with('\\')) {
        i += 1;
    }

    Ok((hunk, i))
}

fn take(remaining: u32, header_idx: usize, side: &'static str) -> AnalysisResult<u32> {
    remaining.checked_sub(1).ok_or(AnalysisError::HunkOverrun {
        line: header_idx + 1,
        side,
    })
}

/// Strip `a/`/`b/` prefixes and trailing timestamps from a header path
fn clean_header_path(raw: &str) -> String {
    let path = raw.split('\t').next().unwrap_or(raw).trim();
    path.strip_prefix("a/")
        .or_else(|| path.strip_prefix("b/"))
        .unwrap_or(path)
        .to_string()
}

/// Compare paths on whole-segment suffixes (`repo/src/x.py` matches `src/x.py`)
#[must_use]
pub fn paths_match(a: &str, b: &str) -> bool {
    let a = a.trim_start_matches("./").replace('\\', "/");
    let b = b.trim_start_matches("./").replace('\\', "/");
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a == b || a.ends_with(&format!("/{b}")) || b.ends_with(&format!("/{a}"))
}
