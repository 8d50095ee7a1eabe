//! Diff generation, whole-file-replacement patch application, and
//! sequential replay (I).

use std::fs;
use std::path::Path;

use crate::error::GitError;
use crate::pathsafe::is_safe_path;

/// Split `text` into lines: `\r\n` is normalized to `\n` first, then the
/// result is split on `\n`. An empty string produces an empty line list
/// (not a single empty line), matching spec.md §4.9.
#[must_use]
pub fn split_lines(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    text.replace("\r\n", "\n")
        .split('\n')
        .map(str::to_owned)
        .collect()
}

/// Generate a minimal unified patch: a full before/after line dump under a
/// single hunk header, not a real diff algorithm. This is sufficient for
/// this core's whole-file replay semantics (spec.md §4.9).
#[must_use]
pub fn generate_patch(path: &str, before: &str, after: &str) -> String {
    let before_lines = split_lines(before);
    let after_lines = split_lines(after);

    let mut out = format!(
        "--- a/{path}\n+++ b/{path}\n@@ -1,{} +1,{} @@\n",
        before_lines.len(),
        after_lines.len()
    );
    for line in &before_lines {
        out.push('-');
        out.push_str(line);
        out.push('\n');
    }
    for line in &after_lines {
        out.push('+');
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// A parsed patch: its target path plus the `-` and `+` line bodies, in
/// the order they appeared.
struct ParsedPatch {
    path: String,
    minus_lines: Vec<String>,
    plus_lines: Vec<String>,
}

fn parse_patch(text: &str) -> Result<ParsedPatch, GitError> {
    let mut path = None;
    let mut minus_lines = Vec::new();
    let mut plus_lines = Vec::new();

    for line in text.lines() {
        if let Some(p) = line.strip_prefix("+++ b/") {
            path = Some(p.to_owned());
        } else if line.starts_with("--- ") || line.starts_with("+++ ") || line.starts_with("@@ ") {
            continue;
        } else if let Some(rest) = line.strip_prefix('-') {
            minus_lines.push(rest.to_owned());
        } else if let Some(rest) = line.strip_prefix('+') {
            plus_lines.push(rest.to_owned());
        }
    }

    let path = path.ok_or_else(|| GitError::InvalidArgument("patch has no +++ b/<path> line".into()))?;
    if !is_safe_path(&path) {
        return Err(GitError::InvalidArgument(format!("unsafe patch target {path:?}")));
    }

    Ok(ParsedPatch {
        path,
        minus_lines,
        plus_lines,
    })
}

/// Parse `patch_text` and write either its `+` lines (`reverse = false`)
/// or its `-` lines (`reverse = true`), joined by LF, to the patch's
/// target path under `worktree_root`. Returns the path written.
///
/// # Errors
/// Returns [`GitError::InvalidArgument`] if the patch is malformed or
/// targets an unsafe path, or propagates I/O errors.
pub fn apply_unified_patch(
    worktree_root: &Path,
    patch_text: &str,
    reverse: bool,
) -> Result<String, GitError> {
    let parsed = parse_patch(patch_text)?;
    let lines = if reverse {
        &parsed.minus_lines
    } else {
        &parsed.plus_lines
    };
    let target = worktree_root.join(&parsed.path);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&target, lines.join("\n"))?;
    Ok(parsed.path)
}

/// One replay step: a patch to apply, and whether to apply it in reverse.
#[derive(Debug, Clone)]
pub struct ReplayStep {
    /// The unified-patch text.
    pub patch_text: String,
    /// `true` to apply the `-` lines instead of the `+` lines.
    pub reverse: bool,
}

/// The outcome of [`replay`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayStatus {
    /// Every step applied successfully.
    Completed,
    /// A step failed; `failed_step` is its index.
    Conflict {
        /// The index of the first step that failed.
        failed_step: usize,
    },
}

/// The full result of a [`replay`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayResult {
    /// `Completed` or `Conflict { failed_step }`.
    pub status: ReplayStatus,
    /// Paths written by steps that succeeded, in order. Left on disk even
    /// on conflict — replay is a deliberate "make progress" operation
    /// (spec.md §9).
    pub applied_paths: Vec<String>,
}

/// Apply `steps` in order; on the first failure (a malformed patch, an
/// unsafe target, or an I/O error), stop and report `Conflict` — the
/// steps applied before the failure remain written to disk.
///
/// # Errors
/// Returns [`GitError::InvalidArgument`] if `steps` is empty.
pub fn replay(worktree_root: &Path, steps: &[ReplayStep]) -> Result<ReplayResult, GitError> {
    if steps.is_empty() {
        return Err(GitError::InvalidArgument("replay requires at least one step".into()));
    }

    let mut applied_paths = Vec::new();
    for (index, step) in steps.iter().enumerate() {
        match apply_unified_patch(worktree_root, &step.patch_text, step.reverse) {
            Ok(path) => applied_paths.push(path),
            Err(_) => {
                return Ok(ReplayResult {
                    status: ReplayStatus::Conflict { failed_step: index },
                    applied_paths,
                });
            }
        }
    }

    Ok(ReplayResult {
        status: ReplayStatus::Completed,
        applied_paths,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn split_lines_empty_input() {
        assert!(split_lines("").is_empty());
    }

    #[test]
    fn split_lines_normalizes_crlf() {
        assert_eq!(split_lines("a\r\nb"), vec!["a".to_owned(), "b".to_owned()]);
    }

    #[test]
    fn generate_then_apply_roundtrips() {
        let dir = tempdir().unwrap();
        let patch = generate_patch("a.txt", "old\n", "new\nline2");
        assert!(patch.starts_with("--- a/a.txt\n+++ b/a.txt\n@@ -1,2 +1,2 @@\n"));

        apply_unified_patch(dir.path(), &patch, false).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "new\nline2");

        apply_unified_patch(dir.path(), &patch, true).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "old\n");
    }

    #[test]
    fn apply_rejects_unsafe_target() {
        let dir = tempdir().unwrap();
        let patch = generate_patch("../escape.txt", "a", "b");
        let err = apply_unified_patch(dir.path(), &patch, false).unwrap_err();
        assert!(matches!(err, GitError::InvalidArgument(_)));
    }

    #[test]
    fn replay_completes_on_success() {
        let dir = tempdir().unwrap();
        let steps = vec![
            ReplayStep {
                patch_text: generate_patch("a.txt", "", "a"),
                reverse: false,
            },
            ReplayStep {
                patch_text: generate_patch("b.txt", "", "b"),
                reverse: false,
            },
        ];
        let result = replay(dir.path(), &steps).unwrap();
        assert_eq!(result.status, ReplayStatus::Completed);
        assert_eq!(result.applied_paths, vec!["a.txt".to_owned(), "b.txt".to_owned()]);
    }

    #[test]
    fn replay_stops_at_first_failure_and_keeps_prior_writes() {
        let dir = tempdir().unwrap();
        let steps = vec![
            ReplayStep {
                patch_text: generate_patch("a.txt", "", "a"),
                reverse: false,
            },
            ReplayStep {
                patch_text: generate_patch("../escape.txt", "", "x"),
                reverse: false,
            },
        ];
        let result = replay(dir.path(), &steps).unwrap();
        assert_eq!(result.status, ReplayStatus::Conflict { failed_step: 1 });
        assert_eq!(result.applied_paths, vec!["a.txt".to_owned()]);
        assert!(dir.path().join("a.txt").is_file());
    }
}
