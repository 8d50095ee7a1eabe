//! Ref name normalization: a bare name is prefixed with `refs/`.
//!
//! This core does not enforce git's full refname grammar (no ban on
//! consecutive dots, no-ASCII-control checks, etc.) — see spec.md §4.6.
//! Names are otherwise opaque strings used as relative path components.

/// Normalize `name`, prefixing it with `refs/` unless it already starts
/// with that prefix. `HEAD` and other top-level pseudo-refs are callers'
/// responsibility — this function only implements the bare-name rule.
#[must_use]
pub fn normalize(name: &str) -> String {
    if name.starts_with("refs/") {
        name.to_owned()
    } else {
        format!("refs/{name}")
    }
}

/// `true` if `prefix` matches `name` per spec.md §4.6's `listRefs`
/// semantics: `"refs"` matches everything, `"refs/heads"` matches both
/// `refs/heads` exactly and anything under `refs/heads/`.
#[must_use]
pub fn matches_prefix(name: &str, prefix: &str) -> bool {
    if prefix.is_empty() || prefix == "refs" {
        return true;
    }
    name == prefix || name.starts_with(&format!("{prefix}/"))
}
