//! History helpers (J): `lastModified(path, ref?)`.

use std::collections::HashSet;

use git_hash::HashAlgo;
use git_object::{EntryMode, Oid, parse_commit, parse_tree};
use git_odb::ObjectStore;
use git_refs::RefStore;

use crate::error::GitError;
use crate::index::Index;

/// The result of [`last_modified`]: the commit that last changed `path`
/// per the first-parent walk, plus the path's currently staged OID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastModified {
    /// The commit OID that last changed `path`, or `None` if the path
    /// never existed on the walked history (or was deleted at the change
    /// point).
    pub history_oid: Option<Oid>,
    /// The blob OID currently staged at `path`, if any.
    pub staged_oid: Option<Oid>,
}

/// Resolve a commit-like spec: `"HEAD"`, a raw OID, `refs/<X>`,
/// `refs/heads/<X>`, or `refs/tags/<X>`.
///
/// # Errors
/// Returns [`GitError::NotFound`] if none of those forms resolve.
pub fn resolve_commit_like(refs: &RefStore, spec: &str) -> Result<Oid, GitError> {
    if spec == "HEAD" {
        return Ok(refs.resolve_head()?);
    }
    if let Ok(oid) = spec.parse::<Oid>() {
        return Ok(oid);
    }
    if spec.starts_with("refs/") {
        if let Some(oid) = refs.resolve_ref(spec)? {
            return Ok(oid);
        }
    } else {
        for candidate in [format!("refs/heads/{spec}"), format!("refs/tags/{spec}")] {
            if let Some(oid) = refs.resolve_ref(&candidate)? {
                return Ok(oid);
            }
        }
    }
    Err(GitError::NotFound(format!("no commit resolves from {spec:?}")))
}

/// Walk a tree segment-by-segment, returning the final segment's OID.
/// Aborts (returns `None`) on a missing segment, or on encountering a
/// gitlink or non-tree entry before the final segment.
fn lookup_path(store: &ObjectStore, algo: HashAlgo, root_tree: &Oid, path: &str) -> Result<Option<Oid>, GitError> {
    let segments: Vec<&str> = path.split('/').collect();
    let mut current_tree = root_tree.clone();

    for (i, segment) in segments.iter().enumerate() {
        let payload = store.read_object(&current_tree)?;
        let entries = parse_tree(algo, &payload).map_err(GitError::from)?;
        let Some(entry) = entries.into_iter().find(|e| e.name == *segment) else {
            return Ok(None);
        };

        let is_last = i == segments.len() - 1;
        if is_last {
            return Ok(Some(entry.oid));
        }
        match entry.mode {
            EntryMode::Tree => current_tree = entry.oid,
            EntryMode::Commit | EntryMode::Blob | EntryMode::BlobExecutable | EntryMode::Link => {
                return Ok(None);
            }
        }
    }
    Ok(None)
}

/// Resolve `start_ref` (default `"HEAD"`) to a commit and walk first-parent
/// history to find the commit that last changed `path`, per spec.md
/// §4.10: a root commit is the change point iff the path exists there; an
/// internal commit is the change point iff any parent's path OID differs
/// from (or is absent relative to) the commit's own; otherwise the walk
/// follows the first parent. A visited-set guards against revisiting a
/// commit.
///
/// # Errors
/// Propagates object-store and ref-resolution errors.
pub fn last_modified(
    store: &ObjectStore,
    refs: &RefStore,
    index: &Index,
    algo: HashAlgo,
    path: &str,
    start_ref: Option<&str>,
) -> Result<LastModified, GitError> {
    let staged_oid = index
        .entries
        .iter()
        .find(|e| e.path == path)
        .map(|e| e.oid.clone());

    let mut current = resolve_commit_like(refs, start_ref.unwrap_or("HEAD"))?;
    let mut seen = HashSet::new();

    loop {
        if !seen.insert(current.clone()) {
            return Ok(LastModified {
                history_oid: None,
                staged_oid,
            });
        }

        let payload = store.read_object(&current)?;
        let commit = parse_commit(algo, &payload).map_err(GitError::from)?;
        let current_path_oid = lookup_path(store, algo, &commit.tree_oid, path)?;

        if commit.parents.is_empty() {
            return Ok(LastModified {
                history_oid: current_path_oid.map(|_| current.clone()),
                staged_oid,
            });
        }

        let mut differs = false;
        for parent in &commit.parents {
            let parent_payload = store.read_object(parent)?;
            let parent_commit = parse_commit(algo, &parent_payload).map_err(GitError::from)?;
            let parent_path_oid = lookup_path(store, algo, &parent_commit.tree_oid, path)?;
            if parent_path_oid != current_path_oid {
                differs = true;
                break;
            }
        }

        if differs {
            return Ok(LastModified {
                history_oid: current_path_oid.map(|_| current.clone()),
                staged_oid,
            });
        }

        current = commit.parents[0].clone();
    }
}
