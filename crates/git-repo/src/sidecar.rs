//! Sidecar JSON state (N): stash, remotes, submodules, worktrees, notes,
//! replace, rebase, sparse, and maintenance — the "codex-" files spec.md
//! §6 enumerates alongside the canonical git layout. Each round-trips
//! through `serde_json` with strict deserialization: an unrecognized
//! shape is [`GitError::ObjectFormatError`], never silently defaulted.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use git_hash::HashAlgo;
use git_object::{EntryMode, Oid, parse_commit, parse_tree};
use git_odb::ObjectStore;
use git_refs::RefStore;
use serde::{Deserialize, Serialize};

use crate::error::GitError;

/// Read and strictly deserialize a sidecar file. A missing file decodes
/// to `T::default()`.
///
/// # Errors
/// Returns [`GitError::ObjectFormatError`] if the file exists but does not
/// parse as `T`, or propagates other I/O errors.
pub fn load_sidecar<T: Default + for<'de> Deserialize<'de>>(path: &Path) -> Result<T, GitError> {
    match fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(GitError::from),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}

/// Serialize and write a sidecar file, replacing it whole (spec.md §5
/// "Sidecar JSON files are rewritten whole").
///
/// # Errors
/// Propagates I/O errors creating parent directories or writing the file.
pub fn save_sidecar<T: Serialize>(path: &Path, value: &T) -> Result<(), GitError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec_pretty(value).expect("sidecar state serializes infallibly");
    fs::write(path, json)?;
    Ok(())
}

/// One stashed change set: the tree it was taken from, its parent commit,
/// an optional separately-stashed index tree, and its message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StashEntry {
    /// Human-readable stash message.
    pub message: String,
    /// The worktree tree OID at stash time.
    pub tree_oid: Oid,
    /// The commit the stash was taken on top of.
    pub parent_oid: Oid,
    /// A separately stashed index tree OID, if the index differed from
    /// the worktree at stash time.
    pub index_tree_oid: Option<Oid>,
}

/// `stash-codex.json`: a LIFO list of stashed change sets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StashState {
    /// Stash entries, most recent last; `stash pop`/`stash drop` act on
    /// the last entry.
    pub entries: Vec<StashEntry>,
}

/// One configured remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// The remote's name (e.g. `"origin"`).
    pub name: String,
    /// The remote's URL.
    pub url: String,
    /// Configured fetch refspecs.
    pub fetch_refspecs: Vec<String>,
}

/// `remotes-codex.json`: configured remotes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemotesState {
    /// Every configured remote.
    pub remotes: Vec<RemoteConfig>,
}

/// One `.gitmodules` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmoduleEntry {
    /// The `[submodule "<name>"]` section name.
    pub name: String,
    /// The worktree-relative path the submodule is checked out at.
    pub path: String,
    /// The submodule's remote URL.
    pub url: String,
}

/// `submodules-codex.json`: registered submodules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmodulesState {
    /// Every registered submodule.
    pub entries: Vec<SubmoduleEntry>,
}

/// Parse `.gitmodules` content into submodule entries: `[submodule "X"]`
/// blocks with `path = …` and `url = …` assignments.
#[must_use]
pub fn parse_gitmodules(text: &str) -> Vec<SubmoduleEntry> {
    let mut entries = Vec::new();
    let mut current: Option<(String, Option<String>, Option<String>)> = None;

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if let Some(rest) = line.strip_prefix("[submodule \"") {
            if let Some((name, path, url)) = current.take() {
                if let (Some(path), Some(url)) = (path, url) {
                    entries.push(SubmoduleEntry { name, path, url });
                }
            }
            if let Some(end) = rest.find('"') {
                current = Some((rest[..end].to_owned(), None, None));
            }
        } else if let Some((_, path, url)) = current.as_mut() {
            if let Some(value) = line.strip_prefix("path").and_then(|r| r.trim_start().strip_prefix('=')) {
                *path = Some(value.trim().to_owned());
            } else if let Some(value) = line.strip_prefix("url").and_then(|r| r.trim_start().strip_prefix('=')) {
                *url = Some(value.trim().to_owned());
            }
        }
    }
    if let Some((name, path, url)) = current {
        if let (Some(path), Some(url)) = (path, url) {
            entries.push(SubmoduleEntry { name, path, url });
        }
    }
    entries
}

/// One registered worktree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorktreeEntry {
    /// The worktree's filesystem path.
    pub path: String,
    /// The branch checked out there, if any (detached otherwise).
    pub branch: Option<String>,
    /// Set by [`mark_worktree_prunable`]; cleared entries are removed by
    /// [`prune_worktrees`].
    pub prunable: bool,
}

/// `worktrees-codex.json`: registered linked worktrees.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorktreesState {
    /// Every registered worktree.
    pub entries: Vec<WorktreeEntry>,
}

/// Set `prunable = true` on the worktree registered at `path`.
///
/// # Errors
/// Returns [`GitError::NotFound`] if no worktree is registered at `path`.
pub fn mark_worktree_prunable(state: &mut WorktreesState, path: &str) -> Result<(), GitError> {
    let entry = state
        .entries
        .iter_mut()
        .find(|e| e.path == path)
        .ok_or_else(|| GitError::NotFound(format!("worktree {path:?}")))?;
    entry.prunable = true;
    Ok(())
}

/// Remove and return every worktree entry flagged `prunable`.
pub fn prune_worktrees(state: &mut WorktreesState) -> Vec<WorktreeEntry> {
    let (pruned, kept): (Vec<_>, Vec<_>) = state.entries.drain(..).partition(|e| e.prunable);
    state.entries = kept;
    pruned
}

/// One note: a note blob attached to a target object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEntry {
    /// The object the note annotates.
    pub target_oid: Oid,
    /// The blob OID holding the note's text.
    pub note_oid: Oid,
}

/// `notes-codex.json`: object notes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotesState {
    /// Every note, one per annotated target.
    pub entries: Vec<NoteEntry>,
}

/// One object replacement (`git replace`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaceEntry {
    /// The object being replaced.
    pub original_oid: Oid,
    /// The object to substitute in its place.
    pub replacement_oid: Oid,
}

/// `replace-codex.json`: object replacements.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplaceState {
    /// Every active replacement.
    pub entries: Vec<ReplaceEntry>,
}

/// A rebase's lifecycle phase (spec.md §4.14's state machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RebaseStatus {
    /// Steps remain; `continue` advances, `abort` terminates.
    Active,
    /// Every step applied; terminal.
    Completed,
    /// The rebase was aborted; terminal.
    Aborted,
}

/// One rebase step: the commit being replayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebaseStep {
    /// The commit OID this step replays.
    pub commit_oid: Oid,
    /// The commit's message, carried for the replayed commit.
    pub message: String,
}

/// `rebase-codex/state.json`: an in-progress (or terminal) rebase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebaseState {
    /// Current lifecycle phase.
    pub status: RebaseStatus,
    /// The ordered steps being replayed.
    pub steps: Vec<RebaseStep>,
    /// The index of the next unapplied step.
    pub current_index: usize,
    /// The commit the rebase is replaying onto.
    pub onto: Oid,
}

impl RebaseState {
    /// Start a new active rebase onto `onto` with `steps`.
    #[must_use]
    pub fn start(onto: Oid, steps: Vec<RebaseStep>) -> Self {
        Self {
            status: RebaseStatus::Active,
            steps,
            current_index: 0,
            onto,
        }
    }
}

/// Advance an active rebase by one step: `active → active` (increment
/// `current_index`) or `active → completed` once every step has applied.
/// A no-op on a terminal state (spec.md §4.14: "terminal states ignore
/// continue").
pub fn rebase_continue(state: &mut RebaseState) {
    if state.status != RebaseStatus::Active {
        return;
    }
    state.current_index += 1;
    if state.current_index >= state.steps.len() {
        state.status = RebaseStatus::Completed;
    }
}

/// Abort an active rebase. A no-op on a terminal state.
pub fn rebase_abort(state: &mut RebaseState) {
    if state.status == RebaseStatus::Active {
        state.status = RebaseStatus::Aborted;
    }
}

/// `info/sparse-checkout-codex.json`: persisted sparse-checkout state,
/// distinct from the plain-text `info/sparse-checkout` rule file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparseState {
    /// `true` for cone mode, `false` for full pattern mode.
    pub cone: bool,
    /// The normalized rule set.
    pub rules: Vec<String>,
}

/// `maintenance-codex.json`: the last reachability snapshot, reported by
/// [`run_maintenance`] and consumed by [`prune_loose_objects`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceState {
    /// Every ref name found reachable at snapshot time.
    pub reachable_refs: Vec<String>,
    /// Every object OID (commits, trees, blobs) reachable from those
    /// refs, as hex strings.
    pub reachable_objects: Vec<String>,
}

/// Walk every ref's commit history (all parents, not just first-parent)
/// and every reachable tree/blob/gitlink, recording the full reachable
/// set. Gitlinks are recorded but not recursed into (spec.md §4.5).
///
/// # Errors
/// Propagates ref-store and object-store errors.
pub fn run_maintenance(refs: &RefStore, store: &ObjectStore, algo: HashAlgo) -> Result<MaintenanceState, GitError> {
    let ref_list = refs.list_refs("refs").map_err(GitError::from)?;
    let mut reachable_refs: Vec<String> = ref_list.iter().map(|(name, _)| name.clone()).collect();
    reachable_refs.sort();

    let mut visited_objects = HashSet::new();
    let mut visited_commits = HashSet::new();
    let mut queue: Vec<Oid> = ref_list.into_iter().map(|(_, oid)| oid).collect();

    while let Some(commit_oid) = queue.pop() {
        if !visited_commits.insert(commit_oid.clone()) {
            continue;
        }
        let Ok(payload) = store.read_object(&commit_oid) else {
            continue;
        };
        visited_objects.insert(commit_oid.to_string());
        let Ok(commit) = parse_commit(algo, &payload) else {
            continue;
        };
        walk_tree(store, algo, &commit.tree_oid, &mut visited_objects);
        queue.extend(commit.parents);
    }

    let mut reachable_objects: Vec<String> = visited_objects.into_iter().collect();
    reachable_objects.sort();

    Ok(MaintenanceState {
        reachable_refs,
        reachable_objects,
    })
}

fn walk_tree(store: &ObjectStore, algo: HashAlgo, tree_oid: &Oid, visited: &mut HashSet<String>) {
    if !visited.insert(tree_oid.to_string()) {
        return;
    }
    let Ok(payload) = store.read_object(tree_oid) else {
        return;
    };
    let Ok(entries) = parse_tree(algo, &payload) else {
        return;
    };
    for entry in entries {
        match entry.mode {
            EntryMode::Tree => walk_tree(store, algo, &entry.oid, visited),
            EntryMode::Commit => {
                visited.insert(entry.oid.to_string());
            }
            EntryMode::Blob | EntryMode::BlobExecutable | EntryMode::Link => {
                visited.insert(entry.oid.to_string());
            }
        }
    }
}

/// Delete every loose object not present in `snapshot.reachable_objects`.
/// A no-op unless `confirm` is `true` — a caller cannot prune without
/// having just computed a reachability snapshot via [`run_maintenance`]
/// (spec.md §9 "Pruning": the source reports reachability but never
/// wires deletion; this is the bounded, explicitly-gated pass that adds
/// it).
///
/// # Errors
/// Propagates object-store I/O errors.
pub fn prune_loose_objects(store: &ObjectStore, snapshot: &MaintenanceState, confirm: bool) -> Result<Vec<String>, GitError> {
    if !confirm {
        return Ok(Vec::new());
    }
    let reachable: HashSet<&str> = snapshot.reachable_objects.iter().map(String::as_str).collect();
    let mut pruned = Vec::new();
    for oid in store.list_loose_oids().map_err(GitError::from)? {
        if !reachable.contains(oid.to_string().as_str()) {
            store.remove_loose(&oid).map_err(GitError::from)?;
            pruned.push(oid.to_string());
        }
    }
    pruned.sort();
    Ok(pruned)
}
