//! The clone orchestrator (M): source resolution, gitDir copy, HEAD/branch
//! rewiring, tree materialization, shallow/partial-clone persistence, and
//! recursive submodule clone (spec.md §4.14 `clone`).

use std::fs;
use std::path::{Path, PathBuf};

use git_hash::HashAlgo;
use git_object::Oid;
use git_odb::ObjectStore;
use git_refs::RefStore;
use tracing::info;

use crate::config::{self, Config};
use crate::error::GitError;
use crate::partial::PromisorState;
use crate::ports::CredentialPort;
use crate::sidecar::{self, SubmodulesState};

/// Caller-supplied clone knobs, per spec.md §4.14.
#[derive(Debug, Clone, Default)]
pub struct CloneOptions {
    /// Check out this branch instead of the source's HEAD branch.
    pub branch: Option<String>,
    /// Shallow-clone depth; must be `>= 1` when given.
    pub depth: Option<u32>,
    /// Partial-clone filter spec (e.g. `"blob:none"`).
    pub filter: Option<String>,
    /// Recursively clone submodules listed in `.gitmodules`.
    pub recurse_submodules: bool,
}

/// Where a clone source resolves to before the filesystem-level copy:
/// always, ultimately, a local directory — this core does not speak a
/// pack-wire protocol (§9's deliberate scope boundary).
#[derive(Debug, Clone, PartialEq, Eq)]
enum SourceKind {
    Local(PathBuf),
    Http(String),
    Ssh(String),
}

fn classify_source(src: &str) -> SourceKind {
    if let Some(rest) = src.strip_prefix("file://") {
        SourceKind::Local(PathBuf::from(rest))
    } else if src.starts_with("http://") || src.starts_with("https://") {
        SourceKind::Http(src.to_owned())
    } else if src.starts_with("ssh://") {
        SourceKind::Ssh(src.to_owned())
    } else {
        SourceKind::Local(PathBuf::from(src))
    }
}

/// Resolve an `http(s)://` source to a local mirror path: GET
/// `<url>/info/refs?service=git-upload-pack` and read the
/// `x-codex-repo-path` response header (spec.md §4.14 step 2). No pack
/// data is transferred; the header is the entire transport contract this
/// core implements.
///
/// # Errors
/// Returns [`GitError::NetworkError`] if the request fails or the header
/// is absent.
fn discover_http_mirror(url: &str) -> Result<PathBuf, GitError> {
    let discovery_url = format!("{}/info/refs?service=git-upload-pack", url.trim_end_matches('/'));
    let response = ureq::get(&discovery_url)
        .call()
        .map_err(|e| GitError::NetworkError {
            message: e.to_string(),
            status: None,
        })?;
    let mirror = response
        .headers()
        .get("x-codex-repo-path")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| GitError::NetworkError {
            message: "discovery response is missing x-codex-repo-path".into(),
            status: Some(response.status().as_u16()),
        })?;
    Ok(PathBuf::from(mirror))
}

/// Resolve an `ssh://` source to a local mirror path: require a credential
/// from `credentials`, emit a redacted progress line, then treat the
/// URL's path component as the mirror's local filesystem path (the same
/// local-mirror scope boundary as the HTTP path).
///
/// # Errors
/// Returns [`GitError::AuthRequired`] if no credential is available.
fn discover_ssh_mirror(url: &str, credentials: &dyn CredentialPort) -> Result<PathBuf, GitError> {
    let credential = credentials
        .get(url)
        .ok_or_else(|| GitError::AuthRequired(format!("no credential available for {url}")))?;
    info!(user = %credential.username, secret = "<redacted>", url, "ssh credential resolved");

    let without_scheme = url.strip_prefix("ssh://").unwrap_or(url);
    let path_start = without_scheme.find('/').ok_or_else(|| {
        GitError::InvalidArgument(format!("ssh url {url:?} has no path component"))
    })?;
    Ok(PathBuf::from(&without_scheme[path_start..]))
}

/// Resolve `src` to a local directory, driving the HTTP/SSH discovery
/// dance when needed.
fn resolve_source(src: &str, credentials: &dyn CredentialPort) -> Result<PathBuf, GitError> {
    match classify_source(src) {
        SourceKind::Local(path) => Ok(path),
        SourceKind::Http(url) => discover_http_mirror(&url),
        SourceKind::Ssh(url) => discover_ssh_mirror(&url, credentials),
    }
}

/// The git directory for a resolved source root: `<root>/.git` if present,
/// else `root` itself (a bare repository).
fn locate_git_dir(root: &Path) -> PathBuf {
    let dot_git = root.join(".git");
    if dot_git.is_dir() { dot_git } else { root.to_path_buf() }
}

/// Reject `dst` if it exists as a non-directory or a non-empty directory
/// (spec.md §4.14 step 3).
///
/// # Errors
/// Returns [`GitError::AlreadyExists`] if `dst` is unsuitable.
fn validate_target(dst: &Path) -> Result<(), GitError> {
    if !dst.exists() {
        return Ok(());
    }
    if !dst.is_dir() {
        return Err(GitError::AlreadyExists(format!("{} is not a directory", dst.display())));
    }
    if fs::read_dir(dst)?.next().is_some() {
        return Err(GitError::AlreadyExists(format!("{} is not empty", dst.display())));
    }
    Ok(())
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<(), GitError> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Rebind local branches into `refs/remotes/origin/*` and, if HEAD is
/// symbolic to a branch, collapse to a single local head and point
/// `refs/remotes/origin/HEAD` at its remote-tracking counterpart
/// (spec.md §4.14 step 6).
fn rebind_remote_tracking(refs: &RefStore, git_dir: &Path) -> Result<(), GitError> {
    let heads = refs.list_refs("refs/heads").map_err(GitError::from)?;
    for (name, oid) in &heads {
        let short = name.strip_prefix("refs/heads/").unwrap_or(name);
        let remote_name = format!("refs/remotes/origin/{short}");
        refs.create_ref(&remote_name, oid, "clone: rebind remote-tracking ref")
            .map_err(GitError::from)?;
    }

    let head_target = refs.head_target().map_err(GitError::from)?;
    if let Some(target) = head_target {
        if let Some(branch) = target.strip_prefix("refs/heads/") {
            for (name, _) in &heads {
                if name != &target {
                    refs.delete_ref(name, "clone: collapse local heads").map_err(GitError::from)?;
                }
            }
            let head_remote = format!("ref: refs/remotes/origin/{branch}\n");
            fs::write(git_dir.join("refs/remotes/origin/HEAD"), head_remote)?;
        }
    }
    Ok(())
}

/// Clone `src` into `dst`, per spec.md §4.14's numbered steps.
///
/// # Errors
/// Returns [`GitError::AlreadyExists`] if `dst` is unsuitable, propagates
/// validation failures from malformed `options`, and propagates I/O,
/// ref-store, and object-store errors encountered along the way.
pub fn clone_repository(
    src: &str,
    dst: &Path,
    options: &CloneOptions,
    credentials: &dyn CredentialPort,
) -> Result<(), GitError> {
    if let Some(depth) = options.depth {
        if depth < 1 {
            return Err(GitError::InvalidArgument("depth must be >= 1".into()));
        }
    }
    if let Some(branch) = &options.branch {
        if branch.trim().is_empty() {
            return Err(GitError::InvalidArgument("branch must not be blank".into()));
        }
    }
    if let Some(filter) = &options.filter {
        if filter.trim().is_empty() {
            return Err(GitError::InvalidArgument("filter must not be blank".into()));
        }
    }

    validate_target(dst)?;

    let source_root = resolve_source(src, credentials)?;
    let source_git_dir = locate_git_dir(&source_root);
    let source_config = Config::read(&source_git_dir.join("config"))?;
    let algo = config::hash_algorithm(&source_config);

    crate::repo::init_layout(dst, algo)?;
    let dst_git_dir = dst.join(".git");

    copy_dir_recursive(&source_git_dir, &dst_git_dir)?;

    let mut new_config = config::default_config(algo);
    new_config.write(&dst_git_dir.join("config"))?;

    let refs = RefStore::new(&dst_git_dir, algo);
    if let Some(branch) = &options.branch {
        let target = format!("refs/heads/{branch}");
        refs.resolve_ref(&target)
            .map_err(GitError::from)?
            .ok_or_else(|| GitError::NotFound(format!("branch {branch:?} does not exist in source")))?;
        fs::write(dst_git_dir.join("HEAD"), format!("ref: {target}\n"))?;
    }

    fs::create_dir_all(dst_git_dir.join("refs/remotes/origin"))?;
    rebind_remote_tracking(&refs, &dst_git_dir)?;

    let head_commit = refs.resolve_head().map_err(GitError::from)?;
    let store = ObjectStore::new(dst_git_dir.join("objects"), algo);
    let head_tree = commit_tree(&store, algo, &head_commit)?;
    let materialized = git_odb::materialize_tree(&store, algo, &head_tree).map_err(GitError::from)?;
    for (path, bytes) in &materialized.files {
        let target = dst.join(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(target, bytes)?;
    }
    for gitlink in &materialized.gitlinks {
        fs::create_dir_all(dst.join(&gitlink.path))?;
    }

    if let Some(depth) = options.depth {
        let boundary = git_odb::shallow_boundary(&store, algo, &head_commit, depth).map_err(GitError::from)?;
        let shallow_text: String = boundary.iter().map(|oid| format!("{oid}\n")).collect();
        fs::write(dst_git_dir.join("shallow"), shallow_text)?;
    }

    if let Some(filter) = &options.filter {
        let state = PromisorState {
            filter: Some(filter.clone()),
            capabilities: vec!["filter".to_owned(), format!("object-format={}", algo_name(algo))],
            objects: std::collections::BTreeMap::new(),
        };
        sidecar::save_sidecar(&dst_git_dir.join("partial-clone-codex.json"), &state)?;
    }

    config::set_remote_origin(&mut new_config, src, options.filter.as_deref());
    new_config.write(&dst_git_dir.join("config"))?;

    if options.recurse_submodules {
        if let Some(gitmodules) = materialized.files.get(".gitmodules") {
            let text = String::from_utf8_lossy(gitmodules);
            let entries = sidecar::parse_gitmodules(&text);
            sidecar::save_sidecar(
                &dst_git_dir.join("submodules-codex.json"),
                &SubmodulesState { entries: entries.clone() },
            )?;

            for entry in &entries {
                let Some(gitlink) = materialized.gitlinks.iter().find(|g| g.path == entry.path) else {
                    continue;
                };
                let submodule_dst = dst.join(&entry.path);
                fs::remove_dir(&submodule_dst).ok();
                let sub_options = CloneOptions {
                    branch: None,
                    depth: options.depth,
                    filter: options.filter.clone(),
                    recurse_submodules: true,
                };
                clone_repository(&entry.url, &submodule_dst, &sub_options, credentials)?;
                checkout_submodule_commit(&submodule_dst, &gitlink.oid)?;
            }
        }
    }

    Ok(())
}

fn algo_name(algo: HashAlgo) -> &'static str {
    match algo {
        HashAlgo::Sha1 => "sha1",
        HashAlgo::Sha256 => "sha256",
    }
}

/// Check out a submodule worktree at its recorded gitlink commit, rather
/// than whatever HEAD its own clone resolved to (spec.md §4.14 step 11).
fn checkout_submodule_commit(submodule_worktree: &Path, commit_oid: &Oid) -> Result<(), GitError> {
    let git_dir = submodule_worktree.join(".git");
    let algo = commit_oid.algo();
    let store = ObjectStore::new(git_dir.join("objects"), algo);
    let materialized = git_odb::materialize_tree(&store, algo, &commit_tree(&store, algo, commit_oid)?)
        .map_err(GitError::from)?;
    for (path, bytes) in &materialized.files {
        let target = submodule_worktree.join(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(target, bytes)?;
    }
    fs::write(git_dir.join("HEAD"), format!("{commit_oid}\n"))?;
    Ok(())
}

fn commit_tree(store: &ObjectStore, algo: HashAlgo, commit_oid: &Oid) -> Result<Oid, GitError> {
    let payload = store.read_object(commit_oid).map_err(GitError::from)?;
    let commit = git_object::parse_commit(algo, &payload).map_err(GitError::from)?;
    Ok(commit.tree_oid)
}
