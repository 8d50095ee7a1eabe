//! The `Repo` façade (M): `init`, `open`, `clone`, and the full set of
//! accessor methods binding object storage, refs, the index, matchers,
//! diff/replay, history, the wire layer, partial clone, and sidecar state
//! over the injected Ports (spec.md §4.14, §6).

use std::path::{Path, PathBuf};

use git_hash::HashAlgo;
use git_object::{Object, ObjectKind, Oid};
use git_odb::{Gitlink, Materialized, ObjectStore};
use git_refs::RefStore;

use crate::clone::{CloneOptions, clone_repository};
use crate::config::{self, Config};
use crate::diff::{ReplayResult, ReplayStep};
use crate::error::GitError;
use crate::history::LastModified;
use crate::index::{Index, Status};
use crate::partial::{BackfillOptions, BackfillReport, PromisorState};
use crate::ports::{
    CompressionPort, Credential, CredentialPort, HookPort, HookRequest, HookResult, NativeCompression,
    NativeCredentials, NativeFilesystem, NativeHooks, NativeSignatures, SignaturePort,
};
use crate::sidecar::{
    MaintenanceState, NotesState, RebaseState, RemotesState, ReplaceState, SparseState, StashState,
    SubmodulesState, WorktreesState,
};
use crate::wire::ReceivePackRequest;

/// A repository's façade, generic over the five Ports (spec.md §6). The
/// default type parameters bind the `Native*` implementations, so
/// `Repo::init(...)` (all defaults) is the common case; an embedder that
/// needs a different filesystem, credential source, hook runner, or
/// signature verifier names its own types explicitly.
pub struct Repo<
    C = NativeCompression,
    F = NativeFilesystem,
    Cr = NativeCredentials,
    H = NativeHooks,
    S = NativeSignatures,
> where
    C: CompressionPort,
    F: crate::ports::FilesystemPort,
    Cr: CredentialPort,
    H: HookPort,
    S: SignaturePort,
{
    git_dir: PathBuf,
    worktree: Option<PathBuf>,
    algo: HashAlgo,
    compression: C,
    filesystem: F,
    credentials: Cr,
    hooks: H,
    signatures: S,
}

/// The canonical directory skeleton `init` creates (spec.md §4.14).
const SKELETON_DIRS: &[&str] = &[
    "branches",
    "hooks",
    "info",
    "objects/info",
    "objects/pack",
    "refs/heads",
    "refs/tags",
    "logs/refs/heads",
    "logs/refs/tags",
];

/// Create the canonical gitDir skeleton at `<worktree_path>/.git` and
/// write `HEAD`, `description`, and `config`. Shared by [`Repo::init`]
/// and the clone orchestrator, which both need a freshly laid-out gitDir
/// before copying or populating it further.
///
/// # Errors
/// Propagates I/O errors creating directories or writing files.
pub(crate) fn init_layout(worktree_path: &Path, algo: HashAlgo) -> Result<(), GitError> {
    let git_dir = worktree_path.join(".git");
    for dir in SKELETON_DIRS {
        std::fs::create_dir_all(git_dir.join(dir))?;
    }
    std::fs::write(git_dir.join("HEAD"), "ref: refs/heads/main\n")?;
    std::fs::write(
        git_dir.join("description"),
        "Unnamed repository; edit this file 'description' to name the repository.\n",
    )?;
    config::default_config(algo).write(&git_dir.join("config"))?;
    Ok(())
}

impl<C, F, Cr, H, S> Repo<C, F, Cr, H, S>
where
    C: CompressionPort,
    F: crate::ports::FilesystemPort,
    Cr: CredentialPort,
    H: HookPort,
    S: SignaturePort,
{
    #[allow(clippy::too_many_arguments)]
    fn from_parts(
        git_dir: PathBuf,
        worktree: Option<PathBuf>,
        algo: HashAlgo,
        compression: C,
        filesystem: F,
        credentials: Cr,
        hooks: H,
        signatures: S,
    ) -> Self {
        Self {
            git_dir,
            worktree,
            algo,
            compression,
            filesystem,
            credentials,
            hooks,
            signatures,
        }
    }

    /// Initialize a new repository rooted at `worktree_path` using
    /// custom Ports (spec.md §4.14 `init`).
    ///
    /// # Errors
    /// Propagates I/O errors laying out the skeleton.
    #[allow(clippy::too_many_arguments)]
    pub fn init_with_ports(
        worktree_path: &Path,
        algo: HashAlgo,
        compression: C,
        filesystem: F,
        credentials: Cr,
        hooks: H,
        signatures: S,
    ) -> Result<Self, GitError> {
        init_layout(worktree_path, algo)?;
        Ok(Self::from_parts(
            worktree_path.join(".git"),
            Some(worktree_path.to_path_buf()),
            algo,
            compression,
            filesystem,
            credentials,
            hooks,
            signatures,
        ))
    }

    /// Open an existing repository at `path` (a worktree containing
    /// `.git`, or a bare gitDir) using custom Ports (spec.md §4.14
    /// `open`).
    ///
    /// # Errors
    /// Returns [`GitError::NotFound`] if `objects`, `refs`, or `config`
    /// are missing, or propagates I/O errors reading the config.
    #[allow(clippy::too_many_arguments)]
    pub fn open_with_ports(
        path: &Path,
        compression: C,
        filesystem: F,
        credentials: Cr,
        hooks: H,
        signatures: S,
    ) -> Result<Self, GitError> {
        let dot_git = path.join(".git");
        let (git_dir, worktree) = if dot_git.is_dir() {
            (dot_git, Some(path.to_path_buf()))
        } else {
            (path.to_path_buf(), None)
        };

        for required in ["objects", "refs", "config"] {
            if !git_dir.join(required).exists() {
                return Err(GitError::NotFound(format!(
                    "{} is missing required entry {required:?}",
                    git_dir.display()
                )));
            }
        }

        let config = Config::read(&git_dir.join("config"))?;
        let algo = config::hash_algorithm(&config);
        Ok(Self::from_parts(git_dir, worktree, algo, compression, filesystem, credentials, hooks, signatures))
    }

    /// Clone `src` into `dst` using custom Ports (spec.md §4.14 `clone`).
    ///
    /// # Errors
    /// Propagates [`clone_repository`]'s validation and I/O errors.
    #[allow(clippy::too_many_arguments)]
    pub fn clone_with_ports(
        src: &str,
        dst: &Path,
        options: &CloneOptions,
        compression: C,
        filesystem: F,
        credentials: Cr,
        hooks: H,
        signatures: S,
    ) -> Result<Self, GitError> {
        clone_repository(src, dst, options, &credentials)?;
        Self::open_with_ports(dst, compression, filesystem, credentials, hooks, signatures)
    }

    /// The gitDir this repository is rooted at.
    #[must_use]
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// The worktree root, or `None` for a bare repository.
    #[must_use]
    pub fn worktree(&self) -> Option<&Path> {
        self.worktree.as_deref()
    }

    /// The repository's hash algorithm, as recorded in `config` at
    /// `init`/`open` time.
    #[must_use]
    pub const fn hash_algo(&self) -> HashAlgo {
        self.algo
    }

    fn worktree_root(&self) -> Result<&Path, GitError> {
        self.worktree
            .as_deref()
            .ok_or_else(|| GitError::Unsupported("operation requires a worktree, repository is bare".into()))
    }

    fn objects(&self) -> ObjectStore {
        ObjectStore::new(self.git_dir.join("objects"), self.algo)
    }

    fn refs(&self) -> RefStore {
        RefStore::new(&self.git_dir, self.algo)
    }

    fn sidecar_path(&self, name: &str) -> PathBuf {
        self.git_dir.join(name)
    }

    /// Raw-DEFLATE compress `bytes` through the injected
    /// [`CompressionPort`].
    ///
    /// # Errors
    /// Returns [`GitError::IntegrityError`] on a compression failure.
    pub fn deflate(&self, bytes: &[u8]) -> Result<Vec<u8>, GitError> {
        self.compression.deflate_raw(bytes)
    }

    /// Raw-DEFLATE decompress `bytes` through the injected
    /// [`CompressionPort`], enforcing `limits`.
    ///
    /// # Errors
    /// Returns [`GitError::IntegrityError`] if decompression fails or
    /// exceeds `limits`.
    pub fn inflate(&self, bytes: &[u8], limits: git_hash::InflateLimits) -> Result<Vec<u8>, GitError> {
        self.compression.inflate_raw(bytes, limits)
    }

    // --- Config -------------------------------------------------------

    /// Read the `config` file.
    ///
    /// # Errors
    /// Propagates I/O errors.
    pub fn read_config(&self) -> Result<Config, GitError> {
        Config::read(&self.git_dir.join("config"))
    }

    /// Write the `config` file, replacing it whole.
    ///
    /// # Errors
    /// Propagates I/O errors.
    pub fn write_config(&self, config: &Config) -> Result<(), GitError> {
        config.write(&self.git_dir.join("config"))
    }

    // --- Objects --------------------------------------------------------

    /// Read an object's payload (the type is discarded).
    ///
    /// # Errors
    /// Returns [`GitError::NotFound`] if `oid` is not a loose object, or
    /// propagates a decode error.
    pub fn read_object(&self, oid: &Oid) -> Result<Vec<u8>, GitError> {
        self.objects().read_object(oid).map_err(GitError::from)
    }

    /// Write a loose object, returning its computed OID.
    ///
    /// # Errors
    /// Propagates I/O and compression errors.
    pub fn write_object(&self, kind: ObjectKind, payload: Vec<u8>) -> Result<Oid, GitError> {
        self.objects().write_loose(kind, payload).map_err(GitError::from)
    }

    /// Compute (without writing) the OID a payload would hash to.
    #[must_use]
    pub fn hash_object(&self, kind: ObjectKind, payload: Vec<u8>) -> Oid {
        Object::new(self.algo, kind, payload).oid().clone()
    }

    /// Recursively materialize a tree's blobs and gitlinks.
    ///
    /// # Errors
    /// Propagates object-store and tree-format errors.
    pub fn materialize_tree(&self, root_oid: &Oid) -> Result<Materialized, GitError> {
        git_odb::materialize_tree(&self.objects(), self.algo, root_oid).map_err(GitError::from)
    }

    /// Compute the shallow-clone boundary at `depth` commits back from
    /// `head`.
    ///
    /// # Errors
    /// Propagates object-store and commit-format errors.
    pub fn shallow_boundary(&self, head: &Oid, depth: u32) -> Result<Vec<Oid>, GitError> {
        git_odb::shallow_boundary(&self.objects(), self.algo, head, depth).map_err(GitError::from)
    }

    // --- Refs -----------------------------------------------------------

    /// Resolve a ref name to its OID, if it resolves.
    ///
    /// # Errors
    /// Propagates ref-store errors.
    pub fn resolve_ref(&self, name: &str) -> Result<Option<Oid>, GitError> {
        self.refs().resolve_ref(name).map_err(GitError::from)
    }

    /// Resolve `HEAD`, symbolic or detached.
    ///
    /// # Errors
    /// Returns [`GitError::NotFound`] if `HEAD` cannot be resolved.
    pub fn resolve_head(&self) -> Result<Oid, GitError> {
        self.refs().resolve_head().map_err(GitError::from)
    }

    /// `HEAD`'s symbolic target ref name, or `None` if detached.
    ///
    /// # Errors
    /// Propagates ref-store errors.
    pub fn head_target(&self) -> Result<Option<String>, GitError> {
        self.refs().head_target().map_err(GitError::from)
    }

    /// List every ref matching `prefix`, sorted by name.
    ///
    /// # Errors
    /// Propagates ref-store errors.
    pub fn list_refs(&self, prefix: &str) -> Result<Vec<(String, Oid)>, GitError> {
        self.refs().list_refs(prefix).map_err(GitError::from)
    }

    /// Unconditionally update (or create) a ref.
    ///
    /// # Errors
    /// Propagates ref-store errors.
    pub fn update_ref(&self, name: &str, new_oid: &Oid, message: &str) -> Result<(), GitError> {
        self.refs().update_ref(name, new_oid, message).map_err(GitError::from)
    }

    /// Create a ref, failing if it already resolves.
    ///
    /// # Errors
    /// Returns [`GitError::AlreadyExists`] if `name` already resolves.
    pub fn create_ref(&self, name: &str, oid: &Oid, message: &str) -> Result<(), GitError> {
        self.refs().create_ref(name, oid, message).map_err(GitError::from)
    }

    /// Delete a ref, failing if it does not resolve.
    ///
    /// # Errors
    /// Returns [`GitError::NotFound`] if `name` does not resolve.
    pub fn delete_ref(&self, name: &str, message: &str) -> Result<(), GitError> {
        self.refs().delete_ref(name, message).map_err(GitError::from)
    }

    /// `true` iff `name` resolves to exactly `oid`.
    ///
    /// # Errors
    /// Propagates ref-store errors.
    pub fn verify_ref(&self, name: &str, oid: &Oid) -> Result<bool, GitError> {
        self.refs().verify_ref(name, oid).map_err(GitError::from)
    }

    /// Resolve a commit-like spec (`HEAD`, raw OID, `refs/...`, or a bare
    /// branch/tag name).
    ///
    /// # Errors
    /// Returns [`GitError::NotFound`] if nothing resolves.
    pub fn resolve_commit_like(&self, spec: &str) -> Result<Oid, GitError> {
        crate::history::resolve_commit_like(&self.refs(), spec)
    }

    /// Find the commit that last changed `path`, following `start_ref`
    /// (default `HEAD`) first-parent.
    ///
    /// # Errors
    /// Propagates ref-store and object-store errors.
    pub fn last_modified(&self, index: &Index, path: &str, start_ref: Option<&str>) -> Result<LastModified, GitError> {
        crate::history::last_modified(&self.objects(), &self.refs(), index, self.algo, path, start_ref)
    }

    // --- Index + worktree -------------------------------------------------

    /// Read the staging index, if present (an empty index if absent).
    ///
    /// # Errors
    /// Propagates a decode error.
    pub fn read_index(&self) -> Result<Index, GitError> {
        let path = self.git_dir.join("index");
        match std::fs::read(&path) {
            Ok(bytes) => crate::index::decode_index(&bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Index::empty()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the staging index, in the canonical JSON form.
    ///
    /// # Errors
    /// Propagates I/O errors.
    pub fn write_index(&self, index: &Index) -> Result<(), GitError> {
        std::fs::write(self.git_dir.join("index"), crate::index::encode_index(index))?;
        Ok(())
    }

    /// Stage `paths`, writing each as a loose blob and upserting it into
    /// `index`.
    ///
    /// # Errors
    /// Returns [`GitError::InvalidArgument`] for an unsafe path, or
    /// propagates I/O and object-store errors.
    pub fn add(&self, index: &mut Index, paths: &[String]) -> Result<(), GitError> {
        crate::index::add(index, self.worktree_root()?, &self.objects(), paths)
    }

    /// Compute staged/unstaged path sets against the worktree.
    ///
    /// # Errors
    /// Returns [`GitError::Unsupported`] if the repository is bare.
    pub fn status(&self, index: &Index) -> Result<Status, GitError> {
        Ok(crate::index::status(index, self.worktree_root()?, self.algo))
    }

    /// Write `files` into the worktree.
    ///
    /// # Errors
    /// Returns [`GitError::InvalidArgument`] for an unsafe path, or
    /// propagates I/O errors.
    pub fn checkout(&self, files: Vec<(String, Vec<u8>)>) -> Result<(), GitError> {
        crate::index::checkout(self.worktree_root()?, files)
    }

    // --- Receive-pack -----------------------------------------------------

    /// Build the receive-pack advertisement for `refs` (HEAD-targeted
    /// ref first) under the repository's default capability set.
    ///
    /// # Errors
    /// Propagates ref-store and pkt-line framing errors.
    pub fn receive_pack_advertise_refs(&self, extra_capabilities: &[String]) -> Result<Vec<u8>, GitError> {
        let refs = self.refs();
        let ref_list = refs.list_refs("refs").map_err(GitError::from)?;
        let head_target = refs.head_target().map_err(GitError::from)?;
        let capabilities = crate::wire::default_receive_pack_capabilities(self.algo, extra_capabilities);
        crate::wire::build_receive_pack_advertisement(&ref_list, head_target.as_deref(), &capabilities)
    }

    /// Parse a single-command receive-pack request.
    ///
    /// # Errors
    /// Returns [`GitError::ProtoError`] if the frame is malformed.
    pub fn receive_pack_request(&self, buf: &[u8]) -> Result<ReceivePackRequest, GitError> {
        crate::wire::parse_receive_pack_request(buf)
    }

    /// Build a single-command receive-pack request for `ref_name`.
    ///
    /// # Errors
    /// Propagates [`crate::wire::make_pkt_line`]'s over-limit error.
    pub fn build_receive_pack_request(
        &self,
        old_oid: &Oid,
        new_oid: &Oid,
        ref_name: &str,
        capabilities: &[String],
    ) -> Result<Vec<u8>, GitError> {
        crate::wire::build_receive_pack_request(old_oid, new_oid, ref_name, capabilities)
    }

    /// Apply a receive-pack command under compare-and-swap.
    ///
    /// # Errors
    /// Returns [`GitError::LockConflict`] on a CAS mismatch.
    pub fn receive_pack_update(&self, req: &ReceivePackRequest) -> Result<(), GitError> {
        crate::wire::apply_receive_pack_update(&self.refs(), self.algo, req)
    }

    // --- Matchers -----------------------------------------------------

    /// `true` iff `path` is ignored under the last-match-wins semantics
    /// of `patterns`.
    #[must_use]
    pub fn evaluate_ignore_patterns(&self, path: &str, patterns: &[String]) -> bool {
        crate::matchers::evaluate_ignore_patterns(path, patterns)
    }

    /// Evaluate `.gitattributes`-style rules for `path`.
    #[must_use]
    pub fn evaluate_attributes(&self, path: &str, rules: &[crate::matchers::AttrRule]) -> std::collections::BTreeMap<String, crate::matchers::AttrValue> {
        crate::matchers::evaluate_attributes(path, rules)
    }

    /// Select sparse-checkout paths in cone mode.
    #[must_use]
    pub fn select_sparse_paths_cone(&self, candidates: &[String], rules: &[String]) -> Vec<String> {
        crate::matchers::select_sparse_paths_cone(candidates, rules)
    }

    // --- Diff / replay --------------------------------------------------

    /// Generate a whole-file-replacement patch for `path`.
    #[must_use]
    pub fn generate_patch(&self, path: &str, before: &str, after: &str) -> String {
        crate::diff::generate_patch(path, before, after)
    }

    /// Apply a single unified patch to the worktree, returning the path
    /// written.
    ///
    /// # Errors
    /// Returns [`GitError::Unsupported`] if the repository is bare, or
    /// propagates the patch's own application errors.
    pub fn apply_unified_patch(&self, patch_text: &str, reverse: bool) -> Result<String, GitError> {
        crate::diff::apply_unified_patch(self.worktree_root()?, patch_text, reverse)
    }

    /// Replay a sequence of patch steps, stopping at first failure.
    ///
    /// # Errors
    /// Returns [`GitError::InvalidArgument`] if `steps` is empty, or
    /// [`GitError::Unsupported`] if the repository is bare.
    pub fn replay(&self, steps: &[ReplayStep]) -> Result<ReplayResult, GitError> {
        crate::diff::replay(self.worktree_root()?, steps)
    }

    // --- Partial clone / backfill ---------------------------------------

    /// Load the persisted partial-clone state.
    ///
    /// # Errors
    /// Propagates a decode error.
    pub fn read_partial_clone_state(&self) -> Result<PromisorState, GitError> {
        crate::sidecar::load_sidecar(&self.sidecar_path("partial-clone-codex.json"))
    }

    /// Persist partial-clone state.
    ///
    /// # Errors
    /// Propagates I/O errors.
    pub fn write_partial_clone_state(&self, state: &PromisorState) -> Result<(), GitError> {
        crate::sidecar::save_sidecar(&self.sidecar_path("partial-clone-codex.json"), state)
    }

    /// Negotiate and persist a partial-clone filter.
    ///
    /// # Errors
    /// Returns [`GitError::Unsupported`] if negotiation fails.
    pub fn negotiate_partial_clone_filter(&self, state: &mut PromisorState, filter: &str, capabilities: &[String]) -> Result<(), GitError> {
        crate::partial::negotiate_partial_clone_filter(state, filter, capabilities)
    }

    /// Resolve an object's bytes, promisor-first.
    ///
    /// # Errors
    /// Returns [`GitError::IntegrityError`] if neither source has `oid`.
    pub fn resolve_promised_object(&self, state: &PromisorState, oid: &Oid) -> Result<Vec<u8>, GitError> {
        crate::partial::resolve_promised_object(state, &self.objects(), oid)
    }

    /// Run the deterministic backfill contract.
    ///
    /// # Errors
    /// Returns [`GitError::InvalidArgument`] if `options.min_batch_size`
    /// is negative.
    pub fn backfill(
        &self,
        state: &mut PromisorState,
        index: Option<&Index>,
        sparse_rules: Option<&[String]>,
        options: &BackfillOptions,
    ) -> Result<BackfillReport, GitError> {
        crate::partial::backfill(state, &self.objects(), index, sparse_rules, options)
    }

    // --- Sparse checkout --------------------------------------------------

    /// Load the persisted sparse-checkout state.
    ///
    /// # Errors
    /// Propagates a decode error.
    pub fn read_sparse_state(&self) -> Result<SparseState, GitError> {
        crate::sidecar::load_sidecar(&self.sidecar_path("info/sparse-checkout-codex.json"))
    }

    /// Persist sparse-checkout state, and refresh the plain-text
    /// `info/sparse-checkout` rule file alongside it.
    ///
    /// # Errors
    /// Propagates I/O errors.
    pub fn write_sparse_state(&self, state: &SparseState) -> Result<(), GitError> {
        crate::sidecar::save_sidecar(&self.sidecar_path("info/sparse-checkout-codex.json"), state)?;
        let rules_text: String = state.rules.iter().map(|r| format!("{r}\n")).collect();
        std::fs::write(self.sidecar_path("info/sparse-checkout"), rules_text)?;
        Ok(())
    }

    // --- Rebase lifecycle ---------------------------------------------

    fn rebase_state_path(&self) -> PathBuf {
        self.sidecar_path("rebase-codex/state.json")
    }

    /// Start a new rebase.
    ///
    /// # Errors
    /// Propagates I/O errors persisting the new state.
    pub fn rebase_start(&self, onto: Oid, steps: Vec<crate::sidecar::RebaseStep>) -> Result<RebaseState, GitError> {
        let state = RebaseState::start(onto, steps);
        crate::sidecar::save_sidecar(&self.rebase_state_path(), &state)?;
        Ok(state)
    }

    /// Load the in-progress (or terminal) rebase state, if any.
    ///
    /// # Errors
    /// Returns [`GitError::NotFound`] if no rebase is in progress.
    pub fn read_rebase_state(&self) -> Result<RebaseState, GitError> {
        let path = self.rebase_state_path();
        let bytes = std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GitError::NotFound("no rebase in progress".into())
            } else {
                GitError::from(e)
            }
        })?;
        serde_json::from_slice(&bytes).map_err(GitError::from)
    }

    /// Advance the in-progress rebase by one step.
    ///
    /// # Errors
    /// Returns [`GitError::NotFound`] if no rebase is in progress.
    pub fn rebase_continue(&self) -> Result<RebaseState, GitError> {
        let mut state = self.read_rebase_state()?;
        crate::sidecar::rebase_continue(&mut state);
        crate::sidecar::save_sidecar(&self.rebase_state_path(), &state)?;
        Ok(state)
    }

    /// Abort the in-progress rebase.
    ///
    /// # Errors
    /// Returns [`GitError::NotFound`] if no rebase is in progress.
    pub fn rebase_abort(&self) -> Result<RebaseState, GitError> {
        let mut state = self.read_rebase_state()?;
        crate::sidecar::rebase_abort(&mut state);
        crate::sidecar::save_sidecar(&self.rebase_state_path(), &state)?;
        Ok(state)
    }

    // --- Sidecar CRUD: remotes, submodules, worktrees, stash, notes, replace

    /// Load the configured remotes.
    ///
    /// # Errors
    /// Propagates a decode error.
    pub fn read_remotes(&self) -> Result<RemotesState, GitError> {
        crate::sidecar::load_sidecar(&self.sidecar_path("remotes-codex.json"))
    }

    /// Persist the configured remotes.
    ///
    /// # Errors
    /// Propagates I/O errors.
    pub fn write_remotes(&self, state: &RemotesState) -> Result<(), GitError> {
        crate::sidecar::save_sidecar(&self.sidecar_path("remotes-codex.json"), state)
    }

    /// Load registered submodules.
    ///
    /// # Errors
    /// Propagates a decode error.
    pub fn read_submodules(&self) -> Result<SubmodulesState, GitError> {
        crate::sidecar::load_sidecar(&self.sidecar_path("submodules-codex.json"))
    }

    /// Persist registered submodules.
    ///
    /// # Errors
    /// Propagates I/O errors.
    pub fn write_submodules(&self, state: &SubmodulesState) -> Result<(), GitError> {
        crate::sidecar::save_sidecar(&self.sidecar_path("submodules-codex.json"), state)
    }

    /// Load registered linked worktrees.
    ///
    /// # Errors
    /// Propagates a decode error.
    pub fn read_worktrees(&self) -> Result<WorktreesState, GitError> {
        crate::sidecar::load_sidecar(&self.sidecar_path("worktrees-codex.json"))
    }

    /// Persist registered linked worktrees.
    ///
    /// # Errors
    /// Propagates I/O errors.
    pub fn write_worktrees(&self, state: &WorktreesState) -> Result<(), GitError> {
        crate::sidecar::save_sidecar(&self.sidecar_path("worktrees-codex.json"), state)
    }

    /// Load the stash.
    ///
    /// # Errors
    /// Propagates a decode error.
    pub fn read_stash(&self) -> Result<StashState, GitError> {
        crate::sidecar::load_sidecar(&self.sidecar_path("stash-codex.json"))
    }

    /// Persist the stash.
    ///
    /// # Errors
    /// Propagates I/O errors.
    pub fn write_stash(&self, state: &StashState) -> Result<(), GitError> {
        crate::sidecar::save_sidecar(&self.sidecar_path("stash-codex.json"), state)
    }

    /// Load object notes.
    ///
    /// # Errors
    /// Propagates a decode error.
    pub fn read_notes(&self) -> Result<NotesState, GitError> {
        crate::sidecar::load_sidecar(&self.sidecar_path("notes-codex.json"))
    }

    /// Persist object notes.
    ///
    /// # Errors
    /// Propagates I/O errors.
    pub fn write_notes(&self, state: &NotesState) -> Result<(), GitError> {
        crate::sidecar::save_sidecar(&self.sidecar_path("notes-codex.json"), state)
    }

    /// Load object replacements.
    ///
    /// # Errors
    /// Propagates a decode error.
    pub fn read_replacements(&self) -> Result<ReplaceState, GitError> {
        crate::sidecar::load_sidecar(&self.sidecar_path("replace-codex.json"))
    }

    /// Persist object replacements.
    ///
    /// # Errors
    /// Propagates I/O errors.
    pub fn write_replacements(&self, state: &ReplaceState) -> Result<(), GitError> {
        crate::sidecar::save_sidecar(&self.sidecar_path("replace-codex.json"), state)
    }

    // --- Maintenance ----------------------------------------------------

    /// Walk every ref's full history and record the reachable object set.
    ///
    /// # Errors
    /// Propagates ref-store and object-store errors.
    pub fn run_maintenance(&self) -> Result<MaintenanceState, GitError> {
        let snapshot = crate::sidecar::run_maintenance(&self.refs(), &self.objects(), self.algo)?;
        crate::sidecar::save_sidecar(&self.sidecar_path("maintenance-codex.json"), &snapshot)?;
        Ok(snapshot)
    }

    /// Prune loose objects absent from the last [`Repo::run_maintenance`]
    /// snapshot. A no-op unless `confirm` is `true`.
    ///
    /// # Errors
    /// Propagates object-store errors.
    pub fn prune_loose_objects(&self, snapshot: &MaintenanceState, confirm: bool) -> Result<Vec<String>, GitError> {
        crate::sidecar::prune_loose_objects(&self.objects(), snapshot, confirm)
    }

    // --- Ports: credentials, hooks, signatures --------------------------

    /// Resolve a credential for `url` via the injected [`CredentialPort`].
    #[must_use]
    pub fn get_credential(&self, url: &str) -> Option<Credential> {
        self.credentials.get(url)
    }

    /// Execute a hook via the injected [`HookPort`].
    ///
    /// # Errors
    /// Returns [`GitError::IoError`] if the hook could not be spawned.
    pub fn run_hook(&self, request: &HookRequest) -> Result<HookResult, GitError> {
        self.hooks.execute(request)
    }

    /// Verify a detached signature via the injected [`SignaturePort`].
    #[must_use]
    pub fn verify_signature(&self, payload: &[u8], signature: &[u8]) -> bool {
        self.signatures.verify(payload, signature)
    }

    // --- Filesystem port passthrough ------------------------------------

    /// Read an arbitrary gitDir-relative file through the injected
    /// [`FilesystemPort`].
    ///
    /// # Errors
    /// Returns [`GitError::NotFound`] if the file does not exist.
    pub fn read_gitdir_file(&self, relative: &str) -> Result<Vec<u8>, GitError> {
        self.filesystem.read_file(&self.git_dir.join(relative))
    }

    /// Write an arbitrary gitDir-relative file through the injected
    /// [`FilesystemPort`].
    ///
    /// # Errors
    /// Propagates the underlying I/O failure.
    pub fn write_gitdir_file(&self, relative: &str, bytes: &[u8]) -> Result<(), GitError> {
        let path = self.git_dir.join(relative);
        if let Some(parent) = path.parent() {
            self.filesystem.mkdir_recursive(parent)?;
        }
        self.filesystem.write_file(&path, bytes)
    }

    /// A gitlink's recorded submodule commit, if `path` names one in
    /// `materialized`.
    #[must_use]
    pub fn gitlink_at<'a>(materialized: &'a Materialized, path: &str) -> Option<&'a Gitlink> {
        materialized.gitlinks.iter().find(|g| g.path == path)
    }
}

impl Repo<NativeCompression, NativeFilesystem, NativeCredentials, NativeHooks, NativeSignatures> {
    /// Initialize a new repository with the `Native*` Ports (spec.md
    /// §4.14 `init`).
    ///
    /// # Errors
    /// Propagates I/O errors laying out the skeleton.
    pub fn init(worktree_path: &Path, algo: HashAlgo) -> Result<Self, GitError> {
        Self::init_with_ports(
            worktree_path,
            algo,
            NativeCompression,
            NativeFilesystem,
            NativeCredentials,
            NativeHooks,
            NativeSignatures,
        )
    }

    /// Open an existing repository with the `Native*` Ports (spec.md
    /// §4.14 `open`).
    ///
    /// # Errors
    /// Returns [`GitError::NotFound`] if `objects`, `refs`, or `config`
    /// are missing.
    pub fn open(path: &Path) -> Result<Self, GitError> {
        Self::open_with_ports(
            path,
            NativeCompression,
            NativeFilesystem,
            NativeCredentials,
            NativeHooks,
            NativeSignatures,
        )
    }

    /// Clone `src` into `dst` with the `Native*` Ports (spec.md §4.14
    /// `clone`). SSH sources always fail `AUTH_REQUIRED` under the native
    /// credential port, which never has a credential; use
    /// [`Repo::clone_with_ports`] to inject one.
    ///
    /// # Errors
    /// Propagates [`clone_repository`]'s validation and I/O errors.
    pub fn clone(src: &str, dst: &Path, options: &CloneOptions) -> Result<Self, GitError> {
        Self::clone_with_ports(
            src,
            dst,
            options,
            NativeCompression,
            NativeFilesystem,
            NativeCredentials,
            NativeHooks,
            NativeSignatures,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git_object::{CommitInfo, EntryMode, TreeEntry, encode_commit, encode_tree};
    use tempfile::tempdir;

    #[test]
    fn init_creates_skeleton_and_head() {
        let dir = tempdir().unwrap();
        let repo = Repo::init(dir.path(), HashAlgo::Sha1).unwrap();
        assert!(dir.path().join(".git/refs/heads").is_dir());
        assert!(dir.path().join(".git/objects/pack").is_dir());
        assert!(repo.resolve_head().unwrap_err().to_string().contains("HEAD"));
    }

    #[test]
    fn init_selects_repository_format_version_by_algo() {
        let dir = tempdir().unwrap();
        Repo::init(dir.path(), HashAlgo::Sha256).unwrap();
        let config = Config::read(&dir.path().join(".git/config")).unwrap();
        assert_eq!(config.get("extensions", None, "objectformat"), Some("sha256"));
    }

    #[test]
    fn open_rejects_missing_objects_dir() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        let err = Repo::open(dir.path()).unwrap_err();
        assert!(matches!(err, GitError::NotFound(_)));
    }

    #[test]
    fn open_recovers_hash_algo_from_config() {
        let dir = tempdir().unwrap();
        Repo::init(dir.path(), HashAlgo::Sha256).unwrap();
        let repo = Repo::open(dir.path()).unwrap();
        assert_eq!(repo.hash_algo(), HashAlgo::Sha256);
    }

    #[test]
    fn write_then_read_object_roundtrips() {
        let dir = tempdir().unwrap();
        let repo = Repo::init(dir.path(), HashAlgo::Sha1).unwrap();
        let oid = repo.write_object(ObjectKind::Blob, b"hello\n".to_vec()).unwrap();
        assert_eq!(repo.read_object(&oid).unwrap(), b"hello\n");
    }

    #[test]
    fn add_status_checkout_round_trip() {
        let dir = tempdir().unwrap();
        let repo = Repo::init(dir.path(), HashAlgo::Sha1).unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hello\n").unwrap();

        let mut index = Index::empty();
        repo.add(&mut index, &["a.txt".to_owned()]).unwrap();
        repo.write_index(&index).unwrap();

        let reloaded = repo.read_index().unwrap();
        assert_eq!(reloaded.entries.len(), 1);

        let status = repo.status(&reloaded).unwrap();
        assert!(status.unstaged.is_empty());
    }

    #[test]
    fn resolve_commit_like_and_last_modified() {
        let dir = tempdir().unwrap();
        let repo = Repo::init(dir.path(), HashAlgo::Sha1).unwrap();

        let blob = repo.write_object(ObjectKind::Blob, b"v1".to_vec()).unwrap();
        let tree_payload = encode_tree(&[TreeEntry {
            mode: EntryMode::Blob,
            name: "a.txt".into(),
            oid: blob,
        }]);
        let tree_oid = repo.write_object(ObjectKind::Tree, tree_payload).unwrap();
        let commit_info = CommitInfo {
            tree_oid,
            parents: vec![],
            author: "A <a@x> 1 +0000".into(),
            committer: "A <a@x> 1 +0000".into(),
            message: "init\n".into(),
        };
        let commit_oid = repo.write_object(ObjectKind::Commit, encode_commit(&commit_info)).unwrap();
        repo.create_ref("refs/heads/main", &commit_oid, "init").unwrap();

        let resolved = repo.resolve_commit_like("main").unwrap();
        assert_eq!(resolved, commit_oid);

        let index = Index::empty();
        let result = repo.last_modified(&index, "a.txt", Some("main")).unwrap();
        assert_eq!(result.history_oid, Some(commit_oid));
    }

    #[test]
    fn sidecar_state_round_trips_through_the_facade() {
        let dir = tempdir().unwrap();
        let repo = Repo::init(dir.path(), HashAlgo::Sha1).unwrap();

        let mut remotes = repo.read_remotes().unwrap();
        assert!(remotes.remotes.is_empty());
        remotes.remotes.push(crate::sidecar::RemoteConfig {
            name: "origin".into(),
            url: "https://example.com/x.git".into(),
            fetch_refspecs: vec!["+refs/heads/*:refs/remotes/origin/*".into()],
        });
        repo.write_remotes(&remotes).unwrap();

        let reloaded = repo.read_remotes().unwrap();
        assert_eq!(reloaded.remotes.len(), 1);
    }

    #[test]
    fn rebase_lifecycle_through_the_facade() {
        let dir = tempdir().unwrap();
        let repo = Repo::init(dir.path(), HashAlgo::Sha1).unwrap();
        let onto = Oid::zero(HashAlgo::Sha1);
        let step = crate::sidecar::RebaseStep {
            commit_oid: Oid::zero(HashAlgo::Sha1),
            message: "m".into(),
        };
        repo.rebase_start(onto, vec![step]).unwrap();
        let state = repo.rebase_continue().unwrap();
        assert_eq!(state.status, crate::sidecar::RebaseStatus::Completed);
    }

    #[test]
    fn maintenance_and_prune_round_trip() {
        let dir = tempdir().unwrap();
        let repo = Repo::init(dir.path(), HashAlgo::Sha1).unwrap();
        repo.write_object(ObjectKind::Blob, b"orphan".to_vec()).unwrap();
        let snapshot = repo.run_maintenance().unwrap();
        assert!(snapshot.reachable_refs.is_empty());
        let pruned = repo.prune_loose_objects(&snapshot, true).unwrap();
        assert_eq!(pruned.len(), 1);
    }

    #[test]
    fn native_credentials_and_signatures_are_inert_through_the_facade() {
        let dir = tempdir().unwrap();
        let repo = Repo::init(dir.path(), HashAlgo::Sha1).unwrap();
        assert!(repo.get_credential("https://example.com").is_none());
        assert!(!repo.verify_signature(b"x", b"y"));
    }
}
