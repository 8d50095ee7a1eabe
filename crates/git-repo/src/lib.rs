//! The repository façade: path safety, the staging index, ignore/
//! attribute/sparse matchers, diff/replay, the receive-pack wire layer,
//! partial clone, clone orchestration, and sidecar state, bound together
//! by [`Repo`] over a small set of injected Ports (spec.md §4.14, §6).

mod clone;
mod config;
mod diff;
mod error;
mod history;
mod index;
mod matchers;
mod partial;
mod pathsafe;
mod ports;
mod repo;
mod sidecar;
mod wire;

pub use clone::CloneOptions;
pub use config::{Config, ConfigSection, default_config, hash_algorithm, set_remote_origin};
pub use diff::{ReplayResult, ReplayStatus, ReplayStep, apply_unified_patch, generate_patch, replay, split_lines};
pub use error::GitError;
pub use history::{LastModified, last_modified, resolve_commit_like};
pub use index::{Index, IndexEntry, Status, add, checkout, decode_index, encode_index, status, write_index_native};
pub use matchers::{
    AttrRule, AttrValue, evaluate_attributes, evaluate_ignore_patterns, normalize_rules, parse_assignment,
    select_sparse_paths_cone, sparse_cone_matches, sparse_pattern_matches,
};
pub use partial::{
    BackfillOptions, BackfillReport, BackfillStatus, PromisorState, backfill, negotiate_partial_clone_filter,
    resolve_promised_object, set_promisor_object,
};
pub use pathsafe::is_safe_path;
pub use ports::{
    CompressionPort, Credential, CredentialPort, DirEntry, EntryKind, FilesystemPort, HookPort, HookRequest,
    HookResult, NativeCompression, NativeCredentials, NativeFilesystem, NativeHooks, NativeSignatures,
    SignaturePort,
};
pub use repo::Repo;
pub use sidecar::{
    MaintenanceState, NoteEntry, NotesState, RebaseState, RebaseStatus, RebaseStep, RemoteConfig, RemotesState,
    ReplaceEntry, ReplaceState, SparseState, StashEntry, StashState, SubmoduleEntry, SubmodulesState,
    WorktreeEntry, WorktreesState, load_sidecar, mark_worktree_prunable, parse_gitmodules, prune_loose_objects,
    prune_worktrees, rebase_abort, rebase_continue, run_maintenance, save_sidecar,
};
pub use wire::{
    Pkt, ReceivePackRequest, apply_receive_pack_update, build_receive_pack_advertisement, capability_parity,
    default_receive_pack_capabilities, make_flush_packet, make_pkt_line, negotiate_filter_capability,
    normalize_capabilities, parse_pkt_lines, parse_receive_pack_request,
};

pub use git_hash::HashAlgo;
pub use git_object::{Object, ObjectKind, Oid};
pub use git_odb::{Gitlink, Materialized, ObjectStore};
pub use git_refs::RefStore;
