//! OIDs, the loose-object envelope codec, and commit/tree payload parsing.
//!
//! This crate knows the git object *format* but nothing about storage: it
//! has no notion of an `objects/` directory, a pack file, or a repository.
//! `git-odb` builds storage on top of the types here.

mod commit;
mod object;
mod oid;
mod tree;

pub use commit::{CommitFormatError, CommitInfo, encode_commit, parse_commit};
pub use object::{Object, ObjectFormatError, ObjectKind};
pub use oid::{Oid, OidParseError};
pub use tree::{EntryMode, TreeEntry, TreeFormatError, encode_tree, parse_tree, tree_sort_key};
