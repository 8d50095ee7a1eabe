//! Tree payload parsing and encoding: `(mode, name, oid)` triples.

use git_hash::HashAlgo;
use thiserror::Error;

use crate::object::ObjectFormatError;
use crate::oid::Oid;

/// A file-system entry mode, as stored in a tree payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryMode {
    /// A regular, non-executable file (`100644`).
    Blob,
    /// A regular, executable file (`100755`).
    BlobExecutable,
    /// A symbolic link (`120000`).
    Link,
    /// A sub-directory (`40000`).
    Tree,
    /// A submodule commit pointer (`160000`).
    Commit,
}

impl EntryMode {
    /// Parse the octal mode word as it appears in a tree entry (no leading
    /// zero for directories: `"40000"`, not `"040000"`).
    pub fn parse(word: &str) -> Result<Self, TreeFormatError> {
        match word {
            "100644" => Ok(Self::Blob),
            "100755" => Ok(Self::BlobExecutable),
            "120000" => Ok(Self::Link),
            "40000" | "040000" => Ok(Self::Tree),
            "160000" => Ok(Self::Commit),
            other => Err(TreeFormatError::UnknownMode(other.to_owned())),
        }
    }

    /// Render the mode the way git writes it into a tree payload.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Blob => "100644",
            Self::BlobExecutable => "100755",
            Self::Link => "120000",
            Self::Tree => "40000",
            Self::Commit => "160000",
        }
    }

    /// `true` for the directory (sub-tree) mode.
    #[must_use]
    pub const fn is_tree(self) -> bool {
        matches!(self, Self::Tree)
    }
}

/// One entry in a tree object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeEntry {
    /// The entry's file-system mode.
    pub mode: EntryMode,
    /// The entry's base name (no path separators).
    pub name: String,
    /// The OID the entry points at.
    pub oid: Oid,
}

/// Errors parsing a tree payload.
#[derive(Debug, Error)]
pub enum TreeFormatError {
    /// A mode word was not one of the five recognized modes.
    #[error("unknown tree entry mode {0:?}")]
    UnknownMode(String),

    /// The payload ended before an expected `SP`, `NUL`, or OID.
    #[error("truncated tree entry: {0}")]
    Truncated(&'static str),

    /// An entry name contained a `/`, which is never valid in a tree.
    #[error("tree entry name {0:?} contains a path separator")]
    NameHasSeparator(String),
}

impl From<TreeFormatError> for ObjectFormatError {
    fn from(e: TreeFormatError) -> Self {
        Self::MalformedHeader(e.to_string())
    }
}

/// Parse a tree object's payload into its entries, in on-disk order.
///
/// # Errors
/// Returns [`TreeFormatError`] if the payload is truncated or contains an
/// unrecognized mode or a name with a path separator.
pub fn parse_tree(algo: HashAlgo, payload: &[u8]) -> Result<Vec<TreeEntry>, TreeFormatError> {
    let mut entries = Vec::new();
    let mut pos = 0;
    let oid_len = algo.len();

    while pos < payload.len() {
        let sp = payload[pos..]
            .iter()
            .position(|&b| b == b' ')
            .ok_or(TreeFormatError::Truncated("missing space after mode"))?;
        let mode_word = std::str::from_utf8(&payload[pos..pos + sp])
            .map_err(|_| TreeFormatError::Truncated("mode is not utf8"))?;
        let mode = EntryMode::parse(mode_word)?;
        pos += sp + 1;

        let nul = payload[pos..]
            .iter()
            .position(|&b| b == 0)
            .ok_or(TreeFormatError::Truncated("missing NUL after name"))?;
        let name = std::str::from_utf8(&payload[pos..pos + nul])
            .map_err(|_| TreeFormatError::Truncated("name is not utf8"))?
            .to_owned();
        if name.contains('/') {
            return Err(TreeFormatError::NameHasSeparator(name));
        }
        pos += nul + 1;

        if pos + oid_len > payload.len() {
            return Err(TreeFormatError::Truncated("oid runs past end of payload"));
        }
        let oid = Oid::from_bytes(algo, &payload[pos..pos + oid_len]);
        pos += oid_len;

        entries.push(TreeEntry { mode, name, oid });
    }

    Ok(entries)
}

/// Encode tree entries into a tree object's payload.
///
/// Entries must already be in git's tree sort order (byte-wise by name,
/// treating directory names as if suffixed with `/`); this function does not
/// sort or validate ordering, matching the tree-materialization contract
/// that builds entries in the correct order up front.
#[must_use]
pub fn encode_tree(entries: &[TreeEntry]) -> Vec<u8> {
    let mut out = Vec::new();
    for entry in entries {
        out.extend_from_slice(entry.mode.as_str().as_bytes());
        out.push(b' ');
        out.extend_from_slice(entry.name.as_bytes());
        out.push(0);
        out.extend_from_slice(entry.oid.as_bytes());
    }
    out
}

/// Sort key for git's tree ordering: directory entries sort as though their
/// name had a trailing `/`, so `"foo"` (a blob) sorts before `"foo.c"` but
/// `"foo"` (a tree) sorts after it.
#[must_use]
pub fn tree_sort_key(entry: &TreeEntry) -> Vec<u8> {
    let mut key = entry.name.as_bytes().to_vec();
    if entry.mode.is_tree() {
        key.push(b'/');
    }
    key
}
