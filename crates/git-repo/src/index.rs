//! The DIRC v2 staging index (G): dual-format decode, JSON-only canonical
//! encode, and the add/status/checkout bridge to the working tree.

use std::fs;
use std::path::Path;

use git_hash::HashAlgo;
use git_object::{ObjectKind, Oid};
use git_odb::ObjectStore;
use serde::{Deserialize, Serialize};

use crate::error::GitError;
use crate::pathsafe::is_safe_path;

const MAGIC: [u8; 8] = *b"DIRC\0\0\0\x02";
const DEFAULT_MODE: u32 = 0o100_644;

/// One staged entry: a worktree-relative path, the blob OID it points at,
/// and its mode (defaults to `0o100644` when absent on decode).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Worktree-relative, slash-separated, path-safe path.
    pub path: String,
    /// The blob OID staged at this path.
    pub oid: Oid,
    /// The entry's mode (`33188` / `0o100644` for a regular file).
    #[serde(default = "default_mode")]
    pub mode: u32,
}

const fn default_mode() -> u32 {
    DEFAULT_MODE
}

/// The staging index: version 2, entries totally ordered by path.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Index {
    /// Always `2` — the only version this core understands.
    pub version: u32,
    /// Staged entries, kept sorted by `path` on every write.
    pub entries: Vec<IndexEntry>,
}

impl Index {
    /// An empty, version-2 index — what [`decode_index`] returns when no
    /// index file exists yet.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            version: 2,
            entries: Vec::new(),
        }
    }

    fn upsert(&mut self, path: String, oid: Oid, mode: u32) {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.path == path) {
            existing.oid = oid;
            existing.mode = mode;
        } else {
            self.entries.push(IndexEntry { path, oid, mode });
        }
        self.entries.sort_by(|a, b| a.path.cmp(&b.path));
    }
}

/// Decode an index payload. Recognizes two physical formats sharing the
/// 8-byte `DIRC\0\0\0\2` magic: a JSON payload (the byte immediately after
/// the magic is `{`), or git's native binary layout. A missing-or-empty
/// `bytes` slice decodes to an empty index, matching `readIndex()`'s
/// documented absent-file behavior.
///
/// # Errors
/// Returns [`GitError::ObjectFormatError`] if the magic is wrong, the JSON
/// payload doesn't parse, or neither the SHA-1 nor SHA-256 native layout
/// parses.
pub fn decode_index(bytes: &[u8]) -> Result<Index, GitError> {
    if bytes.is_empty() {
        return Ok(Index::empty());
    }
    if bytes.len() < 8 || bytes[..8] != MAGIC {
        return Err(GitError::ObjectFormatError(
            "index is missing the DIRC\\0\\0\\0\\2 magic".into(),
        ));
    }

    if bytes.get(8) == Some(&b'{') {
        let mut decoded: Index = serde_json::from_slice(&bytes[8..])?;
        normalize(&mut decoded);
        return Ok(decoded);
    }

    decode_native(bytes, 20)
        .or_else(|_| decode_native(bytes, 32))
        .map_err(|e| GitError::ObjectFormatError(format!("native index decode failed: {e}")))
}

/// Drop non-object entries (not applicable once deserialized as
/// `IndexEntry` — `serde_json` already rejects those), drop entries
/// without a usable path, and coerce a missing mode to the default. Kept
/// as an explicit pass so callers handling hand-authored JSON fixtures see
/// the same forgiving behavior spec.md §4.7 documents.
fn normalize(index: &mut Index) {
    index.entries.retain(|e| !e.path.is_empty());
    index.entries.sort_by(|a, b| a.path.cmp(&b.path));
}

fn decode_native(bytes: &[u8], hash_len: usize) -> Result<Index, String> {
    let mut pos = 8usize;
    let count = read_u32(bytes, pos).ok_or("truncated entry count")?;
    pos += 4;

    let fixed = 42 + hash_len;
    let mut entries = Vec::with_capacity(count as usize);

    for _ in 0..count {
        let entry_start = pos;
        if pos + fixed > bytes.len() {
            return Err("entry runs past end of buffer".into());
        }
        let mode = read_u32(bytes, pos + 24).ok_or("truncated mode")?;
        let oid_bytes = &bytes[pos + 40..pos + 40 + hash_len];
        let algo = if hash_len == 20 {
            HashAlgo::Sha1
        } else {
            HashAlgo::Sha256
        };
        let oid = Oid::from_bytes(algo, oid_bytes);
        pos += fixed;

        let nul = bytes[pos..]
            .iter()
            .position(|&b| b == 0)
            .ok_or("name is not NUL-terminated")?;
        let name = std::str::from_utf8(&bytes[pos..pos + nul])
            .map_err(|_| "name is not utf8")?
            .to_owned();
        pos += nul + 1;

        let entry_len = pos - entry_start;
        let padded_len = entry_len.div_ceil(8) * 8;
        pos = entry_start + padded_len;

        entries.push(IndexEntry {
            path: name,
            oid,
            mode,
        });
    }

    let trailer_len = hash_len;
    while pos + 8 <= bytes.len().saturating_sub(trailer_len) {
        let size = read_u32(bytes, pos + 4).ok_or("truncated extension size")? as usize;
        pos += 8 + size;
    }

    if bytes.len() - pos != trailer_len {
        return Err("unexpected trailer length".into());
    }

    Ok(Index {
        version: 2,
        entries,
    })
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let slice = bytes.get(at..at + 4)?;
    Some(u32::from_be_bytes(slice.try_into().ok()?))
}

/// Encode an index as the canonical JSON form this core writes: the
/// `DIRC\0\0\0\2` magic followed by `{"version":2,"entries":[...]}`,
/// entries sorted by path.
#[must_use]
pub fn encode_index(index: &Index) -> Vec<u8> {
    let mut sorted = index.clone();
    sorted.entries.sort_by(|a, b| a.path.cmp(&b.path));
    let json = serde_json::to_vec(&sorted).expect("Index serializes infallibly");
    let mut out = Vec::with_capacity(8 + json.len());
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&json);
    out
}

/// Encode an index in git's native binary layout. Exposed only for
/// interop testing against consumers that read the native format
/// directly — this core's own canonical write path is
/// [`encode_index`].
#[must_use]
pub fn write_index_native(index: &Index, algo: HashAlgo) -> Vec<u8> {
    let hash_len = algo.len();
    let mut sorted = index.clone();
    sorted.entries.sort_by(|a, b| a.path.cmp(&b.path));

    let mut out = Vec::new();
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&(sorted.entries.len() as u32).to_be_bytes());

    for entry in &sorted.entries {
        let entry_start = out.len();
        out.extend_from_slice(&[0u8; 24]); // ctime, mtime, dev, ino
        out.extend_from_slice(&entry.mode.to_be_bytes());
        out.extend_from_slice(&[0u8; 8]); // uid, gid
        out.extend_from_slice(&[0u8; 4]); // size
        out.extend_from_slice(&entry.oid.as_bytes()[..hash_len]);
        out.extend_from_slice(&[0u8; 2]); // flags
        out.extend_from_slice(entry.path.as_bytes());
        out.push(0);
        let entry_len = out.len() - entry_start;
        let padded_len = entry_len.div_ceil(8) * 8;
        out.resize(entry_start + padded_len, 0);
    }

    out.extend_from_slice(&vec![0u8; hash_len]);
    out
}

/// For each path in `paths`: assert it's safe, read its worktree bytes,
/// write it as a loose blob, and upsert `{path, oid, mode: 0o100644}`
/// into `index`. Leaves `index` sorted by path.
///
/// # Errors
/// Returns [`GitError::InvalidArgument`] for an unsafe path, or propagates
/// I/O and object-store errors.
pub fn add(
    index: &mut Index,
    worktree_root: &Path,
    store: &ObjectStore,
    paths: &[String],
) -> Result<(), GitError> {
    for path in paths {
        if !is_safe_path(path) {
            return Err(GitError::InvalidArgument(format!(
                "unsafe path {path:?}"
            )));
        }
        let bytes = fs::read(worktree_root.join(path))?;
        let oid = store.write_loose(ObjectKind::Blob, bytes)?;
        index.upsert(path.clone(), oid, DEFAULT_MODE);
    }
    Ok(())
}

/// The result of [`status`]: staged paths (every index entry) and
/// unstaged paths (worktree content that diverges from or is missing for
/// a staged path), both sorted and de-duplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Status {
    /// Every path currently in the index.
    pub staged: Vec<String>,
    /// Paths whose worktree bytes can't be read, or hash to a different
    /// blob OID than the index entry.
    pub unstaged: Vec<String>,
}

/// Compute staged/unstaged path sets against `worktree_root`.
#[must_use]
pub fn status(index: &Index, worktree_root: &Path, algo: HashAlgo) -> Status {
    let mut staged: Vec<String> = index.entries.iter().map(|e| e.path.clone()).collect();
    staged.sort();
    staged.dedup();

    let mut unstaged = Vec::new();
    for entry in &index.entries {
        match fs::read(worktree_root.join(&entry.path)) {
            Ok(bytes) => {
                let digest = git_hash::hash(algo, "blob", &bytes);
                let current = Oid::from_bytes(algo, &digest);
                if current != entry.oid {
                    unstaged.push(entry.path.clone());
                }
            }
            Err(_) => unstaged.push(entry.path.clone()),
        }
    }
    unstaged.sort();
    unstaged.dedup();

    Status { staged, unstaged }
}

/// For each `(path, payload)` pair, sorted by path: assert safety, create
/// parent directories, and write the bytes.
///
/// # Errors
/// Returns [`GitError::InvalidArgument`] for an unsafe path, or propagates
/// I/O errors.
pub fn checkout(worktree_root: &Path, mut files: Vec<(String, Vec<u8>)>) -> Result<(), GitError> {
    files.sort_by(|a, b| a.0.cmp(&b.0));
    for (path, payload) in files {
        if !is_safe_path(&path) {
            return Err(GitError::InvalidArgument(format!("unsafe path {path:?}")));
        }
        let target = worktree_root.join(&path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(target, payload)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn oid(byte: u8) -> Oid {
        Oid::from_bytes(HashAlgo::Sha1, &[byte; 20])
    }

    #[test]
    fn empty_bytes_decode_to_empty_index() {
        let idx = decode_index(&[]).unwrap();
        assert_eq!(idx.version, 2);
        assert!(idx.entries.is_empty());
    }

    #[test]
    fn json_roundtrip() {
        let mut idx = Index::empty();
        idx.entries.push(IndexEntry {
            path: "a.txt".into(),
            oid: oid(1),
            mode: DEFAULT_MODE,
        });
        let bytes = encode_index(&idx);
        assert_eq!(&bytes[..8], &MAGIC);
        assert_eq!(bytes[8], b'{');
        let decoded = decode_index(&bytes).unwrap();
        assert_eq!(decoded.entries, idx.entries);
    }

    #[test]
    fn native_roundtrip_sha1() {
        let mut idx = Index::empty();
        idx.entries.push(IndexEntry {
            path: "a.txt".into(),
            oid: oid(7),
            mode: DEFAULT_MODE,
        });
        idx.entries.push(IndexEntry {
            path: "b/c.txt".into(),
            oid: oid(9),
            mode: DEFAULT_MODE,
        });
        let bytes = write_index_native(&idx, HashAlgo::Sha1);
        let decoded = decode_index(&bytes).unwrap();
        assert_eq!(decoded.entries, idx.entries);
    }

    #[test]
    fn rejects_bad_magic() {
        let err = decode_index(b"NOPEMAGICjunk").unwrap_err();
        assert!(matches!(err, GitError::ObjectFormatError(_)));
    }

    #[test]
    fn add_and_status() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"hello\n").unwrap();
        let odb_dir = dir.path().join("objects");
        let store = ObjectStore::new(&odb_dir, HashAlgo::Sha1);

        let mut idx = Index::empty();
        add(&mut idx, dir.path(), &store, &["a.txt".to_owned()]).unwrap();
        assert_eq!(idx.entries.len(), 1);

        let clean = status(&idx, dir.path(), HashAlgo::Sha1);
        assert_eq!(clean.staged, vec!["a.txt"]);
        assert!(clean.unstaged.is_empty());

        fs::write(dir.path().join("a.txt"), b"changed\n").unwrap();
        let dirty = status(&idx, dir.path(), HashAlgo::Sha1);
        assert_eq!(dirty.unstaged, vec!["a.txt"]);
    }

    #[test]
    fn add_rejects_unsafe_path() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path().join("objects"), HashAlgo::Sha1);
        let mut idx = Index::empty();
        let err = add(&mut idx, dir.path(), &store, &["../escape.txt".to_owned()]).unwrap_err();
        assert!(matches!(err, GitError::InvalidArgument(_)));
    }

    #[test]
    fn checkout_writes_files_in_sorted_order() {
        let dir = tempdir().unwrap();
        checkout(
            dir.path(),
            vec![
                ("b/c.txt".to_owned(), b"c".to_vec()),
                ("a.txt".to_owned(), b"a".to_vec()),
            ],
        )
        .unwrap();
        assert_eq!(fs::read(dir.path().join("a.txt")).unwrap(), b"a");
        assert_eq!(fs::read(dir.path().join("b/c.txt")).unwrap(), b"c");
    }
}
