//! Ports consumed by the core (spec.md §6): compression, filesystem,
//! credentials, hooks, and signature verification. `Repo` is generic over
//! these traits rather than hard-wiring a platform; this workspace ships
//! a `Native*` implementation of each for direct use, and leaves runtime-
//! specific adapters (sandboxed FS, real SSH/HTTP transports, OS
//! keychains, GPG) to the embedding application — out of scope here per
//! spec.md §1.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use git_hash::InflateLimits;

use crate::error::GitError;

/// `deflateRaw`/`inflateRaw` (spec.md §4.2), as a port so an embedder can
/// swap in a platform-provided streaming primitive.
pub trait CompressionPort {
    /// Raw-DEFLATE compress `bytes`.
    ///
    /// # Errors
    /// Returns [`GitError::IntegrityError`] on a compression failure.
    fn deflate_raw(&self, bytes: &[u8]) -> Result<Vec<u8>, GitError>;

    /// Raw-DEFLATE decompress `bytes`, enforcing `limits`.
    ///
    /// # Errors
    /// Returns [`GitError::IntegrityError`] if decompression fails or
    /// exceeds `limits`.
    fn inflate_raw(&self, bytes: &[u8], limits: InflateLimits) -> Result<Vec<u8>, GitError>;
}

/// Directory-entry kind, as reported by [`FilesystemPort::readdir`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A regular file.
    File,
    /// A directory.
    Directory,
    /// A symlink, socket, or other non-file/directory entry.
    Other,
}

/// One directory entry: its file name and kind.
#[derive(Debug, Clone)]
pub struct DirEntry {
    /// The entry's bare file name (not a full path).
    pub name: String,
    /// What kind of filesystem object it is.
    pub kind: EntryKind,
}

/// The filesystem operations the core needs (spec.md §6): `mkdir`,
/// `readFile`, `writeFile`, `appendFile`, `readdir`, `stat`, `unlink`.
pub trait FilesystemPort {
    /// Create `path` and all missing parent directories.
    ///
    /// # Errors
    /// Propagates the underlying I/O failure.
    fn mkdir_recursive(&self, path: &Path) -> Result<(), GitError>;

    /// Read the full contents of `path`.
    ///
    /// # Errors
    /// Returns [`GitError::NotFound`] if `path` does not exist, or
    /// propagates other I/O failures.
    fn read_file(&self, path: &Path) -> Result<Vec<u8>, GitError>;

    /// Write `bytes` to `path`, replacing any existing content.
    ///
    /// # Errors
    /// Propagates the underlying I/O failure.
    fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<(), GitError>;

    /// Append `text` to `path`, creating it if absent.
    ///
    /// # Errors
    /// Propagates the underlying I/O failure.
    fn append_file(&self, path: &Path, text: &str) -> Result<(), GitError>;

    /// List `path`'s immediate entries.
    ///
    /// # Errors
    /// Returns [`GitError::NotFound`] if `path` is not a directory, or
    /// propagates other I/O failures.
    fn readdir(&self, path: &Path) -> Result<Vec<DirEntry>, GitError>;

    /// `true` if `path` exists.
    fn stat_exists(&self, path: &Path) -> bool;

    /// Remove the file at `path`.
    ///
    /// # Errors
    /// Propagates the underlying I/O failure.
    fn unlink(&self, path: &Path) -> Result<(), GitError>;
}

/// A resolved credential: username plus secret (password, token, or
/// passphrase).
#[derive(Debug, Clone)]
pub struct Credential {
    /// The account/user name.
    pub username: String,
    /// The secret value. Never logged; callers must redact it in any
    /// progress output (spec.md §4.14 step 2).
    pub secret: String,
}

/// Resolves credentials for a URL (spec.md §6), used by SSH clone/fetch/
/// push. Returns `None` when no credential is available.
pub trait CredentialPort {
    /// Look up a credential for `url`.
    fn get(&self, url: &str) -> Option<Credential>;
}

/// One hook invocation request. `env` is sorted lexicographically by key
/// before dispatch (spec.md §6), so hook behavior never depends on
/// caller-supplied map ordering.
#[derive(Debug, Clone)]
pub struct HookRequest {
    /// The hook's name (e.g. `"pre-commit"`).
    pub name: String,
    /// Arguments passed to the hook.
    pub argv: Vec<String>,
    /// Bytes piped to the hook's stdin.
    pub stdin: Vec<u8>,
    /// Environment variables, sorted lex by key before dispatch.
    pub env: BTreeMap<String, String>,
}

/// The result of a hook invocation.
#[derive(Debug, Clone)]
pub struct HookResult {
    /// The hook process's exit code.
    pub exit_code: i32,
    /// Captured stdout.
    pub stdout: Vec<u8>,
    /// Captured stderr.
    pub stderr: Vec<u8>,
}

/// Executes repository hooks (spec.md §6).
pub trait HookPort {
    /// Run `request`, returning its outcome.
    ///
    /// # Errors
    /// Returns [`GitError::IoError`] if the hook could not be spawned.
    fn execute(&self, request: &HookRequest) -> Result<HookResult, GitError>;
}

/// Verifies a detached signature over a payload (spec.md §6). This core
/// never produces signatures (Non-goal); it only wraps a verifier.
pub trait SignaturePort {
    /// `true` iff `signature` is valid over `payload`.
    fn verify(&self, payload: &[u8], signature: &[u8]) -> bool;
}

/// Direct `std::fs`/`git_hash` bindings for [`CompressionPort`] and
/// [`FilesystemPort`] — these concerns are platform-independent enough
/// that there is no meaningful adapter seam beyond the trait itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeCompression;

impl CompressionPort for NativeCompression {
    fn deflate_raw(&self, bytes: &[u8]) -> Result<Vec<u8>, GitError> {
        git_hash::deflate_raw(bytes).map_err(GitError::from)
    }

    fn inflate_raw(&self, bytes: &[u8], limits: InflateLimits) -> Result<Vec<u8>, GitError> {
        git_hash::inflate_raw(bytes, limits).map_err(GitError::from)
    }
}

/// Direct `std::fs` bindings for [`FilesystemPort`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeFilesystem;

impl FilesystemPort for NativeFilesystem {
    fn mkdir_recursive(&self, path: &Path) -> Result<(), GitError> {
        fs::create_dir_all(path).map_err(GitError::from)
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>, GitError> {
        fs::read(path).map_err(GitError::from)
    }

    fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<(), GitError> {
        fs::write(path, bytes).map_err(GitError::from)
    }

    fn append_file(&self, path: &Path, text: &str) -> Result<(), GitError> {
        use std::io::Write;
        let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(text.as_bytes()).map_err(GitError::from)
    }

    fn readdir(&self, path: &Path) -> Result<Vec<DirEntry>, GitError> {
        let mut out = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let kind = match entry.file_type()? {
                t if t.is_dir() => EntryKind::Directory,
                t if t.is_file() => EntryKind::File,
                _ => EntryKind::Other,
            };
            out.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind,
            });
        }
        Ok(out)
    }

    fn stat_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn unlink(&self, path: &Path) -> Result<(), GitError> {
        fs::remove_file(path).map_err(GitError::from)
    }
}

/// A credential port that never has a credential. SSH transports need a
/// real one injected by the embedding application.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeCredentials;

impl CredentialPort for NativeCredentials {
    fn get(&self, _url: &str) -> Option<Credential> {
        None
    }
}

/// A hook port that runs nothing and reports success. An embedding
/// application that wants real hook execution (fork/exec, sandboxing)
/// supplies its own [`HookPort`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeHooks;

impl HookPort for NativeHooks {
    fn execute(&self, _request: &HookRequest) -> Result<HookResult, GitError> {
        Ok(HookResult {
            exit_code: 0,
            stdout: Vec::new(),
            stderr: Vec::new(),
        })
    }
}

/// A signature port that rejects everything. Real verification (GPG,
/// SSH, X.509) is a runtime-specific adapter (spec.md §1 Non-goals).
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeSignatures;

impl SignaturePort for NativeSignatures {
    fn verify(&self, _payload: &[u8], _signature: &[u8]) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn native_filesystem_roundtrips() {
        let dir = tempdir().unwrap();
        let fs_port = NativeFilesystem;
        let path = dir.path().join("a/b.txt");
        fs_port.mkdir_recursive(path.parent().unwrap()).unwrap();
        fs_port.write_file(&path, b"hello").unwrap();
        assert_eq!(fs_port.read_file(&path).unwrap(), b"hello");
        assert!(fs_port.stat_exists(&path));
        fs_port.unlink(&path).unwrap();
        assert!(!fs_port.stat_exists(&path));
    }

    #[test]
    fn native_compression_roundtrips() {
        let port = NativeCompression;
        let compressed = port.deflate_raw(b"payload").unwrap();
        let limits = InflateLimits::default();
        assert_eq!(port.inflate_raw(&compressed, limits).unwrap(), b"payload");
    }

    #[test]
    fn native_credentials_and_signatures_are_inert() {
        assert!(NativeCredentials.get("https://example.com").is_none());
        assert!(!NativeSignatures.verify(b"payload", b"sig"));
    }
}
