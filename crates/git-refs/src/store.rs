//! The ref store façade: resolve, list, create, update, delete, verify.
//!
//! Mutation here is compare-and-swap-free by design (spec.md §4.6) — a
//! caller that needs CAS (receive-pack) resolves, checks, and mutates
//! under its own lock; this crate only guarantees each individual
//! operation is internally consistent.

use std::fs;
use std::path::{Path, PathBuf};

use git_hash::HashAlgo;
use git_object::Oid;
use tracing::debug;

use crate::error::RefsError;
use crate::{name, packed, reflog};

const HEAD: &str = "HEAD";

/// A repository's ref store, rooted at its git directory (the directory
/// containing `HEAD`, `refs/`, `packed-refs`, and `logs/`).
pub struct RefStore {
    git_dir: PathBuf,
    algo: HashAlgo,
}

impl RefStore {
    /// Open a ref store rooted at `git_dir`.
    #[must_use]
    pub fn new(git_dir: impl Into<PathBuf>, algo: HashAlgo) -> Self {
        Self {
            git_dir: git_dir.into(),
            algo,
        }
    }

    fn loose_path(&self, name: &str) -> PathBuf {
        self.git_dir.join(name)
    }

    fn packed_refs_path(&self) -> PathBuf {
        self.git_dir.join("packed-refs")
    }

    fn reflog_path(&self, name: &str) -> PathBuf {
        self.git_dir.join("logs").join(name)
    }

    fn read_loose(&self, name: &str) -> Result<Option<Oid>, RefsError> {
        match fs::read_to_string(self.loose_path(name)) {
            Ok(contents) => {
                let trimmed = contents.trim();
                let oid = Oid::parse(trimmed).map_err(|e| RefsError::Malformed {
                    name: name.to_owned(),
                    reason: e.to_string(),
                })?;
                Ok(Some(oid))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RefsError::Io(e)),
        }
    }

    /// Resolve `name` (normalized first) to an OID: loose file first, then
    /// `packed-refs`. Loose wins if both are present.
    ///
    /// # Errors
    /// Returns [`RefsError::Malformed`] if the loose file's content is not
    /// a valid OID line, or [`RefsError::PackedRefsFormat`]/[`RefsError::Io`]
    /// propagated from the packed-refs read.
    pub fn resolve_ref(&self, name: &str) -> Result<Option<Oid>, RefsError> {
        let normalized = name::normalize(name);
        if let Some(oid) = self.read_loose(&normalized)? {
            return Ok(Some(oid));
        }
        let packed = packed::read(&self.packed_refs_path(), self.algo)?;
        Ok(packed
            .into_iter()
            .find(|(n, _)| n == &normalized)
            .map(|(_, oid)| oid))
    }

    /// Resolve `HEAD`: a symbolic ref (`ref: <name>`) resolves through
    /// [`RefStore::resolve_ref`]; a bare OID line is returned as-is.
    ///
    /// # Errors
    /// Returns [`RefsError::UnresolvableHead`] if `HEAD` is missing,
    /// points at a ref that does not resolve, or is neither form.
    pub fn resolve_head(&self) -> Result<Oid, RefsError> {
        let contents = fs::read_to_string(self.loose_path(HEAD)).map_err(|e| {
            RefsError::UnresolvableHead {
                reason: e.to_string(),
            }
        })?;
        let trimmed = contents.trim();
        if let Some(target) = trimmed.strip_prefix("ref: ") {
            return self.resolve_ref(target)?.ok_or_else(|| RefsError::UnresolvableHead {
                reason: format!("HEAD points at {target}, which does not resolve"),
            });
        }
        Oid::parse(trimmed).map_err(|e| RefsError::UnresolvableHead {
            reason: e.to_string(),
        })
    }

    /// `true` if `HEAD` is a symbolic ref, returning the target name.
    ///
    /// # Errors
    /// Returns [`RefsError::Io`] if `HEAD` cannot be read.
    pub fn head_target(&self) -> Result<Option<String>, RefsError> {
        match fs::read_to_string(self.loose_path(HEAD)) {
            Ok(contents) => Ok(contents.trim().strip_prefix("ref: ").map(str::to_owned)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RefsError::Io(e)),
        }
    }

    /// List every ref whose name matches `prefix` per spec.md §4.6's
    /// prefix semantics, as the union of loose and packed refs (loose
    /// shadows packed). Returned in lexicographic order by name.
    ///
    /// # Errors
    /// Propagates I/O and parse errors from walking `refs/` or reading
    /// `packed-refs`.
    pub fn list_refs(&self, prefix: &str) -> Result<Vec<(String, Oid)>, RefsError> {
        let mut seen = std::collections::BTreeMap::new();

        for (n, oid) in packed::read(&self.packed_refs_path(), self.algo)? {
            if name::matches_prefix(&n, prefix) {
                seen.insert(n, oid);
            }
        }

        let refs_root = self.git_dir.join("refs");
        if refs_root.is_dir() {
            self.walk_loose_refs(&refs_root, "refs", prefix, &mut seen)?;
        }

        Ok(seen.into_iter().collect())
    }

    fn walk_loose_refs(
        &self,
        dir: &Path,
        rel_prefix: &str,
        filter: &str,
        out: &mut std::collections::BTreeMap<String, Oid>,
    ) -> Result<(), RefsError> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            let rel = format!("{rel_prefix}/{file_name}");
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                self.walk_loose_refs(&entry.path(), &rel, filter, out)?;
            } else if name::matches_prefix(&rel, filter) {
                if let Some(oid) = self.read_loose(&rel)? {
                    out.insert(rel, oid);
                }
            }
        }
        Ok(())
    }

    /// Write `new_oid` to `name` (normalized), appending a reflog entry
    /// with the previous value (the zero OID if the ref did not exist).
    ///
    /// # Errors
    /// Returns [`RefsError::Io`] if the ref file or reflog cannot be
    /// written.
    pub fn update_ref(&self, name: &str, new_oid: &Oid, message: &str) -> Result<(), RefsError> {
        let normalized = name::normalize(name);
        let old_oid = self
            .resolve_ref(&normalized)?
            .unwrap_or_else(|| Oid::zero(self.algo));

        let path = self.loose_path(&normalized);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, format!("{new_oid}\n"))?;
        reflog::append(&self.reflog_path(&normalized), &old_oid, new_oid, message)?;
        debug!(ref_name = %normalized, %new_oid, "updated ref");
        Ok(())
    }

    /// Create `name` at `oid`, failing if it already resolves.
    ///
    /// # Errors
    /// Returns [`RefsError::AlreadyExists`] if `name` already resolves, or
    /// propagates [`RefStore::update_ref`]'s errors.
    pub fn create_ref(&self, name: &str, oid: &Oid, message: &str) -> Result<(), RefsError> {
        let normalized = name::normalize(name);
        if self.resolve_ref(&normalized)?.is_some() {
            return Err(RefsError::AlreadyExists { name: normalized });
        }
        self.update_ref(&normalized, oid, message)
    }

    /// Delete `name`, failing if it does not resolve. Removes the loose
    /// file (if present) and drops the matching `packed-refs` entry (if
    /// present), then appends a reflog entry with `new = zero`.
    ///
    /// # Errors
    /// Returns [`RefsError::NotFound`] if `name` does not resolve, or
    /// propagates I/O errors from the loose/packed-refs rewrite.
    pub fn delete_ref(&self, name: &str, message: &str) -> Result<(), RefsError> {
        let normalized = name::normalize(name);
        let Some(old_oid) = self.resolve_ref(&normalized)? else {
            return Err(RefsError::NotFound { name: normalized });
        };

        let loose_path = self.loose_path(&normalized);
        if loose_path.is_file() {
            fs::remove_file(&loose_path)?;
        }

        let packed_path = self.packed_refs_path();
        let entries = packed::read(&packed_path, self.algo)?;
        if entries.iter().any(|(n, _)| n == &normalized) {
            let remaining: Vec<_> = entries.into_iter().filter(|(n, _)| n != &normalized).collect();
            packed::write(&packed_path, &remaining)?;
        }

        reflog::append(
            &self.reflog_path(&normalized),
            &old_oid,
            &Oid::zero(self.algo),
            message,
        )?;
        debug!(ref_name = %normalized, "deleted ref");
        Ok(())
    }

    /// `true` iff `name` resolves to exactly `oid`.
    ///
    /// # Errors
    /// Propagates [`RefStore::resolve_ref`]'s errors.
    pub fn verify_ref(&self, name: &str, oid: &Oid) -> Result<bool, RefsError> {
        Ok(self.resolve_ref(name)?.as_ref() == Some(oid))
    }
}
