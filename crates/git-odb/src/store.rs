//! The loose object store: sharded, content-addressed, idempotent writes.

use std::fs;
use std::path::{Path, PathBuf};

use git_hash::{HashAlgo, InflateLimits};
use git_object::{Object, ObjectKind, Oid};
use tracing::{debug, trace};

use crate::error::OdbError;

/// An open object database rooted at a repository's `objects/` directory.
pub struct ObjectStore {
    objects_dir: PathBuf,
    algo: HashAlgo,
    limits: InflateLimits,
}

/// A decoded envelope plus its on-disk size, as needed by repo statistics.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// The object's type.
    pub kind: ObjectKind,
    /// The object's uncompressed payload.
    pub payload: Vec<u8>,
    /// The compressed size of the file on disk.
    pub disk_size: u64,
}

impl ObjectStore {
    /// Open a store rooted at `objects_dir` (typically `<gitdir>/objects`).
    /// Does not require the directory to exist yet — it is created lazily
    /// by the first write.
    #[must_use]
    pub fn new(objects_dir: impl Into<PathBuf>, algo: HashAlgo) -> Self {
        Self {
            objects_dir: objects_dir.into(),
            algo,
            limits: InflateLimits::default(),
        }
    }

    /// Override the inflate guard limits (tests use tighter bounds than the
    /// production default).
    #[must_use]
    pub const fn with_limits(mut self, limits: InflateLimits) -> Self {
        self.limits = limits;
        self
    }

    fn shard_path(&self, oid: &Oid) -> PathBuf {
        let hex = oid.to_string();
        self.objects_dir.join(&hex[..2]).join(&hex[2..])
    }

    /// Hash, encode, and raw-deflate `payload`, writing it at
    /// `objects/<oid[0:2]>/<oid[2:]>` iff the object is not already
    /// present. Re-writes of an existing object are skipped, not
    /// overwritten — loose objects are immutable once written.
    ///
    /// # Errors
    /// Returns [`OdbError::Io`] if the directory cannot be created or the
    /// file cannot be written.
    pub fn write_loose(&self, kind: ObjectKind, payload: Vec<u8>) -> Result<Oid, OdbError> {
        let object = Object::new(self.algo, kind, payload);
        let path = self.shard_path(object.oid());

        if path.exists() {
            trace!(oid = %object.oid(), "loose object already present, skipping write");
            return Ok(object.oid().clone());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let encoded = object.encode_loose().map_err(OdbError::from)?;
        fs::write(&path, encoded)?;
        debug!(oid = %object.oid(), kind = %kind, "wrote loose object");
        Ok(object.oid().clone())
    }

    /// Read and decode a loose object's payload only, discarding its type.
    ///
    /// # Errors
    /// Returns [`OdbError::NotFound`] if no loose file exists for `oid`, or
    /// a decode error if the file is present but malformed.
    pub fn read_object(&self, oid: &Oid) -> Result<Vec<u8>, OdbError> {
        Ok(self.read_envelope(oid)?.payload)
    }

    /// Read a loose object, returning its type, payload, and the
    /// compressed on-disk size (used for repository statistics).
    ///
    /// # Errors
    /// Returns [`OdbError::NotFound`] if the file is absent, or a decode
    /// error if inflation or envelope parsing fails.
    pub fn read_envelope(&self, oid: &Oid) -> Result<Envelope, OdbError> {
        let path = self.shard_path(oid);
        let bytes = fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                OdbError::NotFound {
                    oid: oid.to_string(),
                }
            } else {
                OdbError::Io(e)
            }
        })?;
        let disk_size = bytes.len() as u64;
        let object = Object::decode_loose(self.algo, &bytes, self.limits)?;
        Ok(Envelope {
            kind: object.kind(),
            payload: object.payload().to_vec(),
            disk_size,
        })
    }

    /// Write a loose blob directly at `oid`, without recomputing or
    /// verifying its hash against `payload`. Used only by the partial-clone
    /// backfill path (spec.md §4.13), where `oid` comes from a promisor
    /// table the caller has already decided to trust. Idempotent like
    /// [`ObjectStore::write_loose`].
    ///
    /// # Errors
    /// Returns [`OdbError::Io`] if the directory cannot be created or the
    /// file cannot be written.
    pub fn write_loose_trusted(&self, oid: &Oid, kind: ObjectKind, payload: &[u8]) -> Result<(), OdbError> {
        let path = self.shard_path(oid);
        if path.exists() {
            trace!(%oid, "trusted loose object already present, skipping write");
            return Ok(());
        }
        let header = format!("{kind} {}\0", payload.len());
        let mut raw = header.into_bytes();
        raw.extend_from_slice(payload);
        let encoded = git_hash::deflate_raw(&raw).map_err(OdbError::from)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, encoded)?;
        debug!(%oid, kind = %kind, "wrote trusted loose object");
        Ok(())
    }

    /// `true` if a loose file exists for `oid`. Does not attempt to decode
    /// it.
    #[must_use]
    pub fn has_loose(&self, oid: &Oid) -> bool {
        self.shard_path(oid).exists()
    }

    /// The `objects/` directory this store is rooted at.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.objects_dir
    }

    /// Enumerate every loose object present on disk, by walking the two-
    /// level shard layout. Skips the `info` and `pack` subdirectories
    /// (neither holds loose objects). Used by maintenance reachability
    /// reporting and pruning.
    ///
    /// # Errors
    /// Propagates I/O errors from `readdir`.
    pub fn list_loose_oids(&self) -> Result<Vec<Oid>, OdbError> {
        let mut out = Vec::new();
        if !self.objects_dir.is_dir() {
            return Ok(out);
        }
        for shard_entry in fs::read_dir(&self.objects_dir)? {
            let shard_entry = shard_entry?;
            let shard_name = shard_entry.file_name();
            let shard_name = shard_name.to_string_lossy();
            if !shard_entry.file_type()?.is_dir() || shard_name.len() != 2 {
                continue;
            }
            for rest_entry in fs::read_dir(shard_entry.path())? {
                let rest_entry = rest_entry?;
                if !rest_entry.file_type()?.is_file() {
                    continue;
                }
                let rest_name = rest_entry.file_name();
                let hex = format!("{shard_name}{}", rest_name.to_string_lossy());
                if let Ok(oid) = hex.parse() {
                    out.push(oid);
                }
            }
        }
        Ok(out)
    }

    /// Remove a loose object's on-disk file, ignoring a not-found error
    /// (already absent is not a failure for a pruning pass).
    ///
    /// # Errors
    /// Propagates I/O errors other than not-found.
    pub fn remove_loose(&self, oid: &Oid) -> Result<(), OdbError> {
        match fs::remove_file(self.shard_path(oid)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(OdbError::Io(e)),
        }
    }
}
