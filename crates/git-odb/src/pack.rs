//! Opaque pack/bitmap/midx/commit-graph containers.
//!
//! This core never decodes pack wire format or resolves deltas — see
//! spec.md's Non-goals. It only validates that these files look like what
//! they claim to be (a magic-byte sniff, a basename pattern) and that a
//! pack's required companions are present, then hands reads back to the
//! loose-object path.

use std::fs;
use std::path::{Path, PathBuf};

use git_object::Oid;

use crate::error::OdbError;
use crate::store::ObjectStore;

const BITMAP_MAGIC: &[u8] = b"BITM";
const MIDX_MAGIC: &[u8] = b"MIDX";
const COMMIT_GRAPH_MAGIC: &[u8] = b"CGPH";

fn assert_magic(path: &Path, container: &'static str, expected: &[u8]) -> Result<(), OdbError> {
    let bytes = fs::read(path)?;
    if bytes.len() < expected.len() || &bytes[..expected.len()] != expected {
        return Err(OdbError::InvalidContainer {
            container,
            reason: format!("missing {expected:?} magic header"),
        });
    }
    Ok(())
}

/// Validate a `.bitmap` file's `BITM` magic header.
///
/// # Errors
/// Returns [`OdbError::InvalidContainer`] if the file is shorter than the
/// magic or does not start with it, or [`OdbError::Io`] if it cannot be
/// read.
pub fn validate_bitmap(path: &Path) -> Result<(), OdbError> {
    assert_magic(path, "bitmap", BITMAP_MAGIC)
}

/// Validate a multi-pack-index file's `MIDX` magic header.
///
/// # Errors
/// See [`validate_bitmap`].
pub fn validate_midx(path: &Path) -> Result<(), OdbError> {
    assert_magic(path, "multi-pack-index", MIDX_MAGIC)
}

/// Validate a commit-graph file's `CGPH` magic header.
///
/// # Errors
/// See [`validate_bitmap`].
pub fn validate_commit_graph(path: &Path) -> Result<(), OdbError> {
    assert_magic(path, "commit-graph", COMMIT_GRAPH_MAGIC)
}

/// `true` if `basename` matches `pack-[0-9a-f]{40,64}` (lowercase hex, 40
/// or 64 characters — one length per supported hash algorithm).
#[must_use]
pub fn is_valid_pack_basename(basename: &str) -> bool {
    let Some(hex) = basename.strip_prefix("pack-") else {
        return false;
    };
    matches!(hex.len(), 40 | 64) && hex.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Confirm a pack's `.pack` and `.idx` companions both exist, then read
/// `oid` through the plain loose-object path. This core never indexes into
/// pack entries directly — partial-clone backfill and any real pack
/// consumer built on top of this crate must supply the loose shadow copy
/// this falls through to.
///
/// # Errors
/// Returns [`OdbError::IncompletePack`] if either companion file is
/// missing, or whatever [`ObjectStore::read_object`] returns otherwise.
pub fn read_object_from_pack(
    store: &ObjectStore,
    pack_dir: &Path,
    pack_base: &str,
    oid: &Oid,
) -> Result<Vec<u8>, OdbError> {
    let pack_path: PathBuf = pack_dir.join(format!("{pack_base}.pack"));
    let idx_path: PathBuf = pack_dir.join(format!("{pack_base}.idx"));

    if !pack_path.is_file() {
        return Err(OdbError::IncompletePack {
            base: pack_base.to_owned(),
            missing: "pack",
        });
    }
    if !idx_path.is_file() {
        return Err(OdbError::IncompletePack {
            base: pack_base.to_owned(),
            missing: "idx",
        });
    }

    store.read_object(oid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_basename_accepts_sha1_and_sha256_lengths() {
        assert!(is_valid_pack_basename(&format!("pack-{}", "a".repeat(40))));
        assert!(is_valid_pack_basename(&format!("pack-{}", "a".repeat(64))));
    }

    #[test]
    fn pack_basename_rejects_bad_shape() {
        assert!(!is_valid_pack_basename("pack-xyz"));
        assert!(!is_valid_pack_basename(&format!("PACK-{}", "a".repeat(40))));
        assert!(!is_valid_pack_basename(&"a".repeat(40)));
    }

    #[test]
    fn magic_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.bitmap");
        fs::write(&path, b"nope").unwrap();
        let err = validate_bitmap(&path).unwrap_err();
        assert!(matches!(err, OdbError::InvalidContainer { .. }));
    }

    #[test]
    fn midx_magic_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("multi-pack-index");
        fs::write(&path, b"MIDXrest-of-file").unwrap();
        validate_midx(&path).unwrap();
    }

    #[test]
    fn incomplete_pack_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::new(dir.path(), git_hash::HashAlgo::Sha1);
        let oid = Oid::zero(git_hash::HashAlgo::Sha1);
        let err = read_object_from_pack(&store, dir.path(), "pack-deadbeef", &oid).unwrap_err();
        assert!(matches!(err, OdbError::IncompletePack { .. }));
    }
}
