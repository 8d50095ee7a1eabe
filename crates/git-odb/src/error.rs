//! Errors surfaced by this crate's store, pack, and walk operations.

use git_hash::CompressionError;
use git_object::ObjectFormatError;
use thiserror::Error;

/// Errors from object storage, pack passthrough, and tree/history walks.
#[derive(Debug, Error)]
pub enum OdbError {
    /// The requested object does not exist on disk.
    #[error("object {oid} not found")]
    NotFound {
        /// The OID that was looked up.
        oid: String,
    },

    /// A loose object's envelope failed to decode.
    #[error(transparent)]
    ObjectFormat(#[from] ObjectFormatError),

    /// Raw-DEFLATE compression/decompression failed.
    #[error(transparent)]
    Compression(#[from] CompressionError),

    /// A pack-adjacent container's magic bytes or basename didn't match
    /// what this core requires (spec.md §4.5): `DIRC` for `.idx`, `BITM`
    /// for `.bitmap`, `MIDX` for a multi-pack-index, `CGPH` for a
    /// commit-graph, or `pack-[0-9a-f]{40,64}` for a pack basename.
    #[error("{container} has an invalid format: {reason}")]
    InvalidContainer {
        /// Which container failed validation.
        container: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// The `.pack` or `.idx` companion file for a pack-backed object was
    /// missing.
    #[error("pack {base} is missing its {missing} file")]
    IncompletePack {
        /// The pack's base name (`pack-<hex>`).
        base: String,
        /// Which companion file was absent (`"pack"` or `"idx"`).
        missing: &'static str,
    },

    /// Filesystem I/O failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
