//! Errors surfaced by ref resolution, mutation, and packed-refs handling.

use thiserror::Error;

/// Errors from this crate's ref-store operations.
#[derive(Debug, Error)]
pub enum RefsError {
    /// `createRef` was called for a name that already resolves.
    #[error("ref {name:?} already exists")]
    AlreadyExists {
        /// The ref name that already resolved.
        name: String,
    },

    /// `deleteRef`/`verifyRef` was called for a name that does not resolve.
    #[error("ref {name:?} not found")]
    NotFound {
        /// The ref name that failed to resolve.
        name: String,
    },

    /// HEAD pointed at a symbolic ref that itself did not resolve, or HEAD
    /// was neither `ref: <name>` nor a bare OID.
    #[error("HEAD is unresolvable: {reason}")]
    UnresolvableHead {
        /// Why HEAD could not be resolved.
        reason: String,
    },

    /// A loose ref file's contents were not a valid OID line.
    #[error("ref {name:?} contains invalid content: {reason}")]
    Malformed {
        /// The ref name with bad contents.
        name: String,
        /// What was wrong with it.
        reason: String,
    },

    /// `packed-refs` could not be parsed.
    #[error("packed-refs is malformed: {0}")]
    PackedRefsFormat(String),

    /// Filesystem I/O failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
