//! The full error taxonomy (spec.md §7) every public operation surfaces.

use git_odb::OdbError;
use git_refs::RefsError;
use thiserror::Error;

/// Every error this crate's public API can return, tagged by kind rather
/// than by call site — callers branch on the variant, not on a message.
#[derive(Debug, Error)]
pub enum GitError {
    /// A caller-supplied argument failed validation before any I/O
    /// happened.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The requested object/ref/path/entry does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// An operation that requires absence found the target present.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The filesystem denied access.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A filesystem operation failed for a reason other than permission.
    #[error("I/O error: {0}")]
    IoError(String),

    /// A compare-and-swap ref update's `old` did not match the current
    /// value.
    #[error("lock conflict on {ref_name}: expected {expected}, found {actual}")]
    LockConflict {
        /// The ref being updated.
        ref_name: String,
        /// The caller's expected old OID.
        expected: String,
        /// The OID actually found.
        actual: String,
    },

    /// A loose/pack object's envelope or header was malformed.
    #[error("object format error: {0}")]
    ObjectFormatError(String),

    /// A pack-adjacent container's magic bytes or basename were invalid,
    /// or a declared pack companion was missing.
    #[error("pack format error: {0}")]
    PackFormatError(String),

    /// A wire-protocol frame or capability negotiation failed.
    #[error("protocol error: {0}")]
    ProtoError(String),

    /// The operation is recognized but not implemented by this core (e.g.
    /// a filter capability the peer didn't advertise).
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Decompression exceeded its configured limits, or trusted promisor
    /// content failed validation.
    #[error("integrity error: {0}")]
    IntegrityError(String),

    /// A network request failed; `status` carries the upstream HTTP status
    /// when known.
    #[error("network error: {message}")]
    NetworkError {
        /// Human-readable detail.
        message: String,
        /// The upstream HTTP status code, if any.
        status: Option<u16>,
    },

    /// An operation exceeded its time budget. Not used internally — this
    /// core does not model timeouts (spec.md §5) — but is part of the
    /// taxonomy callers may map external cancellation onto.
    #[error("timeout: {0}")]
    Timeout(String),

    /// The operation was cancelled by its caller.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// A credential port returned no credential for a URL that required
    /// one.
    #[error("authentication required: {0}")]
    AuthRequired(String),

    /// A supplied credential was rejected by the remote.
    #[error("authentication rejected: {0}")]
    AuthRejected(String),

    /// A merge produced conflicting hunks. This core does not implement
    /// merge (Non-goal); reserved for a layer built on top.
    #[error("merge conflict: {0}")]
    MergeConflict(String),

    /// A rebase step could not be applied cleanly.
    #[error("rebase conflict: {0}")]
    RebaseConflict(String),

    /// A signature Port reported a payload/signature pair as invalid.
    #[error("signature invalid: {0}")]
    SignatureInvalid(String),
}

impl From<std::io::Error> for GitError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(e.to_string()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(e.to_string()),
            std::io::ErrorKind::AlreadyExists => Self::AlreadyExists(e.to_string()),
            _ => Self::IoError(e.to_string()),
        }
    }
}

impl From<OdbError> for GitError {
    fn from(e: OdbError) -> Self {
        match e {
            OdbError::NotFound { oid } => Self::NotFound(format!("object {oid}")),
            OdbError::ObjectFormat(e) => Self::ObjectFormatError(e.to_string()),
            OdbError::Compression(e) => Self::IntegrityError(e.to_string()),
            OdbError::InvalidContainer { .. } | OdbError::IncompletePack { .. } => {
                Self::PackFormatError(e.to_string())
            }
            OdbError::Io(e) => e.into(),
        }
    }
}

impl From<RefsError> for GitError {
    fn from(e: RefsError) -> Self {
        match e {
            RefsError::AlreadyExists { name } => Self::AlreadyExists(format!("ref {name}")),
            RefsError::NotFound { name } => Self::NotFound(format!("ref {name}")),
            RefsError::UnresolvableHead { reason } => Self::NotFound(format!("HEAD: {reason}")),
            RefsError::Malformed { .. } | RefsError::PackedRefsFormat(_) => {
                Self::ObjectFormatError(e.to_string())
            }
            RefsError::Io(e) => e.into(),
        }
    }
}

impl From<git_object::ObjectFormatError> for GitError {
    fn from(e: git_object::ObjectFormatError) -> Self {
        Self::ObjectFormatError(e.to_string())
    }
}

impl From<git_object::TreeFormatError> for GitError {
    fn from(e: git_object::TreeFormatError) -> Self {
        Self::ObjectFormatError(e.to_string())
    }
}

impl From<git_object::CommitFormatError> for GitError {
    fn from(e: git_object::CommitFormatError) -> Self {
        Self::ObjectFormatError(e.to_string())
    }
}

impl From<git_hash::CompressionError> for GitError {
    fn from(e: git_hash::CompressionError) -> Self {
        Self::IntegrityError(e.to_string())
    }
}

impl From<serde_json::Error> for GitError {
    fn from(e: serde_json::Error) -> Self {
        Self::ObjectFormatError(format!("invalid JSON: {e}"))
    }
}
