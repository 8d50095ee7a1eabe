//! Commit payload parsing: `tree`/`parent` header lines, identities, message.

use git_hash::HashAlgo;
use thiserror::Error;

use crate::oid::{Oid, OidParseError};

/// A parsed commit object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitInfo {
    /// OID of the tree this commit points to.
    pub tree_oid: Oid,
    /// OIDs of parent commits (empty for root commits).
    pub parents: Vec<Oid>,
    /// Author identity line, verbatim (`"Name <email> <seconds> <tz>"`).
    pub author: String,
    /// Committer identity line, verbatim.
    pub committer: String,
    /// The commit message, including any trailers, with the blank-line
    /// separator from the header already stripped.
    pub message: String,
}

/// Errors parsing a commit payload.
#[derive(Debug, Error)]
pub enum CommitFormatError {
    /// The payload was missing a required `tree` header line.
    #[error("commit is missing a tree header")]
    MissingTree,

    /// A `tree`/`parent` header line's OID did not parse.
    #[error("invalid OID in commit header: {0}")]
    InvalidOid(#[from] OidParseError),

    /// A header line was not valid UTF-8.
    #[error("commit header is not valid utf-8")]
    NotUtf8,
}

/// Parse a commit object's payload into its structured fields.
///
/// Follows the header-then-blank-line-then-message shape: `tree` is
/// required and must come first; zero or more `parent` lines follow;
/// `author`/`committer` lines are passed through verbatim (this crate does
/// not parse timestamps out of them); any other header line (`gpgsig`,
/// `encoding`, a multi-line signature continuation starting with a space)
/// is ignored and dropped, matching the Non-goal that signature
/// verification is out of scope.
///
/// # Errors
/// Returns [`CommitFormatError`] if the payload is not UTF-8, has no `tree`
/// line, or a `tree`/`parent` line's OID fails to parse.
pub fn parse_commit(_algo: HashAlgo, payload: &[u8]) -> Result<CommitInfo, CommitFormatError> {
    let text = std::str::from_utf8(payload).map_err(|_| CommitFormatError::NotUtf8)?;
    let (header, message) = match text.split_once("\n\n") {
        Some((h, m)) => (h, m),
        None => (text.trim_end_matches('\n'), ""),
    };

    let mut tree_oid = None;
    let mut parents = Vec::new();
    let mut author = String::new();
    let mut committer = String::new();

    for line in header.lines() {
        if line.starts_with(' ') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("tree ") {
            tree_oid = Some(rest.parse::<Oid>()?);
        } else if let Some(rest) = line.strip_prefix("parent ") {
            parents.push(rest.parse::<Oid>()?);
        } else if let Some(rest) = line.strip_prefix("author ") {
            author = rest.to_owned();
        } else if let Some(rest) = line.strip_prefix("committer ") {
            committer = rest.to_owned();
        }
        // Any other header line (gpgsig, encoding, mergetag, ...) is ignored.
    }

    Ok(CommitInfo {
        tree_oid: tree_oid.ok_or(CommitFormatError::MissingTree)?,
        parents,
        author,
        committer,
        message: message.to_owned(),
    })
}

/// Encode a [`CommitInfo`] back into a commit object's payload.
#[must_use]
pub fn encode_commit(info: &CommitInfo) -> Vec<u8> {
    let mut out = format!("tree {}\n", info.tree_oid);
    for parent in &info.parents {
        out.push_str(&format!("parent {parent}\n"));
    }
    out.push_str(&format!("author {}\n", info.author));
    out.push_str(&format!("committer {}\n", info.committer));
    out.push('\n');
    out.push_str(&info.message);
    out.into_bytes()
}
