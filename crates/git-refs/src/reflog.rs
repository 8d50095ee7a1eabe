//! Reflog append: one line per ref mutation, at `logs/<refname>`.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use git_hash::HashAlgo;
use git_object::Oid;

use crate::error::RefsError;

/// Append one reflog line: `"<old> <new> repo <repo@example.local>
/// <unix-seconds> +0000\t<message>\n"`. `old_oid` is the zero OID when the
/// ref did not previously exist; the caller is responsible for passing
/// `new_oid = zero` on deletion.
///
/// # Errors
/// Returns [`RefsError::Io`] if the parent directory or file cannot be
/// created or written.
pub fn append(
    path: &Path,
    old_oid: &Oid,
    new_oid: &Oid,
    message: &str,
) -> Result<(), RefsError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let line = format!(
        "{old_oid} {new_oid} repo <repo@example.local> {seconds} +0000\t{message}\n"
    );
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())?;
    Ok(())
}

/// One parsed reflog line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflogEntry {
    /// The ref's value before this mutation.
    pub old_oid: Oid,
    /// The ref's value after this mutation.
    pub new_oid: Oid,
    /// The recorded identity (`"repo <repo@example.local>"`).
    pub identity: String,
    /// Unix seconds the entry was recorded at.
    pub seconds: u64,
    /// The free-form message after the tab.
    pub message: String,
}

/// Read and parse every line of a reflog, in file (chronological) order.
/// A missing file is treated as empty.
///
/// # Errors
/// Returns [`RefsError::Malformed`] if a line does not match the expected
/// shape.
pub fn read(path: &Path, algo: HashAlgo) -> Result<Vec<ReflogEntry>, RefsError> {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(RefsError::Io(e)),
    };

    let mut entries = Vec::new();
    for line in text.lines() {
        let (head, message) = line.split_once('\t').ok_or_else(|| RefsError::Malformed {
            name: path.display().to_string(),
            reason: "missing tab separator".into(),
        })?;
        let mut fields = head.splitn(5, ' ');
        let old_hex = fields.next().ok_or_else(|| malformed(path))?;
        let new_hex = fields.next().ok_or_else(|| malformed(path))?;
        let ident_word = fields.next().ok_or_else(|| malformed(path))?;
        let ident_email = fields.next().ok_or_else(|| malformed(path))?;
        let rest = fields.next().ok_or_else(|| malformed(path))?;
        let seconds_str = rest.split(' ').next().ok_or_else(|| malformed(path))?;

        let old_oid = Oid::parse(old_hex).map_err(|_| malformed(path))?;
        let new_oid = Oid::parse(new_hex).map_err(|_| malformed(path))?;
        if old_oid.algo() != algo || new_oid.algo() != algo {
            return Err(malformed(path));
        }
        let seconds: u64 = seconds_str.parse().map_err(|_| malformed(path))?;

        entries.push(ReflogEntry {
            old_oid,
            new_oid,
            identity: format!("{ident_word} {ident_email}"),
            seconds,
            message: message.to_owned(),
        });
    }
    Ok(entries)
}

fn malformed(path: &Path) -> RefsError {
    RefsError::Malformed {
        name: path.display().to_string(),
        reason: "line does not match the reflog format".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn oid(byte: u8) -> Oid {
        Oid::from_bytes(HashAlgo::Sha1, &[byte; 20])
    }

    #[test]
    fn append_then_read_roundtrips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs/refs/heads/main");
        append(&path, &Oid::zero(HashAlgo::Sha1), &oid(1), "commit: initial").unwrap();
        append(&path, &oid(1), &oid(2), "commit: second").unwrap();

        let entries = read(&path, HashAlgo::Sha1).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].old_oid, Oid::zero(HashAlgo::Sha1));
        assert_eq!(entries[0].new_oid, oid(1));
        assert_eq!(entries[0].message, "commit: initial");
        assert_eq!(entries[1].old_oid, oid(1));
        assert_eq!(entries[1].new_oid, oid(2));
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let entries = read(&dir.path().join("logs/refs/heads/main"), HashAlgo::Sha1).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn identity_is_the_fixed_repo_placeholder() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs/HEAD");
        append(&path, &Oid::zero(HashAlgo::Sha1), &oid(1), "checkout").unwrap();
        let entries = read(&path, HashAlgo::Sha1).unwrap();
        assert_eq!(entries[0].identity, "repo <repo@example.local>");
    }
}
