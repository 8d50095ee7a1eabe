//! `packed-refs`: a single text file holding a name→OID mapping.
//!
//! Lines starting with `#` are comments, lines starting with `^` are
//! peeled-tag targets (ignored by this core), and everything else is
//! `<hex-oid> SP <refname>`.

use std::fs;
use std::path::Path;

use git_hash::HashAlgo;
use git_object::Oid;

use crate::error::RefsError;

/// Read and parse a `packed-refs` file, returning its entries in file
/// order. Missing file is treated as empty, not an error.
///
/// # Errors
/// Returns [`RefsError::PackedRefsFormat`] if a non-comment, non-peeled
/// line isn't `<oid> <name>`, or [`RefsError::Io`] for any I/O failure
/// other than the file not existing.
pub fn read(path: &Path, algo: HashAlgo) -> Result<Vec<(String, Oid)>, RefsError> {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(RefsError::Io(e)),
    };

    let mut entries = Vec::new();
    for line in text.lines() {
        if line.is_empty() || line.starts_with('#') || line.starts_with('^') {
            continue;
        }
        let (hex, name) = line
            .split_once(' ')
            .ok_or_else(|| RefsError::PackedRefsFormat(format!("bad line {line:?}")))?;
        let oid = Oid::parse(hex).map_err(|e| RefsError::PackedRefsFormat(e.to_string()))?;
        if oid.algo() != algo {
            return Err(RefsError::PackedRefsFormat(format!(
                "oid {hex} does not match repository hash algorithm"
            )));
        }
        entries.push((name.to_owned(), oid));
    }
    Ok(entries)
}

/// Rewrite `packed-refs` with exactly `entries`, in the order given.
/// Writes nothing (an empty file) if `entries` is empty, and otherwise
/// terminates the final line with a trailing newline.
///
/// # Errors
/// Returns [`RefsError::Io`] if the file cannot be written.
pub fn write(path: &Path, entries: &[(String, Oid)]) -> Result<(), RefsError> {
    if entries.is_empty() {
        fs::write(path, b"")?;
        return Ok(());
    }
    let mut out = String::new();
    for (name, oid) in entries {
        out.push_str(&oid.to_string());
        out.push(' ');
        out.push_str(name);
        out.push('\n');
    }
    fs::write(path, out)?;
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
    fn missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let entries = read(&dir.path().join("packed-refs"), HashAlgo::Sha1).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("packed-refs");
        let entries = vec![
            ("refs/heads/main".to_owned(), oid(1)),
            ("refs/tags/v1".to_owned(), oid(2)),
        ];
        write(&path, &entries).unwrap();
        let parsed = read(&path, HashAlgo::Sha1).unwrap();
        assert_eq!(parsed, entries);
    }

    #[test]
    fn ignores_comments_and_peeled_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("packed-refs");
        let contents = format!(
            "# pack-refs with: peeled fully-peeled sorted\n{} refs/tags/v1\n^{}\n",
            oid(1),
            oid(2)
        );
        fs::write(&path, contents).unwrap();
        let parsed = read(&path, HashAlgo::Sha1).unwrap();
        assert_eq!(parsed, vec![("refs/tags/v1".to_owned(), oid(1))]);
    }

    #[test]
    fn empty_entries_write_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("packed-refs");
        write(&path, &[]).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"");
    }
}
