//! Recursive tree materialization, used by clone (M) to lay out a worktree.

use std::collections::BTreeMap;

use git_object::{EntryMode, Oid};

use crate::error::OdbError;
use crate::store::ObjectStore;

/// A gitlink (submodule commit pointer) found while materializing a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gitlink {
    /// The gitlink's path relative to the materialization root.
    pub path: String,
    /// The submodule commit OID it points at.
    pub oid: Oid,
}

/// The flattened result of walking a tree recursively.
#[derive(Debug, Clone, Default)]
pub struct Materialized {
    /// Every blob reached, keyed by its `/`-joined path.
    pub files: BTreeMap<String, Vec<u8>>,
    /// Every gitlink reached; not recursed into.
    pub gitlinks: Vec<Gitlink>,
}

/// Recursively walk the tree at `root_oid`, reading blob contents and
/// descending into sub-trees; gitlinks are recorded but never recursed
/// into, matching spec.md §4.5.
///
/// # Errors
/// Returns whatever [`ObjectStore::read_object`] or tree-entry parsing
/// returns if an object is missing or malformed.
pub fn materialize_tree(
    store: &ObjectStore,
    algo: git_hash::HashAlgo,
    root_oid: &Oid,
) -> Result<Materialized, OdbError> {
    let mut out = Materialized::default();
    walk(store, algo, root_oid, String::new(), &mut out)?;
    Ok(out)
}

fn walk(
    store: &ObjectStore,
    algo: git_hash::HashAlgo,
    tree_oid: &Oid,
    prefix: String,
    out: &mut Materialized,
) -> Result<(), OdbError> {
    let payload = store.read_object(tree_oid)?;
    let entries = git_object::parse_tree(algo, &payload).map_err(|e| OdbError::InvalidContainer {
        container: "tree",
        reason: e.to_string(),
    })?;

    for entry in entries {
        let path = if prefix.is_empty() {
            entry.name.clone()
        } else {
            format!("{prefix}/{}", entry.name)
        };

        match entry.mode {
            EntryMode::Tree => walk(store, algo, &entry.oid, path, out)?,
            EntryMode::Commit => out.gitlinks.push(Gitlink {
                path,
                oid: entry.oid,
            }),
            EntryMode::Blob | EntryMode::BlobExecutable | EntryMode::Link => {
                let bytes = store.read_object(&entry.oid)?;
                out.files.insert(path, bytes);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use git_hash::HashAlgo;
    use git_object::{ObjectKind, TreeEntry, encode_tree};
    use tempfile::tempdir;

    #[test]
    fn materializes_nested_tree_and_gitlink() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path(), HashAlgo::Sha1);

        let readme_oid = store
            .write_loose(ObjectKind::Blob, b"hello\n".to_vec())
            .unwrap();
        let lib_oid = store
            .write_loose(ObjectKind::Blob, b"fn main() {}\n".to_vec())
            .unwrap();
        let submodule_oid = Oid::from_bytes(HashAlgo::Sha1, &[7u8; 20]);

        let src_tree = encode_tree(&[TreeEntry {
            mode: EntryMode::Blob,
            name: "lib.rs".into(),
            oid: lib_oid,
        }]);
        let src_tree_oid = store.write_loose(ObjectKind::Tree, src_tree).unwrap();

        let root_tree = encode_tree(&[
            TreeEntry {
                mode: EntryMode::Blob,
                name: "README.md".into(),
                oid: readme_oid,
            },
            TreeEntry {
                mode: EntryMode::Tree,
                name: "src".into(),
                oid: src_tree_oid,
            },
            TreeEntry {
                mode: EntryMode::Commit,
                name: "vendor".into(),
                oid: submodule_oid,
            },
        ]);
        let root_oid = store.write_loose(ObjectKind::Tree, root_tree).unwrap();

        let materialized = materialize_tree(&store, HashAlgo::Sha1, &root_oid).unwrap();
        assert_eq!(materialized.files["README.md"], b"hello\n");
        assert_eq!(materialized.files["src/lib.rs"], b"fn main() {}\n");
        assert_eq!(
            materialized.gitlinks,
            vec![Gitlink {
                path: "vendor".into(),
                oid: submodule_oid,
            }]
        );
        assert_eq!(materialized.files.len(), 2);
    }
}
