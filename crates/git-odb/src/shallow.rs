//! Shallow-clone boundary computation: a BFS frontier over parent links.

use std::collections::{BTreeSet, VecDeque};

use git_hash::HashAlgo;
use git_object::Oid;

use crate::error::OdbError;
use crate::store::ObjectStore;

/// Starting from `head`, walk parent links breadth-first and return the set
/// of commit OIDs reached at `depth` (or, if the history is shorter than
/// `depth`, the deepest level actually reached). `depth` must be at least
/// 1. The result is lexicographically sorted for deterministic output.
///
/// # Errors
/// Returns whatever [`ObjectStore::read_object`] or commit parsing returns
/// if a reachable commit is missing or malformed.
pub fn shallow_boundary(
    store: &ObjectStore,
    algo: HashAlgo,
    head: &Oid,
    depth: u32,
) -> Result<Vec<Oid>, OdbError> {
    assert!(depth >= 1, "shallow depth must be at least 1");

    let mut frontier: VecDeque<Oid> = VecDeque::new();
    frontier.push_back(head.clone());
    let mut visited: BTreeSet<Oid> = BTreeSet::new();
    visited.insert(head.clone());

    let mut current_level: Vec<Oid> = vec![head.clone()];
    let mut level = 1u32;

    loop {
        let mut next_level = Vec::new();
        for oid in &current_level {
            let payload = store.read_object(oid)?;
            let commit =
                git_object::parse_commit(algo, &payload).map_err(|e| OdbError::InvalidContainer {
                    container: "commit",
                    reason: e.to_string(),
                })?;
            for parent in commit.parents {
                if visited.insert(parent.clone()) {
                    next_level.push(parent);
                }
            }
        }

        if next_level.is_empty() {
            // History ended before reaching `depth`; the last non-empty
            // level (or the head itself) is the boundary.
            break;
        }
        if level == depth {
            current_level = next_level;
            break;
        }
        current_level = next_level;
        level += 1;
    }

    let mut out: Vec<Oid> = current_level;
    out.sort();
    out.dedup();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use git_object::{CommitInfo, ObjectKind, encode_commit};
    use tempfile::tempdir;

    fn commit(store: &ObjectStore, tree: Oid, parents: Vec<Oid>, msg: &str) -> Oid {
        let info = CommitInfo {
            tree_oid: tree,
            parents,
            author: "A <a@x> 1 +0000".into(),
            committer: "A <a@x> 1 +0000".into(),
            message: msg.into(),
        };
        store
            .write_loose(ObjectKind::Commit, encode_commit(&info))
            .unwrap()
    }

    #[test]
    fn boundary_at_depth_reaches_ancestors() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path(), HashAlgo::Sha1);
        let tree = Oid::zero(HashAlgo::Sha1);

        let c1 = commit(&store, tree, vec![], "root");
        let c2 = commit(&store, tree, vec![c1], "second");
        let c3 = commit(&store, tree, vec![c2], "third");

        let boundary = shallow_boundary(&store, HashAlgo::Sha1, &c3, 2).unwrap();
        assert_eq!(boundary, vec![c1]);
    }

    #[test]
    fn boundary_deeper_than_history_returns_root() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path(), HashAlgo::Sha1);
        let tree = Oid::zero(HashAlgo::Sha1);

        let c1 = commit(&store, tree, vec![], "root");
        let c2 = commit(&store, tree, vec![c1], "second");

        let boundary = shallow_boundary(&store, HashAlgo::Sha1, &c2, 10).unwrap();
        assert_eq!(boundary, vec![c1]);
    }

    #[test]
    fn depth_one_returns_direct_parents() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path(), HashAlgo::Sha1);
        let tree = Oid::zero(HashAlgo::Sha1);

        let p1 = commit(&store, tree, vec![], "p1");
        let p2 = commit(&store, tree, vec![], "p2");
        let mut parents = vec![p1, p2];
        parents.sort();
        let merge = commit(&store, tree, parents.clone(), "merge");

        let boundary = shallow_boundary(&store, HashAlgo::Sha1, &merge, 1).unwrap();
        assert_eq!(boundary, parents);
    }
}
