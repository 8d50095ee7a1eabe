use tempfile::TempDir;

use git_repo::{
    CloneOptions, GitError, HashAlgo, Index, ObjectKind, ReceivePackRequest, ReplayStatus, ReplayStep, Repo,
};

fn init_repo() -> (TempDir, Repo) {
    let dir = TempDir::new().unwrap();
    let repo = Repo::init(dir.path(), HashAlgo::Sha1).unwrap();
    (dir, repo)
}

// ===========================================================================
// 1. CRC32 / hashing vectors
// ===========================================================================

#[test]
fn crc32_known_vector() {
    let crc = git_hash::crc32_ieee(b"123456789");
    assert_eq!(format!("{crc:08x}"), "cbf43926");
}

#[test]
fn blob_hash_matches_git_hash_object() {
    // `printf 'hello\n' | git hash-object --stdin`
    let (_dir, repo) = init_repo();
    let oid = repo.hash_object(ObjectKind::Blob, b"hello\n".to_vec());
    assert_eq!(oid.to_string(), "ce013625030ba8dba906f756967f9e9ca394464a");
}

#[test]
fn write_loose_then_read_object_returns_the_same_bytes() {
    let (_dir, repo) = init_repo();
    let payload = vec![0x67, 0x69, 0x74, 0x00, 0x63, 0x6f, 0x72, 0x65];
    let oid = repo.write_object(ObjectKind::Blob, payload.clone()).unwrap();
    assert_eq!(repo.read_object(&oid).unwrap(), payload);
}

// ===========================================================================
// 2. Index round-trip
// ===========================================================================

#[test]
fn index_round_trip_through_the_facade() {
    let (dir, repo) = init_repo();
    std::fs::write(dir.path().join("a.txt"), b"hi\n").unwrap();

    let mut index = Index::empty();
    repo.add(&mut index, &["a.txt".to_owned()]).unwrap();
    repo.write_index(&index).unwrap();

    let reloaded = repo.read_index().unwrap();
    assert_eq!(reloaded.entries, index.entries);
    assert_eq!(reloaded.entries[0].path, "a.txt");
}

// ===========================================================================
// 3. Ref compare-and-swap via receive-pack
// ===========================================================================

#[test]
fn receive_pack_update_is_compare_and_swap() {
    let (_dir, repo) = init_repo();
    let x = repo.write_object(ObjectKind::Blob, b"x".to_vec()).unwrap();
    let y = repo.write_object(ObjectKind::Blob, b"y".to_vec()).unwrap();
    repo.create_ref("refs/heads/main", &x, "init").unwrap();

    let update = ReceivePackRequest {
        ref_name: "refs/heads/main".to_owned(),
        old_oid: x.to_string(),
        new_oid: y.to_string(),
        capabilities: vec![],
    };
    repo.receive_pack_update(&update).unwrap();
    assert_eq!(repo.resolve_ref("refs/heads/main").unwrap(), Some(y));

    let err = repo.receive_pack_update(&update).unwrap_err();
    assert!(matches!(err, GitError::LockConflict { .. }));
}

// ===========================================================================
// 4. Sparse-checkout cone selection
// ===========================================================================

#[test]
fn sparse_cone_selects_matching_paths_in_sorted_order() {
    let (_dir, repo) = init_repo();
    let rules = vec!["src".to_owned(), "docs".to_owned()];
    let candidates = vec![
        "src/index.ts".to_owned(),
        "docs/g.md".to_owned(),
        "tests/x.txt".to_owned(),
    ];
    let selected = repo.select_sparse_paths_cone(&candidates, &rules);
    assert_eq!(selected, vec!["docs/g.md".to_owned(), "src/index.ts".to_owned()]);
}

// ===========================================================================
// 5. Backfill: sparse filtering and min-batch-size gating
// ===========================================================================

#[test]
fn backfill_respects_sparse_filter_then_min_batch_size() {
    let (dir, repo) = init_repo();
    std::fs::write(dir.path().join("a.txt"), b"staged\n").unwrap();
    let mut index = Index::empty();
    repo.add(&mut index, &["a.txt".to_owned()]).unwrap();
    let a_oid = index.entries[0].oid.clone();

    let free_standing = repo.hash_object(ObjectKind::Blob, b"unrelated".to_vec());

    let mut state = git_repo::PromisorState::empty();
    git_repo::set_promisor_object(&mut state, &a_oid, b"staged\n");
    git_repo::set_promisor_object(&mut state, &free_standing, b"unrelated");

    let a_key = a_oid.to_string().to_lowercase();
    let free_standing_key = free_standing.to_string().to_lowercase();

    let sparse_rules = vec!["a.txt".to_owned()];
    let options = git_repo::BackfillOptions {
        min_batch_size: Some(1),
        sparse: true,
    };
    let report = repo
        .backfill(&mut state, Some(&index), Some(&sparse_rules), &options)
        .unwrap();
    assert_eq!(report.status, git_repo::BackfillStatus::Completed);
    assert_eq!(report.fetched, vec![a_key.clone()]);
    assert_eq!(report.remaining, vec![free_standing_key.clone()]);

    let stricter = git_repo::BackfillOptions {
        min_batch_size: Some(2),
        sparse: false,
    };
    let second = repo.backfill(&mut state, None, None, &stricter).unwrap();
    assert_eq!(second.status, git_repo::BackfillStatus::SkippedMinBatchSize);
    assert_eq!(second.remaining, vec![free_standing_key]);
}

// ===========================================================================
// 6. Replay: partial application stops at the first conflicting step
// ===========================================================================

#[test]
fn replay_stops_at_the_first_unsafe_step_but_keeps_prior_writes() {
    let (dir, repo) = init_repo();
    std::fs::write(dir.path().join("a.txt"), "one\n").unwrap();
    std::fs::write(dir.path().join("b.txt"), "one\n").unwrap();

    let step0 = ReplayStep {
        patch_text: repo.generate_patch("a.txt", "one\n", "two\n"),
        reverse: false,
    };
    let step1 = ReplayStep {
        patch_text: repo.generate_patch("../escape.txt", "one\n", "two\n"),
        reverse: false,
    };

    let result = repo.replay(&[step0, step1]).unwrap();
    assert_eq!(result.status, ReplayStatus::Conflict { failed_step: 1 });
    assert_eq!(result.applied_paths, vec!["a.txt".to_owned()]);
    assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "two\n");
}

// ===========================================================================
// 7. Clone: local source with an explicit branch checkout
// ===========================================================================

#[test]
fn clone_local_with_branch_checks_out_the_requested_branch() {
    let root = TempDir::new().unwrap();
    let src_path = root.path().join("src");
    let src = Repo::init(&src_path, HashAlgo::Sha1).unwrap();

    let main_blob = src.write_object(ObjectKind::Blob, b"main\n".to_vec()).unwrap();
    let main_tree = git_object::encode_tree(&[git_object::TreeEntry {
        mode: git_object::EntryMode::Blob,
        name: "a.txt".into(),
        oid: main_blob,
    }]);
    let main_tree_oid = src.write_object(ObjectKind::Tree, main_tree).unwrap();
    let main_commit = git_object::CommitInfo {
        tree_oid: main_tree_oid,
        parents: vec![],
        author: "A <a@x> 1 +0000".into(),
        committer: "A <a@x> 1 +0000".into(),
        message: "main\n".into(),
    };
    let main_oid = src
        .write_object(ObjectKind::Commit, git_object::encode_commit(&main_commit))
        .unwrap();
    src.create_ref("refs/heads/main", &main_oid, "init").unwrap();

    let feature_blob = src.write_object(ObjectKind::Blob, b"feature\n".to_vec()).unwrap();
    let feature_tree = git_object::encode_tree(&[git_object::TreeEntry {
        mode: git_object::EntryMode::Blob,
        name: "a.txt".into(),
        oid: feature_blob,
    }]);
    let feature_tree_oid = src.write_object(ObjectKind::Tree, feature_tree).unwrap();
    let feature_commit = git_object::CommitInfo {
        tree_oid: feature_tree_oid,
        parents: vec![main_oid],
        author: "A <a@x> 1 +0000".into(),
        committer: "A <a@x> 1 +0000".into(),
        message: "feature\n".into(),
    };
    let feature_oid = src
        .write_object(ObjectKind::Commit, git_object::encode_commit(&feature_commit))
        .unwrap();
    src.create_ref("refs/heads/feature-x", &feature_oid, "feature").unwrap();

    let dst_path = root.path().join("dst");
    let options = CloneOptions {
        branch: Some("feature-x".to_owned()),
        ..Default::default()
    };
    Repo::clone(src_path.to_str().unwrap(), &dst_path, &options).unwrap();

    let head = std::fs::read_to_string(dst_path.join(".git/HEAD")).unwrap();
    assert_eq!(head, "ref: refs/heads/feature-x\n");
    assert_eq!(std::fs::read(dst_path.join("a.txt")).unwrap(), b"feature\n");
}
