//! Partial clone filter negotiation, promisor object storage, and the
//! deterministic backfill contract (L).

use std::collections::BTreeMap;

use git_object::{ObjectKind, Oid};
use git_odb::ObjectStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GitError;
use crate::index::Index;
use crate::matchers::sparse_cone_matches;
use crate::wire::{negotiate_filter_capability, normalize_capabilities};

/// Persisted partial-clone state: the accepted filter, the normalized
/// capabilities it was negotiated under, and deferred ("promisor")
/// object bytes keyed by lowercased OID hex. Serializes directly to the
/// `partial-clone-codex.json` sidecar.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromisorState {
    /// The accepted partial-clone filter spec (e.g. `"blob:none"`).
    pub filter: Option<String>,
    /// The capability set the filter was negotiated under.
    pub capabilities: Vec<String>,
    /// Deferred object payloads, keyed by lowercased OID hex. Stored as
    /// raw JSON values (rather than `Vec<u8>`) so a hand-edited sidecar's
    /// out-of-range or non-integer entries surface as
    /// [`GitError::IntegrityError`] instead of a deserialize panic.
    pub objects: BTreeMap<String, Value>,
}

impl PromisorState {
    /// An empty state: no filter accepted, no capabilities, no promisor
    /// objects.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Negotiate and persist a partial-clone filter: `filter` must be
/// non-empty (trimmed) and `capabilities` must advertise `"filter"` or a
/// `"filter="`-prefixed entry (spec.md §4.11). On success, `state` is
/// updated with the accepted filter and the normalized capability list.
///
/// # Errors
/// Returns [`GitError::Unsupported`] if negotiation fails; `state` is left
/// unchanged.
pub fn negotiate_partial_clone_filter(
    state: &mut PromisorState,
    filter: &str,
    capabilities: &[String],
) -> Result<(), GitError> {
    negotiate_filter_capability(filter, capabilities)?;
    state.filter = Some(filter.trim().to_owned());
    state.capabilities = normalize_capabilities(capabilities);
    Ok(())
}

/// Store deferred object bytes for `oid`, keyed by its lowercased hex
/// form.
pub fn set_promisor_object(state: &mut PromisorState, oid: &Oid, bytes: &[u8]) {
    let key = oid.to_string().to_lowercase();
    let array = Value::Array(bytes.iter().map(|&b| Value::from(b)).collect());
    state.objects.insert(key, array);
}

/// Validate that a stored promisor payload is a JSON array of
/// byte-valued integers (`0..=255`), converting it to raw bytes.
///
/// # Errors
/// Returns [`GitError::IntegrityError`] if `value` is not an array, or any
/// element is not an integer in range.
fn validate_promisor_payload(value: &Value) -> Result<Vec<u8>, GitError> {
    let Value::Array(items) = value else {
        return Err(GitError::IntegrityError(
            "promisor payload is not a JSON array".into(),
        ));
    };
    items
        .iter()
        .map(|item| {
            item.as_u64()
                .filter(|&n| n <= 255)
                .map(|n| n as u8)
                .ok_or_else(|| {
                    GitError::IntegrityError(format!(
                        "promisor payload element {item} is not a byte-valued integer"
                    ))
                })
        })
        .collect()
}

/// Resolve an object's bytes, promisor-first: if `oid` has a deferred
/// payload, validate and return it; otherwise fall through to the local
/// object store, only then failing with [`GitError::IntegrityError`] if
/// neither source has it.
///
/// # Errors
/// Returns [`GitError::IntegrityError`] if the promisor payload is
/// malformed, or if neither the promisor table nor the local store has
/// `oid`.
pub fn resolve_promised_object(state: &PromisorState, store: &ObjectStore, oid: &Oid) -> Result<Vec<u8>, GitError> {
    let key = oid.to_string().to_lowercase();
    if let Some(value) = state.objects.get(&key) {
        return validate_promisor_payload(value);
    }
    store
        .read_object(oid)
        .map_err(|_| GitError::IntegrityError(format!("object {oid} is neither promised nor locally present")))
}

/// Caller-supplied backfill knobs.
#[derive(Debug, Clone, Default)]
pub struct BackfillOptions {
    /// Minimum candidate count required to proceed; defaults to `1` when
    /// `None`. Must be non-negative.
    pub min_batch_size: Option<i64>,
    /// When `true` (and sparse-checkout rules are supplied), restrict
    /// candidates to OIDs referenced by sparse-selected index paths.
    pub sparse: bool,
}

/// The outcome of [`backfill`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackfillStatus {
    /// Every requested candidate was fetched.
    Completed,
    /// Fewer candidates were available than `min_batch_size` required;
    /// `state` was left unchanged.
    SkippedMinBatchSize,
}

/// The full report [`backfill`] returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackfillReport {
    /// `Completed` or `SkippedMinBatchSize`.
    pub status: BackfillStatus,
    /// The candidate OIDs considered, sorted.
    pub requested: Vec<String>,
    /// The OIDs actually written as loose blobs (empty on skip).
    pub fetched: Vec<String>,
    /// The promisor OIDs left in `state` after this call.
    pub remaining: Vec<String>,
}

/// Run the deterministic backfill contract (spec.md §4.13):
/// 1. Normalize `min_batch_size` (default 1, must be non-negative).
/// 2. Collect candidate OIDs from `state`, sorted.
/// 3. If `options.sparse` and `index`/`sparse_rules` are both given,
///    intersect candidates with OIDs referenced by sparse-selected index
///    paths.
/// 4. If there are fewer candidates than `min_batch_size`, skip without
///    mutating `state`.
/// 5. Otherwise write each candidate as a loose blob (trusting the
///    promisor OID) and remove it from `state`, in order.
///
/// # Errors
/// Returns [`GitError::InvalidArgument`] if `min_batch_size` is negative,
/// or propagates a payload-validation or object-store error encountered
/// while writing a candidate.
pub fn backfill(
    state: &mut PromisorState,
    store: &ObjectStore,
    index: Option<&Index>,
    sparse_rules: Option<&[String]>,
    options: &BackfillOptions,
) -> Result<BackfillReport, GitError> {
    let min_batch_size = match options.min_batch_size {
        None => 1,
        Some(n) if n >= 0 => n,
        Some(n) => {
            return Err(GitError::InvalidArgument(format!(
                "minBatchSize must be a non-negative integer, got {n}"
            )));
        }
    } as usize;

    let mut candidates: Vec<String> = state.objects.keys().cloned().collect();
    candidates.sort();

    if options.sparse {
        if let (Some(index), Some(rules)) = (index, sparse_rules) {
            let selected: std::collections::BTreeSet<String> = index
                .entries
                .iter()
                .filter(|e| sparse_cone_matches(&e.path, rules))
                .map(|e| e.oid.to_string().to_lowercase())
                .collect();
            candidates.retain(|oid| selected.contains(oid));
        }
    }

    if candidates.len() < min_batch_size {
        let mut remaining: Vec<String> = state.objects.keys().cloned().collect();
        remaining.sort();
        return Ok(BackfillReport {
            status: BackfillStatus::SkippedMinBatchSize,
            requested: candidates,
            fetched: Vec::new(),
            remaining,
        });
    }

    let mut fetched = Vec::with_capacity(candidates.len());
    for key in &candidates {
        let value = state
            .objects
            .get(key)
            .expect("candidate keys are drawn from state.objects");
        let payload = validate_promisor_payload(value)?;
        let oid: Oid = key
            .parse()
            .map_err(|e| GitError::IntegrityError(format!("promisor key {key:?} is not a valid OID: {e}")))?;
        store.write_loose_trusted(&oid, ObjectKind::Blob, &payload)?;
        fetched.push(key.clone());
    }
    for key in &fetched {
        state.objects.remove(key);
    }

    let mut remaining: Vec<String> = state.objects.keys().cloned().collect();
    remaining.sort();

    Ok(BackfillReport {
        status: BackfillStatus::Completed,
        requested: candidates,
        fetched,
        remaining,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexEntry;
    use git_hash::HashAlgo;
    use tempfile::tempdir;

    fn oid(byte: u8) -> Oid {
        Oid::from_bytes(HashAlgo::Sha1, &[byte; 20])
    }

    #[test]
    fn negotiate_persists_filter_and_normalized_caps() {
        let mut state = PromisorState::empty();
        negotiate_partial_clone_filter(
            &mut state,
            "blob:none",
            &["filter".to_owned(), " ofs-delta ".to_owned()],
        )
        .unwrap();
        assert_eq!(state.filter.as_deref(), Some("blob:none"));
        assert_eq!(state.capabilities, vec!["filter".to_owned(), "ofs-delta".to_owned()]);
    }

    #[test]
    fn negotiate_rejects_missing_filter_capability() {
        let mut state = PromisorState::empty();
        let err = negotiate_partial_clone_filter(&mut state, "blob:none", &["side-band-64k".to_owned()]).unwrap_err();
        assert!(matches!(err, GitError::Unsupported(_)));
        assert!(state.filter.is_none());
    }

    #[test]
    fn resolve_promised_object_prefers_promisor_table() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path(), HashAlgo::Sha1);
        let mut state = PromisorState::empty();
        let target = oid(1);
        set_promisor_object(&mut state, &target, b"deferred");
        assert_eq!(resolve_promised_object(&state, &store, &target).unwrap(), b"deferred");
    }

    #[test]
    fn resolve_promised_object_falls_through_to_local_store() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path(), HashAlgo::Sha1);
        let local_oid = store.write_loose(ObjectKind::Blob, b"local".to_vec()).unwrap();
        let state = PromisorState::empty();
        assert_eq!(resolve_promised_object(&state, &store, &local_oid).unwrap(), b"local");
    }

    #[test]
    fn resolve_promised_object_fails_integrity_when_absent_everywhere() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path(), HashAlgo::Sha1);
        let state = PromisorState::empty();
        let err = resolve_promised_object(&state, &store, &oid(9)).unwrap_err();
        assert!(matches!(err, GitError::IntegrityError(_)));
    }

    #[test]
    fn resolve_promised_object_rejects_out_of_range_byte() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path(), HashAlgo::Sha1);
        let mut state = PromisorState::empty();
        state
            .objects
            .insert(oid(1).to_string(), Value::Array(vec![Value::from(300)]));
        let err = resolve_promised_object(&state, &store, &oid(1)).unwrap_err();
        assert!(matches!(err, GitError::IntegrityError(_)));
    }

    #[test]
    fn backfill_skips_below_min_batch_size() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path(), HashAlgo::Sha1);
        let mut state = PromisorState::empty();
        set_promisor_object(&mut state, &oid(1), b"a");

        let report = backfill(
            &mut state,
            &store,
            None,
            None,
            &BackfillOptions {
                min_batch_size: Some(5),
                sparse: false,
            },
        )
        .unwrap();
        assert_eq!(report.status, BackfillStatus::SkippedMinBatchSize);
        assert!(report.fetched.is_empty());
        assert_eq!(state.objects.len(), 1);
    }

    #[test]
    fn backfill_writes_candidates_in_order_and_drains_state() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path(), HashAlgo::Sha1);
        let mut state = PromisorState::empty();
        set_promisor_object(&mut state, &oid(2), b"two");
        set_promisor_object(&mut state, &oid(1), b"one");

        let report = backfill(&mut state, &store, None, None, &BackfillOptions::default()).unwrap();
        assert_eq!(report.status, BackfillStatus::Completed);
        assert_eq!(report.fetched, vec![oid(1).to_string(), oid(2).to_string()]);
        assert!(state.objects.is_empty());
        assert_eq!(store.read_object(&oid(1)).unwrap(), b"one");
        assert_eq!(store.read_object(&oid(2)).unwrap(), b"two");
    }

    #[test]
    fn backfill_sparse_intersects_with_selected_index_paths() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path(), HashAlgo::Sha1);
        let mut state = PromisorState::empty();
        set_promisor_object(&mut state, &oid(1), b"in-scope");
        set_promisor_object(&mut state, &oid(2), b"out-of-scope");

        let mut index = Index::empty();
        index.entries.push(IndexEntry {
            path: "src/a.txt".into(),
            oid: oid(1),
            mode: 0o100_644,
        });
        index.entries.push(IndexEntry {
            path: "docs/b.txt".into(),
            oid: oid(2),
            mode: 0o100_644,
        });
        let rules = vec!["src".to_owned()];

        let report = backfill(
            &mut state,
            &store,
            Some(&index),
            Some(&rules),
            &BackfillOptions {
                min_batch_size: None,
                sparse: true,
            },
        )
        .unwrap();
        assert_eq!(report.fetched, vec![oid(1).to_string()]);
        assert_eq!(report.remaining, vec![oid(2).to_string()]);
    }

    #[test]
    fn backfill_rejects_negative_min_batch_size() {
        let dir = tempdir().unwrap();
        let store = ObjectStore::new(dir.path(), HashAlgo::Sha1);
        let mut state = PromisorState::empty();
        let err = backfill(
            &mut state,
            &store,
            None,
            None,
            &BackfillOptions {
                min_batch_size: Some(-1),
                sparse: false,
            },
        )
        .unwrap_err();
        assert!(matches!(err, GitError::InvalidArgument(_)));
    }
}
