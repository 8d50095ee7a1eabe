//! Pkt-line framing and capability negotiation (K), plus receive-pack
//! advertisement/request/update (§4.12).

use git_hash::HashAlgo;
use git_object::Oid;
use git_refs::RefStore;

use crate::error::GitError;

/// The flush packet: length `0000`.
pub const FLUSH: &[u8] = b"0000";

/// Largest legal pkt-line frame, length prefix included.
pub const MAX_TOTAL: usize = 65520;

/// Largest legal data payload (`MAX_TOTAL` minus the 4-byte length
/// prefix).
pub const MAX_DATA: usize = 65516;

/// Encode `data` as a pkt-line: a 4-hex-digit lowercase length prefix
/// (`|data| + 4`, zero-padded) followed by `data`.
///
/// # Errors
/// Returns [`GitError::InvalidArgument`] if `data` would make the frame
/// exceed [`MAX_TOTAL`].
pub fn make_pkt_line(data: &[u8]) -> Result<Vec<u8>, GitError> {
    if data.len() > MAX_DATA {
        return Err(GitError::ProtoError(format!(
            "pkt-line data of {} bytes exceeds MAX_DATA={MAX_DATA}",
            data.len()
        )));
    }
    let total = data.len() + 4;
    let mut out = format!("{total:04x}").into_bytes();
    out.extend_from_slice(data);
    Ok(out)
}

/// The flush packet bytes, spelled out as a function for symmetry with
/// [`make_pkt_line`].
#[must_use]
pub fn make_flush_packet() -> Vec<u8> {
    FLUSH.to_vec()
}

/// One decoded pkt-line frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pkt {
    /// A data frame with its payload.
    Data(Vec<u8>),
    /// The flush packet (`"0000"`).
    Flush,
}

/// Parse a buffer of consecutive pkt-line frames.
///
/// # Errors
/// Returns [`GitError::ProtoError`] if a length prefix is not 4 lowercase
/// hex digits, declares a length outside `[4, MAX_TOTAL]` (other than the
/// flush packet's `0`), or runs past the end of `buf`.
pub fn parse_pkt_lines(buf: &[u8]) -> Result<Vec<Pkt>, GitError> {
    let mut out = Vec::new();
    let mut pos = 0;

    while pos < buf.len() {
        if pos + 4 > buf.len() {
            return Err(GitError::ProtoError("truncated pkt-line length prefix".into()));
        }
        let hex = std::str::from_utf8(&buf[pos..pos + 4])
            .map_err(|_| GitError::ProtoError("pkt-line length prefix is not utf8".into()))?;
        let len = usize::from_str_radix(hex, 16)
            .map_err(|_| GitError::ProtoError(format!("pkt-line length prefix {hex:?} is not hex")))?;

        if len == 0 {
            out.push(Pkt::Flush);
            pos += 4;
            continue;
        }
        if !(4..=MAX_TOTAL).contains(&len) {
            return Err(GitError::ProtoError(format!(
                "pkt-line length {len} is out of range [4, {MAX_TOTAL}]"
            )));
        }
        if pos + len > buf.len() {
            return Err(GitError::ProtoError("pkt-line frame runs past end of buffer".into()));
        }
        out.push(Pkt::Data(buf[pos + 4..pos + len].to_vec()));
        pos += len;
    }

    Ok(out)
}

/// Trim each entry and drop empties, returning the sorted, deduplicated
/// result. Shared by capability parity and partial-clone negotiation.
#[must_use]
pub fn normalize_capabilities(list: &[String]) -> Vec<String> {
    let set: std::collections::BTreeSet<String> = list
        .iter()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect();
    set.into_iter().collect()
}

/// Normalize a capability list (trim each entry, drop empties) and return
/// the sorted lexicographic intersection of `ours` and `theirs`.
#[must_use]
pub fn capability_parity(ours: &[String], theirs: &[String]) -> Vec<String> {
    let ours: std::collections::BTreeSet<String> = normalize_capabilities(ours).into_iter().collect();
    let theirs: std::collections::BTreeSet<String> = normalize_capabilities(theirs).into_iter().collect();
    ours.intersection(&theirs).cloned().collect()
}

/// Validate a partial-clone filter negotiation: `filter` must be non-empty
/// after trimming, and `capabilities` must contain at least one entry
/// equal to `"filter"` or starting with `"filter="`.
///
/// # Errors
/// Returns [`GitError::Unsupported`] if either condition fails.
pub fn negotiate_filter_capability(filter: &str, capabilities: &[String]) -> Result<(), GitError> {
    if filter.trim().is_empty() {
        return Err(GitError::Unsupported("filter must be non-empty".into()));
    }
    let has_filter_cap = capabilities
        .iter()
        .any(|c| c == "filter" || c.starts_with("filter="));
    if !has_filter_cap {
        return Err(GitError::Unsupported(
            "peer did not advertise a filter capability".into(),
        ));
    }
    Ok(())
}

/// Build the default receive-pack capability set (spec.md §4.12): the
/// five fixed capabilities plus `object-format=<algo>`, merged with
/// `extra` and deduplicated-and-sorted.
#[must_use]
pub fn default_receive_pack_capabilities(algo: HashAlgo, extra: &[String]) -> Vec<String> {
    let mut caps: std::collections::BTreeSet<String> = [
        "report-status",
        "report-status-v2",
        "delete-refs",
        "side-band-64k",
        "ofs-delta",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect();
    let algo_name = match algo {
        HashAlgo::Sha1 => "sha1",
        HashAlgo::Sha256 => "sha256",
    };
    caps.insert(format!("object-format={algo_name}"));
    for cap in extra {
        let trimmed = cap.trim();
        if !trimmed.is_empty() {
            caps.insert(trimmed.to_owned());
        }
    }
    caps.into_iter().collect()
}

/// Build the receive-pack advertisement: one pkt-line per `(name, oid)` in
/// `refs` (HEAD's target first, if present and among `refs`), the first
/// line's name carrying `NUL <space-joined capabilities>` appended,
/// terminated by a flush packet.
///
/// # Errors
/// Propagates [`make_pkt_line`]'s over-limit error.
pub fn build_receive_pack_advertisement(
    refs: &[(String, Oid)],
    head_target: Option<&str>,
    capabilities: &[String],
) -> Result<Vec<u8>, GitError> {
    let mut ordered: Vec<&(String, Oid)> = Vec::with_capacity(refs.len());
    if let Some(target) = head_target {
        if let Some(head_entry) = refs.iter().find(|(n, _)| n == target) {
            ordered.push(head_entry);
        }
    }
    for entry in refs {
        if Some(entry.0.as_str()) != head_target {
            ordered.push(entry);
        }
    }

    let mut out = Vec::new();
    for (i, (name, oid)) in ordered.into_iter().enumerate() {
        let line = if i == 0 {
            format!("{oid} {name}\0{}\n", capabilities.join(" "))
        } else {
            format!("{oid} {name}\n")
        };
        out.extend_from_slice(&make_pkt_line(line.as_bytes())?);
    }
    out.extend_from_slice(&make_flush_packet());
    Ok(out)
}

/// A single parsed receive-pack command: `<oldOid> <newOid> <refName>`,
/// with an optional trailing NUL-separated capabilities list on the first
/// line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivePackRequest {
    /// The pusher's believed current OID for the ref (zero if creating).
    pub old_oid: String,
    /// The OID to set the ref to (zero to delete).
    pub new_oid: String,
    /// The ref name being updated.
    pub ref_name: String,
    /// Capabilities the client advertised alongside the command, if any.
    pub capabilities: Vec<String>,
}

/// Build a single-command receive-pack request: one pkt-line of
/// `<oldOid> SP <newOid> SP <refName>`, with capabilities appended in the
/// NUL-separated form when `capabilities` is non-empty, terminated by a
/// flush packet (spec.md §4.12 "Request").
///
/// # Errors
/// Propagates [`make_pkt_line`]'s over-limit error.
pub fn build_receive_pack_request(
    old_oid: &Oid,
    new_oid: &Oid,
    ref_name: &str,
    capabilities: &[String],
) -> Result<Vec<u8>, GitError> {
    let line = if capabilities.is_empty() {
        format!("{old_oid} {new_oid} {ref_name}\n")
    } else {
        format!("{old_oid} {new_oid} {ref_name}\0{}\n", capabilities.join(" "))
    };
    let mut out = make_pkt_line(line.as_bytes())?;
    out.extend_from_slice(&make_flush_packet());
    Ok(out)
}

/// Parse a single-command receive-pack request: one pkt-line of
/// `<oldOid> SP <newOid> SP <refName>[NUL <capabilities>]`, terminated by
/// a flush packet.
///
/// # Errors
/// Returns [`GitError::ProtoError`] if the frame is missing, malformed, or
/// not flush-terminated.
pub fn parse_receive_pack_request(buf: &[u8]) -> Result<ReceivePackRequest, GitError> {
    let pkts = parse_pkt_lines(buf)?;
    let Some(Pkt::Data(line)) = pkts.first() else {
        return Err(GitError::ProtoError("receive-pack request has no command line".into()));
    };
    if !matches!(pkts.last(), Some(Pkt::Flush)) {
        return Err(GitError::ProtoError("receive-pack request is not flush-terminated".into()));
    }

    let (command, capabilities) = match line.iter().position(|&b| b == 0) {
        Some(nul) => {
            let caps = std::str::from_utf8(&line[nul + 1..])
                .map_err(|_| GitError::ProtoError("capabilities are not utf8".into()))?
                .split(' ')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect();
            (&line[..nul], caps)
        }
        None => (&line[..], Vec::new()),
    };

    let text = std::str::from_utf8(command)
        .map_err(|_| GitError::ProtoError("command line is not utf8".into()))?
        .trim_end_matches('\n');
    let mut parts = text.splitn(3, ' ');
    let (Some(old_oid), Some(new_oid), Some(ref_name)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(GitError::ProtoError(format!("malformed receive-pack command {text:?}")));
    };

    Ok(ReceivePackRequest {
        old_oid: old_oid.to_owned(),
        new_oid: new_oid.to_owned(),
        ref_name: ref_name.to_owned(),
        capabilities,
    })
}

/// Apply a receive-pack command under compare-and-swap: validate both
/// OIDs parse for `algo` and are equal length; normalize the ref name;
/// read its current value (zero-OID if absent) and require it equals
/// `old_oid`, else [`GitError::LockConflict`]. A zero `new_oid` deletes
/// the ref; otherwise the ref is updated (or created).
///
/// # Errors
/// Returns [`GitError::InvalidArgument`] for unparseable OIDs,
/// [`GitError::LockConflict`] on a CAS mismatch, or propagates ref-store
/// errors.
pub fn apply_receive_pack_update(
    refs: &RefStore,
    algo: HashAlgo,
    req: &ReceivePackRequest,
) -> Result<(), GitError> {
    let old_oid: Oid = req
        .old_oid
        .parse()
        .map_err(|e| GitError::InvalidArgument(format!("invalid old oid: {e}")))?;
    let new_oid: Oid = req
        .new_oid
        .parse()
        .map_err(|e| GitError::InvalidArgument(format!("invalid new oid: {e}")))?;
    if old_oid.algo() != algo || new_oid.algo() != algo {
        return Err(GitError::InvalidArgument(
            "old/new oid hash length does not match the repository's algorithm".into(),
        ));
    }

    let normalized = git_refs::normalize(&req.ref_name);
    let current = refs
        .resolve_ref(&normalized)
        .map_err(GitError::from)?
        .unwrap_or_else(|| Oid::zero(algo));
    if current != old_oid {
        return Err(GitError::LockConflict {
            ref_name: normalized,
            expected: old_oid.to_string(),
            actual: current.to_string(),
        });
    }

    if new_oid.is_zero() {
        refs.delete_ref(&normalized, "receive-pack: delete")
            .map_err(GitError::from)
    } else {
        refs.update_ref(&normalized, &new_oid, "receive-pack: update")
            .map_err(GitError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_data_and_flush() {
        let frame = make_pkt_line(b"hello").unwrap();
        assert_eq!(&frame[..4], b"0009");
        let flush = make_flush_packet();
        let mut buf = frame.clone();
        buf.extend_from_slice(&flush);
        let parsed = parse_pkt_lines(&buf).unwrap();
        assert_eq!(parsed, vec![Pkt::Data(b"hello".to_vec()), Pkt::Flush]);
    }

    #[test]
    fn length_prefix_is_lowercase_hex() {
        let frame = make_pkt_line(&vec![0u8; 100]).unwrap();
        let hex = std::str::from_utf8(&frame[..4]).unwrap();
        assert_eq!(hex, hex.to_lowercase());
        assert_eq!(usize::from_str_radix(hex, 16).unwrap(), 104);
    }

    #[test]
    fn rejects_over_limit_data() {
        let err = make_pkt_line(&vec![0u8; MAX_DATA + 1]).unwrap_err();
        assert!(matches!(err, GitError::ProtoError(_)));
    }

    #[test]
    fn rejects_truncated_frame() {
        let err = parse_pkt_lines(b"0009hel").unwrap_err();
        assert!(matches!(err, GitError::ProtoError(_)));
    }

    #[test]
    fn capability_parity_is_sorted_intersection() {
        let ours = vec!["report-status".to_owned(), " ofs-delta ".to_owned(), "".to_owned()];
        let theirs = vec!["ofs-delta".to_owned(), "side-band-64k".to_owned()];
        assert_eq!(capability_parity(&ours, &theirs), vec!["ofs-delta".to_owned()]);
    }

    #[test]
    fn filter_negotiation_requires_filter_cap() {
        assert!(negotiate_filter_capability("blob:none", &["filter".to_owned()]).is_ok());
        assert!(negotiate_filter_capability("blob:none", &["filter=blob:none".to_owned()]).is_ok());
        assert!(negotiate_filter_capability("blob:none", &["side-band-64k".to_owned()]).is_err());
        assert!(negotiate_filter_capability("  ", &["filter".to_owned()]).is_err());
    }

    fn oid(byte: u8) -> Oid {
        Oid::from_bytes(HashAlgo::Sha1, &[byte; 20])
    }

    #[test]
    fn advertisement_puts_head_target_first_and_flushes() {
        let refs = vec![
            ("refs/heads/feature".to_owned(), oid(2)),
            ("refs/heads/main".to_owned(), oid(1)),
        ];
        let caps = default_receive_pack_capabilities(HashAlgo::Sha1, &[]);
        let bytes = build_receive_pack_advertisement(&refs, Some("refs/heads/main"), &caps).unwrap();
        let text = String::from_utf8(bytes[..bytes.len() - 4].to_vec()).unwrap();
        assert!(text.contains(&format!("{} refs/heads/main\0", oid(1))));
        assert!(bytes.ends_with(FLUSH));
    }

    #[test]
    fn default_capabilities_include_object_format() {
        let caps = default_receive_pack_capabilities(HashAlgo::Sha256, &[]);
        assert!(caps.contains(&"object-format=sha256".to_owned()));
        assert!(caps.contains(&"report-status-v2".to_owned()));
    }

    #[test]
    fn build_request_without_capabilities_roundtrips_through_parse() {
        let bytes = build_receive_pack_request(&oid(0), &oid(1), "refs/heads/main", &[]).unwrap();
        let req = parse_receive_pack_request(&bytes).unwrap();
        assert_eq!(req.old_oid, oid(0).to_string());
        assert_eq!(req.new_oid, oid(1).to_string());
        assert_eq!(req.ref_name, "refs/heads/main");
        assert!(req.capabilities.is_empty());
        assert!(bytes.ends_with(FLUSH));
    }

    #[test]
    fn build_request_with_capabilities_roundtrips_through_parse() {
        let caps = vec!["report-status".to_owned(), "side-band-64k".to_owned()];
        let bytes = build_receive_pack_request(&oid(0), &oid(1), "refs/heads/main", &caps).unwrap();
        let req = parse_receive_pack_request(&bytes).unwrap();
        assert_eq!(req.capabilities, caps);
    }

    #[test]
    fn parse_request_without_capabilities() {
        let line = format!("{} {} refs/heads/main\n", oid(0), oid(1));
        let mut buf = make_pkt_line(line.as_bytes()).unwrap();
        buf.extend_from_slice(&make_flush_packet());
        let req = parse_receive_pack_request(&buf).unwrap();
        assert_eq!(req.ref_name, "refs/heads/main");
        assert!(req.capabilities.is_empty());
    }

    #[test]
    fn parse_request_with_capabilities() {
        let line = format!("{} {} refs/heads/main\0report-status side-band-64k", oid(0), oid(1));
        let mut buf = make_pkt_line(line.as_bytes()).unwrap();
        buf.extend_from_slice(&make_flush_packet());
        let req = parse_receive_pack_request(&buf).unwrap();
        assert_eq!(
            req.capabilities,
            vec!["report-status".to_owned(), "side-band-64k".to_owned()]
        );
    }

    #[test]
    fn update_creates_ref_from_zero_old() {
        let dir = tempfile::tempdir().unwrap();
        let refs = RefStore::new(dir.path(), HashAlgo::Sha1);
        let req = ReceivePackRequest {
            old_oid: Oid::zero(HashAlgo::Sha1).to_string(),
            new_oid: oid(1).to_string(),
            ref_name: "refs/heads/main".to_owned(),
            capabilities: vec![],
        };
        apply_receive_pack_update(&refs, HashAlgo::Sha1, &req).unwrap();
        assert_eq!(refs.resolve_ref("refs/heads/main").unwrap(), Some(oid(1)));
    }

    #[test]
    fn update_rejects_stale_old_oid() {
        let dir = tempfile::tempdir().unwrap();
        let refs = RefStore::new(dir.path(), HashAlgo::Sha1);
        refs.create_ref("refs/heads/main", &oid(1), "c").unwrap();
        let req = ReceivePackRequest {
            old_oid: oid(9).to_string(),
            new_oid: oid(2).to_string(),
            ref_name: "refs/heads/main".to_owned(),
            capabilities: vec![],
        };
        let err = apply_receive_pack_update(&refs, HashAlgo::Sha1, &req).unwrap_err();
        assert!(matches!(err, GitError::LockConflict { .. }));
    }

    #[test]
    fn update_with_zero_new_oid_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let refs = RefStore::new(dir.path(), HashAlgo::Sha1);
        refs.create_ref("refs/heads/main", &oid(1), "c").unwrap();
        let req = ReceivePackRequest {
            old_oid: oid(1).to_string(),
            new_oid: Oid::zero(HashAlgo::Sha1).to_string(),
            ref_name: "refs/heads/main".to_owned(),
            capabilities: vec![],
        };
        apply_receive_pack_update(&refs, HashAlgo::Sha1, &req).unwrap();
        assert_eq!(refs.resolve_ref("refs/heads/main").unwrap(), None);
    }
}
