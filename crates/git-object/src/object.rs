//! The four object kinds and the loose-object envelope codec.

use std::fmt;
use std::str::FromStr;

use git_hash::{CompressionError, HashAlgo, InflateLimits, deflate_raw, hash, inflate_raw};
use thiserror::Error;

use crate::oid::Oid;

/// One of the four object types git stores.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// A file's contents, with no name or mode attached.
    Blob,
    /// A directory listing: `(mode, name, oid)` triples.
    Tree,
    /// A snapshot: a tree plus parent links and metadata.
    Commit,
    /// An annotated tag pointing at another object.
    Tag,
}

impl ObjectKind {
    /// The lowercase type word used in the envelope header and the wire
    /// protocol (`blob`, `tree`, `commit`, `tag`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Tree => "tree",
            Self::Commit => "commit",
            Self::Tag => "tag",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = ObjectFormatError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blob" => Ok(Self::Blob),
            "tree" => Ok(Self::Tree),
            "commit" => Ok(Self::Commit),
            "tag" => Ok(Self::Tag),
            other => Err(ObjectFormatError::UnknownKind(other.to_owned())),
        }
    }
}

/// Errors produced while decoding an envelope or its header.
#[derive(Debug, Error)]
pub enum ObjectFormatError {
    /// The header was not `<type> SP <decimal-size> NUL`.
    #[error("malformed object header: {0}")]
    MalformedHeader(String),

    /// The type word was not one of `blob`/`tree`/`commit`/`tag`.
    #[error("unknown object kind {0:?}")]
    UnknownKind(String),

    /// The header's declared size did not match the actual payload length.
    #[error("header declared {declared} bytes but payload is {actual}")]
    SizeMismatch {
        /// Size from the header.
        declared: usize,
        /// Size actually present after the NUL.
        actual: usize,
    },

    /// Raw-DEFLATE inflate/deflate failed.
    #[error(transparent)]
    Compression(#[from] CompressionError),
}

/// A decoded git object: its kind, its raw payload, and the OID it hashes to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Object {
    kind: ObjectKind,
    payload: Vec<u8>,
    oid: Oid,
}

impl Object {
    /// Build an object from a kind and payload, computing its OID under
    /// `algo`. This is the only way to construct an `Object` — its `oid` is
    /// always consistent with its content by construction.
    #[must_use]
    pub fn new(algo: HashAlgo, kind: ObjectKind, payload: Vec<u8>) -> Self {
        let digest = hash(algo, kind.as_str(), &payload);
        let oid = Oid::from_bytes(algo, &digest);
        Self { kind, payload, oid }
    }

    /// This object's kind.
    #[must_use]
    pub const fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// This object's raw, uncompressed payload (the envelope body, without
    /// the `<type> SP <size> NUL` header).
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// This object's content-addressed identifier.
    #[must_use]
    pub const fn oid(&self) -> &Oid {
        &self.oid
    }

    /// Encode the envelope header + payload, raw-DEFLATE compress it, and
    /// return the bytes as stored at `objects/<oid[0:2]>/<oid[2:]>`.
    ///
    /// # Errors
    /// Returns an error only if the underlying DEFLATE writer fails, which
    /// cannot happen for an in-memory sink.
    pub fn encode_loose(&self) -> Result<Vec<u8>, ObjectFormatError> {
        let header = format!("{} {}\0", self.kind.as_str(), self.payload.len());
        let mut full = Vec::with_capacity(header.len() + self.payload.len());
        full.extend_from_slice(header.as_bytes());
        full.extend_from_slice(&self.payload);
        Ok(deflate_raw(&full)?)
    }

    /// Inflate and parse a loose-object blob, verifying the header's
    /// declared size against the actual payload and recomputing the OID
    /// under `algo`.
    ///
    /// # Errors
    /// Returns [`ObjectFormatError`] if the stream is not valid DEFLATE, the
    /// header is malformed, the type word is unrecognized, or the declared
    /// size disagrees with the payload.
    pub fn decode_loose(
        algo: HashAlgo,
        data: &[u8],
        limits: InflateLimits,
    ) -> Result<Self, ObjectFormatError> {
        let inflated = inflate_raw(data, limits)?;
        Self::decode_envelope(algo, &inflated)
    }

    /// Parse an already-inflated envelope (header + payload). Exposed
    /// separately from [`Object::decode_loose`] so pack-entry consumers that
    /// apply their own decompression can still reuse the header parser.
    ///
    /// # Errors
    /// See [`Object::decode_loose`].
    pub fn decode_envelope(algo: HashAlgo, inflated: &[u8]) -> Result<Self, ObjectFormatError> {
        let nul = inflated
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| ObjectFormatError::MalformedHeader("missing NUL".into()))?;
        let header = std::str::from_utf8(&inflated[..nul])
            .map_err(|e| ObjectFormatError::MalformedHeader(e.to_string()))?;
        let mut parts = header.splitn(2, ' ');
        let kind_word = parts
            .next()
            .ok_or_else(|| ObjectFormatError::MalformedHeader("missing type".into()))?;
        let size_word = parts
            .next()
            .ok_or_else(|| ObjectFormatError::MalformedHeader("missing size".into()))?;
        let kind: ObjectKind = kind_word.parse()?;
        let declared: usize = size_word
            .parse()
            .map_err(|_| ObjectFormatError::MalformedHeader(format!("bad size {size_word:?}")))?;

        let payload = inflated[nul + 1..].to_vec();
        if payload.len() != declared {
            return Err(ObjectFormatError::SizeMismatch {
                declared,
                actual: payload.len(),
            });
        }

        Ok(Self::new(algo, kind, payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_blob() {
        let obj = Object::new(HashAlgo::Sha1, ObjectKind::Blob, b"hello\n".to_vec());
        let loose = obj.encode_loose().unwrap();
        let decoded = Object::decode_loose(HashAlgo::Sha1, &loose, InflateLimits::default()).unwrap();
        assert_eq!(decoded, obj);
    }

    #[test]
    fn empty_blob_matches_known_oid() {
        let obj = Object::new(HashAlgo::Sha1, ObjectKind::Blob, Vec::new());
        assert_eq!(
            obj.oid().to_string(),
            "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391"
        );
    }

    #[test]
    fn rejects_unknown_kind() {
        let loose = deflate_raw(b"widget 0\0").unwrap();
        let err = Object::decode_loose(HashAlgo::Sha1, &loose, InflateLimits::default()).unwrap_err();
        assert!(matches!(err, ObjectFormatError::UnknownKind(_)));
    }

    #[test]
    fn rejects_size_mismatch() {
        let loose = deflate_raw(b"blob 5\0ab").unwrap();
        let err = Object::decode_loose(HashAlgo::Sha1, &loose, InflateLimits::default()).unwrap_err();
        assert!(matches!(err, ObjectFormatError::SizeMismatch { .. }));
    }

    #[test]
    fn rejects_missing_nul() {
        let loose = deflate_raw(b"blob 5").unwrap();
        let err = Object::decode_loose(HashAlgo::Sha1, &loose, InflateLimits::default()).unwrap_err();
        assert!(matches!(err, ObjectFormatError::MalformedHeader(_)));
    }
}
