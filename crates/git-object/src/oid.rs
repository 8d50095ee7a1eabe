//! Object identifiers: lowercase hex, 40 (SHA-1) or 64 (SHA-256) digits.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use git_hash::HashAlgo;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Error parsing a string into an [`Oid`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid OID {value:?}: {reason}")]
pub struct OidParseError {
    /// The string that failed to parse.
    pub value: String,
    /// Why it was rejected.
    pub reason: String,
}

/// A content-addressed object identifier.
///
/// Stores up to 32 raw digest bytes plus the algorithm that produced them, so
/// a single type covers both SHA-1 (20 bytes) and SHA-256 (32 bytes) — see
/// spec.md §9 "Hash-length polymorphism." Unused trailing bytes for SHA-1
/// OIDs are always zeroed so `Eq`/`Hash`/`Ord` behave correctly without
/// inspecting `algo` first.
#[derive(Clone, Copy, Eq, Hash)]
pub struct Oid {
    bytes: [u8; 32],
    algo: HashAlgo,
}

impl Oid {
    /// Build an `Oid` from raw digest bytes, which must match `algo`'s
    /// length (20 for SHA-1, 32 for SHA-256).
    ///
    /// # Panics
    /// Panics if `raw.len()` does not match `algo.len()` — this is a
    /// programmer error at every call site in this workspace, never a
    /// function of untrusted input (untrusted input goes through
    /// [`Oid::parse`]).
    #[must_use]
    pub fn from_bytes(algo: HashAlgo, raw: &[u8]) -> Self {
        assert_eq!(raw.len(), algo.len(), "OID byte length must match algorithm");
        let mut bytes = [0u8; 32];
        bytes[..raw.len()].copy_from_slice(raw);
        Self { bytes, algo }
    }

    /// The zero OID for `algo` — the CAS sentinel for "ref does not exist."
    #[must_use]
    pub const fn zero(algo: HashAlgo) -> Self {
        Self {
            bytes: [0u8; 32],
            algo,
        }
    }

    /// Parse a lowercase (or uppercase, for leniency) hex string. The
    /// algorithm is inferred from the string length: 40 hex chars is
    /// SHA-1, 64 is SHA-256. Any other length is rejected, matching the
    /// `^[0-9a-f]{40}|[0-9a-f]{64}$` invariant in spec.md §3.
    pub fn parse(s: &str) -> Result<Self, OidParseError> {
        let algo = match s.len() {
            40 => HashAlgo::Sha1,
            64 => HashAlgo::Sha256,
            n => {
                return Err(OidParseError {
                    value: s.to_owned(),
                    reason: format!("expected 40 or 64 hex characters, got {n}"),
                });
            }
        };
        let mut bytes = [0u8; 32];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hi = hex_digit(chunk[0]).ok_or_else(|| OidParseError {
                value: s.to_owned(),
                reason: format!("invalid hex digit '{}'", chunk[0] as char),
            })?;
            let lo = hex_digit(chunk[1]).ok_or_else(|| OidParseError {
                value: s.to_owned(),
                reason: format!("invalid hex digit '{}'", chunk[1] as char),
            })?;
            bytes[i] = (hi << 4) | lo;
        }
        Ok(Self { bytes, algo })
    }

    /// The algorithm this OID was produced with.
    #[must_use]
    pub const fn algo(&self) -> HashAlgo {
        self.algo
    }

    /// The raw digest bytes (20 or 32, depending on `algo()`).
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.algo.len()]
    }

    /// `true` if every digest byte is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.as_bytes().iter().all(|&b| b == 0)
    }
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

impl PartialEq for Oid {
    fn eq(&self, other: &Self) -> bool {
        self.algo == other.algo && self.as_bytes() == other.as_bytes()
    }
}

impl PartialOrd for Oid {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Oid {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.as_bytes() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({self})")
    }
}

impl FromStr for Oid {
    type Err = OidParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Serializes as its lowercase hex string — the form every sidecar JSON
/// file and the canonical index encoding use.
impl Serialize for Oid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Oid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha1_roundtrip() {
        let hex = "0123456789abcdef0123456789abcdef01234567";
        let oid: Oid = hex.parse().unwrap();
        assert_eq!(oid.to_string(), hex);
        assert_eq!(oid.algo(), HashAlgo::Sha1);
    }

    #[test]
    fn sha256_roundtrip() {
        let hex = "a".repeat(64);
        let oid: Oid = hex.parse().unwrap();
        assert_eq!(oid.to_string(), hex);
        assert_eq!(oid.algo(), HashAlgo::Sha256);
    }

    #[test]
    fn zero_oid() {
        assert!(Oid::zero(HashAlgo::Sha1).is_zero());
        assert_eq!(
            Oid::zero(HashAlgo::Sha1).to_string(),
            "0000000000000000000000000000000000000000"
        );
    }

    #[test]
    fn rejects_bad_length() {
        assert!("abc".parse::<Oid>().is_err());
    }

    #[test]
    fn rejects_non_hex() {
        assert!("g".repeat(40).parse::<Oid>().is_err());
    }

    #[test]
    fn sorts_lexicographically_by_hex() {
        let a: Oid = "0000000000000000000000000000000000000001".parse().unwrap();
        let b: Oid = "00000000000000000000000000000000000000ff".parse().unwrap();
        assert!(a < b);
    }

    #[test]
    fn different_algo_same_prefix_not_equal_by_length() {
        let sha1: Oid = "a".repeat(40).parse().unwrap();
        let sha256: Oid = "a".repeat(64).parse().unwrap();
        assert_ne!(sha1, sha256);
    }
}
