//! Content hashing and compression primitives for the git-repo workspace.
//!
//! This crate has no knowledge of object, ref, or index formats — it is the
//! lowest layer, providing the two pure, never-blocking operations every
//! other crate in the workspace builds on: envelope hashing and raw-DEFLATE
//! compression with inflation-bomb guards.

mod compression;
mod crc32;
mod hashing;

pub use compression::{CompressionError, InflateLimits, MAX_DELTA_CHAIN_DEPTH, deflate_raw, inflate_raw};
pub use crc32::crc32_ieee;
pub use hashing::{HashAlgo, hash};
