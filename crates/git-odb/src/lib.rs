//! Loose object storage, opaque pack/bitmap/midx/commit-graph containers,
//! recursive tree materialization, and shallow-clone boundary computation.
//!
//! Builds storage on top of the object formats in `git-object`; knows
//! nothing about refs, the index, or the wire protocol.

mod error;
mod materialize;
mod pack;
mod shallow;
mod store;

pub use error::OdbError;
pub use materialize::{Gitlink, Materialized, materialize_tree};
pub use pack::{
    is_valid_pack_basename, read_object_from_pack, validate_bitmap, validate_commit_graph,
    validate_midx,
};
pub use shallow::shallow_boundary;
pub use store::{Envelope, ObjectStore};
