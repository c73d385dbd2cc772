//! Core runtime for telarc: the batched streaming query engine shared by
//! every entity-specific fetch client of a telemetry archive read path.
//!
//! The engine owns query *construction* (predicates, key sets, unions) and
//! query *consumption* (streaming cursors, batching, join flattening). It
//! never owns connections or column layouts; those arrive through the
//! executor and row-mapper seams in [`exec`].
#![warn(unreachable_pub)]

pub mod config;
pub mod decode;
pub mod error;
pub mod exec;
pub mod fetch;
pub mod identity;
pub mod obs;
pub mod query;
pub mod schema;
pub mod value;

///
/// CONSTANTS
///

/// Default number of mapped records returned per cursor batch.
pub const DEFAULT_BATCH_SIZE: usize = 500;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No executors, sinks, or helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        error::FetchError,
        exec::{BatchCursor, JoinFlattener},
        fetch::FetchSession,
        identity::{IdentityResolver, ResolvedIdentity},
        query::{Filter, PartitionedIdSet, Predicate, TimeRange, UnionQuery},
        schema::ArchiveSchema,
    };
}
